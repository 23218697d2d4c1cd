#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS demography (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          year INTEGER NOT NULL,
          population_total INTEGER,
          catholics INTEGER,
          jews INTEGER,
          others INTEGER,
          description TEXT
        );
"#;
