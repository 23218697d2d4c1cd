#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS persons (
          id INTEGER PRIMARY KEY CHECK(id > 0),
          name TEXT NOT NULL,
          gender TEXT CHECK(gender IN ('M', 'F')),
          house_number TEXT,
          birth_year INTEGER,
          death_year INTEGER,
          father_id INTEGER,
          mother_id INTEGER,
          protocol_id INTEGER,
          notes TEXT,
          FOREIGN KEY(father_id) REFERENCES persons(id) ON DELETE SET NULL,
          FOREIGN KEY(mother_id) REFERENCES persons(id) ON DELETE SET NULL,
          FOREIGN KEY(protocol_id) REFERENCES protocols(id) ON DELETE SET NULL
        );

        -- Unordered spouse pairs, smaller id first.
        CREATE TABLE IF NOT EXISTS marriages (
          person_a INTEGER NOT NULL,
          person_b INTEGER NOT NULL,
          PRIMARY KEY(person_a, person_b),
          CHECK(person_a < person_b),
          FOREIGN KEY(person_a) REFERENCES persons(id) ON DELETE CASCADE,
          FOREIGN KEY(person_b) REFERENCES persons(id) ON DELETE CASCADE
        );
"#;
