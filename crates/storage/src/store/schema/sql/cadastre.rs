#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        -- One row per survey protocol (an owner's declaration).
        CREATE TABLE IF NOT EXISTS protocols (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          key TEXT NOT NULL UNIQUE,
          owner_name TEXT NOT NULL,
          order_number INTEGER,
          house_number TEXT,
          genealogy TEXT,
          ownership_history TEXT,
          remarks TEXT,
          co_ownership TEXT,
          relations TEXT,
          interpretation TEXT,
          protocol_date TEXT,
          protocol_location TEXT
        );

        -- Plots, houses, roads and other mapped objects. Geometry is GeoJSON text.
        CREATE TABLE IF NOT EXISTS parcels (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          number TEXT NOT NULL,
          category TEXT NOT NULL,
          geometry_json TEXT,
          UNIQUE(number, category)
        );

        CREATE TABLE IF NOT EXISTS parcel_owners (
          protocol_id INTEGER NOT NULL,
          parcel_id INTEGER NOT NULL,
          ownership TEXT NOT NULL CHECK(ownership IN ('actual', 'protocol')),
          PRIMARY KEY(protocol_id, parcel_id, ownership),
          FOREIGN KEY(protocol_id) REFERENCES protocols(id) ON DELETE CASCADE,
          FOREIGN KEY(parcel_id) REFERENCES parcels(id) ON DELETE CASCADE
        );
"#;
