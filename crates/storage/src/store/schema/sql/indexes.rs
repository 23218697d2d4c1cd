#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_parcel_owners_parcel ON parcel_owners(parcel_id);
        CREATE INDEX IF NOT EXISTS idx_persons_father ON persons(father_id);
        CREATE INDEX IF NOT EXISTS idx_persons_mother ON persons(mother_id);
        CREATE INDEX IF NOT EXISTS idx_persons_protocol ON persons(protocol_id);
        CREATE INDEX IF NOT EXISTS idx_marriages_b ON marriages(person_b);
        CREATE INDEX IF NOT EXISTS idx_demography_year ON demography(year);
"#;
