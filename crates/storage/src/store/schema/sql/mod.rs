#![forbid(unsafe_code)]

mod cadastre;
mod core;
mod demography;
mod genealogy;
mod indexes;
mod pragmas;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(pragmas::SQL);
    sql.push_str(core::SQL);
    sql.push_str(cadastre::SQL);
    sql.push_str(demography::SQL);
    sql.push_str(genealogy::SQL);
    sql.push_str(indexes::SQL);
    sql
}
