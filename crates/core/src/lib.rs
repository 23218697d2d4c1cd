#![forbid(unsafe_code)]

pub mod dates;
pub mod fixtures;
pub mod genealogy;
pub mod geometry;
pub mod ids;
pub mod links;
pub mod model;
pub mod stats;
