//! SQLite persistence: schema setup and the repository over facts and
//! derived rows.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{DerivedGeneration, Repository};
