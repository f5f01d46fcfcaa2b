//! Shared fixtures for exercising the migration engine against a legacy
//! relational schema.

pub mod db;
pub mod fixtures;
pub mod legacy_schema;

pub use db::{setup_legacy_db, TestDb};
