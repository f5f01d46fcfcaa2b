//! The legacy row-oriented schema, reduced to the columns the migration
//! engine reads. Production databases already carry these tables; tests build
//! them from scratch.

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_legacy_schema;

pub use m20240101_000001_create_legacy_schema::{
    Dashboard, DashboardVersion, LibraryElement, Org, Playlist, PlaylistItem, ShortUrl,
};

pub struct LegacySchema;

#[async_trait::async_trait]
impl MigratorTrait for LegacySchema {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_legacy_schema::Migration)]
    }
}
