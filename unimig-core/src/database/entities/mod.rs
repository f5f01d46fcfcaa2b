// Legacy tables, read-only from this crate
pub mod dashboard_versions;
pub mod dashboards;
pub mod library_elements;
pub mod orgs;
pub mod playlist_items;
pub mod playlists;
pub mod short_urls;

// Owned by the migration engine
pub mod migration_log;
