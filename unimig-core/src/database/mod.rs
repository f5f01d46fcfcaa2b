pub mod connection;
pub mod entities;
pub mod migration_log;
