pub mod common;
pub mod config;
pub mod errors;
pub mod legacy;
pub mod locker;
pub mod registry;
pub mod resources;
pub mod unified;

pub mod app_context;
pub use app_context::AppContext;
pub mod database;
pub mod services;
