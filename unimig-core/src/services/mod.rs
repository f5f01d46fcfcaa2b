pub mod count_validator;
pub mod migration_run;
pub mod migration_service;
pub mod startup_service;
pub mod storage_mode_service;

pub use migration_run::{BulkSink, MigrationRun, ProgressFn};
pub use migration_service::{MigrateOptions, MigrationService};
pub use startup_service::{FailurePolicy, OrgOutcome, OrgReport, StartupReport, StartupService};
pub use storage_mode_service::{StorageMode, StorageModeService};
