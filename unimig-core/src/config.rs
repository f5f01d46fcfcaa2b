//! Unified storage settings.
//!
//! Read from TOML, then overridden by `UNIMIG_*` environment variables:
//!
//! ```toml
//! disable_migrations = false
//! page_size = 100
//!
//! [resources."dashboards.dashboard.grafana.app"]
//! dual_writer_mode = 2
//! auto_migration_threshold = 5000
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{MigrationError, MigrationResult};
use crate::registry::GroupResource;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 10_000;
pub const DEFAULT_MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

pub const ENV_DISABLE_MIGRATIONS: &str = "UNIMIG_DISABLE_MIGRATIONS";
pub const ENV_PAGE_SIZE: &str = "UNIMIG_PAGE_SIZE";
pub const ENV_MAX_PAGE_BYTES: &str = "UNIMIG_MAX_PAGE_BYTES";
pub const ENV_FATAL_ON_FAILURE: &str = "UNIMIG_FATAL_ON_FAILURE";

/// Dual-writer mode 0..=5. 0 is legacy only, 1..=3 write to both stores,
/// 4 and 5 serve from the unified store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DualWriterMode(u8);

impl DualWriterMode {
    pub const LEGACY: DualWriterMode = DualWriterMode(0);
    pub const MAX: u8 = 5;

    pub fn new(mode: u8) -> MigrationResult<Self> {
        if mode > Self::MAX {
            return Err(MigrationError::Config(format!(
                "dual writer mode {} is out of range 0..={}",
                mode,
                Self::MAX
            )));
        }
        Ok(Self(mode))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_dual_write(&self) -> bool {
        (1..=3).contains(&self.0)
    }

    pub fn is_cut_over(&self) -> bool {
        self.0 >= 4
    }
}

impl TryFrom<u8> for DualWriterMode {
    type Error = MigrationError;

    fn try_from(mode: u8) -> Result<Self, Self::Error> {
        Self::new(mode)
    }
}

impl From<DualWriterMode> for u8 {
    fn from(mode: DualWriterMode) -> Self {
        mode.0
    }
}

impl fmt::Display for DualWriterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    pub dual_writer_mode: DualWriterMode,
    pub enable_migration: bool,
    /// Skip automatic migration above this many legacy rows; 0 is unlimited
    pub auto_migration_threshold: u64,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            dual_writer_mode: DualWriterMode::LEGACY,
            enable_migration: true,
            auto_migration_threshold: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifiedStorageConfig {
    pub disable_migrations: bool,
    /// Operator pin for the startup failure policy; unset means decide from
    /// the cut-over state of the failing resources
    pub fatal_on_failure: Option<bool>,
    pub page_size: u64,
    pub max_page_bytes: usize,
    /// Keyed `<resource>.<group>`
    pub resources: IndexMap<String, ResourceSettings>,
}

impl Default for UnifiedStorageConfig {
    fn default() -> Self {
        Self {
            disable_migrations: false,
            fatal_on_failure: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            resources: IndexMap::new(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> MigrationResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MigrationError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> MigrationResult<T> {
    value.trim().parse().map_err(|_| {
        MigrationError::Config(format!("{} must be a positive number, got '{}'", key, value))
    })
}

impl UnifiedStorageConfig {
    pub fn from_toml_str(raw: &str) -> MigrationResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|err| MigrationError::Config(format!("invalid unified storage config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> MigrationResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            MigrationError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Applies `UNIMIG_*` variables from the process environment
    pub fn with_env_overrides(self) -> MigrationResult<Self> {
        let values: HashMap<String, String> = [
            ENV_DISABLE_MIGRATIONS,
            ENV_PAGE_SIZE,
            ENV_MAX_PAGE_BYTES,
            ENV_FATAL_ON_FAILURE,
        ]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect();
        self.with_overrides(&values)
    }

    pub fn with_overrides(mut self, values: &HashMap<String, String>) -> MigrationResult<Self> {
        let read = |key: &str| values.get(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = read(ENV_DISABLE_MIGRATIONS) {
            self.disable_migrations = parse_bool(ENV_DISABLE_MIGRATIONS, value)?;
        }
        if let Some(value) = read(ENV_FATAL_ON_FAILURE) {
            self.fatal_on_failure = Some(parse_bool(ENV_FATAL_ON_FAILURE, value)?);
        }
        if let Some(value) = read(ENV_PAGE_SIZE) {
            self.page_size = parse_number(ENV_PAGE_SIZE, value)?;
        }
        if let Some(value) = read(ENV_MAX_PAGE_BYTES) {
            self.max_page_bytes = parse_number(ENV_MAX_PAGE_BYTES, value)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> MigrationResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(MigrationError::Config(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.max_page_bytes == 0 {
            return Err(MigrationError::Config(
                "max_page_bytes must be at least 1".to_string(),
            ));
        }
        for key in self.resources.keys() {
            key.parse::<GroupResource>()?;
        }
        Ok(())
    }

    /// Settings for a resource, defaults when it is not configured
    pub fn resource(&self, group_resource: &GroupResource) -> ResourceSettings {
        self.resources
            .get(&group_resource.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_resource(&mut self, group_resource: &GroupResource, settings: ResourceSettings) {
        self.resources.insert(group_resource.to_string(), settings);
    }

    pub fn with_resource(mut self, group_resource: &GroupResource, settings: ResourceSettings) -> Self {
        self.set_resource(group_resource, settings);
        self
    }
}
