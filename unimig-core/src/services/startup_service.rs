//! Background migration of every registered definition for every
//! organization, run once at process start.
//!
//! Organizations are migrated one at a time, definitions in registration
//! order. A failed organization is logged and, unless the failure policy is
//! proven fatal, the driver moves on to the next one.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::UnifiedStorageConfig;
use crate::database::migration_log::MigrationLog;
use crate::errors::{MigrationError, MigrationResult};
use crate::registry::{GroupResource, MigrationDefinition};
use crate::services::migration_service::MigrationService;

/// Whether a failed organization stops the driver. Starts `Unknown` and is
/// proven on the first failure; a proven policy never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    Unknown,
    ProvenFatal,
    ProvenNonFatal,
}

impl FailurePolicy {
    fn resolve(self, config: &UnifiedStorageConfig, definition: &MigrationDefinition) -> Self {
        match self {
            FailurePolicy::Unknown => {
                let fatal = config.fatal_on_failure.unwrap_or_else(|| {
                    definition
                        .resources
                        .iter()
                        .any(|info| config.resource(&info.group_resource).dual_writer_mode.is_cut_over())
                });
                if fatal {
                    FailurePolicy::ProvenFatal
                } else {
                    FailurePolicy::ProvenNonFatal
                }
            }
            proven => proven,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrgOutcome {
    Migrated { processed: i64, rejected: usize },
    AlreadyMigrated,
    /// Migration is disabled for at least one resource of the definition
    SkippedDisabled,
    SkippedThreshold {
        resource: GroupResource,
        rows: i64,
        threshold: u64,
    },
    Failed { error: String, retryable: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrgReport {
    pub definition_id: String,
    pub org_id: i64,
    pub org_name: String,
    pub outcome: OrgOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Set when migrations are globally disabled and nothing ran
    pub disabled: bool,
    pub entries: Vec<OrgReport>,
}

impl StartupReport {
    pub fn migrated(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, OrgOutcome::Migrated { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &OrgReport> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, OrgOutcome::Failed { .. }))
    }

    pub fn outcome(&self, definition_id: &str, org_id: i64) -> Option<&OrgOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.definition_id == definition_id && entry.org_id == org_id)
            .map(|entry| &entry.outcome)
    }
}

pub struct StartupService {
    migrations: Arc<MigrationService>,
    migration_log: Arc<dyn MigrationLog>,
    config: Arc<UnifiedStorageConfig>,
    with_history: bool,
    policy: Mutex<FailurePolicy>,
}

impl StartupService {
    pub fn new(migrations: Arc<MigrationService>, config: Arc<UnifiedStorageConfig>) -> Self {
        let migration_log = migrations.migration_log().clone();
        Self {
            migrations,
            migration_log,
            config,
            with_history: false,
            policy: Mutex::new(FailurePolicy::Unknown),
        }
    }

    pub fn with_history(mut self, with_history: bool) -> Self {
        self.with_history = with_history;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        *self.policy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prove_policy(&self, definition: &MigrationDefinition) -> FailurePolicy {
        let mut policy = self.policy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *policy = policy.resolve(&self.config, definition);
        *policy
    }

    /// Runs the driver on its own task
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<MigrationResult<StartupReport>> {
        tokio::spawn(async move { self.run(&cancel).await })
    }

    pub async fn run(&self, cancel: &CancellationToken) -> MigrationResult<StartupReport> {
        let mut report = StartupReport::default();
        if self.config.disable_migrations {
            info!("unified storage migrations are disabled");
            report.disabled = true;
            return Ok(report);
        }

        let orgs = self.migrations.source().orgs().await?;
        let definitions = self.migrations.registry().all();
        info!(
            "running {} migrations for {} organizations",
            definitions.len(),
            orgs.len()
        );

        for definition in definitions {
            let disabled = definition
                .group_resources()
                .iter()
                .any(|gr| !self.config.resource(gr).enable_migration);

            for org in &orgs {
                if cancel.is_cancelled() {
                    return Err(MigrationError::Cancelled);
                }

                let outcome = if disabled {
                    OrgOutcome::SkippedDisabled
                } else {
                    self.migrate_org(&definition, org.id, &org.name, cancel).await?
                };

                report.entries.push(OrgReport {
                    definition_id: definition.id.clone(),
                    org_id: org.id,
                    org_name: org.name.clone(),
                    outcome,
                });
            }

            if disabled {
                info!("{} skipped: migration disabled by config", definition.id);
            }
        }

        info!(
            "startup migrations finished: {} migrated, {} failed",
            report.migrated(),
            report.failed().count()
        );
        Ok(report)
    }

    async fn migrate_org(
        &self,
        definition: &MigrationDefinition,
        org_id: i64,
        org_name: &str,
        cancel: &CancellationToken,
    ) -> MigrationResult<OrgOutcome> {
        match self.migration_log.exists(&definition.migration_id, org_id).await {
            Ok(true) => return Ok(OrgOutcome::AlreadyMigrated),
            Ok(false) => {}
            Err(err) => warn!(
                "cannot check migration log for {} in org {}, migrating anyway: {}",
                definition.id, org_id, err
            ),
        }

        let result = match self.over_threshold(definition, org_id).await {
            Ok(Some(skipped)) => return Ok(skipped),
            Ok(None) => {
                info!("migrating {} for org {} ({})", definition.id, org_id, org_name);
                self.migrations
                    .migrate_definition(definition, org_id, self.with_history, cancel)
                    .await
            }
            Err(err) => Err(err),
        };

        let error = match result {
            Ok(response) => {
                return Ok(OrgOutcome::Migrated {
                    processed: response.processed,
                    rejected: response.rejected.len(),
                })
            }
            Err(MigrationError::Cancelled) => return Err(MigrationError::Cancelled),
            Err(err) => err,
        };

        error!(
            "{} failed for org {} ({}): {}",
            definition.id, org_id, org_name, error
        );
        if self.prove_policy(definition) == FailurePolicy::ProvenFatal {
            return Err(error);
        }

        Ok(OrgOutcome::Failed {
            retryable: error.is_retryable(),
            error: error.to_string(),
        })
    }

    async fn over_threshold(
        &self,
        definition: &MigrationDefinition,
        org_id: i64,
    ) -> MigrationResult<Option<OrgOutcome>> {
        for info in &definition.resources {
            let threshold = self.config.resource(&info.group_resource).auto_migration_threshold;
            if threshold == 0 {
                continue;
            }

            let rows = self.migrations.source().count(&info.group_resource, org_id).await?;
            if rows > threshold as i64 {
                info!(
                    "{} skipped for org {}: {} has {} rows, threshold is {}",
                    definition.id, org_id, info.group_resource, rows, threshold
                );
                return Ok(Some(OrgOutcome::SkippedThreshold {
                    resource: info.group_resource.clone(),
                    rows,
                    threshold,
                }));
            }
        }
        Ok(None)
    }
}
