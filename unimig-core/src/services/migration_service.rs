use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::common::namespace::{namespace_for_org, parse_namespace};
use crate::database::migration_log::MigrationLog;
use crate::errors::{MigrationError, MigrationResult};
use crate::legacy::{LegacyRowSource, WriteEventBroadcaster};
use crate::locker::TableLocker;
use crate::registry::{GroupResource, MigrationDefinition, MigrationRegistry, ResourceMigrator};
use crate::services::migration_run::{BulkSink, MigrationRun, ProgressFn};
use crate::unified::{BulkResponse, BulkSettings, BulkStore, BulkSummary, StatsClient};

/// Options for one migration run of one organization
#[derive(Clone)]
pub struct MigrateOptions {
    pub namespace: String,
    pub resources: Vec<GroupResource>,
    pub with_history: bool,
    /// Report legacy counts only; the unified store is not touched
    pub only_count: bool,
    pub progress: Option<ProgressFn>,
}

impl MigrateOptions {
    pub fn new(namespace: impl Into<String>, resources: Vec<GroupResource>) -> Self {
        Self {
            namespace: namespace.into(),
            resources,
            with_history: false,
            only_count: false,
            progress: None,
        }
    }

    pub fn with_history(mut self, with_history: bool) -> Self {
        self.with_history = with_history;
        self
    }

    pub fn count_only(mut self) -> Self {
        self.only_count = true;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// One resource of a run, resolved before anything is locked
struct Step {
    order: (usize, usize),
    group_resource: GroupResource,
    migrator: Arc<dyn ResourceMigrator>,
    definition: Arc<MigrationDefinition>,
}

/// Migrates one organization: lock, stream, validate, record, unlock.
pub struct MigrationService {
    registry: Arc<MigrationRegistry>,
    source: LegacyRowSource,
    locker: Arc<dyn TableLocker>,
    bulk_store: Arc<dyn BulkStore>,
    stats: Arc<dyn StatsClient>,
    migration_log: Arc<dyn MigrationLog>,
    broadcaster: Option<WriteEventBroadcaster>,
}

impl MigrationService {
    pub fn new(
        registry: Arc<MigrationRegistry>,
        source: LegacyRowSource,
        locker: Arc<dyn TableLocker>,
        bulk_store: Arc<dyn BulkStore>,
        stats: Arc<dyn StatsClient>,
        migration_log: Arc<dyn MigrationLog>,
    ) -> Self {
        Self {
            registry,
            source,
            locker,
            bulk_store,
            stats,
            migration_log,
            broadcaster: None,
        }
    }

    /// Mirrors every streamed write to the broadcaster's subscribers
    pub fn with_broadcaster(mut self, broadcaster: WriteEventBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn registry(&self) -> &Arc<MigrationRegistry> {
        &self.registry
    }

    pub fn source(&self) -> &LegacyRowSource {
        &self.source
    }

    pub fn migration_log(&self) -> &Arc<dyn MigrationLog> {
        &self.migration_log
    }

    #[instrument(skip_all, fields(namespace = %options.namespace))]
    pub async fn migrate(
        &self,
        options: MigrateOptions,
        cancel: &CancellationToken,
    ) -> MigrationResult<BulkResponse> {
        let org_id = parse_namespace(&options.namespace)?;
        if options.resources.is_empty() {
            return Err(MigrationError::NoResources);
        }
        if options.only_count {
            return self.count_only(org_id, &options, cancel).await;
        }

        let plan = self.plan(&options.resources)?;
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        let lock_tables: Vec<String> = plan
            .iter()
            .flat_map(|step| step.definition.lock_tables_for(&step.group_resource).to_vec())
            .collect();
        let lock = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
            lock = self.locker.lock_migration_tables(&lock_tables) => lock?,
        };

        let result = self.run_locked(org_id, &options, &plan, cancel).await;

        match (result, lock.release().await) {
            (Ok(response), Ok(())) => Ok(response),
            (Ok(_), Err(unlock)) => Err(unlock),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unlock)) => {
                warn!("failed to release table locks after error: {}", unlock);
                Err(err)
            }
        }
    }

    /// Migrates every resource of a definition for one organization
    pub async fn migrate_definition(
        &self,
        definition: &MigrationDefinition,
        org_id: i64,
        with_history: bool,
        cancel: &CancellationToken,
    ) -> MigrationResult<BulkResponse> {
        let options = MigrateOptions::new(namespace_for_org(org_id), definition.group_resources())
            .with_history(with_history);
        self.migrate(options, cancel).await
    }

    /// Resolves migrators and sorts the resources into declaration order.
    /// Fails on the first resource nothing is registered for.
    fn plan(&self, resources: &[GroupResource]) -> MigrationResult<Vec<Step>> {
        let mut plan = Vec::with_capacity(resources.len());
        for group_resource in resources {
            let unsupported = || MigrationError::UnsupportedResource(group_resource.clone());
            let migrator = self.registry.get_migrator(group_resource).ok_or_else(unsupported)?;
            let definition = self
                .registry
                .definition_for(group_resource)
                .ok_or_else(unsupported)?;
            let order = self
                .registry
                .declaration_order(group_resource)
                .ok_or_else(unsupported)?;

            plan.push(Step {
                order,
                group_resource: group_resource.clone(),
                migrator,
                definition,
            });
        }

        plan.sort_by_key(|step| step.order);
        plan.dedup_by(|a, b| a.group_resource == b.group_resource);
        Ok(plan)
    }

    async fn run_locked(
        &self,
        org_id: i64,
        options: &MigrateOptions,
        plan: &[Step],
        cancel: &CancellationToken,
    ) -> MigrationResult<BulkResponse> {
        let settings = BulkSettings {
            namespace: options.namespace.clone(),
            rebuild_collections: plan.iter().map(|step| step.group_resource.clone()).collect(),
            skip_validation: false,
        };
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
            stream = self.bulk_store.open_bulk(settings) => stream?,
        };
        let mut sink = BulkSink::new(stream, self.broadcaster.clone(), cancel.clone());

        let run = MigrationRun {
            org_id,
            namespace: &options.namespace,
            with_history: options.with_history,
            source: &self.source,
            cancel,
            progress: options.progress.as_ref(),
        };

        for step in plan {
            info!("migrating {} for {}", step.group_resource, options.namespace);
            let before = sink.sent();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
                outcome = step.migrator.migrate(&run, &mut sink) => outcome?,
            }
            debug!(
                "{} sent {} writes for {}",
                step.group_resource,
                sink.sent() - before,
                options.namespace
            );
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
            response = sink.close() => response?,
        };
        info!(
            "bulk stream for {} closed: {} processed, {} rejected",
            options.namespace,
            response.processed,
            response.rejected.len()
        );

        let definitions = distinct_definitions(plan);
        for definition in &definitions {
            for factory in &definition.validators {
                let validator = factory(self.stats.clone());
                debug!("running validator {}", validator.name());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
                    checked = validator.validate(self.source.connection(), &response) => checked?,
                }
            }
        }

        for definition in &definitions {
            let covered = definition
                .resources
                .iter()
                .all(|info| plan.iter().any(|step| step.group_resource == info.group_resource));
            if covered {
                self.migration_log
                    .record(&definition.migration_id, org_id)
                    .await
                    .map_err(MigrationError::MigrationLog)?;
            } else {
                debug!(
                    "{} only partially migrated for {}, not recording",
                    definition.id, options.namespace
                );
            }
        }

        Ok(response)
    }

    async fn count_only(
        &self,
        org_id: i64,
        options: &MigrateOptions,
        cancel: &CancellationToken,
    ) -> MigrationResult<BulkResponse> {
        let mut response = BulkResponse::default();
        for group_resource in &options.resources {
            if !self.registry.has_resource(group_resource) {
                return Err(MigrationError::UnsupportedResource(group_resource.clone()));
            }
            let count = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
                count = self.source.count(group_resource, org_id) => count?,
            };
            response.summary.push(BulkSummary {
                namespace: options.namespace.clone(),
                group: group_resource.group().to_string(),
                resource: group_resource.resource().to_string(),
                count,
                history: false,
            });
        }
        Ok(response)
    }
}

fn distinct_definitions(plan: &[Step]) -> Vec<Arc<MigrationDefinition>> {
    let mut definitions: Vec<Arc<MigrationDefinition>> = Vec::new();
    for step in plan {
        if !definitions.iter().any(|seen| seen.id == step.definition.id) {
            definitions.push(step.definition.clone());
        }
    }
    definitions
}
