use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::{debug, info, warn};

use crate::common::namespace::parse_namespace;
use crate::errors::{MigrationError, MigrationResult};
use crate::registry::{GroupResource, Validator, ValidatorFactory};
use crate::unified::{BulkResponse, StatsClient};

/// Rejections logged individually before the rest are summarized
const LOGGED_REJECTIONS: usize = 10;

/// Legacy table a resource is counted in, plus an optional extra SQL condition
/// ANDed with the organization filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountQuery {
    pub table: &'static str,
    pub predicate: Option<&'static str>,
}

impl CountQuery {
    pub const fn table(table: &'static str) -> Self {
        Self {
            table,
            predicate: None,
        }
    }

    pub const fn filtered(table: &'static str, predicate: &'static str) -> Self {
        Self {
            table,
            predicate: Some(predicate),
        }
    }

    fn statement(&self, backend: DbBackend, org_id: i64) -> Statement {
        let placeholder = match backend {
            DbBackend::Postgres => "$1",
            _ => "?",
        };
        let sql = match self.predicate {
            Some(predicate) => format!(
                "SELECT COUNT(*) AS count FROM {table} WHERE org_id = {placeholder} AND ({predicate})",
                table = self.table,
                placeholder = placeholder,
                predicate = predicate,
            ),
            None => format!(
                "SELECT COUNT(*) AS count FROM {table} WHERE org_id = {placeholder}",
                table = self.table,
                placeholder = placeholder,
            ),
        };
        Statement::from_sql_and_values(backend, sql, [org_id.into()])
    }
}

#[derive(FromQueryResult)]
struct CountRow {
    count: i64,
}

/// Checks that every legacy row reached the unified store or was rejected:
/// passes when `legacy <= unified + rejected`.
pub struct CountValidator {
    name: String,
    queries: HashMap<GroupResource, CountQuery>,
    stats: Arc<dyn StatsClient>,
}

impl CountValidator {
    pub fn new(name: impl Into<String>, stats: Arc<dyn StatsClient>) -> Self {
        Self {
            name: name.into(),
            queries: HashMap::new(),
            stats,
        }
    }

    pub fn with_query(mut self, group_resource: GroupResource, query: CountQuery) -> Self {
        self.queries.insert(group_resource, query);
        self
    }

    pub fn factory(name: &'static str, queries: Vec<(GroupResource, CountQuery)>) -> ValidatorFactory {
        Arc::new(move |stats: Arc<dyn StatsClient>| {
            let validator = queries
                .iter()
                .cloned()
                .fold(CountValidator::new(name, stats), |validator, (gr, query)| {
                    validator.with_query(gr, query)
                });
            Box::new(validator) as Box<dyn Validator>
        })
    }

    async fn legacy_count(
        &self,
        legacy: &DatabaseConnection,
        query: &CountQuery,
        org_id: i64,
    ) -> MigrationResult<i64> {
        let statement = query.statement(legacy.get_database_backend(), org_id);
        let row = CountRow::find_by_statement(statement).one(legacy).await?;
        Ok(row.map(|row| row.count).unwrap_or(0))
    }

    async fn unified_count(&self, namespace: &str, group_resource: &GroupResource) -> MigrationResult<i64> {
        let stats = self
            .stats
            .get_stats(namespace, std::slice::from_ref(group_resource))
            .await?;
        Ok(stats
            .iter()
            .filter(|stat| {
                stat.group == group_resource.group() && stat.resource == group_resource.resource()
            })
            .map(|stat| stat.count)
            .sum())
    }
}

fn log_rejections(response: &BulkResponse) {
    for item in response.rejected.iter().take(LOGGED_REJECTIONS) {
        warn!(
            "rejected {:?} {}/{}.{}/{}: {}",
            item.action,
            item.key.namespace,
            item.key.resource,
            item.key.group,
            item.key.name,
            item.error
        );
    }
    if response.rejected.len() > LOGGED_REJECTIONS {
        warn!(
            "{} more rejected items not shown",
            response.rejected.len() - LOGGED_REJECTIONS
        );
    }
}

#[async_trait]
impl Validator for CountValidator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(
        &self,
        legacy: &DatabaseConnection,
        response: &BulkResponse,
    ) -> MigrationResult<()> {
        log_rejections(response);

        for summary in &response.summary {
            let group_resource = summary.group_resource();
            let Some(query) = self.queries.get(&group_resource) else {
                debug!("{}: no count query for {}, skipping", self.name, group_resource);
                continue;
            };

            let org_id = parse_namespace(&summary.namespace)?;
            let legacy_count = self.legacy_count(legacy, query, org_id).await?;
            let unified_count = self.unified_count(&summary.namespace, &group_resource).await?;
            let rejected = response.rejected_for(&group_resource, &summary.namespace);

            if legacy_count > unified_count + rejected {
                return Err(MigrationError::CountMismatch {
                    resource: group_resource.to_string(),
                    namespace: summary.namespace.clone(),
                    legacy: legacy_count,
                    unified: unified_count,
                    rejected,
                });
            }

            info!(
                "{}: {} in {} legacy={} unified={} rejected={}",
                self.name, group_resource, summary.namespace, legacy_count, unified_count, rejected
            );
        }

        Ok(())
    }
}
