use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unifiedstorage_migration_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub migration_id: String,
    pub org_id: i64,
    pub created: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn completed(migration_id: &str, org_id: i64) -> Self {
        Self {
            id: sea_orm::ActiveValue::NotSet,
            migration_id: Set(migration_id.to_string()),
            org_id: Set(org_id),
            created: Set(chrono::Utc::now()),
        }
    }
}
