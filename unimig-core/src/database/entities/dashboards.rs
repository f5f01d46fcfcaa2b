use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dashboards and folders share this table; folders have `is_folder` set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dashboard")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub org_id: i64,
    pub uid: String,
    pub folder_uid: Option<String>,
    pub title: String,
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub data: String, // JSON document stored as text
    pub version: i64,
    pub is_folder: bool,
    pub created: DateTime,
    pub updated: DateTime,
    pub created_by: i64,
    pub updated_by: i64,
    /// Set when the dashboard sits in the trash
    pub deleted: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::dashboard_versions::Entity")]
    DashboardVersions,
}

impl Related<super::dashboard_versions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DashboardVersions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
