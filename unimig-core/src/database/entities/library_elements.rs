use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind 1 rows are library panels
pub const KIND_PANEL: i64 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "library_element")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub org_id: i64,
    pub uid: String,
    pub folder_uid: Option<String>,
    pub name: String,
    pub kind: i64,
    #[sea_orm(column_name = "type")]
    pub panel_type: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub model: String, // panel JSON
    pub version: i64,
    pub created: DateTime,
    pub updated: DateTime,
    pub created_by: i64,
    pub updated_by: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
