use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "form_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub form_type: String, // e.g. "account", "profile"
    pub field_type: String, // "file" for upload fields
    pub htmlvar_name: String,
    pub site_title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub extra_fields: Option<String>, // JSON, e.g. {"file_types":["pdf"]}
    pub is_active: bool,
    pub is_register_field: bool,
    pub is_register_only_field: bool,
    pub sort_order: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
