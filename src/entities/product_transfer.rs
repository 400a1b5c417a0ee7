use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TransferStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// A stock transfer order.
///
/// When `station_from == station_to`, `product_to` names the product that
/// receives the stock; otherwise it is `None` and `product_id` moves unchanged.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub station_from: i32,
    pub station_to: i32,
    pub product_id: i32,
    pub product_to: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub transfer_quantity: Decimal,
    pub status: TransferStatus,
    pub remarks: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::filling_history::Entity")]
    FillingHistory,
}

impl Related<super::filling_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FillingHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
