use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Direction of a ledger movement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TransType {
    #[sea_orm(string_value = "Inward")]
    Inward,
    #[sea_orm(string_value = "Outward")]
    Outward,
}

/// Append-only journal of stock movements.
///
/// `filling_qty` is signed: negative for `Outward`, positive for `Inward`,
/// and `available_stock == current_stock + filling_qty` always holds.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "filling_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub fs_id: i32,
    pub product_id: i32,
    pub trans_type: TransType,
    /// Stock before the movement.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub current_stock: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub filling_qty: Decimal,
    /// Stock after the movement.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub available_stock: Decimal,
    pub filling_date: DateTimeUtc,
    pub created_by: Option<i32>,
    pub transfer_id: Option<i32>,
    /// Set on the entries that undo a transfer's previous effect during an edit.
    pub reversal: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_transfer::Entity",
        from = "Column::TransferId",
        to = "super::product_transfer::Column::Id"
    )]
    ProductTransfer,
}

impl Related<super::product_transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductTransfer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
