use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A filling station (physical location that holds stock).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "filling_stations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub station_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::station_stock::Entity")]
    StationStock,
}

impl Related<super::station_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StationStock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
