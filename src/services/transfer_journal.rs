//! Append-only writer for `filling_history`.

use crate::entities::filling_history::{self, Entity as FillingHistoryEntity};
use crate::services::reconciliation::Movement;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

/// Context shared by every entry of one operation.
#[derive(Debug, Clone, Copy)]
pub struct JournalContext {
    pub transfer_id: i32,
    pub created_by: Option<i32>,
    pub occurred_at: DateTime<Utc>,
}

/// Appends one entry and returns its id.
pub async fn append<C: ConnectionTrait>(
    conn: &C,
    movement: &Movement,
    ctx: &JournalContext,
) -> Result<i32, DbErr> {
    let entry = filling_history::ActiveModel {
        fs_id: Set(movement.key.station_id),
        product_id: Set(movement.key.product_id),
        trans_type: Set(movement.direction),
        current_stock: Set(movement.stock_before),
        filling_qty: Set(movement.delta),
        available_stock: Set(movement.stock_after),
        filling_date: Set(ctx.occurred_at),
        created_by: Set(ctx.created_by),
        transfer_id: Set(Some(ctx.transfer_id)),
        reversal: Set(movement.reversal),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(entry.id)
}

pub async fn append_all<C: ConnectionTrait>(
    conn: &C,
    movements: &[Movement],
    ctx: &JournalContext,
) -> Result<Vec<i32>, DbErr> {
    let mut ids = Vec::with_capacity(movements.len());
    for movement in movements {
        ids.push(append(conn, movement, ctx).await?);
    }
    Ok(ids)
}

/// Entries written for one transfer, oldest first.
pub async fn for_transfer<C: ConnectionTrait>(
    conn: &C,
    transfer_id: i32,
) -> Result<Vec<filling_history::Model>, DbErr> {
    FillingHistoryEntity::find()
        .filter(filling_history::Column::TransferId.eq(transfer_id))
        .order_by_asc(filling_history::Column::Id)
        .all(conn)
        .await
}
