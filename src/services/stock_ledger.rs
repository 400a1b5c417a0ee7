//! Stock ledger accessor over `filling_station_stocks`.
//!
//! Non-negativity is not enforced here; callers check through a
//! [`LedgerBook`] before writing.

use crate::entities::station_stock::{self, Entity as StationStockEntity};
use crate::services::reconciliation::{LedgerBook, LedgerKey, LevelChange};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Select, Set,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Note written to a ledger row alongside its new level.
#[derive(Debug, Clone, Default)]
pub struct Diagnostic {
    pub message: Option<String>,
    pub remark: Option<String>,
}

fn by_key(key: LedgerKey) -> Select<StationStockEntity> {
    StationStockEntity::find()
        .filter(station_stock::Column::FsId.eq(key.station_id))
        .filter(station_stock::Column::Product.eq(key.product_id))
}

/// Reads one ledger row without locking it.
pub async fn get<C: ConnectionTrait>(
    conn: &C,
    key: LedgerKey,
) -> Result<Option<station_stock::Model>, DbErr> {
    by_key(key).one(conn).await
}

/// Reads one ledger row and holds a row lock on it until the surrounding
/// transaction ends. SQLite has no row locks; there the transaction must
/// already hold the database write lock, see [`reserve_writer`].
pub async fn get_for_update<C: ConnectionTrait>(
    conn: &C,
    key: LedgerKey,
) -> Result<Option<station_stock::Model>, DbErr> {
    let query = by_key(key);
    match conn.get_database_backend() {
        DbBackend::Sqlite => query.one(conn).await,
        _ => query.lock_exclusive().one(conn).await,
    }
}

/// Takes the SQLite write lock up front so the transaction never has to
/// upgrade a read lock, which SQLite refuses under contention. Waits on
/// the connection's busy timeout. No-op on other backends.
pub async fn reserve_writer<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    if conn.get_database_backend() != DbBackend::Sqlite {
        return Ok(());
    }
    StationStockEntity::update_many()
        .col_expr(
            station_stock::Column::Stock,
            Expr::col(station_stock::Column::Stock).into(),
        )
        .filter(Expr::val(1).eq(0))
        .exec(conn)
        .await?;
    Ok(())
}

/// Inserts an empty row for `key` unless one exists, so that there is a row
/// to lock. Returns whether a row was inserted.
pub async fn ensure_row<C: ConnectionTrait>(conn: &C, key: LedgerKey) -> Result<bool, DbErr> {
    let now = Utc::now();
    let inserted = StationStockEntity::insert(station_stock::ActiveModel {
        fs_id: Set(key.station_id),
        product: Set(key.product_id),
        stock: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([station_stock::Column::FsId, station_stock::Column::Product])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    Ok(inserted > 0)
}

/// Locks every row in `keys` in ascending key order and loads them into a
/// fresh [`LedgerBook`]. Rows listed in `create_missing` are inserted empty
/// first when absent; other missing rows are loaded as absent.
pub async fn lock_keys<C, I>(
    conn: &C,
    keys: I,
    create_missing: &[LedgerKey],
) -> Result<LedgerBook, DbErr>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = LedgerKey>,
{
    let ordered: BTreeSet<LedgerKey> = keys
        .into_iter()
        .chain(create_missing.iter().copied())
        .collect();
    let mut book = LedgerBook::new();
    for key in ordered {
        if create_missing.contains(&key) && ensure_row(conn, key).await? {
            debug!(%key, "created empty ledger row");
        }
        let row = get_for_update(conn, key).await?;
        debug!(%key, stock = ?row.as_ref().map(|r| r.stock), "locked ledger row");
        book.load(key, row.map(|r| r.stock));
    }
    Ok(book)
}

/// Writes `quantity` to the row for `key`, inserting it when it does not exist.
pub async fn upsert<C: ConnectionTrait>(
    conn: &C,
    key: LedgerKey,
    quantity: Decimal,
    diagnostic: &Diagnostic,
) -> Result<(), DbErr> {
    let now = Utc::now();
    let updated = StationStockEntity::update_many()
        .col_expr(station_stock::Column::Stock, Expr::value(quantity))
        .col_expr(
            station_stock::Column::Msg,
            Expr::value(diagnostic.message.clone()),
        )
        .col_expr(
            station_stock::Column::Remark,
            Expr::value(diagnostic.remark.clone()),
        )
        .col_expr(station_stock::Column::UpdatedAt, Expr::value(now))
        .filter(station_stock::Column::FsId.eq(key.station_id))
        .filter(station_stock::Column::Product.eq(key.product_id))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        station_stock::ActiveModel {
            fs_id: Set(key.station_id),
            product: Set(key.product_id),
            stock: Set(quantity),
            msg: Set(diagnostic.message.clone()),
            remark: Set(diagnostic.remark.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }

    Ok(())
}

/// Persists every changed level of `book`.
pub async fn write_changes<C: ConnectionTrait>(
    conn: &C,
    changes: &[LevelChange],
    diagnostic: &Diagnostic,
) -> Result<(), DbErr> {
    for change in changes {
        debug!(
            key = %change.key,
            stock = %change.stock,
            insert = !change.existed,
            "writing ledger level"
        );
        upsert(conn, change.key, change.stock, diagnostic).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use rust_decimal_macros::dec;
    use sea_orm::TransactionTrait;

    async fn memory_db() -> sea_orm::DatabaseConnection {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let db = memory_db().await;
        let key = LedgerKey::new(1, 2);
        let note = Diagnostic {
            message: Some("opening balance".into()),
            remark: None,
        };

        assert!(get(&db, key).await.unwrap().is_none());
        upsert(&db, key, dec!(40), &note).await.unwrap();
        upsert(&db, key, dec!(55.5), &note).await.unwrap();

        let row = get(&db, key).await.unwrap().unwrap();
        assert_eq!(row.stock, dec!(55.5));
        assert_eq!(row.msg.as_deref(), Some("opening balance"));
        assert_eq!(StationStockEntity::find().all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lock_keys_loads_present_and_absent_rows() {
        let db = memory_db().await;
        upsert(&db, LedgerKey::new(1, 1), dec!(100), &Diagnostic::default())
            .await
            .unwrap();

        let txn = db.begin().await.unwrap();
        let book = lock_keys(&txn, [LedgerKey::new(2, 1), LedgerKey::new(1, 1)], &[])
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(book.stock(LedgerKey::new(1, 1)), Some(dec!(100)));
        assert_eq!(book.stock(LedgerKey::new(2, 1)), None);
    }

    #[tokio::test]
    async fn lock_keys_creates_requested_rows_once() {
        let db = memory_db().await;
        let source = LedgerKey::new(1, 1);
        let destination = LedgerKey::new(3, 1);
        upsert(&db, source, dec!(100), &Diagnostic::default())
            .await
            .unwrap();

        let txn = db.begin().await.unwrap();
        reserve_writer(&txn).await.unwrap();
        let book = lock_keys(&txn, [source], &[destination]).await.unwrap();
        assert!(!ensure_row(&txn, destination).await.unwrap());
        txn.commit().await.unwrap();

        assert_eq!(book.stock(source), Some(dec!(100)));
        assert_eq!(book.stock(destination), Some(dec!(0)));
        assert_eq!(get(&db, destination).await.unwrap().unwrap().stock, dec!(0));
        assert!(!ensure_row(&db, source).await.unwrap());
        assert_eq!(StationStockEntity::find().all(&db).await.unwrap().len(), 2);
    }
}
