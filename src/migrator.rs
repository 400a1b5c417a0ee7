use sea_orm::DatabaseBackend;
use sea_orm_migration::prelude::*;

pub struct Migrator;

/// Quantity column, `DECIMAL(19,4)`. SQLite caps decimal precision at 16.
fn quantity_column<T: IntoIden>(manager: &SchemaManager, name: T) -> ColumnDef {
    let mut column = ColumnDef::new(name);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => column.decimal_len(16, 4),
        _ => column.decimal_len(19, 4),
    };
    column
}

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_reference_tables::Migration),
            Box::new(m20240301_000002_create_station_stocks_table::Migration),
            Box::new(m20240301_000003_create_product_transfers_table::Migration),
            Box::new(m20240301_000004_create_filling_history_table::Migration),
            Box::new(m20240301_000005_create_audit_logs_table::Migration),
        ]
    }
}

mod m20240301_000001_create_reference_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FillingStations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FillingStations::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(FillingStations::StationName)
                                .string()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Pname).string().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(FillingStations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FillingStations {
        Table,
        Id,
        StationName,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Pname,
    }
}

mod m20240301_000002_create_station_stocks_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_station_stocks_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FillingStationStocks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FillingStationStocks::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(FillingStationStocks::FsId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FillingStationStocks::Product)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            super::quantity_column(manager, FillingStationStocks::Stock)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(FillingStationStocks::Msg).string().null())
                        .col(ColumnDef::new(FillingStationStocks::Remark).string().null())
                        .col(
                            ColumnDef::new(FillingStationStocks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FillingStationStocks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One ledger row per (station, product)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_filling_station_stocks_station_product")
                        .table(FillingStationStocks::Table)
                        .col(FillingStationStocks::FsId)
                        .col(FillingStationStocks::Product)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FillingStationStocks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FillingStationStocks {
        Table,
        Id,
        FsId,
        Product,
        Stock,
        Msg,
        Remark,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_product_transfers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_product_transfers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductTransfers::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductTransfers::StationFrom)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTransfers::StationTo)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTransfers::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductTransfers::ProductTo).integer().null())
                        .col(
                            super::quantity_column(manager, ProductTransfers::TransferQuantity)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTransfers::Status)
                                .string_len(16)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(ProductTransfers::Remarks).string().null())
                        .col(ColumnDef::new(ProductTransfers::CreatedBy).integer().null())
                        .col(
                            ColumnDef::new(ProductTransfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTransfers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_transfers_status")
                        .table(ProductTransfers::Table)
                        .col(ProductTransfers::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_transfers_created_at")
                        .table(ProductTransfers::Table)
                        .col(ProductTransfers::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductTransfers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductTransfers {
        Table,
        Id,
        StationFrom,
        StationTo,
        ProductId,
        ProductTo,
        TransferQuantity,
        Status,
        Remarks,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_filling_history_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_filling_history_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FillingHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FillingHistory::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(FillingHistory::FsId).integer().not_null())
                        .col(
                            ColumnDef::new(FillingHistory::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FillingHistory::TransType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            super::quantity_column(manager, FillingHistory::CurrentStock)
                                .not_null(),
                        )
                        .col(
                            super::quantity_column(manager, FillingHistory::FillingQty)
                                .not_null(),
                        )
                        .col(
                            super::quantity_column(manager, FillingHistory::AvailableStock)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FillingHistory::FillingDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FillingHistory::CreatedBy).integer().null())
                        .col(ColumnDef::new(FillingHistory::TransferId).integer().null())
                        .col(
                            ColumnDef::new(FillingHistory::Reversal)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_filling_history_station_product")
                        .table(FillingHistory::Table)
                        .col(FillingHistory::FsId)
                        .col(FillingHistory::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_filling_history_transfer_id")
                        .table(FillingHistory::Table)
                        .col(FillingHistory::TransferId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FillingHistory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FillingHistory {
        Table,
        Id,
        FsId,
        ProductId,
        TransType,
        CurrentStock,
        FillingQty,
        AvailableStock,
        FillingDate,
        CreatedBy,
        TransferId,
        Reversal,
    }
}

mod m20240301_000005_create_audit_logs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditLogs::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(AuditLogs::Page).string().not_null())
                        .col(ColumnDef::new(AuditLogs::UniqueCode).string().null())
                        .col(ColumnDef::new(AuditLogs::Section).string().not_null())
                        .col(ColumnDef::new(AuditLogs::UserId).integer().null())
                        .col(ColumnDef::new(AuditLogs::UserName).string().null())
                        .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogs::Remarks).string().null())
                        .col(ColumnDef::new(AuditLogs::OldValue).text().null())
                        .col(ColumnDef::new(AuditLogs::NewValue).text().null())
                        .col(ColumnDef::new(AuditLogs::RecordType).string().not_null())
                        .col(ColumnDef::new(AuditLogs::RecordId).integer().null())
                        .col(
                            ColumnDef::new(AuditLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_record")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::RecordType)
                        .col(AuditLogs::RecordId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogs {
        Table,
        Id,
        Page,
        UniqueCode,
        Section,
        UserId,
        UserName,
        Action,
        Remarks,
        OldValue,
        NewValue,
        RecordType,
        RecordId,
        CreatedAt,
    }
}
