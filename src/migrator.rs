use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_inventory_tables::Migration),
            Box::new(m20240101_000003_create_sales_tables::Migration),
            Box::new(m20240101_000004_create_returns_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::StoreId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::Sku).string().not_null())
                        .col(ColumnDef::new(ProductVariants::Name).string().not_null())
                        .col(
                            ColumnDef::new(ProductVariants::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ProductVariants::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_variants_store_id")
                        .table(ProductVariants::Table)
                        .col(ProductVariants::StoreId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum ProductVariants {
        Table,
        Id,
        ProductId,
        StoreId,
        Sku,
        Name,
        Price,
        Active,
        CreatedAt,
    }
}

mod m20240101_000002_create_inventory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryRecords::StoreId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryRecords::VariantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::Reserved)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::LowStockThreshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecords::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One record per (store, variant)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_inventory_records_store_variant")
                        .table(InventoryRecords::Table)
                        .col(InventoryRecords::StoreId)
                        .col(InventoryRecords::VariantId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryLogEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryLogEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::InventoryId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::IdempotencyKey)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::Change)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::EntryType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryLogEntries::Reason).string().null())
                        .col(
                            ColumnDef::new(InventoryLogEntries::Reference)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(InventoryLogEntries::Actor).string().null())
                        .col(
                            ColumnDef::new(InventoryLogEntries::PreviousQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::NewQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::AlertCreated)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(InventoryLogEntries::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Replay detection: at most one ledger entry per idempotency key
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_inventory_log_entries_idempotency_key")
                        .table(InventoryLogEntries::Table)
                        .col(InventoryLogEntries::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_log_entries_inventory_id")
                        .table(InventoryLogEntries::Table)
                        .col(InventoryLogEntries::InventoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockAlerts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAlerts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAlerts::InventoryId).uuid().not_null())
                        .col(ColumnDef::new(StockAlerts::Threshold).integer().not_null())
                        .col(
                            ColumnDef::new(StockAlerts::QuantityAtTrigger)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAlerts::Status).string().not_null())
                        .col(
                            ColumnDef::new(StockAlerts::TriggeredAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAlerts::AcknowledgedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_alerts_inventory_id_status")
                        .table(StockAlerts::Table)
                        .col(StockAlerts::InventoryId)
                        .col(StockAlerts::Status)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAlerts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryLogEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryRecords::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum InventoryRecords {
        Table,
        Id,
        StoreId,
        VariantId,
        Quantity,
        Reserved,
        LowStockThreshold,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum InventoryLogEntries {
        Table,
        Id,
        InventoryId,
        IdempotencyKey,
        Change,
        EntryType,
        Reason,
        Reference,
        Actor,
        PreviousQuantity,
        NewQuantity,
        AlertCreated,
        CreatedAt,
    }

    #[derive(Iden)]
    enum StockAlerts {
        Table,
        Id,
        InventoryId,
        Threshold,
        QuantityAtTrigger,
        Status,
        TriggeredAt,
        AcknowledgedAt,
    }
}

mod m20240101_000003_create_sales_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Sales::BusinessId).uuid().not_null())
                        .col(ColumnDef::new(Sales::SaleCode).string().not_null())
                        .col(ColumnDef::new(Sales::IdempotencyKey).string().not_null())
                        .col(
                            ColumnDef::new(Sales::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::TotalDiscount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::NetAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Sales::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Sales::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Sales::CustomerName).string().null())
                        .col(ColumnDef::new(Sales::CustomerEmail).string().null())
                        .col(ColumnDef::new(Sales::CustomerPhone).string().null())
                        .col(ColumnDef::new(Sales::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Sales::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_sales_sale_code")
                        .table(Sales::Table)
                        .col(Sales::SaleCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // Sale-level replay detection
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_sales_idempotency_key")
                        .table(Sales::Table)
                        .col(Sales::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sales_store_id")
                        .table(Sales::Table)
                        .col(Sales::StoreId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleItems::SaleId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::VariantId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(SaleItems::UnitPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(SaleItems::Discount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SaleItems::LineTotal).decimal().not_null())
                        .col(ColumnDef::new(SaleItems::Status).string().not_null())
                        .col(ColumnDef::new(SaleItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_items_sale_id")
                        .table(SaleItems::Table)
                        .col(SaleItems::SaleId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Sales {
        Table,
        Id,
        StoreId,
        BusinessId,
        SaleCode,
        IdempotencyKey,
        TotalAmount,
        TotalDiscount,
        NetAmount,
        PaymentMethod,
        PaymentStatus,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum SaleItems {
        Table,
        Id,
        SaleId,
        VariantId,
        Quantity,
        UnitPrice,
        Discount,
        LineTotal,
        Status,
        CreatedAt,
    }
}

mod m20240101_000004_create_returns_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_returns_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Returns::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Returns::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Returns::SaleId).uuid().not_null())
                        .col(ColumnDef::new(Returns::SaleItemId).uuid().not_null())
                        .col(ColumnDef::new(Returns::StoreId).uuid().not_null())
                        .col(ColumnDef::new(Returns::Reason).string().not_null())
                        .col(ColumnDef::new(Returns::Resolution).string().not_null())
                        .col(ColumnDef::new(Returns::Condition).string().not_null())
                        .col(ColumnDef::new(Returns::Status).string().not_null())
                        .col(ColumnDef::new(Returns::Quantity).integer().not_null())
                        .col(ColumnDef::new(Returns::StaffId).uuid().null())
                        .col(ColumnDef::new(Returns::ManagerId).uuid().null())
                        .col(ColumnDef::new(Returns::Notes).string().null())
                        .col(ColumnDef::new(Returns::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Returns::ReviewedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_returns_sale_id")
                        .table(Returns::Table)
                        .col(Returns::SaleId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_returns_status")
                        .table(Returns::Table)
                        .col(Returns::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Refunds::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Refunds::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Refunds::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(Refunds::Amount).decimal().not_null())
                        .col(ColumnDef::new(Refunds::Method).string().not_null())
                        .col(ColumnDef::new(Refunds::Status).string().not_null())
                        .col(ColumnDef::new(Refunds::ProcessedAt).timestamp().null())
                        .col(ColumnDef::new(Refunds::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_refunds_return_id")
                        .table(Refunds::Table)
                        .col(Refunds::ReturnId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Exchanges::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Exchanges::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Exchanges::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(Exchanges::NewVariantId).uuid().not_null())
                        .col(
                            ColumnDef::new(Exchanges::PriceDifference)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Exchanges::Status).string().not_null())
                        .col(ColumnDef::new(Exchanges::CompletedAt).timestamp().null())
                        .col(ColumnDef::new(Exchanges::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_exchanges_return_id")
                        .table(Exchanges::Table)
                        .col(Exchanges::ReturnId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StoreCredits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StoreCredits::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StoreCredits::ReturnId).uuid().not_null())
                        .col(
                            ColumnDef::new(StoreCredits::Amount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StoreCredits::UsedAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StoreCredits::Status).string().not_null())
                        .col(
                            ColumnDef::new(StoreCredits::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StoreCredits::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_store_credits_return_id")
                        .table(StoreCredits::Table)
                        .col(StoreCredits::ReturnId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StoreCredits::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Exchanges::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Refunds::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Returns::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Returns {
        Table,
        Id,
        SaleId,
        SaleItemId,
        StoreId,
        Reason,
        Resolution,
        Condition,
        Status,
        Quantity,
        StaffId,
        ManagerId,
        Notes,
        CreatedAt,
        ReviewedAt,
    }

    #[derive(Iden)]
    enum Refunds {
        Table,
        Id,
        ReturnId,
        Amount,
        Method,
        Status,
        ProcessedAt,
        CreatedAt,
    }

    #[derive(Iden)]
    enum Exchanges {
        Table,
        Id,
        ReturnId,
        NewVariantId,
        PriceDifference,
        Status,
        CompletedAt,
        CreatedAt,
    }

    #[derive(Iden)]
    enum StoreCredits {
        Table,
        Id,
        ReturnId,
        Amount,
        UsedAmount,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}
