use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_master_data_tables::Migration),
            Box::new(m20250301_000002_create_purchase_tables::Migration),
            Box::new(m20250301_000003_create_livestock_tables::Migration),
            Box::new(m20250301_000004_create_companies_table::Migration),
            Box::new(m20250301_000005_create_audit_trails_table::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_master_data_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_master_data_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // partners: customers, suppliers and expeditions in one table
            manager
                .create_table(
                    Table::create()
                        .table(Partners::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Partners::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Partners::Name).string().not_null())
                        .col(ColumnDef::new(Partners::PartnerType).string().not_null())
                        .col(ColumnDef::new(Partners::Email).string().null())
                        .col(ColumnDef::new(Partners::Phone).string().null())
                        .col(ColumnDef::new(Partners::Address).string().null())
                        .col(ColumnDef::new(Partners::Status).string().not_null())
                        .col(ColumnDef::new(Partners::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Partners::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_partners_type")
                        .table(Partners::Table)
                        .col(Partners::PartnerType)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Farms::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Farms::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Farms::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Farms::Name).string().not_null())
                        .col(ColumnDef::new(Farms::Address).string().null())
                        .col(ColumnDef::new(Farms::Status).string().not_null())
                        .col(ColumnDef::new(Farms::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Farms::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Coops::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Coops::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Coops::FarmId).uuid().not_null())
                        .col(ColumnDef::new(Coops::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Coops::Name).string().not_null())
                        .col(ColumnDef::new(Coops::Capacity).integer().not_null())
                        .col(
                            ColumnDef::new(Coops::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Coops::Weight)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Coops::Status).string().not_null())
                        .col(ColumnDef::new(Coops::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Coops::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_coops_farm_id")
                        .table(Coops::Table)
                        .col(Coops::FarmId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LivestockStrains::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LivestockStrains::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockStrains::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(LivestockStrains::Name).string().not_null())
                        .col(ColumnDef::new(LivestockStrains::Description).string().null())
                        .col(
                            ColumnDef::new(LivestockStrains::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockStrains::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LivestockStrains::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Coops::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Farms::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Partners::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Partners {
        Table,
        Id,
        Name,
        PartnerType,
        Email,
        Phone,
        Address,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Farms {
        Table,
        Id,
        Code,
        Name,
        Address,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Coops {
        Table,
        Id,
        FarmId,
        Code,
        Name,
        Capacity,
        Quantity,
        Weight,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum LivestockStrains {
        Table,
        Id,
        Code,
        Name,
        Description,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_purchase_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(LivestockPurchases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LivestockPurchases::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchases::InvoiceNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchases::PurchaseDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchases::SupplierId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockPurchases::ExpeditionId).uuid().null())
                        .col(ColumnDef::new(LivestockPurchases::FarmId).uuid().not_null())
                        .col(ColumnDef::new(LivestockPurchases::CoopId).uuid().not_null())
                        .col(ColumnDef::new(LivestockPurchases::Status).string().not_null())
                        .col(ColumnDef::new(LivestockPurchases::Notes).string().null())
                        .col(ColumnDef::new(LivestockPurchases::Data).json().null())
                        .col(
                            ColumnDef::new(LivestockPurchases::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchases::UpdatedAt)
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
                        .name("idx_livestock_purchases_status")
                        .table(LivestockPurchases::Table)
                        .col(LivestockPurchases::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_livestock_purchases_farm_coop")
                        .table(LivestockPurchases::Table)
                        .col(LivestockPurchases::FarmId)
                        .col(LivestockPurchases::CoopId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LivestockPurchaseItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::PurchaseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::StrainId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::PricePerUnit)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::PriceTotal)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::WeightPerUnit)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::WeightTotal)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockPurchaseItems::Data).json().null())
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockPurchaseItems::UpdatedAt)
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
                        .name("idx_livestock_purchase_items_purchase_id")
                        .table(LivestockPurchaseItems::Table)
                        .col(LivestockPurchaseItems::PurchaseId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LivestockPurchaseItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(LivestockPurchases::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum LivestockPurchases {
        Table,
        Id,
        InvoiceNumber,
        PurchaseDate,
        SupplierId,
        ExpeditionId,
        FarmId,
        CoopId,
        Status,
        Notes,
        Data,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum LivestockPurchaseItems {
        Table,
        Id,
        PurchaseId,
        StrainId,
        Quantity,
        PricePerUnit,
        PriceTotal,
        WeightPerUnit,
        WeightTotal,
        Data,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000003_create_livestock_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_livestock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Livestocks::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Livestocks::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Livestocks::FarmId).uuid().not_null())
                        .col(ColumnDef::new(Livestocks::CoopId).uuid().not_null())
                        .col(ColumnDef::new(Livestocks::Name).string().not_null())
                        .col(ColumnDef::new(Livestocks::StartDate).date().not_null())
                        .col(
                            ColumnDef::new(Livestocks::InitialQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Livestocks::InitialWeight)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Livestocks::PricePerUnit)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Livestocks::QuantityDepletion)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Livestocks::QuantitySales)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Livestocks::QuantityMutated)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Livestocks::Status).string().not_null())
                        .col(ColumnDef::new(Livestocks::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Livestocks::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_livestocks_farm_coop")
                        .table(Livestocks::Table)
                        .col(Livestocks::FarmId)
                        .col(Livestocks::CoopId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(LivestockBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LivestockBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockBatches::PurchaseId).uuid().not_null())
                        .col(
                            ColumnDef::new(LivestockBatches::PurchaseItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockBatches::LivestockId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockBatches::FarmId).uuid().not_null())
                        .col(ColumnDef::new(LivestockBatches::CoopId).uuid().not_null())
                        .col(ColumnDef::new(LivestockBatches::StrainId).uuid().not_null())
                        .col(ColumnDef::new(LivestockBatches::Name).string().not_null())
                        .col(
                            ColumnDef::new(LivestockBatches::InitialQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockBatches::InitialWeight)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(LivestockBatches::PricePerUnit)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockBatches::Status).string().not_null())
                        .col(ColumnDef::new(LivestockBatches::StartDate).date().not_null())
                        .col(
                            ColumnDef::new(LivestockBatches::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(LivestockBatches::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_livestock_batches_purchase_id")
                        .table(LivestockBatches::Table)
                        .col(LivestockBatches::PurchaseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_livestock_batches_livestock_id")
                        .table(LivestockBatches::Table)
                        .col(LivestockBatches::LivestockId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CurrentLivestocks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CurrentLivestocks::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CurrentLivestocks::LivestockId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(CurrentLivestocks::FarmId).uuid().not_null())
                        .col(ColumnDef::new(CurrentLivestocks::CoopId).uuid().not_null())
                        .col(
                            ColumnDef::new(CurrentLivestocks::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CurrentLivestocks::WeightTotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CurrentLivestocks::AvgWeight)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(CurrentLivestocks::Status).string().not_null())
                        .col(
                            ColumnDef::new(CurrentLivestocks::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CurrentLivestocks::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CurrentLivestocks::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(LivestockBatches::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Livestocks::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Livestocks {
        Table,
        Id,
        FarmId,
        CoopId,
        Name,
        StartDate,
        InitialQuantity,
        InitialWeight,
        PricePerUnit,
        QuantityDepletion,
        QuantitySales,
        QuantityMutated,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum LivestockBatches {
        Table,
        Id,
        PurchaseId,
        PurchaseItemId,
        LivestockId,
        FarmId,
        CoopId,
        StrainId,
        Name,
        InitialQuantity,
        InitialWeight,
        PricePerUnit,
        Status,
        StartDate,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum CurrentLivestocks {
        Table,
        Id,
        LivestockId,
        FarmId,
        CoopId,
        Quantity,
        WeightTotal,
        AvgWeight,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000004_create_companies_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_companies_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Companies::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Companies::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Companies::Name).string().not_null())
                        .col(ColumnDef::new(Companies::Config).json().null())
                        .col(ColumnDef::new(Companies::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Companies::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Companies::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Companies {
        Table,
        Id,
        Name,
        Config,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000005_create_audit_trails_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000005_create_audit_trails_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditTrails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditTrails::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditTrails::EntityType).string().not_null())
                        .col(ColumnDef::new(AuditTrails::EntityId).uuid().not_null())
                        .col(ColumnDef::new(AuditTrails::Action).string().not_null())
                        .col(ColumnDef::new(AuditTrails::Before).json().null())
                        .col(ColumnDef::new(AuditTrails::After).json().null())
                        .col(ColumnDef::new(AuditTrails::RecordedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_trails_entity")
                        .table(AuditTrails::Table)
                        .col(AuditTrails::EntityType)
                        .col(AuditTrails::EntityId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditTrails::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum AuditTrails {
        Table,
        Id,
        EntityType,
        EntityId,
        Action,
        Before,
        After,
        RecordedAt,
    }
}
