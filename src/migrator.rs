use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_orders_received_table::Migration),
            Box::new(m20250601_000002_create_orders_placed_table::Migration),
            Box::new(m20250601_000003_create_fulfillment_links_table::Migration),
        ]
    }
}

mod m20250601_000001_create_orders_received_table {

    use crate::validation::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250601_000001_create_orders_received_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::order_received Model
            manager
                .create_table(
                    Table::create()
                        .table(OrdersReceived::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrdersReceived::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrdersReceived::OwnerId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrdersReceived::OrderNumber)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrdersReceived::CustomerName).string().not_null())
                        .col(ColumnDef::new(OrdersReceived::ItemName).string().not_null())
                        .col(ColumnDef::new(OrdersReceived::Sku).string().null())
                        .col(
                            ColumnDef::new(OrdersReceived::OrderedQuantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrdersReceived::Unit)
                                .string()
                                .not_null()
                                .default("mtrs"),
                        )
                        .col(
                            ColumnDef::new(OrdersReceived::Rate)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(ColumnDef::new(OrdersReceived::Notes).text().null())
                        .col(ColumnDef::new(OrdersReceived::CustomFields).json().null())
                        .col(
                            ColumnDef::new(OrdersReceived::DispatchedQuantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrdersReceived::Status)
                                .string_len(16)
                                .not_null()
                                .default("confirmed"),
                        )
                        .col(
                            ColumnDef::new(OrdersReceived::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrdersReceived::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_received_owner_number")
                        .table(OrdersReceived::Table)
                        .col(OrdersReceived::OwnerId)
                        .col(OrdersReceived::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrdersReceived::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum OrdersReceived {
        Table,
        Id,
        OwnerId,
        OrderNumber,
        CustomerName,
        ItemName,
        Sku,
        OrderedQuantity,
        Unit,
        Rate,
        Notes,
        CustomFields,
        DispatchedQuantity,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250601_000002_create_orders_placed_table {

    use crate::validation::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250601_000002_create_orders_placed_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::order_placed Model
            manager
                .create_table(
                    Table::create()
                        .table(OrdersPlaced::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrdersPlaced::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrdersPlaced::OwnerId).uuid().not_null())
                        .col(
                            ColumnDef::new(OrdersPlaced::OrderNumber)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrdersPlaced::PartyName).string().not_null())
                        .col(ColumnDef::new(OrdersPlaced::ItemName).string().not_null())
                        .col(ColumnDef::new(OrdersPlaced::Sku).string().null())
                        .col(
                            ColumnDef::new(OrdersPlaced::OrderedQuantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrdersPlaced::ReceivedQuantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrdersPlaced::Unit)
                                .string()
                                .not_null()
                                .default("mtrs"),
                        )
                        .col(
                            ColumnDef::new(OrdersPlaced::Rate)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .null(),
                        )
                        .col(ColumnDef::new(OrdersPlaced::Notes).text().null())
                        .col(ColumnDef::new(OrdersPlaced::CustomFields).json().null())
                        .col(
                            ColumnDef::new(OrdersPlaced::RemainingQuantity)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrdersPlaced::Status)
                                .string_len(16)
                                .not_null()
                                .default("confirmed"),
                        )
                        .col(
                            ColumnDef::new(OrdersPlaced::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrdersPlaced::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_placed_owner_number")
                        .table(OrdersPlaced::Table)
                        .col(OrdersPlaced::OwnerId)
                        .col(OrdersPlaced::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrdersPlaced::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(crate) enum OrdersPlaced {
        Table,
        Id,
        OwnerId,
        OrderNumber,
        PartyName,
        ItemName,
        Sku,
        OrderedQuantity,
        ReceivedQuantity,
        Unit,
        Rate,
        Notes,
        CustomFields,
        RemainingQuantity,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250601_000003_create_fulfillment_links_table {

    use super::m20250601_000001_create_orders_received_table::OrdersReceived;
    use super::m20250601_000002_create_orders_placed_table::OrdersPlaced;
    use crate::validation::{QUANTITY_PRECISION, QUANTITY_SCALE};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250601_000003_create_fulfillment_links_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Links restrict deletion of the orders they reference.
            manager
                .create_table(
                    Table::create()
                        .table(OrderFulfillmentLinks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderFulfillmentLinks::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderFulfillmentLinks::OwnerId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderFulfillmentLinks::OrderReceivedId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderFulfillmentLinks::OrderPlacedId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderFulfillmentLinks::QuantityFulfilled)
                                .decimal_len(QUANTITY_PRECISION, QUANTITY_SCALE)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderFulfillmentLinks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fulfillment_links_order_received_id")
                                .from(
                                    OrderFulfillmentLinks::Table,
                                    OrderFulfillmentLinks::OrderReceivedId,
                                )
                                .to(OrdersReceived::Table, OrdersReceived::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fulfillment_links_order_placed_id")
                                .from(
                                    OrderFulfillmentLinks::Table,
                                    OrderFulfillmentLinks::OrderPlacedId,
                                )
                                .to(OrdersPlaced::Table, OrdersPlaced::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fulfillment_links_order_received_id")
                        .table(OrderFulfillmentLinks::Table)
                        .col(OrderFulfillmentLinks::OrderReceivedId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fulfillment_links_order_placed_id")
                        .table(OrderFulfillmentLinks::Table)
                        .col(OrderFulfillmentLinks::OrderPlacedId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fulfillment_links_owner_created_at")
                        .table(OrderFulfillmentLinks::Table)
                        .col(OrderFulfillmentLinks::OwnerId)
                        .col(OrderFulfillmentLinks::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderFulfillmentLinks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderFulfillmentLinks {
        Table,
        Id,
        OwnerId,
        OrderReceivedId,
        OrderPlacedId,
        QuantityFulfilled,
        CreatedAt,
    }
}
