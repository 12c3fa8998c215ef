use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250610_000009_create_delivery_events_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeliveryEvents::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(DeliveryEvents::EventType)
                            .string_len(30)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryEvents::Location)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeliveryEvents::Description).text().not_null())
                    .col(
                        ColumnDef::new(DeliveryEvents::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryEvents::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_events_order_id")
                            .from(DeliveryEvents::Table, DeliveryEvents::OrderId)
                            .to(
                                super::m20250610_000005_create_orders_table::Orders::Table,
                                super::m20250610_000005_create_orders_table::Orders::Id,
                            )
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_events_order_id")
                    .table(DeliveryEvents::Table)
                    .col(DeliveryEvents::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DeliveryEvents {
    Table,
    Id,
    OrderId,
    EventType,
    Location,
    Description,
    OccurredAt,
    CreatedAt,
}
