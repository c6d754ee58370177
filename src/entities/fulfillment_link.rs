use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Allocation of a placed order's supply to a received order's demand.
/// Created and deleted, never updated in place.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_fulfillment_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub order_received_id: Uuid,
    pub order_placed_id: Uuid,
    pub quantity_fulfilled: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_received::Entity",
        from = "Column::OrderReceivedId",
        to = "super::order_received::Column::Id"
    )]
    OrderReceived,
    #[sea_orm(
        belongs_to = "super::order_placed::Entity",
        from = "Column::OrderPlacedId",
        to = "super::order_placed::Column::Id"
    )]
    OrderPlaced,
}

impl Related<super::order_received::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderReceived.def()
    }
}

impl Related<super::order_placed::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderPlaced.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
