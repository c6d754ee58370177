use super::order_status::OrderStatus;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer's purchase order (demand side).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders_received")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub order_number: i64,
    pub customer_name: String,
    pub item_name: String,
    pub sku: Option<String>,
    pub ordered_quantity: Decimal,
    pub unit: String,
    pub rate: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub custom_fields: Option<Json>,
    /// Sum of `quantity_fulfilled` over the links allocated to this order.
    pub dispatched_quantity: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_fulfilled(&self) -> bool {
        self.status == OrderStatus::Fulfilled
    }

    /// More has been dispatched against this order than the customer asked for.
    pub fn is_over_fulfilled(&self) -> bool {
        self.dispatched_quantity > self.ordered_quantity
    }

    /// Demand still uncovered by allocations; negative when over-fulfilled.
    pub fn outstanding_quantity(&self) -> Decimal {
        self.ordered_quantity - self.dispatched_quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::fulfillment_link::Entity")]
    FulfillmentLinks,
}

impl Related<super::fulfillment_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FulfillmentLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
