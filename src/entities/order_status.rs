use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fulfillment state shared by received and placed orders.
///
/// Never set directly: the fulfillment linker derives it from the active links.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "fulfilled")]
    Fulfilled,
}

impl OrderStatus {
    /// `Fulfilled` exactly when `covered` equals `target`, `Confirmed` otherwise.
    pub fn derive(covered: Decimal, target: Decimal) -> Self {
        if covered == target {
            OrderStatus::Fulfilled
        } else {
            OrderStatus::Confirmed
        }
    }
}
