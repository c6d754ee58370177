//! Owner-scoped persistence services.

pub mod fulfillment;
pub mod order_store;
