pub mod fulfillment_link;
pub mod order_placed;
pub mod order_received;
pub mod order_status;

pub use order_status::OrderStatus;
