#![allow(dead_code)]

use std::sync::Arc;

use order_ledger::{
    auth::StaticSession,
    db,
    events::{Event, EventSender},
    ledger::Ledger,
    validation::{FulfillmentLinkInput, NumericInput, PlacedOrderInput, ReceivedOrderInput},
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A signed-in ledger backed by a fresh in-memory SQLite database.
pub struct TestLedger {
    pub owner: Uuid,
    pub pool: Arc<db::DbPool>,
    pub ledger: Ledger<StaticSession>,
    pub events: mpsc::Receiver<Event>,
}

impl TestLedger {
    pub async fn new() -> Self {
        let pool = Arc::new(db::in_memory().await.expect("in-memory database"));
        let owner = Uuid::new_v4();
        let (sender, events) = EventSender::channel(256);
        let ledger = Ledger::new(pool.clone(), StaticSession::signed_in(owner)).with_events(sender);
        Self {
            owner,
            pool,
            ledger,
            events,
        }
    }

    /// Another user sharing the same database.
    pub fn other_user(&self) -> Ledger<StaticSession> {
        Ledger::new(self.pool.clone(), StaticSession::signed_in(Uuid::new_v4()))
    }

    pub fn anonymous(&self) -> Ledger<StaticSession> {
        Ledger::new(self.pool.clone(), StaticSession::anonymous())
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn received_input(customer: &str, quantity: i64) -> ReceivedOrderInput {
    ReceivedOrderInput {
        customer_name: customer.to_string(),
        item_name: "Cotton twill".to_string(),
        ordered_quantity: Some(NumericInput::from(quantity)),
        ..Default::default()
    }
}

pub fn placed_input(party: &str, quantity: i64) -> PlacedOrderInput {
    PlacedOrderInput {
        party_name: party.to_string(),
        item_name: "Cotton twill".to_string(),
        ordered_quantity: Some(NumericInput::from(quantity)),
        ..Default::default()
    }
}

pub fn link_input(order_received_id: Uuid, order_placed_id: Uuid, quantity: i64) -> FulfillmentLinkInput {
    FulfillmentLinkInput {
        order_received_id: order_received_id.to_string(),
        order_placed_id: order_placed_id.to_string(),
        quantity_fulfilled: Some(NumericInput::from(quantity)),
    }
}
