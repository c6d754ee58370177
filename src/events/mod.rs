use crate::cache::{AffectedViews, View, ViewCache};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Creates a channel sized by `event_channel_capacity`
    pub fn for_config(config: &AppConfig) -> (Self, mpsc::Receiver<Event>) {
        Self::channel(config.event_channel_capacity)
    }

    /// Sends an event asynchronously, waiting for channel capacity
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event without waiting, logging instead of failing when the
    /// channel is full or nobody is listening.
    ///
    /// The write that produced the event is already committed at this point.
    pub fn send_or_log(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(owner_id = %event.owner_id(), "Event channel full; dropped ledger event");
            }
            Err(TrySendError::Closed(event)) => {
                warn!(owner_id = %event.owner_id(), "Event channel closed; dropped ledger event");
            }
        }
    }
}

/// Notifications emitted after a ledger write commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ReceivedOrderCreated { owner_id: Uuid, order_id: Uuid },
    ReceivedOrderUpdated { owner_id: Uuid, order_id: Uuid },
    ReceivedOrderDeleted { owner_id: Uuid, order_id: Uuid },

    PlacedOrderCreated { owner_id: Uuid, order_id: Uuid },
    PlacedOrderUpdated { owner_id: Uuid, order_id: Uuid },
    PlacedOrderDeleted { owner_id: Uuid, order_id: Uuid },

    FulfillmentLinkCreated {
        owner_id: Uuid,
        link_id: Uuid,
        order_received_id: Uuid,
        order_placed_id: Uuid,
    },
    FulfillmentLinkDeleted {
        owner_id: Uuid,
        link_id: Uuid,
        order_received_id: Uuid,
        order_placed_id: Uuid,
    },

    /// Cached read views for the owner are stale.
    ViewsInvalidated { owner_id: Uuid, views: Vec<View> },
}

impl Event {
    pub fn views_invalidated(owner_id: Uuid, affected: &AffectedViews) -> Self {
        Event::ViewsInvalidated {
            owner_id,
            views: affected.to_vec(),
        }
    }

    pub fn owner_id(&self) -> Uuid {
        match self {
            Event::ReceivedOrderCreated { owner_id, .. }
            | Event::ReceivedOrderUpdated { owner_id, .. }
            | Event::ReceivedOrderDeleted { owner_id, .. }
            | Event::PlacedOrderCreated { owner_id, .. }
            | Event::PlacedOrderUpdated { owner_id, .. }
            | Event::PlacedOrderDeleted { owner_id, .. }
            | Event::FulfillmentLinkCreated { owner_id, .. }
            | Event::FulfillmentLinkDeleted { owner_id, .. }
            | Event::ViewsInvalidated { owner_id, .. } => *owner_id,
        }
    }
}

/// Drains the event channel, logging each event.
///
/// When a `cache` is given, `ViewsInvalidated` events are applied to it, so a
/// read layer holding its own cache stays coherent with writers elsewhere.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, cache: Option<ViewCache>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ViewsInvalidated { owner_id, views } => {
                debug!(owner_id = %owner_id, views = ?views, "Views invalidated");
                if let Some(cache) = &cache {
                    cache.invalidate(*owner_id, &views.iter().copied().collect::<AffectedViews>());
                }
            }
            other => {
                info!(owner_id = %other.owner_id(), "Ledger event: {:?}", other);
            }
        }
    }

    info!("Event channel closed; event processing loop finished");
}
