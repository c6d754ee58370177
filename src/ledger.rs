//! Session-scoped entry point tying validation, persistence, the view cache
//! and change notifications together.
//!
//! Every operation resolves the owner first, validates raw input, performs the
//! write, then invalidates the affected views and emits events. Reads are
//! served from the [`ViewCache`] when possible.

use crate::{
    auth::{require_owner, SessionProvider},
    cache::{Lookup, ViewCache, WriteOutcome},
    config::AppConfig,
    db::DbPool,
    entities::{order_placed, order_received},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        fulfillment::{FulfillmentLinker, LinkChange, LinkWithOrders},
        order_store::OrderStore,
    },
    validation::{
        validate_allocation, validate_fulfillment_link, validate_placed_order,
        validate_placed_order_patch, validate_received_order, validate_received_order_patch,
        validate_received_quantity_update, AllocationInput, FulfillmentLinkInput, PlacedOrderChanges,
        PlacedOrderInput, PlacedOrderPatchInput, ReceivedOrderInput, ReceivedOrderPatchInput,
        ReceivedQuantityInput,
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Both order lists as the landing page shows them.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub received: Arc<Vec<order_received::Model>>,
    pub placed: Arc<Vec<order_placed::Model>>,
    pub fulfilled_received: usize,
    pub over_allocated_placed: usize,
}

pub struct Ledger<S> {
    session: S,
    store: OrderStore,
    linker: FulfillmentLinker,
    cache: ViewCache,
    events: Option<EventSender>,
    default_unit: Option<String>,
}

impl<S: SessionProvider> Ledger<S> {
    pub fn new(db_pool: Arc<DbPool>, session: S) -> Self {
        Self {
            session,
            store: OrderStore::new(db_pool.clone()),
            linker: FulfillmentLinker::new(db_pool),
            cache: ViewCache::default(),
            events: None,
            default_unit: None,
        }
    }

    /// Builds a ledger with the cache and default unit taken from `config`.
    pub fn from_config(db_pool: Arc<DbPool>, session: S, config: &AppConfig) -> Self {
        Self {
            cache: ViewCache::from_config(&config.cache),
            default_unit: Some(config.default_unit.clone()),
            ..Self::new(db_pool, session)
        }
    }

    pub fn with_cache(mut self, cache: ViewCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn linker(&self) -> &FulfillmentLinker {
        &self.linker
    }

    async fn owner(&self) -> Result<Uuid, ServiceError> {
        require_owner(&self.session).await
    }

    fn apply_default_unit(&self, unit: Option<String>) -> Option<String> {
        match unit {
            Some(u) if !u.trim().is_empty() => Some(u),
            _ => self.default_unit.clone(),
        }
    }

    fn committed<T>(&self, owner_id: Uuid, outcome: &WriteOutcome<T>, event: Event) {
        self.cache.invalidate(owner_id, &outcome.affected);
        if let Some(events) = &self.events {
            events.send_or_log(event);
            events.send_or_log(Event::views_invalidated(owner_id, &outcome.affected));
        }
    }

    // Reads

    #[instrument(skip(self))]
    pub async fn list_received(&self) -> Result<Arc<Vec<order_received::Model>>, ServiceError> {
        let owner_id = self.owner().await?;
        let generation = match self.cache.get(owner_id) {
            Lookup::Hit(rows) => return Ok(rows),
            Lookup::Miss(generation) => generation,
        };
        let rows = self.store.list_received(owner_id).await?;
        Ok(self.cache.put(owner_id, rows, generation))
    }

    #[instrument(skip(self))]
    pub async fn list_placed(&self) -> Result<Arc<Vec<order_placed::Model>>, ServiceError> {
        let owner_id = self.owner().await?;
        let generation = match self.cache.get(owner_id) {
            Lookup::Hit(rows) => return Ok(rows),
            Lookup::Miss(generation) => generation,
        };
        let rows = self.store.list_placed(owner_id).await?;
        Ok(self.cache.put(owner_id, rows, generation))
    }

    #[instrument(skip(self))]
    pub async fn list_links(&self) -> Result<Arc<Vec<LinkWithOrders>>, ServiceError> {
        let owner_id = self.owner().await?;
        let generation = match self.cache.get(owner_id) {
            Lookup::Hit(rows) => return Ok(rows),
            Lookup::Miss(generation) => generation,
        };
        let rows = self.linker.list_links(owner_id).await?;
        Ok(self.cache.put(owner_id, rows, generation))
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        let received = self.list_received().await?;
        let placed = self.list_placed().await?;
        Ok(Dashboard {
            fulfilled_received: received.iter().filter(|o| o.is_fulfilled()).count(),
            over_allocated_placed: placed.iter().filter(|o| o.is_over_allocated()).count(),
            received,
            placed,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_received(&self, id: Uuid) -> Result<order_received::Model, ServiceError> {
        let owner_id = self.owner().await?;
        self.store.get_received(owner_id, id).await
    }

    #[instrument(skip(self))]
    pub async fn get_placed(&self, id: Uuid) -> Result<order_placed::Model, ServiceError> {
        let owner_id = self.owner().await?;
        self.store.get_placed(owner_id, id).await
    }

    #[instrument(skip(self))]
    pub async fn links_for_received(&self, id: Uuid) -> Result<Vec<LinkWithOrders>, ServiceError> {
        let owner_id = self.owner().await?;
        self.linker.links_for_received(owner_id, id).await
    }

    #[instrument(skip(self))]
    pub async fn links_for_placed(&self, id: Uuid) -> Result<Vec<LinkWithOrders>, ServiceError> {
        let owner_id = self.owner().await?;
        self.linker.links_for_placed(owner_id, id).await
    }

    // Order writes

    #[instrument(skip(self, input))]
    pub async fn create_received(
        &self,
        mut input: ReceivedOrderInput,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        input.unit = self.apply_default_unit(input.unit);
        let order = validate_received_order(input)?;
        let outcome = self.store.create_received(owner_id, order).await?;
        let event = Event::ReceivedOrderCreated {
            owner_id,
            order_id: outcome.record.id,
        };
        self.committed(owner_id, &outcome, event);
        Ok(outcome)
    }

    #[instrument(skip(self, input))]
    pub async fn create_placed(
        &self,
        mut input: PlacedOrderInput,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        input.unit = self.apply_default_unit(input.unit);
        let order = validate_placed_order(input)?;
        let outcome = self.store.create_placed(owner_id, order).await?;
        let event = Event::PlacedOrderCreated {
            owner_id,
            order_id: outcome.record.id,
        };
        self.committed(owner_id, &outcome, event);
        Ok(outcome)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_received(
        &self,
        id: Uuid,
        patch: ReceivedOrderPatchInput,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        let changes = validate_received_order_patch(patch)?;
        let outcome = self.store.update_received(owner_id, id, changes).await?;
        let event = Event::ReceivedOrderUpdated { owner_id, order_id: id };
        self.committed(owner_id, &outcome, event);
        Ok(outcome)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_placed(
        &self,
        id: Uuid,
        patch: PlacedOrderPatchInput,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        let changes = validate_placed_order_patch(patch)?;
        self.apply_placed_changes(owner_id, id, changes).await
    }

    /// Records the supplier-reported receipt; an empty value clears it.
    #[instrument(skip(self, input))]
    pub async fn update_received_quantity(
        &self,
        id: Uuid,
        input: ReceivedQuantityInput,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        let quantity = validate_received_quantity_update(input)?;
        self.apply_placed_changes(owner_id, id, PlacedOrderChanges::received_quantity(quantity))
            .await
    }

    async fn apply_placed_changes(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: PlacedOrderChanges,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let outcome = self.store.update_placed(owner_id, id, changes).await?;
        let event = Event::PlacedOrderUpdated { owner_id, order_id: id };
        self.committed(owner_id, &outcome, event);
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete_received(
        &self,
        id: Uuid,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        let outcome = self.store.delete_received(owner_id, id).await?;
        let event = Event::ReceivedOrderDeleted { owner_id, order_id: id };
        self.committed(owner_id, &outcome, event);
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete_placed(&self, id: Uuid) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let owner_id = self.owner().await?;
        let outcome = self.store.delete_placed(owner_id, id).await?;
        let event = Event::PlacedOrderDeleted { owner_id, order_id: id };
        self.committed(owner_id, &outcome, event);
        Ok(outcome)
    }

    // Link writes

    #[instrument(skip(self, input))]
    pub async fn create_link(
        &self,
        input: FulfillmentLinkInput,
    ) -> Result<WriteOutcome<LinkChange>, ServiceError> {
        let owner_id = self.owner().await?;
        let link = validate_fulfillment_link(input)?;
        let outcome = self.linker.create_link(owner_id, link).await?;
        self.link_committed(owner_id, &outcome, true);
        Ok(outcome)
    }

    /// Allocates supply to the received order `order_received_id`.
    #[instrument(skip(self, input))]
    pub async fn allocate(
        &self,
        order_received_id: Uuid,
        input: AllocationInput,
    ) -> Result<WriteOutcome<LinkChange>, ServiceError> {
        let owner_id = self.owner().await?;
        let link = validate_allocation(order_received_id, input)?;
        let outcome = self.linker.create_link(owner_id, link).await?;
        self.link_committed(owner_id, &outcome, true);
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn delete_link(&self, id: Uuid) -> Result<WriteOutcome<LinkChange>, ServiceError> {
        let owner_id = self.owner().await?;
        let outcome = self.linker.delete_link(owner_id, id).await?;
        self.link_committed(owner_id, &outcome, false);
        Ok(outcome)
    }

    fn link_committed(&self, owner_id: Uuid, outcome: &WriteOutcome<LinkChange>, created: bool) {
        let link = &outcome.record.link;
        let event = if created {
            Event::FulfillmentLinkCreated {
                owner_id,
                link_id: link.id,
                order_received_id: link.order_received_id,
                order_placed_id: link.order_placed_id,
            }
        } else {
            Event::FulfillmentLinkDeleted {
                owner_id,
                link_id: link.id,
                order_received_id: link.order_received_id,
                order_placed_id: link.order_placed_id,
            }
        };
        self.committed(owner_id, outcome, event);
    }
}
