use crate::{
    cache::{AffectedViews, View, WriteOutcome},
    db::DbPool,
    entities::{
        fulfillment_link::{self, ActiveModel as LinkActiveModel, Entity as LinkEntity},
        order_placed::{self, Entity as PlacedEntity},
        order_received::{self, Entity as ReceivedEntity},
        OrderStatus,
    },
    errors::ServiceError,
    services::order_store::{find_placed, find_received},
    validation::{check_link_quantity, NewFulfillmentLink},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// A link together with both orders it connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkWithOrders {
    #[serde(flatten)]
    pub link: fulfillment_link::Model,
    pub order_received: Option<order_received::Model>,
    pub order_placed: Option<order_placed::Model>,
}

/// A link write and the recomputed state of both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkChange {
    pub link: fulfillment_link::Model,
    pub order_received: order_received::Model,
    pub order_placed: order_placed::Model,
}

/// Creates and removes allocations and keeps the derived aggregates on both
/// order sides equal to the sum of their links.
///
/// Every link mutation and both recomputations commit in one transaction.
/// Both order rows are locked before their links are summed, received side
/// first, so concurrent link writes on the same order apply one at a time.
#[derive(Clone)]
pub struct FulfillmentLinker {
    db_pool: Arc<DbPool>,
}

impl FulfillmentLinker {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Allocates `quantity_fulfilled` of a placed order to a received order.
    ///
    /// Over-allocation is allowed: the placed order's remaining quantity goes
    /// negative and the received order's dispatched quantity may exceed what
    /// was ordered.
    #[instrument(skip(self, link), fields(
        order_received_id = %link.order_received_id,
        order_placed_id = %link.order_placed_id,
        quantity = %link.quantity_fulfilled
    ))]
    pub async fn create_link(
        &self,
        owner_id: Uuid,
        link: NewFulfillmentLink,
    ) -> Result<WriteOutcome<LinkChange>, ServiceError> {
        check_link_quantity(link.quantity_fulfilled)?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for link creation");
            ServiceError::db_error(e)
        })?;

        let received = lock_received(&txn, owner_id, link.order_received_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Received order", link.order_received_id))?;
        let placed = lock_placed(&txn, owner_id, link.order_placed_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Placed order", link.order_placed_id))?;

        let created = LinkActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            order_received_id: Set(received.id),
            order_placed_id: Set(placed.id),
            quantity_fulfilled: Set(link.quantity_fulfilled),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert fulfillment link");
            ServiceError::db_error(e)
        })?;

        let order_received = recompute_received(&txn, received).await?;
        let order_placed = recompute_placed(&txn, placed).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, link_id = %created.id, "Failed to commit link creation");
            ServiceError::db_error(e)
        })?;

        if order_placed.is_over_allocated() {
            warn!(
                order_placed_id = %order_placed.id,
                remaining = %order_placed.remaining_quantity,
                "Placed order is over-allocated"
            );
        }
        info!(
            link_id = %created.id,
            dispatched = %order_received.dispatched_quantity,
            remaining = %order_placed.remaining_quantity,
            "Fulfillment link created"
        );

        Ok(WriteOutcome::new(
            LinkChange {
                link: created,
                order_received,
                order_placed,
            },
            AffectedViews::all(),
        ))
    }

    /// Removes a link and recomputes both sides as if it never existed.
    #[instrument(skip(self))]
    pub async fn delete_link(
        &self,
        owner_id: Uuid,
        link_id: Uuid,
    ) -> Result<WriteOutcome<LinkChange>, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, link_id = %link_id, "Failed to start transaction for link deletion");
            ServiceError::db_error(e)
        })?;

        let link = LinkEntity::find_by_id(link_id)
            .filter(fulfillment_link::Column::OwnerId.eq(owner_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Fulfillment link", link_id))?;

        let received = lock_received(&txn, owner_id, link.order_received_id)
            .await?
            .ok_or_else(|| dangling(&link))?;
        let placed = lock_placed(&txn, owner_id, link.order_placed_id)
            .await?
            .ok_or_else(|| dangling(&link))?;

        let deleted = LinkEntity::delete_by_id(link_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, link_id = %link_id, "Failed to delete fulfillment link");
                ServiceError::db_error(e)
            })?;
        // Another writer removed it while this one waited for the order locks.
        if deleted.rows_affected == 0 {
            return Err(ServiceError::not_found("Fulfillment link", link_id));
        }

        let order_received = recompute_received(&txn, received).await?;
        let order_placed = recompute_placed(&txn, placed).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, link_id = %link_id, "Failed to commit link deletion");
            ServiceError::db_error(e)
        })?;

        info!(
            link_id = %link_id,
            dispatched = %order_received.dispatched_quantity,
            remaining = %order_placed.remaining_quantity,
            "Fulfillment link deleted"
        );

        Ok(WriteOutcome::new(
            LinkChange {
                link,
                order_received,
                order_placed,
            },
            AffectedViews::all(),
        ))
    }

    /// Recomputes a received order's aggregates from its links.
    ///
    /// Idempotent: running it on a consistent order changes nothing.
    #[instrument(skip(self))]
    pub async fn refresh_received(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        let received = lock_received(&txn, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Received order", id))?;
        let model = recompute_received(&txn, received).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(WriteOutcome::new(model, [View::Received, View::Links].into_iter().collect()))
    }

    /// Recomputes a placed order's aggregates from its links.
    #[instrument(skip(self))]
    pub async fn refresh_placed(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::db_error)?;
        let placed = lock_placed(&txn, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Placed order", id))?;
        let model = recompute_placed(&txn, placed).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(WriteOutcome::new(model, [View::Placed, View::Links].into_iter().collect()))
    }

    /// All links of `owner_id`, newest first, each with both orders embedded.
    #[instrument(skip(self))]
    pub async fn list_links(&self, owner_id: Uuid) -> Result<Vec<LinkWithOrders>, ServiceError> {
        let db = &*self.db_pool;
        let links = LinkEntity::find()
            .filter(fulfillment_link::Column::OwnerId.eq(owner_id))
            .order_by_desc(fulfillment_link::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list fulfillment links");
                ServiceError::db_error(e)
            })?;

        stitch(db, owner_id, links).await
    }

    /// Links allocated to one received order, newest first.
    #[instrument(skip(self))]
    pub async fn links_for_received(
        &self,
        owner_id: Uuid,
        order_received_id: Uuid,
    ) -> Result<Vec<LinkWithOrders>, ServiceError> {
        let db = &*self.db_pool;
        find_received(db, owner_id, order_received_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Received order", order_received_id))?;

        let links = LinkEntity::find()
            .filter(fulfillment_link::Column::OwnerId.eq(owner_id))
            .filter(fulfillment_link::Column::OrderReceivedId.eq(order_received_id))
            .order_by_desc(fulfillment_link::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        stitch(db, owner_id, links).await
    }

    /// Links drawing on one placed order, newest first.
    #[instrument(skip(self))]
    pub async fn links_for_placed(
        &self,
        owner_id: Uuid,
        order_placed_id: Uuid,
    ) -> Result<Vec<LinkWithOrders>, ServiceError> {
        let db = &*self.db_pool;
        find_placed(db, owner_id, order_placed_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Placed order", order_placed_id))?;

        let links = LinkEntity::find()
            .filter(fulfillment_link::Column::OwnerId.eq(owner_id))
            .filter(fulfillment_link::Column::OrderPlacedId.eq(order_placed_id))
            .order_by_desc(fulfillment_link::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        stitch(db, owner_id, links).await
    }
}

fn dangling(link: &fulfillment_link::Model) -> ServiceError {
    error!(link_id = %link.id, "Fulfillment link references a missing order");
    ServiceError::InternalError(format!("fulfillment link {} references a missing order", link.id))
}

/// `SELECT ... FOR UPDATE` on a received order. SQLite serializes writers
/// already and renders no lock clause.
async fn lock_received<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<order_received::Model>, ServiceError> {
    ReceivedEntity::find_by_id(id)
        .filter(order_received::Column::OwnerId.eq(owner_id))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to lock received order");
            ServiceError::db_error(e)
        })
}

async fn lock_placed<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<order_placed::Model>, ServiceError> {
    PlacedEntity::find_by_id(id)
        .filter(order_placed::Column::OwnerId.eq(owner_id))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to lock placed order");
            ServiceError::db_error(e)
        })
}

async fn linked_total<C: ConnectionTrait>(
    conn: &C,
    column: fulfillment_link::Column,
    order_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let links = LinkEntity::find()
        .filter(column.eq(order_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(links.iter().map(|l| l.quantity_fulfilled).sum())
}

/// `dispatched = Σ links`; fulfilled exactly when dispatched equals ordered.
async fn recompute_received<C: ConnectionTrait>(
    conn: &C,
    order: order_received::Model,
) -> Result<order_received::Model, ServiceError> {
    let dispatched = linked_total(conn, fulfillment_link::Column::OrderReceivedId, order.id).await?;
    let status = OrderStatus::derive(dispatched, order.ordered_quantity);
    if dispatched == order.dispatched_quantity && status == order.status {
        return Ok(order);
    }

    let mut active: order_received::ActiveModel = order.into();
    active.dispatched_quantity = Set(dispatched);
    active.status = Set(status);
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await.map_err(|e| {
        error!(error = %e, "Failed to store received order aggregates");
        ServiceError::db_error(e)
    })
}

/// `remaining = ordered − Σ links` (unclamped); fulfilled exactly when remaining is zero.
async fn recompute_placed<C: ConnectionTrait>(
    conn: &C,
    order: order_placed::Model,
) -> Result<order_placed::Model, ServiceError> {
    let allocated = linked_total(conn, fulfillment_link::Column::OrderPlacedId, order.id).await?;
    let remaining = order.ordered_quantity - allocated;
    let status = OrderStatus::derive(allocated, order.ordered_quantity);
    if remaining == order.remaining_quantity && status == order.status {
        return Ok(order);
    }

    let mut active: order_placed::ActiveModel = order.into();
    active.remaining_quantity = Set(remaining);
    active.status = Set(status);
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await.map_err(|e| {
        error!(error = %e, "Failed to store placed order aggregates");
        ServiceError::db_error(e)
    })
}

/// Fetches the orders referenced by `links` in two queries and embeds them.
async fn stitch<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    links: Vec<fulfillment_link::Model>,
) -> Result<Vec<LinkWithOrders>, ServiceError> {
    if links.is_empty() {
        return Ok(Vec::new());
    }

    let received_ids: Vec<Uuid> = links.iter().map(|l| l.order_received_id).collect();
    let placed_ids: Vec<Uuid> = links.iter().map(|l| l.order_placed_id).collect();

    let received: HashMap<Uuid, order_received::Model> = ReceivedEntity::find()
        .filter(order_received::Column::OwnerId.eq(owner_id))
        .filter(order_received::Column::Id.is_in(received_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|o| (o.id, o))
        .collect();
    let placed: HashMap<Uuid, order_placed::Model> = PlacedEntity::find()
        .filter(order_placed::Column::OwnerId.eq(owner_id))
        .filter(order_placed::Column::Id.is_in(placed_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|o| (o.id, o))
        .collect();

    Ok(links
        .into_iter()
        .map(|link| LinkWithOrders {
            order_received: received.get(&link.order_received_id).cloned(),
            order_placed: placed.get(&link.order_placed_id).cloned(),
            link,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::order_store::OrderStore;
    use crate::validation::{NewPlacedOrder, NewReceivedOrder};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: OrderStore,
        linker: FulfillmentLinker,
        owner: Uuid,
    }

    async fn fixture() -> Fixture {
        let pool = Arc::new(db::in_memory().await.expect("in-memory database"));
        Fixture {
            store: OrderStore::new(pool.clone()),
            linker: FulfillmentLinker::new(pool),
            owner: Uuid::new_v4(),
        }
    }

    impl Fixture {
        async fn received(&self, quantity: Decimal) -> order_received::Model {
            let order = NewReceivedOrder {
                customer_name: "Acme".into(),
                item_name: "Twill".into(),
                sku: None,
                ordered_quantity: quantity,
                unit: "mtrs".into(),
                rate: None,
                notes: None,
                custom_fields: None,
            };
            self.store.create_received(self.owner, order).await.unwrap().record
        }

        async fn placed(&self, quantity: Decimal) -> order_placed::Model {
            let order = NewPlacedOrder {
                party_name: "Mill".into(),
                item_name: "Twill".into(),
                sku: None,
                ordered_quantity: quantity,
                received_quantity: None,
                unit: "mtrs".into(),
                rate: None,
                notes: None,
                custom_fields: None,
            };
            self.store.create_placed(self.owner, order).await.unwrap().record
        }

        fn link(&self, r: &order_received::Model, p: &order_placed::Model, q: Decimal) -> NewFulfillmentLink {
            NewFulfillmentLink {
                order_received_id: r.id,
                order_placed_id: p.id,
                quantity_fulfilled: q,
            }
        }
    }

    #[tokio::test]
    async fn partial_then_full_allocation() {
        let fx = fixture().await;
        let r = fx.received(dec!(100)).await;
        let p = fx.placed(dec!(100)).await;

        let first = fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(60))).await.unwrap();
        assert_eq!(first.record.order_received.dispatched_quantity, dec!(60));
        assert_eq!(first.record.order_received.status, OrderStatus::Confirmed);
        assert_eq!(first.record.order_placed.remaining_quantity, dec!(40));
        assert_eq!(first.affected, AffectedViews::all());

        let second = fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(40))).await.unwrap();
        assert_eq!(second.record.order_received.dispatched_quantity, dec!(100));
        assert_eq!(second.record.order_received.status, OrderStatus::Fulfilled);
        assert_eq!(second.record.order_placed.remaining_quantity, Decimal::ZERO);
        assert_eq!(second.record.order_placed.status, OrderStatus::Fulfilled);

        let undone = fx.linker.delete_link(fx.owner, first.record.link.id).await.unwrap();
        assert_eq!(undone.record.order_received.dispatched_quantity, dec!(40));
        assert_eq!(undone.record.order_received.status, OrderStatus::Confirmed);
        assert_eq!(undone.record.order_placed.remaining_quantity, dec!(60));
    }

    #[tokio::test]
    async fn over_allocation_goes_negative() {
        let fx = fixture().await;
        let r = fx.received(dec!(200)).await;
        let p = fx.placed(dec!(50)).await;

        let change = fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(70))).await.unwrap();
        assert_eq!(change.record.order_placed.remaining_quantity, dec!(-20));
        assert!(change.record.order_placed.is_over_allocated());
        assert_eq!(change.record.order_placed.status, OrderStatus::Confirmed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_links_on_one_order_all_count() {
        let fx = fixture().await;
        let p = fx.placed(dec!(100)).await;
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let r = fx.received(dec!(10)).await;
            let linker = fx.linker.clone();
            let link = fx.link(&r, &p, dec!(12.5));
            let owner = fx.owner;
            tasks.spawn(async move { linker.create_link(owner, link).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let p_after = fx.store.get_placed(fx.owner, p.id).await.unwrap();
        assert_eq!(fx.linker.links_for_placed(fx.owner, p.id).await.unwrap().len(), 8);
        assert_eq!(p_after.remaining_quantity, Decimal::ZERO);
        assert_eq!(p_after.status, OrderStatus::Fulfilled);
    }

    #[tokio::test]
    async fn deleting_a_link_twice_is_not_found() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p = fx.placed(dec!(10)).await;
        let link = fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(4))).await.unwrap().record.link;

        fx.linker.delete_link(fx.owner, link.id).await.unwrap();
        assert_matches!(
            fx.linker.delete_link(fx.owner, link.id).await,
            Err(ServiceError::NotFound(_))
        );
        let p_after = fx.store.get_placed(fx.owner, p.id).await.unwrap();
        assert_eq!(p_after.remaining_quantity, dec!(10));
    }

    #[tokio::test]
    async fn rejects_non_positive_quantity_without_writing() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p = fx.placed(dec!(10)).await;

        let err = fx.linker.create_link(fx.owner, fx.link(&r, &p, Decimal::ZERO)).await.unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["quantity_fulfilled"]);
        assert!(fx.linker.list_links(fx.owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_orders_are_not_found() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p = fx.placed(dec!(10)).await;
        let intruder = Uuid::new_v4();

        assert_matches!(
            fx.linker.create_link(intruder, fx.link(&r, &p, dec!(1))).await,
            Err(ServiceError::NotFound(_))
        );
        let missing = NewFulfillmentLink {
            order_placed_id: Uuid::new_v4(),
            ..fx.link(&r, &p, dec!(1))
        };
        assert_matches!(fx.linker.create_link(fx.owner, missing).await, Err(ServiceError::NotFound(_)));

        let p_after = fx.store.get_placed(fx.owner, p.id).await.unwrap();
        assert_eq!(p_after.remaining_quantity, dec!(10));
        assert!(fx.linker.list_links(fx.owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p = fx.placed(dec!(10)).await;
        let link = fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(4))).await.unwrap().record.link;

        assert_matches!(
            fx.linker.delete_link(Uuid::new_v4(), link.id).await,
            Err(ServiceError::NotFound(_))
        );
        assert_eq!(fx.linker.list_links(fx.owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn linked_orders_cannot_be_deleted() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p = fx.placed(dec!(10)).await;
        let link = fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(4))).await.unwrap().record.link;

        assert_matches!(fx.store.delete_received(fx.owner, r.id).await, Err(ServiceError::Conflict(_)));
        assert_matches!(fx.store.delete_placed(fx.owner, p.id).await, Err(ServiceError::Conflict(_)));

        fx.linker.delete_link(fx.owner, link.id).await.unwrap();
        fx.store.delete_received(fx.owner, r.id).await.unwrap();
        fx.store.delete_placed(fx.owner, p.id).await.unwrap();
    }

    #[tokio::test]
    async fn list_links_embeds_orders_newest_first() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p1 = fx.placed(dec!(5)).await;
        let p2 = fx.placed(dec!(5)).await;

        fx.linker.create_link(fx.owner, fx.link(&r, &p1, dec!(2))).await.unwrap();
        let newest = fx.linker.create_link(fx.owner, fx.link(&r, &p2, dec!(3))).await.unwrap();

        let links = fx.linker.list_links(fx.owner).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].link.id, newest.record.link.id);
        let embedded = links[0].order_placed.as_ref().unwrap();
        assert_eq!(embedded.order_number, p2.order_number);
        assert_eq!(links[0].order_received.as_ref().unwrap().dispatched_quantity, dec!(5));

        assert_eq!(fx.linker.links_for_placed(fx.owner, p1.id).await.unwrap().len(), 1);
        assert_eq!(fx.linker.links_for_received(fx.owner, r.id).await.unwrap().len(), 2);
        assert!(fx.linker.list_links(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let fx = fixture().await;
        let r = fx.received(dec!(10)).await;
        let p = fx.placed(dec!(10)).await;
        fx.linker.create_link(fx.owner, fx.link(&r, &p, dec!(10))).await.unwrap();

        let once = fx.linker.refresh_received(fx.owner, r.id).await.unwrap().record;
        let twice = fx.linker.refresh_received(fx.owner, r.id).await.unwrap().record;
        assert_eq!(once, twice);
        assert_eq!(twice.status, OrderStatus::Fulfilled);

        let placed = fx.linker.refresh_placed(fx.owner, p.id).await.unwrap().record;
        assert_eq!(placed.remaining_quantity, Decimal::ZERO);
    }
}
