use crate::{
    cache::{AffectedViews, View, WriteOutcome},
    db::DbPool,
    entities::{
        fulfillment_link,
        order_placed::{self, ActiveModel as PlacedActiveModel, Entity as PlacedEntity},
        order_received::{self, ActiveModel as ReceivedActiveModel, Entity as ReceivedEntity},
        OrderStatus,
    },
    errors::ServiceError,
    validation::{
        check_typed_changes, check_typed_order, NewPlacedOrder, NewReceivedOrder, PlacedOrderChanges,
        ReceivedOrderChanges,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Owner-scoped persistence for received and placed orders.
///
/// Records owned by someone else are indistinguishable from missing ones.
#[derive(Clone)]
pub struct OrderStore {
    db_pool: Arc<DbPool>,
}

impl OrderStore {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Received orders of `owner_id`, highest order number first.
    #[instrument(skip(self))]
    pub async fn list_received(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<order_received::Model>, ServiceError> {
        ReceivedEntity::find()
            .filter(order_received::Column::OwnerId.eq(owner_id))
            .order_by_desc(order_received::Column::OrderNumber)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list received orders");
                ServiceError::db_error(e)
            })
    }

    /// Placed orders of `owner_id`, highest order number first.
    #[instrument(skip(self))]
    pub async fn list_placed(&self, owner_id: Uuid) -> Result<Vec<order_placed::Model>, ServiceError> {
        PlacedEntity::find()
            .filter(order_placed::Column::OwnerId.eq(owner_id))
            .order_by_desc(order_placed::Column::OrderNumber)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list placed orders");
                ServiceError::db_error(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get_received(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<order_received::Model, ServiceError> {
        find_received(&*self.db_pool, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Received order", id))
    }

    #[instrument(skip(self))]
    pub async fn get_placed(&self, owner_id: Uuid, id: Uuid) -> Result<order_placed::Model, ServiceError> {
        find_placed(&*self.db_pool, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Placed order", id))
    }

    /// Inserts a received order with the next order number and zeroed aggregates.
    #[instrument(skip(self, order), fields(customer = %order.customer_name))]
    pub async fn create_received(
        &self,
        owner_id: Uuid,
        order: NewReceivedOrder,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        check_typed_order(
            &[
                ("customer_name", order.customer_name.as_str()),
                ("item_name", order.item_name.as_str()),
            ],
            order.ordered_quantity,
            order.rate,
            None,
        )?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for received order creation");
            ServiceError::db_error(e)
        })?;

        let order_number = next_received_number(&txn, owner_id).await?;
        let now = Utc::now();
        let model = ReceivedActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            order_number: Set(order_number),
            customer_name: Set(order.customer_name),
            item_name: Set(order.item_name),
            sku: Set(order.sku),
            ordered_quantity: Set(order.ordered_quantity),
            unit: Set(order.unit),
            rate: Set(order.rate),
            notes: Set(order.notes),
            custom_fields: Set(order.custom_fields),
            dispatched_quantity: Set(Decimal::ZERO),
            status: Set(OrderStatus::Confirmed),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert received order");
            ServiceError::db_error(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %model.id, "Failed to commit received order creation");
            ServiceError::db_error(e)
        })?;

        info!(order_id = %model.id, order_number, "Received order created");
        Ok(WriteOutcome::new(model, AffectedViews::only(View::Received)))
    }

    /// Inserts a placed order with the next order number; nothing is allocated yet.
    #[instrument(skip(self, order), fields(party = %order.party_name))]
    pub async fn create_placed(
        &self,
        owner_id: Uuid,
        order: NewPlacedOrder,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        check_typed_order(
            &[
                ("party_name", order.party_name.as_str()),
                ("item_name", order.item_name.as_str()),
            ],
            order.ordered_quantity,
            order.rate,
            order.received_quantity,
        )?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for placed order creation");
            ServiceError::db_error(e)
        })?;

        let order_number = next_placed_number(&txn, owner_id).await?;
        let now = Utc::now();
        let model = PlacedActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            order_number: Set(order_number),
            party_name: Set(order.party_name),
            item_name: Set(order.item_name),
            sku: Set(order.sku),
            ordered_quantity: Set(order.ordered_quantity),
            received_quantity: Set(order.received_quantity),
            unit: Set(order.unit),
            rate: Set(order.rate),
            notes: Set(order.notes),
            custom_fields: Set(order.custom_fields),
            remaining_quantity: Set(order.ordered_quantity),
            status: Set(OrderStatus::Confirmed),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert placed order");
            ServiceError::db_error(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %model.id, "Failed to commit placed order creation");
            ServiceError::db_error(e)
        })?;

        info!(order_id = %model.id, order_number, "Placed order created");
        Ok(WriteOutcome::new(model, AffectedViews::only(View::Placed)))
    }

    /// Applies directly editable fields. Aggregates and status are left alone.
    #[instrument(skip(self, changes))]
    pub async fn update_received(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: ReceivedOrderChanges,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        check_typed_changes(
            &[
                ("customer_name", changes.customer_name.as_deref()),
                ("item_name", changes.item_name.as_deref()),
                ("unit", changes.unit.as_deref()),
            ],
            changes.rate,
            None,
        )?;

        let db = &*self.db_pool;
        let existing = find_received(db, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Received order", id))?;

        let mut active: ReceivedActiveModel = existing.into();
        if let Some(name) = changes.customer_name {
            active.customer_name = Set(name);
        }
        if let Some(item) = changes.item_name {
            active.item_name = Set(item);
        }
        if let Some(sku) = changes.sku {
            active.sku = Set(Some(sku));
        }
        if let Some(unit) = changes.unit {
            active.unit = Set(unit);
        }
        if let Some(rate) = changes.rate {
            active.rate = Set(Some(rate));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(fields) = changes.custom_fields {
            active.custom_fields = Set(Some(fields));
        }
        active.updated_at = Set(Some(Utc::now()));

        let model = active.update(db).await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to update received order");
            ServiceError::db_error(e)
        })?;

        info!(order_id = %id, "Received order updated");
        Ok(WriteOutcome::new(model, AffectedViews::only(View::Received)))
    }

    /// Applies directly editable fields, including `received_quantity`.
    /// `remaining_quantity` and status are left alone.
    #[instrument(skip(self, changes))]
    pub async fn update_placed(
        &self,
        owner_id: Uuid,
        id: Uuid,
        changes: PlacedOrderChanges,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        check_typed_changes(
            &[
                ("party_name", changes.party_name.as_deref()),
                ("item_name", changes.item_name.as_deref()),
                ("unit", changes.unit.as_deref()),
            ],
            changes.rate,
            changes.received_quantity,
        )?;

        let db = &*self.db_pool;
        let existing = find_placed(db, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Placed order", id))?;

        let mut active: PlacedActiveModel = existing.into();
        if let Some(name) = changes.party_name {
            active.party_name = Set(name);
        }
        if let Some(item) = changes.item_name {
            active.item_name = Set(item);
        }
        if let Some(sku) = changes.sku {
            active.sku = Set(Some(sku));
        }
        if let Some(unit) = changes.unit {
            active.unit = Set(unit);
        }
        if let Some(rate) = changes.rate {
            active.rate = Set(Some(rate));
        }
        if let Some(notes) = changes.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(fields) = changes.custom_fields {
            active.custom_fields = Set(Some(fields));
        }
        if let Some(received) = changes.received_quantity {
            active.received_quantity = Set(received);
        }
        active.updated_at = Set(Some(Utc::now()));

        let model = active.update(db).await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to update placed order");
            ServiceError::db_error(e)
        })?;

        info!(order_id = %id, "Placed order updated");
        Ok(WriteOutcome::new(model, AffectedViews::only(View::Placed)))
    }

    /// Deletes a received order that no link references.
    #[instrument(skip(self))]
    pub async fn delete_received(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<WriteOutcome<order_received::Model>, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to start transaction for received order deletion");
            ServiceError::db_error(e)
        })?;

        let existing = find_received(&txn, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Received order", id))?;

        let links = fulfillment_link::Entity::find()
            .filter(fulfillment_link::Column::OrderReceivedId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if links > 0 {
            return Err(ServiceError::Conflict(format!(
                "Received order {} still has {} fulfillment link(s)",
                id, links
            )));
        }

        existing.clone().delete(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to delete received order");
            ServiceError::db_error(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to commit received order deletion");
            ServiceError::db_error(e)
        })?;

        info!(order_id = %id, "Received order deleted");
        Ok(WriteOutcome::new(existing, AffectedViews::only(View::Received)))
    }

    /// Deletes a placed order that no link references.
    #[instrument(skip(self))]
    pub async fn delete_placed(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<WriteOutcome<order_placed::Model>, ServiceError> {
        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to start transaction for placed order deletion");
            ServiceError::db_error(e)
        })?;

        let existing = find_placed(&txn, owner_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Placed order", id))?;

        let links = fulfillment_link::Entity::find()
            .filter(fulfillment_link::Column::OrderPlacedId.eq(id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if links > 0 {
            return Err(ServiceError::Conflict(format!(
                "Placed order {} still has {} fulfillment link(s)",
                id, links
            )));
        }

        existing.clone().delete(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to delete placed order");
            ServiceError::db_error(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to commit placed order deletion");
            ServiceError::db_error(e)
        })?;

        info!(order_id = %id, "Placed order deleted");
        Ok(WriteOutcome::new(existing, AffectedViews::only(View::Placed)))
    }
}

pub(crate) async fn find_received<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<order_received::Model>, ServiceError> {
    ReceivedEntity::find_by_id(id)
        .filter(order_received::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to fetch received order");
            ServiceError::db_error(e)
        })
}

pub(crate) async fn find_placed<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<order_placed::Model>, ServiceError> {
    PlacedEntity::find_by_id(id)
        .filter(order_placed::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %id, "Failed to fetch placed order");
            ServiceError::db_error(e)
        })
}

async fn next_received_number<C: ConnectionTrait>(conn: &C, owner_id: Uuid) -> Result<i64, ServiceError> {
    let last = ReceivedEntity::find()
        .filter(order_received::Column::OwnerId.eq(owner_id))
        .order_by_desc(order_received::Column::OrderNumber)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(last.map_or(1, |order| order.order_number + 1))
}

async fn next_placed_number<C: ConnectionTrait>(conn: &C, owner_id: Uuid) -> Result<i64, ServiceError> {
    let last = PlacedEntity::find()
        .filter(order_placed::Column::OwnerId.eq(owner_id))
        .order_by_desc(order_placed::Column::OrderNumber)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(last.map_or(1, |order| order.order_number + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn store() -> OrderStore {
        OrderStore::new(Arc::new(db::in_memory().await.expect("in-memory database")))
    }

    fn received(customer: &str, quantity: Decimal) -> NewReceivedOrder {
        NewReceivedOrder {
            customer_name: customer.into(),
            item_name: "Cotton twill".into(),
            sku: None,
            ordered_quantity: quantity,
            unit: "mtrs".into(),
            rate: Some(dec!(12)),
            notes: None,
            custom_fields: None,
        }
    }

    fn placed(party: &str, quantity: Decimal) -> NewPlacedOrder {
        NewPlacedOrder {
            party_name: party.into(),
            item_name: "Cotton twill".into(),
            sku: None,
            ordered_quantity: quantity,
            received_quantity: None,
            unit: "mtrs".into(),
            rate: None,
            notes: None,
            custom_fields: None,
        }
    }

    #[tokio::test]
    async fn creates_with_initial_aggregates_and_sequential_numbers() {
        let store = store().await;
        let owner = Uuid::new_v4();

        let first = store.create_received(owner, received("Acme", dec!(100))).await.unwrap();
        let second = store.create_received(owner, received("Globex", dec!(5))).await.unwrap();
        assert_eq!(first.record.order_number, 1);
        assert_eq!(second.record.order_number, 2);
        assert_eq!(first.record.dispatched_quantity, Decimal::ZERO);
        assert_eq!(first.record.status, OrderStatus::Confirmed);
        assert_eq!(first.affected, AffectedViews::only(View::Received));

        let supply = store.create_placed(owner, placed("Mill", dec!(80))).await.unwrap();
        assert_eq!(supply.record.order_number, 1);
        assert_eq!(supply.record.remaining_quantity, dec!(80));
        assert_eq!(supply.record.status, OrderStatus::Confirmed);

        let listed = store.list_received(owner).await.unwrap();
        let numbers: Vec<i64> = listed.iter().map(|o| o.order_number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[tokio::test]
    async fn order_numbers_are_per_owner() {
        let store = store().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.create_placed(a, placed("Mill", dec!(1))).await.unwrap();
        store.create_placed(a, placed("Mill", dec!(1))).await.unwrap();
        let other = store.create_placed(b, placed("Mill", dec!(1))).await.unwrap();
        assert_eq!(other.record.order_number, 1);
        assert_eq!(store.list_placed(b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn typed_orders_are_rechecked() {
        let store = store().await;
        let err = store
            .create_received(Uuid::new_v4(), received("", dec!(0)))
            .await
            .unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["customer_name", "ordered_quantity"]);
    }

    #[tokio::test]
    async fn foreign_records_are_not_found() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let order = store.create_placed(owner, placed("Mill", dec!(10))).await.unwrap().record;

        assert_matches!(store.get_placed(intruder, order.id).await, Err(ServiceError::NotFound(_)));
        assert_matches!(
            store
                .update_placed(intruder, order.id, PlacedOrderChanges::received_quantity(Some(dec!(3))))
                .await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(store.delete_placed(intruder, order.id).await, Err(ServiceError::NotFound(_)));

        let unchanged = store.get_placed(owner, order.id).await.unwrap();
        assert_eq!(unchanged.received_quantity, None);
    }

    #[tokio::test]
    async fn received_quantity_edit_leaves_aggregates_alone() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let order = store.create_placed(owner, placed("Mill", dec!(10))).await.unwrap().record;

        let updated = store
            .update_placed(owner, order.id, PlacedOrderChanges::received_quantity(Some(dec!(7))))
            .await
            .unwrap();
        assert_eq!(updated.record.received_quantity, Some(dec!(7)));
        assert_eq!(updated.record.remaining_quantity, dec!(10));
        assert_eq!(updated.record.status, OrderStatus::Confirmed);
        assert!(updated.record.updated_at.is_some());

        let cleared = store
            .update_placed(owner, order.id, PlacedOrderChanges::received_quantity(None))
            .await
            .unwrap();
        assert_eq!(cleared.record.received_quantity, None);

        assert_matches!(
            store
                .update_placed(owner, order.id, PlacedOrderChanges::received_quantity(Some(dec!(-1))))
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn typed_changes_are_rechecked() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let order = store.create_received(owner, received("Acme", dec!(3))).await.unwrap().record;

        let err = store
            .update_received(
                owner,
                order.id,
                ReceivedOrderChanges {
                    customer_name: Some(String::new()),
                    rate: Some(dec!(0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["customer_name", "rate"]);
        assert_eq!(store.get_received(owner, order.id).await.unwrap().customer_name, "Acme");

        let supply = store.create_placed(owner, placed("Mill", dec!(10))).await.unwrap().record;
        let err = store
            .update_placed(
                owner,
                supply.id,
                PlacedOrderChanges {
                    party_name: Some("  ".into()),
                    unit: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["party_name", "unit"]);
    }

    #[tokio::test]
    async fn fractional_quantities_are_stored_exactly() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let order = store
            .create_placed(owner, placed("Mill", dec!(98765.4321)))
            .await
            .unwrap()
            .record;
        assert_eq!(order.ordered_quantity, dec!(98765.4321));

        let stored = store.get_placed(owner, order.id).await.unwrap();
        assert_eq!(stored.ordered_quantity, dec!(98765.4321));
        assert_eq!(stored.remaining_quantity, dec!(98765.4321));

        let err = store
            .create_placed(owner, placed("Mill", dec!(12345678901.123456789)))
            .await
            .unwrap_err();
        assert_eq!(err.invalid_fields(), vec!["ordered_quantity"]);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = store().await;
        let owner = Uuid::new_v4();
        let order = store.create_received(owner, received("Acme", dec!(3))).await.unwrap().record;

        let deleted = store.delete_received(owner, order.id).await.unwrap();
        assert_eq!(deleted.record.id, order.id);
        assert_matches!(store.get_received(owner, order.id).await, Err(ServiceError::NotFound(_)));
        assert!(store.list_received(owner).await.unwrap().is_empty());
    }
}
