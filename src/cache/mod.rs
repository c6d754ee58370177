// Per-owner read-view cache with explicit invalidation

use crate::entities::{order_placed, order_received};
use crate::services::fulfillment::LinkWithOrders;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// A logical read view whose cached contents a write can make stale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum View {
    Received,
    Placed,
    Links,
}

/// The set of views a write affected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedViews(BTreeSet<View>);

impl AffectedViews {
    pub fn only(view: View) -> Self {
        Self(BTreeSet::from([view]))
    }

    /// Every view: link writes change aggregates on both order sides.
    pub fn all() -> Self {
        Self(BTreeSet::from([View::Received, View::Placed, View::Links]))
    }

    pub fn contains(&self, view: View) -> bool {
        self.0.contains(&view)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = View> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<View> {
        self.iter().collect()
    }
}

impl FromIterator<View> for AffectedViews {
    fn from_iter<I: IntoIterator<Item = View>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of a successful write: the written record plus the views it made stale.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome<T> {
    pub record: T,
    pub affected: AffectedViews,
}

impl<T> WriteOutcome<T> {
    pub fn new(record: T, affected: AffectedViews) -> Self {
        Self { record, affected }
    }
}

#[derive(Debug, Clone)]
enum ViewData {
    Received(Arc<Vec<order_received::Model>>),
    Placed(Arc<Vec<order_placed::Model>>),
    Links(Arc<Vec<LinkWithOrders>>),
}

/// Rows that can be cached as a whole view.
pub trait CachedRow: Sized {
    const VIEW: View;

    #[doc(hidden)]
    fn wrap(rows: Arc<Vec<Self>>) -> ViewDataHandle;

    #[doc(hidden)]
    fn unwrap(data: &ViewDataHandle) -> Option<Arc<Vec<Self>>>;
}

/// Opaque storage for a cached view.
#[derive(Debug, Clone)]
pub struct ViewDataHandle(ViewData);

impl CachedRow for order_received::Model {
    const VIEW: View = View::Received;

    fn wrap(rows: Arc<Vec<Self>>) -> ViewDataHandle {
        ViewDataHandle(ViewData::Received(rows))
    }

    fn unwrap(data: &ViewDataHandle) -> Option<Arc<Vec<Self>>> {
        match &data.0 {
            ViewData::Received(rows) => Some(rows.clone()),
            _ => None,
        }
    }
}

impl CachedRow for order_placed::Model {
    const VIEW: View = View::Placed;

    fn wrap(rows: Arc<Vec<Self>>) -> ViewDataHandle {
        ViewDataHandle(ViewData::Placed(rows))
    }

    fn unwrap(data: &ViewDataHandle) -> Option<Arc<Vec<Self>>> {
        match &data.0 {
            ViewData::Placed(rows) => Some(rows.clone()),
            _ => None,
        }
    }
}

impl CachedRow for LinkWithOrders {
    const VIEW: View = View::Links;

    fn wrap(rows: Arc<Vec<Self>>) -> ViewDataHandle {
        ViewDataHandle(ViewData::Links(rows))
    }

    fn unwrap(data: &ViewDataHandle) -> Option<Arc<Vec<Self>>> {
        match &data.0 {
            ViewData::Links(rows) => Some(rows.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: ViewDataHandle,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: ViewDataHandle, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Instant::now() > expires_at
        } else {
            false
        }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// How many times a view has been invalidated, captured on a cache miss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generation(u64);

/// Outcome of [`ViewCache::get`].
#[derive(Debug, Clone)]
pub enum Lookup<R> {
    Hit(Arc<Vec<R>>),
    /// Hand the generation back to [`ViewCache::put`] with the freshly loaded rows.
    Miss(Generation),
}

impl<R> Lookup<R> {
    pub fn into_hit(self) -> Option<Arc<Vec<R>>> {
        match self {
            Lookup::Hit(rows) => Some(rows),
            Lookup::Miss(_) => None,
        }
    }
}

/// Cache of whole list views, keyed by owner and view.
///
/// Cloning shares the underlying store. Writers must call
/// [`ViewCache::invalidate`] with the views their write affected before the
/// next read is served. A view loaded before an invalidation is never
/// stored after it: `put` only accepts rows tagged with the current
/// generation.
#[derive(Debug, Clone)]
pub struct ViewCache {
    store: Arc<DashMap<(Uuid, View), CacheEntry>>,
    generations: Arc<DashMap<(Uuid, View), u64>>,
    ttl: Option<Duration>,
    enabled: bool,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ViewCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            ttl,
            enabled: true,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A cache that never stores anything; every read goes to the database.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(None)
        }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        if config.enabled {
            Self::new(Some(Duration::from_secs(config.ttl_secs)))
        } else {
            Self::disabled()
        }
    }

    pub fn get<R: CachedRow>(&self, owner_id: Uuid) -> Lookup<R> {
        if !self.enabled {
            return Lookup::Miss(Generation::default());
        }

        let key = (owner_id, R::VIEW);
        // The read guard must be released before removing an expired entry.
        let (cached, expired) = match self.store.get(&key) {
            Some(entry) if entry.is_expired() => (None, true),
            Some(entry) => (R::unwrap(&entry.data), false),
            None => (None, false),
        };
        if expired {
            self.store.remove(&key);
        }

        match cached {
            Some(rows) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(owner_id = %owner_id, view = %R::VIEW, "View cache hit");
                Lookup::Hit(rows)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(owner_id = %owner_id, view = %R::VIEW, "View cache miss");
                let generation = self.generations.get(&key).map_or(0, |g| *g);
                Lookup::Miss(Generation(generation))
            }
        }
    }

    /// Stores rows loaded after the miss that returned `generation`.
    ///
    /// Rows are returned either way; they are only cached when no
    /// invalidation of the view happened since that miss.
    pub fn put<R: CachedRow>(
        &self,
        owner_id: Uuid,
        rows: Vec<R>,
        generation: Generation,
    ) -> Arc<Vec<R>> {
        let rows = Arc::new(rows);
        if !self.enabled {
            return rows;
        }

        let key = (owner_id, R::VIEW);
        // Held until the insert is done so an invalidation cannot slip in between.
        let current = self.generations.entry(key).or_insert(0);
        if *current == generation.0 {
            self.store.insert(key, CacheEntry::new(R::wrap(rows.clone()), self.ttl));
        } else {
            debug!(
                owner_id = %owner_id,
                view = %R::VIEW,
                "Discarded view loaded before an invalidation"
            );
        }
        drop(current);
        rows
    }

    /// Drops the cached views `affected` for `owner_id`.
    pub fn invalidate(&self, owner_id: Uuid, affected: &AffectedViews) {
        for view in affected.iter() {
            let key = (owner_id, view);
            let mut generation = self.generations.entry(key).or_insert(0);
            *generation += 1;
            self.store.remove(&key);
        }
        debug!(owner_id = %owner_id, views = ?affected.to_vec(), "View cache invalidated");
    }

    pub fn invalidate_owner(&self, owner_id: Uuid) {
        self.invalidate(owner_id, &AffectedViews::all());
    }

    pub fn is_cached(&self, owner_id: Uuid, view: View) -> bool {
        self.store
            .get(&(owner_id, view))
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::OrderStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn received_row(owner_id: Uuid, number: i64) -> order_received::Model {
        order_received::Model {
            id: Uuid::new_v4(),
            owner_id,
            order_number: number,
            customer_name: "Acme".into(),
            item_name: "Twill".into(),
            sku: None,
            ordered_quantity: dec!(10),
            unit: "mtrs".into(),
            rate: None,
            notes: None,
            custom_fields: None,
            dispatched_quantity: dec!(0),
            status: OrderStatus::Confirmed,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn put_then_get_hits() {
        let cache = ViewCache::default();
        let owner = Uuid::new_v4();
        let generation = match cache.get::<order_received::Model>(owner) {
            Lookup::Miss(generation) => generation,
            Lookup::Hit(_) => panic!("empty cache hit"),
        };

        cache.put(owner, vec![received_row(owner, 1)], generation);
        let rows = cache
            .get::<order_received::Model>(owner)
            .into_hit()
            .expect("cached");
        assert_eq!(rows.len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn invalidate_only_touches_affected_views_of_owner() {
        let cache = ViewCache::default();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        cache.put(owner, vec![received_row(owner, 1)], Generation::default());
        cache.put::<order_placed::Model>(owner, Vec::new(), Generation::default());
        cache.put(other, vec![received_row(other, 1)], Generation::default());

        cache.invalidate(owner, &AffectedViews::only(View::Received));

        assert!(!cache.is_cached(owner, View::Received));
        assert!(cache.is_cached(owner, View::Placed));
        assert!(cache.is_cached(other, View::Received));

        cache.invalidate_owner(owner);
        assert!(!cache.is_cached(owner, View::Placed));
        assert!(cache.is_cached(other, View::Received));
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = ViewCache::new(Some(Duration::from_millis(0)));
        let owner = Uuid::new_v4();
        cache.put(owner, vec![received_row(owner, 1)], Generation::default());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get::<order_received::Model>(owner).into_hit().is_none());
    }

    #[test]
    fn disabled_cache_never_serves() {
        let cache = ViewCache::disabled();
        let owner = Uuid::new_v4();
        let rows = cache.put(owner, vec![received_row(owner, 1)], Generation::default());
        assert_eq!(rows.len(), 1);
        assert!(cache.get::<order_received::Model>(owner).into_hit().is_none());
    }

    #[test]
    fn rows_loaded_before_an_invalidation_are_not_stored() {
        let cache = ViewCache::default();
        let owner = Uuid::new_v4();
        let generation = match cache.get::<order_received::Model>(owner) {
            Lookup::Miss(generation) => generation,
            Lookup::Hit(_) => panic!("empty cache hit"),
        };

        // A write commits between the reader's load and its put.
        cache.invalidate(owner, &AffectedViews::only(View::Received));
        let rows = cache.put(owner, vec![received_row(owner, 1)], generation);

        assert_eq!(rows.len(), 1);
        assert!(!cache.is_cached(owner, View::Received));

        // Unrelated views keep their generation.
        let placed = match cache.get::<order_placed::Model>(owner) {
            Lookup::Miss(generation) => generation,
            Lookup::Hit(_) => panic!("empty cache hit"),
        };
        cache.put::<order_placed::Model>(owner, Vec::new(), placed);
        assert!(cache.is_cached(owner, View::Placed));
    }

    #[test]
    fn all_views_affected_by_link_writes() {
        let views = AffectedViews::all();
        assert_eq!(views.to_vec(), vec![View::Received, View::Placed, View::Links]);
        assert_eq!(View::Links.to_string(), "links");
    }
}
