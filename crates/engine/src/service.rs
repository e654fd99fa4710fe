//! The cart reconciliation engine.
//!
//! [`CartService`] owns the authoritative in-memory cart. Mutations apply
//! synchronously under a short-lived lock and return as soon as memory is
//! updated; nothing the remote store does later can block, fail, or revert
//! a change the caller already observed. Each mutation then:
//!
//! 1. spawns a detached task that pushes the change to the remote store and
//!    settles the item's [`SyncState`] when the call completes, and
//! 2. mirrors the full cart to the durable cache, also in the background;
//!    saves are sequenced so the cache file never rolls back to an older
//!    snapshot.
//!
//! # Concurrency model
//!
//! State lives behind a `std::sync::Mutex` that is only ever held for
//! in-memory work, never across an `await`. Background completions re-find
//! their item by client reference and compare the item's `revision` against
//! the value captured at dispatch: a mismatch means the user changed the
//! item while the call was on the wire, and the completion must not clobber
//! the newer state. In-flight creates are additionally tracked by client
//! reference so that a second mutation of a still-unconfirmed item does not
//! race a duplicate create; the original create's completion sends the
//! follow-up update instead.
//!
//! The service must live inside a Tokio runtime: mutations spawn background
//! tasks and will panic without one.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::Notify;
use tracing::instrument;

use trolley_core::{CartError, CartItem, CartRef, ClientRef, ProductInfo, ServerId, SyncState};

use crate::cache::{CartCache, JsonFileCache};
use crate::config::EngineConfig;
use crate::remote::{CartRemote, HttpCartRemote, RemoteCartRecord, RemoteError};
use crate::resolver;
use crate::snapshot::CartSnapshot;

/// The cart synchronization engine.
///
/// Cheap to clone; all clones share one cart. One instance serves the whole
/// process.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<CartState>,
    remote: Arc<dyn CartRemote>,
    cache: Arc<dyn CartCache>,
    /// Guards [`CartService::bootstrap`] so it runs at most once.
    bootstrapped: AtomicBool,
    /// Set once startup reconciliation has installed an initial cart.
    ready: AtomicBool,
    /// Background tasks (propagation and cache saves) not yet completed.
    in_flight: AtomicUsize,
    /// Signalled whenever `in_flight` drops to zero.
    settled: Notify,
    /// Serializes cache writes. Holds the sequence number of the last
    /// snapshot written, so a save that lost the race to a newer snapshot
    /// is dropped instead of rolling the cache file backwards.
    cache_writer: tokio::sync::Mutex<u64>,
}

#[derive(Default)]
struct CartState {
    items: Vec<CartItem>,
    /// Client references with a create call currently on the wire. A
    /// reference in this set means further mutations must not dispatch
    /// anything; the create's completion owns the follow-up.
    creates_in_flight: HashSet<ClientRef>,
    /// Sequence of the most recent cache snapshot, assigned under this lock
    /// so snapshot order matches mutation order.
    save_seq: u64,
}

/// How a just-mutated item reaches the remote store.
enum Propagation {
    Create,
    Update(ServerId),
    /// A create for this item is already in flight; its completion will
    /// notice the newer revision and follow up.
    Skip,
}

/// Decide the remote call for a mutated item, claiming the create slot when
/// the decision is to create.
///
/// An item with a server identifier always updates. Without one, it creates
/// unless a create is already in flight - that covers brand-new items,
/// retries after a failed create, and cache-restored items the remote store
/// has no record of.
fn plan_propagation(state: &mut CartState, item: &CartItem) -> Propagation {
    match &item.server_id {
        Some(id) => Propagation::Update(id.clone()),
        None => {
            if state.creates_in_flight.contains(&item.client_ref) {
                Propagation::Skip
            } else {
                state.creates_in_flight.insert(item.client_ref.clone());
                Propagation::Create
            }
        }
    }
}

impl CartService {
    /// Build a service over explicit boundary implementations.
    #[must_use]
    pub fn new(remote: Arc<dyn CartRemote>, cache: Arc<dyn CartCache>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CartState::default()),
                remote,
                cache,
                bootstrapped: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                settled: Notify::new(),
                cache_writer: tokio::sync::Mutex::new(0),
            }),
        }
    }

    /// Build a service with the HTTP remote and JSON file cache from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &EngineConfig) -> Result<Self, RemoteError> {
        let remote = HttpCartRemote::new(&config.remote)?;
        let cache = JsonFileCache::new(config.cache_path.clone());
        Ok(Self::new(Arc::new(remote), Arc::new(cache)))
    }

    // =========================================================================
    // Startup reconciliation
    // =========================================================================

    /// Populate the cart: from the remote store if it answers, from the
    /// durable cache if not, empty as the last resort.
    ///
    /// Runs at most once per service; later calls are no-ops. Never fails -
    /// every fallback ends with a usable (possibly empty) cart and the
    /// service marked ready.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) {
        if self.inner.bootstrapped.swap(true, Ordering::SeqCst) {
            tracing::debug!("bootstrap already ran");
            return;
        }

        let items = match self.inner.remote.fetch_all().await {
            Ok(records) => {
                tracing::info!(records = records.len(), "hydrated cart from remote store");
                records
                    .into_iter()
                    .filter_map(|record| {
                        if record.quantity == 0 {
                            tracing::warn!(id = ?record.id, "dropping remote record with zero quantity");
                            None
                        } else {
                            Some(record.into_item())
                        }
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote store unavailable at startup; falling back to cache");
                self.load_cached_items().await
            }
        };

        self.install_items(items);
    }

    async fn load_cached_items(&self) -> Vec<CartItem> {
        match self.inner.cache.load().await {
            Ok(Some(mut items)) => {
                // Cached state is unverified against the remote store until
                // something propagates again.
                for item in &mut items {
                    item.sync_state = SyncState::Pending;
                }
                tracing::info!(items = items.len(), "hydrated cart from durable cache");
                items
            }
            Ok(None) => {
                tracing::info!("no cached cart; starting empty");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "cart cache unreadable; starting empty");
                Vec::new()
            }
        }
    }

    fn install_items(&self, items: Vec<CartItem>) {
        {
            let mut state = self.lock_state();
            if !state.items.is_empty() {
                tracing::warn!(
                    replaced = state.items.len(),
                    "bootstrap replacing items added before readiness"
                );
            }
            state.items = items;
        }
        self.inner.ready.store(true, Ordering::SeqCst);
        self.persist_current();
    }

    /// Whether startup reconciliation has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Point-in-time copy of the cart. Never blocks mutations and never
    /// changes after it is taken.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.lock_state().items.clone(),
            is_ready: self.is_ready(),
        }
    }

    /// Total units currently in the cart; a line with quantity 3 counts 3.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lock_state()
            .items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Total price of the cart, recomputed from the current items on every
    /// call. Saturates at the `Decimal` range limits.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lock_state()
            .items
            .iter()
            .map(CartItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product` to the cart.
    ///
    /// If the product is already in the cart the quantities merge into the
    /// existing line and `notes` is ignored; annotate the line afterwards
    /// with [`Self::set_notes`]. Returns the affected line as the caller
    /// now sees it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if `quantity` is zero.
    #[instrument(skip(self, product, notes), fields(product_id = %product.product_id))]
    pub fn add_item(
        &self,
        product: ProductInfo,
        quantity: u32,
        notes: Option<String>,
    ) -> Result<CartItem, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let (item, plan) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;

            let item = if let Some(existing) = state
                .items
                .iter_mut()
                .find(|item| item.product_id == product.product_id)
            {
                existing.quantity = existing.quantity.saturating_add(quantity);
                existing.sync_state = SyncState::Pending;
                existing.revision += 1;
                existing.clone()
            } else {
                let item = CartItem::new(product, quantity, notes);
                state.items.push(item.clone());
                item
            };

            let plan = plan_propagation(state, &item);
            (item, plan)
        };

        self.dispatch(plan, &item);
        self.persist_current();
        Ok(item)
    }

    /// Set the quantity of the item `item_ref` points at.
    ///
    /// A quantity of zero removes the item; the cart never holds zero-unit
    /// lines.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if nothing matches `item_ref`.
    #[instrument(skip(self), fields(item_ref = %item_ref))]
    pub fn set_quantity(&self, item_ref: &CartRef, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            tracing::debug!("quantity zero requested; removing item");
            return self.remove_item(item_ref);
        }

        let (item, plan) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let item = resolver::resolve_mut(&mut state.items, item_ref)
                .ok_or_else(|| CartError::ItemNotFound(item_ref.clone()))?;

            item.quantity = quantity;
            item.sync_state = SyncState::Pending;
            item.revision += 1;
            let item = item.clone();

            let plan = plan_propagation(state, &item);
            (item, plan)
        };

        self.dispatch(plan, &item);
        self.persist_current();
        Ok(())
    }

    /// Set or clear the free-text notes on the item `item_ref` points at.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if nothing matches `item_ref`.
    #[instrument(skip(self, notes), fields(item_ref = %item_ref))]
    pub fn set_notes(&self, item_ref: &CartRef, notes: Option<String>) -> Result<(), CartError> {
        let (item, plan) = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let item = resolver::resolve_mut(&mut state.items, item_ref)
                .ok_or_else(|| CartError::ItemNotFound(item_ref.clone()))?;

            item.notes = notes;
            item.sync_state = SyncState::Pending;
            item.revision += 1;
            let item = item.clone();

            let plan = plan_propagation(state, &item);
            (item, plan)
        };

        self.dispatch(plan, &item);
        self.persist_current();
        Ok(())
    }

    /// Remove the item `item_ref` points at.
    ///
    /// The removal is final locally no matter what the remote delete later
    /// does; a failed delete is logged, never resurrected.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if nothing matches `item_ref`.
    #[instrument(skip(self), fields(item_ref = %item_ref))]
    pub fn remove_item(&self, item_ref: &CartRef) -> Result<(), CartError> {
        let removed = {
            let mut state = self.lock_state();
            let index = resolver::position(&state.items, item_ref)
                .ok_or_else(|| CartError::ItemNotFound(item_ref.clone()))?;
            state.items.remove(index)
        };

        if let Some(server_id) = removed.server_id {
            self.spawn_delete(server_id);
        } else {
            tracing::debug!(
                client_ref = %removed.client_ref,
                "removed item never reached the remote store; nothing to delete"
            );
        }
        self.persist_current();
        Ok(())
    }

    /// Empty the cart. The local clear is immediate; one remote delete is
    /// issued per server-confirmed item.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let removed = {
            let mut state = self.lock_state();
            std::mem::take(&mut state.items)
        };

        if removed.is_empty() {
            return;
        }

        tracing::info!(items = removed.len(), "clearing cart");
        for item in removed {
            if let Some(server_id) = item.server_id {
                self.spawn_delete(server_id);
            }
        }
        self.persist_current();
    }

    // =========================================================================
    // Background propagation
    // =========================================================================

    fn dispatch(&self, plan: Propagation, item: &CartItem) {
        match plan {
            Propagation::Create => self.spawn_create(item.clone()),
            Propagation::Update(server_id) => self.spawn_update(server_id, item.clone()),
            Propagation::Skip => {
                tracing::debug!(
                    client_ref = %item.client_ref,
                    "create already in flight; deferring to its completion"
                );
            }
        }
    }

    fn spawn_create(&self, item: CartItem) {
        let service = self.clone();
        self.spawn_background(async move {
            let record = RemoteCartRecord::from(&item);
            match service.inner.remote.create(&record).await {
                Ok(server_id) => {
                    service
                        .finish_create(item.client_ref, server_id, item.revision)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        client_ref = %item.client_ref,
                        "cart item create failed; marking failed"
                    );
                    service.fail_create(&item.client_ref);
                }
            }
        });
    }

    /// Settle a successful create.
    ///
    /// The server identifier is recorded unconditionally - it is write-once
    /// and valid whatever happened to the item since. If the item changed
    /// while the create was on the wire, the value the store now holds is
    /// stale and a follow-up update with the current fields goes out before
    /// anything is marked synced.
    async fn finish_create(&self, client_ref: ClientRef, server_id: ServerId, sent_revision: u64) {
        let follow_up = {
            let mut state = self.lock_state();
            state.creates_in_flight.remove(&client_ref);

            match state
                .items
                .iter_mut()
                .find(|item| item.client_ref == client_ref)
            {
                Some(item) => {
                    item.server_id = Some(server_id.clone());
                    if item.revision == sent_revision {
                        item.sync_state = SyncState::Synced;
                        None
                    } else {
                        tracing::debug!(
                            %client_ref,
                            "item changed while create was in flight; sending follow-up update"
                        );
                        Some(item.clone())
                    }
                }
                None => {
                    tracing::debug!(%client_ref, "item removed while create was in flight");
                    None
                }
            }
        };

        self.persist_current();
        if let Some(item) = follow_up {
            self.push_update(&server_id, item).await;
        }
    }

    fn fail_create(&self, client_ref: &ClientRef) {
        let changed = {
            let mut state = self.lock_state();
            state.creates_in_flight.remove(client_ref);

            match state
                .items
                .iter_mut()
                .find(|item| item.client_ref == *client_ref)
            {
                Some(item) => {
                    item.sync_state = SyncState::Failed;
                    true
                }
                None => false,
            }
        };

        if changed {
            self.persist_current();
        }
    }

    fn spawn_update(&self, server_id: ServerId, item: CartItem) {
        let service = self.clone();
        self.spawn_background(async move {
            service.push_update(&server_id, item).await;
        });
    }

    async fn push_update(&self, server_id: &ServerId, item: CartItem) {
        let record = RemoteCartRecord::from(&item);
        match self.inner.remote.update(server_id, &record).await {
            Ok(()) => self.settle_update(&item.client_ref, item.revision, SyncState::Synced),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    client_ref = %item.client_ref,
                    "cart item update failed; marking failed"
                );
                self.settle_update(&item.client_ref, item.revision, SyncState::Failed);
            }
        }
    }

    /// Settle a completed update, but only if the item has not changed
    /// since the update was dispatched. A stale completion leaves the state
    /// to whichever newer mutation owns it now.
    fn settle_update(&self, client_ref: &ClientRef, sent_revision: u64, outcome: SyncState) {
        let changed = {
            let mut state = self.lock_state();
            match state
                .items
                .iter_mut()
                .find(|item| item.client_ref == *client_ref)
            {
                Some(item) if item.revision == sent_revision => {
                    item.sync_state = outcome;
                    true
                }
                Some(_) => {
                    tracing::debug!(%client_ref, "dropping stale completion");
                    false
                }
                None => false,
            }
        };

        if changed {
            self.persist_current();
        }
    }

    fn spawn_delete(&self, server_id: ServerId) {
        let service = self.clone();
        self.spawn_background(async move {
            if let Err(e) = service.inner.remote.delete(&server_id).await {
                // The item is already gone locally; the remote record may
                // linger until the next startup reconciliation.
                tracing::warn!(error = %e, %server_id, "cart item delete failed");
            }
        });
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    /// Mirror the current cart to the durable cache, in the background.
    /// Never called with the state lock held.
    ///
    /// Each snapshot takes a sequence number under the state lock, and the
    /// save tasks funnel through `cache_writer` one at a time: a snapshot
    /// that was superseded before its turn is skipped, so the cache file
    /// always converges to the newest state no matter how the spawned tasks
    /// interleave.
    fn persist_current(&self) {
        let (items, seq) = {
            let mut state = self.lock_state();
            state.save_seq += 1;
            (state.items.clone(), state.save_seq)
        };
        let service = self.clone();
        self.spawn_background(async move {
            let mut last_saved = service.inner.cache_writer.lock().await;
            if seq <= *last_saved {
                tracing::debug!(seq, "cache snapshot superseded; skipping save");
                return;
            }
            match service.inner.cache.save(&items).await {
                Ok(()) => *last_saved = seq,
                Err(e) => tracing::warn!(error = %e, "failed to persist cart cache"),
            }
        });
    }

    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            task.await;
            if inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.settled.notify_waiters();
            }
        });
    }

    /// Wait until no background work (propagation or cache saves) is in
    /// flight. Shutdown uses this to drain; tests use it to make background
    /// outcomes observable.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.settled.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
