//! Integration tests for Trolley.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p trolley-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - engine behavior: optimistic mutations, background
//!   propagation, startup reconciliation
//! - `server_api` - the HTTP surface, driven in-process through the router
//!
//! # Test Doubles
//!
//! The doubles here are deterministic stand-ins for the engine's two
//! boundaries. [`MockRemote`] records every call in order, can fail any
//! operation class, and can gate create calls so tests can interleave
//! mutations with an in-flight create. [`MemoryCache`] holds the durable
//! cache slot in memory and counts saves. Combined with
//! `CartService::settled`, background outcomes become observable without
//! sleeps.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use trolley_core::{CartItem, ProductId, ProductInfo, ServerId};
use trolley_engine::cache::{CacheError, CartCache};
use trolley_engine::remote::{CartRemote, RemoteCartRecord, RemoteError};
use trolley_engine::CartService;

// =============================================================================
// Remote double
// =============================================================================

/// One call the engine made against the remote boundary, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    FetchAll,
    Create(RemoteCartRecord),
    Update(ServerId, RemoteCartRecord),
    Delete(ServerId),
}

/// In-memory remote cart service.
///
/// Assigns identifiers `srv-1`, `srv-2`, ... on create. Operations answer
/// immediately unless creates are gated via [`MockRemote::hold_creates`],
/// in which case each create blocks until [`MockRemote::allow_create`]
/// releases it.
pub struct MockRemote {
    store: Mutex<Vec<(ServerId, RemoteCartRecord)>>,
    calls: Mutex<Vec<RemoteCall>>,
    next_id: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    gate_creates: AtomicBool,
    create_gate: Semaphore,
}

impl MockRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            gate_creates: AtomicBool::new(false),
            create_gate: Semaphore::new(0),
        }
    }

    /// Pre-populate the remote store, as if earlier sessions created records.
    pub fn seed_record(&self, record: RemoteCartRecord) {
        let id = record.id.clone().unwrap_or_else(|| {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            ServerId::new(format!("srv-{n}"))
        });
        let mut stored = record;
        stored.id = Some(id.clone());
        lock(&self.store).push((id, stored));
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Current remote store contents, in creation order.
    #[must_use]
    pub fn records(&self) -> Vec<RemoteCartRecord> {
        lock(&self.store)
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent creates block until released.
    pub fn hold_creates(&self) {
        self.gate_creates.store(true, Ordering::SeqCst);
    }

    /// Release exactly one held create.
    pub fn allow_create(&self) {
        self.create_gate.add_permits(1);
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CartRemote for MockRemote {
    async fn fetch_all(&self) -> Result<Vec<RemoteCartRecord>, RemoteError> {
        lock(&self.calls).push(RemoteCall::FetchAll);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.records())
    }

    async fn create(&self, record: &RemoteCartRecord) -> Result<ServerId, RemoteError> {
        if self.gate_creates.load(Ordering::SeqCst) {
            // The semaphore is never closed, so acquisition only fails in
            // teardown races we do not care about.
            if let Ok(permit) = self.create_gate.acquire().await {
                permit.forget();
            }
        }

        lock(&self.calls).push(RemoteCall::Create(record.clone()));
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = ServerId::new(format!("srv-{n}"));
        let mut stored = record.clone();
        stored.id = Some(id.clone());
        lock(&self.store).push((id.clone(), stored));
        Ok(id)
    }

    async fn update(&self, id: &ServerId, record: &RemoteCartRecord) -> Result<(), RemoteError> {
        lock(&self.calls).push(RemoteCall::Update(id.clone(), record.clone()));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut store = lock(&self.store);
        match store.iter_mut().find(|(stored_id, _)| stored_id == id) {
            Some((_, stored)) => {
                *stored = record.clone();
                stored.id = Some(id.clone());
                Ok(())
            }
            None => Err(RemoteError::Status {
                status: 404,
                message: "no such record".to_string(),
            }),
        }
    }

    async fn delete(&self, id: &ServerId) -> Result<(), RemoteError> {
        lock(&self.calls).push(RemoteCall::Delete(id.clone()));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut store = lock(&self.store);
        let before = store.len();
        store.retain(|(stored_id, _)| stored_id != id);
        if store.len() == before {
            return Err(RemoteError::Status {
                status: 404,
                message: "no such record".to_string(),
            });
        }
        Ok(())
    }
}

fn unavailable() -> RemoteError {
    RemoteError::Status {
        status: 503,
        message: "service unavailable".to_string(),
    }
}

// =============================================================================
// Cache double
// =============================================================================

/// In-memory durable cache slot.
#[derive(Default)]
pub struct MemoryCache {
    slot: Mutex<Option<Vec<CartItem>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryCache {
    /// Pre-populate the slot, as if a previous session saved it.
    pub fn seed(&self, items: Vec<CartItem>) {
        *lock(&self.slot) = Some(items);
    }

    /// Current slot contents; `None` means nothing was ever saved.
    #[must_use]
    pub fn contents(&self) -> Option<Vec<CartItem>> {
        lock(&self.slot).clone()
    }

    /// How many saves were attempted (including failed ones).
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CartCache for MemoryCache {
    async fn load(&self) -> Result<Option<Vec<CartItem>>, CacheError> {
        Ok(self.contents())
    }

    async fn save(&self, items: &[CartItem]) -> Result<(), CacheError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CacheError::Io(std::io::Error::other(
                "simulated save failure",
            )));
        }
        *lock(&self.slot) = Some(items.to_vec());
        Ok(())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// A catalog product with deterministic fields: `Product {id}` priced at
/// `{id}.00`.
#[must_use]
pub fn product(product_id: i64) -> ProductInfo {
    ProductInfo {
        product_id: ProductId::new(product_id),
        name: format!("Product {product_id}"),
        image: format!("/images/{product_id}.jpg"),
        price: Decimal::new(product_id * 100, 2),
    }
}

/// A remote record for [`product`] under the given server identifier.
#[must_use]
pub fn record(id: &str, product_id: i64, quantity: u32) -> RemoteCartRecord {
    let product = product(product_id);
    RemoteCartRecord {
        id: Some(ServerId::new(id)),
        product_id: product.product_id,
        name: product.name,
        image: product.image,
        price: product.price,
        quantity,
        notes: None,
    }
}

/// A cart service wired to fresh doubles. Not yet bootstrapped.
#[must_use]
pub fn test_service() -> (CartService, Arc<MockRemote>, Arc<MemoryCache>) {
    let remote = Arc::new(MockRemote::new());
    let cache = Arc::new(MemoryCache::default());
    let service = CartService::new(remote.clone(), cache.clone());
    (service, remote, cache)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
