//! Trolley Engine - the cart synchronization engine.
//!
//! Keeps a shopping cart consistent across three unreliable surfaces: the
//! in-memory session view, a durable local cache, and a remote persistence
//! service. Mutations apply to memory synchronously and are visible to
//! readers immediately; propagation to the remote store and mirroring to the
//! cache happen on detached background tasks that never block or revert a
//! user-visible change.
//!
//! # Modules
//!
//! - [`service`] - [`CartService`], the reconciliation engine and the only
//!   entry point consumers need
//! - [`resolver`] - lookup of items by either identifier scheme
//! - [`remote`] - the remote cart service boundary ([`CartRemote`]) and its
//!   HTTP implementation
//! - [`cache`] - the durable cache boundary ([`CartCache`]) and its JSON
//!   file implementation
//! - [`snapshot`] - the read-only view published to consumers
//! - [`config`] - engine configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use trolley_engine::{CartService, config::EngineConfig};
//!
//! let service = CartService::from_config(&config)?;
//! service.bootstrap().await;
//!
//! let item = service.add_item(product, 2, None)?;
//! let snapshot = service.snapshot();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod remote;
pub mod resolver;
pub mod service;
pub mod snapshot;

pub use cache::{CacheError, CartCache, JsonFileCache};
pub use remote::{CartRemote, HttpCartRemote, RemoteCartRecord, RemoteError};
pub use service::CartService;
pub use snapshot::CartSnapshot;
