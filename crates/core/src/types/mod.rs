//! Core types for Trolley.
//!
//! This module provides type-safe wrappers for the cart domain: entity
//! identifiers, the dual client/server item reference, and the cart item
//! itself.

pub mod id;
pub mod item;
pub mod reference;

pub use id::*;
pub use item::{CartItem, ProductInfo, SyncState};
pub use reference::CartRef;
