//! Trolley Core - Shared cart types library.
//!
//! This crate provides the domain types used across all Trolley components:
//! - `engine` - The cart synchronization engine
//! - `server` - HTTP surface exposing the engine's entry points
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no async runtime. This keeps it lightweight and allows it to be
//! used anywhere, including test fixtures.
//!
//! # Modules
//!
//! - [`types`] - Cart items, identifiers, and the dual-identifier reference
//! - [`error`] - Caller-facing cart errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod types;

pub use error::CartError;
pub use types::*;
