//! Trolley server library.
//!
//! The HTTP surface over the cart synchronization engine, exposed as a
//! library so the handlers and configuration can be exercised by tests
//! without a running binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
