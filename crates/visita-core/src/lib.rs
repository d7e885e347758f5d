//! Core types and trait definitions for the official visits engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Every other crate depends on it: the store implements [`store::VisitStore`],
//! the clients implement the query ports in [`ports`], and the engine drives
//! both.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod codes;
pub mod error;
pub mod event;
pub mod overlap;
pub mod ports;
pub mod reconcile;
pub mod reference;
pub mod slot;
pub mod store;
pub mod visit;

pub use error::{Error, Result, ValidationErrors};
