//! Implementations of the `visita-core` query ports.
//!
//! [`HttpQueries`] talks to the real systems of record over HTTP.
//! [`InMemoryQueries`] answers from a fixed [`Directory`] and backs offline
//! runs and tests.

pub mod error;
pub mod http;
pub mod memory;

pub use error::{ClientError, Result};
pub use http::{HttpQueries, LookupConfig};
pub use memory::{Directory, InMemoryQueries};
