//! Order fulfillment ledger
//!
//! Tracks orders received from customers, orders placed with suppliers, and
//! the fulfillment links allocating supply to demand. Derived quantities and
//! statuses on both order sides are recomputed from the links on every write.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod migrator;
pub mod services;
pub mod validation;

pub use auth::{JwtSession, SessionProvider, StaticSession};
pub use cache::{AffectedViews, Generation, Lookup, View, ViewCache, WriteOutcome};
pub use entities::OrderStatus;
pub use errors::ServiceError;
pub use ledger::{Dashboard, Ledger};
