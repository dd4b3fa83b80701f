//! Transactional storage for the salon booking core.
//!
//! Every write is expressed as a [`UnitOfWork`] and applied atomically by a
//! [`BookingStore`]. Two implementations are provided:
//! - [`InMemoryStore`] for tests and database-less runs
//! - [`PostgresStore`] backed by sqlx, with the overlap rule enforced by an
//!   exclusion constraint

pub mod constraints;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{BookingStore, Change, Record, UnitOfWork, inserted, updated};
