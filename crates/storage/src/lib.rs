//! Persistence for the storefront: catalog, carts, settings, orders.
//!
//! Two backends implement the same [`Store`] traits: [`InMemoryStore`] for
//! tests and database-less runs, and [`PgStore`] over PostgreSQL. Checkout
//! and owner stock edits go through a [`Transaction`] that holds row locks
//! until commit.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::{InMemoryStore, MemoryState};
pub use postgres::PgStore;
pub use store::{
    CartStore, CatalogStore, CustomerDirectory, OrderArchiveStore, OrderStats, PromoStore,
    SettingsStore, Store, StoreExt, Transaction,
};
