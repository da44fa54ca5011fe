//! Derived-data cache for the asset dependency graph.
//!
//! This crate keeps a persistent, queryable projection of which content files
//! are built from which, next to catalogs of the content entities that
//! reference them. The cache is not the source of truth: game data and the
//! installed mods are. A stale store is rebuilt from scratch, and individual
//! dependency lookups repair themselves when they miss.
//!
//! # Architecture
//! - [`Database`]: the SQLite store. Any number of readers, one writer at a
//!   time through [`Database::begin_write`].
//! - [`query::Predicate`]: nested `and`/`or` filters compiled to a
//!   parameterized clause, served through [`projector::fetch`] as typed rows.
//! - [`Cache`]: validates the `meta` table against what the running engine
//!   expects and runs the rebuild pipeline when it doesn't match.
//! - [`DependencyCache`]: child lookups with fill-on-miss, meta-group
//!   propagation, and resolver pass-through for everything else.
//! - [`Catalog`]: filtered listings of gear, companions, furniture and UI.
//!
//! Game data itself comes from the collaborators in [`sources`].

mod catalog;
mod db;
mod dependencies;
pub mod error;
mod guard;
mod lifecycle;
mod meta;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod projector;
pub mod query;
mod rebuild;
pub mod row;
pub mod sources;

pub use crate::catalog::{Catalog, category};
pub use crate::db::{Database, PoolSettings, StoreLocation, WriteTransaction};
pub use crate::dependencies::DependencyCache;
pub use crate::lifecycle::{Cache, CacheOptions, Freshness, SCHEMA_VERSION, StaleReason};
pub use crate::sources::Sources;
