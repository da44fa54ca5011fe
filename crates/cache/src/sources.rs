//! Collaborators the cache consumes but does not implement.
//!
//! The cache never parses game data itself. Catalog entries come from a
//! [`CatalogExtractor`], relationships between files from a
//! [`DependencyResolver`], and the set of files touched by installed mods
//! from a [`ModListProvider`]. Implementations report their own failures
//! with the matching [`ErrorKind`](crate::error::ErrorKind) (`Extractor`,
//! `Resolver` or `ModList`).

use async_trait::async_trait;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{CatalogDomain, CatalogItem, DependencyLevel, DependencyRoot};

/// Enumerates raw catalog entries straight from the game data.
#[async_trait]
pub trait CatalogExtractor: Send + Sync {
    /// Every entry of one catalog domain, read fresh (never from the cache).
    async fn list_uncached(&self, domain: CatalogDomain) -> Result<Vec<CatalogItem>>;
}

/// Computes the true dependency graph by parsing asset contents.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Files `path` is built from.
    async fn children_of(&self, path: &str) -> Result<Vec<String>>;

    /// Files that are built from `path`.
    async fn parents_of(&self, path: &str) -> Result<Vec<String>>;

    /// Files sharing a parent with `path`.
    async fn siblings_of(&self, path: &str) -> Result<Vec<String>>;

    /// Roots owning `path`. At most one for anything but textures, and empty
    /// for orphaned files.
    async fn roots_of(&self, path: &str) -> Result<Vec<DependencyRoot>>;

    /// Classification deciding how (and whether) edges of `path` are cached.
    fn level_of(&self, path: &str) -> DependencyLevel;

    /// Every meta-level file that belongs to `root`.
    async fn meta_files_under_root(&self, root: &DependencyRoot) -> Result<Vec<String>>;
}

/// Reports which files the active mod set currently modifies.
#[async_trait]
pub trait ModListProvider: Send + Sync {
    async fn active_mod_paths(&self) -> Result<Vec<String>>;
}

/// The collaborators a [`Cache`](crate::Cache) is opened with.
#[derive(Clone)]
pub struct Sources {
    pub extractor: Arc<dyn CatalogExtractor>,
    pub resolver: Arc<dyn DependencyResolver>,
    pub mod_list: Arc<dyn ModListProvider>,
}
impl Sources {
    pub fn new(
        extractor: Arc<dyn CatalogExtractor>,
        resolver: Arc<dyn DependencyResolver>,
        mod_list: Arc<dyn ModListProvider>,
    ) -> Self {
        Self {
            extractor,
            resolver,
            mod_list,
        }
    }
}
impl Debug for Sources {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}
