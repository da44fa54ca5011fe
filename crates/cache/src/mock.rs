//! In-memory collaborators for testing.
//!
//! Each mock counts the calls made against it and can be told to fail, so
//! tests can assert on cache policy (fill-on-miss, single-flight rebuilds,
//! failure markers) without real game data.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ErrorKind, Result};
use crate::models::{CatalogDomain, CatalogItem, DependencyLevel, DependencyRoot};
use crate::sources::{CatalogExtractor, DependencyResolver, ModListProvider, Sources};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Extractor serving fixed per-domain lists.
///
/// Domains without a list enumerate as empty.
#[derive(Default)]
pub struct MockExtractor {
    lists: Mutex<HashMap<CatalogDomain, Vec<CatalogItem>>>,
    calls: Mutex<Vec<CatalogDomain>>,
    fail_on: Mutex<Option<CatalogDomain>>,
}
impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(self, domain: CatalogDomain, items: impl IntoIterator<Item = CatalogItem>) -> Self {
        self.set_list(domain, items);
        self
    }

    pub fn set_list(&self, domain: CatalogDomain, items: impl IntoIterator<Item = CatalogItem>) {
        lock(&self.lists).insert(domain, items.into_iter().collect());
    }

    /// Make listing `domain` fail (or stop failing with `None`).
    pub fn fail_on(&self, domain: Option<CatalogDomain>) {
        *lock(&self.fail_on) = domain;
    }

    /// Every domain listed so far, in call order.
    pub fn calls(&self) -> Vec<CatalogDomain> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}
#[async_trait]
impl CatalogExtractor for MockExtractor {
    async fn list_uncached(&self, domain: CatalogDomain) -> Result<Vec<CatalogItem>> {
        lock(&self.calls).push(domain);
        if *lock(&self.fail_on) == Some(domain) {
            exn::bail!(ErrorKind::Extractor);
        }
        Ok(lock(&self.lists).get(&domain).cloned().unwrap_or_default())
    }
}

/// Resolver backed by an explicit child map.
///
/// Parents are derived by inverting the child map, and siblings are the
/// other children of the file's parents. Levels default by extension:
/// `.tex` is a texture, `.meta` is meta, `.mdl`/`.mtrl`/`.avfx` are other,
/// anything else is invalid.
#[derive(Default)]
pub struct MockResolver {
    children: Mutex<HashMap<String, Vec<String>>>,
    roots: Mutex<HashMap<String, Vec<DependencyRoot>>>,
    meta_files: Mutex<HashMap<DependencyRoot, Vec<String>>>,
    levels: Mutex<HashMap<String, DependencyLevel>>,
    child_calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
    failing: AtomicBool,
}
impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children<I, S>(self, path: &str, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_children(path, children);
        self
    }

    /// Replace the authoritative child set of `path`.
    pub fn set_children<I, S>(&self, path: &str, children: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.children).insert(path.to_string(), children.into_iter().map(Into::into).collect());
    }

    /// Register `files` as the meta group of `root`, and `root` as the root
    /// of each of them.
    pub fn with_meta_group<I, S>(self, root: &str, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = DependencyRoot::new(root);
        let files: Vec<String> = files.into_iter().map(Into::into).collect();
        {
            let mut roots = lock(&self.roots);
            for file in &files {
                roots.insert(file.clone(), vec![root.clone()]);
            }
        }
        lock(&self.meta_files).insert(root, files);
        self
    }

    pub fn with_level(self, path: &str, level: DependencyLevel) -> Self {
        lock(&self.levels).insert(path.to_string(), level);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many times the children of `path` were resolved.
    pub fn child_calls(&self, path: &str) -> usize {
        lock(&self.child_calls).get(path).copied().unwrap_or_default()
    }

    /// Calls made against any async resolver method.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Resolver);
        }
        Ok(())
    }
}
#[async_trait]
impl DependencyResolver for MockResolver {
    async fn children_of(&self, path: &str) -> Result<Vec<String>> {
        *lock(&self.child_calls).entry(path.to_string()).or_default() += 1;
        self.enter()?;
        Ok(lock(&self.children).get(path).cloned().unwrap_or_default())
    }

    async fn parents_of(&self, path: &str) -> Result<Vec<String>> {
        self.enter()?;
        let mut parents: Vec<String> = lock(&self.children)
            .iter()
            .filter(|(_, children)| children.iter().any(|child| child == path))
            .map(|(parent, _)| parent.clone())
            .collect();
        parents.sort();
        Ok(parents)
    }

    async fn siblings_of(&self, path: &str) -> Result<Vec<String>> {
        self.enter()?;
        let mut siblings: Vec<String> = lock(&self.children)
            .values()
            .filter(|children| children.iter().any(|child| child == path))
            .flatten()
            .filter(|child| *child != path)
            .cloned()
            .collect();
        siblings.sort();
        siblings.dedup();
        Ok(siblings)
    }

    async fn roots_of(&self, path: &str) -> Result<Vec<DependencyRoot>> {
        self.enter()?;
        Ok(lock(&self.roots).get(path).cloned().unwrap_or_default())
    }

    fn level_of(&self, path: &str) -> DependencyLevel {
        if let Some(level) = lock(&self.levels).get(path) {
            return *level;
        }
        match path.rsplit_once('.').map(|(_, ext)| ext) {
            Some("tex") => DependencyLevel::Texture,
            Some("meta") => DependencyLevel::Meta,
            Some("mdl" | "mtrl" | "avfx") => DependencyLevel::Other,
            _ => DependencyLevel::Invalid,
        }
    }

    async fn meta_files_under_root(&self, root: &DependencyRoot) -> Result<Vec<String>> {
        self.enter()?;
        Ok(lock(&self.meta_files).get(root).cloned().unwrap_or_default())
    }
}

/// Mod list serving a fixed set of modified paths.
#[derive(Default)]
pub struct MockModList {
    paths: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}
impl MockModList {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: Mutex::new(paths.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl ModListProvider for MockModList {
    async fn active_mod_paths(&self) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::ModList);
        }
        Ok(lock(&self.paths).clone())
    }
}

/// A full set of mock collaborators, keeping typed handles for assertions.
#[derive(Clone)]
pub struct MockSources {
    pub extractor: Arc<MockExtractor>,
    pub resolver: Arc<MockResolver>,
    pub mod_list: Arc<MockModList>,
}
impl MockSources {
    pub fn new(extractor: MockExtractor, resolver: MockResolver, mod_list: MockModList) -> Self {
        Self {
            extractor: Arc::new(extractor),
            resolver: Arc::new(resolver),
            mod_list: Arc::new(mod_list),
        }
    }

    pub fn sources(&self) -> Sources {
        Sources::new(
            Arc::clone(&self.extractor) as Arc<dyn CatalogExtractor>,
            Arc::clone(&self.resolver) as Arc<dyn DependencyResolver>,
            Arc::clone(&self.mod_list) as Arc<dyn ModListProvider>,
        )
    }
}
impl Default for MockSources {
    fn default() -> Self {
        Self::new(MockExtractor::new(), MockResolver::new(), MockModList::default())
    }
}
