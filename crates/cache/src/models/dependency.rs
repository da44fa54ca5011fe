use std::fmt::{Display, Formatter, Result as FmtResult};

/// Classification of an internal file path that decides its cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyLevel {
    /// Outside the scope of the dependency graph.
    Invalid,
    /// Textures can hang off any number of roots and are never edge-cached.
    Texture,
    /// Metadata files, cached as one group per dependency root.
    Meta,
    /// Everything else (models, materials, ...), cached per file.
    Other,
}
impl DependencyLevel {
    /// Whether outbound edges of files at this level live in the edge table.
    pub fn is_edge_cached(&self) -> bool {
        matches!(self, Self::Meta | Self::Other)
    }
}

/// The top-level identity that owns a subtree of dependent files
/// (e.g. one equipment set or one creature model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyRoot(String);
impl DependencyRoot {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for DependencyRoot {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
