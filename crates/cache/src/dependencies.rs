//! Dependency queries backed by the edge table.
//!
//! Only outbound edges (children) are cached. They are filled on a miss and
//! written back after resolving. Parents, siblings and roots always go to
//! the resolver.

use exn::ResultExt;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, instrument};

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{DependencyLevel, DependencyRoot};
use crate::projector;
use crate::query::Predicate;
use crate::sources::DependencyResolver;

const TABLE: &str = "dependencies";

/// Keep the first occurrence of every path.
fn dedupe(paths: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(paths.len());
    paths.into_iter().filter(|path| seen.insert(path.clone())).collect()
}

/// Dependency query & repair layer over one store.
#[derive(Clone, Copy)]
pub struct DependencyCache<'a> {
    db: &'a Database,
    resolver: &'a dyn DependencyResolver,
}
impl<'a> DependencyCache<'a> {
    pub fn new(db: &'a Database, resolver: &'a dyn DependencyResolver) -> Self {
        Self { db, resolver }
    }

    /// Children of `path`, from the edge table when present.
    ///
    /// On a miss the resolver is asked, and a non-empty answer is written
    /// back before it's returned. An empty answer is returned without being
    /// recorded, so childless files are resolved again on every call.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_child_files(&self, path: &str) -> Result<Vec<String>> {
        let cached = self.cached_child_files(path).await?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        let children = self.resolver.children_of(path).await?;
        if !children.is_empty() {
            debug!(count = children.len(), "filling edge cache on miss");
            self.update_file_children(path, Some(children.clone())).await?;
        }
        Ok(children)
    }

    pub async fn get_parent_files(&self, path: &str) -> Result<Vec<String>> {
        self.resolver.parents_of(path).await
    }

    pub async fn get_sibling_files(&self, path: &str) -> Result<Vec<String>> {
        self.resolver.siblings_of(path).await
    }

    pub async fn get_dependency_roots(&self, path: &str) -> Result<Vec<DependencyRoot>> {
        self.resolver.roots_of(path).await
    }

    /// Edges recorded with `path` as the parent. No resolver fallback.
    pub async fn cached_child_files(&self, path: &str) -> Result<Vec<String>> {
        let predicate = Predicate::equals("parent", path);
        projector::fetch(self.db.pool(), TABLE, Some(&predicate), |row| row.require_string("child")).await
    }

    /// Files recorded as having `path` as a child. No resolver fallback, so
    /// this only knows about parents whose children were cached already.
    pub async fn cached_parent_files(&self, path: &str) -> Result<Vec<String>> {
        let predicate = Predicate::equals("child", path);
        projector::fetch(self.db.pool(), TABLE, Some(&predicate), |row| row.require_string("parent")).await
    }

    /// Replace the cached children of `path`.
    ///
    /// Children are resolved when not supplied. Invalid and texture files are
    /// ignored. A meta file takes every meta file of its root along with it:
    /// the whole group gets the same children in one transaction.
    #[instrument(level = "debug", skip(self, children))]
    pub async fn update_file_children(&self, path: &str, children: Option<Vec<String>>) -> Result<()> {
        let level = self.resolver.level_of(path);
        if !level.is_edge_cached() {
            return Ok(());
        }
        let parents = match level {
            DependencyLevel::Meta => self.meta_group(path).await?,
            _ => vec![path.to_string()],
        };
        let children = match children {
            Some(children) => children,
            None => self.resolver.children_of(path).await?,
        };
        let children = dedupe(children);

        let mut tx = self.db.begin_write().await?;
        for parent in &parents {
            replace_children(tx.conn(), parent, &children).await?;
        }
        tx.commit().await?;
        debug!(parents = parents.len(), children = children.len(), "updated cached children");
        Ok(())
    }

    /// All meta files sharing a root with `path`, `path` itself first.
    async fn meta_group(&self, path: &str) -> Result<Vec<String>> {
        let mut group = vec![path.to_string()];
        if let Some(root) = self.resolver.roots_of(path).await?.into_iter().next() {
            group.extend(self.resolver.meta_files_under_root(&root).await?);
        }
        Ok(dedupe(group))
    }
}

/// Delete then insert, inside the caller's transaction.
async fn replace_children(conn: &mut SqliteConnection, parent: &str, children: &[String]) -> Result<()> {
    sqlx::query(include_str!("../queries/delete_children.sql"))
        .bind(parent)
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    for child in children {
        sqlx::query(include_str!("../queries/insert_dependency.sql"))
            .bind(parent)
            .bind(child)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockResolver;

    const MODEL: &str = "chara/equipment/e0100/model/c0101e0100_top.mdl";
    const MATERIAL: &str = "chara/equipment/e0100/material/v0001/mt_c0101e0100_top_a.mtrl";
    const TEXTURE: &str = "chara/equipment/e0100/texture/v01_c0101e0100_top_n.tex";

    async fn edges(db: &Database) -> Vec<(String, String)> {
        sqlx::query_as("SELECT parent, child FROM dependencies ORDER BY parent, child")
            .fetch_all(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fill_on_miss_resolves_once() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new().with_children(MODEL, [MATERIAL]);
        let deps = DependencyCache::new(&db, &resolver);

        assert_eq!(deps.get_child_files(MODEL).await.unwrap(), [MATERIAL]);
        assert_eq!(resolver.child_calls(MODEL), 1);
        assert_eq!(deps.get_child_files(MODEL).await.unwrap(), [MATERIAL]);
        assert_eq!(resolver.child_calls(MODEL), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_confirmed_empty_is_not_cached() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new();
        let deps = DependencyCache::new(&db, &resolver);

        assert!(deps.get_child_files(MODEL).await.unwrap().is_empty());
        assert!(deps.get_child_files(MODEL).await.unwrap().is_empty());
        assert_eq!(resolver.child_calls(MODEL), 2);
        assert!(edges(&db).await.is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_resolver_failure_writes_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new().with_children(MODEL, [MATERIAL]);
        resolver.set_failing(true);
        let deps = DependencyCache::new(&db, &resolver);

        let err = deps.get_child_files(MODEL).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Resolver));
        assert!(edges(&db).await.is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_textures_and_invalid_files_are_not_cached() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new();
        let deps = DependencyCache::new(&db, &resolver);

        deps.update_file_children(TEXTURE, Some(vec![MATERIAL.to_string()])).await.unwrap();
        deps.update_file_children("not/in/graph", Some(vec![MATERIAL.to_string()])).await.unwrap();
        assert!(edges(&db).await.is_empty());
        assert_eq!(resolver.total_calls(), 0);
        db.close().await;
    }

    #[tokio::test]
    async fn test_update_replaces_previous_children() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new().with_children(MODEL, [MATERIAL, "b.mtrl", MATERIAL]);
        let deps = DependencyCache::new(&db, &resolver);

        deps.update_file_children(MODEL, Some(vec!["old.mtrl".to_string()])).await.unwrap();
        deps.update_file_children(MODEL, None).await.unwrap();
        // Duplicates collapse to their first occurrence.
        assert_eq!(deps.cached_child_files(MODEL).await.unwrap(), [MATERIAL, "b.mtrl"]);

        // Nothing left to insert: delete only.
        deps.update_file_children(MODEL, Some(Vec::new())).await.unwrap();
        assert!(edges(&db).await.is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_cached_parent_files() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new();
        let deps = DependencyCache::new(&db, &resolver);

        deps.update_file_children(MODEL, Some(vec![MATERIAL.to_string()])).await.unwrap();
        deps.update_file_children("b.mdl", Some(vec![MATERIAL.to_string()])).await.unwrap();
        let mut parents = deps.cached_parent_files(MATERIAL).await.unwrap();
        parents.sort();
        assert_eq!(parents, ["b.mdl", MODEL]);
        assert_eq!(resolver.total_calls(), 0);
        db.close().await;
    }

    #[tokio::test]
    async fn test_meta_group_is_updated_together() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new().with_meta_group("e0100", ["top.meta", "dwn.meta", "sho.meta"]);
        let deps = DependencyCache::new(&db, &resolver);

        deps.update_file_children("dwn.meta", Some(vec![MODEL.to_string(), MATERIAL.to_string()])).await.unwrap();
        for file in ["top.meta", "dwn.meta", "sho.meta"] {
            assert_eq!(deps.cached_child_files(file).await.unwrap(), [MODEL, MATERIAL], "{file}");
        }
        db.close().await;
    }

    #[tokio::test]
    async fn test_meta_file_without_root_is_a_group_of_one() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new();
        let deps = DependencyCache::new(&db, &resolver);

        deps.update_file_children("orphan.meta", Some(vec![MODEL.to_string()])).await.unwrap();
        assert_eq!(edges(&db).await, [("orphan.meta".to_string(), MODEL.to_string())]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_meta_group_update_is_all_or_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new().with_meta_group("e0100", ["top.meta", "dwn.meta", "sho.meta"]);
        let deps = DependencyCache::new(&db, &resolver);
        deps.update_file_children("top.meta", Some(vec!["old.mdl".to_string()])).await.unwrap();

        // Fail the write for the last sibling, after the others were replaced.
        sqlx::query(
            "CREATE TRIGGER fail_sho BEFORE INSERT ON dependencies WHEN NEW.parent = 'sho.meta' AND NEW.child = 'new.mdl'
             BEGIN SELECT RAISE(ABORT, 'simulated failure'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();
        let err = deps.update_file_children("top.meta", Some(vec!["new.mdl".to_string()])).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));

        for file in ["top.meta", "dwn.meta", "sho.meta"] {
            assert_eq!(deps.cached_child_files(file).await.unwrap(), ["old.mdl"], "{file}");
        }
        db.close().await;
    }

    #[tokio::test]
    async fn test_uncached_queries_delegate_to_resolver() {
        let db = Database::connect_in_memory().await.unwrap();
        let resolver = MockResolver::new()
            .with_children(MODEL, [MATERIAL, "b.mtrl"])
            .with_meta_group("e0100", ["top.meta"]);
        let deps = DependencyCache::new(&db, &resolver);

        assert_eq!(deps.get_parent_files(MATERIAL).await.unwrap(), [MODEL]);
        assert_eq!(deps.get_sibling_files(MATERIAL).await.unwrap(), ["b.mtrl"]);
        assert_eq!(deps.get_dependency_roots("top.meta").await.unwrap(), [DependencyRoot::new("e0100")]);
        assert!(edges(&db).await.is_empty());
        db.close().await;
    }
}
