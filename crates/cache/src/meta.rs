//! The `meta` key/value table.

use exn::ResultExt;
use sqlx::SqliteExecutor;

use crate::error::{ErrorKind, Result};

pub(crate) const CACHE_VERSION: &str = "cache_version";
pub(crate) const GAME_VERSION: &str = "ffxiv_version";
pub(crate) const LANGUAGE: &str = "language";
pub(crate) const NEEDS_REBUILD: &str = "needs_rebuild";
pub(crate) const REBUILT_AT: &str = "rebuilt_at";

/// Read a meta entry. Both a missing key and a `NULL` value read as `None`.
pub(crate) async fn get<'e>(executor: impl SqliteExecutor<'e>, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> = sqlx::query_scalar(include_str!("../queries/get_meta.sql"))
        .bind(key)
        .fetch_optional(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(value.flatten())
}

/// Whether a key is present at all, whatever its value.
pub(crate) async fn exists<'e>(executor: impl SqliteExecutor<'e>, key: &str) -> Result<bool> {
    let value: Option<Option<String>> = sqlx::query_scalar(include_str!("../queries/get_meta.sql"))
        .bind(key)
        .fetch_optional(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(value.is_some())
}

/// Insert or overwrite a meta entry.
pub(crate) async fn set<'e>(executor: impl SqliteExecutor<'e>, key: &str, value: Option<&str>) -> Result<()> {
    sqlx::query(include_str!("../queries/set_meta.sql"))
        .bind(key)
        .bind(value)
        .execute(executor)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(())
}
