//! Count-then-fetch projection of a table into typed records.

use exn::ResultExt;
use futures::TryStreamExt;
use sqlx::SqlitePool;
use tracing::{instrument, trace};

use crate::error::{ErrorKind, Result};
use crate::query::{Predicate, validate_identifier};
use crate::row::CacheRow;

/// Fetch every row of `table` matching `predicate`, mapped through `mapper`.
///
/// A `count(*)` with the same filter runs first, on the same connection, to
/// pre-size the result. Rows come back in the store's natural order. The
/// first mapper error aborts the fetch and is returned as is.
#[instrument(level = "debug", skip(pool, predicate, mapper))]
pub async fn fetch<T, F>(pool: &SqlitePool, table: &str, predicate: Option<&Predicate>, mut mapper: F) -> Result<Vec<T>>
where
    F: FnMut(&CacheRow<'_>) -> Result<T>,
{
    validate_identifier(table)?;
    let filter = predicate.map(Predicate::compile).transpose()?.unwrap_or_default();
    let where_sql = filter.where_sql();
    let mut conn = pool.acquire().await.or_raise(|| ErrorKind::Database)?;

    let count_sql = format!("SELECT count(*) FROM {table}{where_sql}");
    let count: i64 = sqlx::query_scalar_with(&count_sql, filter.arguments()?)
        .fetch_one(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    trace!(count, "pre-sizing projection");

    let mut results = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
    let select_sql = format!("SELECT * FROM {table}{where_sql}");
    let mut rows = sqlx::query_with(&select_sql, filter.arguments()?).fetch(&mut *conn);
    while let Some(row) = rows.try_next().await.or_raise(|| ErrorKind::Database)? {
        results.push(mapper(&CacheRow::new(&row))?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::query::Join;

    async fn seeded() -> Database {
        let db = Database::connect_in_memory().await.unwrap();
        for (name, category) in [("Wind-up Cait Sith", "Minions"), ("Black Chocobo Chick", "Minions"), ("Carbuncle", "Pets")] {
            sqlx::query(
                "INSERT INTO monsters (name, category, primary_id, secondary_id, imc_variant, model_type) VALUES (?, ?, 1, 1, 1, 'Monster')",
            )
            .bind(name)
            .bind(category)
            .execute(db.pool())
            .await
            .unwrap();
        }
        db
    }

    fn name(row: &CacheRow<'_>) -> Result<String> {
        row.require_string("name")
    }

    #[tokio::test]
    async fn test_fetch_without_predicate_returns_every_row() {
        let db = seeded().await;
        let names = fetch(db.pool(), "monsters", None, name).await.unwrap();
        assert_eq!(names.len(), 3);
        db.close().await;
    }

    #[tokio::test]
    async fn test_fetch_returns_exactly_matching_rows() {
        let db = seeded().await;
        let predicate = Predicate::group([
            Predicate::equals("category", "Minions"),
            Predicate::contains("name", "chocobo"),
        ]);
        let names = fetch(db.pool(), "monsters", Some(&predicate), name).await.unwrap();
        assert_eq!(names, ["Black Chocobo Chick"]);

        let predicate = Predicate::group([
            Predicate::equals("category", "Pets"),
            Predicate::equals("category", "Minions").with_join(Join::Or),
        ]);
        let names = fetch(db.pool(), "monsters", Some(&predicate), name).await.unwrap();
        assert_eq!(names.len(), 3);
        db.close().await;
    }

    #[tokio::test]
    async fn test_empty_predicate_matches_everything() {
        let db = seeded().await;
        let names = fetch(db.pool(), "monsters", Some(&Predicate::default()), name).await.unwrap();
        assert_eq!(names.len(), 3);
        db.close().await;
    }

    #[tokio::test]
    async fn test_mapper_error_aborts_fetch() {
        let db = seeded().await;
        let mut calls = 0;
        let err = fetch(db.pool(), "monsters", None, |_| {
            calls += 1;
            exn::bail!(ErrorKind::InvalidData("test mapper"))
        })
        .await
        .map(|_: Vec<()>| ())
        .unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("test mapper")));
        assert_eq!(calls, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_invalid_table_is_rejected() {
        let db = seeded().await;
        let err = fetch(db.pool(), "monsters; DROP TABLE ui", None, name).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidIdentifier(_)));
        db.close().await;
    }
}
