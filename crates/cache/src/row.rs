//! Typed, column-name-indexed access to result rows.
//!
//! SQLite columns are loosely typed, so every integer-like read decodes the
//! stored 64-bit integer and narrows it, and floats are read as `f64`.
//!
//! The `try_get_*` accessors report SQL `NULL` as `None`. The `get_*`
//! accessors coalesce `NULL` to a default instead: `0` for integers, `0.0`
//! for floats and `false` for booleans. Strings have no default and stay
//! `None`.

use exn::{OptionExt, ResultExt};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Sqlite, Type};

use crate::error::{ErrorKind, Result};

/// A borrowed view over one result row.
#[derive(Clone, Copy)]
pub struct CacheRow<'r> {
    row: &'r SqliteRow,
}
impl<'r> CacheRow<'r> {
    pub fn new(row: &'r SqliteRow) -> Self {
        Self { row }
    }

    /// Names of the row's columns, in select order.
    pub fn columns(&self) -> Vec<&str> {
        self.row.columns().iter().map(Column::name).collect()
    }

    fn decode<T>(&self, column: &str) -> Result<Option<T>>
    where
        T: Decode<'r, Sqlite> + Type<Sqlite>,
    {
        self.row.try_get::<Option<T>, _>(column).or_raise(|| ErrorKind::InvalidData("row column"))
    }

    fn narrow<T: TryFrom<i64>>(&self, column: &str) -> Result<Option<T>> {
        self.try_get_i64(column)?
            .map(|value| T::try_from(value).map_err(|_| exn::Exn::from(ErrorKind::InvalidData("integer range"))))
            .transpose()
    }

    pub fn try_get_i64(&self, column: &str) -> Result<Option<i64>> {
        self.decode::<i64>(column)
    }

    pub fn try_get_i32(&self, column: &str) -> Result<Option<i32>> {
        self.narrow(column)
    }

    pub fn try_get_u32(&self, column: &str) -> Result<Option<u32>> {
        self.narrow(column)
    }

    pub fn try_get_u8(&self, column: &str) -> Result<Option<u8>> {
        self.narrow(column)
    }

    pub fn try_get_f32(&self, column: &str) -> Result<Option<f32>> {
        Ok(self.decode::<f64>(column)?.map(|value| value as f32))
    }

    pub fn try_get_bool(&self, column: &str) -> Result<Option<bool>> {
        Ok(self.try_get_i64(column)?.map(|value| value != 0))
    }

    pub fn try_get_string(&self, column: &str) -> Result<Option<String>> {
        self.decode::<String>(column)
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        Ok(self.try_get_i64(column)?.unwrap_or_default())
    }

    pub fn get_i32(&self, column: &str) -> Result<i32> {
        Ok(self.try_get_i32(column)?.unwrap_or_default())
    }

    pub fn get_u32(&self, column: &str) -> Result<u32> {
        Ok(self.try_get_u32(column)?.unwrap_or_default())
    }

    pub fn get_u8(&self, column: &str) -> Result<u8> {
        Ok(self.try_get_u8(column)?.unwrap_or_default())
    }

    pub fn get_f32(&self, column: &str) -> Result<f32> {
        Ok(self.try_get_f32(column)?.unwrap_or_default())
    }

    pub fn get_bool(&self, column: &str) -> Result<bool> {
        Ok(self.try_get_bool(column)?.unwrap_or_default())
    }

    /// Same as [`try_get_string`](Self::try_get_string): a `NULL` string has
    /// no sensible default.
    pub fn get_string(&self, column: &str) -> Result<Option<String>> {
        self.try_get_string(column)
    }

    /// A string column that must not be `NULL`.
    pub(crate) fn require_string(&self, column: &'static str) -> Result<String> {
        self.try_get_string(column)?.ok_or_raise(|| ErrorKind::InvalidData(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn fetch_row(db: &Database, sql: &str) -> SqliteRow {
        sqlx::query(sql).fetch_one(db.pool()).await.unwrap()
    }

    #[tokio::test]
    async fn test_null_coalescence() {
        let db = Database::connect_in_memory().await.unwrap();
        let row = fetch_row(&db, "SELECT NULL AS n").await;
        let row = CacheRow::new(&row);
        assert_eq!(row.try_get_i32("n").unwrap(), None);
        assert_eq!(row.get_i32("n").unwrap(), 0);
        assert_eq!(row.get_i64("n").unwrap(), 0);
        assert_eq!(row.get_u8("n").unwrap(), 0);
        assert_eq!(row.get_f32("n").unwrap(), 0.0);
        assert!(!row.get_bool("n").unwrap());
        assert_eq!(row.get_string("n").unwrap(), None);
        db.close().await;
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let db = Database::connect_in_memory().await.unwrap();
        let row = fetch_row(&db, "SELECT 42 AS i, 2.5 AS f, 1 AS b, 'cat' AS s").await;
        let row = CacheRow::new(&row);
        assert_eq!(row.columns(), ["i", "f", "b", "s"]);
        assert_eq!(row.get_i32("i").unwrap(), 42);
        assert_eq!(row.get_u8("i").unwrap(), 42);
        assert_eq!(row.get_f32("f").unwrap(), 2.5);
        assert!(row.get_bool("b").unwrap());
        assert_eq!(row.get_string("s").unwrap().as_deref(), Some("cat"));
        db.close().await;
    }

    #[tokio::test]
    async fn test_out_of_range_narrowing_fails() {
        let db = Database::connect_in_memory().await.unwrap();
        let row = fetch_row(&db, "SELECT 300 AS big, -1 AS negative").await;
        let row = CacheRow::new(&row);
        assert!(matches!(&*row.get_u8("big").unwrap_err(), ErrorKind::InvalidData("integer range")));
        assert!(row.get_u32("negative").is_err());
        assert_eq!(row.get_i32("negative").unwrap(), -1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_unknown_column_fails() {
        let db = Database::connect_in_memory().await.unwrap();
        let row = fetch_row(&db, "SELECT 1 AS a").await;
        let err = CacheRow::new(&row).get_i32("missing").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("row column")));
        db.close().await;
    }
}
