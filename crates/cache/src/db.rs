//! Database connection, pool management and the single-writer gate.

use exn::ResultExt;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{
    SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::ErrorKind as IoErrorKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Readers fan out during listing, the writer is gated separately.
const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);
/// Files SQLite keeps next to the store while in WAL mode.
const WAL_SUFFIXES: [&str; 2] = ["-wal", "-shm"];
/// Every table a rebuild starts from empty, in deletion order.
const TABLES: [&str; 6] = ["dependencies", "items", "monsters", "housing", "ui", "meta"];

/// Write locks of file stores, shared by every handle opened on the same
/// file within this process.
static WRITERS: LazyLock<StdMutex<HashMap<String, Arc<Mutex<()>>>>> = LazyLock::new(Default::default);

fn writer_for(location: &StoreLocation) -> Arc<Mutex<()>> {
    match location {
        // Each in-memory pool is its own database.
        StoreLocation::Memory(_) => Arc::default(),
        StoreLocation::File(_) => {
            let mut writers = WRITERS.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(writers.entry(location.identity()).or_default())
        },
    }
}

/// Where the cache store lives.
///
/// The location doubles as the store's identity for the process-wide
/// rebuild guard, so two handles pointing at the same file share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    /// A store file on disk.
    File(PathBuf),
    /// A named in-memory store. Destroyed when its pool closes.
    Memory(String),
}
impl StoreLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn memory(name: impl Into<String>) -> Self {
        Self::Memory(name.into())
    }

    /// Stable key identifying the store within this process.
    pub(crate) fn identity(&self) -> String {
        match self {
            Self::File(path) => {
                let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                format!("file:{}", absolute.display())
            },
            Self::Memory(name) => format!("memory:{name}"),
        }
    }
}
impl Display for StoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory(name) => write!(f, ":memory:{name}"),
        }
    }
}

/// Connection pool tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}
impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: MAX_CONNECTIONS,
            busy_timeout: BUSY_TIMEOUT,
        }
    }
}

/// Database connection pool for the cache.
///
/// Any number of readers may use the pool concurrently. Writers go through
/// [`begin_write`](Self::begin_write), which serializes write transactions
/// behind a single async lock shared by every handle on the same store file.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    location: StoreLocation,
    settings: PoolSettings,
    writer: Arc<Mutex<()>>,
}

impl Database {
    async fn new(options: SqliteConnectOptions, location: StoreLocation, settings: PoolSettings) -> Result<Self> {
        let max = match location {
            // In-memory databases must be limited to one connection, otherwise
            // parallel connections see different databases.
            StoreLocation::Memory(_) => 1,
            StoreLocation::File(_) => settings.max_connections.max(1),
        };
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to EVERY connection in the pool,
            // not only the first one handed out.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self {
            writer: writer_for(&location),
            pool,
            location,
            settings,
        };
        if let Err(e) = db.migrate().await {
            db.pool.close().await;
            return Err(e);
        }
        Ok(db)
    }

    /// Open the store at the given location, creating it (and running
    /// migrations) if it doesn't exist.
    #[instrument(level = "debug", skip_all, fields(%location))]
    pub async fn open(location: &StoreLocation, settings: PoolSettings) -> Result<Self> {
        let options = match location {
            StoreLocation::File(path) => Self::base_options(settings.busy_timeout)
                .filename(path)
                .create_if_missing(true),
            StoreLocation::Memory(_) => Self::base_options(settings.busy_timeout).filename(":memory:"),
        };
        Self::new(options, location.clone(), settings).await
    }

    /// Connect to the cache database at the given path.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StoreLocation::file(path.as_ref()), PoolSettings::default()).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(&StoreLocation::memory("default"), PoolSettings::default()).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options(busy_timeout: Duration) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL lets readers proceed while the single writer commits.
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Dependency seeding writes many small transactions back to
            // back; a reader checkpointing in between must not fail them.
            .busy_timeout(busy_timeout)
            .auto_vacuum(SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Begin a write transaction.
    ///
    /// Waits until no other write transaction on this store is open.
    /// Dropping the returned transaction without committing rolls it back.
    pub async fn begin_write(&self) -> Result<WriteTransaction> {
        let permit = Arc::clone(&self.writer).lock_owned().await;
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Ok(WriteTransaction { tx, _permit: permit })
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance should not
    /// be used.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }

    /// Empty every table in one write transaction, leaving the schema.
    ///
    /// The store file stays in place, so every handle open on it sees the
    /// emptied store.
    #[instrument(level = "debug", skip(self), fields(location = %self.location))]
    pub(crate) async fn reset(&self) -> Result<()> {
        let mut tx = self.begin_write().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(tx.conn())
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await
    }

    /// Remove a store that can't be opened, along with its WAL files.
    pub(crate) async fn destroy(location: &StoreLocation) -> Result<()> {
        match location {
            StoreLocation::File(path) => {
                warn!(path = %path.display(), "removing unreadable store");
                Self::remove_store_files(path).await
            },
            StoreLocation::Memory(_) => Ok(()),
        }
    }

    async fn remove_store_files(path: &Path) -> Result<()> {
        let mut targets = vec![path.to_path_buf()];
        for suffix in WAL_SUFFIXES {
            let mut sibling = path.as_os_str().to_owned();
            sibling.push(suffix);
            targets.push(PathBuf::from(sibling));
        }
        for target in targets {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!(path = %target.display(), "removed store file"),
                Err(e) if e.kind() == IoErrorKind::NotFound => {},
                Err(e) => return Err(e).or_raise(|| ErrorKind::Io),
            }
        }
        Ok(())
    }
}

/// An open write transaction holding the store's writer lock.
pub struct WriteTransaction {
    // Dropped (and rolled back) before the permit is released.
    tx: Transaction<'static, Sqlite>,
    _permit: OwnedMutexGuard<()>,
}
impl WriteTransaction {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.or_raise(|| ErrorKind::Database)
    }
}
