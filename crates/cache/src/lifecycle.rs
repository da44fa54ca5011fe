//! Opening, validating and rebuilding the cache.

use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::UtcDateTime;
use tracing::{info, instrument, warn};

use crate::catalog::Catalog;
use crate::db::{Database, PoolSettings, StoreLocation};
use crate::dependencies::DependencyCache;
use crate::error::{ErrorKind, Result};
use crate::guard;
use crate::meta;
use crate::models::{Language, Version};
use crate::rebuild;
use crate::sources::Sources;

/// Layout version of the cache itself. Bumped whenever the schema or the
/// meaning of any stored row changes.
pub const SCHEMA_VERSION: [u32; 4] = [0, 0, 1, 0];
const SEED_CONCURRENCY: usize = 4;

/// What the running engine expects the store to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub location: StoreLocation,
    /// Expected cache layout version.
    pub schema_version: Version,
    /// Version of the game client the catalogs were extracted from.
    pub game_version: Version,
    /// Content language. Required to rebuild, and only compared against the
    /// store when set.
    pub language: Option<Language>,
    /// Validate (and rebuild when stale) on open.
    pub validate: bool,
    /// How many modded files are resolved at once while seeding edges.
    pub seed_concurrency: usize,
    pub pool: PoolSettings,
}
impl CacheOptions {
    pub fn new(location: StoreLocation, game_version: Version) -> Self {
        Self {
            location,
            schema_version: Version::new(SCHEMA_VERSION),
            game_version,
            language: None,
            validate: true,
            seed_concurrency: SEED_CONCURRENCY,
            pool: PoolSettings::default(),
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

/// Why a store can't be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// A required meta entry is absent.
    Missing(&'static str),
    /// A version meta entry doesn't parse.
    Malformed(&'static str),
    SchemaVersion { stored: Version },
    GameVersion { stored: Version },
    Language { stored: Option<String> },
    /// A previous rebuild failed part way.
    RebuildRequested,
    /// The store couldn't be read at all.
    Unreadable,
}
impl Display for StaleReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Missing(key) => write!(f, "missing {key}"),
            Self::Malformed(key) => write!(f, "malformed {key}"),
            Self::SchemaVersion { stored } => write!(f, "cache version {stored} is outdated"),
            Self::GameVersion { stored } => write!(f, "built for game version {stored}"),
            Self::Language { stored: Some(stored) } => write!(f, "built for language {stored}"),
            Self::Language { stored: None } => f.write_str("built without a language"),
            Self::RebuildRequested => f.write_str("rebuild requested"),
            Self::Unreadable => f.write_str("store unreadable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale(StaleReason),
}
impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}

/// An open, validated cache.
///
/// Rebuilding empties and refills the store in place, so every handle open
/// on the same store file sees the result.
#[derive(Debug)]
pub struct Cache {
    db: Database,
    sources: Sources,
    options: CacheOptions,
}

impl Cache {
    /// Open the store, rebuilding it first if it is stale.
    ///
    /// Concurrent opens of the same store wait for each other: only the
    /// first one that finds the store stale rebuilds it, everyone after it
    /// validates the rebuilt store.
    #[instrument(level = "info", skip_all, fields(location = %options.location))]
    pub async fn open(options: CacheOptions, sources: Sources) -> Result<Self> {
        let _guard = guard::acquire(&options.location.identity()).await;
        if !options.validate {
            let db = Database::open(&options.location, options.pool).await?;
            return Ok(Self { db, sources, options });
        }
        let (db, unreadable) = match Database::open(&options.location, options.pool).await {
            Ok(db) => (db, false),
            Err(e) => {
                // Corrupt, foreign or from an incompatible layout: start over.
                warn!(error = ?e, "could not open cache");
                Database::destroy(&options.location).await.or_raise(|| ErrorKind::Rebuild)?;
                (Database::open(&options.location, options.pool).await?, true)
            },
        };
        let cache = Self { db, sources, options };
        let freshness = if unreadable {
            Freshness::Stale(StaleReason::Unreadable)
        } else {
            cache.freshness().await
        };
        match freshness {
            Freshness::Fresh => info!("cache is fresh"),
            Freshness::Stale(reason) => {
                info!(%reason, "cache is stale, rebuilding");
                cache.rebuild_locked().await?;
            },
        }
        Ok(cache)
    }

    /// Compare the stored meta entries against the expected ones.
    ///
    /// Never fails: anything that prevents validation makes the store stale.
    #[instrument(level = "debug", skip(self))]
    pub async fn freshness(&self) -> Freshness {
        match self.check().await {
            Ok(freshness) => freshness,
            Err(e) => {
                warn!(error = ?e, "could not validate cache");
                Freshness::Stale(StaleReason::Unreadable)
            },
        }
    }

    async fn check(&self) -> Result<Freshness> {
        let pool = self.db.pool();
        let expected = &self.options;

        match stored_version(meta::get(pool, meta::CACHE_VERSION).await?, meta::CACHE_VERSION) {
            Err(reason) => return Ok(Freshness::Stale(reason)),
            Ok(stored) if stored != expected.schema_version => {
                return Ok(Freshness::Stale(StaleReason::SchemaVersion { stored }));
            },
            Ok(_) => {},
        }
        match stored_version(meta::get(pool, meta::GAME_VERSION).await?, meta::GAME_VERSION) {
            Err(reason) => return Ok(Freshness::Stale(reason)),
            Ok(stored) if stored != expected.game_version => {
                return Ok(Freshness::Stale(StaleReason::GameVersion { stored }));
            },
            Ok(_) => {},
        }
        if let Some(language) = expected.language {
            let stored = meta::get(pool, meta::LANGUAGE).await?;
            if stored.as_deref() != Some(language.as_str()) {
                return Ok(Freshness::Stale(StaleReason::Language { stored }));
            }
        }
        if meta::exists(pool, meta::NEEDS_REBUILD).await? {
            return Ok(Freshness::Stale(StaleReason::RebuildRequested));
        }
        Ok(Freshness::Fresh)
    }

    /// Rebuild the store from scratch, whatever its freshness.
    pub async fn rebuild(&self) -> Result<()> {
        let _guard = guard::acquire(&self.options.location.identity()).await;
        self.rebuild_locked().await
    }

    /// Caller holds the rebuild guard.
    #[instrument(level = "info", skip(self), fields(location = %self.options.location))]
    async fn rebuild_locked(&self) -> Result<()> {
        let Some(language) = self.options.language else {
            exn::bail!(ErrorKind::LanguageRequired);
        };
        let populated = match self.db.reset().await {
            Ok(()) => rebuild::populate(&self.db, &self.sources, language, self.options.seed_concurrency).await,
            Err(e) => Err(e),
        };
        if let Err(e) = populated {
            // Leave a marker so the next open starts over.
            if let Err(marker) = meta::set(self.db.pool(), meta::NEEDS_REBUILD, Some("1")).await {
                warn!(error = ?marker, "could not mark cache for rebuild");
            }
            return Err(e).or_raise(|| ErrorKind::Rebuild);
        }

        let rebuilt_at = UtcDateTime::now().unix_timestamp().to_string();
        let mut tx = self.db.begin_write().await.or_raise(|| ErrorKind::Rebuild)?;
        for (key, value) in [
            (meta::CACHE_VERSION, self.options.schema_version.to_string()),
            (meta::GAME_VERSION, self.options.game_version.to_string()),
            (meta::LANGUAGE, language.to_string()),
            (meta::REBUILT_AT, rebuilt_at),
        ] {
            meta::set(tx.conn(), key, Some(value.as_str())).await.or_raise(|| ErrorKind::Rebuild)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Rebuild)?;
        info!("cache rebuilt");
        Ok(())
    }

    /// When the store was last rebuilt successfully.
    pub async fn rebuilt_at(&self) -> Result<Option<UtcDateTime>> {
        let Some(stored) = meta::get(self.db.pool(), meta::REBUILT_AT).await? else {
            return Ok(None);
        };
        let seconds: i64 = stored.parse::<i64>().or_raise(|| ErrorKind::InvalidData("rebuild timestamp"))?;
        let at = UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData("rebuild timestamp"))?;
        Ok(Some(at))
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.db)
    }

    pub fn dependencies(&self) -> DependencyCache<'_> {
        DependencyCache::new(&self.db, self.sources.resolver.as_ref())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub async fn close(self) {
        self.db.close().await;
    }
}

fn stored_version(stored: Option<String>, key: &'static str) -> std::result::Result<Version, StaleReason> {
    stored.ok_or(StaleReason::Missing(key))?.parse().map_err(|_| StaleReason::Malformed(key))
}
