//! Layered configuration for the dependency cache.
//!
//! Sources are merged in order, later ones winning:
//! 1. built-in defaults,
//! 2. an optional TOML, YAML or JSON file (picked by extension),
//! 3. `MODGRAPH_*` environment variables, nested keys separated by `__`
//!    (e.g. `MODGRAPH_STORE__MAX_CONNECTIONS=2`).

pub mod error;

use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use modgraph_cache::models::{Language, Version};
use modgraph_cache::{CacheOptions, PoolSettings, StoreLocation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ErrorKind, Result};

const ENV_PREFIX: &str = "MODGRAPH_";
const STORE_FILE: &str = "mod_cache.db";

/// Where the store lives and how it is accessed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}
impl Default for StoreConfig {
    fn default() -> Self {
        let pool = PoolSettings::default();
        Self {
            path: default_store_path(),
            max_connections: pool.max_connections,
            busy_timeout_ms: u64::try_from(pool.busy_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    /// Content language. Without one the cache can be read but not rebuilt.
    pub language: Option<Language>,
    /// Validate the store on open, rebuilding it when stale.
    pub validate: bool,
    pub seed_concurrency: usize,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            language: None,
            validate: true,
            seed_concurrency: 4,
        }
    }
}

impl Config {
    /// The merged sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::NotFound);
            }
            debug!(path = %path.display(), "loading configuration file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.store.max_connections == 0 {
            exn::bail!(ErrorKind::InvalidValue("store.max_connections"));
        }
        if self.seed_concurrency == 0 {
            exn::bail!(ErrorKind::InvalidValue("seed_concurrency"));
        }
        Ok(())
    }

    /// Options for opening the cache against the given game client version.
    pub fn open_options(&self, game_version: Version) -> CacheOptions {
        let mut options = CacheOptions::new(StoreLocation::file(&self.store.path), game_version)
            .with_validation(self.validate);
        options.language = self.language;
        options.seed_concurrency = self.seed_concurrency;
        options.pool = PoolSettings {
            max_connections: self.store.max_connections,
            busy_timeout: Duration::from_millis(self.store.busy_timeout_ms),
        };
        options
    }
}

/// `mod_cache.db` in the platform cache directory, or the working directory
/// when there is no home to resolve it from.
fn default_store_path() -> PathBuf {
    ProjectDirs::from("", "", "modgraph")
        .map(|dirs| dirs.cache_dir().join(STORE_FILE))
        .unwrap_or_else(|| PathBuf::from(STORE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_| {
            let config = Config::load(None).unwrap();
            assert_eq!(config, Config::default());
            assert!(config.store.path.ends_with(STORE_FILE));
            assert!(config.validate);
            Ok(())
        });
    }

    #[rstest]
    #[case("modgraph.toml", "language = \"Japanese\"\nseed_concurrency = 8\n[store]\npath = \"cache.db\"\n")]
    #[case("modgraph.yaml", "language: ja\nseed_concurrency: 8\nstore:\n  path: cache.db\n")]
    #[case("modgraph.json", r#"{"language": "Japanese", "seed_concurrency": 8, "store": {"path": "cache.db"}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load(Some(Path::new(name))).unwrap();
            assert_eq!(config.language, Some(Language::Japanese));
            assert_eq!(config.seed_concurrency, 8);
            assert_eq!(config.store.path, PathBuf::from("cache.db"));
            // Untouched nested keys keep their defaults.
            assert_eq!(config.store.max_connections, StoreConfig::default().max_connections);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("modgraph.toml", "language = \"English\"\n")?;
            jail.set_env("MODGRAPH_LANGUAGE", "de");
            jail.set_env("MODGRAPH_STORE__MAX_CONNECTIONS", "2");
            let config = Config::load(Some(Path::new("modgraph.toml"))).unwrap();
            assert_eq!(config.language, Some(Language::German));
            assert_eq!(config.store.max_connections, 2);
            Ok(())
        });
    }

    #[test]
    fn test_rejected_files() {
        Jail::expect_with(|jail| {
            let err = Config::load(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound));
            jail.create_file("modgraph.ini", "language = en")?;
            let err = Config::load(Some(Path::new("modgraph.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFormat));
            jail.create_file("bad.toml", "language = \"Klingon\"")?;
            let err = Config::load(Some(Path::new("bad.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[test]
    fn test_zero_concurrency_is_invalid() {
        Jail::expect_with(|jail| {
            jail.set_env("MODGRAPH_SEED_CONCURRENCY", "0");
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::InvalidValue("seed_concurrency")));
            Ok(())
        });
    }

    #[test]
    fn test_open_options() {
        let config = Config {
            language: Some(Language::French),
            validate: false,
            store: StoreConfig {
                path: PathBuf::from("cache.db"),
                max_connections: 3,
                busy_timeout_ms: 250,
            },
            ..Config::default()
        };
        let version: Version = "2024.03.27.0000.0000".parse().unwrap();
        let options = config.open_options(version.clone());
        assert_eq!(options.location, StoreLocation::file("cache.db"));
        assert_eq!(options.game_version, version);
        assert_eq!(options.language, Some(Language::French));
        assert!(!options.validate);
        assert_eq!(options.pool.max_connections, 3);
        assert_eq!(options.pool.busy_timeout, Duration::from_millis(250));
    }
}
