//! Layered configuration for dependency lookups.
//!
//! Values are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension),
//! 3. environment variables prefixed with `DEPINFO_`, using `__` between
//!    section and key (e.g. `DEPINFO_LOOKUP__WORKERS=8`).
//!
//! ```toml
//! [lookup]
//! batch_size = 125
//! workers = 3
//! repository = "libs-release"
//!
//! [spool]
//! directory = "/var/tmp/depinfo"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use depinfo_lookup::{DEFAULT_BATCH_SIZE, DEFAULT_WORKERS, Options};
use depinfo_spool::SpoolHandle;
use depinfo_spool::backend::LocalSpool;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ENV_PREFIX: &str = "DEPINFO_";
const ENV_SEPARATOR: &str = "__";
const FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lookup: LookupConfig,
    pub spool: SpoolConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Keys per query.
    pub batch_size: usize,
    /// Queries in flight at once.
    pub workers: usize,
    /// Only search this repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}
impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE.get(),
            workers: DEFAULT_WORKERS.get(),
            repository: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    /// Where spool files are written. A private temporary directory (removed
    /// afterwards) when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}
impl SpoolConfig {
    pub fn open(&self) -> Result<SpoolHandle> {
        let backend = match &self.directory {
            Some(directory) => LocalSpool::new("local", directory),
            None => LocalSpool::temporary("temporary"),
        };
        let backend = backend.or_raise(|| ErrorKind::Spool)?;
        tracing::debug!(directory = %backend.root().display(), "Spool directory ready");
        Ok(Arc::new(backend))
    }
}

impl Config {
    /// Platform-specific location of the user's configuration file.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "depinfo").map(|dirs| dirs.config_dir().join(FILE_NAME))
    }

    /// Every configuration layer, without extracting or validating anything.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR)))
    }

    /// Load and validate the configuration. A file given explicitly must
    /// exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.is_file()
        {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Self::extract(Self::figment(path)?)
    }

    /// Load the configuration from [`default_path()`](Self::default_path), if
    /// there is a file there.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path().filter(|p| p.is_file());
        tracing::debug!(path = ?path, "Loading default configuration");
        Self::extract(Self::figment(path.as_deref())?)
    }

    /// Extract from any figment (such as [`figment()`](Self::figment) with
    /// extra layers merged on top) and validate.
    pub fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.options()?;
        Ok(config)
    }

    /// Lookup options described by this configuration.
    pub fn options(&self) -> Result<Options> {
        let batch_size = NonZeroUsize::new(self.lookup.batch_size).ok_or_else(|| exn::Exn::from(ErrorKind::Invalid("lookup.batch_size")))?;
        let workers = NonZeroUsize::new(self.lookup.workers).ok_or_else(|| exn::Exn::from(ErrorKind::Invalid("lookup.workers")))?;
        Ok(Options {
            batch_size,
            workers,
            repository: self.lookup.repository.clone().filter(|r| !r.is_empty()),
        })
    }
}
