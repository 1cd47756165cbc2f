//! Engine configuration.
//!
//! Values come from the environment when present and fall back to platform
//! defaults:
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `FABR_CACHE_DIR` | build cache root | `$XDG_CACHE_HOME/fabr` |
//! | `FABR_FETCH_TIMEOUT_SECS` | HTTP timeout | 300 |

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::consts::{CACHE_DIR_ENV, DEFAULT_FETCH_TIMEOUT_SECS, FETCH_TIMEOUT_ENV};
use crate::platform::paths;

/// Settings shared by a build session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Root directory of the content-addressed build cache.
  pub cache_dir: PathBuf,

  /// Timeout applied to each HTTP fetch.
  pub fetch_timeout: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      cache_dir: paths::cache_dir(),
      fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
    }
  }
}

impl EngineConfig {
  /// Read the configuration from the environment.
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
      config.cache_dir = PathBuf::from(dir);
    }

    if let Ok(secs) = std::env::var(FETCH_TIMEOUT_ENV) {
      match secs.parse::<u64>() {
        Ok(secs) => config.fetch_timeout = Duration::from_secs(secs),
        Err(_) => warn!(value = %secs, "ignoring invalid {}", FETCH_TIMEOUT_ENV),
      }
    }

    config
  }

  pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cache_dir = dir.as_ref().to_path_buf();
    self
  }

  pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
    self.fetch_timeout = timeout;
    self
  }
}
