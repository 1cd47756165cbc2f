//! Default on-disk locations.

use std::env;
use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Default build cache root.
///
/// `%LOCALAPPDATA%\fabr\Cache` on Windows, otherwise `$XDG_CACHE_HOME/fabr`
/// falling back to `~/.cache/fabr`. Without a home directory the system temp
/// directory stands in for it.
pub fn cache_dir() -> PathBuf {
  if cfg!(windows) {
    env_dir("LOCALAPPDATA")
      .unwrap_or_else(home_dir)
      .join(APP_NAME)
      .join("Cache")
  } else {
    env_dir("XDG_CACHE_HOME")
      .unwrap_or_else(|| home_dir().join(".cache"))
      .join(APP_NAME)
  }
}

fn home_dir() -> PathBuf {
  let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
  env_dir(var).unwrap_or_else(env::temp_dir)
}

/// A directory from the environment, ignoring empty values.
fn env_dir(var: &str) -> Option<PathBuf> {
  env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}
