//! Crate-wide constants.

/// Application name, used for default directory names.
pub const APP_NAME: &str = "fabr";

/// Number of hex characters kept from a SHA-256 digest for build cache entry names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Marker written into a build cache entry once its outputs are complete.
pub const COMPLETE_MARKER: &str = ".fabr-complete";

/// Environment variable overriding the build cache directory.
pub const CACHE_DIR_ENV: &str = "FABR_CACHE_DIR";

/// Environment variable overriding the HTTP fetch timeout, in seconds.
pub const FETCH_TIMEOUT_ENV: &str = "FABR_FETCH_TIMEOUT_SECS";

/// Default HTTP fetch timeout, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Separator between name/path components (on every platform).
pub const NAME_COMPONENT_SEPARATOR: char = '/';

/// Separator introducing a selector suffix in a qualified name.
pub const SELECTOR_SEPARATOR: char = ':';
