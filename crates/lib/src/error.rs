//! Error type shared by the resolution engine and its collaborators.
//!
//! Every failure surfaced by a [`Computable`](crate::computable::Computable) is
//! an [`Error`]. Shared futures hand the same outcome to every dependent, so the
//! error is `Clone`; I/O errors are kept behind an `Arc` for that reason.
//!
//! A failure coming out of a dependency is not wrapped: it is forwarded to every
//! dependent unchanged.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while loading or resolving a build description.
#[derive(Debug, Clone, Error)]
pub enum Error {
  /// A name does not refer to a declaration of the requested kind.
  #[error("unresolved name '{name}'")]
  UnresolvedName { name: String },

  /// A target property has no usable type in the target definition.
  #[error("unsupported property type for '{target}.{property}' ({location})")]
  UnsupportedPropertyType {
    target: String,
    property: String,
    location: String,
  },

  /// No rule is registered for a declared target type.
  #[error("no rule found to build '{rule_type}'\n    at {target} ({location})\n{trace}")]
  MissingRule {
    rule_type: String,
    target: String,
    location: String,
    trace: String,
  },

  /// A name was requested again while it was still being resolved in the same context.
  #[error("circular dependency resolving {name}\n{trace}")]
  CircularDependency { name: String, trace: String },

  /// An engine invariant was violated.
  #[error("internal error: {0}")]
  Internal(String),

  /// The build model owning a context has been dropped.
  #[error("build session closed")]
  SessionClosed,

  /// A build file could not be parsed.
  #[error("parse error in {file}: {message}")]
  Parse { file: String, message: String },

  /// A file could not be found.
  #[error("file not found: {0}")]
  FileNotFound(String),

  /// Build files include each other.
  #[error("circular include: {chain}")]
  CircularInclude { chain: String },

  /// The same qualified name was declared twice.
  #[error("duplicate declaration of '{name}' ({location})")]
  DuplicateDeclaration { name: String, location: String },

  /// A target refers to a type with no target definition.
  #[error("unknown target type '{rule_type}' for '{target}' ({location})")]
  UnknownTargetType {
    rule_type: String,
    target: String,
    location: String,
  },

  /// Name text could not be parsed.
  #[error("invalid name '{input}' at position {position}: {message}")]
  NameSyntax {
    input: String,
    position: usize,
    message: String,
  },

  /// A name could not be turned into a glob pattern.
  #[error("invalid glob pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  /// Filesystem error.
  #[error("io error at {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: Arc<std::io::Error>,
  },

  /// HTTP fetch failed.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  /// Downloaded content did not match the expected digest.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// Archive format not recognised or archive contents rejected.
  #[error("unsupported archive: {0}")]
  UnsupportedArchive(String),

  /// A rule implementation failed.
  #[error("rule failed for '{target}': {message}")]
  Rule { target: String, message: String },
}

impl Error {
  /// Wrap an I/O error with the path it occurred on.
  pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
    Error::Io {
      path: path.as_ref().display().to_string(),
      source: Arc::new(source),
    }
  }

  /// Whether this error reports a dependency cycle.
  pub fn is_circular(&self) -> bool {
    matches!(self, Error::CircularDependency { .. } | Error::CircularInclude { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_rule_message_includes_trace() {
    let err = Error::MissingRule {
      rule_type: "cc".to_string(),
      target: "bin".to_string(),
      location: "BUILD:3:1".to_string(),
      trace: "    at lib.srcs (BUILD:7:10)".to_string(),
    };

    assert_eq!(
      err.to_string(),
      "no rule found to build 'cc'\n    at bin (BUILD:3:1)\n    at lib.srcs (BUILD:7:10)"
    );
  }

  #[test]
  fn io_error_keeps_path() {
    let err = Error::io("/tmp/missing", std::io::Error::from(std::io::ErrorKind::NotFound));
    assert!(err.to_string().starts_with("io error at /tmp/missing"));
    assert!(!err.is_circular());
  }
}
