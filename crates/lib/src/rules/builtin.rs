//! Rules available without registration.
//!
//! | type | properties | output |
//! |---|---|---|
//! | `filegroup` | `srcs` | the files of `srcs`, merged |
//! | `archive` | `srcs` or `url` (+ optional `sha256`) | the unpacked archive |

use std::rc::Rc;

use tracing::debug;

use crate::computable::Computable;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::files::{FileSet, FileSource};
use crate::model::{BuildContext, Property};
use crate::rules::{ResolvedTarget, Rule};
use crate::support::{fetch_url, fetch_url_verified, unpack};

/// Merges its `srcs` into a single file set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileGroupRule;

impl Rule for FileGroupRule {
  fn evaluate(&self, target: ResolvedTarget, _context: Rc<BuildContext>) -> Computable<FileSource> {
    let files = FileSet::merge(target.files("srcs").unwrap_or_default());
    debug!(target_name = %target.name(), files = files.len(), "filegroup");
    Computable::resolve(FileSource::Set(files))
  }
}

/// Unpacks an archive into the build cache.
///
/// The archive is the first file of `srcs`, or is downloaded from `url`. With
/// `sha256` set, the download must match it.
#[derive(Debug, Clone)]
pub struct ArchiveRule {
  config: EngineConfig,
}

impl ArchiveRule {
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }
}

impl Rule for ArchiveRule {
  fn evaluate(&self, target: ResolvedTarget, context: Rc<BuildContext>) -> Computable<FileSource> {
    if let Some(srcs) = target.files("srcs") {
      let Some(archive) = srcs.iter().flat_map(FileSource::files).next().cloned() else {
        return Computable::reject(Error::Rule {
          target: target.name().to_string(),
          message: "'srcs' names no files".to_string(),
        });
      };
      let manifest = format!("archive:{}", archive.hash());
      return context
        .get_cached_or_build(&manifest, move |dir| {
          Computable::from_future(async move {
            let data = archive.read().await?;
            unpack(data, dir).await
          })
        })
        .map(|files| Ok(FileSource::Set(files)));
    }

    let url = match target.require_string("url") {
      Ok(url) => url.to_string(),
      Err(e) => return Computable::reject(e),
    };
    let sha256 = target.strings("sha256").and_then(Property::first).map(str::to_string);
    let manifest = match &sha256 {
      Some(hash) => format!("archive:{url}#sha256={hash}"),
      None => format!("archive:{url}"),
    };

    let config = self.config.clone();
    context
      .get_cached_or_build(&manifest, move |dir| {
        let data = match &sha256 {
          Some(hash) => fetch_url_verified(&url, hash, &config),
          None => fetch_url(&url, &config),
        };
        data.then(move |bytes| unpack(bytes, dir))
      })
      .map(|files| Ok(FileSource::Set(files)))
  }
}
