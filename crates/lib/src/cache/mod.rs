//! Content-addressed build cache.
//!
//! Entries are named by a truncated SHA-256 of a manifest string describing
//! how they are produced. Layout under the cache root:
//!
//! ```text
//! <root>/obj/<key>/              completed entry
//! <root>/obj/<key>/.fabr-complete
//! <root>/tmp/<key>XXXX/          scratch directory while creating
//! ```
//!
//! A creator writes its outputs into the scratch directory (or returns
//! in-memory files, which are written there for it). On success the scratch
//! directory is renamed into `obj/` and marked complete. A completed entry is
//! reused by later sessions without running the creator again.
//!
//! Within a session each key is created at most once: concurrent requests
//! share the same [`Computable`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::computable::Computable;
use crate::config::EngineConfig;
use crate::consts::COMPLETE_MARKER;
use crate::error::{Error, Result};
use crate::files::{FileData, FileSet};
use crate::util::hash::{Hashable, ObjectHash};

#[derive(Serialize)]
struct CacheKey<'a> {
  manifest: &'a str,
}

impl Hashable for CacheKey<'_> {}

/// Session-owned handle on a build cache directory.
#[derive(Debug)]
pub struct BuildCache {
  root: PathBuf,
  entries: RefCell<HashMap<ObjectHash, Computable<FileSet>>>,
}

impl BuildCache {
  pub fn new(root: impl AsRef<Path>) -> Self {
    Self {
      root: root.as_ref().to_path_buf(),
      entries: RefCell::new(HashMap::new()),
    }
  }

  pub fn from_config(config: &EngineConfig) -> Self {
    Self::new(&config.cache_dir)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Key under which `manifest` is stored.
  pub fn key(manifest: &str) -> Result<ObjectHash> {
    CacheKey { manifest }.compute_hash()
  }

  /// Directory holding the completed entry for `key`.
  pub fn entry_path(&self, key: &ObjectHash) -> PathBuf {
    self.root.join("obj").join(&key.0)
  }

  /// The files stored for `manifest`, running `create` in a scratch directory
  /// if there is no completed entry yet.
  pub fn get_or_create<F>(&self, manifest: &str, create: F) -> Computable<FileSet>
  where
    F: FnOnce(PathBuf) -> Computable<FileSet> + 'static,
  {
    let key = match Self::key(manifest) {
      Ok(key) => key,
      Err(e) => return Computable::reject(e),
    };

    if let Some(existing) = self.entries.borrow().get(&key) {
      trace!(key = %key, "build cache hit (session)");
      return existing.clone();
    }

    let entry = self.entry_path(&key);
    let tmp = self.root.join("tmp");
    let manifest = manifest.to_string();
    let key_name = key.0.clone();

    let result = Computable::from_future(async move {
      if tokio::fs::try_exists(entry.join(COMPLETE_MARKER))
        .await
        .map_err(|e| Error::io(&entry, e))?
      {
        info!(key = %key_name, "reusing build cache entry");
        return load_entry(entry).await;
      }

      info!(key = %key_name, manifest = %manifest, "creating build cache entry");
      tokio::fs::create_dir_all(&tmp).await.map_err(|e| Error::io(&tmp, e))?;
      let scratch = tempfile::Builder::new()
        .prefix(&key_name)
        .tempdir_in(&tmp)
        .map_err(|e| Error::io(&tmp, e))?;

      let produced = create(scratch.path().to_path_buf()).await?;
      materialize(&produced, scratch.path()).await?;
      commit(scratch.path(), &entry).await?;
      // The scratch directory is gone after the rename; dropping the guard is a no-op.
      drop(scratch);

      load_entry(entry).await
    });

    self.entries.borrow_mut().insert(key, result.clone());
    result
  }
}

/// Write files that are not already in `dir` into it under their names.
async fn materialize(files: &FileSet, dir: &Path) -> Result<()> {
  for file in files {
    let dest = dir.join(file.name());
    match file.data() {
      FileData::Disk(path) if path == &dest => continue,
      FileData::Disk(path) => {
        create_parent(&dest).await?;
        tokio::fs::copy(path, &dest).await.map_err(|e| Error::io(path, e))?;
      }
      FileData::Memory(data) => {
        create_parent(&dest).await?;
        tokio::fs::write(&dest, data).await.map_err(|e| Error::io(&dest, e))?;
      }
    }
    debug!(file = %file.name(), "materialized build output");
  }
  Ok(())
}

async fn create_parent(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| Error::io(parent, e))?;
  }
  Ok(())
}

/// Move a finished scratch directory into place and mark it complete.
async fn commit(scratch: &Path, entry: &Path) -> Result<()> {
  // Leftovers of an interrupted creation are discarded.
  if tokio::fs::try_exists(entry).await.map_err(|e| Error::io(entry, e))? {
    tokio::fs::remove_dir_all(entry).await.map_err(|e| Error::io(entry, e))?;
  }
  create_parent(entry).await?;
  tokio::fs::rename(scratch, entry)
    .await
    .map_err(|e| Error::io(entry, e))?;
  let marker = entry.join(COMPLETE_MARKER);
  tokio::fs::write(&marker, b"").await.map_err(|e| Error::io(&marker, e))?;
  Ok(())
}

async fn load_entry(entry: PathBuf) -> Result<FileSet> {
  tokio::task::spawn_blocking(move || FileSet::from_dir(&entry, &[COMPLETE_MARKER]))
    .await
    .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}
