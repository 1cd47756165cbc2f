use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::trace;

use crate::computable::Computable;
use crate::error::{Error, Result};
use crate::files::{File, FileSet, FileSource, SourceTree};
use crate::name::{Name, match_options};

/// A source tree rooted at a directory on the local filesystem.
///
/// Hashing and directory walks run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct LocalSourceTree {
  root: PathBuf,
}

impl LocalSourceTree {
  pub fn new(root: impl AsRef<Path>) -> Self {
    let root = root.as_ref();
    Self {
      root: dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl SourceTree for LocalSourceTree {
  fn get(&self, path: &str) -> Computable<Option<File>> {
    let full = self.root.join(path);
    let name = path.to_string();
    Computable::from_future(async move {
      match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(&full, e)),
      }
      let file = blocking(move || File::from_disk(name, &full)).await?;
      Ok(Some(file))
    })
  }

  fn find(&self, pattern: &Name) -> Computable<FileSource> {
    if let Some(path) = pattern.simple_name() {
      let path = path.to_string();
      return self.get(&path).map(move |file| match file {
        Some(file) => Ok(FileSource::File(file)),
        None => Err(Error::FileNotFound(path)),
      });
    }

    let root = self.root.clone();
    let pattern = pattern.to_pattern_string();
    Computable::from_future(async move {
      let set = blocking(move || glob_files(&root, &pattern)).await?;
      Ok(FileSource::Set(set))
    })
  }
}

fn glob_files(root: &Path, pattern: &str) -> Result<FileSet> {
  let full = format!("{}/{}", Pattern::escape(&root.to_string_lossy()), pattern);
  trace!(pattern = %full, "globbing source tree");

  let paths = glob::glob_with(&full, match_options()).map_err(|e| Error::InvalidPattern {
    pattern: pattern.to_string(),
    message: e.to_string(),
  })?;

  let mut set = FileSet::new();
  for entry in paths {
    let path = entry.map_err(|e| {
      let at = e.path().to_path_buf();
      Error::io(at, e.into())
    })?;
    if !path.is_file() {
      continue;
    }
    let rel = path
      .strip_prefix(root)
      .unwrap_or(&path)
      .to_string_lossy()
      .replace('\\', "/");
    set.insert(File::from_disk(rel, &path)?);
  }
  Ok(set)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
  T: Send + 'static,
  F: FnOnce() -> Result<T> + Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn populated() -> (tempfile::TempDir, LocalSourceTree) {
    let temp = tempdir().unwrap();
    std::fs::create_dir_all(temp.path().join("src/sub")).unwrap();
    std::fs::write(temp.path().join("src/a.c"), "a").unwrap();
    std::fs::write(temp.path().join("src/b.h"), "b").unwrap();
    std::fs::write(temp.path().join("src/sub/c.h"), "c").unwrap();
    let tree = LocalSourceTree::new(temp.path());
    (temp, tree)
  }

  #[tokio::test]
  async fn get_reads_regular_files_only() {
    let (_temp, tree) = populated();
    let file = tree.get("src/a.c").await.unwrap().unwrap();
    assert_eq!(file.name(), "src/a.c");
    assert_eq!(file.read_string().await.unwrap(), "a");
    assert!(tree.get("src").await.unwrap().is_none());
    assert!(tree.get("src/missing.c").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn find_glob_is_relative_to_root() {
    let (_temp, tree) = populated();
    let found = tree.find(&Name::parse("src/*.h").unwrap()).await.unwrap();
    assert_eq!(found.names(), vec!["src/b.h"]);
  }

  #[tokio::test]
  async fn find_literal_missing_fails() {
    let (_temp, tree) = populated();
    let err = tree.find(&Name::literal("src/nope.c")).await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
  }
}
