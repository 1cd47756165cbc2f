use std::collections::BTreeMap;

use crate::computable::Computable;
use crate::error::Error;
use crate::files::{File, FileSet, FileSource, SourceTree};
use crate::name::Name;

/// A source tree held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceTree {
  files: BTreeMap<String, File>,
}

impl MemorySourceTree {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add (or replace) a file.
  pub fn insert(&mut self, path: &str, content: &str) -> &mut Self {
    self.files.insert(path.to_string(), File::from_string(path, content));
    self
  }

  pub fn with_file(mut self, path: &str, content: &str) -> Self {
    self.insert(path, content);
    self
  }
}

impl SourceTree for MemorySourceTree {
  fn get(&self, path: &str) -> Computable<Option<File>> {
    Computable::resolve(self.files.get(path).cloned())
  }

  fn find(&self, pattern: &Name) -> Computable<FileSource> {
    if let Some(path) = pattern.simple_name() {
      return match self.files.get(path) {
        Some(file) => Computable::resolve(FileSource::File(file.clone())),
        None => Computable::reject(Error::FileNotFound(path.to_string())),
      };
    }

    let mut set = FileSet::new();
    for (path, file) in &self.files {
      match pattern.matches(path) {
        Ok(true) => set.insert(file.clone()),
        Ok(false) => {}
        Err(e) => return Computable::reject(e),
      }
    }
    Computable::resolve(FileSource::Set(set))
  }
}
