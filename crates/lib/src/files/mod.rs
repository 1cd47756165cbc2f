//! Files and file sets produced by targets and file references.
//!
//! A [`File`] is named by its path relative to whatever produced it (a source
//! tree root, a build cache entry, an unpacked archive). Its contents live
//! either on disk or in memory; both carry a SHA-256 content hash and a
//! [`FileStat`].
//!
//! A [`FileSource`] is what resolving a target or a file reference yields:
//! either a single file or a [`FileSet`].

mod local;
mod memory;
mod tree;

pub use local::LocalSourceTree;
pub use memory::MemorySourceTree;
pub use tree::SourceTree;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::name::Name;
use crate::util::hash::{ContentHash, hash_bytes, hash_file};

/// Size and modification time of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
  pub size: u64,
  pub mtime: SystemTime,
}

/// Where a file's contents live.
#[derive(Clone)]
pub enum FileData {
  Disk(PathBuf),
  Memory(Arc<[u8]>),
}

impl fmt::Debug for FileData {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FileData::Disk(path) => f.debug_tuple("Disk").field(path).finish(),
      FileData::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
    }
  }
}

/// A single file with a known content hash.
#[derive(Debug, Clone)]
pub struct File {
  name: String,
  data: FileData,
  hash: ContentHash,
  stat: FileStat,
}

impl File {
  /// Describe a file on disk. Hashes its contents, so this blocks.
  pub fn from_disk(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
    let hash = hash_file(path)?;
    Ok(Self {
      name: name.into(),
      data: FileData::Disk(path.to_path_buf()),
      hash,
      stat: FileStat {
        size: metadata.len(),
        mtime: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
      },
    })
  }

  /// An in-memory file.
  pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
    let data = data.into();
    Self {
      name: name.into(),
      hash: hash_bytes(&data),
      stat: FileStat {
        size: data.len() as u64,
        mtime: SystemTime::now(),
      },
      data: FileData::Memory(data),
    }
  }

  pub fn from_string(name: impl Into<String>, content: &str) -> Self {
    Self::from_bytes(name, content.as_bytes())
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn data(&self) -> &FileData {
    &self.data
  }

  /// Path on disk, if the contents live there.
  pub fn path(&self) -> Option<&Path> {
    match &self.data {
      FileData::Disk(path) => Some(path),
      FileData::Memory(_) => None,
    }
  }

  pub fn hash(&self) -> &ContentHash {
    &self.hash
  }

  pub fn stat(&self) -> FileStat {
    self.stat
  }

  /// The same contents under another name.
  pub fn renamed(&self, name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..self.clone()
    }
  }

  pub async fn read(&self) -> Result<Arc<[u8]>> {
    match &self.data {
      FileData::Disk(path) => {
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
        Ok(bytes.into())
      }
      FileData::Memory(data) => Ok(data.clone()),
    }
  }

  pub async fn read_string(&self) -> Result<String> {
    let bytes = self.read().await?;
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::Io {
      path: self.name.clone(),
      source: Arc::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
    })
  }

  /// Whether both describe the same underlying storage, not merely equal contents.
  pub fn is_same_file(&self, other: &File) -> bool {
    match (&self.data, &other.data) {
      (FileData::Disk(a), FileData::Disk(b)) => a == b,
      (FileData::Memory(a), FileData::Memory(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

/// Files keyed and ordered by name.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
  files: BTreeMap<String, File>,
}

impl FileSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Collect files; a later file replaces an earlier one of the same name.
  pub fn from_files(files: impl IntoIterator<Item = File>) -> Self {
    let mut set = Self::new();
    for file in files {
      set.insert(file);
    }
    set
  }

  /// Every regular file below `dir`, named relative to it with `/` separators.
  ///
  /// Entries whose file name appears in `exclude` are skipped. Blocks.
  pub fn from_dir(dir: &Path, exclude: &[&str]) -> Result<Self> {
    let mut set = Self::new();
    let walker = WalkDir::new(dir).sort_by_file_name().into_iter().filter_entry(|e| {
      e.file_name()
        .to_str()
        .map(|name| !exclude.contains(&name))
        .unwrap_or(true)
    });

    for entry in walker {
      let entry = entry.map_err(|e| {
        let at = e.path().unwrap_or(dir).to_path_buf();
        Error::io(&at, e.into())
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      let rel = entry
        .path()
        .strip_prefix(dir)
        .unwrap_or(entry.path())
        .to_string_lossy()
        .replace('\\', "/");
      set.insert(File::from_disk(rel, entry.path())?);
    }

    Ok(set)
  }

  /// Flatten sources into one set.
  pub fn merge<'a>(sources: impl IntoIterator<Item = &'a FileSource>) -> Self {
    Self::from_files(sources.into_iter().flat_map(|s| s.files()).cloned())
  }

  /// Files from `sources` whose names match `pattern`.
  pub fn find_all(sources: &[FileSource], pattern: &Name) -> Result<Self> {
    let mut set = Self::new();
    for file in sources.iter().flat_map(FileSource::files) {
      if pattern.matches(file.name())? {
        set.insert(file.clone());
      }
    }
    Ok(set)
  }

  pub fn insert(&mut self, file: File) {
    self.files.insert(file.name.clone(), file);
  }

  pub fn get(&self, name: &str) -> Option<&File> {
    self.files.get(name)
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &File> {
    self.files.values()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.files.keys().map(String::as_str)
  }
}

impl<'a> IntoIterator for &'a FileSet {
  type Item = &'a File;
  type IntoIter = std::collections::btree_map::Values<'a, String, File>;

  fn into_iter(self) -> Self::IntoIter {
    self.files.values()
  }
}

/// The resolved output of a target or a file reference.
#[derive(Debug, Clone)]
pub enum FileSource {
  File(File),
  Set(FileSet),
}

impl FileSource {
  pub fn files(&self) -> Vec<&File> {
    match self {
      FileSource::File(file) => vec![file],
      FileSource::Set(set) => set.iter().collect(),
    }
  }

  /// Names of all files, in order.
  pub fn names(&self) -> Vec<&str> {
    self.files().into_iter().map(File::name).collect()
  }
}

impl From<File> for FileSource {
  fn from(file: File) -> Self {
    FileSource::File(file)
  }
}

impl From<FileSet> for FileSource {
  fn from(set: FileSet) -> Self {
    FileSource::Set(set)
  }
}
