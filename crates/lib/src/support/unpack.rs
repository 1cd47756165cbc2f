//! Archive unpacking.
//!
//! The format is detected from magic bytes, not from a file name:
//!
//! - gzip: decompressed and detected again (so `.tar.gz` works)
//! - tar: `ustar` at offset 257
//! - zip: local file header signature
//!
//! Entries with absolute paths or `..` components are rejected.

use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};

use crate::computable::Computable;
use crate::error::{Error, Result};
use crate::files::{File, FileSet};

/// Bytes needed to recognise every supported format.
pub const MIN_HEAD_LENGTH: usize = 262;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
  Gzip,
  Tar,
  Zip,
  Unknown,
}

/// Detect the archive format from the first bytes of `data`.
pub fn archive_type(data: &[u8]) -> ArchiveType {
  if data.starts_with(&[0x1f, 0x8b, 0x08]) {
    ArchiveType::Gzip
  } else if data.len() >= MIN_HEAD_LENGTH && &data[257..262] == b"ustar" {
    ArchiveType::Tar
  } else if data.starts_with(&[0x50, 0x4b, 0x03, 0x04]) {
    ArchiveType::Zip
  } else {
    ArchiveType::Unknown
  }
}

/// Unpack `data` into `dir` and return the unpacked files, named relative to `dir`.
pub fn unpack(data: Arc<[u8]>, dir: PathBuf) -> Computable<FileSet> {
  Computable::from_future(async move {
    tokio::task::spawn_blocking(move || unpack_blocking(&data, &dir))
      .await
      .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?
  })
}

fn unpack_blocking(data: &[u8], dir: &Path) -> Result<FileSet> {
  std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

  let mut names = Vec::new();
  unpack_bytes(data, dir, &mut names)?;

  let files = names
    .into_iter()
    .map(|name| {
      let path = dir.join(&name);
      File::from_disk(name, path)
    })
    .collect::<Result<Vec<_>>>()?;

  info!(dir = ?dir, files = files.len(), "unpacked archive");
  Ok(FileSet::from_files(files))
}

fn unpack_bytes(data: &[u8], dir: &Path, names: &mut Vec<String>) -> Result<()> {
  match archive_type(data) {
    ArchiveType::Gzip => {
      let mut decoded = Vec::new();
      GzDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::UnsupportedArchive(format!("invalid gzip stream: {e}")))?;
      debug!(size = decoded.len(), "decompressed gzip layer");
      unpack_bytes(&decoded, dir, names)
    }
    ArchiveType::Tar => unpack_tar(data, dir, names),
    ArchiveType::Zip => unpack_zip(data, dir, names),
    ArchiveType::Unknown => Err(Error::UnsupportedArchive("unrecognized archive format".to_string())),
  }
}

fn unpack_tar(data: &[u8], dir: &Path, names: &mut Vec<String>) -> Result<()> {
  let mut archive = Archive::new(Cursor::new(data));

  for entry in archive.entries().map_err(|e| Error::io(dir, e))? {
    let mut entry = entry.map_err(|e| Error::io(dir, e))?;
    let path = entry.path().map_err(|e| Error::io(dir, e))?.into_owned();
    let name = safe_relative(&path)?;
    if name.is_empty() {
      continue;
    }

    let dest = dir.join(&name);
    let kind = entry.header().entry_type();
    if kind.is_dir() {
      std::fs::create_dir_all(&dest).map_err(|e| Error::io(&dest, e))?;
      continue;
    }
    if !kind.is_file() {
      debug!(entry = %name, "skipping non-regular archive entry");
      continue;
    }

    create_parent(&dest)?;
    entry.unpack(&dest).map_err(|e| Error::io(&dest, e))?;
    names.push(name);
  }

  Ok(())
}

fn unpack_zip(data: &[u8], dir: &Path, names: &mut Vec<String>) -> Result<()> {
  let mut archive =
    zip::ZipArchive::new(Cursor::new(data)).map_err(|e| Error::UnsupportedArchive(format!("invalid zip: {e}")))?;

  for i in 0..archive.len() {
    let mut file = archive
      .by_index(i)
      .map_err(|e| Error::UnsupportedArchive(format!("invalid zip entry: {e}")))?;
    let name = safe_relative(Path::new(file.name()))?;
    if name.is_empty() {
      continue;
    }

    let dest = dir.join(&name);
    if file.is_dir() {
      std::fs::create_dir_all(&dest).map_err(|e| Error::io(&dest, e))?;
      continue;
    }

    create_parent(&dest)?;
    let mut out = std::fs::File::create(&dest).map_err(|e| Error::io(&dest, e))?;
    std::io::copy(&mut file, &mut out).map_err(|e| Error::io(&dest, e))?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = file.unix_mode() {
        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode)).map_err(|e| Error::io(&dest, e))?;
      }
    }

    names.push(name);
  }

  Ok(())
}

/// The entry path as a `/`-separated relative name, refusing anything that
/// could land outside the target directory.
fn safe_relative(path: &Path) -> Result<String> {
  let mut parts = Vec::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
      Component::CurDir => {}
      Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
        return Err(Error::UnsupportedArchive(format!(
          "unsafe entry path '{}'",
          path.display()
        )));
      }
    }
  }
  Ok(parts.join("/"))
}

fn create_parent(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
  }
  Ok(())
}
