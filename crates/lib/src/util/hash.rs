//! SHA-256 digests for file identity and build cache keys.
//!
//! Two flavours are used:
//!
//! - [`ContentHash`]: the full hex digest of some bytes, used to tell files apart
//! - [`ObjectHash`]: a truncated digest of a serialized key, used to name
//!   build cache entries on disk

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;
use crate::error::{Error, Result};

/// Name of a build cache entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Values that can be turned into an [`ObjectHash`].
///
/// The key is the JSON form of the value, so field order and names matter.
pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash> {
    let json = serde_json::to_vec(self).map_err(|e| Error::Internal(format!("unhashable cache key: {e}")))?;
    let mut digest = hash_bytes(&json).0;
    digest.truncate(OBJ_HASH_PREFIX_LEN);
    Ok(ObjectHash(digest))
  }
}

/// Hex SHA-256 of file contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Digest of the file at `path`, streamed. Blocks.
pub fn hash_file(path: &Path) -> Result<ContentHash> {
  let mut file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
  let mut hasher = Sha256::new();
  io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
  Ok(ContentHash(hex::encode(hasher.finalize())))
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}
