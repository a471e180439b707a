// Copyright 2018-2026 the module_runtime authors. MIT license.

//! Small cache primitives shared by the Transform Cache (C2): content
//! hashing and atomic writes. Split out of `transform.rs` because the
//! teacher keeps this kind of low-level disk-cache plumbing in its own
//! module (`cli/cache/disk_cache.rs`) rather than folded into the
//! higher-level cache that uses it.

use std::fs;
use std::io;
use std::path::Path;

use sha2::Digest;
use sha2::Sha256;

/// Hex-encoded SHA-256 of `parts`, joined in order. Used to derive
/// cache keys from a variable number of heterogeneous inputs (path,
/// source text, transform config) without allocating an intermediate
/// concatenated buffer.
pub fn content_hash(parts: &[&[u8]]) -> String {
  let mut hasher = Sha256::new();
  for part in parts {
    hasher.update(part);
  }
  format!("{:x}", hasher.finalize())
}

/// Writes `contents` to `path` via a temporary sibling file followed by
/// a rename, so a concurrent reader never observes a partially written
/// cache entry. Mirrors the teacher's
/// `atomic_write_file_with_retries` posture
/// (`cli/cache/disk_cache.rs`): content-addressed keys make retried or
/// colliding writes idempotent, so no cross-process lock is needed.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir)?;
  let tmp_path = dir.join(format!(
    ".{}.tmp",
    path.file_name().and_then(|n| n.to_str()).unwrap_or("cache-entry")
  ));
  fs::write(&tmp_path, contents)?;
  fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn atomic_write_produces_final_file_not_temp() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entry.json");
    atomic_write(&path, b"{}").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    assert!(!dir.path().join(".entry.json.tmp").exists());
  }

  #[test]
  fn content_hash_is_stable_and_order_sensitive() {
    let a = content_hash(&[b"foo", b"bar"]);
    let b = content_hash(&[b"foo", b"bar"]);
    let c = content_hash(&[b"bar", b"foo"]);
    assert_eq!(a, b);
    assert_ne!(a, c);
  }
}
