//! Pure sharding of file names into a bounded directory tree.

use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Map a file name to its sharded relative path: `ab/cd/<file_name>`.
///
/// The two levels come from the hex SHA-256 of the name, so fan-out per
/// directory is bounded at 256 entries per level and the mapping depends on
/// nothing but the name itself. Must stay stable across releases: existing
/// trees are laid out with it.
pub fn shard_path(file_name: &str) -> PathBuf {
    let digest = Sha256::digest(file_name.as_bytes());
    let hex = hex::encode(&digest[..2]);
    PathBuf::from(&hex[0..2]).join(&hex[2..4]).join(file_name)
}
