//! SHA-256 fingerprints for compiled output.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes`
pub fn compute_checksum(bytes: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(bytes.as_ref());
    format!("{:x}", digest)
}
