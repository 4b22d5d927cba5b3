//! SHA-256 hashing

use ledgerq_primitives::H256;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Hash several byte slices as if they were concatenated
pub fn sha256_concat(parts: &[&[u8]]) -> H256 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    H256::from_bytes(hasher.finalize().into())
}
