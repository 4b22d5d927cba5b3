//! # ledgerq-crypto
//!
//! Cryptographic primitives used to sign proposals and compare peer payloads.
//!
//! - SHA-256 hashing (payload digests, proposal hashes, transaction ids)
//! - ECDSA signing/verification (secp256k1, low-s)
//! - SEC1 public key encoding for certificates

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::{sha256, sha256_concat};
pub use signature::{
    private_key_from_hex, private_key_to_hex, public_key_from_hex, public_key_to_hex, sign,
    verify, PrivateKey, PublicKey, Signature,
};
