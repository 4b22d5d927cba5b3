//! ECDSA signature operations using secp256k1

use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use ledgerq_primitives::H256;

use crate::CryptoError;

/// Half of the secp256k1 curve order (n/2)
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D,
    0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Full secp256k1 curve order (n)
const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B,
    0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// ECDSA signature with recovery id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// recovery id (0 or 1)
    pub v: u8,
}

/// Public key
pub type PublicKey = VerifyingKey;

/// Private key (32 bytes)
pub type PrivateKey = SigningKey;

impl Signature {
    /// Create signature from r, s, v components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Signature { r, s, v }
    }

    /// Convert to 65-byte representation (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Parse from 65-byte representation
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Signature { r, s, v: bytes[64] }
    }

    /// Hex encoding of [`Signature::to_bytes`]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse the hex form produced by [`Signature::to_hex`]
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let bytes: [u8; 65] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidSignature(format!("expected 65 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Check if signature has low-s value
    pub fn is_low_s(&self) -> bool {
        self.s <= SECP256K1_N_DIV_2
    }
}

/// Subtract s from n (secp256k1 order), result = n - s
fn subtract_from_n(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: u16 = 0;

    for i in (0..32).rev() {
        let diff = (SECP256K1_N[i] as u16)
            .wrapping_sub(s[i] as u16)
            .wrapping_sub(borrow);
        result[i] = diff as u8;
        borrow = if diff > 255 { 1 } else { 0 };
    }

    result
}

/// Sign a 32-byte digest with a private key, normalized to low-s
pub fn sign(digest: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (signature, mut recovery_id) = private_key
        .sign_prehash_recoverable(digest.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let r_bytes: [u8; 32] = signature.r().to_bytes().into();
    let mut s_bytes: [u8; 32] = signature.s().to_bytes().into();

    if s_bytes > SECP256K1_N_DIV_2 {
        s_bytes = subtract_from_n(&s_bytes);
        recovery_id = RecoveryId::try_from(recovery_id.to_byte() ^ 1).map_err(|_| {
            CryptoError::SigningFailed("invalid recovery id after normalization".to_string())
        })?;
    }

    Ok(Signature {
        r: r_bytes,
        s: s_bytes,
        v: recovery_id.to_byte(),
    })
}

/// Verify a signature against a digest and public key
pub fn verify(
    digest: &H256,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    if !signature.is_low_s() {
        return Ok(false);
    }

    let r: k256::FieldBytes = signature.r.into();
    let s: k256::FieldBytes = signature.s.into();
    let k256_sig = K256Signature::from_scalars(r, s)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    Ok(public_key.verify_prehash(digest.as_bytes(), &k256_sig).is_ok())
}

/// Compressed SEC1 encoding of a public key, hex
pub fn public_key_to_hex(public_key: &PublicKey) -> String {
    hex::encode(public_key.to_encoded_point(true).as_bytes())
}

/// Parse a SEC1-encoded public key from hex
pub fn public_key_from_hex(s: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    VerifyingKey::from_sec1_bytes(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Hex encoding of the 32-byte private scalar
pub fn private_key_to_hex(private_key: &PrivateKey) -> String {
    hex::encode(private_key.to_bytes())
}

/// Parse a private key from hex
pub fn private_key_from_hex(s: &str) -> Result<PrivateKey, CryptoError> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|_| CryptoError::InvalidPrivateKey)?;
    SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sha256;
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_and_verify() {
        let private_key = SigningKey::random(&mut OsRng);
        let public_key = private_key.verifying_key();
        let digest = sha256(b"proposal bytes");

        let signature = sign(&digest, &private_key).unwrap();

        assert!(signature.is_low_s());
        assert!(verify(&digest, &signature, public_key).unwrap());
    }

    #[test]
    fn test_verify_wrong_digest() {
        let private_key = SigningKey::random(&mut OsRng);
        let signature = sign(&sha256(b"a"), &private_key).unwrap();
        assert!(!verify(&sha256(b"b"), &signature, private_key.verifying_key()).unwrap());
    }

    #[test]
    fn test_verify_wrong_key() {
        let signer = SigningKey::random(&mut OsRng);
        let other = SigningKey::random(&mut OsRng);
        let digest = sha256(b"a");
        let signature = sign(&digest, &signer).unwrap();
        assert!(!verify(&digest, &signature, other.verifying_key()).unwrap());
    }

    #[test]
    fn test_low_s_enforcement() {
        for _ in 0..10 {
            let private_key = SigningKey::random(&mut OsRng);
            let signature = sign(&sha256(b"test"), &private_key).unwrap();
            assert!(signature.is_low_s());
        }
    }

    #[test]
    fn test_reject_high_s_signature() {
        let private_key = SigningKey::random(&mut OsRng);
        let digest = sha256(b"test");
        let mut signature = sign(&digest, &private_key).unwrap();
        signature.s = [0xFF; 32];
        assert!(!verify(&digest, &signature, private_key.verifying_key()).unwrap());
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let private_key = SigningKey::random(&mut OsRng);
        let signature = sign(&sha256(b"x"), &private_key).unwrap();
        let parsed = Signature::from_hex(&signature.to_hex()).unwrap();
        assert_eq!(parsed, signature);
    }

    #[test]
    fn test_signature_from_hex_wrong_length() {
        assert!(matches!(
            Signature::from_hex("abcd"),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let private_key = SigningKey::random(&mut OsRng);
        let encoded = public_key_to_hex(private_key.verifying_key());
        assert_eq!(encoded.len(), 66);
        let decoded = public_key_from_hex(&encoded).unwrap();
        assert_eq!(&decoded, private_key.verifying_key());
    }

    #[test]
    fn test_private_key_hex_roundtrip() {
        let private_key = SigningKey::random(&mut OsRng);
        let decoded = private_key_from_hex(&private_key_to_hex(&private_key)).unwrap();
        assert_eq!(decoded.verifying_key(), private_key.verifying_key());
    }

    #[test]
    fn test_private_key_from_hex_invalid() {
        assert!(matches!(
            private_key_from_hex("1234"),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }
}
