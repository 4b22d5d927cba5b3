//! Enrollment certificates and signing identities

use k256::ecdsa::SigningKey;
use ledgerq_crypto::{
    private_key_from_hex, private_key_to_hex, public_key_from_hex, public_key_to_hex, sign,
    verify, PrivateKey, PublicKey, Signature,
};
use ledgerq_primitives::H256;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::SdkError;

/// Enrollment certificate issued by a certificate authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Enrollment id the certificate was issued to
    pub subject: String,
    /// Compressed SEC1 public key, hex
    pub public_key: String,
    /// Name of the issuing authority
    pub issuer: String,
    /// Serial number assigned by the issuer
    pub serial: u64,
}

impl Certificate {
    /// Decode the embedded public key
    pub fn public_key(&self) -> Result<PublicKey, SdkError> {
        public_key_from_hex(&self.public_key)
            .map_err(|e| SdkError::InvalidCertificate(e.to_string()))
    }

    /// Verify a signature made by the holder of this certificate
    pub fn verify(&self, digest: &H256, signature: &Signature) -> Result<bool, SdkError> {
        Ok(verify(digest, signature, &self.public_key()?)?)
    }
}

/// Key pair generated on the client before enrollment.
///
/// Clone is intentionally not implemented to prevent accidental key duplication.
pub struct KeyPair {
    private_key: PrivateKey,
}

impl KeyPair {
    /// Generate a fresh secp256k1 key pair
    pub fn generate() -> Self {
        Self {
            private_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Restore a key pair from its hex-encoded private scalar
    pub fn from_private_key_hex(hex: &str) -> Result<Self, SdkError> {
        let mut owned = hex.to_string();
        let result = private_key_from_hex(&owned)
            .map_err(|e| SdkError::InvalidPrivateKey(e.to_string()));
        owned.zeroize();
        Ok(Self {
            private_key: result?,
        })
    }

    /// Public key as compressed SEC1 hex, the form sent in enrollment requests
    pub fn public_key_hex(&self) -> String {
        public_key_to_hex(self.private_key.verifying_key())
    }

    /// Hex-encoded private scalar, for the credential store
    pub fn private_key_hex(&self) -> String {
        private_key_to_hex(&self.private_key)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Certificate plus the private key matching it.
///
/// Every proposal sent to a peer is signed by one of these.
pub struct SigningIdentity {
    certificate: Certificate,
    private_key: PrivateKey,
}

impl SigningIdentity {
    /// Bind an issued certificate to the key pair it was issued for
    pub fn new(certificate: Certificate, keys: KeyPair) -> Result<Self, SdkError> {
        if certificate.public_key != keys.public_key_hex() {
            return Err(SdkError::InvalidCertificate(format!(
                "certificate for {} does not match the local key pair",
                certificate.subject
            )));
        }
        Ok(Self {
            certificate,
            private_key: keys.private_key,
        })
    }

    /// Enrollment id
    pub fn subject(&self) -> &str {
        &self.certificate.subject
    }

    /// The enrollment certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Hex-encoded private scalar, for the credential store
    pub fn private_key_hex(&self) -> String {
        private_key_to_hex(&self.private_key)
    }

    /// Sign a 32-byte digest
    pub fn sign_digest(&self, digest: &H256) -> Result<Signature, SdkError> {
        sign(digest, &self.private_key).map_err(|e| SdkError::SigningFailed(e.to_string()))
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.certificate.subject)
            .field("issuer", &self.certificate.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerq_crypto::sha256;

    fn certificate_for(keys: &KeyPair, subject: &str) -> Certificate {
        Certificate {
            subject: subject.to_string(),
            public_key: keys.public_key_hex(),
            issuer: "ca.test".to_string(),
            serial: 1,
        }
    }

    #[test]
    fn test_signing_identity_sign_and_verify() {
        let keys = KeyPair::generate();
        let cert = certificate_for(&keys, "alice");
        let identity = SigningIdentity::new(cert.clone(), keys).unwrap();

        let digest = sha256(b"proposal");
        let signature = identity.sign_digest(&digest).unwrap();
        assert!(cert.verify(&digest, &signature).unwrap());
    }

    #[test]
    fn test_signing_identity_rejects_mismatched_certificate() {
        let keys = KeyPair::generate();
        let other = KeyPair::generate();
        let cert = certificate_for(&other, "alice");
        let result = SigningIdentity::new(cert, keys);
        assert!(matches!(result, Err(SdkError::InvalidCertificate(_))));
    }

    #[test]
    fn test_key_pair_hex_roundtrip() {
        let keys = KeyPair::generate();
        let restored = KeyPair::from_private_key_hex(&keys.private_key_hex()).unwrap();
        assert_eq!(keys.public_key_hex(), restored.public_key_hex());
    }

    #[test]
    fn test_key_pair_invalid_hex() {
        let result = KeyPair::from_private_key_hex("0x1234");
        assert!(matches!(result, Err(SdkError::InvalidPrivateKey(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let keys = KeyPair::generate();
        let cert = certificate_for(&keys, "bob");
        let identity = SigningIdentity::new(cert, keys).unwrap();
        let debug = format!("{:?}", identity);
        assert!(debug.contains("bob"));
        assert!(!debug.contains("private_key"));
    }

    #[test]
    fn test_certificate_with_bad_public_key() {
        let cert = Certificate {
            subject: "x".into(),
            public_key: "zz".into(),
            issuer: "ca".into(),
            serial: 0,
        };
        assert!(matches!(cert.public_key(), Err(SdkError::InvalidCertificate(_))));
    }
}
