//! Identity Manager

use std::sync::Arc;

use ledgerq_sdk::{Certificate, ClientContext, KeyPair, SigningIdentity};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::store::{CredentialStore, SecretDigest, StoredCredential};

/// Enrolled user identity.
///
/// The enrollment secret is never retained. The private key lives inside the
/// signing identity and is zeroized when the identity is dropped.
#[derive(Debug)]
pub struct Identity {
    username: String,
    signing: SigningIdentity,
    enrolled: bool,
}

impl Identity {
    fn enrolled(username: &str, signing: SigningIdentity) -> Self {
        Self {
            username: username.to_string(),
            signing,
            enrolled: true,
        }
    }

    /// Enrollment id
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the certificate authority has certified this identity
    pub fn is_enrolled(&self) -> bool {
        self.enrolled
    }

    /// Enrollment certificate
    pub fn certificate(&self) -> &Certificate {
        self.signing.certificate()
    }

    /// Signing identity used for proposals
    pub fn signer(&self) -> &SigningIdentity {
        &self.signing
    }

    /// Fail with a precondition error unless enrolled
    pub fn require_enrolled(&self) -> CoreResult<&SigningIdentity> {
        if !self.enrolled {
            return Err(CoreError::Precondition(format!(
                "identity {} is not enrolled",
                self.username
            )));
        }
        Ok(&self.signing)
    }
}

/// Enrolls identities and keeps them in a credential store
pub struct IdentityManager {
    store: Arc<dyn CredentialStore>,
}

impl IdentityManager {
    /// Create a manager backed by `store`
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Enroll `username`, reusing a stored credential when one exists.
    ///
    /// A stored credential is reused only when `secret` matches the secret it
    /// was enrolled with. Otherwise the certificate authority decides, and a
    /// rejected secret fails with [`CoreError::Identity`].
    pub async fn enroll(
        &self,
        context: &ClientContext,
        username: &str,
        secret: &str,
    ) -> CoreResult<Identity> {
        if username.is_empty() || secret.is_empty() {
            return Err(CoreError::Identity(
                "username and secret must not be empty".to_string(),
            ));
        }

        if let Some(identity) = self.restore(username, secret)? {
            info!("Reusing stored identity for {}", username);
            return Ok(identity);
        }

        let signing = context
            .enroll(username, secret)
            .await
            .map_err(|e| CoreError::Identity(format!("enrollment of {} failed: {}", username, e)))?;

        self.store.save(&StoredCredential {
            username: username.to_string(),
            certificate: signing.certificate().clone(),
            private_key: signing.private_key_hex(),
            secret: Some(SecretDigest::new(secret)),
        })?;

        info!(
            "Enrolled {} (issuer {}, serial {})",
            username,
            signing.certificate().issuer,
            signing.certificate().serial
        );
        Ok(Identity::enrolled(username, signing))
    }

    fn restore(&self, username: &str, secret: &str) -> CoreResult<Option<Identity>> {
        let Some(stored) = self.store.load(username)? else {
            return Ok(None);
        };
        match &stored.secret {
            Some(digest) if digest.matches(secret) => {}
            Some(_) => {
                warn!("Secret does not match stored credential for {}", username);
                return Ok(None);
            }
            None => {
                warn!("Stored credential for {} has no secret digest, re-enrolling", username);
                return Ok(None);
            }
        }
        let signing = KeyPair::from_private_key_hex(&stored.private_key)
            .and_then(|keys| SigningIdentity::new(stored.certificate.clone(), keys));
        match signing {
            Ok(signing) => Ok(Some(Identity::enrolled(username, signing))),
            Err(e) => {
                warn!("Stored credential for {} is unusable, re-enrolling: {}", username, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use ledgerq_sdk::mock::{MockAuthority, MockOrderer};

    fn context(authority: Arc<MockAuthority>) -> ClientContext {
        ClientContext::new(authority, Arc::new(MockOrderer::new()))
    }

    #[tokio::test]
    async fn test_enroll_persists_credential() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = IdentityManager::new(store.clone());

        let identity = manager
            .enroll(&context(authority), "test", "testpw")
            .await
            .unwrap();
        assert!(identity.is_enrolled());
        assert_eq!(identity.username(), "test");
        assert!(identity.require_enrolled().is_ok());

        let stored = store.load("test").unwrap().unwrap();
        assert_eq!(&stored.certificate, identity.certificate());
    }

    #[tokio::test]
    async fn test_enroll_reuses_stored_identity() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = IdentityManager::new(store);
        let context = context(authority.clone());

        let first = manager.enroll(&context, "test", "testpw").await.unwrap();
        authority.set_reachable(false);
        let second = manager.enroll(&context, "test", "testpw").await.unwrap();

        assert_eq!(first.certificate(), second.certificate());
        assert_eq!(authority.issued(), 1);
    }

    #[tokio::test]
    async fn test_stored_identity_with_wrong_secret_is_rejected() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let store = Arc::new(MemoryCredentialStore::new());
        let context = context(authority.clone());

        IdentityManager::new(store.clone())
            .enroll(&context, "test", "testpw")
            .await
            .unwrap();

        let restarted = IdentityManager::new(store.clone());
        let err = restarted
            .enroll(&context, "test", "definitely-wrong")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Identity);

        // The stored credential survives the failed attempt
        let again = restarted.enroll(&context, "test", "testpw").await.unwrap();
        assert!(again.is_enrolled());
        assert_eq!(authority.issued(), 1);
    }

    #[tokio::test]
    async fn test_rotated_secret_reenrolls() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = IdentityManager::new(store.clone());
        let context = context(authority.clone());

        manager.enroll(&context, "test", "testpw").await.unwrap();
        authority.register("test", "newpw");
        let identity = manager.enroll(&context, "test", "newpw").await.unwrap();

        assert_eq!(identity.certificate().serial, 2);
        let stored = store.load("test").unwrap().unwrap();
        assert!(stored.secret.as_ref().unwrap().matches("newpw"));
    }

    #[tokio::test]
    async fn test_credential_without_digest_reenrolls() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let store = Arc::new(MemoryCredentialStore::new());
        let manager = IdentityManager::new(store.clone());
        let context = context(authority.clone());

        manager.enroll(&context, "test", "testpw").await.unwrap();
        let mut legacy = store.load("test").unwrap().unwrap();
        legacy.secret = None;
        store.save(&legacy).unwrap();

        assert!(manager.enroll(&context, "test", "wrong").await.is_err());
        manager.enroll(&context, "test", "testpw").await.unwrap();
        assert_eq!(authority.issued(), 2);
    }

    #[tokio::test]
    async fn test_enroll_rejected_secret() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let manager = IdentityManager::new(Arc::new(MemoryCredentialStore::new()));
        let err = manager
            .enroll(&context(authority), "test", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Identity(_)));
    }

    #[tokio::test]
    async fn test_enroll_authority_unreachable() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        authority.set_reachable(false);
        let manager = IdentityManager::new(Arc::new(MemoryCredentialStore::new()));
        let err = manager
            .enroll(&context(authority), "test", "testpw")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Identity(_)));
    }

    #[tokio::test]
    async fn test_enroll_empty_credentials() {
        let authority = Arc::new(MockAuthority::new("ca"));
        let manager = IdentityManager::new(Arc::new(MemoryCredentialStore::new()));
        let context = context(authority);
        assert!(matches!(
            manager.enroll(&context, "", "x").await,
            Err(CoreError::Identity(_))
        ));
        assert!(matches!(
            manager.enroll(&context, "x", "").await,
            Err(CoreError::Identity(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_stored_credential_reenrolls() {
        let authority = Arc::new(MockAuthority::new("ca").with_user("test", "testpw"));
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .save(&StoredCredential {
                username: "test".into(),
                certificate: Certificate {
                    subject: "test".into(),
                    public_key: "02".repeat(33),
                    issuer: "ca".into(),
                    serial: 99,
                },
                private_key: "zz".into(),
                secret: Some(SecretDigest::new("testpw")),
            })
            .unwrap();
        let manager = IdentityManager::new(store);
        let identity = manager
            .enroll(&context(authority.clone()), "test", "testpw")
            .await
            .unwrap();
        assert_eq!(identity.certificate().serial, 1);
        assert_eq!(authority.issued(), 1);
    }
}
