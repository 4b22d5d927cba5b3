//! Certificate authority contract

use async_trait::async_trait;

use crate::identity::Certificate;
use crate::types::EnrollmentRequest;
use crate::SdkError;

/// Issues enrollment certificates (object-safe)
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Authenticate the enrollment id/secret and certify the supplied public key
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<Certificate, SdkError>;
}
