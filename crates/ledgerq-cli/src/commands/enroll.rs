//! Enrollment command

use clap::Args;

use crate::commands::open_session;
use crate::{config::Config, output::Output, CliError};

/// Enroll an identity with the certificate authority
#[derive(Debug, Args)]
pub struct EnrollArgs {
    /// Enrollment id (defaults to the configured user)
    #[arg(long)]
    pub user: Option<String>,
    /// Enrollment secret (defaults to the configured secret)
    #[arg(long)]
    pub secret: Option<String>,
}

impl EnrollArgs {
    pub async fn execute(self, config: &Config, json: bool) -> Result<bool, CliError> {
        let user = self.user.unwrap_or_else(|| config.user.clone());
        let secret = self.secret.unwrap_or_else(|| config.secret.clone());

        let mut session = open_session(config)?;
        let identity = session.enroll(&user, &secret).await?;
        let certificate = identity.certificate();

        Output::new(json)
            .field("username", identity.username())
            .field_bool("enrolled", identity.is_enrolled())
            .field("issuer", &certificate.issuer)
            .field_value("serial", certificate.serial.into())
            .message(&format!(
                "Enrolled {} (issuer {}, serial {})",
                identity.username(),
                certificate.issuer,
                certificate.serial
            ))
            .print();
        Ok(true)
    }
}
