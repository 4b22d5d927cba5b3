//! HTTP/JSON adapters for peers, the ordering service and the certificate authority
//!
//! Every endpoint answers with the envelope `{"result": ...}` or
//! `{"error": {"code": .., "message": ..}}`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authority::CertificateAuthority;
use crate::identity::Certificate;
use crate::orderer::{CommitHandle, Orderer};
use crate::peer::Peer;
use crate::types::{
    EndorsedTransaction, EnrollmentRequest, ProposalResponse, SignedProposal, TransactionEvent,
};
use crate::SdkError;

#[derive(Deserialize)]
struct Envelope {
    result: Option<Value>,
    error: Option<EnvelopeError>,
}

#[derive(Deserialize)]
struct EnvelopeError {
    code: i64,
    message: String,
}

fn decode_envelope<T: DeserializeOwned>(value: Value) -> Result<T, SdkError> {
    let envelope: Envelope = serde_json::from_value(value)?;
    if let Some(error) = envelope.error {
        return Err(SdkError::Remote {
            code: error.code,
            message: error.message,
        });
    }
    let result = envelope.result.ok_or_else(|| SdkError::Remote {
        code: -32603,
        message: "No result in response".to_string(),
    })?;
    Ok(serde_json::from_value(result)?)
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin JSON client shared by the adapters
#[derive(Clone)]
struct JsonClient {
    client: reqwest::Client,
    base: String,
}

impl JsonClient {
    fn new(base: &str) -> Self {
        // Falls back to the default client if the builder cannot initialize TLS
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SdkError> {
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .map_err(|e| SdkError::Transport(e.to_string()))?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| SdkError::Transport(e.to_string()))?;
        decode_envelope(value)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .map_err(|e| SdkError::Transport(e.to_string()))?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| SdkError::Transport(e.to_string()))?;
        decode_envelope(value)
    }
}

/// Peer reached over HTTP
pub struct HttpPeer {
    name: String,
    http: JsonClient,
}

impl HttpPeer {
    /// Create a peer adapter for `url`
    pub fn new(name: impl Into<String>, url: &str) -> Self {
        Self {
            name: name.into(),
            http: JsonClient::new(url),
        }
    }
}

#[async_trait]
impl Peer for HttpPeer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, SdkError> {
        let mut response: ProposalResponse = self.http.post("/proposals", proposal).await?;
        // The locally configured name is authoritative
        response.peer = self.name.clone();
        Ok(response)
    }

    async fn query_channels(&self, requester: &Certificate) -> Result<BTreeSet<String>, SdkError> {
        let channels: Vec<String> = self.http.post("/channels", requester).await?;
        Ok(channels.into_iter().collect())
    }
}

/// Ordering service reached over HTTP.
///
/// After a broadcast is accepted, a background task long-polls
/// `GET /transactions/{tx_id}/event` and feeds the commit handle.
pub struct HttpOrderer {
    http: JsonClient,
}

impl HttpOrderer {
    /// Create an orderer adapter for `url`
    pub fn new(url: &str) -> Self {
        Self {
            http: JsonClient::new(url),
        }
    }
}

#[derive(Deserialize)]
struct BroadcastAck {
    accepted: bool,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl Orderer for HttpOrderer {
    async fn broadcast(&self, transaction: &EndorsedTransaction) -> Result<CommitHandle, SdkError> {
        let ack: BroadcastAck = self.http.post("/broadcast", transaction).await?;
        if !ack.accepted {
            return Err(SdkError::Remote {
                code: 400,
                message: ack.message,
            });
        }

        let (sender, handle) = CommitHandle::channel();
        let http = self.http.clone();
        let path = format!("/transactions/{}/event", transaction.tx_id());
        tokio::spawn(async move {
            sender
                .relay(async move { http.get::<TransactionEvent>(&path).await })
                .await;
        });
        Ok(handle)
    }
}

/// Certificate authority reached over HTTP
pub struct HttpAuthority {
    http: JsonClient,
}

impl HttpAuthority {
    /// Create an authority adapter for `url`
    pub fn new(url: &str) -> Self {
        Self {
            http: JsonClient::new(url),
        }
    }
}

#[async_trait]
impl CertificateAuthority for HttpAuthority {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<Certificate, SdkError> {
        self.http.post("/enroll", request).await.map_err(|e| match e {
            SdkError::Remote { message, .. } => SdkError::Enrollment(message),
            other => other,
        })
    }
}
