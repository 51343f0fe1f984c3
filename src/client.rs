use crate::config::TranslatorConfig;
use crate::interpreter::ResponseInterpreter;
use crate::request::TranslationRequest;
use crate::translator::TranslationResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::instrument;

pub const NOT_CONFIGURED_TEXT: &str = "API key not configured";
pub const API_ERROR_TEXT: &str = "API Error";
pub const ERROR_TEXT: &str = "Error";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("API credential is not configured")]
    CredentialMissing,
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("Transport fault: {0}")]
    Transport(String),
}

/// Secret read once at startup. `Debug` never prints the value.
#[derive(Clone)]
pub struct ApiCredential(String);

impl ApiCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One POST of a JSON body. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &TranslationRequest,
    ) -> Result<TransportResponse, ClientError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
        body: &TranslationRequest,
    ) -> Result<TransportResponse, ClientError> {
        // Errors are stripped of the URL since it carries the API key.
        let response = self
            .client
            .post(url)
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.without_url().to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

fn upstream_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| format!("API error: {}", status))
}

pub struct TranslationClient {
    transport: Arc<dyn Transport>,
    credential: Option<ApiCredential>,
    url: String,
    interpreter: ResponseInterpreter,
}

impl TranslationClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credential: Option<ApiCredential>,
        url: impl Into<String>,
        interpreter: ResponseInterpreter,
    ) -> Self {
        Self {
            transport,
            credential,
            url: url.into(),
            interpreter,
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(config.get_timeout())?;
        let credential = config.resolve_api_key().map(ApiCredential::new);
        if credential.is_none() {
            tracing::warn!("No API key configured; translations will report it as missing");
        }

        Ok(Self::new(
            Arc::new(transport),
            credential,
            config.get_generate_url(),
            ResponseInterpreter::new(config.safety_confidence, config.min_confidence),
        ))
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Never fails: every fault is logged and folded into a sentinel result.
    #[instrument(skip_all)]
    pub async fn send(&self, request: &TranslationRequest) -> TranslationResult {
        match self.try_send(request).await {
            Ok(result) => result,
            Err(ClientError::CredentialMissing) => {
                tracing::warn!("Translation skipped: API key not configured");
                TranslationResult::new(NOT_CONFIGURED_TEXT, 0.0)
            }
            Err(ClientError::Upstream { status, message }) => {
                tracing::warn!(status, "Inference API error: {}", message);
                TranslationResult::new(API_ERROR_TEXT, 0.0)
            }
            Err(ClientError::Transport(reason)) => {
                tracing::error!("Error calling inference API: {}", reason);
                TranslationResult::new(ERROR_TEXT, 0.0)
            }
        }
    }

    async fn try_send(&self, request: &TranslationRequest) -> Result<TranslationResult, ClientError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or(ClientError::CredentialMissing)?;

        tracing::debug!("Sending image to inference API");
        let response = self
            .transport
            .post_json(&self.url, &[("key", credential.expose())], request)
            .await?;

        if response.status != 200 {
            return Err(ClientError::Upstream {
                status: response.status,
                message: upstream_message(response.status, &response.body),
            });
        }

        self.interpreter
            .interpret_body(&response.body)
            .ok_or_else(|| ClientError::Transport("malformed response body".into()))
    }
}
