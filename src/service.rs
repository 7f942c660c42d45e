//! Request/response contract of the remote recognition service.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::{Config, ConfigError};
use crate::state::RecognitionResult;

/// Body of `POST /calculate`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalculateRequest {
    /// Canvas snapshot as a `data:` URI.
    pub image: String,
    /// Variable dictionary forwarded untouched.
    pub dict_of_vars: Map<String, Value>,
}

/// Decoded response. Fields are loosely typed so that unexpected shapes
/// decode to "nothing to display" instead of an error.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CalculateResponse {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub data: Value,
}

impl CalculateResponse {
    /// Parses a response body. Anything that is not a JSON object yields an
    /// empty response.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(response) => response,
            Err(error) => {
                log::warn!("recognition response is not a JSON object: {error}");
                Self::default()
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.as_str() == Some("success")
    }

    /// The first entry of `data`, when the response is a success and that
    /// entry carries both `expr` and `result`. Further entries are discarded.
    pub fn first_result(&self) -> Option<RecognitionResult> {
        if !self.is_success() {
            log::debug!("recognition status is {}, nothing to display", self.status);
            return None;
        }

        let entries = self.data.as_array()?;
        if entries.len() > 1 {
            log::debug!("discarding {} extra recognition results", entries.len() - 1);
        }

        let first = entries.first()?.as_object()?;
        let expression = scalar_text(first.get("expr")?)?;
        let answer = scalar_text(first.get("result")?)?;
        Some(RecognitionResult { expression, answer })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("recognition request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start recognition worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("recognition worker stopped without a response")]
    WorkerLost,
    #[error("recognition service unavailable: {0}")]
    Unavailable(String),
}

/// The remote recognizer. Calls block and are made off the UI thread.
pub trait RecognitionService: Send + Sync {
    /// # Errors
    /// Transport failures and non-2xx statuses.
    fn calculate(&self, request: &CalculateRequest) -> Result<CalculateResponse, ServiceError>;
}

pub struct HttpRecognitionService {
    client: Client,
    endpoint: Url,
}

impl HttpRecognitionService {
    /// # Errors
    /// Returns [`ServiceError::Config`] when the endpoint cannot be built and
    /// [`ServiceError::Http`] when the HTTP client fails to initialize.
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("ink_calc/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, config)
    }

    fn with_client(client: Client, config: &Config) -> Result<Self, ServiceError> {
        let endpoint = config.calculate_endpoint()?;
        log::info!("recognition endpoint: {endpoint}");
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RecognitionService for HttpRecognitionService {
    fn calculate(&self, request: &CalculateRequest) -> Result<CalculateResponse, ServiceError> {
        log::info!(
            "sending drawing to {} ({} bytes encoded)",
            self.endpoint,
            request.image.len()
        );
        let body = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()?
            .error_for_status()?
            .text()?;
        log::debug!("recognition response: {body}");
        Ok(CalculateResponse::from_body(&body))
    }
}
