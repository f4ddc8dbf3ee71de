//! Reputation Service Client
//!
//! `ReputationService` is the seam the lookup state machine talks through;
//! `VirusTotalClient` is the HTTP implementation (VirusTotal API v3).

use std::future::Future;

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::types::{
    is_valid_analysis_id, ReputationConfig, ReputationError, ReputationResult, ServiceResponse,
};

/// Digest lookup, byte submission and analysis polling.
///
/// Non-success HTTP statuses are returned as `ServiceResponse`s; `Err` is
/// reserved for transport failures.
pub trait ReputationService: Send + Sync {
    /// `GET /files/{sha256}`
    fn lookup_hash(
        &self,
        sha256: &str,
    ) -> impl Future<Output = ReputationResult<ServiceResponse>> + Send;

    /// `POST /files` with the file as multipart field `file`
    fn submit(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = ReputationResult<ServiceResponse>> + Send;

    /// `GET /analyses/{id}`
    fn analysis_status(
        &self,
        analysis_id: &str,
    ) -> impl Future<Output = ReputationResult<ServiceResponse>> + Send;
}

/// HTTP client for the VirusTotal v3 API
#[derive(Debug, Clone)]
pub struct VirusTotalClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VirusTotalClient {
    pub fn new(config: &ReputationConfig) -> ReputationResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Use a prebuilt client; `config.request_timeout` is not applied
    pub fn with_http_client(config: &ReputationConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ReputationResult<ServiceResponse> {
        let response = request
            .header("x-apikey", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(_) if text.is_empty() => Value::Null,
            Err(_) => Value::String(text),
        };

        if !(200..300).contains(&status) {
            log::warn!("Reputation service replied {}", status);
        }
        Ok(ServiceResponse { status, body })
    }
}

impl ReputationService for VirusTotalClient {
    async fn lookup_hash(&self, sha256: &str) -> ReputationResult<ServiceResponse> {
        let url = format!("{}/files/{}", self.base_url, sha256);
        self.send(self.http_client.get(&url)).await
    }

    async fn submit(&self, file_name: &str, bytes: Vec<u8>) -> ReputationResult<ServiceResponse> {
        let url = format!("{}/files", self.base_url);
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        self.send(self.http_client.post(&url).multipart(form)).await
    }

    async fn analysis_status(&self, analysis_id: &str) -> ReputationResult<ServiceResponse> {
        if !is_valid_analysis_id(analysis_id) {
            return Err(ReputationError::InvalidAnalysisId(analysis_id.to_string()));
        }
        let url = format!("{}/analyses/{}", self.base_url, analysis_id);
        self.send(self.http_client.get(&url)).await
    }
}
