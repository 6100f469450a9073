//! REST client for the notation service.
//!
//! Endpoints:
//! - `GET   /api/n4l/export?case_id=`   canonical text (plain text)
//! - `POST  /api/n4l/sync?case_id=`     persist canonical text
//! - `POST  /api/n4l/parse`             text to snapshot
//! - `POST  /api/n4l/generate?type=`    record to fragment
//! - `PATCH /api/n4l/patch?case_id=`    apply a patch
//! - `POST  /api/n4l/validate`          structural check

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use sleuth_core::{CaseSnapshot, Patch, ServiceError};

use crate::config::BackendConfig;
use crate::services::{
    CaseTextStore, FragmentGenerator, FragmentRequest, NotationParser, NotationValidator, PatchApplier, PatchOutcome,
    ValidationReport,
};

/// Client for every notation service endpoint.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FragmentResponse {
    n4l_fragment: String,
}

#[derive(Debug, Deserialize)]
struct PatchResponse {
    success: bool,
    #[serde(default)]
    n4l_content: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    parsed_data: Option<CaseSnapshot>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::Other(format!("Failed to build HTTP client: {}", e)))?;

        debug!(base_url = %config.base_url, "HttpBackend initialized");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and fail on transport errors or non-2xx status.
    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::transport(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(endpoint, status, &body));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T, ServiceError> {
        self.send(endpoint, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServiceError::decode(endpoint, e))
    }
}

/// The service answers errors with a plain-text body; keep it as the message.
fn status_error(endpoint: &str, status: StatusCode, body: &str) -> ServiceError {
    let body = body.trim();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("no response body")
    } else {
        body
    };
    ServiceError::status(endpoint, status.as_u16(), message)
}

#[async_trait]
impl CaseTextStore for HttpBackend {
    async fn load_text(&self, case_id: &str) -> Result<String, ServiceError> {
        let endpoint = "/api/n4l/export";
        let request = self.client.get(self.url(endpoint)).query(&[("case_id", case_id)]);
        self.send(endpoint, request)
            .await?
            .text()
            .await
            .map_err(|e| ServiceError::decode(endpoint, e))
    }

    async fn persist_text(&self, case_id: &str, text: &str) -> Result<(), ServiceError> {
        let endpoint = "/api/n4l/sync";
        let request = self
            .client
            .post(self.url(endpoint))
            .query(&[("case_id", case_id)])
            .json(&json!({ "n4l_content": text }));
        self.send(endpoint, request).await?;
        Ok(())
    }
}

#[async_trait]
impl NotationParser for HttpBackend {
    async fn parse(&self, case_id: &str, text: &str) -> Result<CaseSnapshot, ServiceError> {
        let endpoint = "/api/n4l/parse";
        let request = self
            .client
            .post(self.url(endpoint))
            .json(&json!({ "content": text, "case_id": case_id }));
        self.send_json(endpoint, request).await
    }
}

#[async_trait]
impl FragmentGenerator for HttpBackend {
    async fn generate(&self, request: FragmentRequest<'_>) -> Result<String, ServiceError> {
        let endpoint = "/api/n4l/generate";
        let body = match request {
            FragmentRequest::Entity(e) => json!(e),
            FragmentRequest::Evidence(e) => json!(e),
            FragmentRequest::Timeline(e) => json!(e),
            FragmentRequest::Hypothesis(h) => json!(h),
            FragmentRequest::Relation { relation, entity_names } => {
                json!({ "relation": relation, "entity_names": entity_names })
            }
        };

        let http = self
            .client
            .post(self.url(endpoint))
            .query(&[("type", request.kind())])
            .json(&body);
        let response: FragmentResponse = self.send_json(endpoint, http).await?;
        Ok(response.n4l_fragment)
    }
}

#[async_trait]
impl PatchApplier for HttpBackend {
    async fn apply(&self, case_id: &str, patch: &Patch) -> Result<PatchOutcome, ServiceError> {
        let endpoint = "/api/n4l/patch";
        let request = self
            .client
            .patch(self.url(endpoint))
            .query(&[("case_id", case_id)])
            .json(patch);
        let response: PatchResponse = self.send_json(endpoint, request).await?;

        if !response.success {
            let message = if response.message.is_empty() {
                "Patch rejected".to_string()
            } else {
                response.message
            };
            return Ok(PatchOutcome::Rejected { message });
        }

        match response.parsed_data {
            Some(snapshot) => Ok(PatchOutcome::Applied {
                canonical_text: response.n4l_content,
                snapshot,
            }),
            None => Err(ServiceError::decode(endpoint, "successful patch without parsed_data")),
        }
    }
}

#[async_trait]
impl NotationValidator for HttpBackend {
    async fn validate(&self, text: &str) -> Result<ValidationReport, ServiceError> {
        let endpoint = "/api/n4l/validate";
        let request = self.client.post(self.url(endpoint)).json(&json!({ "content": text }));
        self.send_json(endpoint, request).await
    }
}
