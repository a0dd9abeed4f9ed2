//! OCR backends for page images.
//!
//! - [`StubOcrBackend`]: deterministic placeholder text, used in development
//!   when no OCR endpoint is configured.
//! - [`HttpOcrBackend`]: posts the image to a remote OCR API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::document::RasterFormat;
use crate::models::OcrOutput;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A text recognizer for single page images.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Short provider name stored alongside the text.
    fn name(&self) -> &str;

    async fn recognize(&self, image: &[u8], format: RasterFormat) -> Result<OcrOutput, OcrError>;
}

/// Returns placeholder text without looking at the image.
#[derive(Debug, Clone, Default)]
pub struct StubOcrBackend;

#[async_trait]
impl OcrBackend for StubOcrBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn recognize(&self, image: &[u8], format: RasterFormat) -> Result<OcrOutput, OcrError> {
        Ok(OcrOutput {
            text: format!("[stub OCR: {} bytes of {}]", image.len(), format),
            confidence: None,
            provider: self.name().to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            meta: Some(serde_json::json!({ "stub": true })),
        })
    }
}

/// Response body expected from the OCR API.
#[derive(Debug, Deserialize)]
struct OcrApiResponse {
    text: String,
    confidence: Option<f64>,
    provider: Option<String>,
    version: Option<String>,
    meta: Option<serde_json::Value>,
}

/// Remote OCR service reached over HTTP.
///
/// The image is sent as the raw request body with its MIME type; the token,
/// when set, goes in a bearer `Authorization` header.
pub struct HttpOcrBackend {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpOcrBackend {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("timebrowser/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| OcrError::BackendNotAvailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl OcrBackend for HttpOcrBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn recognize(&self, image: &[u8], format: RasterFormat) -> Result<OcrOutput, OcrError> {
        let start = Instant::now();

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, format.mime_type())
            .body(image.to_vec());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::OcrFailed(format!(
                "OCR API returned {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: OcrApiResponse = response
            .json()
            .await
            .map_err(|e| OcrError::OcrFailed(format!("invalid OCR API response: {}", e)))?;

        tracing::debug!(
            "OCR API returned {} chars in {}ms",
            parsed.text.len(),
            start.elapsed().as_millis()
        );

        Ok(OcrOutput {
            text: parsed.text,
            confidence: parsed.confidence,
            provider: parsed.provider.unwrap_or_else(|| self.name().to_string()),
            version: parsed.version,
            meta: parsed.meta,
        })
    }
}
