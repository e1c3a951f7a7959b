//! HTTP client for a model server exposing `POST /predict`.
//!
//! Request body: `{"text": "<chunk>"}`.
//! Response body: `{"label_index": 3, "confidence": 0.91}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use webwarden_core::ChunkPrediction;

use crate::{InferenceError, InferencePort};

/// Inference port backed by a remote model server.
pub struct RemoteClassifier {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    label_index: usize,
    confidence: f64,
}

impl RemoteClassifier {
    /// Create a client for the given server base URL.
    ///
    /// `base_url` should be like `http://localhost:9000` (a trailing slash is
    /// dropped). `timeout` bounds each request end to end.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl InferencePort for RemoteClassifier {
    async fn predict_chunk(&self, chunk: &str) -> Result<ChunkPrediction, InferenceError> {
        let url = format!("{}/predict", self.base_url);
        debug!(url = %url, bytes = chunk.len(), "requesting chunk prediction");

        let resp = self
            .client
            .post(&url)
            .json(&PredictRequest { text: chunk })
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Unavailable(e.to_string())
                } else {
                    InferenceError::Http(e)
                }
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        parse_prediction(&body)
    }
}

fn parse_prediction(body: &str) -> Result<ChunkPrediction, InferenceError> {
    let parsed: PredictResponse = serde_json::from_str(body).map_err(InferenceError::backend)?;
    Ok(ChunkPrediction::new(parsed.label_index, parsed.confidence))
}
