#![forbid(unsafe_code)]

use crate::processor::types::{BatchRequest, BatchResponse, ProcessRequest};
use crate::processor::ProcessingResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend answered {0}")]
    Status(reqwest::StatusCode),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("batch processing requires a backend connection")]
    NotConnected,

    #[error("processing backend is disabled")]
    Disabled,
}

/// The external plate-processing microservice.
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    /// `GET /health`. Any non-2xx answer is an error.
    async fn health(&self) -> Result<serde_json::Value, ProcessorError>;

    /// `POST /process-image` with a base64 encoded image.
    async fn process_image(&self, image: &str) -> Result<ProcessingResult, ProcessorError>;

    /// `POST /batch-process`.
    async fn batch_process(&self, images: &[String]) -> Result<Vec<ProcessingResult>, ProcessorError>;
}

/// JSON over HTTP client of the processing service.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &config::Processor) -> Result<Self, ProcessorError> {
        let client = reqwest::Client::builder()
            .timeout(config.batch_timeout.max(config.process_timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ProcessorError>
    where
        B: serde::Serialize + Sync + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        debug!(path, %status, "processing backend answered");
        if !status.is_success() {
            return Err(ProcessorError::Status(status));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProcessingBackend for HttpBackend {
    async fn health(&self) -> Result<serde_json::Value, ProcessorError> {
        let response = self.client.get(self.url("health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProcessorError::Status(status));
        }
        Ok(response.json().await?)
    }

    async fn process_image(&self, image: &str) -> Result<ProcessingResult, ProcessorError> {
        self.post("process-image", &ProcessRequest { image }).await
    }

    async fn batch_process(&self, images: &[String]) -> Result<Vec<ProcessingResult>, ProcessorError> {
        let response: BatchResponse = self.post("batch-process", &BatchRequest { images }).await?;
        Ok(response.results)
    }
}
