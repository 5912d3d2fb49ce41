// Remote image classifier client
//
// The classifier is a plain HTTP inference endpoint: one multipart POST per
// frame carrying the image bytes and the candidate labels as a JSON array,
// answered with one probability per label in the same order.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Body returned by the classifier endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub probabilities: Vec<f32>,
}

/// HTTP client for the remote image classifier.
pub struct ClassifierClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Option<Duration>,
}

impl ClassifierClient {
    /// Create a classifier client from a `TransportConfig`.
    ///
    /// `endpoint` is the full prediction URL, e.g.
    /// `http://inference.local:8080/v1/classify`.
    pub fn new(endpoint: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            endpoint,
            timeout: Some(transport.timeout),
        })
    }

    /// Create a classifier client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            timeout: None,
        }
    }

    /// The prediction endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Request deadline, when the client was built from a `TransportConfig`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Score one image against `labels`.
    ///
    /// Returns the raw probability vector. Length checking against `labels`
    /// is left to the caller, which owns the label set.
    pub async fn predict(
        &self,
        filename: &str,
        image: Bytes,
        labels: &[String],
    ) -> Result<Vec<f32>, Error> {
        debug!(endpoint = %self.endpoint, filename, bytes = image.len(), "POST classify");

        let labels_json = serde_json::to_string(labels).map_err(|e| Error::Deserialization {
            message: format!("failed to encode labels: {e}"),
            body: String::new(),
        })?;

        let form = Form::new()
            .part(
                "image",
                Part::bytes(image.to_vec())
                    .file_name(filename.to_owned())
                    .mime_str("application/octet-stream")?,
            )
            .text("labels", labels_json);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Classifier {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: PredictionResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;
        Ok(parsed.probabilities)
    }
}
