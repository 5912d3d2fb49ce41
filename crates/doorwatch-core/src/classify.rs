// ── Image classification stage ──
//
// Sends an armed frame to the classifier with the configured label set
// and keeps the best-scoring label. The classifier is acquired once at
// startup and released at shutdown; a failed call drops its frame and
// the stage carries on.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::{debug, error};

use doorwatch_api::ClassifierClient;

use crate::error::CoreError;
use crate::model::{CameraFrame, ClassificationResult};

/// A remote or local image classifier.
///
/// Returns one probability per label, in label order.
pub trait Classifier: Send + Sync {
    fn predict<'a>(
        &'a self,
        frame: &'a CameraFrame,
        labels: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<f32>, CoreError>>;

    /// Release held resources. Called once at pipeline shutdown.
    fn close(&self) {}
}

/// `Classifier` backed by the HTTP inference endpoint.
pub struct HttpClassifier {
    client: ClassifierClient,
}

impl HttpClassifier {
    pub fn new(client: ClassifierClient) -> Self {
        Self { client }
    }

    // A client-side deadline is reported with the deadline that fired.
    fn error_from(&self, err: doorwatch_api::Error) -> CoreError {
        match self.client.timeout() {
            Some(timeout) if err.is_timeout() => CoreError::ClassifierTimeout { timeout },
            _ => CoreError::from(err),
        }
    }
}

impl Classifier for HttpClassifier {
    fn predict<'a>(
        &'a self,
        frame: &'a CameraFrame,
        labels: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<f32>, CoreError>> {
        Box::pin(async move {
            self.client
                .predict(&frame.key, frame.image.clone(), labels)
                .await
                .map_err(|e| self.error_from(e))
        })
    }

    fn close(&self) {
        debug!(endpoint = %self.client.endpoint(), "releasing classifier client");
    }
}

/// Index and value of the highest finite probability. The earliest index
/// wins ties.
pub fn select_best(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &p) in probabilities.iter().enumerate() {
        if !p.is_finite() {
            continue;
        }
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((index, p)),
        }
    }
    best
}

pub struct ClassificationStage {
    classifier: Arc<dyn Classifier>,
    labels: Vec<String>,
    timeout: Option<Duration>,
}

impl ClassificationStage {
    pub fn new(classifier: Arc<dyn Classifier>, labels: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            classifier,
            labels,
            timeout,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub async fn classify(&self, frame: &CameraFrame) -> Result<ClassificationResult, CoreError> {
        let call = self.classifier.predict(frame, &self.labels);
        let probabilities = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                CoreError::ClassifierTimeout { timeout: limit }
            })??,
            None => call.await?,
        };

        if probabilities.len() != self.labels.len() {
            return Err(CoreError::LabelMismatch {
                expected: self.labels.len(),
                got: probabilities.len(),
            });
        }

        let (label_index, probability) =
            select_best(&probabilities).ok_or_else(|| CoreError::Classifier {
                message: "no finite probability in response".into(),
            })?;
        let label = self
            .labels
            .get(label_index)
            .cloned()
            .ok_or_else(|| CoreError::Internal(format!("label index {label_index} out of range")))?;

        debug!(frame = %frame.key, %label, probability, "classified frame");
        Ok(ClassificationResult {
            frame_key: frame.key.clone(),
            label,
            label_index,
            probability,
        })
    }

    /// `classify`, logging and swallowing any failure.
    pub async fn classify_or_drop(&self, frame: &CameraFrame) -> Option<ClassificationResult> {
        match self.classify(frame).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(frame = %frame.key, error = %e, "classification failed, dropping frame");
                None
            }
        }
    }

    pub fn close(&self) {
        self.classifier.close();
    }
}
