use crate::{
    error::{ModelLoadError, PredictionError},
    model_service::ModelService,
    postprocessing::{format_confidence, softmax, top_class},
    preprocessing::transform_image,
    state::LabelSet,
};
use axum::body::Bytes;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_id: usize,
    pub label: String,
    pub probability: f32,
}

impl Prediction {
    pub fn confidence(&self) -> String {
        format_confidence(self.probability)
    }
}

/// Decode, preprocess, forward pass and top-1 selection for one uploaded image.
pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
    labels: Arc<LabelSet>,
}

impl<M: ModelService> Clone for InferenceService<M> {
    fn clone(&self) -> Self {
        Self {
            model_service: self.model_service.clone(),
            labels: self.labels.clone(),
        }
    }
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(model_service: M, labels: LabelSet) -> Result<Self, ModelLoadError> {
        if labels.len() != model_service.num_classes() {
            return Err(ModelLoadError::LabelMismatch {
                labels: labels.len(),
                classes: model_service.num_classes(),
            });
        }

        Ok(Self {
            model_service: Arc::new(model_service),
            labels: Arc::new(labels),
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    #[instrument(skip(self, image_data), fields(bytes = image_data.len()))]
    pub async fn predict(&self, image_data: Bytes) -> Result<Prediction, PredictionError> {
        let model_service = self.model_service.clone();
        let logits = tokio::task::spawn_blocking(move || {
            let input = transform_image(&image_data)?;
            model_service.infer(&input)
        })
        .await??;

        if logits.len() != self.labels.len() {
            return Err(PredictionError::OutputShape {
                expected: self.labels.len(),
                actual: logits.len(),
            });
        }

        let probabilities = softmax(&logits)?;
        let top = top_class(&probabilities).ok_or(PredictionError::OutputShape {
            expected: self.labels.len(),
            actual: 0,
        })?;
        let label = self
            .labels
            .get(top.class_id)
            .ok_or(PredictionError::OutputShape {
                expected: self.labels.len(),
                actual: probabilities.len(),
            })?
            .to_string();

        tracing::debug!(
            "Predicted class_id={}, label={}, confidence={:.3}",
            top.class_id,
            label,
            top.probability
        );

        Ok(Prediction {
            class_id: top.class_id,
            label,
            probability: top.probability,
        })
    }
}
