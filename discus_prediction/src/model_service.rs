use crate::error::PredictionError;
use ndarray::{Array, Ix4};

/// A loaded, read-only classifier shared by every request.
///
/// `infer` is blocking and is called from `spawn_blocking`, never on the reactor.
pub trait ModelService: Send + Sync + 'static {
    /// Width of the classifier head.
    fn num_classes(&self) -> usize;

    /// Runs one forward pass and returns the raw logits of the single image in the batch.
    fn infer(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, PredictionError>;
}
