use async_trait::async_trait;
use webwarden_core::ChunkPrediction;

use crate::InferenceError;

/// One model call on one chunk.
///
/// Implementations must be deterministic for a fixed model, must not mutate
/// state shared with other requests, and must return an error rather than a
/// fallback prediction when the model cannot answer.
#[async_trait]
pub trait InferencePort: Send + Sync {
    async fn predict_chunk(&self, chunk: &str) -> Result<ChunkPrediction, InferenceError>;
}

/// Reject predictions whose confidence is not a probability.
pub fn check_prediction(prediction: ChunkPrediction) -> Result<ChunkPrediction, InferenceError> {
    if (0.0..=1.0).contains(&prediction.confidence) {
        Ok(prediction)
    } else {
        Err(InferenceError::InvalidConfidence(prediction.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_probabilities() {
        assert!(check_prediction(ChunkPrediction::new(0, 0.0)).is_ok());
        assert!(check_prediction(ChunkPrediction::new(0, 1.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(check_prediction(ChunkPrediction::new(0, 1.01)).is_err());
        assert!(check_prediction(ChunkPrediction::new(0, -0.1)).is_err());
        assert!(check_prediction(ChunkPrediction::new(0, f64::NAN)).is_err());
    }
}
