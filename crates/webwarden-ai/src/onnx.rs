//! ONNX Runtime sequence classifier (DistilBERT-style fine-tunes).
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`, plus
//! either `labels.json` or a Hugging Face `config.json` with `id2label`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tokenizers::Tokenizer;
use tokio::sync::oneshot;
use tracing::{debug, info};
use webwarden_core::ChunkPrediction;

use crate::{InferenceError, InferencePort, LabelSpace, TokenCounter};

/// Fixed input window of the classifier, in tokens.
const MAX_SEQ_LEN: usize = 512;

/// In-process text classifier backed by ONNX Runtime.
///
/// Holds one session behind a mutex; each chunk runs on the blocking pool.
/// A forward pass that has started runs to completion even if the caller
/// times out, and keeps the session locked until it does. Chunks still
/// queued for the session when their caller gives up are skipped.
/// Also serves as the [`TokenCounter`] for chunking, using the same vocabulary.
pub struct OnnxClassifier {
    model: Arc<Mutex<Model>>,
    /// Untruncated tokenizer used only for word costs.
    counter: Tokenizer,
    labels: LabelSpace,
}

struct Model {
    session: Session,
    tokenizer: Tokenizer,
    /// BERT exports take `token_type_ids`; DistilBERT exports do not.
    token_types: bool,
}

impl OnnxClassifier {
    /// Load a classifier from a model directory.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let labels = ["labels.json", "config.json"]
            .iter()
            .map(|name| model_dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| {
                anyhow::anyhow!("labels.json or config.json not found in {model_dir:?}")
            })
            .and_then(|path| LabelSpace::from_file(&path))?;

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let token_types = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let counter = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        let mut tokenizer = counter.clone();
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        info!(
            labels = labels.len(),
            token_types,
            model = %model_path.display(),
            "loaded classification model"
        );
        Ok(Self {
            model: Arc::new(Mutex::new(Model {
                session,
                tokenizer,
                token_types,
            })),
            counter,
            labels,
        })
    }

    /// Category names in model output order.
    pub fn labels(&self) -> &LabelSpace {
        &self.labels
    }
}

impl Model {
    fn predict(&mut self, text: &str) -> Result<ChunkPrediction, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Backend(format!("tokenize: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let shape = [1i64, input_ids.len() as i64];

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))
            .map_err(InferenceError::backend)?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))
            .map_err(InferenceError::backend)?;

        let outputs = if self.token_types {
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))
                .map_err(InferenceError::backend)?;
            self.session
                .run(ort::inputs![
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor,
                    "token_type_ids" => type_tensor,
                ])
                .map_err(InferenceError::backend)?
        } else {
            self.session
                .run(ort::inputs![
                    "input_ids" => ids_tensor,
                    "attention_mask" => mask_tensor,
                ])
                .map_err(InferenceError::backend)?
        };

        // Logits: [1, num_labels].
        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(InferenceError::backend)?;
        softmax_argmax(logits)
    }
}

/// Index and probability of the most likely class. Ties go to the lowest index.
fn softmax_argmax(logits: &[f32]) -> Result<ChunkPrediction, InferenceError> {
    if logits.is_empty() {
        return Err(InferenceError::Backend("model returned no logits".into()));
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&l| f64::from(l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    let mut best = 0;
    for (i, &e) in exps.iter().enumerate() {
        if e > exps[best] {
            best = i;
        }
    }
    Ok(ChunkPrediction::new(best, exps[best] / sum))
}

#[async_trait]
impl InferencePort for OnnxClassifier {
    async fn predict_chunk(&self, chunk: &str) -> Result<ChunkPrediction, InferenceError> {
        let chunk = chunk.to_owned();
        run_locked(Arc::clone(&self.model), move |model| model.predict(&chunk)).await
    }
}

/// Run `f` on the blocking pool once `resource` is free.
///
/// If the returned future is dropped before the lock is acquired, `f` never runs.
async fn run_locked<M, T, F>(resource: Arc<Mutex<M>>, f: F) -> Result<T, InferenceError>
where
    M: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut M) -> Result<T, InferenceError> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let mut guard = resource.lock();
        if tx.is_closed() {
            debug!("caller stopped waiting, chunk skipped");
            return;
        }
        let _ = tx.send(f(&mut guard));
    });
    rx.await
        .map_err(|_| InferenceError::Unavailable("inference task ended without a result".into()))?
}

impl TokenCounter for OnnxClassifier {
    fn count(&self, word: &str) -> usize {
        // A word the tokenizer rejects still costs something.
        self.counter
            .encode(word, false)
            .map_or(1, |encoding| encoding.get_ids().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("website-classifier")
    }

    #[test]
    fn softmax_picks_largest_logit() {
        let p = softmax_argmax(&[0.1, 2.0, -1.0]).unwrap();
        assert_eq!(p.label_index, 1);
        assert!(p.confidence > 0.7 && p.confidence < 1.0);
    }

    #[test]
    fn softmax_tie_lowest_index() {
        let p = softmax_argmax(&[1.0, 1.0]).unwrap();
        assert_eq!(p.label_index, 0);
        assert!((p.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn softmax_empty_errors() {
        assert!(softmax_argmax(&[]).is_err());
    }

    #[tokio::test]
    async fn locked_call_returns_result() {
        let resource = Arc::new(Mutex::new(0usize));
        let runs = run_locked(Arc::clone(&resource), |runs| {
            *runs += 1;
            Ok(*runs)
        })
        .await
        .unwrap();
        assert_eq!(runs, 1);
    }

    #[tokio::test]
    async fn abandoned_call_skips_queued_work() {
        let resource = Arc::new(Mutex::new(0usize));
        let guard = resource.lock();
        let call = run_locked(Arc::clone(&resource), |runs| {
            *runs += 1;
            Ok(())
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(20), call)
                .await
                .is_err()
        );
        drop(guard);

        // Give the blocking task time to take the lock and see the caller is gone.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*resource.lock(), 0);
    }

    #[test]
    fn load_missing_dir_errors() {
        assert!(OnnxClassifier::load(Path::new("/nonexistent/model")).is_err());
    }

    #[tokio::test]
    #[ignore = "requires models/website-classifier"]
    async fn classify_chunk() {
        let classifier = OnnxClassifier::load(&model_dir()).unwrap();
        let p = classifier
            .predict_chunk("Learn algebra with free lessons and practice exercises")
            .await
            .unwrap();
        assert!(p.label_index < classifier.labels().len());
        assert!((0.0..=1.0).contains(&p.confidence));
    }

    #[test]
    #[ignore = "requires models/website-classifier"]
    fn counts_subword_tokens() {
        let classifier = OnnxClassifier::load(&model_dir()).unwrap();
        assert_eq!(classifier.count("the"), 1);
        assert!(classifier.count("internationalization") >= 1);
    }
}
