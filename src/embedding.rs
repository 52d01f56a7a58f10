//! Text embedding capability.
//!
//! The engine only depends on the [`Embedder`] trait. [`OnnxEmbedder`] is the
//! bundled provider: a local sentence-transformer run through ONNX Runtime
//! with mean pooling and L2 normalization.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use hf_hub::api::sync::ApiBuilder;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::errors::Error;

/// Default local embedding model.
pub const DEFAULT_MODEL: &str = "BAAI/bge-small-en-v1.5";

/// Known model output dimensions. Informational only; vectors are never
/// validated against this table.
const KNOWN_DIMENSIONS: &[(&str, usize)] = &[
    ("BAAI/bge-small-en-v1.5", 384),
    ("BAAI/bge-base-en-v1.5", 768),
    ("sentence-transformers/all-MiniLM-L6-v2", 384),
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
];

/// Look up the output dimension of a known embedding model.
pub fn known_dimension(model: &str) -> Option<usize> {
    KNOWN_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

/// Normalize text before embedding: newlines become spaces, ends are trimmed.
///
/// # Errors
///
/// Returns `Error::Validation` if nothing is left after trimming.
pub fn prepare_text(text: &str) -> Result<String, Error> {
    let cleaned = text.replace(['\r', '\n'], " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(Error::invalid(vec!["text"]));
    }
    Ok(cleaned.to_string())
}

/// Something that turns text into vectors.
///
/// Implementations must be shareable across threads; the engine may call
/// them concurrently from several callers.
pub trait Embedder: Send + Sync {
    /// Name of the model producing the vectors, stored with every embedding.
    fn model(&self) -> &str;

    /// Load whatever the first embed call would otherwise load.
    ///
    /// The engine calls this before starting the embedding timeout, so a
    /// slow one-time setup such as a model download is not cut short.
    fn prepare(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// Embed several texts, one vector per input in the same order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, Error> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// ONNX embedding engine for synchronous text-to-vector conversion.
pub struct OnnxEmbedder {
    model_id: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    requires_token_type_ids: bool,
    hidden_dim: usize,
}

impl OnnxEmbedder {
    /// Load model from cache or download on first use.
    ///
    /// Uses the blocking `hf_hub` client; files are cached under `cache_dir`
    /// (or the hub's default cache) and only downloaded once.
    pub fn new(model_id: &str, cache_dir: Option<&Path>) -> Result<Self, Error> {
        let mut builder = ApiBuilder::new();
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir.to_path_buf());
        }
        let api = builder.build()?;
        let repo = api.model(model_id.to_string());

        let model_path = repo
            .get("onnx/model.onnx")
            .or_else(|_| repo.get("model.onnx"))?;
        let tokenizer_path = repo.get("tokenizer.json")?;
        info!(model = model_id, path = %model_path.display(), "loading embedding model");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)?;
        tokenizer
            .with_padding(None)
            .with_truncation(Some(TruncationParams {
                max_length: 512,
                ..Default::default()
            }))?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(ort::Error::from)?
            .commit_from_file(&model_path)?;

        let requires_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        Ok(OnnxEmbedder {
            model_id: model_id.to_string(),
            session: Mutex::new(session),
            tokenizer,
            requires_token_type_ids,
            hidden_dim: known_dimension(model_id).unwrap_or(0),
        })
    }

    fn run(&self, text: &str) -> Result<Vec<f32>, Error> {
        let encoding = self.tokenizer.encode(text, true)?;
        let input_ids = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();
        let seq_len = input_ids.len();

        let input_ids_vec: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
        let attention_mask_vec: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();

        let input_ids_tensor = Tensor::from_array(([1usize, seq_len], input_ids_vec))?;
        let attention_mask_tensor = Tensor::from_array(([1usize, seq_len], attention_mask_vec))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| Error::Inference(format!("session lock poisoned: {e}")))?;

        let outputs = if self.requires_token_type_ids {
            let token_type_ids_tensor =
                Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))?;
            session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            ])?
        } else {
            session.run(inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor
            ])?
        };

        let (shape, data) = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .ok_or_else(|| {
                Error::Inference(
                    "Output tensor 'last_hidden_state' or 'token_embeddings' not found".to_string(),
                )
            })?
            .try_extract_tensor::<f32>()?;

        if shape.len() != 3 || shape[0] != 1 {
            return Err(Error::Inference(format!(
                "Expected output shape (1, seq_len, hidden), got {:?}",
                shape
            )));
        }
        let hidden_dim = shape[2] as usize;
        if self.hidden_dim != 0 && hidden_dim != self.hidden_dim {
            return Err(Error::Inference(format!(
                "Model {} produced {} dimensions, expected {}",
                self.model_id, hidden_dim, self.hidden_dim
            )));
        }

        Ok(l2_normalize(&mean_pool(data, attention_mask, hidden_dim)))
    }
}

impl Embedder for OnnxEmbedder {
    fn model(&self) -> &str {
        &self.model_id
    }

    /// Texts exceeding 512 tokens are truncated by the tokenizer.
    fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let text = prepare_text(text)?;
        let vector = self.run(&text)?;
        debug!(dims = vector.len(), "generated embedding");
        Ok(vector)
    }
}

/// [`OnnxEmbedder`] that loads its model on the first embed call.
///
/// Lets callers that may never embed (history, stats) skip the model load.
pub struct LazyOnnxEmbedder {
    model_id: String,
    cache_dir: Option<PathBuf>,
    inner: OnceLock<OnnxEmbedder>,
}

impl LazyOnnxEmbedder {
    pub fn new(model_id: &str, cache_dir: Option<&Path>) -> Self {
        LazyOnnxEmbedder {
            model_id: model_id.to_string(),
            cache_dir: cache_dir.map(Path::to_path_buf),
            inner: OnceLock::new(),
        }
    }

    fn loaded(&self) -> Result<&OnnxEmbedder, Error> {
        if let Some(embedder) = self.inner.get() {
            return Ok(embedder);
        }
        // Two racing callers may both load; the first stored wins.
        let embedder = OnnxEmbedder::new(&self.model_id, self.cache_dir.as_deref())?;
        Ok(self.inner.get_or_init(|| embedder))
    }
}

impl Embedder for LazyOnnxEmbedder {
    fn model(&self) -> &str {
        &self.model_id
    }

    fn prepare(&self) -> Result<(), Error> {
        self.loaded().map(|_| ())
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        self.loaded()?.embed(text)
    }
}

/// Average token vectors, counting only positions the attention mask keeps.
fn mean_pool(data: &[f32], attention_mask: &[u32], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    if hidden_dim == 0 {
        return pooled;
    }

    for (token_idx, chunk) in data.chunks(hidden_dim).enumerate() {
        let mask_value = attention_mask.get(token_idx).copied().unwrap_or(0) as f32;
        for (pooled_value, value) in pooled.iter_mut().zip(chunk) {
            *pooled_value += value * mask_value;
        }
    }

    let mask_sum: f32 = attention_mask
        .iter()
        .map(|&m| m as f32)
        .sum::<f32>()
        .max(1e-9);
    for value in pooled.iter_mut() {
        *value /= mask_sum;
    }
    pooled
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let norm = norm.max(1e-9);

    vec.iter().map(|&x| x / norm).collect()
}
