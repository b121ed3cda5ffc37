use crate::embeddings::{ensure_dimension, normalize, Embedder};
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array, Axis, Dimension, Ix2, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Input, Session, SessionInputs};
use ort::tensor::TensorElementType;
use ort::value::{DynTensor, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

/// Local sentence-embedding model exported to ONNX (e.g. all-MiniLM-L6-v2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OnnxConfig {
    pub id: String,
    pub model_dir: PathBuf,
    pub model_file: String,
    pub tokenizer_file: String,
    pub dimension: usize,
    pub max_length: usize,
    pub max_batch: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            id: "all-minilm-l6-v2".to_string(),
            model_dir: PathBuf::from("models/all-minilm-l6-v2"),
            model_file: "model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            dimension: 384,
            max_length: 256,
            max_batch: 32,
        }
    }
}

struct OrtBackend {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
    max_batch: usize,
    dimension: usize,
}

pub struct OnnxEmbedder {
    id: String,
    dimension: usize,
    backend: Arc<OrtBackend>,
}

impl OnnxEmbedder {
    pub fn new(config: &OnnxConfig) -> Result<Self> {
        let backend = OrtBackend::new(config)?;
        Ok(Self {
            id: config.id.clone(),
            dimension: config.dimension,
            backend: Arc::new(backend),
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let owned = texts.to_vec();
        let backend = self.backend.clone();
        spawn_blocking(move || backend.embed_batch_blocking(&owned))
            .await
            .map_err(|e| VectorStoreError::EmbeddingError(format!("Join error: {e}")))?
    }
}

impl OrtBackend {
    fn new(config: &OnnxConfig) -> Result<Self> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let model_path = config.model_dir.join(&config.model_file);
        let tokenizer_path = config.model_dir.join(&config.tokenizer_file);
        if !model_path.exists() || !tokenizer_path.exists() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Model files for '{}' are missing. Expected ONNX at {} and tokenizer at {} (set ACTIONPLAN_MODEL_DIR or use the stub backend).",
                config.id,
                model_path.display(),
                tokenizer_path.display(),
            )));
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Tokenizer truncation failed: {e}"))
            })?;

        let session = Session::builder()
            .map_err(|e| VectorStoreError::EmbeddingError(format!("{e}")))?
            .with_intra_threads(default_intra_threads())
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to set ORT intra threads: {e}"))
            })?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!(
                    "Failed to register CPU execution provider: {e}"
                ))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to set optimization level: {e}"))
            })?
            .commit_from_file(&model_path)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to load ONNX model: {e}"))
            })?;

        log::info!(
            "Loaded ONNX model '{}' (dim {}, max_length {}, batch {})",
            config.id,
            config.dimension,
            config.max_length,
            config.max_batch
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_length: config.max_length,
            max_batch: config.max_batch.max(1),
            dimension: config.dimension,
        })
    }

    fn embed_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch) {
            let encodings = self
                .tokenizer
                .encode_batch(batch.to_vec(), true)
                .map_err(|e| {
                    VectorStoreError::EmbeddingError(format!("Tokenization failed: {e}"))
                })?;

            if encodings.is_empty() {
                continue;
            }

            let seq_len = padded_length(encodings.iter().map(Encoding::len), self.max_length)?;
            let (ids, masks, type_ids, mask_rows) = build_flat_tensors(&encodings, seq_len);

            let ids_array = Array::from_shape_vec((batch.len(), seq_len), ids)
                .map_err(|e| VectorStoreError::EmbeddingError(format!("IDs shape error: {e}")))?;
            let mask_array = Array::from_shape_vec((batch.len(), seq_len), masks)
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Mask shape error: {e}")))?;
            let type_array = Array::from_shape_vec((batch.len(), seq_len), type_ids)
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Types shape error: {e}")))?;
            let ids_shape = ids_array.raw_dim().into_dyn();

            let mut available: HashMap<String, DynTensor> = HashMap::new();
            available.insert("input_ids".to_string(), to_tensor(ids_array.into_dyn())?);
            available.insert("attention_mask".to_string(), to_tensor(mask_array.into_dyn())?);
            available.insert("token_type_ids".to_string(), to_tensor(type_array.into_dyn())?);

            let array = {
                let mut session = self.session.lock().map_err(|_| {
                    VectorStoreError::EmbeddingError("Failed to lock ONNX session".into())
                })?;

                let mut feed: HashMap<String, DynTensor> = HashMap::new();
                for input in &session.inputs {
                    let key = input.name.clone();
                    match available.remove(&key) {
                        Some(value) => {
                            feed.insert(key, value);
                        }
                        None => {
                            let zeros = zero_tensor(&ids_shape, input)?;
                            feed.insert(key, zeros);
                        }
                    }
                }

                let outputs = session.run(SessionInputs::from(feed)).map_err(|e| {
                    VectorStoreError::EmbeddingError(format!("ONNX forward failed: {e}"))
                })?;
                if outputs.len() == 0 {
                    return Err(VectorStoreError::EmbeddingError(
                        "ONNX returned no outputs".to_string(),
                    ));
                }

                let array = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| {
                        VectorStoreError::EmbeddingError(format!(
                            "Failed to decode ONNX output: {e}"
                        ))
                    })?
                    .to_owned();

                drop(outputs);
                drop(session);
                array
            };
            results.extend(embeddings_from_output(array, &mask_rows, self.dimension)?);
        }

        Ok(results)
    }
}

fn default_intra_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if cpus <= 4 {
        1
    } else {
        2
    }
}

/// Common length of a padded batch, bounded by `max_length`.
fn padded_length(lengths: impl IntoIterator<Item = usize>, max_length: usize) -> Result<usize> {
    let mut lengths = lengths.into_iter();
    let seq_len = lengths.next().unwrap_or(0);
    if seq_len > max_length {
        return Err(VectorStoreError::EmbeddingError(format!(
            "Tokenized length {seq_len} exceeds max_length {max_length}"
        )));
    }
    if lengths.any(|len| len != seq_len) {
        return Err(VectorStoreError::EmbeddingError(
            "Inconsistent sequence lengths after padding".to_string(),
        ));
    }
    Ok(seq_len)
}

fn to_tensor(array: ndarray::ArrayD<i64>) -> Result<DynTensor> {
    Ok(Tensor::from_array(array)
        .map_err(|e| VectorStoreError::EmbeddingError(format!("{e}")))?
        .upcast())
}

fn build_flat_tensors(
    encodings: &[Encoding],
    seq_len: usize,
) -> (Vec<i64>, Vec<i64>, Vec<i64>, Vec<Vec<i64>>) {
    let mut ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut masks = Vec::with_capacity(encodings.len() * seq_len);
    let mut type_ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut mask_rows = Vec::with_capacity(encodings.len());

    for encoding in encodings {
        let encoding_ids = encoding.get_ids();
        let encoding_masks = encoding.get_attention_mask();
        let encoding_types = encoding.get_type_ids();

        for idx in 0..seq_len {
            ids.push(i64::from(*encoding_ids.get(idx).unwrap_or(&0)));
            masks.push(i64::from(*encoding_masks.get(idx).unwrap_or(&0)));
            type_ids.push(i64::from(*encoding_types.get(idx).unwrap_or(&0)));
        }

        mask_rows.push(
            encoding_masks
                .iter()
                .take(seq_len)
                .map(|v| i64::from(*v))
                .collect(),
        );
    }

    (ids, masks, type_ids, mask_rows)
}

fn embeddings_from_output(
    array: ndarray::ArrayD<f32>,
    mask_rows: &[Vec<i64>],
    expected_dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::new();
    match array.ndim() {
        // Already pooled: [batch, hidden]
        2 => {
            let embeddings = array
                .into_dimensionality::<Ix2>()
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Bad output shape: {e}")))?;
            for row in embeddings.outer_iter() {
                let mut emb = row.to_vec();
                ensure_dimension(&emb, expected_dimension)?;
                normalize(&mut emb);
                out.push(emb);
            }
        }
        // Token states: [batch, seq, hidden]
        3 => {
            let hidden = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Bad output shape: {e}")))?;
            for (idx, sample) in hidden.outer_iter().enumerate() {
                let ones = vec![1; sample.len_of(Axis(0))];
                let attn = mask_rows.get(idx).unwrap_or(&ones);
                let mut emb = mean_pool(sample.view(), attn);
                ensure_dimension(&emb, expected_dimension)?;
                normalize(&mut emb);
                out.push(emb);
            }
        }
        _ => {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Unexpected ONNX output dims: {:?}",
                array.shape()
            )));
        }
    }
    Ok(out)
}

fn mean_pool(sample: ndarray::ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    if sample.is_empty() {
        return vec![];
    }

    let hidden = sample.len_of(Axis(1));
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;

    for (token_idx, token) in sample.outer_iter().enumerate() {
        if *mask.get(token_idx).unwrap_or(&0) == 0 {
            continue;
        }
        count += 1.0;
        for (dim, value) in token.iter().enumerate() {
            sum[dim] += value;
        }
    }

    if count > 0.0 {
        for value in &mut sum {
            *value /= count;
        }
    }
    sum
}

fn zero_tensor(shape: &ndarray::IxDyn, input: &Input) -> Result<DynTensor> {
    let unsupported = |detail: String| {
        VectorStoreError::EmbeddingError(format!(
            "Unsupported ONNX input '{}': {detail}",
            input.name
        ))
    };
    match &input.input_type {
        ort::value::ValueType::Tensor { ty, .. } => match ty {
            TensorElementType::Int64 => to_tensor(ndarray::Array::<i64, _>::zeros(shape.clone())),
            TensorElementType::Float32 => {
                Ok(Tensor::from_array(ndarray::Array::<f32, _>::zeros(shape.clone()))
                    .map_err(|e| unsupported(e.to_string()))?
                    .upcast())
            }
            other => Err(unsupported(format!(
                "cannot synthesize zeros for {other:?}"
            ))),
        },
        other => Err(unsupported(format!("{other:?}"))),
    }
}
