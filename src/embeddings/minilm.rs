//! ONNX sentence-transformer embeddings (`all-MiniLM-L6-v2` / 384-dim,
//! or `all-mpnet-base-v2` / 768-dim). Mean-pools the last hidden state over
//! the attention mask and L2-normalizes, matching the reference model's
//! sentence-embedding head.

use super::EmbeddingModel;
use anyhow::{anyhow, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct MiniLmEmbeddings {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    dimension: usize,
    max_length: usize,
}

impl MiniLmEmbeddings {
    pub fn load(model_dir: &Path, dimension: usize) -> Result<Self> {
        let model_path = Self::find_model(model_dir)?;
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(anyhow!(
                "tokenizer not found at: {}",
                tokenizer_path.display()
            ));
        }

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {:?}", e))?;

        let model_bytes = std::fs::read(&model_path)?;
        let session = Session::builder()
            .map_err(|e| anyhow!("session builder: {:?}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("opt level: {:?}", e))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("failed to load embedding model: {:?}", e))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimension,
            max_length: 256,
        })
    }

    fn find_model(model_dir: &Path) -> Result<PathBuf> {
        for candidate in ["model_O4.onnx", "model.onnx"] {
            let path = model_dir.join(candidate);
            if path.exists() {
                return Ok(path);
            }
        }
        Err(anyhow!(
            "no embedding model found in: {}",
            model_dir.display()
        ))
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenization failed: {:?}", e))?;

        let len = encoding.get_ids().len().min(self.max_length);
        let ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&id| id as i64).collect();
        let mask: Vec<i64> = encoding.get_attention_mask()[..len]
            .iter()
            .map(|&m| m as i64)
            .collect();
        let type_ids: Vec<i64> = encoding.get_type_ids()[..len]
            .iter()
            .map(|&t| t as i64)
            .collect();

        let shape = vec![1, len];
        let input_ids = Value::from_array((shape.clone(), ids))
            .map_err(|e| anyhow!("input_ids: {:?}", e))?;
        let attention_mask = Value::from_array((shape.clone(), mask.clone()))
            .map_err(|e| anyhow!("attention_mask: {:?}", e))?;
        let token_type_ids = Value::from_array((shape, type_ids))
            .map_err(|e| anyhow!("token_type_ids: {:?}", e))?;

        let inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids,
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| anyhow!("embedding inference failed: {:?}", e))?;

        let output_name = outputs
            .iter()
            .next()
            .map(|(name, _)| name.to_string())
            .ok_or_else(|| anyhow!("embedding model produced no outputs"))?;
        let (shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("failed to extract hidden states: {:?}", e))?;

        // shape is [1, seq_len, hidden_dim]; mean-pool over seq_len weighted
        // by the attention mask, then L2-normalize.
        let hidden_dim = *shape.last().ok_or_else(|| anyhow!("empty output shape"))? as usize;
        let seq_len = len;
        let mut pooled = vec![0.0f32; hidden_dim];
        let mut mask_sum = 0.0f32;

        for t in 0..seq_len {
            let m = mask[t] as f32;
            if m == 0.0 {
                continue;
            }
            mask_sum += m;
            for d in 0..hidden_dim {
                pooled[d] += data[t * hidden_dim + d] * m;
            }
        }
        if mask_sum > 0.0 {
            for v in pooled.iter_mut() {
                *v /= mask_sum;
            }
        }

        let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in pooled.iter_mut() {
                *v /= norm;
            }
        }

        Ok(pooled)
    }

    /// Batch-tokenize and run one ONNX inference per batch of `MAX_BATCH`
    /// texts, mean-pooling and L2-normalizing each sample from the shared
    /// output tensor.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        const MAX_BATCH: usize = 16;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH) {
            let encodings: Vec<_> = chunk
                .iter()
                .map(|text| {
                    self.tokenizer
                        .encode(*text, true)
                        .map_err(|e| anyhow!("tokenization failed: {:?}", e))
                })
                .collect::<Result<Vec<_>>>()?;

            let max_len = encodings
                .iter()
                .map(|e| e.get_ids().len().min(self.max_length))
                .max()
                .unwrap_or(0);
            let batch_size = encodings.len();

            let mut ids_flat = Vec::with_capacity(batch_size * max_len);
            let mut mask_flat = Vec::with_capacity(batch_size * max_len);
            let mut type_flat = Vec::with_capacity(batch_size * max_len);

            for enc in &encodings {
                let len = enc.get_ids().len().min(max_len);
                for i in 0..len {
                    ids_flat.push(enc.get_ids()[i] as i64);
                    mask_flat.push(enc.get_attention_mask()[i] as i64);
                    type_flat.push(enc.get_type_ids()[i] as i64);
                }
                for _ in len..max_len {
                    ids_flat.push(0i64);
                    mask_flat.push(0i64);
                    type_flat.push(0i64);
                }
            }

            let shape = vec![batch_size, max_len];
            let input_ids = Value::from_array((shape.clone(), ids_flat))
                .map_err(|e| anyhow!("batch input_ids: {:?}", e))?;
            let attention_mask = Value::from_array((shape.clone(), mask_flat.clone()))
                .map_err(|e| anyhow!("batch attention_mask: {:?}", e))?;
            let token_type_ids = Value::from_array((shape, type_flat))
                .map_err(|e| anyhow!("batch token_type_ids: {:?}", e))?;

            let inputs = ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ];

            let mut session = self.session.lock();
            let outputs = session
                .run(inputs)
                .map_err(|e| anyhow!("batch embedding inference failed: {:?}", e))?;

            let output_name = outputs
                .iter()
                .next()
                .map(|(name, _)| name.to_string())
                .ok_or_else(|| anyhow!("embedding model produced no outputs"))?;
            let (out_shape, data) = outputs[output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| anyhow!("failed to extract batch hidden states: {:?}", e))?;

            // out_shape is [batch_size, seq_len, hidden_dim]; mean-pool each
            // sample over seq_len weighted by its own attention mask.
            let hidden_dim = *out_shape.last().ok_or_else(|| anyhow!("empty output shape"))? as usize;
            let seq_len = max_len;

            for sample in 0..batch_size {
                let mask_offset = sample * seq_len;
                let data_offset = sample * seq_len * hidden_dim;
                let mut pooled = vec![0.0f32; hidden_dim];
                let mut mask_sum = 0.0f32;

                for t in 0..seq_len {
                    let m = mask_flat[mask_offset + t] as f32;
                    if m == 0.0 {
                        continue;
                    }
                    mask_sum += m;
                    let row = data_offset + t * hidden_dim;
                    for d in 0..hidden_dim {
                        pooled[d] += data[row + d] * m;
                    }
                }
                if mask_sum > 0.0 {
                    for v in pooled.iter_mut() {
                        *v /= mask_sum;
                    }
                }

                let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in pooled.iter_mut() {
                        *v /= norm;
                    }
                }

                all_embeddings.push(pooled);
            }
        }

        Ok(all_embeddings)
    }
}

impl EmbeddingModel for MiniLmEmbeddings {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(text)
    }

    fn embed_document(&self, text: &str) -> Result<Vec<f32>> {
        self.encode(text)
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.encode_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
