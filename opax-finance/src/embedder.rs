//! Text embedding backends for the instrument classifier.
//!
//! Two backends sit behind [`Embedder`]:
//! - [`FastEmbedder`] runs the all-MiniLM-L6-v2 sentence model via `fastembed`
//!   (feature `fastembed`).
//! - [`HashingEmbedder`] is a deterministic feature-hashing encoder: word
//!   unigrams plus boundary-padded character trigrams, FNV-1a hashed into a
//!   signed fixed-dimension vector and L2-normalized. It needs no model files,
//!   so the same description always maps to the same vector on every machine.

use opax_core::{OpaxError, Result};

/// Default embedding dimension
pub const DEFAULT_DIMENSION: usize = 384;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Bank narration filler the hashing backend ignores
const FILLER_TOKENS: [&str; 5] = ["dr", "cr", "of", "to", "nach"];

/// Anything that can turn text into fixed-dimension vectors
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(OpaxError::classification("embedding dimension must be positive"));
        }
        Ok(Self { dimension })
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a_64(feature.as_bytes());
        let idx = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
        vec[idx] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            self.add_feature(&mut vec, &format!("w:{token}"), WORD_WEIGHT);

            let padded: Vec<char> = format!("<{token}>").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vec, &format!("g:{gram}"), TRIGRAM_WEIGHT);
            }
        }
        normalize(&mut vec);
        Ok(vec)
    }
}

/// Lowercase alphanumeric runs, minus reference numbers and filler
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !FILLER_TOKENS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(feature = "fastembed")]
pub use model::FastEmbedder;

#[cfg(feature = "fastembed")]
mod model {
    use super::Embedder;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use opax_core::{OpaxError, Result};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Output dimension of all-MiniLM-L6-v2
    const MINILM_DIMENSION: usize = 384;

    /// all-MiniLM-L6-v2 through fastembed's ONNX runtime. The model is
    /// downloaded into `cache_dir` on first construction.
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
            let cache_dir = cache_dir.into();
            let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_cache_dir(cache_dir.clone())
                .with_show_download_progress(false);
            let model = TextEmbedding::try_new(options).map_err(|e| {
                OpaxError::classification(format!(
                    "failed to load all-MiniLM-L6-v2 from {}: {e}",
                    cache_dir.display()
                ))
            })?;
            tracing::info!(cache_dir = %cache_dir.display(), "loaded all-MiniLM-L6-v2");
            Ok(Self {
                model: Mutex::new(model),
            })
        }

        fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            let model = self
                .model
                .lock()
                .map_err(|_| OpaxError::classification("embedding model lock poisoned"))?;
            model
                .embed(texts, None)
                .map_err(|e| OpaxError::classification(format!("embedding failed: {e}")))
        }
    }

    impl Embedder for FastEmbedder {
        fn dimension(&self) -> usize {
            MINILM_DIMENSION
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.run(vec![text.to_string()])?
                .pop()
                .ok_or_else(|| OpaxError::classification("model returned no embedding"))
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.run(texts.to_vec())
        }
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
