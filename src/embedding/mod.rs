//! Embedding generation for stored transcriptions.

mod remote;

pub use remote::RemoteEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate a unit-norm embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Scale a vector to unit L2 norm. Returns None for a zero vector.
pub fn normalize(mut vector: Vec<f32>) -> Option<Vec<f32>> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    for x in &mut vector {
        *x /= norm;
    }
    Some(vector)
}
