//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the per-type composition of embedding input text, and pure
//! helpers for vector serialization and similarity.
//!
//! Concrete providers (OpenAI-compatible, Ollama) live in the `schemadex`
//! app crate.

use async_trait::async_trait;

use crate::error::EmbedError;
use crate::models::ParsedDocument;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// A vector together with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub model: String,
    pub dims: usize,
    pub vector: Vec<f32>,
}

/// Check a provider response against the batch and the declared dimension.
pub fn check_vectors(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dims: usize,
) -> Result<(), EmbedError> {
    if vectors.len() != expected_count {
        return Err(EmbedError::Permanent(format!(
            "expected {} vectors, got {}",
            expected_count,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(EmbedError::Permanent(format!(
            "expected {} dimensions, got {}",
            dims,
            bad.len()
        )));
    }
    Ok(())
}

/// Short, type-specific text to embed. Falls back to the raw content when
/// the composed text would be empty.
pub fn embedding_input(doc: &ParsedDocument) -> String {
    let composed = match doc {
        ParsedDocument::Table(t) => {
            let columns: Vec<String> = t
                .columns
                .iter()
                .map(|c| {
                    if c.data_type.is_empty() {
                        c.name.clone()
                    } else {
                        format!("{} {}", c.name, c.data_type)
                    }
                })
                .collect();
            join_nonempty(&[
                format!("Table {}", t.table_ref()),
                t.domain
                    .as_ref()
                    .map(|d| format!("Domain: {}", d))
                    .unwrap_or_default(),
                t.description.clone(),
                if columns.is_empty() {
                    String::new()
                } else {
                    format!("Columns: {}", columns.join(", "))
                },
            ])
        }
        ParsedDocument::Column(c) => c.common.content.clone(),
        ParsedDocument::Domain(d) => {
            let tables: Vec<String> = d.tables.iter().map(|t| t.qualified()).collect();
            join_nonempty(&[
                format!("Domain {}", d.domain),
                d.common.summary.clone(),
                if tables.is_empty() {
                    String::new()
                } else {
                    format!("Tables: {}", tables.join(", "))
                },
            ])
        }
        ParsedDocument::Relationship(r) => join_nonempty(&[
            format!("Relationship {} -> {}", r.source, r.target),
            r.join_condition
                .as_ref()
                .map(|j| format!("Join: {}", j))
                .unwrap_or_default(),
            r.description.clone(),
        ]),
        ParsedDocument::Overview(o) => join_nonempty(&[o.title.clone(), o.common.summary.clone()]),
    };
    if composed.trim().is_empty() {
        doc.common().content.clone()
    } else {
        composed
    }
}

fn join_nonempty(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use schemadex_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use crate::models::DocType;

    #[test]
    fn vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn cosine_cases() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn checks_count_and_dims() {
        assert!(check_vectors(&[vec![0.0; 3]], 1, 3).is_ok());
        assert!(matches!(
            check_vectors(&[vec![0.0; 2]], 1, 3),
            Err(EmbedError::Permanent(_))
        ));
        assert!(check_vectors(&[], 1, 3).is_err());
    }

    #[test]
    fn table_input_is_composed() {
        let doc = parse_document(
            DocType::Table,
            "# Table: public.orders\n**Domain:** sales\nPlaced orders.\n\n## Columns\n\
| Column | Type |\n|-|-|\n| id | bigint |\n",
            "shop",
        )
        .unwrap();
        let input = embedding_input(&doc);
        assert_eq!(
            input,
            "Table public.orders\nDomain: sales\nPlaced orders.\nColumns: id bigint"
        );
    }

    #[test]
    fn overview_without_summary_still_has_title() {
        let doc = parse_document(DocType::Overview, "# Shop\n", "shop").unwrap();
        assert_eq!(embedding_input(&doc), "Shop");
    }
}
