//! Semantic index: pluggable similarity search over node content.
//!
//! The trait is the extension seam; [`LexicalIndex`] is the deterministic
//! TF-IDF/cosine fallback used when no embedding-backed implementation is
//! configured, so search works the same in a test as it would with a real
//! backend wired in.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{GraphSnapshot, Node};

/// A scored search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub node_id: String,
    pub score: f32,
}

/// Pluggable similarity backend over a graph's node content.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Rebuilds the index from scratch against the given snapshot.
    async fn reindex(&mut self, snapshot: &GraphSnapshot) -> Result<()>;

    /// Returns up to `limit` nodes most similar to `query`, highest score first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticMatch>>;

    /// Name of the backend, surfaced in diagnostics (`"lexical"`, `"embedding:<provider>"`).
    fn backend_name(&self) -> &'static str;
}

/// Deterministic TF-IDF + cosine similarity index with no external
/// dependencies. Used whenever a real embedding backend is not configured.
#[derive(Default)]
pub struct LexicalIndex {
    documents: HashMap<String, HashMap<String, f32>>,
    idf: HashMap<String, f32>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<String, f32> {
    let mut counts: HashMap<String, f32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0.0) += 1.0;
    }
    let total = tokens.len().max(1) as f32;
    for v in counts.values_mut() {
        *v /= total;
    }
    counts
}

fn cosine_similarity(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let mut dot = 0.0f32;
    for (term, weight) in a {
        if let Some(other) = b.get(term) {
            dot += weight * other;
        }
    }
    let norm_a: f32 = a.values().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn weighted(&self, tf: &HashMap<String, f32>) -> HashMap<String, f32> {
        tf.iter()
            .map(|(term, freq)| {
                let idf = self.idf.get(term).copied().unwrap_or(1.0);
                (term.clone(), freq * idf)
            })
            .collect()
    }
}

#[async_trait]
impl SemanticIndex for LexicalIndex {
    async fn reindex(&mut self, snapshot: &GraphSnapshot) -> Result<()> {
        self.documents.clear();
        self.idf.clear();

        let mut doc_term_freqs: HashMap<String, HashMap<String, f32>> = HashMap::new();
        let mut doc_count_per_term: HashMap<String, usize> = HashMap::new();

        for node in &snapshot.nodes {
            let tokens = tokenize(&node.indexable_text());
            let tf = term_frequencies(&tokens);
            for term in tf.keys() {
                *doc_count_per_term.entry(term.clone()).or_insert(0) += 1;
            }
            doc_term_freqs.insert(node.id.clone(), tf);
        }

        let total_docs = snapshot.nodes.len().max(1) as f32;
        for (term, doc_count) in &doc_count_per_term {
            let idf = (total_docs / (*doc_count as f32)).ln() + 1.0;
            self.idf.insert(term.clone(), idf);
        }

        for (id, tf) in doc_term_freqs {
            let weighted = tf
                .iter()
                .map(|(term, freq)| {
                    let idf = self.idf.get(term).copied().unwrap_or(1.0);
                    (term.clone(), freq * idf)
                })
                .collect();
            self.documents.insert(id, weighted);
        }
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticMatch>> {
        let query_tf = term_frequencies(&tokenize(query));
        let query_vec = self.weighted(&query_tf);

        let mut scored: Vec<SemanticMatch> = self
            .documents
            .iter()
            .map(|(id, doc_vec)| SemanticMatch {
                node_id: id.clone(),
                score: cosine_similarity(&query_vec, doc_vec),
            })
            .filter(|m| m.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn backend_name(&self) -> &'static str {
        "lexical"
    }
}

/// Builds the configured [`SemanticIndex`] backend. Currently only the
/// lexical fallback is implemented in-tree; external backends are expected to
/// provide their own constructor and satisfy the same trait.
pub fn lexical_backend() -> LexicalIndex {
    LexicalIndex::new()
}
