//! In-memory inverted index with TF-IDF ranking
//!
//! Terms are lowercased unicode words. Postings map each term to the
//! per-chunk occurrence count; scoring discounts common terms with a
//! logarithmic inverse-document-frequency factor. Ties are broken by
//! larger chunk word count, then lower chunk id.

use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

/// Normalize text into index terms
pub fn terms(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

#[derive(Debug, Clone, Copy)]
struct ChunkStats {
    document_id: i64,
    word_count: i64,
}

/// Inverted index over chunk content
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, HashMap<i64, u32>>,
    chunks: HashMap<i64, ChunkStats>,
    doc_chunks: HashMap<i64, Vec<i64>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of distinct terms
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Add one chunk's content to the index
    pub fn add_chunk(&mut self, chunk_id: i64, document_id: i64, word_count: i64, content: &str) {
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for term in terms(content) {
            *freqs.entry(term).or_insert(0) += 1;
        }
        for (term, tf) in freqs {
            self.postings.entry(term).or_default().insert(chunk_id, tf);
        }
        self.chunks.insert(
            chunk_id,
            ChunkStats {
                document_id,
                word_count,
            },
        );
        self.doc_chunks.entry(document_id).or_default().push(chunk_id);
    }

    /// Drop all postings for a document's chunks
    pub fn remove_document(&mut self, document_id: i64) {
        let Some(chunk_ids) = self.doc_chunks.remove(&document_id) else {
            return;
        };
        let removed: HashSet<i64> = chunk_ids.iter().copied().collect();
        for id in &chunk_ids {
            self.chunks.remove(id);
        }
        self.postings.retain(|_, posting| {
            posting.retain(|id, _| !removed.contains(id));
            !posting.is_empty()
        });
    }

    /// Score chunks against a query, best first
    ///
    /// `document_ids` restricts results to those documents; an empty set
    /// matches nothing, `None` matches everything.
    pub fn search(
        &self,
        query: &str,
        document_ids: Option<&HashSet<i64>>,
        limit: usize,
    ) -> Vec<(i64, f32)> {
        let query_terms = terms(query);
        if query_terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        let total = self.chunks.len() as f32;
        let mut scores: HashMap<i64, f32> = HashMap::new();

        for term in &query_terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let idf = ((total + 1.0) / (posting.len() as f32 + 1.0)).ln() + 1.0;
            for (&chunk_id, &tf) in posting {
                if let Some(allowed) = document_ids {
                    let doc = self.chunks[&chunk_id].document_id;
                    if !allowed.contains(&doc) {
                        continue;
                    }
                }
                *scores.entry(chunk_id).or_insert(0.0) += tf as f32 * idf;
            }
        }

        let mut ranked: Vec<(i64, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let wa = self.chunks[&a.0].word_count;
                    let wb = self.chunks[&b.0].word_count;
                    wb.cmp(&wa).then(a.0.cmp(&b.0))
                })
        });
        ranked.truncate(limit);
        ranked
    }
}
