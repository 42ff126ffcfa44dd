//! Fusion search: one query across many documents, grouped per source
//!
//! The store returns a flat ranked chunk list; fusion groups the top hits
//! by source document, previews each contributing chunk, and sums chunk
//! scores into a per-document relevance score. Ordering for display is the
//! consumer's job (sort by `relevance_score` descending).

use crate::config::Config;
use crate::error::Result;
use crate::models::Document;
use crate::store::ChunkStore;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Per-document aggregation of matching chunks
#[derive(Debug, Clone, Serialize)]
pub struct FusionHit {
    pub author: String,
    pub passages: Vec<String>,
    pub relevance_score: f32,
}

/// Fusion search engine over a chunk store
pub struct FusionSearch<'a> {
    store: &'a ChunkStore,
    limit: usize,
    preview_chars: usize,
}

impl<'a> FusionSearch<'a> {
    pub fn new(store: &'a ChunkStore, config: &Config) -> Self {
        Self {
            store,
            limit: config.search.fusion_limit,
            preview_chars: config.search.preview_chars,
        }
    }

    /// Search across documents, optionally restricted to an exact-title
    /// allow-list; unmatched titles are silently excluded
    pub async fn search(
        &self,
        query: &str,
        document_titles: Option<&[String]>,
    ) -> Result<HashMap<String, FusionHit>> {
        info!("Fusion search: {}", query);

        let docs = self.store.list_documents().await?;
        let by_id: HashMap<i64, &Document> = docs.iter().map(|d| (d.id, d)).collect();

        let allowed: Option<Vec<i64>> = document_titles.map(|titles| {
            docs.iter()
                .filter(|d| titles.iter().any(|t| t == &d.title))
                .map(|d| d.id)
                .collect()
        });
        if let Some(ids) = &allowed {
            debug!("Title allow-list resolved to {} documents", ids.len());
        }

        let hits = self
            .store
            .search(query, allowed.as_deref(), self.limit)
            .await?;

        let mut grouped: HashMap<String, FusionHit> = HashMap::new();
        for hit in hits {
            let Some(doc) = by_id.get(&hit.chunk.document_id) else {
                continue;
            };
            let entry = grouped
                .entry(doc.title.clone())
                .or_insert_with(|| FusionHit {
                    author: doc.author.clone(),
                    passages: Vec::new(),
                    relevance_score: 0.0,
                });
            entry
                .passages
                .push(hit.chunk.content.chars().take(self.preview_chars).collect());
            entry.relevance_score += hit.score;
        }

        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkDraft, ChunkTier};

    fn draft(seq: i64, content: &str) -> ChunkDraft {
        ChunkDraft {
            tier: ChunkTier::Paragraph,
            chapter_number: Some(1),
            section_number: None,
            sequence_index: seq,
            content: content.to_string(),
            word_count: content.split_whitespace().count(),
            char_count: content.chars().count(),
            content_hash: ChunkDraft::compute_hash(content),
        }
    }

    async fn seeded_store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(&dir.path().join("test.db")).await.unwrap();

        let escape = store
            .create_document("Escape from Freedom", "Erich Fromm", 100)
            .await
            .unwrap();
        store
            .put(
                escape.id,
                &[
                    draft(0, "freedom is a burden the modern mind flees"),
                    draft(1, "the fear of freedom drives submission"),
                ],
            )
            .await
            .unwrap();

        let congo = store
            .create_document("Congo", "Michael Crichton", 100)
            .await
            .unwrap();
        store
            .put(
                congo.id,
                &[draft(0, "the expedition sought freedom from the jungle")],
            )
            .await
            .unwrap();

        let other = store
            .create_document("Dune", "Frank Herbert", 100)
            .await
            .unwrap();
        store
            .put(other.id, &[draft(0, "spice melange and freedom of the desert")])
            .await
            .unwrap();

        (dir, store)
    }

    #[tokio::test]
    async fn test_allow_list_groups_and_scores() {
        let (_dir, store) = seeded_store().await;
        let config = Config::default();
        let fusion = FusionSearch::new(&store, &config);

        let titles = vec!["Escape from Freedom".to_string(), "Congo".to_string()];
        let results = fusion.search("freedom", Some(&titles)).await.unwrap();

        assert_eq!(results.len(), 2);
        let escape = &results["Escape from Freedom"];
        assert_eq!(escape.author, "Erich Fromm");
        assert_eq!(escape.passages.len(), 2);
        assert!(escape.relevance_score > 0.0);

        let congo = &results["Congo"];
        assert_eq!(congo.passages.len(), 1);

        // Two matching chunks outscore one.
        assert!(escape.relevance_score > congo.relevance_score);
    }

    #[tokio::test]
    async fn test_unmatched_titles_silently_excluded() {
        let (_dir, store) = seeded_store().await;
        let config = Config::default();
        let fusion = FusionSearch::new(&store, &config);

        let titles = vec!["Congo".to_string(), "No Such Book".to_string()];
        let results = fusion.search("freedom", Some(&titles)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("Congo"));
    }

    #[tokio::test]
    async fn test_unrestricted_search_covers_all_documents() {
        let (_dir, store) = seeded_store().await;
        let config = Config::default();
        let fusion = FusionSearch::new(&store, &config);

        let results = fusion.search("freedom", None).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_previews_are_truncated() {
        let (_dir, store) = seeded_store().await;
        let config = Config::default();
        let fusion = FusionSearch::new(&store, &config);

        let results = fusion.search("freedom", None).await.unwrap();
        for hit in results.values() {
            for passage in &hit.passages {
                assert!(passage.chars().count() <= config.search.preview_chars);
            }
        }
    }
}
