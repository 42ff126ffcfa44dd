//! Batch ingestion pipeline
//!
//! Documents are independent: each one is validated, chunked at all three
//! tiers, and stored under its own transaction, so a batch runs them
//! concurrently up to a worker limit. One document's failure (or timeout)
//! marks that document `Failed` and never aborts its siblings.

use crate::chunk::{chunk_document, count_words};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{DocumentStatus, ParagraphRecord, RawDocument};
use crate::store::ChunkStore;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of one document's ingestion
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub document_id: Option<i64>,
    pub title: String,
    pub status: DocumentStatus,
    pub chunks_created: usize,
    pub error: Option<String>,
}

/// Aggregate result of a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub documents_indexed: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
    pub outcomes: Vec<DocumentOutcome>,
}

/// Batch ingestion driver
pub struct Ingestor<'a> {
    store: &'a ChunkStore,
    config: &'a Config,
    #[cfg(test)]
    store_delay: Option<Duration>,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a ChunkStore, config: &'a Config) -> Self {
        Self {
            store,
            config,
            #[cfg(test)]
            store_delay: None,
        }
    }

    /// Test hook: stall between chunking and storage
    #[cfg(test)]
    fn with_store_delay(mut self, delay: Duration) -> Self {
        self.store_delay = Some(delay);
        self
    }

    /// Ingest a batch of documents concurrently
    pub async fn ingest_batch(&self, documents: Vec<RawDocument>) -> Result<IngestReport> {
        let concurrency = self.config.ingest.concurrency.max(1);
        info!(
            documents = documents.len(),
            concurrency, "starting batch ingestion"
        );

        let outcomes: Vec<DocumentOutcome> = stream::iter(documents)
            .map(|doc| self.ingest_one(doc))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for outcome in outcomes {
            match outcome.status {
                DocumentStatus::Indexed => {
                    report.documents_indexed += 1;
                    report.chunks_created += outcome.chunks_created;
                }
                _ => report.documents_failed += 1,
            }
            report.outcomes.push(outcome);
        }

        info!(
            indexed = report.documents_indexed,
            failed = report.documents_failed,
            chunks = report.chunks_created,
            "batch ingestion finished"
        );
        Ok(report)
    }

    /// Ingest a single document, reporting its outcome instead of failing
    /// the batch
    pub async fn ingest_one(&self, raw: RawDocument) -> DocumentOutcome {
        let title = raw.title.clone();
        match self.try_ingest(raw).await {
            Ok((document_id, chunks_created)) => DocumentOutcome {
                document_id: Some(document_id),
                title,
                status: DocumentStatus::Indexed,
                chunks_created,
                error: None,
            },
            Err((document_id, err)) => {
                warn!("Ingestion of '{}' failed: {}", title, err);
                if let Some(id) = document_id {
                    // Best-effort status update; the chunk set itself rolled
                    // back with the failed transaction.
                    if let Err(status_err) = self
                        .store
                        .set_document_status(id, DocumentStatus::Failed)
                        .await
                    {
                        warn!("Could not mark document {} failed: {}", id, status_err);
                    }
                }
                DocumentOutcome {
                    document_id,
                    title,
                    status: DocumentStatus::Failed,
                    chunks_created: 0,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn try_ingest(
        &self,
        raw: RawDocument,
    ) -> std::result::Result<(i64, usize), (Option<i64>, Error)> {
        validate_paragraphs(&raw.paragraphs).map_err(|e| (None, e))?;

        let word_count: usize = raw.paragraphs.iter().map(|p| count_words(&p.text)).sum();
        let doc = self
            .store
            .create_document(&raw.title, &raw.author, word_count as i64)
            .await
            .map_err(|e| (None, e))?;

        let work = self.chunk_and_store(doc.id, &raw.paragraphs);
        let timeout_secs = self.config.ingest.timeout_secs;
        let result = if timeout_secs > 0 {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), work).await {
                Ok(result) => result,
                Err(_) => Err(Error::Other(format!(
                    "ingestion timed out after {}s",
                    timeout_secs
                ))),
            }
        } else {
            work.await
        };

        match result {
            Ok(chunks_created) => Ok((doc.id, chunks_created)),
            Err(e) => Err((Some(doc.id), e)),
        }
    }

    async fn chunk_and_store(&self, document_id: i64, paragraphs: &[ParagraphRecord]) -> Result<usize> {
        let drafts = chunk_document(paragraphs, &self.config.chunk);
        self.store
            .set_document_status(document_id, DocumentStatus::Chunked)
            .await?;
        #[cfg(test)]
        if let Some(delay) = self.store_delay {
            tokio::time::sleep(delay).await;
        }
        let created = self.store.put(document_id, &drafts).await?;
        self.store
            .set_document_status(document_id, DocumentStatus::Indexed)
            .await?;
        Ok(created)
    }
}

/// Reject paragraph records with no text
fn validate_paragraphs(paragraphs: &[ParagraphRecord]) -> Result<()> {
    if paragraphs.is_empty() {
        return Err(Error::MalformedInput(
            "document has no paragraphs".to_string(),
        ));
    }
    for (i, para) in paragraphs.iter().enumerate() {
        if para.text.trim().is_empty() {
            return Err(Error::MalformedInput(format!(
                "paragraph {} has no text",
                i
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkTier;

    fn raw_doc(title: &str, paragraphs: usize) -> RawDocument {
        let paragraphs = (0..paragraphs)
            .map(|p| {
                let text: Vec<String> =
                    (0..100).map(|w| format!("{}p{}w{}", title, p, w)).collect();
                ParagraphRecord::new(Some(1 + (p / 10) as i64), None, text.join(" "))
            })
            .collect();
        RawDocument {
            title: title.to_string(),
            author: "Tester".to_string(),
            paragraphs,
        }
    }

    async fn test_store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(&dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_single_document_reaches_indexed() {
        let (_dir, store) = test_store().await;
        let config = Config::default();
        let ingestor = Ingestor::new(&store, &config);

        let outcome = ingestor.ingest_one(raw_doc("alpha", 20)).await;
        assert_eq!(outcome.status, DocumentStatus::Indexed);
        assert!(outcome.chunks_created > 0);

        let id = outcome.document_id.unwrap();
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.get_status().unwrap(), DocumentStatus::Indexed);
        assert_eq!(doc.word_count, 2000);

        // All three tiers got stored.
        for tier in ChunkTier::ALL {
            assert!(!store.get_chunks(id, Some(tier)).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_malformed_document_does_not_abort_batch() {
        let (_dir, store) = test_store().await;
        let config = Config::default();
        let ingestor = Ingestor::new(&store, &config);

        let mut bad = raw_doc("beta", 5);
        bad.paragraphs[2].text = "   ".to_string();

        let report = ingestor
            .ingest_batch(vec![raw_doc("alpha", 20), bad, raw_doc("gamma", 20)])
            .await
            .unwrap();

        assert_eq!(report.documents_indexed, 2);
        assert_eq!(report.documents_failed, 1);

        let failed = report
            .outcomes
            .iter()
            .find(|o| o.title == "beta")
            .unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("paragraph 2"));
        // Malformed input is rejected before a document row exists.
        assert!(failed.document_id.is_none());
    }

    #[tokio::test]
    async fn test_empty_document_is_malformed() {
        let (_dir, store) = test_store().await;
        let config = Config::default();
        let ingestor = Ingestor::new(&store, &config);

        let outcome = ingestor
            .ingest_one(RawDocument {
                title: "empty".to_string(),
                author: "Tester".to_string(),
                paragraphs: Vec::new(),
            })
            .await;
        assert_eq!(outcome.status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn test_timed_out_ingestion_leaves_no_chunks() {
        let (_dir, store) = test_store().await;
        let mut config = Config::default();
        config.ingest.timeout_secs = 1;

        // A sibling ingested beforehand must survive the timeout untouched.
        let stable = Ingestor::new(&store, &config)
            .ingest_one(raw_doc("stable", 20))
            .await;
        assert_eq!(stable.status, DocumentStatus::Indexed);
        let stable_id = stable.document_id.unwrap();
        let stable_chunks = store.get_chunks(stable_id, None).await.unwrap().len();

        let ingestor =
            Ingestor::new(&store, &config).with_store_delay(Duration::from_secs(30));
        let outcome = ingestor.ingest_one(raw_doc("alpha", 20)).await;

        assert_eq!(outcome.status, DocumentStatus::Failed);
        assert_eq!(outcome.chunks_created, 0);
        assert!(outcome.error.as_deref().unwrap().contains("timed out"));

        // Storage never ran for the cancelled document.
        let id = outcome.document_id.unwrap();
        let doc = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(doc.get_status().unwrap(), DocumentStatus::Failed);
        assert!(store.get_chunks(id, None).await.unwrap().is_empty());
        assert!(store.search("alphap0w0", None, 10).await.unwrap().is_empty());

        assert_eq!(
            store.get_chunks(stable_id, None).await.unwrap().len(),
            stable_chunks
        );
    }

    #[tokio::test]
    async fn test_batch_is_searchable_after_ingest() {
        let (_dir, store) = test_store().await;
        let config = Config::default();
        let ingestor = Ingestor::new(&store, &config);

        let report = ingestor
            .ingest_batch(vec![raw_doc("alpha", 20), raw_doc("beta", 20)])
            .await
            .unwrap();
        assert_eq!(report.documents_indexed, 2);

        let results = store.search("alphap0w0", None, 10).await.unwrap();
        assert!(!results.is_empty());
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 2);
    }

    #[tokio::test]
    async fn test_reingest_replaces_chunks() {
        let (_dir, store) = test_store().await;
        let config = Config::default();
        let ingestor = Ingestor::new(&store, &config);

        let outcome = ingestor.ingest_one(raw_doc("alpha", 20)).await;
        let id = outcome.document_id.unwrap();
        let before = store.get_chunks(id, None).await.unwrap().len();

        // Re-ingestion is a full replace through the same document row.
        let raw = raw_doc("alpha", 10);
        let drafts = chunk_document(&raw.paragraphs, &config.chunk);
        store.put(id, &drafts).await.unwrap();

        let after = store.get_chunks(id, None).await.unwrap().len();
        assert!(after < before);
    }
}
