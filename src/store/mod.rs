//! Chunk storage over SQLite
//!
//! This module owns the only shared mutable state in the system:
//! - Document and chunk rows (SQLite, WAL mode)
//! - The in-memory inverted index over chunk content
//!
//! `put` is an atomic per-document replace: delete-then-insert inside one
//! transaction, with the index updated only after commit, so readers see
//! either the old or the new complete chunk set. Concurrent `put` calls for
//! the same document are rejected, not merged.

mod index;
mod schema;

pub use index::{terms, InvertedIndex};
pub use schema::SCHEMA_SQL;

use crate::error::{Error, Result};
use crate::models::{now_rfc3339, Chunk, ChunkDraft, ChunkTier, Document, DocumentStatus};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// A chunk with its relevance score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Store-wide counters
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub documents: i64,
    pub chunks: i64,
    pub indexed_terms: usize,
}

/// Chunk store handle
#[derive(Clone)]
pub struct ChunkStore {
    pool: SqlitePool,
    index: Arc<RwLock<InvertedIndex>>,
    active_puts: Arc<Mutex<HashSet<i64>>>,
}

/// In-process exclusion for per-document writes; released on drop
struct PutGuard {
    active: Arc<Mutex<HashSet<i64>>>,
    document_id: i64,
}

impl PutGuard {
    fn acquire(active: &Arc<Mutex<HashSet<i64>>>, document_id: i64) -> Result<Self> {
        let mut set = active.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(document_id) {
            return Err(Error::IngestionConflict(document_id));
        }
        Ok(Self {
            active: Arc::clone(active),
            document_id,
        })
    }
}

impl Drop for PutGuard {
    fn drop(&mut self) {
        let mut set = self.active.lock().unwrap_or_else(|p| p.into_inner());
        set.remove(&self.document_id);
    }
}

impl ChunkStore {
    /// Open (or create) the store at the given path
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        let store = Self {
            pool,
            index: Arc::new(RwLock::new(InvertedIndex::new())),
            active_puts: Arc::new(Mutex::new(HashSet::new())),
        };
        store.rebuild_index().await?;
        Ok(store)
    }

    /// Rebuild the inverted index from stored chunks
    async fn rebuild_index(&self) -> Result<()> {
        let rows: Vec<(i64, i64, i64, String)> =
            sqlx::query_as("SELECT id, document_id, word_count, content FROM chunks")
                .fetch_all(&self.pool)
                .await?;

        let mut index = InvertedIndex::new();
        for (id, document_id, word_count, content) in &rows {
            index.add_chunk(*id, *document_id, *word_count, content);
        }
        info!("Rebuilt search index over {} chunks", rows.len());

        *self.index.write().unwrap_or_else(|p| p.into_inner()) = index;
        Ok(())
    }

    // ===== Document operations =====

    /// Insert a new document with status `Pending`
    pub async fn create_document(
        &self,
        title: &str,
        author: &str,
        word_count: i64,
    ) -> Result<Document> {
        let now = now_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (title, author, word_count, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(author)
        .bind(word_count)
        .bind(DocumentStatus::Pending.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Document {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            author: author.to_string(),
            word_count,
            status: DocumentStatus::Pending.to_string(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get document by id
    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let doc = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc)
    }

    /// List all documents, newest first
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let docs =
            sqlx::query_as::<_, Document>("SELECT * FROM documents ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(docs)
    }

    /// Update a document's processing status
    pub async fn set_document_status(&self, id: i64, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resolve a free-text identifier (id, title, or title/author substring)
    /// to exactly one document
    ///
    /// An exact title match short-circuits substring ambiguity; multiple
    /// matches are never resolved automatically.
    pub async fn resolve(&self, name: &str) -> Result<Document> {
        let trimmed = name.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return self
                .get_document(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("document id {}", id)));
        }

        let docs = self.list_documents().await?;

        let exact: Vec<&Document> = docs
            .iter()
            .filter(|d| d.title.eq_ignore_ascii_case(trimmed))
            .collect();
        match exact.len() {
            1 => return Ok(exact[0].clone()),
            0 => {}
            _ => {
                return Err(Error::AmbiguousIdentifier {
                    name: trimmed.to_string(),
                    candidates: exact.iter().map(|d| d.to_ref()).collect(),
                })
            }
        }

        let needle = trimmed.to_lowercase();
        let partial: Vec<&Document> = docs
            .iter()
            .filter(|d| {
                d.title.to_lowercase().contains(&needle)
                    || d.author.to_lowercase().contains(&needle)
            })
            .collect();
        match partial.len() {
            0 => Err(Error::NotFound(format!("no document matching '{}'", trimmed))),
            1 => Ok(partial[0].clone()),
            _ => Err(Error::AmbiguousIdentifier {
                name: trimmed.to_string(),
                candidates: partial.iter().map(|d| d.to_ref()).collect(),
            }),
        }
    }

    /// Delete a document, its chunks, and its index postings
    pub async fn delete_document(&self, id: i64) -> Result<()> {
        let _guard = PutGuard::acquire(&self.active_puts, id)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.index
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove_document(id);

        info!("Deleted document {}", id);
        Ok(())
    }

    // ===== Chunk operations =====

    /// Replace a document's chunk set atomically
    ///
    /// Any failure before commit leaves the previous complete chunk set
    /// intact. A concurrent `put` for the same document is rejected with
    /// `IngestionConflict`.
    pub async fn put(&self, document_id: i64, drafts: &[ChunkDraft]) -> Result<usize> {
        let _guard = PutGuard::acquire(&self.active_puts, document_id)?;

        if self.get_document(document_id).await?.is_none() {
            return Err(Error::NotFound(format!("document id {}", document_id)));
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted: Vec<(i64, i64, String)> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let result = sqlx::query(
                r#"
                INSERT INTO chunks (
                    document_id, tier, chapter_number, section_number, sequence_index,
                    content, word_count, char_count, content_hash, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(draft.tier.to_string())
            .bind(draft.chapter_number)
            .bind(draft.section_number)
            .bind(draft.sequence_index)
            .bind(&draft.content)
            .bind(draft.word_count as i64)
            .bind(draft.char_count as i64)
            .bind(&draft.content_hash)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            inserted.push((
                result.last_insert_rowid(),
                draft.word_count as i64,
                draft.content.clone(),
            ));
        }

        sqlx::query("UPDATE documents SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        // Index only after commit: search never surfaces uncommitted rows.
        let mut index = self.index.write().unwrap_or_else(|p| p.into_inner());
        index.remove_document(document_id);
        for (chunk_id, word_count, content) in &inserted {
            index.add_chunk(*chunk_id, document_id, *word_count, content);
        }
        drop(index);

        debug!(
            document_id,
            chunks = inserted.len(),
            "replaced chunk set"
        );
        Ok(inserted.len())
    }

    /// Ordered chunks of a document, optionally restricted to one tier
    ///
    /// Order is `(chapter_number, section_number, sequence_index)` ascending
    /// with NULL first; the only valid concatenation order.
    pub async fn get_chunks(&self, document_id: i64, tier: Option<ChunkTier>) -> Result<Vec<Chunk>> {
        let chunks = match tier {
            Some(tier) => {
                sqlx::query_as::<_, Chunk>(
                    r#"
                    SELECT * FROM chunks WHERE document_id = ? AND tier = ?
                    ORDER BY chapter_number ASC, section_number ASC, sequence_index ASC
                    "#,
                )
                .bind(document_id)
                .bind(tier.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Chunk>(
                    r#"
                    SELECT * FROM chunks WHERE document_id = ?
                    ORDER BY tier ASC, chapter_number ASC, section_number ASC, sequence_index ASC
                    "#,
                )
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(chunks)
    }

    /// Rank chunks against a query, best first
    ///
    /// `document_ids` restricts the search; an explicit empty list matches
    /// nothing. The index is updated synchronously by `put`, so results
    /// reflect every completed write.
    pub async fn search(
        &self,
        query: &str,
        document_ids: Option<&[i64]>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let allowed: Option<HashSet<i64>> =
            document_ids.map(|ids| ids.iter().copied().collect());

        let ranked = {
            let index = self.index.read().unwrap_or_else(|p| p.into_inner());
            index.search(query, allowed.as_ref(), limit)
        };
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ranked.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT * FROM chunks WHERE id IN ({})", placeholders);
        let mut query_builder = sqlx::query_as::<_, Chunk>(&sql);
        for (id, _) in &ranked {
            query_builder = query_builder.bind(id);
        }
        let rows = query_builder.fetch_all(&self.pool).await?;
        let mut by_id: HashMap<i64, Chunk> = rows.into_iter().map(|c| (c.id, c)).collect();

        // A chunk replaced between scoring and fetch is simply dropped.
        let results = ranked
            .into_iter()
            .filter_map(|(id, score)| by_id.remove(&id).map(|chunk| ScoredChunk { chunk, score }))
            .collect();
        Ok(results)
    }

    /// Store-wide counters
    pub async fn stats(&self) -> Result<StoreStats> {
        let (documents,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let (chunks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let indexed_terms = self
            .index
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .term_count();
        Ok(StoreStats {
            documents,
            chunks,
            indexed_terms,
        })
    }
}
