//! Core data model: documents, chunks, tiers, and ingestion input records

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Document processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Chunked,
    Indexed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Chunked => write!(f, "chunked"),
            DocumentStatus::Indexed => write!(f, "indexed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DocumentStatus::Pending),
            "chunked" => Ok(DocumentStatus::Chunked),
            "indexed" => Ok(DocumentStatus::Indexed),
            "failed" => Ok(DocumentStatus::Failed),
            _ => Err(Error::Config(format!("Unknown document status: {}", s))),
        }
    }
}

/// Chunk granularity tier
///
/// The three tiers are parallel chunkings of the same paragraph stream,
/// never a nested tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkTier {
    Chapter,
    Section,
    Paragraph,
}

impl ChunkTier {
    /// All tiers, coarsest first
    pub const ALL: [ChunkTier; 3] = [ChunkTier::Chapter, ChunkTier::Section, ChunkTier::Paragraph];
}

impl std::fmt::Display for ChunkTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkTier::Chapter => write!(f, "chapter"),
            ChunkTier::Section => write!(f, "section"),
            ChunkTier::Paragraph => write!(f, "paragraph"),
        }
    }
}

impl FromStr for ChunkTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chapter" => Ok(ChunkTier::Chapter),
            "section" => Ok(ChunkTier::Section),
            "paragraph" => Ok(ChunkTier::Paragraph),
            _ => Err(Error::Config(format!("Unknown chunk tier: {}", s))),
        }
    }
}

/// A stored document
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub word_count: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    pub fn get_status(&self) -> Result<DocumentStatus> {
        self.status.parse()
    }

    pub fn to_ref(&self) -> DocumentRef {
        DocumentRef {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
        }
    }
}

/// Minimal document identity, used in ambiguity candidate lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: i64,
    pub title: String,
    pub author: String,
}

/// A stored chunk
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub tier: String,
    pub chapter_number: Option<i64>,
    pub section_number: Option<i64>,
    pub sequence_index: i64,
    pub content: String,
    pub word_count: i64,
    pub char_count: i64,
    pub content_hash: String,
    pub created_at: String,
}

impl Chunk {
    pub fn get_tier(&self) -> Result<ChunkTier> {
        self.tier.parse()
    }
}

/// A chunk produced by the chunker, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub tier: ChunkTier,
    pub chapter_number: Option<i64>,
    pub section_number: Option<i64>,
    pub sequence_index: i64,
    pub content: String,
    pub word_count: usize,
    pub char_count: usize,
    pub content_hash: String,
}

impl ChunkDraft {
    /// Blake3 hash of chunk content, stable across re-ingestion
    pub fn compute_hash(content: &str) -> String {
        blake3::hash(content.as_bytes()).to_hex().to_string()
    }
}

/// One paragraph of ingestion input, as produced by the extraction collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphRecord {
    pub chapter_number: Option<i64>,
    pub section_number: Option<i64>,
    pub text: String,
}

impl ParagraphRecord {
    pub fn new(
        chapter_number: Option<i64>,
        section_number: Option<i64>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chapter_number,
            section_number,
            text: text.into(),
        }
    }
}

/// A document identity plus its ordered paragraph stream, ready to ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub title: String,
    pub author: String,
    pub paragraphs: Vec<ParagraphRecord>,
}

/// Current RFC 3339 timestamp, the storage format for all time columns
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
