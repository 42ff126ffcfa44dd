//! Configuration management for bindery
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::ChunkTier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Batch ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum trailing words duplicated onto the next same-tier chunk
    #[serde(default = "default_overlap_window")]
    pub overlap_window: usize,

    /// Minimum words per chapter-tier chunk
    #[serde(default = "default_chapter_min_words")]
    pub chapter_min_words: usize,

    /// Maximum words per chapter-tier chunk
    #[serde(default = "default_chapter_max_words")]
    pub chapter_max_words: usize,

    /// Minimum words per section-tier chunk
    #[serde(default = "default_section_min_words")]
    pub section_min_words: usize,

    /// Maximum words per section-tier chunk
    #[serde(default = "default_section_max_words")]
    pub section_max_words: usize,

    /// Minimum words per paragraph-tier chunk
    #[serde(default = "default_paragraph_min_words")]
    pub paragraph_min_words: usize,

    /// Maximum words per paragraph-tier chunk
    #[serde(default = "default_paragraph_max_words")]
    pub paragraph_max_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            overlap_window: default_overlap_window(),
            chapter_min_words: default_chapter_min_words(),
            chapter_max_words: default_chapter_max_words(),
            section_min_words: default_section_min_words(),
            section_max_words: default_section_max_words(),
            paragraph_min_words: default_paragraph_min_words(),
            paragraph_max_words: default_paragraph_max_words(),
        }
    }
}

impl ChunkConfig {
    /// Word bounds `(min, max)` for a tier
    pub fn bounds(&self, tier: ChunkTier) -> (usize, usize) {
        match tier {
            ChunkTier::Chapter => (self.chapter_min_words, self.chapter_max_words),
            ChunkTier::Section => (self.section_min_words, self.section_max_words),
            ChunkTier::Paragraph => (self.paragraph_min_words, self.paragraph_max_words),
        }
    }
}

/// Batch ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Documents processed concurrently
    #[serde(default = "default_ingest_concurrency")]
    pub concurrency: usize,

    /// Per-document timeout in seconds (0 disables)
    #[serde(default = "default_ingest_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_ingest_concurrency(),
            timeout_secs: default_ingest_timeout_secs(),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Top chunks considered by fusion search
    #[serde(default = "default_fusion_limit")]
    pub fusion_limit: usize,

    /// Characters kept per fusion passage preview
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Seed for the reproducible quote sampler
    #[serde(default = "default_quote_seed")]
    pub quote_seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fusion_limit: default_fusion_limit(),
            preview_chars: default_preview_chars(),
            quote_seed: default_quote_seed(),
        }
    }
}

impl Config {
    /// Default base directory for bindery data
    pub fn default_base_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bindery")
    }

    /// Default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Default SQLite database path
    pub fn default_db_path() -> PathBuf {
        Self::default_base_dir().join("bindery.db")
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for tier in [ChunkTier::Chapter, ChunkTier::Section, ChunkTier::Paragraph] {
            let (min, max) = self.chunk.bounds(tier);
            if min == 0 || min >= max {
                return Err(Error::Config(format!(
                    "Invalid word bounds for {} tier: min={} max={}",
                    tier, min, max
                )));
            }
        }
        if self.ingest.concurrency == 0 {
            return Err(Error::Config(
                "ingest.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
