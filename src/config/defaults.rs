//! Default values for configuration

/// Maximum words carried over as an overlap prefix between adjacent chunks
pub fn default_overlap_window() -> usize {
    50
}

/// Minimum words in a chapter-tier chunk
pub fn default_chapter_min_words() -> usize {
    2000
}

/// Maximum words in a chapter-tier chunk
pub fn default_chapter_max_words() -> usize {
    5000
}

/// Minimum words in a section-tier chunk
pub fn default_section_min_words() -> usize {
    500
}

/// Maximum words in a section-tier chunk
pub fn default_section_max_words() -> usize {
    1500
}

/// Minimum words in a paragraph-tier chunk
pub fn default_paragraph_min_words() -> usize {
    50
}

/// Maximum words in a paragraph-tier chunk
pub fn default_paragraph_max_words() -> usize {
    200
}

/// Default number of documents chunked and stored concurrently
pub fn default_ingest_concurrency() -> usize {
    4
}

/// Default per-document ingestion timeout in seconds (0 disables)
pub fn default_ingest_timeout_secs() -> u64 {
    0
}

/// Number of top chunks considered by fusion search
pub fn default_fusion_limit() -> usize {
    15
}

/// Characters kept in a fusion passage preview
pub fn default_preview_chars() -> usize {
    300
}

/// Seed for the reproducible quote sampler
pub fn default_quote_seed() -> u64 {
    42
}
