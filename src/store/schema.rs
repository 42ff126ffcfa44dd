//! SQLite schema definition

/// SQL schema for the chunk store
pub const SCHEMA_SQL: &str = r#"
-- Documents: one row per ingested book
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    word_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Chunks: the three parallel tier chunkings of each document
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id),
    tier TEXT NOT NULL,
    chapter_number INTEGER,
    section_number INTEGER,
    sequence_index INTEGER NOT NULL,
    content TEXT NOT NULL CHECK (length(content) > 0),
    word_count INTEGER NOT NULL,
    char_count INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(document_id, tier, sequence_index)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
CREATE INDEX IF NOT EXISTS idx_chunks_order
    ON chunks(document_id, tier, chapter_number, section_number, sequence_index);
CREATE INDEX IF NOT EXISTS idx_documents_title ON documents(title);
"#;
