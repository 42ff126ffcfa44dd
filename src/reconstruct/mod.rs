//! Reconstruction of derived views from stored chunks
//!
//! All views start from the chapter-tier (or best available tier) chunk
//! sequence in storage order, with overlap prefixes removed by
//! longest-decreasing-window matching. A window that never matches is not
//! an error; the text keeps its residual duplication rather than risking
//! an incorrect truncation.

use crate::chunk::last_words;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Chunk, ChunkTier};
use crate::store::ChunkStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Derived output views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Full,
    Summary,
    Outline,
    Quotes,
}

/// A reconstructed view of one document
#[derive(Debug, Clone, Serialize)]
pub struct Reconstruction {
    pub view: View,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// Reassembles a document's chunks into derived views
pub struct Reconstructor<'a> {
    store: &'a ChunkStore,
    overlap_window: usize,
    quote_seed: u64,
}

impl<'a> Reconstructor<'a> {
    pub fn new(store: &'a ChunkStore, config: &Config) -> Self {
        Self {
            store,
            overlap_window: config.chunk.overlap_window,
            quote_seed: config.search.quote_seed,
        }
    }

    /// Build the requested view for a document id
    pub async fn reconstruct(&self, document_id: i64, view: View) -> Result<Reconstruction> {
        let chunks = self.best_tier_chunks(document_id).await?;
        let deduped = remove_overlap(
            &chunks.iter().map(|c| c.content.clone()).collect::<Vec<_>>(),
            self.overlap_window,
        );

        match view {
            View::Full => Ok(self.full_view(&chunks, &deduped)),
            View::Summary => Ok(self.summary_view(&chunks, &deduped)),
            View::Outline => Ok(self.outline_view(&chunks, &deduped)),
            View::Quotes => self.quotes_view(document_id, &chunks).await,
        }
    }

    /// Resolve a free-text identifier, then build the view
    pub async fn reconstruct_by_name(&self, name: &str, view: View) -> Result<Reconstruction> {
        let doc = self.store.resolve(name).await?;
        self.reconstruct(doc.id, view).await
    }

    /// Chapter-tier chunks, falling back to finer tiers for documents that
    /// never produced coarser ones
    async fn best_tier_chunks(&self, document_id: i64) -> Result<Vec<Chunk>> {
        for tier in ChunkTier::ALL {
            let chunks = self.store.get_chunks(document_id, Some(tier)).await?;
            if !chunks.is_empty() {
                return Ok(chunks);
            }
        }
        Err(Error::NotFound(format!(
            "no chunks for document id {}",
            document_id
        )))
    }

    fn full_view(&self, chunks: &[Chunk], deduped: &[String]) -> Reconstruction {
        let mut parts: Vec<String> = Vec::with_capacity(deduped.len() * 2);
        let mut last_chapter: Option<i64> = None;

        for (chunk, text) in chunks.iter().zip(deduped) {
            if chunk.chapter_number != last_chapter {
                if let Some(n) = chunk.chapter_number {
                    parts.push(format!("--- Chapter {} ---", n));
                }
                last_chapter = chunk.chapter_number;
            }
            parts.push(text.clone());
        }

        let chapters: std::collections::BTreeSet<i64> =
            chunks.iter().filter_map(|c| c.chapter_number).collect();
        let word_count: i64 = chunks.iter().map(|c| c.word_count).sum();

        Reconstruction {
            view: View::Full,
            content: parts.join("\n\n"),
            metadata: json!({
                "word_count": word_count,
                "chapter_count": chapters.len(),
                "chunks": chunks.len(),
            }),
        }
    }

    fn summary_view(&self, chunks: &[Chunk], deduped: &[String]) -> Reconstruction {
        // Largest chunks first; that order, not document order, is the
        // summary order.
        let mut by_size: Vec<(&Chunk, &String)> = chunks.iter().zip(deduped).collect();
        by_size.sort_by(|a, b| b.0.word_count.cmp(&a.0.word_count).then(a.0.id.cmp(&b.0.id)));
        by_size.truncate(10);

        let mut insights: Vec<String> = Vec::with_capacity(by_size.len());
        for (i, (_, text)) in by_size.iter().enumerate() {
            if let Some(paragraph) = key_paragraph(text) {
                insights.push(format!(
                    "Key Insight {}: {}",
                    i + 1,
                    truncate_chars(paragraph, 300)
                ));
            }
        }

        Reconstruction {
            view: View::Summary,
            content: insights.join("\n\n"),
            metadata: json!({ "source_chunks": by_size.len() }),
        }
    }

    fn outline_view(&self, chunks: &[Chunk], deduped: &[String]) -> Reconstruction {
        let mut first_of_chapter: BTreeMap<i64, &str> = BTreeMap::new();
        for (chunk, text) in chunks.iter().zip(deduped) {
            if let Some(n) = chunk.chapter_number {
                first_of_chapter.entry(n).or_insert(text.as_str());
            }
        }

        let lines: Vec<String> = first_of_chapter
            .iter()
            .map(|(n, text)| {
                let first_line = text.lines().next().unwrap_or("").trim();
                format!("{}. {}", n, truncate_chars(first_line, 100))
            })
            .collect();

        Reconstruction {
            view: View::Outline,
            content: lines.join("\n"),
            metadata: json!({ "chapter_count": first_of_chapter.len() }),
        }
    }

    /// Quotable excerpts, sampled reproducibly from the given seed
    ///
    /// Quote-sized chunks only exist at the paragraph tier, so that tier is
    /// preferred when the document has one.
    async fn quotes_view(&self, document_id: i64, fallback: &[Chunk]) -> Result<Reconstruction> {
        let paragraph_chunks = self
            .store
            .get_chunks(document_id, Some(ChunkTier::Paragraph))
            .await?;
        let pool: &[Chunk] = if paragraph_chunks.is_empty() {
            fallback
        } else {
            &paragraph_chunks
        };

        let eligible: Vec<&Chunk> = pool
            .iter()
            .filter(|c| (100..=500).contains(&c.char_count))
            .collect();

        let mut rng = StdRng::seed_from_u64(self.quote_seed);
        let sampled: Vec<&Chunk> = eligible
            .choose_multiple(&mut rng, 20)
            .copied()
            .collect();

        let mut quotes: Vec<String> = Vec::new();
        'outer: for chunk in &sampled {
            for sentence in split_sentences(&chunk.content) {
                let len = sentence.chars().count();
                if (50..=200).contains(&len) {
                    quotes.push(format!("\"{}\"", sentence));
                    if quotes.len() >= 10 {
                        break 'outer;
                    }
                }
            }
        }

        debug!(
            document_id,
            sampled = sampled.len(),
            quotes = quotes.len(),
            "built quotes view"
        );

        Ok(Reconstruction {
            view: View::Quotes,
            content: quotes.join("\n\n"),
            metadata: json!({
                "quote_count": quotes.len(),
                "sampled_chunks": sampled.len(),
            }),
        })
    }
}

/// Remove the overlap prefix from each chunk after the first
///
/// For chunk `i`, windows from `window` down to 1 are compared against the
/// trailing words of the already-deduplicated chunk `i-1`; the first match
/// is stripped. No match leaves the chunk unmodified.
pub fn remove_overlap(contents: &[String], window: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(contents.len());

    for content in contents {
        let stripped = match out.last() {
            None => content.clone(),
            Some(prev) => {
                let prev_words = last_words(prev, window);
                let head: Vec<&str> = content.split_whitespace().take(window).collect();
                let max = window.min(prev_words.len()).min(head.len());

                let mut matched = 0;
                for w in (1..=max).rev() {
                    if head[..w] == prev_words[prev_words.len() - w..] {
                        matched = w;
                        break;
                    }
                }

                if matched == 0 {
                    debug!("no overlap window matched; keeping residual duplication");
                    content.clone()
                } else {
                    strip_leading_words(content, matched).to_string()
                }
            }
        };
        out.push(stripped);
    }

    out
}

/// Slice off the first `n` whitespace-separated words, preserving all
/// formatting after them
pub fn strip_leading_words(content: &str, n: usize) -> &str {
    let mut rest = content;
    for _ in 0..n {
        rest = rest.trim_start();
        match rest.find(char::is_whitespace) {
            Some(i) => rest = &rest[i..],
            None => return "",
        }
    }
    rest.trim_start()
}

/// First paragraph longer than 100 characters, or the first paragraph
fn key_paragraph(text: &str) -> Option<&str> {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    paragraphs
        .iter()
        .find(|p| p.chars().count() > 100)
        .or_else(|| paragraphs.first())
        .copied()
}

/// Char-safe prefix truncation
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Split on sentence-terminal punctuation, keeping the terminator
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_document, chunk_tier, count_words};
    use crate::config::ChunkConfig;
    use crate::models::ParagraphRecord;
    use crate::store::ChunkStore;

    fn para(chapter: i64, index: usize, words: usize) -> ParagraphRecord {
        let text: Vec<String> = (0..words)
            .map(|w| format!("c{}p{}w{}", chapter, index, w))
            .collect();
        ParagraphRecord::new(Some(chapter), None, text.join(" "))
    }

    fn three_chapter_stream() -> Vec<ParagraphRecord> {
        let mut paras = Vec::new();
        for chapter in 1..=3 {
            for p in 0..15 {
                paras.push(para(chapter, p, 200));
            }
        }
        paras
    }

    async fn seeded_store() -> (tempfile::TempDir, ChunkStore, i64) {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(&dir.path().join("test.db")).await.unwrap();
        let paras = three_chapter_stream();
        let words: usize = paras.iter().map(|p| count_words(&p.text)).sum();
        let doc = store
            .create_document("Alpha", "Tester", words as i64)
            .await
            .unwrap();
        let drafts = chunk_document(&paras, &ChunkConfig::default());
        store.put(doc.id, &drafts).await.unwrap();
        (dir, store, doc.id)
    }

    #[test]
    fn test_strip_leading_words() {
        assert_eq!(strip_leading_words("one two three", 2), "three");
        assert_eq!(strip_leading_words("one two\n\nthree", 2), "three");
        assert_eq!(strip_leading_words("one two", 5), "");
        assert_eq!(strip_leading_words("word", 0), "word");
    }

    #[test]
    fn test_overlap_removal_round_trip() {
        let config = ChunkConfig::default();
        let paras = three_chapter_stream();
        let chunks = chunk_tier(&paras, crate::models::ChunkTier::Chapter, &config);
        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        let deduped = remove_overlap(&contents, config.overlap_window);
        let rebuilt = deduped.join("\n\n");
        let original = paras
            .iter()
            .map(|p| p.text.clone())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_overlap_removal_is_idempotent() {
        let config = ChunkConfig::default();
        let chunks = chunk_tier(
            &three_chapter_stream(),
            crate::models::ChunkTier::Chapter,
            &config,
        );
        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        let once = remove_overlap(&contents, config.overlap_window);
        let twice = remove_overlap(&once, config.overlap_window);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_match_degrades_gracefully() {
        let contents = vec![
            "alpha beta gamma".to_string(),
            "delta epsilon zeta".to_string(),
        ];
        let deduped = remove_overlap(&contents, 50);
        assert_eq!(deduped, contents);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second one! Third? trailing bit");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third?", "trailing bit"]
        );
    }

    #[tokio::test]
    async fn test_full_view() {
        let (_dir, store, doc_id) = seeded_store().await;
        let config = Config::default();
        let recon = Reconstructor::new(&store, &config);

        let result = recon.reconstruct(doc_id, View::Full).await.unwrap();
        for n in 1..=3 {
            assert!(result.content.contains(&format!("--- Chapter {} ---", n)));
        }
        assert_eq!(result.metadata["chapter_count"], 3);

        // The deduplicated text carries each word exactly once.
        assert_eq!(result.content.matches("c2p0w0").count(), 1);
        assert_eq!(result.content.matches("c1p14w199").count(), 1);
    }

    #[tokio::test]
    async fn test_summary_view_orders_by_size() {
        let (_dir, store, doc_id) = seeded_store().await;
        let config = Config::default();
        let recon = Reconstructor::new(&store, &config);

        let result = recon.reconstruct(doc_id, View::Summary).await.unwrap();
        assert!(result.content.starts_with("Key Insight 1:"));
        assert_eq!(result.metadata["source_chunks"], 3);

        // Chapters 2 and 3 carry the 50-word overlap prefix, so chapter 1
        // (3000 words) is the smallest and must come last.
        let first = result.content.find("Key Insight 1:").unwrap();
        let insight_1 = &result.content[first..result.content.find("Key Insight 2:").unwrap()];
        assert!(!insight_1.contains("c1p"));
    }

    #[tokio::test]
    async fn test_outline_view() {
        let (_dir, store, doc_id) = seeded_store().await;
        let config = Config::default();
        let recon = Reconstructor::new(&store, &config);

        let result = recon.reconstruct(doc_id, View::Outline).await.unwrap();
        let lines: Vec<&str> = result.content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1. "));
        assert!(lines[2].starts_with("3. "));
        // First line of each chapter, truncated to 100 chars
        assert!(lines[0].chars().count() <= 103);
    }

    #[tokio::test]
    async fn test_quotes_view_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(&dir.path().join("test.db")).await.unwrap();
        // Quote-sized paragraph-tier chunks, stored directly.
        let drafts: Vec<crate::models::ChunkDraft> = (0..30)
            .map(|i| {
                let content = format!(
                    "Fragment {} begins with a measured cadence that settles in. \
                     It continues until the thought completes itself in a second \
                     sentence of similar length. A short close follows here.",
                    i
                );
                crate::models::ChunkDraft {
                    tier: crate::models::ChunkTier::Paragraph,
                    chapter_number: Some(1),
                    section_number: None,
                    sequence_index: i,
                    word_count: count_words(&content),
                    char_count: content.chars().count(),
                    content_hash: crate::models::ChunkDraft::compute_hash(&content),
                    content,
                }
            })
            .collect();
        let doc = store.create_document("Quotable", "Tester", 0).await.unwrap();
        store.put(doc.id, &drafts).await.unwrap();

        let config = Config::default();
        let recon = Reconstructor::new(&store, &config);
        let a = recon.reconstruct(doc.id, View::Quotes).await.unwrap();
        let b = recon.reconstruct(doc.id, View::Quotes).await.unwrap();

        assert_eq!(a.content, b.content);
        assert!(a.metadata["quote_count"].as_u64().unwrap() <= 10);
        for line in a.content.split("\n\n").filter(|l| !l.is_empty()) {
            assert!(line.starts_with('"') && line.ends_with('"'));
            let inner = line.chars().count() - 2;
            assert!((50..=200).contains(&inner));
        }
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(&dir.path().join("test.db")).await.unwrap();
        let config = Config::default();
        let recon = Reconstructor::new(&store, &config);

        assert!(matches!(
            recon.reconstruct(999, View::Full).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
