//! Three-tier greedy text chunking
//!
//! Each tier (chapter, section, paragraph) is an independent pass over the
//! same ordered paragraph stream, producing size-bounded chunks that carry
//! an overlap prefix copied from the trailing words of the previous chunk
//! of the same tier. The three outputs are sibling collections, not a
//! nested split.

use crate::config::ChunkConfig;
use crate::models::{ChunkDraft, ChunkTier, ParagraphRecord};
use tracing::debug;

/// Count whitespace-separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Last `n` whitespace-separated words of `text`, in document order
pub fn last_words(text: &str, n: usize) -> Vec<&str> {
    let mut words: Vec<&str> = text.split_whitespace().rev().take(n).collect();
    words.reverse();
    words
}

/// Working buffer for one in-progress chunk
struct Buffer {
    paras: Vec<String>,
    words: usize,
    // Ordering keys of the first accumulated paragraph; the chunk inherits these.
    first_chapter: Option<i64>,
    first_section: Option<i64>,
    // Keys of the most recently accumulated paragraph, for boundary detection.
    cur_chapter: Option<i64>,
    cur_section: Option<i64>,
}

impl Buffer {
    fn start(para: &ParagraphRecord, words: usize) -> Self {
        Self {
            paras: vec![para.text.clone()],
            words,
            first_chapter: para.chapter_number,
            first_section: para.section_number,
            cur_chapter: para.chapter_number,
            cur_section: para.section_number,
        }
    }

    fn push(&mut self, para: &ParagraphRecord, words: usize) {
        self.paras.push(para.text.clone());
        self.words += words;
        self.cur_chapter = para.chapter_number;
        self.cur_section = para.section_number;
    }

    fn boundary(&self, tier: ChunkTier, para: &ParagraphRecord) -> bool {
        match tier {
            ChunkTier::Chapter => para.chapter_number != self.cur_chapter,
            ChunkTier::Section | ChunkTier::Paragraph => {
                para.chapter_number != self.cur_chapter
                    || para.section_number != self.cur_section
            }
        }
    }
}

/// Chunk a paragraph stream at every tier
///
/// Returns the concatenation of the three per-tier chunkings; callers that
/// need a single tier use [`chunk_tier`].
pub fn chunk_document(paragraphs: &[ParagraphRecord], config: &ChunkConfig) -> Vec<ChunkDraft> {
    let mut drafts = Vec::new();
    for tier in ChunkTier::ALL {
        drafts.extend(chunk_tier(paragraphs, tier, config));
    }
    drafts
}

/// Chunk a paragraph stream at one tier
pub fn chunk_tier(
    paragraphs: &[ParagraphRecord],
    tier: ChunkTier,
    config: &ChunkConfig,
) -> Vec<ChunkDraft> {
    let (min_words, max_words) = config.bounds(tier);
    let mut chunks: Vec<ChunkDraft> = Vec::new();
    let mut buf: Option<Buffer> = None;

    for para in paragraphs {
        let words = count_words(&para.text);
        if words == 0 {
            continue;
        }

        // Closing only becomes possible once the buffer reaches min_words;
        // then the first of a boundary or a would-overflow closes it.
        let close_now = buf.as_ref().is_some_and(|b| {
            b.words >= min_words && (b.boundary(tier, para) || b.words + words > max_words)
        });
        if close_now {
            if let Some(closed) = buf.take() {
                close_chunk(closed, tier, config.overlap_window, &mut chunks);
            }
        }

        match buf.as_mut() {
            Some(b) => b.push(para, words),
            None => buf = Some(Buffer::start(para, words)),
        }
    }

    if let Some(b) = buf {
        if b.words < min_words && !chunks.is_empty() {
            // Undersized trailing remainder merges backward instead of
            // becoming a chunk below the tier minimum.
            let idx = chunks.len() - 1;
            merge_into_last(b, &mut chunks[idx]);
        } else {
            close_chunk(b, tier, config.overlap_window, &mut chunks);
        }
    }

    debug!(
        tier = %tier,
        chunks = chunks.len(),
        "chunked paragraph stream"
    );

    chunks
}

fn close_chunk(buf: Buffer, tier: ChunkTier, overlap_window: usize, chunks: &mut Vec<ChunkDraft>) {
    let body = buf.paras.join("\n\n");

    // Every chunk after the first carries the previous chunk's trailing
    // words as a prefix, counted into its own word total.
    let (content, word_count) = match chunks.last() {
        Some(prev) => {
            let overlap = last_words(&prev.content, overlap_window);
            let prefix = overlap.join(" ");
            let words = buf.words + overlap.len();
            (format!("{}\n\n{}", prefix, body), words)
        }
        None => (body, buf.words),
    };

    let char_count = content.chars().count();
    let content_hash = ChunkDraft::compute_hash(&content);

    chunks.push(ChunkDraft {
        tier,
        chapter_number: buf.first_chapter,
        section_number: buf.first_section,
        sequence_index: chunks.len() as i64,
        content,
        word_count,
        char_count,
        content_hash,
    });
}

fn merge_into_last(buf: Buffer, last: &mut ChunkDraft) {
    last.content.push_str("\n\n");
    last.content.push_str(&buf.paras.join("\n\n"));
    last.word_count += buf.words;
    last.char_count = last.content.chars().count();
    last.content_hash = ChunkDraft::compute_hash(&last.content);
}
