//! Paragraph-boundary text chunker with overlap.
//!
//! Splits the normalized corpus into [`Chunk`]s of at most `chunk_size`
//! characters. Splitting occurs on paragraph boundaries (`\n\n`) so a chunk
//! only ends mid-paragraph when a single paragraph is longer than the chunk
//! size; such a paragraph is first cut at its last whitespace that fits.
//!
//! Consecutive chunks share whole trailing paragraphs of the previous chunk,
//! up to `overlap` characters, so a passage cut at a boundary still appears
//! with some of its surrounding context.
//!
//! Every chunk's text is a verbatim slice of the corpus; `char_start` and
//! `char_len` locate it. Lengths are counted in chars, not bytes.

use crate::config::ChunkingConfig;
use crate::models::Chunk;
use crate::normalize::PARAGRAPH_SEPARATOR;

/// A contiguous, trimmed span of the corpus that is never split further.
#[derive(Debug, Clone, Copy)]
struct Piece {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    char_end: usize,
}

/// Converts increasing byte offsets into char offsets without rescanning.
struct CharCursor<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    fn advance_to(&mut self, byte: usize) -> usize {
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

/// Split `corpus` into overlapping chunks. Returns chunks with contiguous
/// indices starting at 0; a blank corpus yields no chunks.
pub fn chunk_corpus(corpus: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let max_chars = config.chunk_size.max(1);
    let pieces = split_pieces(corpus, max_chars);

    let mut chunks = Vec::new();
    let mut lo = 0usize;

    for (i, piece) in pieces.iter().enumerate() {
        // The open window is pieces[lo..i].
        if lo < i && piece.char_end - pieces[lo].char_start > max_chars {
            chunks.push(make_chunk(corpus, chunks.len(), &pieces[lo..i]));

            // Keep a tail of the emitted chunk as overlap, as long as the
            // next piece still fits behind it.
            while lo < i
                && (pieces[i - 1].char_end - pieces[lo].char_start > config.overlap
                    || piece.char_end - pieces[lo].char_start > max_chars)
            {
                lo += 1;
            }
        }
    }

    if lo < pieces.len() {
        chunks.push(make_chunk(corpus, chunks.len(), &pieces[lo..]));
    }

    chunks
}

fn split_pieces(corpus: &str, max_chars: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut cursor = CharCursor::new(corpus);
    let mut offset = 0usize;

    for para in corpus.split(PARAGRAPH_SEPARATOR) {
        let start = offset + (para.len() - para.trim_start().len());
        let end = offset + para.trim_end().len();
        offset += para.len() + PARAGRAPH_SEPARATOR.len();

        if start >= end {
            continue;
        }

        let char_start = cursor.advance_to(start);
        let char_end = cursor.advance_to(end);

        if char_end - char_start <= max_chars {
            pieces.push(Piece {
                byte_start: start,
                byte_end: end,
                char_start,
                char_end,
            });
        } else {
            split_oversized(corpus, start, end, char_start, max_chars, &mut pieces);
        }
    }

    pieces
}

/// Hard-split a paragraph longer than `max_chars`, preferring whitespace.
fn split_oversized(
    corpus: &str,
    start: usize,
    end: usize,
    char_start: usize,
    max_chars: usize,
    pieces: &mut Vec<Piece>,
) {
    let mut byte_pos = start;
    let mut char_pos = char_start;

    while byte_pos < end {
        let rest = &corpus[byte_pos..end];

        let limit = match rest.char_indices().nth(max_chars) {
            Some((limit, _)) => limit,
            None => {
                pieces.push(Piece {
                    byte_start: byte_pos,
                    byte_end: end,
                    char_start: char_pos,
                    char_end: char_pos + rest.chars().count(),
                });
                break;
            }
        };

        let window = &rest[..limit];
        let (piece_end, next_start) = window
            .char_indices()
            .rev()
            .find(|&(i, c)| i > 0 && c.is_whitespace())
            .map(|(i, c)| (window[..i].trim_end().len(), i + c.len_utf8()))
            .unwrap_or((limit, limit));

        pieces.push(Piece {
            byte_start: byte_pos,
            byte_end: byte_pos + piece_end,
            char_start: char_pos,
            char_end: char_pos + rest[..piece_end].chars().count(),
        });

        let tail = &rest[next_start..];
        let advance = next_start + (tail.len() - tail.trim_start().len());
        char_pos += rest[..advance].chars().count();
        byte_pos += advance;
    }
}

fn make_chunk(corpus: &str, index: usize, window: &[Piece]) -> Chunk {
    let first = window[0];
    let last = window[window.len() - 1];
    Chunk {
        index,
        text: corpus[first.byte_start..last.byte_end].to_string(),
        char_start: first.char_start,
        char_len: last.char_end - first.char_start,
    }
}
