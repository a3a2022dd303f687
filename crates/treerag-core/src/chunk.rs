//! Line-bounded text chunker with token overlap.
//!
//! Splits a document into [`TextChunk`]s whose token count stays within a
//! `max_tokens` budget. Chunks always end on a line boundary, and each new
//! chunk is seeded with the last `overlap_tokens` tokens of the previous one
//! so that context spanning a boundary is retrievable from either side.
//!
//! # Algorithm
//!
//! 1. Walk the document line by line, tokenizing each line on its own.
//! 2. If the running count plus the line's tokens exceeds `max_tokens` and
//!    the current chunk already holds a line, close the chunk at this line
//!    (`end_line` is exclusive).
//! 3. Seed the next chunk with the decoded overlap tail and the current
//!    line; its count restarts at `overlap + line` tokens. The tail is
//!    shortened to the room the line leaves under `max_tokens`.
//! 4. Otherwise append the line and add its tokens.
//! 5. Flush the last chunk with `end_line` = number of lines.
//!
//! A single line longer than the budget is still placed in a chunk on its
//! own, so a chunk can exceed `max_tokens` by at most one line.
//!
//! # Example
//!
//! ```rust
//! use treerag_core::chunk::chunk_text;
//! use treerag_core::tokenizer::WordTokenizer;
//!
//! let tok = WordTokenizer::new();
//! let chunks = chunk_text(&tok, "A\nB\nC\n", 512, 100).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!((chunks[0].start_line, chunks[0].end_line), (0, 3));
//! ```

use anyhow::Result;

use crate::error::RagError;
use crate::models::TextChunk;
use crate::tokenizer::Tokenizer;

/// Split `text` into line-bounded chunks of at most `max_tokens` tokens.
///
/// Empty input yields no chunks.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] when `max_tokens` is zero or
/// `overlap_tokens >= max_tokens`, and propagates tokenizer failures.
pub fn chunk_text(
    tokenizer: &dyn Tokenizer,
    text: &str,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Result<Vec<TextChunk>> {
    if max_tokens == 0 {
        return Err(RagError::Configuration("max_tokens must be > 0".into()).into());
    }
    if overlap_tokens >= max_tokens {
        return Err(RagError::Configuration(format!(
            "overlap_tokens ({}) must be smaller than max_tokens ({})",
            overlap_tokens, max_tokens
        ))
        .into());
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut count = 0usize;
    let mut start_line = 0i64;
    let mut has_line = false;
    let mut line_count = 0i64;

    for (idx, line) in text.lines().enumerate() {
        let idx = idx as i64;
        line_count = idx + 1;
        let line_tokens = tokenizer.encode(line)?.len();

        if has_line && count + line_tokens > max_tokens {
            let room = overlap_tokens.min(max_tokens.saturating_sub(line_tokens));
            let overlap = overlap_tail(tokenizer, &buf, room)?;
            chunks.push(TextChunk {
                index: chunks.len(),
                start_line,
                end_line: idx,
                text: std::mem::take(&mut buf),
                token_count: count,
            });

            let (overlap_text, overlap_len) = overlap;
            buf.push_str(&overlap_text);
            if !overlap_text.is_empty() && !overlap_text.ends_with('\n') {
                buf.push('\n');
            }
            count = overlap_len;
            start_line = idx;
        }

        buf.push_str(line);
        buf.push('\n');
        count += line_tokens;
        has_line = true;
    }

    if has_line {
        chunks.push(TextChunk {
            index: chunks.len(),
            start_line,
            end_line: line_count,
            text: buf,
            token_count: count,
        });
    }

    Ok(chunks)
}

/// Decode the last `overlap_tokens` tokens of `text`.
///
/// Returns the decoded text and the number of tokens it stands for.
fn overlap_tail(
    tokenizer: &dyn Tokenizer,
    text: &str,
    overlap_tokens: usize,
) -> Result<(String, usize)> {
    if overlap_tokens == 0 {
        return Ok((String::new(), 0));
    }
    let ids = tokenizer.encode(text)?;
    let tail = &ids[ids.len().saturating_sub(overlap_tokens)..];
    Ok((tokenizer.decode(tail)?, tail.len()))
}
