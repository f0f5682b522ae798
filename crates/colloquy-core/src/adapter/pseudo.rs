//! Pseudo-streaming: segment a full generation into paced word chunks.
//!
//! Backends without native streaming call `generate` once and replay the
//! text through this module so the caller sees the same chunk cadence as a
//! native stream: zero or more text deltas, then one terminal chunk with
//! usage totals. The inter-chunk delay keeps delivery backpressure-friendly
//! instead of dumping the whole response in one burst.

use std::time::Duration;

use colloquy_types::adapter::{AdapterChunk, AdapterResponse};

use super::contract::ChunkStream;

/// Split `text` into chunks of `width` whitespace-separated words.
///
/// Every chunk except the last carries a trailing space so that the
/// concatenation of all chunks reads like the original text:
/// `"alpha beta gamma delta"` at width 3 yields
/// `["alpha beta gamma ", "delta"]`.
pub fn segment_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    let total = words.len().div_ceil(width);
    let mut chunks = Vec::with_capacity(total);

    for (i, group) in words.chunks(width).enumerate() {
        let mut chunk = group.join(" ");
        if i + 1 < total {
            chunk.push(' ');
        }
        chunks.push(chunk);
    }
    chunks
}

/// Replay a full response as a paced chunk stream.
///
/// Emits one delta per word group with `delay` between consecutive deltas,
/// then a terminal chunk carrying the response usage.
pub fn pseudo_stream(response: AdapterResponse, chunk_words: usize, delay: Duration) -> ChunkStream {
    let segments = segment_words(&response.content, chunk_words);
    let usage = response.usage;

    Box::pin(async_stream::stream! {
        for (i, segment) in segments.into_iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            yield Ok(AdapterChunk::delta(segment));
        }
        yield Ok(AdapterChunk::terminal(Some(usage)));
    })
}
