//! Fixed-size text chunking for simulated streams.

/// Chunk size used by the query endpoint.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Split `text` into consecutive chunks of `size` characters.
///
/// Lengths are counted in `char`s so a chunk never cuts a code point in half.
/// The last chunk may be shorter; an empty input yields no chunks.
///
/// # Panics
///
/// Panics if `size` is zero.
pub fn split(text: &str, size: usize) -> Vec<String> {
    assert!(size > 0, "chunk size must be positive");

    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(text[start..].to_string());
    }

    chunks
}
