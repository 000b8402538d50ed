//! Recursive-separator text chunker.
//!
//! Splits normalized statute text into passages of at most `chunk_size`
//! characters, preferring the coarsest separator (paragraph break, line
//! break, space, character) that keeps pieces under the limit, and
//! overlapping the tail of each passage with the head of the next by up
//! to `chunk_overlap` characters.
//!
//! Output is fully deterministic for identical input and parameters.
//! Chunk positions are identity components downstream (the vector ID
//! embeds the chunk index), so boundaries must never depend on anything
//! but the text and the two size parameters.
//!
//! Sizes are counted in Unicode scalar values, not bytes — the corpus is
//! Korean and byte counting would cut usable chunk capacity to a third.

/// Separator ladder from coarsest to finest. The empty separator is the
/// last resort: split between characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split `text` into ordered, overlapping passages.
///
/// Empty input yields an empty vector. Input at or under `chunk_size`
/// yields exactly one chunk. Whitespace-only fragments are dropped.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    split_recursive(text, &SEPARATORS, chunk_size, chunk_overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    // Pick the coarsest separator that actually occurs in this text;
    // fall through to "" (per-character) when none do.
    let mut sep_idx = separators.len() - 1;
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            sep_idx = i;
            break;
        }
    }
    let separator = separators[sep_idx];
    let remaining = &separators[sep_idx + 1..];

    let splits = split_on(text, separator);

    let mut chunks: Vec<String> = Vec::new();
    let mut good: Vec<String> = Vec::new();

    for piece in splits {
        if char_len(&piece) < chunk_size {
            good.push(piece);
            continue;
        }

        // Oversized piece: flush what we have, then recurse with finer
        // separators (or emit as-is when none are left).
        if !good.is_empty() {
            chunks.extend(merge_splits(&good, separator, chunk_size, chunk_overlap));
            good.clear();
        }
        if remaining.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, remaining, chunk_size, chunk_overlap));
        }
    }

    if !good.is_empty() {
        chunks.extend(merge_splits(&good, separator, chunk_size, chunk_overlap));
    }

    chunks
}

fn split_on(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }
    text.split(separator)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Greedily merge small splits into chunks up to `chunk_size`, carrying
/// a tail of up to `chunk_overlap` characters into the next chunk.
fn merge_splits(
    splits: &[String],
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    let sep_len = char_len(separator);

    let mut chunks: Vec<String> = Vec::new();
    let mut window: std::collections::VecDeque<&String> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for piece in splits {
        let piece_len = char_len(piece);

        if total + piece_len + if window.is_empty() { 0 } else { sep_len } > chunk_size
            && !window.is_empty()
        {
            push_chunk(&mut chunks, &window, separator);

            // Shrink the window until it fits the overlap budget and the
            // incoming piece fits next to it.
            while total > chunk_overlap
                || (total + piece_len + if window.is_empty() { 0 } else { sep_len } > chunk_size
                    && total > 0)
            {
                let front = window.pop_front().expect("non-empty window");
                total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
            }
        }

        if !window.is_empty() {
            total += sep_len;
        }
        total += piece_len;
        window.push_back(piece);
    }

    push_chunk(&mut chunks, &window, separator);
    chunks
}

fn push_chunk(
    chunks: &mut Vec<String>,
    window: &std::collections::VecDeque<&String>,
    separator: &str,
) {
    let joined = window
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
