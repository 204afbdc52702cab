use ktest_types::TextEdit;

/// Apply edits to `src` in start order.
///
/// An edit that starts inside a region already replaced by an earlier edit is dropped.
/// Edits are stably sorted by start offset first, so callers may pass them in any order.
pub fn apply_text_edits(src: &[u8], edits: &[TextEdit]) -> Vec<u8> {
    if edits.is_empty() {
        return src.to_vec();
    }
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.start);

    let mut out = Vec::with_capacity(src.len());
    let mut offset = 0;
    for edit in sorted {
        let start = edit.start.min(src.len());
        let end = edit.end.clamp(start, src.len());
        if start < offset {
            offset = offset.max(end);
            continue;
        }
        out.extend_from_slice(&src[offset..start]);
        out.extend_from_slice(edit.replacement.as_bytes());
        offset = end;
    }
    out.extend_from_slice(&src[offset..]);
    out
}
