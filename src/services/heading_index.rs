//! Default heading index.
//!
//! Hosts with their own markdown metadata cache hand block positions straight
//! to [`parse_sections`](super::sections::parse_sections). This scanner is the
//! stand-in used when no such cache exists: it reports ATX headings and
//! callout blocks, skipping fenced code.

use crate::models::BlockSpan;
use crate::services::sections::{is_callout_header, is_heading_line, CALLOUT_PREFIX};

/// Locate heading lines and callout blocks in `text`.
///
/// A callout block is the callout header line plus every directly following
/// line that starts with the quote marker.
pub fn scan_blocks(text: &str) -> Vec<BlockSpan> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut blocks = Vec::new();
    let mut in_fence = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.starts_with("```") || line.starts_with("~~~") {
            in_fence = !in_fence;
            i += 1;
            continue;
        }
        if in_fence {
            i += 1;
            continue;
        }

        if is_callout_header(line) {
            let start = i;
            while i + 1 < lines.len() && lines[i + 1].trim_start().starts_with(CALLOUT_PREFIX) {
                i += 1;
            }
            blocks.push(BlockSpan::callout(start, i));
        } else if is_heading_line(line) {
            blocks.push(BlockSpan::heading(i));
        }

        i += 1;
    }

    blocks
}
