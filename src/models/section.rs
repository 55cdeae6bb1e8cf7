//! Note section model.

use serde::{Deserialize, Serialize};

/// Classification of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    /// Blockquote-style admonition (`> [!note] ...`).
    Callout,
    Other,
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callout => write!(f, "callout"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Inclusive source line range (0-based).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

/// Structural kind of a block reported by the heading index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Callout,
}

/// A block position supplied by the heading index.
///
/// Every block opens a new section whose header is the block's first line.
/// A callout's section also ends at `position.end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpan {
    pub kind: BlockKind,
    pub position: Position,
}

impl BlockSpan {
    pub fn heading(line: usize) -> Self {
        Self {
            kind: BlockKind::Heading,
            position: Position {
                start: line,
                end: line,
            },
        }
    }

    pub fn callout(start: usize, end: usize) -> Self {
        Self {
            kind: BlockKind::Callout,
            position: Position { start, end },
        }
    }
}

/// One heading-delimited block of a note, or the implicit block before the
/// first heading (empty `header`).
///
/// `filtered_content`, `unchecked_tasks` and `checked_tasks` are derived from
/// `content` on construction; build a new value instead of editing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    /// Literal heading line, used as the lookup key.
    pub header: String,

    #[serde(rename = "type")]
    pub section_type: SectionType,

    /// Raw lines in source order, blank lines included.
    pub content: Vec<String>,

    /// `content` without blank and bare `>` lines.
    pub filtered_content: Vec<String>,

    /// Unchecked task text with marker and checkbox stripped, indentation kept.
    pub unchecked_tasks: Vec<String>,

    /// Checked task text with marker and checkbox stripped, indentation kept.
    pub checked_tasks: Vec<String>,

    pub position: Position,
}

impl Section {
    /// Check if the section is a callout block.
    pub fn is_callout(&self) -> bool {
        self.section_type == SectionType::Callout
    }

    /// Check if the section has any non-structural lines.
    pub fn has_content(&self) -> bool {
        !self.filtered_content.is_empty()
    }
}
