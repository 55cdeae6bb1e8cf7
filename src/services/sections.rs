//! Markdown section model.
//!
//! Splits a note into heading-delimited sections, classifies task lines,
//! layers new items into a target section and writes the sections back out
//! as text. Only the heading/list/callout subset of markdown used by daily
//! notes is understood here.

use crate::models::{BlockKind, BlockSpan, Position, Section, SectionType};
use regex::Regex;
use std::sync::LazyLock;

/// Quote marker that starts every callout line.
pub const CALLOUT_PREFIX: &str = ">";

static UNCHECKED_TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[ \t]*>[ ]?)?([ \t]*)[-*+][ \t]+\[\s\][ \t]?(.*)$")
        .expect("valid unchecked task regex")
});

static CHECKED_TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[ \t]*>[ ]?)?([ \t]*)[-*+][ \t]+\[[xX]\][ \t]?(.*)$")
        .expect("valid checked task regex")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}(?:\s|$)").expect("valid heading regex"));

static CALLOUT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s?\[!").expect("valid callout header regex"));

/// A classified task line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLine {
    pub checked: bool,
    /// Whitespace before the list marker (after any quote marker).
    pub indent: String,
    /// Text after the checkbox.
    pub text: String,
}

impl TaskLine {
    /// Indentation followed by the task text, as stored on a [`Section`].
    pub fn stripped(&self) -> String {
        format!("{}{}", self.indent, self.text)
    }
}

/// Classify a line as a checked or unchecked task.
pub fn parse_task_line(line: &str) -> Option<TaskLine> {
    let line = line.trim_end();
    let (checked, caps) = if let Some(caps) = UNCHECKED_TASK_RE.captures(line) {
        (false, caps)
    } else {
        (true, CHECKED_TASK_RE.captures(line)?)
    };

    Some(TaskLine {
        checked,
        indent: caps[1].to_string(),
        text: caps[2].to_string(),
    })
}

pub fn is_unchecked_task_line(line: &str) -> bool {
    UNCHECKED_TASK_RE.is_match(line.trim_end())
}

pub fn is_checked_task_line(line: &str) -> bool {
    CHECKED_TASK_RE.is_match(line.trim_end())
}

/// `>[!` or `> [!` at the start of the trimmed line.
pub fn is_callout_header(line: &str) -> bool {
    CALLOUT_HEADER_RE.is_match(line.trim())
}

/// ATX heading (`#` to `######` followed by whitespace or end of line).
pub fn is_heading_line(line: &str) -> bool {
    HEADING_RE.is_match(line.trim())
}

/// Blank lines and bare quote markers carry no content.
pub fn is_structural_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed == CALLOUT_PREFIX
}

impl Section {
    /// Build a section, deriving the filtered content and task lists.
    pub fn new(
        header: impl Into<String>,
        section_type: SectionType,
        content: Vec<String>,
        position: Position,
    ) -> Self {
        let filtered_content = content
            .iter()
            .filter(|line| !is_structural_line(line))
            .cloned()
            .collect();

        let mut unchecked_tasks = Vec::new();
        let mut checked_tasks = Vec::new();
        for task in content.iter().filter_map(|line| parse_task_line(line)) {
            if task.checked {
                checked_tasks.push(task.stripped());
            } else {
                unchecked_tasks.push(task.stripped());
            }
        }

        Self {
            header: header.into(),
            section_type,
            content,
            filtered_content,
            unchecked_tasks,
            checked_tasks,
            position,
        }
    }

    /// Copy of this section with `items` appended to its content.
    pub fn with_appended(&self, items: &[String]) -> Self {
        let mut content = self.content.clone();
        content.extend(items.iter().cloned());
        Self::new(self.header.clone(), self.section_type, content, self.position)
    }
}

fn section_type_for_header(header: &str) -> SectionType {
    if is_callout_header(header) {
        SectionType::Callout
    } else {
        SectionType::Other
    }
}

/// Split `text` into sections at the supplied block positions.
///
/// Every block opens a section whose header is the block's first line and
/// which runs until the next block. A callout section stops at the end of
/// its block; lines between it and the next block form a headerless plain
/// section. Lines before the first block also form a section with an empty
/// header. Blocks outside the note are ignored.
pub fn parse_sections(text: &str, blocks: &[BlockSpan]) -> Vec<Section> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let mut starts: Vec<&BlockSpan> = blocks
        .iter()
        .filter(|b| b.position.start < lines.len())
        .collect();
    starts.sort_by_key(|b| b.position.start);
    starts.dedup_by_key(|b| b.position.start);

    let owned_lines = |range: &[&str]| range.iter().map(|l| l.to_string()).collect::<Vec<_>>();
    let plain_section = |from: usize, to: usize| {
        Section::new(
            "",
            SectionType::Other,
            owned_lines(&lines[from..to]),
            Position {
                start: from,
                end: to - 1,
            },
        )
    };
    let mut sections = Vec::with_capacity(starts.len() + 1);

    let first_start = starts.first().map(|b| b.position.start).unwrap_or(lines.len());
    if first_start > 0 {
        sections.push(plain_section(0, first_start));
    }

    for (i, block) in starts.iter().enumerate() {
        let start = block.position.start;
        let next = starts
            .get(i + 1)
            .map(|b| b.position.start)
            .unwrap_or(lines.len());
        let header = lines[start];

        let (section_type, end) = match block.kind {
            BlockKind::Callout => {
                let last = block.position.end.clamp(start, next - 1);
                (SectionType::Callout, last + 1)
            }
            BlockKind::Heading => (section_type_for_header(header), next),
        };

        sections.push(Section::new(
            header,
            section_type,
            owned_lines(&lines[start + 1..end]),
            Position {
                start,
                end: end - 1,
            },
        ));

        if end < next {
            sections.push(plain_section(end, next));
        }
    }

    sections
}

/// First section whose header equals `heading` after trimming both.
pub fn find_section<'a>(sections: &'a [Section], heading: &str) -> Option<&'a Section> {
    let heading = heading.trim();
    sections.iter().find(|s| s.header.trim() == heading)
}

/// Append `items` under `target_heading`, creating the section at the end if
/// it does not exist yet.
///
/// Returns a new sequence; existing sections keep their order and content.
/// Empty `items` returns the sections unchanged.
pub fn append_items_to_section(
    sections: &[Section],
    items: &[String],
    target_heading: &str,
) -> Vec<Section> {
    if items.is_empty() {
        return sections.to_vec();
    }

    let target = target_heading.trim();
    match sections.iter().position(|s| s.header.trim() == target) {
        Some(index) => sections
            .iter()
            .enumerate()
            .map(|(i, s)| if i == index { s.with_appended(items) } else { s.clone() })
            .collect(),
        None => {
            let mut updated = sections.to_vec();
            updated.push(Section::new(
                target_heading,
                section_type_for_header(target_heading),
                items.to_vec(),
                Position::default(),
            ));
            updated
        }
    }
}

/// Render sections back to note text.
///
/// Each headed section is preceded by one blank line, and only its filtered
/// content is written. Callout lines missing the quote marker get `"> "`.
/// Headerless sections are written without a header line, separated from
/// what precedes them by a blank line, and skipped when they hold nothing
/// but blank lines.
pub fn convert_sections_to_content(sections: &[Section]) -> String {
    let mut content = String::new();

    for section in sections {
        let headerless = section.header.is_empty();
        if headerless && !section.has_content() {
            continue;
        }

        if !content.is_empty() {
            content.push('\n');
        }
        if !headerless {
            if content.is_empty() {
                content.push('\n');
            }
            content.push_str(&section.header);
            content.push('\n');
        }

        for line in &section.filtered_content {
            if section.is_callout() && !line.trim_start().starts_with(CALLOUT_PREFIX) {
                content.push_str(CALLOUT_PREFIX);
                content.push(' ');
            }
            content.push_str(line);
            content.push('\n');
        }
    }

    content
}

/// Whether the first non-blank line under `heading` in raw `text` is
/// something other than another heading.
pub fn section_has_content(text: &str, heading: &str) -> bool {
    let heading = heading.trim();
    let mut lines = text.lines().skip_while(|l| l.trim() != heading);
    if lines.next().is_none() {
        return false;
    }

    match lines.find(|l| !l.trim().is_empty()) {
        Some(line) => !is_heading_line(line),
        None => false,
    }
}
