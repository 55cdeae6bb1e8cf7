//! Unchecked task extraction.

use crate::models::Section;
use crate::services::sections::parse_task_line;

/// Checkbox prefix re-applied to every extracted task.
pub const UNCHECKED_ITEM_PREFIX: &str = "- [ ] ";

/// Collect unchecked tasks from every section not named in `skipped_sections`.
///
/// Section order and in-section order are kept. Each task comes back as a
/// list item (`- [ ] text`, indentation first) ready to be appended to
/// another note. Skip-list entries that match no section are ignored.
pub fn extract_unchecked_items_from_sections(
    sections: &[Section],
    skipped_sections: &[String],
) -> Vec<String> {
    sections
        .iter()
        .filter(|section| !skipped_sections.iter().any(|s| s == &section.header))
        .flat_map(|section| section.content.iter())
        .filter_map(|line| parse_task_line(line))
        .filter(|task| !task.checked)
        .map(|task| format!("{}{}{}", task.indent, UNCHECKED_ITEM_PREFIX, task.text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::heading_index::scan_blocks;
    use crate::services::sections::{append_items_to_section, find_section, parse_sections};

    const YESTERDAY: &str = "\
## Tasks
- [ ] carry me
    - [ ] nested
- [x] finished
#### -> Personal tasks
- [ ] private
> [!todo] Focus
> - [ ] quoted
";

    fn parse(text: &str) -> Vec<crate::models::Section> {
        parse_sections(text, &scan_blocks(text))
    }

    fn skip(headers: &[&str]) -> Vec<String> {
        headers.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_extracts_in_order_and_skips() {
        let items = extract_unchecked_items_from_sections(
            &parse(YESTERDAY),
            &skip(&["#### -> Personal tasks"]),
        );
        assert_eq!(
            items,
            vec!["- [ ] carry me", "    - [ ] nested", "- [ ] quoted"]
        );
    }

    #[test]
    fn test_unknown_skip_entries_are_ignored() {
        let sections = parse(YESTERDAY);
        let all = extract_unchecked_items_from_sections(&sections, &[]);
        let with_unknown =
            extract_unchecked_items_from_sections(&sections, &skip(&["## Not here"]));
        assert_eq!(all.len(), 4);
        assert_eq!(all, with_unknown);
    }

    #[test]
    fn test_never_returns_tasks_from_skipped_sections() {
        let sections = parse(YESTERDAY);
        for header in ["## Tasks", "#### -> Personal tasks", "> [!todo] Focus"] {
            let items = extract_unchecked_items_from_sections(&sections, &skip(&[header]));
            let skipped = find_section(&sections, header).unwrap();
            for task in &skipped.unchecked_tasks {
                assert!(!items.iter().any(|i| i.trim_start().ends_with(task.trim_start())));
            }
        }
    }

    #[test]
    fn test_text_spacing_is_not_indentation() {
        let items = extract_unchecked_items_from_sections(
            &parse("## Tasks\n- [ ]  two spaces\n\t- [ ] tabbed\n"),
            &[],
        );
        assert_eq!(items, vec!["- [ ]  two spaces", "\t- [ ] tabbed"]);
    }

    #[test]
    fn test_empty_sections() {
        assert!(extract_unchecked_items_from_sections(&[], &skip(&["## Tasks"])).is_empty());
    }

    #[test]
    fn test_output_is_insertable() {
        let items = extract_unchecked_items_from_sections(&parse(YESTERDAY), &[]);
        let today = append_items_to_section(&parse("## Tasks\n"), &items, "## Tasks");
        let tasks = find_section(&today, "## Tasks").unwrap();
        assert_eq!(
            tasks.unchecked_tasks,
            vec!["carry me", "    nested", "private", "quoted"]
        );
    }
}
