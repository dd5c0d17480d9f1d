use crate::layout::{FIELD_SEPARATOR, RecordLayout};

pub const HEADER_SENTINELS: [&str; 2] = ["000002!", "084852!"];
pub const FOOTER_SENTINEL: &str = "@@";
pub const RECORD_TERMINATOR: &str = "\r\n";

/// A record that could not be rendered and was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFault {
    /// 1-based line number in the decoded file.
    pub line_number: usize,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub text: String,
    pub records: usize,
    pub faults: Vec<LineFault>,
    pub header_removed: bool,
    pub footer_removed: bool,
}

/// Renders every record of `content` through `layout` and joins them with CRLF.
pub fn transform_records(content: &str, layout: &RecordLayout) -> TransformResult {
    let mut lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .collect();

    let mut header_removed = false;
    let mut footer_removed = false;
    if lines.len() > 2 {
        if is_header(lines[0].1) {
            lines.remove(0);
            header_removed = true;
        }
        if lines.last().is_some_and(|(_, line)| line.starts_with(FOOTER_SENTINEL)) {
            lines.pop();
            footer_removed = true;
        }
    }

    let mut rendered = Vec::with_capacity(lines.len());
    let mut faults = Vec::new();
    for (line_number, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let normalized = if layout.accepts_pipe {
            line.replace('|', "!")
        } else {
            line.to_string()
        };
        let fields: Vec<&str> = normalized.split(FIELD_SEPARATOR).collect();
        match layout.render(&fields) {
            Ok(record) => rendered.push(record),
            Err(err) => faults.push(LineFault {
                line_number,
                content: line.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    TransformResult {
        records: rendered.len(),
        text: rendered.join(RECORD_TERMINATOR),
        faults,
        header_removed,
        footer_removed,
    }
}

fn is_header(line: &str) -> bool {
    HEADER_SENTINELS
        .iter()
        .any(|sentinel| line.starts_with(sentinel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FLED, IMMI, PUNISH};

    #[test]
    fn fled_sentinels_are_stripped() {
        let content =
            "000002!HEADER!2024\n000002!ID1!NAME!KA8765!19!19930918!0!20240214\n@@END 1\n";
        let result = transform_records(content, &FLED);
        assert!(result.header_removed);
        assert!(result.footer_removed);
        assert_eq!(result.records, 1);
        assert!(result.faults.is_empty());
        assert!(result.text.starts_with("I!ID1       !NAME"));
        assert_eq!(result.text.chars().count(), 120);
        assert!(!result.text.contains("\r\n"));
    }

    #[test]
    fn alternate_header_sentinel_is_recognized() {
        let content = "084852!HDR\nI!A!B!C!1!19900101!1!20240101!1\n@@\n";
        let result = transform_records(content, &IMMI);
        assert!(result.header_removed);
        assert_eq!(result.records, 1);
    }

    #[test]
    fn sentinels_kept_for_two_line_files() {
        let content = "000002!ID1!NAME!KA8765!19!19930918!0!20240214\n@@\n";
        let result = transform_records(content, &FLED);
        assert!(!result.header_removed);
        assert!(!result.footer_removed);
        assert_eq!(result.records, 1);
        assert_eq!(result.faults.len(), 1);
        assert_eq!(result.faults[0].line_number, 2);
    }

    #[test]
    fn immi_pipes_become_separators() {
        let content = "I|ID1|NAME|123|24|19780105|0|20240302|1";
        let result = transform_records(content, &IMMI);
        assert_eq!(result.records, 1);
        let line = &result.text;
        assert_eq!(line.chars().count(), 110);
        assert!(line.starts_with("I!ID1       !"));
        assert_eq!(&line[13..63], " ".repeat(50));
        assert!(line.ends_with("!20240302!1!    "));
    }

    #[test]
    fn pipes_are_data_for_other_types() {
        let content = "U|P01|NAME|A1|30|19800101|1|20240101|20250101";
        let result = transform_records(content, &PUNISH);
        assert_eq!(result.records, 0);
        assert_eq!(result.faults.len(), 1);
        assert_eq!(result.faults[0].content, content);
    }

    #[test]
    fn blank_lines_are_skipped_and_short_records_dropped() {
        let content = "\
000002!HDR
U!P01!NAME!A1!30!19800101!1!20240101!20250101


U!P02!SHORT
U!P03!NAME!A1!30!19800101!1!20240101!20250101
@@TRAILER";
        let result = transform_records(content, &PUNISH);
        assert_eq!(result.records, 2);
        assert_eq!(result.faults.len(), 1);
        assert_eq!(result.faults[0].line_number, 5);
        assert_eq!(result.faults[0].content, "U!P02!SHORT");
        assert!(result.faults[0].reason.contains("missing field"));

        let lines: Vec<&str> = result.text.split(RECORD_TERMINATOR).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|line| line.chars().count() == 120));
        assert!(lines[1].starts_with("U!P03"));
        assert!(!result.text.ends_with(RECORD_TERMINATOR));
    }

    #[test]
    fn every_record_has_required_length() {
        let content = "\
I!A-VERY-LONG-IDENTIFIER!臺灣人名!PASSPORT-NUMBER-TOO-LONG!1234!199001011!12!20240101!9
I!B!C!D!E!F!G!H!I";
        for layout in [&FLED, &IMMI, &PUNISH] {
            let result = transform_records(content, layout);
            assert_eq!(result.records, 2);
            for line in result.text.split(RECORD_TERMINATOR) {
                assert_eq!(line.chars().count(), layout.required_length);
            }
        }
    }

    #[test]
    fn all_records_dropped_yields_empty_text() {
        let result = transform_records("x!y\nshort\n", &FLED);
        assert_eq!(result.records, 0);
        assert_eq!(result.faults.len(), 2);
        assert!(result.text.is_empty());
    }
}
