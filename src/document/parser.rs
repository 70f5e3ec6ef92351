use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{DocumentKind, Layout};
use crate::model::test_case::TestCaseRecord;

static SUITE_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:Test|Force)[ \t]+Tags[ \t]+(.+)$").expect("suite tags regex")
});

const TAGS_MARKER: &str = "[tags]";
const EXAMPLES_KEYWORDS: [&str; 3] = ["Examples", "Scenarios", "Exemplos"];

/// A local document split into test-case records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Suite-level tags, already joined as `a; b`.
    pub suite_tags: Option<String>,
    pub records: Vec<TestCaseRecord>,
}

pub fn parse(document: &str, layout: &Layout) -> ParsedDocument {
    match layout.kind {
        DocumentKind::Robot => parse_robot(document, layout),
        DocumentKind::Feature => parse_feature(document, layout),
    }
}

/// Regex for a robot section header such as `*** Test Cases ***`, tolerant
/// of spacing and case.
fn section_header(section: &str) -> Option<Regex> {
    let words: Vec<String> = section.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i){}", words.join(r"\s*"))).ok()
}

/// Text between the header matching `section` and the next `***` header.
fn robot_section<'a>(document: &'a str, section: &str) -> Option<&'a str> {
    let header = section_header(section)?;
    let start = header.find(document)?.end();
    let rest = &document[start..];
    let mut end = rest.len();
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if offset > 0 && line.trim_start().starts_with("***") {
            end = offset;
            break;
        }
        offset += line.len();
    }
    Some(&rest[..end])
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let marker = marker.trim().trim_end_matches(':');
    if marker.is_empty() {
        return None;
    }
    let rest = line.strip_prefix(marker)?;
    if !(rest.is_empty() || rest.starts_with(':') || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    let rest = rest.trim_start();
    Some(rest.strip_prefix(':').unwrap_or(rest).trim())
}

fn strip_title_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let marker = marker.trim().trim_end_matches(':');
    let rest = line.strip_prefix(marker)?.trim_start();
    if rest.is_empty() {
        return strip_marker(line, marker);
    }
    rest.strip_prefix(':').map(str::trim)
}

fn parse_robot(document: &str, layout: &Layout) -> ParsedDocument {
    let suite_tags = robot_section(document, &layout.settings_section)
        .and_then(|settings| SUITE_TAGS.captures(settings))
        .map(|c| c[1].split_whitespace().collect::<Vec<_>>().join("; "))
        .filter(|tags| !tags.is_empty());

    let Some(body) = robot_section(document, &layout.test_cases_section) else {
        return ParsedDocument {
            suite_tags,
            records: Vec::new(),
        };
    };

    let mut records = Vec::new();
    let mut current: Option<TestCaseRecord> = None;
    for raw in body.lines().filter(|l| !l.trim().is_empty()) {
        let line = raw.trim();
        // Indented lines only open a test when the marker ends in `:` or the
        // line, so keywords like `Title Should Be` stay steps.
        let title = if raw.starts_with([' ', '\t']) {
            strip_title_marker(line, &layout.title_marker)
        } else {
            strip_marker(line, &layout.title_marker)
        };
        if let Some(title) = title {
            records.extend(current.take());
            current = Some(TestCaseRecord::new(title));
        } else if line
            .get(..TAGS_MARKER.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(TAGS_MARKER))
        {
            if let Some(record) = current.as_mut() {
                record.tag_line = line[TAGS_MARKER.len()..].trim().to_string();
            }
        } else if let Some(record) = current.as_mut() {
            record.steps.push(line.to_string());
        } else {
            debug!(line, "skipping line before the first test case");
        }
    }
    records.extend(current);

    ParsedDocument {
        suite_tags,
        records,
    }
}

fn feature_keyword(section: &str) -> &str {
    let section = section.trim();
    match section.find(':') {
        Some(idx) => &section[..=idx],
        None => section,
    }
}

/// True when `document` already carries the structural header line
/// `marker`, recognised as loosely as the parser reads it.
pub fn has_header_line(document: &str, marker: &str) -> bool {
    let marker = marker.trim();
    if marker.is_empty() {
        return false;
    }
    if marker.starts_with("***") {
        return section_header(marker).is_some_and(|re| re.is_match(document));
    }
    let mut lines = document.lines().map(str::trim);
    if marker.starts_with('#') {
        return lines.any(|l| l == marker);
    }
    let keyword = feature_keyword(marker);
    lines.any(|l| l.starts_with(keyword))
}

fn is_examples_line(line: &str) -> bool {
    line.ends_with(':') && EXAMPLES_KEYWORDS.iter().any(|k| line.starts_with(k))
}

fn parse_feature(document: &str, layout: &Layout) -> ParsedDocument {
    let keyword = feature_keyword(&layout.test_cases_section);
    let mut lines = document.lines().map(str::trim);

    let mut suite = Vec::new();
    let mut found_header = keyword.is_empty();
    if !found_header {
        for line in lines.by_ref() {
            if line.starts_with(keyword) {
                found_header = true;
                break;
            }
            if line.starts_with('@') {
                suite.extend(line.split_whitespace().map(|t| t.trim_start_matches('@')));
            }
        }
    }
    let suite_tags = (!suite.is_empty()).then(|| suite.join("; "));
    if !found_header {
        return ParsedDocument {
            suite_tags,
            records: Vec::new(),
        };
    }

    let mut records = Vec::new();
    let mut current: Option<TestCaseRecord> = None;
    let mut pending_tags: Vec<&str> = Vec::new();
    let mut in_examples = false;
    for line in lines.filter(|l| !l.is_empty() && !l.starts_with('#')) {
        let title = strip_marker(line, &layout.outline_marker)
            .or_else(|| strip_marker(line, &layout.title_marker));
        if let Some(title) = title {
            records.extend(current.take());
            let mut record = TestCaseRecord::new(title);
            record.tag_line = pending_tags.join(" ");
            pending_tags.clear();
            in_examples = false;
            current = Some(record);
        } else if line.starts_with('@') {
            pending_tags.push(line);
        } else if let Some(record) = current.as_mut() {
            if is_examples_line(line) {
                in_examples = true;
                record.examples.push(line.to_string());
            } else if in_examples && line.starts_with('|') {
                record.examples.push(line.to_string());
            } else {
                in_examples = false;
                record.steps.push(line.to_string());
            }
        } else {
            debug!(line, "skipping line before the first scenario");
        }
    }
    records.extend(current);

    ParsedDocument {
        suite_tags,
        records,
    }
}
