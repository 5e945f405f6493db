//! Splits recommendation text into typed display segments.
//!
//! Bold spans (`**...**`) become headers. The text between them is split
//! into lines, each classified as a numbered item, a bullet or a plain
//! paragraph. Segmentation is total: any line shape it does not recognize
//! is a paragraph.

use std::sync::LazyLock;

use regex::Regex;

static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[^*]+\*\*").expect("bold span pattern"));
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("numbered line pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSegment {
    Header(String),
    NumberedLine(String),
    BulletLine(String),
    Paragraph(String),
}

pub fn segment(text: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for span in BOLD_SPAN.find_iter(text) {
        push_lines(&text[cursor..span.start()], &mut segments);
        let header = span.as_str().trim_matches('*').trim();
        segments.push(TextSegment::Header(header.to_string()));
        cursor = span.end();
    }
    push_lines(&text[cursor..], &mut segments);

    segments
}

fn push_lines(chunk: &str, segments: &mut Vec<TextSegment>) {
    for line in chunk.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        segments.push(classify_line(line));
    }
}

fn classify_line(line: &str) -> TextSegment {
    if NUMBERED.is_match(line) {
        TextSegment::NumberedLine(line.to_string())
    } else if line.starts_with('-') || line.starts_with('•') {
        TextSegment::BulletLine(line.to_string())
    } else {
        TextSegment::Paragraph(line.to_string())
    }
}
