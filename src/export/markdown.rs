//! One-pass reader for the markdown subset that analysis text uses.
//!
//! Supported: bold-only lines (headings), pipe tables, plain paragraphs with
//! `**bold**` and `[text](url)` reduced to plain text. Lists, nested blocks,
//! `#` headings, italics and code are not interpreted; such lines come out as
//! plain paragraphs with their markers intact.

use std::sync::LazyLock;

use regex::Regex;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("Invalid regex pattern defined in code")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    /// Rows of cells, header row first. Separator rows are already removed.
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineShape {
    Blank,
    BoldOnly,
    TableRow,
    TableSeparator,
    Text,
}

#[derive(Debug)]
enum ScanState {
    Scanning,
    InTable(Vec<Vec<String>>),
}

fn classify(line: &str) -> LineShape {
    let line = line.trim();
    if line.is_empty() {
        return LineShape::Blank;
    }
    if line.starts_with('|') {
        return if is_separator_row(line) {
            LineShape::TableSeparator
        } else {
            LineShape::TableRow
        };
    }
    if line.len() > 4
        && line.starts_with("**")
        && line.ends_with("**")
        && !line[2..line.len() - 2].contains("**")
    {
        return LineShape::BoldOnly;
    }
    LineShape::Text
}

fn is_separator_row(line: &str) -> bool {
    let cells = split_cells(line);
    !cells.is_empty()
        && cells.iter().all(|cell| {
            !cell.is_empty()
                && cell.contains('-')
                && cell.chars().all(|c| matches!(c, '-' | ':' | ' '))
        })
}

fn split_cells(line: &str) -> Vec<&str> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}

/// Strips `**` markers and rewrites `[text](url)` as `text`.
pub fn strip_inline(text: &str) -> String {
    let without_links = LINK_RE.replace_all(text, "$1");
    without_links.replace("**", "").trim().to_string()
}

pub fn markdown_to_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut state = ScanState::Scanning;

    for line in text.lines() {
        let shape = classify(line);

        state = match (state, shape) {
            (ScanState::InTable(mut rows), LineShape::TableRow) => {
                rows.push(table_row(line));
                ScanState::InTable(rows)
            }
            (ScanState::InTable(rows), LineShape::TableSeparator) => ScanState::InTable(rows),
            (ScanState::InTable(rows), other) => {
                if !rows.is_empty() {
                    blocks.push(Block::Table(rows));
                }
                scan_line(&mut blocks, line, other)
            }
            (ScanState::Scanning, other) => scan_line(&mut blocks, line, other),
        };
    }

    if let ScanState::InTable(rows) = state
        && !rows.is_empty()
    {
        blocks.push(Block::Table(rows));
    }

    blocks
}

fn scan_line(blocks: &mut Vec<Block>, line: &str, shape: LineShape) -> ScanState {
    match shape {
        LineShape::TableRow => ScanState::InTable(vec![table_row(line)]),
        LineShape::TableSeparator => ScanState::InTable(Vec::new()),
        LineShape::Blank => ScanState::Scanning,
        LineShape::BoldOnly => {
            blocks.push(Block::Heading(strip_inline(line)));
            ScanState::Scanning
        }
        LineShape::Text => {
            let text = strip_inline(line);
            if !text.is_empty() {
                blocks.push(Block::Paragraph(text));
            }
            ScanState::Scanning
        }
    }
}

fn table_row(line: &str) -> Vec<String> {
    split_cells(line).into_iter().map(strip_inline).collect()
}
