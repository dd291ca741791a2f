use std::io::Cursor;

use chrono::Local;
use docx_rs::{Docx, Paragraph, Run, Style, StyleType, Table, TableCell, TableRow};
use serde_json::Value;

use super::markdown::{Block, markdown_to_blocks};
use crate::error::AppError;

const HEADING_1: &str = "Heading1";
const HEADING_2: &str = "Heading2";

#[derive(Debug, Clone, Default)]
pub struct WordExport {
    pub title: String,
    pub company_name: String,
    pub model: String,
    pub content: String,
    pub grounding_metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// Collects web sources from Gemini `groundingChunks` or a plain citation list.
pub fn sources_from_metadata(metadata: Option<&Value>) -> Vec<Source> {
    match metadata {
        Some(Value::Object(map)) => map
            .get("groundingChunks")
            .and_then(Value::as_array)
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| chunk.get("web"))
                    .filter_map(|web| {
                        let uri = web.get("uri")?.as_str()?.to_string();
                        let title = web
                            .get("title")
                            .and_then(Value::as_str)
                            .unwrap_or(&uri)
                            .to_string();
                        Some(Source { title, uri })
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|uri| Source {
                title: uri.to_string(),
                uri: uri.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn table_from_rows(rows: &[Vec<String>]) -> Table {
    let table_rows = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = row
                .iter()
                .map(|cell| {
                    let run = Run::new().add_text(cell.as_str());
                    let run = if i == 0 { run.bold() } else { run };
                    TableCell::new().add_paragraph(Paragraph::new().add_run(run))
                })
                .collect();
            TableRow::new(cells)
        })
        .collect();

    Table::new(table_rows)
}

fn heading(text: &str, style: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(text))
        .style(style)
}

fn meta_line(text: String) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).size(18).color("666666"))
}

pub fn build_word_document(export: &WordExport) -> Result<Vec<u8>, AppError> {
    let mut doc = Docx::new()
        .add_style(
            Style::new(HEADING_1, StyleType::Paragraph)
                .name("Heading 1")
                .size(36)
                .bold(),
        )
        .add_style(
            Style::new(HEADING_2, StyleType::Paragraph)
                .name("Heading 2")
                .size(28)
                .bold(),
        );

    let title = if export.title.trim().is_empty() {
        "Contractor Analysis"
    } else {
        export.title.trim()
    };
    doc = doc.add_paragraph(heading(title, HEADING_1));

    if !export.company_name.trim().is_empty() {
        doc = doc.add_paragraph(meta_line(format!("Company: {}", export.company_name.trim())));
    }
    if !export.model.trim().is_empty() {
        doc = doc.add_paragraph(meta_line(format!("Model: {}", export.model.trim())));
    }
    doc = doc.add_paragraph(meta_line(format!(
        "Generated: {}",
        Local::now().format("%B %-d, %Y")
    )));

    for block in markdown_to_blocks(&export.content) {
        doc = match block {
            Block::Heading(text) => doc.add_paragraph(heading(&text, HEADING_2)),
            Block::Paragraph(text) => {
                doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            }
            Block::Table(rows) => doc.add_table(table_from_rows(&rows)),
        };
    }

    let sources = sources_from_metadata(export.grounding_metadata.as_ref());
    if !sources.is_empty() {
        doc = doc.add_paragraph(heading("Sources", HEADING_2));
        for (i, source) in sources.iter().enumerate() {
            doc = doc.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!(
                "{}. {} ({})",
                i + 1,
                source.title,
                source.uri
            ))));
        }
    }

    let mut buf = Cursor::new(Vec::new());
    doc.build()
        .pack(&mut buf)
        .map_err(|e| AppError::Render(format!("failed to write Word document: {e}")))?;

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::TableChild;
    use serde_json::json;

    #[test]
    fn test_table_round_trip_keeps_shape() {
        let markdown = "\
| Tool | Category | Confidence |
|------|----------|------------|
| ServiceNow | ITSM | High |
| Splunk | SIEM | Medium |";

        let rows = match markdown_to_blocks(markdown).remove(0) {
            Block::Table(rows) => rows,
            other => panic!("expected table, got {other:?}"),
        };
        let table = table_from_rows(&rows);

        let cell_counts: Vec<usize> = table
            .rows
            .iter()
            .map(|child| {
                let TableChild::TableRow(row) = child;
                row.cells.len()
            })
            .collect();

        assert_eq!(cell_counts, vec![3, 3, 3]);
    }

    #[test]
    fn test_sources_from_grounding_chunks() {
        let metadata = json!({
            "groundingChunks": [
                {"web": {"uri": "https://a.example", "title": "a.example"}},
                {"web": {"uri": "https://b.example"}},
                {"retrievedContext": {}}
            ]
        });
        let sources = sources_from_metadata(Some(&metadata));
        assert_eq!(
            sources,
            vec![
                Source {
                    title: "a.example".to_string(),
                    uri: "https://a.example".to_string()
                },
                Source {
                    title: "https://b.example".to_string(),
                    uri: "https://b.example".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_sources_from_citation_list() {
        let metadata = json!(["https://sam.gov", 3]);
        assert_eq!(sources_from_metadata(Some(&metadata)).len(), 1);
        assert!(sources_from_metadata(None).is_empty());
        assert!(sources_from_metadata(Some(&Value::Null)).is_empty());
    }

    #[test]
    fn test_build_word_document_produces_zip() {
        let bytes = build_word_document(&WordExport {
            title: "Acme Corp Analysis".to_string(),
            company_name: "Acme Corp".to_string(),
            model: "sonar-pro".to_string(),
            content: concat!(
                "**Overview**\n",
                "Acme [builds](https://acme.example) rockets.\n",
                "| a | b |\n|---|---|\n| 1 | 2 |",
            )
            .to_string(),
            grounding_metadata: Some(json!(["https://acme.example"])),
        })
        .unwrap();

        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }
}
