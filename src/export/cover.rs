use std::io::Write;

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tempfile::NamedTempFile;

use crate::error::AppError;

/// US Letter in PDF points.
pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;
const TITLE_WRAP: usize = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverTheme {
    /// USAspending export.
    Purple,
    /// FPDS export.
    Orange,
}

impl CoverTheme {
    fn rgb(self) -> (f32, f32, f32) {
        match self {
            CoverTheme::Purple => (0.345, 0.184, 0.553),
            CoverTheme::Orange => (0.902, 0.447, 0.102),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverPage {
    pub title: String,
    pub subtitle: String,
    pub award_id: Option<String>,
    pub generated: NaiveDate,
    pub theme: CoverTheme,
}

fn render_err(context: &str) -> impl Fn(lopdf::Error) -> AppError + '_ {
    move |e| AppError::Render(format!("{context}: {e}"))
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

/// The standard Type1 fonts only cover WinAnsi; anything else prints as `?`.
fn pdf_text(text: &str) -> Object {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect();
    Object::string_literal(cleaned)
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn text_line(ops: &mut Vec<Operation>, font: &str, size: i64, y: i64, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), Object::Integer(size)]));
    ops.push(Operation::new(
        "Td",
        vec![Object::Integer(MARGIN), Object::Integer(y)],
    ));
    ops.push(Operation::new("Tj", vec![pdf_text(text)]));
    ops.push(Operation::new("ET", vec![]));
}

fn cover_operations(cover: &CoverPage) -> Vec<Operation> {
    let (r, g, b) = cover.theme.rgb();
    let mut ops = vec![
        Operation::new("rg", vec![real(r), real(g), real(b)]),
        Operation::new(
            "re",
            vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
    ];

    let mut y = 520;
    for line in wrap(&cover.title, TITLE_WRAP) {
        text_line(&mut ops, "F1", 30, y, &line);
        y -= 38;
    }

    y -= 10;
    text_line(&mut ops, "F2", 16, y, &cover.subtitle);

    if let Some(award_id) = cover.award_id.as_deref().filter(|id| !id.is_empty()) {
        y -= 30;
        text_line(&mut ops, "F2", 12, y, &format!("Award ID: {award_id}"));
    }

    let generated = format!("Generated {}", cover.generated.format("%B %-d, %Y"));
    text_line(&mut ops, "F2", 11, MARGIN, &generated);

    ops
}

/// Builds a standalone one-page PDF for the cover.
pub fn render_cover(cover: &CoverPage) -> Result<Document, AppError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => bold_id,
            "F2" => regular_id,
        },
    });

    let content = Content {
        operations: cover_operations(cover),
    };
    let encoded = content
        .encode()
        .map_err(render_err("failed to encode cover page"))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

/// Splices the cover pages in front of the PDF stored in `content`.
///
/// `content` is consumed: the temporary file is removed on every path, and
/// explicitly closed on success so a failed unlink is reported.
pub fn prepend_cover(cover: Document, content: NamedTempFile) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::load(content.path()).map_err(render_err("failed to read content PDF"))?;
    let bytes = splice(cover, &mut doc)?;

    content
        .close()
        .map_err(|e| AppError::Render(format!("failed to remove temporary PDF: {e}")))?;

    Ok(bytes)
}

fn splice(mut cover: Document, doc: &mut Document) -> Result<Vec<u8>, AppError> {
    cover.renumber_objects_with(doc.max_id + 1);

    let cover_catalog_id = cover
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(render_err("cover has no catalog"))?;
    let cover_pages_root = cover
        .catalog()
        .and_then(|c| c.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(render_err("cover has no page tree"))?;
    let cover_pages: Vec<ObjectId> = cover.get_pages().into_values().collect();

    let pages_id = doc
        .catalog()
        .and_then(|c| c.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(render_err("content PDF has no page tree"))?;

    doc.max_id = doc.max_id.max(cover.max_id);
    for (id, object) in cover.objects {
        if id != cover_catalog_id && id != cover_pages_root {
            doc.objects.insert(id, object);
        }
    }

    for page_id in &cover_pages {
        doc.get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(render_err("cover page missing after merge"))?
            .set("Parent", pages_id);
    }

    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(render_err("content page tree is not a dictionary"))?;
    {
        let kids = pages
            .get_mut(b"Kids")
            .and_then(Object::as_array_mut)
            .map_err(render_err("content page tree has no kids"))?;
        for (i, page_id) in cover_pages.iter().enumerate() {
            kids.insert(i, Object::Reference(*page_id));
        }
    }
    let count = pages
        .get(b"Count")
        .and_then(Object::as_i64)
        .map_err(render_err("content page tree has no count"))?;
    pages.set("Count", count + cover_pages.len() as i64);

    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AppError::Render(format!("failed to write merged PDF: {e}")))?;
    Ok(bytes)
}

/// Writes `bytes` to a fresh temporary file and checks it is non-empty.
pub fn write_temp_pdf(bytes: &[u8]) -> Result<NamedTempFile, AppError> {
    let mut file = tempfile::Builder::new()
        .prefix("award-export-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| AppError::Render(format!("failed to create temporary PDF: {e}")))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| AppError::Render(format!("failed to write temporary PDF: {e}")))?;

    let len = file
        .as_file()
        .metadata()
        .map_err(|e| AppError::Render(format!("temporary PDF missing: {e}")))?
        .len();
    if len == 0 {
        return Err(AppError::Render("rendered PDF is empty".to_string()));
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cover(theme: CoverTheme) -> CoverPage {
        CoverPage {
            title: "Contract Award Report".to_string(),
            subtitle: "USAspending.gov".to_string(),
            award_id: Some("CONT_AWD_36C10B22N10280026".to_string()),
            generated: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            theme,
        }
    }

    fn content_pdf(pages: usize) -> Vec<u8> {
        let mut doc = render_cover(&cover(CoverTheme::Orange)).unwrap();
        for _ in 1..pages {
            let extra = render_cover(&cover(CoverTheme::Orange)).unwrap();
            splice(extra, &mut doc).unwrap();
        }
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_cover_is_single_letter_page() {
        let doc = render_cover(&cover(CoverTheme::Purple)).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page = doc
            .get_object(*pages.values().next().unwrap())
            .unwrap()
            .as_dict()
            .unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), PAGE_WIDTH);
        assert_eq!(media_box[3].as_i64().unwrap(), PAGE_HEIGHT);
    }

    #[test]
    fn test_theme_colors_differ() {
        assert_ne!(CoverTheme::Purple.rgb(), CoverTheme::Orange.rgb());
    }

    #[test]
    fn test_merge_prepends_cover_and_removes_temp_file() {
        let content = write_temp_pdf(&content_pdf(3)).unwrap();
        let path = content.path().to_path_buf();
        assert!(path.exists());

        let cover_pdf = render_cover(&cover(CoverTheme::Purple)).unwrap();
        let merged = prepend_cover(cover_pdf, content).unwrap();

        assert!(!path.exists());
        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 1 + 3);
    }

    #[test]
    fn test_temp_file_removed_when_merge_fails() {
        let content = write_temp_pdf(b"%PDF-1.5 this is not a real pdf").unwrap();
        let path = content.path().to_path_buf();

        let result = prepend_cover(render_cover(&cover(CoverTheme::Orange)).unwrap(), content);

        assert!(matches!(result, Err(AppError::Render(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_pdf_is_rejected() {
        assert!(matches!(write_temp_pdf(b""), Err(AppError::Render(_))));
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        assert_eq!(
            wrap("Contract Award Report for a very long recipient name", 20),
            vec!["Contract Award", "Report for a very", "long recipient name"]
        );
        assert!(wrap("", 10).is_empty());
    }
}
