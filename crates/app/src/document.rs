use lopdf::Document;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("document has no readable text: {0}")]
    Empty(String),
}

/// Turns a catalog document into one plain-text blob.
pub trait DocumentSource {
    fn extract_text(&self, path: &Path) -> Result<String, DocumentError>;
}

#[derive(Default)]
pub struct PdfTextSource;

impl DocumentSource for PdfTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, DocumentError> {
        let document =
            Document::load(path).map_err(|error| DocumentError::PdfParse(error.to_string()))?;

        let mut text = String::new();
        for page_no in document.get_pages().into_keys() {
            let page_text = document
                .extract_text(&[page_no])
                .map_err(|error| DocumentError::PdfParse(error.to_string()))?;
            text.push_str(&page_text);
            text.push('\n');
        }

        non_empty(text, path)
    }
}

#[derive(Default)]
pub struct PlainTextSource;

impl DocumentSource for PlainTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, DocumentError> {
        non_empty(std::fs::read_to_string(path)?, path)
    }
}

fn non_empty(text: String, path: &Path) -> Result<String, DocumentError> {
    if text.trim().is_empty() {
        return Err(DocumentError::Empty(path.display().to_string()));
    }
    Ok(text)
}

/// Picks the extractor by file extension: `.pdf` through lopdf, anything
/// else read as UTF-8 text.
pub fn load_document_text(path: &Path) -> Result<String, DocumentError> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        PdfTextSource.extract_text(path)
    } else {
        PlainTextSource.extract_text(path)
    }
}
