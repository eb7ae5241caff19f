//! PDF text extraction
//!
//! All failure states are values; no error crosses this boundary as a panic.
//! The reader never mutates or deletes the source file.

use crate::error::DocumentError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

/// Extracts clean text from a financial PDF document.
pub struct DocumentReader;

impl DocumentReader {
    /// Read a PDF and return its text, page texts in page order.
    ///
    /// Each page is trimmed, blank-line runs are collapsed to a single blank
    /// line, and a line break is appended after every page so page boundaries
    /// survive as line breaks. Lossy but deterministic.
    pub fn read(file_path: &str) -> std::result::Result<String, DocumentError> {
        if file_path.trim().is_empty() || !Path::new(file_path).is_file() {
            return Err(DocumentError::NotFound(file_path.to_string()));
        }

        let document =
            Document::load(file_path).map_err(|e| DocumentError::ReadFailure(e.to_string()))?;

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(DocumentError::Empty);
        }

        let mut full_text = String::new();
        let mut decoded_pages = 0usize;
        let mut last_failure: Option<String> = None;

        // BTreeMap keys are page numbers, so iteration is page order.
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(raw) => {
                    decoded_pages += 1;
                    full_text.push_str(&normalize_page(&raw));
                    full_text.push('\n');
                }
                Err(e) => {
                    debug!(page = page_number, error = %e, "Page decode failed");
                    last_failure = Some(e.to_string());
                }
            }
        }

        if decoded_pages == 0 {
            return Err(DocumentError::ReadFailure(
                last_failure.unwrap_or_else(|| "no page text could be decoded".to_string()),
            ));
        }

        Ok(full_text)
    }
}

/// Trim a page and collapse runs of blank lines into a single blank line.
fn normalize_page(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_pending = false;

    for line in raw.trim().lines() {
        if line.trim().is_empty() {
            blank_pending = !lines.is_empty();
        } else {
            if blank_pending {
                lines.push("");
                blank_pending = false;
            }
            lines.push(line.trim_end());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
pub(crate) mod test_pdfs {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::Path;

    /// Write a minimal text PDF with one page per entry in `page_texts`.
    pub fn write_pdf(path: &Path, page_texts: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in page_texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_not_found() {
        let result = DocumentReader::read("data/does-not-exist.pdf");
        assert_eq!(
            result,
            Err(DocumentError::NotFound("data/does-not-exist.pdf".to_string()))
        );
    }

    #[test]
    fn test_empty_path_is_not_found() {
        assert!(matches!(
            DocumentReader::read(""),
            Err(DocumentError::NotFound(_))
        ));
    }

    #[test]
    fn test_non_pdf_bytes_are_read_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"plain text pretending to be a pdf").unwrap();

        let result = DocumentReader::read(path.to_str().unwrap());
        assert!(matches!(result, Err(DocumentError::ReadFailure(_))));
    }

    #[test]
    fn test_zero_page_document_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        test_pdfs::write_pdf(&path, &[]);

        let result = DocumentReader::read(path.to_str().unwrap());
        assert_eq!(result, Err(DocumentError::Empty));
    }

    #[test]
    fn test_pages_concatenated_in_order_with_line_breaks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        test_pdfs::write_pdf(
            &path,
            &["Revenue was 10M", "Net profit was 2M", "Risks remain low"],
        );

        let text = DocumentReader::read(path.to_str().unwrap()).unwrap();
        assert!(!text.is_empty());
        assert!(text.ends_with('\n'));

        let revenue = text.find("Revenue").unwrap();
        let profit = text.find("Net profit").unwrap();
        let risks = text.find("Risks").unwrap();
        assert!(revenue < profit && profit < risks);

        // One page break marker per page.
        assert!(text.lines().count() >= 3);
    }

    #[test]
    fn test_blank_line_runs_collapse() {
        let normalized = normalize_page("  Revenue\n\n\n\nProfit  \n");
        assert_eq!(normalized, "Revenue\n\nProfit");
    }
}
