//! Source file parsing and page-tagged text extraction.

use crate::types::PageText;
use pagecite_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Page separator used by text exports of paginated documents.
pub const PAGE_BREAK: char = '\x0C';

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }

    /// Whether directory ingestion should pick up files of this type.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Read a file and split it into pages.
///
/// Pages are separated by form feeds and numbered from 1. Pages with no
/// text after cleaning are skipped, so page numbers may have gaps.
pub fn extract_pages(path: &Path) -> AppResult<Vec<PageText>> {
    let content_type = ContentType::from_path(path);

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if !is_likely_text(&raw) {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Knowledge(format!(
            "Binary file not supported: {:?}",
            path
        )));
    }

    let pages = split_pages(&raw, content_type);
    tracing::debug!(
        path = ?path,
        content_type = content_type.as_str(),
        pages = pages.len(),
        "Extracted pages"
    );

    Ok(pages)
}

/// Split in-memory text into pages, treating it as plain text.
pub fn extract_text(raw: &str) -> Vec<PageText> {
    split_pages(raw, ContentType::PlainText)
}

fn split_pages(raw: &str, content_type: ContentType) -> Vec<PageText> {
    raw.split(PAGE_BREAK)
        .enumerate()
        .filter_map(|(i, page)| {
            let cleaned = match content_type {
                ContentType::Markdown => clean_markdown(page),
                ContentType::PlainText | ContentType::Unknown => page.trim().to_string(),
            };
            if cleaned.trim().is_empty() {
                None
            } else {
                Some(PageText::new(i as u32 + 1, cleaned))
            }
        })
        .collect()
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        // Headers and list bullets
        let trimmed = line
            .trim_start_matches('#')
            .trim()
            .trim_start_matches("- ")
            .trim_start_matches("* ");

        // Horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        let stripped: String = trimmed.chars().filter(|c| !matches!(c, '*' | '`')).collect();
        if !stripped.trim().is_empty() {
            result.push_str(stripped.trim());
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Check if text is likely UTF-8 text (not binary).
fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(
            ContentType::from_path(Path::new("file.md")),
            ContentType::Markdown
        );
        assert_eq!(
            ContentType::from_path(Path::new("file.txt")),
            ContentType::PlainText
        );
        assert!(!ContentType::from_path(Path::new("file.pdf")).is_supported());
    }

    #[test]
    fn test_form_feed_splits_pages() {
        let pages = extract_text("first page\x0Csecond page\x0C\x0Cfourth page");
        assert_eq!(
            pages,
            vec![
                PageText::new(1, "first page"),
                PageText::new(2, "second page"),
                PageText::new(4, "fourth page"),
            ]
        );
    }

    #[test]
    fn test_no_text_yields_no_pages() {
        assert!(extract_text("  \n\x0C\t").is_empty());
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome **bold** text\n\n```rust\ncode\n```\n\n- More text";
        let output = clean_markdown(input);
        assert!(output.contains("Header"));
        assert!(output.contains("Some bold text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_extract_pages_from_markdown_file() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(file, "# Title\nIntro\x0C## Part two\nBody").unwrap();

        let pages = extract_pages(file.path()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].text, "Title\nIntro");
        assert_eq!(pages[1].page, 2);
        assert_eq!(pages[1].text, "Part two\nBody");
    }

    #[test]
    fn test_binary_content_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc\0def").unwrap();
        assert!(matches!(
            extract_pages(file.path()),
            Err(AppError::Knowledge(_))
        ));
    }
}
