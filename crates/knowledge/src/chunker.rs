//! Text chunking with configurable size and overlap.

use crate::types::{Chunk, PageText};
use pagecite_core::{AppError, AppResult};

/// Collapse newlines and runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping windows of `size` characters.
///
/// Fails with `InvalidConfig` unless `0 < overlap + 1 <= size`.
pub fn chunk(text: &str, size: usize, overlap: usize) -> AppResult<Vec<String>> {
    Ok(Chunker::new(size, overlap)?.split(text))
}

/// Character-window chunker with validated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker; `overlap` must be strictly smaller than `size`.
    pub fn new(size: usize, overlap: usize) -> AppResult<Self> {
        if size == 0 {
            return Err(AppError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= size {
            return Err(AppError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split already-normalized text into windows.
    ///
    /// Windows advance by `size - overlap` characters and the loop stops
    /// once a window reaches the end of the text, so the final window may
    /// be shorter than `size`. Empty text yields no windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.size - self.overlap;
        let mut windows = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.size).min(chars.len());
            windows.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        windows
    }

    /// Normalize and chunk every page of a document.
    ///
    /// Chunk indices restart at zero on each page.
    pub fn chunk_document(&self, document: &str, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            let normalized = normalize_whitespace(&page.text);
            for (index, text) in self.split(&normalized).into_iter().enumerate() {
                chunks.push(Chunk::new(document, page.page, index, text));
            }
        }

        tracing::debug!(
            document,
            pages = pages.len(),
            chunks = chunks.len(),
            size = self.size,
            overlap = self.overlap,
            "Chunked document"
        );

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distinct_text(len: usize) -> String {
        (0..len)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect()
    }

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len == 0 {
            0
        } else if len <= overlap {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        assert!(matches!(
            Chunker::new(100, 100),
            Err(AppError::InvalidConfig(_))
        ));
        assert!(matches!(
            Chunker::new(100, 150),
            Err(AppError::InvalidConfig(_))
        ));
        assert!(matches!(Chunker::new(0, 0), Err(AppError::InvalidConfig(_))));
        assert!(chunk("abc", 10, 10).is_err());
    }

    #[test]
    fn test_nine_hundred_chars_make_three_chunks() {
        let text = distinct_text(900);
        let chunks = chunk(&text, 400, 50).unwrap();

        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lengths, vec![400, 400, 200]);
    }

    #[test]
    fn test_chunk_count_formula() {
        for (size, overlap) in [(400, 50), (100, 0), (10, 9), (7, 3)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            for len in [0, 1, 3, 9, 10, 11, 99, 100, 101, 399, 400, 401, 900, 1234] {
                let text = distinct_text(len);
                assert_eq!(
                    chunker.split(&text).len(),
                    expected_count(len, size, overlap),
                    "len={} size={} overlap={}",
                    len,
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn test_every_character_is_covered() {
        let chunker = Chunker::new(37, 5).unwrap();
        let text = distinct_text(500);
        let windows = chunker.split(&text);

        let step = 37 - 5;
        let mut covered = vec![false; 500];
        for (i, window) in windows.iter().enumerate() {
            let start = i * step;
            assert_eq!(&text[start..start + window.len()], window.as_str());
            for flag in covered.iter_mut().skip(start).take(window.len()) {
                *flag = true;
            }
        }
        assert!(covered.iter().all(|c| *c));
    }

    #[test]
    fn test_multibyte_text_splits_on_chars() {
        let text = "é".repeat(30);
        let windows = Chunker::new(10, 2).unwrap().split(&text);
        assert!(windows.iter().all(|w| w.chars().all(|c| c == 'é')));
        assert_eq!(windows[0].chars().count(), 10);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  Line one\n\nline   two\ttabbed \n"),
            "Line one line two tabbed"
        );
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_chunk_document_assigns_ids_per_page() {
        let pages = vec![
            PageText::new(1, distinct_text(900)),
            PageText::new(2, "short\n\npage"),
        ];
        let chunks = Chunker::new(400, 50).unwrap().chunk_document("doc", &pages);

        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["doc_p1_c0", "doc_p1_c1", "doc_p1_c2", "doc_p2_c0"]);
        assert_eq!(chunks[3].text, "short page");
        assert_eq!(chunks[3].page, 2);
    }

    #[test]
    fn test_blank_page_yields_no_chunks() {
        let pages = vec![PageText::new(1, "   \n ")];
        let chunks = Chunker::new(400, 50).unwrap().chunk_document("doc", &pages);
        assert!(chunks.is_empty());
    }
}
