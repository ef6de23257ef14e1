//! Word-aligned buffering of generated tokens.

/// Accumulates tokens and releases text only at whitespace boundaries, so
/// consumers never see half a word.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token; returns the buffered text once it ends in whitespace.
    pub fn push(&mut self, token: &str) -> Option<String> {
        self.buf.push_str(token);
        if self.buf.ends_with(char::is_whitespace) {
            Some(std::mem::take(&mut self.buf))
        } else {
            None
        }
    }

    /// Release whatever is left.
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emits_on_whitespace_only() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push("Hel"), None);
        assert_eq!(buffer.push("lo"), None);
        assert_eq!(buffer.push(" "), Some("Hello ".to_string()));
        assert!(buffer.is_empty());
        assert_eq!(buffer.push("wor"), None);
        assert_eq!(buffer.push("ld\n"), Some("world\n".to_string()));
    }

    #[test]
    fn test_flush_releases_residual() {
        let mut buffer = LineBuffer::new();
        buffer.push("end.");
        assert_eq!(buffer.flush(), Some("end.".to_string()));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_empty_tokens_emit_nothing() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(""), None);
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn test_concatenation_is_preserved() {
        let tokens = ["The", " quick", " br", "own", " fox", "."];
        let mut buffer = LineBuffer::new();
        let mut out = String::new();
        for t in tokens {
            if let Some(s) = buffer.push(t) {
                out.push_str(&s);
            }
        }
        if let Some(s) = buffer.flush() {
            out.push_str(&s);
        }
        assert_eq!(out, tokens.concat());
    }
}
