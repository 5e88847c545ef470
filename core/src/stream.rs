//! Splitting a response body into concatenated JSON documents.
//!
//! # Design
//! The server occasionally writes several envelopes back to back with no
//! separator, e.g. two `{"error":...}` objects followed by the real
//! `{"response":...}`. `documents` finds the boundaries with one forward scan
//! over the bytes, tracking object depth plus string and escape state so that
//! braces inside string values or keys never count. Every top-level document
//! the API produces is an object, so only `{` and `}` are tracked.
//!
//! Scanning bytes is safe for UTF-8 input: `{`, `}`, `"` and `\` are ASCII
//! and never occur inside a multi-byte sequence, so every boundary falls on a
//! char boundary.

use std::ops::Range;

use serde_json::Value;
use thiserror::Error;

/// One complete document found in the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub value: Value,
    /// Byte range of the document's text within the scanned buffer.
    pub range: Range<usize>,
}

/// A balanced fragment that is not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JSON document at bytes {range:?}: {message}")]
pub struct StreamError {
    pub range: Range<usize>,
    pub fragment: String,
    pub message: String,
}

/// Iterate over the documents in `buffer`, in order.
///
/// Trailing input that never closes (a truncated body) yields nothing.
pub fn documents(buffer: &str) -> Documents<'_> {
    Documents {
        buffer,
        pos: 0,
        start: 0,
    }
}

/// Lazy iterator returned by [`documents`].
#[derive(Debug, Clone)]
pub struct Documents<'a> {
    buffer: &'a str,
    pos: usize,
    start: usize,
}

impl Iterator for Documents<'_> {
    type Item = Result<Document, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.buffer.as_bytes();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while self.pos < bytes.len() {
            let at = self.pos;
            self.pos += 1;

            if in_string {
                if escaped {
                    escaped = false;
                } else if bytes[at] == b'\\' {
                    escaped = true;
                } else if bytes[at] == b'"' {
                    in_string = false;
                }
                continue;
            }

            match bytes[at] {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    // A stray `}` at depth zero closes a garbage fragment so
                    // the decoder reports it instead of the scan stalling.
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let range = self.start..self.pos;
                        self.start = self.pos;
                        return Some(self.decode(range));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl Documents<'_> {
    fn decode(&self, range: Range<usize>) -> Result<Document, StreamError> {
        let fragment = &self.buffer[range.clone()];
        // Leading whitespace between documents belongs to the next fragment;
        // report ranges without it.
        let trimmed = fragment.trim_start();
        let range = (range.end - trimmed.len())..range.end;

        serde_json::from_str(trimmed)
            .map(|value| Document {
                value,
                range: range.clone(),
            })
            .map_err(|e| StreamError {
                range,
                fragment: trimmed.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(buffer: &str) -> Vec<Value> {
        documents(buffer).map(|d| d.unwrap().value).collect()
    }

    #[test]
    fn single_document() {
        assert_eq!(values(r#"{"response":123}"#), vec![json!({"response": 123})]);
    }

    #[test]
    fn back_to_back_documents() {
        let docs = values(r#"{"a":1}{"b":{"c":2}} {"d":3}"#);
        assert_eq!(docs, vec![json!({"a": 1}), json!({"b": {"c": 2}}), json!({"d": 3})]);
    }

    #[test]
    fn braces_inside_keys_are_not_structural() {
        let docs = values(r#"{"error": {"}{": "foo"}}{"foo":"bar"}"#);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["error"]["}{"], "foo");
        assert_eq!(docs[1]["foo"], "bar");
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let docs = values(r#"{"text":"\"{\"\\"}{"n":1}"#);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["text"], "\"{\"\\");
        assert_eq!(docs[1]["n"], 1);
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let docs = values(r#"{"response":1}{"response":[1,2"#);
        assert_eq!(docs, vec![json!({"response": 1})]);
    }

    #[test]
    fn unterminated_string_yields_nothing() {
        assert!(values(r#"{"response":"}"#).is_empty());
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        assert!(values("").is_empty());
        assert!(values("   \n").is_empty());
    }

    #[test]
    fn ranges_point_at_document_text() {
        let buffer = "{\"a\":1}\n{\"b\":2}";
        let docs: Vec<Document> = documents(buffer).map(Result::unwrap).collect();
        assert_eq!(&buffer[docs[0].range.clone()], "{\"a\":1}");
        assert_eq!(&buffer[docs[1].range.clone()], "{\"b\":2}");
    }

    #[test]
    fn invalid_fragment_is_reported_and_scan_continues() {
        let buffer = r#"{"a":}{"b":2}"#;
        let mut iter = documents(buffer);

        let err = iter.next().unwrap().unwrap_err();
        assert_eq!(err.fragment, r#"{"a":}"#);
        assert_eq!(err.range, 0..6);

        let doc = iter.next().unwrap().unwrap();
        assert_eq!(doc.value, json!({"b": 2}));
        assert!(iter.next().is_none());
    }

    #[test]
    fn non_ascii_content_survives() {
        let docs = values(r#"{"response":[{"first_name":"Павел"}]}{"x":"}"}"#);
        assert_eq!(docs[0]["response"][0]["first_name"], "Павел");
        assert_eq!(docs[1]["x"], "}");
    }

    #[test]
    fn iterator_is_restartable() {
        let buffer = r#"{"a":1}{"b":2}"#;
        assert_eq!(documents(buffer).count(), 2);
        assert_eq!(documents(buffer).count(), 2);
    }
}
