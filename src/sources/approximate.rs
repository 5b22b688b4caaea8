//! The approximate tier: heuristic identifier search
//!
//! Extracts the identifier under the cursor with a word regex and hands it
//! to the search backend. Imprecise but available for any language, which
//! is exactly why it sits at the bottom of the tier order. Searches run
//! under the configured unindexed-search timeout; hitting it makes the
//! tier abstain rather than fail.

use super::{HoverStream, LocationStream, RangeStream, SourceAdapter, abstain, one_shot};
use crate::backends::SearchBackend;
use crate::types::{Document, Position, Range, ReferenceContext};
use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier regex"));

pub struct ApproximateAdapter {
    search: Arc<dyn SearchBackend>,
    timeout: Duration,
}

impl ApproximateAdapter {
    pub fn new(search: Arc<dyn SearchBackend>, timeout: Duration) -> Self {
        Self { search, timeout }
    }
}

/// The identifier token covering `pos`, if any
///
/// A cursor sitting directly after the last character of a token still
/// selects it, matching how editors treat the caret.
pub(crate) fn identifier_at(text: &str, pos: Position) -> Option<String> {
    let line = text.lines().nth(pos.line as usize)?;
    for m in IDENTIFIER.find_iter(line) {
        let start = m.start() as u32;
        let end = m.end() as u32;
        if start <= pos.character && pos.character <= end {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// All whole-token occurrences of `identifier` in `text`
fn token_ranges(text: &str, identifier: &str) -> Vec<Range> {
    let mut ranges = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        for m in IDENTIFIER.find_iter(line) {
            if m.as_str() == identifier {
                ranges.push(Range::new(
                    line_no as u32,
                    m.start() as u32,
                    line_no as u32,
                    m.end() as u32,
                ));
            }
        }
    }
    ranges
}

impl SourceAdapter for ApproximateAdapter {
    fn definition(&self, doc: &Document, pos: Position) -> LocationStream {
        let Some(identifier) = identifier_at(&doc.text, pos) else {
            return abstain();
        };
        let search = Arc::clone(&self.search);
        let language = doc.language.clone();
        let timeout = self.timeout;

        one_shot(async move {
            match tokio::time::timeout(timeout, search.search_definitions(&identifier, &language))
                .await
            {
                Ok(result) => result.map(Some),
                Err(_) => {
                    tracing::debug!("definition search for {} timed out", identifier);
                    Ok(None)
                }
            }
        })
    }

    fn references(&self, doc: &Document, pos: Position, _ctx: ReferenceContext) -> LocationStream {
        let Some(identifier) = identifier_at(&doc.text, pos) else {
            return abstain();
        };
        let search = Arc::clone(&self.search);
        let language = doc.language.clone();
        let timeout = self.timeout;

        one_shot(async move {
            match tokio::time::timeout(timeout, search.search_references(&identifier, &language))
                .await
            {
                Ok(result) => result.map(Some),
                Err(_) => {
                    tracing::debug!("reference search for {} timed out", identifier);
                    Ok(None)
                }
            }
        })
    }

    fn hover(&self, _doc: &Document, _pos: Position) -> HoverStream {
        // Text search cannot produce hover content
        abstain()
    }

    fn document_highlights(&self, doc: &Document, pos: Position) -> RangeStream {
        let Some(identifier) = identifier_at(&doc.text, pos) else {
            return abstain();
        };
        let ranges = token_ranges(&doc.text, &identifier);
        one_shot(async move { Ok((!ranges.is_empty()).then_some(ranges)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "fn parse(input: &str) -> Token {\n    let token = input;\n    token\n}\n";

    #[test]
    fn test_identifier_at_middle_of_token() {
        assert_eq!(
            identifier_at(TEXT, Position::new(1, 9)).as_deref(),
            Some("token")
        );
    }

    #[test]
    fn test_identifier_at_end_of_token() {
        // Caret directly after the token still selects it
        assert_eq!(
            identifier_at(TEXT, Position::new(1, 13)).as_deref(),
            Some("token")
        );
    }

    #[test]
    fn test_identifier_at_punctuation() {
        assert_eq!(identifier_at(TEXT, Position::new(0, 21)), None);
    }

    #[test]
    fn test_identifier_at_out_of_bounds_line() {
        assert_eq!(identifier_at(TEXT, Position::new(40, 0)), None);
    }

    #[test]
    fn test_token_ranges_whole_tokens_only() {
        let ranges = token_ranges(TEXT, "token");
        // "token" appears on lines 1 and 2; "Token" must not match
        assert_eq!(
            ranges,
            vec![Range::new(1, 8, 1, 13), Range::new(2, 4, 2, 9)]
        );
    }
}
