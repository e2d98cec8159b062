use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds a company analysis can end in.
///
/// Every pipeline stage maps its failures onto exactly one of these. The
/// `Display` text is the short message shown to users; the detailed upstream
/// diagnostic travels separately in [`StageError::detail`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("No company found matching the query")]
    NotFound,

    #[error("Could not retrieve filings; the SEC API may be temporarily unavailable")]
    FilingsUnavailable,

    #[error("No DEF 14A filings found")]
    NoFilingFound,

    #[error("Could not fetch market cap")]
    MarketCapUnavailable,

    #[error("The filing document is empty or too short")]
    EmptyDocument,

    #[error("No change of control text found in the filing")]
    NoRelevantText,

    #[error("The analysis service call failed")]
    OracleCallFailed,

    #[error("Failed to parse change of control values from the analysis")]
    Unparseable,

    #[error("Failed to find change of control values from DEF 14A document")]
    NoExtractableValue,

    #[error("Failed to save the result")]
    PersistenceFailed,

    #[error("Unexpected error")]
    Unexpected,
}

impl ErrorKind {
    /// A one-line suggestion for the user, when there is something they can do.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorKind::NotFound => Some(
                "Try using the full legal name with 'Inc.', 'Corp.', or 'Corporation' (e.g. \"Apple Inc.\" instead of \"Apple\")",
            ),
            ErrorKind::NoFilingFound => Some(
                "This company may be private, foreign, or hasn't filed a proxy statement recently.",
            ),
            ErrorKind::FilingsUnavailable | ErrorKind::MarketCapUnavailable => {
                Some("Upstream data is temporarily unavailable; try again later.")
            }
            ErrorKind::EmptyDocument
            | ErrorKind::NoRelevantText
            | ErrorKind::Unparseable
            | ErrorKind::NoExtractableValue => Some(
                "The document was found but change of control values couldn't be extracted. You can review the document manually.",
            ),
            ErrorKind::OracleCallFailed
            | ErrorKind::PersistenceFailed
            | ErrorKind::Unexpected => None,
        }
    }
}

/// A stage failure: the kind plus an operator-facing diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct StageError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, on a char boundary.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo wörld", 4), "héll...");
        assert_eq!(snippet("short", 100), "short");
    }

    #[test]
    fn test_not_found_hint_mentions_legal_name() {
        let hint = ErrorKind::NotFound.hint().unwrap();
        assert!(hint.contains("full legal name"));
        assert!(ErrorKind::OracleCallFailed.hint().is_none());
    }
}
