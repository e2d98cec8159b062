use scraper::{Html, Node};
use std::sync::Arc;

use crate::core::error::{ErrorKind, StageError};
use crate::edgar::client::EdgarApi;

/// Phrases that mark change of control disclosure.
pub const TOPIC_PHRASES: [&str; 2] = ["change in control", "change of control"];

/// Characters of context kept on each side of a phrase occurrence.
pub const CONTEXT_WINDOW: usize = 1000;

/// Documents with less extracted text than this are treated as empty.
pub const MIN_DOCUMENT_CHARS: usize = 200;

/// Visible text of an HTML document, one trimmed non-empty line per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style"))
        });
        if !hidden {
            text.push_str(fragment);
        }
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Blocks of `window` characters around every occurrence of every phrase.
///
/// Matching is case-insensitive and overlapping: after a hit the scan resumes
/// one character later, so nested and adjacent mentions each get a block.
/// Blocks come out grouped by phrase, in document order within a phrase.
pub fn extract_context_around_phrases(text: &str, phrases: &[&str], window: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let lowered: Vec<char> = chars.iter().map(|&c| fold_char(c)).collect();

    let mut blocks = Vec::new();
    for phrase in phrases {
        let needle: Vec<char> = phrase.chars().map(fold_char).collect();
        if needle.is_empty() || needle.len() > lowered.len() {
            continue;
        }

        for pos in 0..=(lowered.len() - needle.len()) {
            if lowered[pos..pos + needle.len()] == needle[..] {
                let start = pos.saturating_sub(window);
                let end = (pos + needle.len() + window).min(chars.len());
                blocks.push(chars[start..end].iter().collect());
            }
        }
    }
    blocks
}

// Single-char lowercase so indices into the folded text match the original.
fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Cut extracted document text down to the topic windows.
pub fn reduce_text(text: &str, phrases: &[&str], window: usize) -> Result<Vec<String>, StageError> {
    let length = text.chars().count();
    if length < MIN_DOCUMENT_CHARS {
        return Err(StageError::new(
            ErrorKind::EmptyDocument,
            format!(
                "Document text is {} characters, below the {} character minimum",
                length, MIN_DOCUMENT_CHARS
            ),
        ));
    }

    let blocks = extract_context_around_phrases(text, phrases, window);
    if blocks.is_empty() {
        return Err(StageError::new(
            ErrorKind::NoRelevantText,
            format!("None of {:?} appear in the document", phrases),
        ));
    }
    Ok(blocks)
}

/// Fetches filing documents and reduces them to the relevant text.
pub struct DocumentReducer {
    api: Arc<dyn EdgarApi>,
    phrases: Vec<String>,
    window: usize,
}

impl DocumentReducer {
    pub fn new(api: Arc<dyn EdgarApi>) -> Self {
        Self {
            api,
            phrases: TOPIC_PHRASES.iter().map(|p| p.to_string()).collect(),
            window: CONTEXT_WINDOW,
        }
    }

    pub fn with_phrases(mut self, phrases: Vec<String>, window: usize) -> Self {
        self.phrases = phrases;
        self.window = window;
        self
    }

    pub async fn reduce(&self, document_url: &str) -> Result<Vec<String>, StageError> {
        let html = self.api.document(document_url).await.map_err(|e| {
            StageError::new(
                ErrorKind::EmptyDocument,
                format!("Error fetching {}: {}", document_url, e),
            )
        })?;

        let text = html_to_text(&html);
        let phrases: Vec<&str> = self.phrases.iter().map(String::as_str).collect();
        let blocks = reduce_text(&text, &phrases, self.window)?;

        log::info!(
            "Found {} relevant text blocks in {} characters of text",
            blocks.len(),
            text.len()
        );
        Ok(blocks)
    }
}
