//! Document model, partial updates, and derived fields.

use crate::constants::{MAX_TITLE_CHARS, UNTITLED_TITLE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted document.
///
/// `title` and `word_count` are derived from `content` and are refreshed every
/// time content changes through [`Document::apply_patch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub word_count: usize,
}

/// Partial update applied by [`crate::DocumentStore::put`].
///
/// Fields left as `None` keep their stored value. `updated_at` defaults to the
/// store's clock when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub content: Option<String>,
    pub title: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lightweight row used by document list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub word_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document with derived title and word count.
    pub fn new(content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: derive_title(&content),
            word_count: count_words(&content),
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    ///
    /// A content change without an explicit title re-derives the title so the
    /// two never drift apart.
    pub fn apply_patch(&mut self, patch: &DocumentPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
            self.word_count = count_words(&self.content);
            if patch.title.is_none() {
                self.title = derive_title(&self.content);
            }
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        self.updated_at = patch.updated_at.unwrap_or_else(Utc::now);
    }

    /// Build the write-back patch for the current in-memory content.
    pub fn content_patch(&self, updated_at: DateTime<Utc>) -> DocumentPatch {
        DocumentPatch {
            content: Some(self.content.clone()),
            title: Some(derive_title(&self.content)),
            updated_at: Some(updated_at),
        }
    }
}

impl From<&Document> for DocumentSummary {
    fn from(value: &Document) -> Self {
        Self {
            id: value.id.clone(),
            title: value.title.clone(),
            word_count: value.word_count,
            updated_at: value.updated_at,
        }
    }
}

fn strip_block_marker(line: &str) -> &str {
    let line = line.trim_start_matches('#').trim_start();
    let line = line.strip_prefix("> ").unwrap_or(line);
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest;
        }
    }
    line
}

/// Derive a display title from the first non-empty line of `content`.
///
/// Leading heading/quote/list markers are dropped and the result is capped at
/// [`MAX_TITLE_CHARS`] characters on a char boundary.
///
/// # Returns
/// The derived title, or [`UNTITLED_TITLE`] when no line has visible text.
pub fn derive_title(content: &str) -> String {
    let Some(line) = content
        .lines()
        .map(|line| strip_block_marker(line.trim()).trim())
        .find(|line| !line.is_empty())
    else {
        return UNTITLED_TITLE.to_string();
    };
    match line.char_indices().nth(MAX_TITLE_CHARS) {
        Some((cut, _)) => line[..cut].trim_end().to_string(),
        None => line.to_string(),
    }
}

/// Count whitespace-separated words.
pub fn count_words(content: &str) -> usize {
    content.split_whitespace().count()
}
