//! Maps provider-native records onto [`ContentItem`].
//!
//! Malformed upstream data is expected: every function here returns `None`
//! for records it cannot use instead of failing.

use chrono::{DateTime, Utc};

use crate::models::{ContentItem, SourceKind};
use crate::sources::{ArxivEntry, NewsArticle, RawItem};

/// Title NewsAPI substitutes for articles that were taken down
const REMOVED_PLACEHOLDER: &str = "[Removed]";

pub fn normalize(raw: &RawItem, body_max_chars: usize) -> Option<ContentItem> {
    match raw {
        RawItem::Paper(entry) => normalize_paper(entry, body_max_chars),
        RawItem::News(article) => normalize_news(article, body_max_chars),
    }
}

fn normalize_paper(entry: &ArxivEntry, body_max_chars: usize) -> Option<ContentItem> {
    let title = clean_text(entry.title.as_deref()?);
    let url = entry
        .alternate_link()
        .or(entry.id.as_deref())
        .map(str::trim)
        .filter(|u| !u.is_empty())?
        .to_string();
    if title.is_empty() {
        return None;
    }

    let summary = clean_text(entry.summary.as_deref().unwrap_or(""));
    let body = truncate_at_word(&summary, body_max_chars);

    Some(ContentItem {
        source_kind: SourceKind::Paper,
        title,
        body,
        url,
        published_at: entry.published.as_deref().and_then(parse_timestamp),
    })
}

fn normalize_news(article: &NewsArticle, body_max_chars: usize) -> Option<ContentItem> {
    let title = clean_text(article.title.as_deref()?);
    let url = article
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())?;
    if title.is_empty() || title == REMOVED_PLACEHOLDER {
        return None;
    }

    // Prefer the description; fall back to the truncated content snippet
    let raw_body = article
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(article.content.as_deref())
        .unwrap_or("");
    let body = truncate_at_word(&strip_html(raw_body), body_max_chars);

    Some(ContentItem {
        source_kind: SourceKind::News,
        title,
        body,
        url: url.to_string(),
        published_at: article.published_at.as_deref().and_then(parse_timestamp),
    })
}

/// Collapse all runs of whitespace (including newlines in Atom titles) to single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert HTML fragments to plain text, leaving plain strings untouched
fn strip_html(text: &str) -> String {
    if text.contains('<') {
        clean_text(&html2text::from_read(text.as_bytes(), 1_000))
    } else {
        clean_text(text)
    }
}

/// Cut `text` to at most `max_chars` characters at a whole-word boundary.
///
/// A single word longer than the limit is dropped rather than split, so the
/// result may be empty.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    // Byte index of the first character past the limit
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());

    let head = &text[..cut];
    let next_is_space = text[cut..].starts_with(char::is_whitespace);
    let kept = if next_is_space {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(idx) => &head[..idx],
            None => "",
        }
    };

    kept.trim_end().to_string()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
