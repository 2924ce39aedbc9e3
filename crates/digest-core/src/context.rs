use crate::models::{Bundle, ContentItem, SourceKind};
use crate::normalize::truncate_at_word;

/// Appended to an item body that was cut to fit the budget
pub const TRUNCATION_MARKER: &str = " [truncated]";

const MARKER_KEYWORD: &str = "SECTION:";
const MARKER_PREFIX: &str = "## SECTION:";

/// The line that opens a section, both in the context and in the model's answer
pub fn section_marker(kind: SourceKind) -> String {
    format!("{} {}", MARKER_PREFIX, kind.label())
}

/// If `line` is a section marker, return its label
pub fn parse_section_marker(line: &str) -> Option<&str> {
    let trimmed = line
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_')
        .trim_start_matches('#')
        .trim_start();
    let keyword = trimmed.get(..MARKER_KEYWORD.len())?;
    if !keyword.eq_ignore_ascii_case(MARKER_KEYWORD) {
        return None;
    }
    let label = &trimmed[MARKER_KEYWORD.len()..];
    Some(label.trim().trim_end_matches(|c: char| c == '*' || c == '_').trim())
}

/// Serialized bundle plus the sections it contains, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisContext {
    pub text: String,
    pub sections: Vec<SourceKind>,
}

pub struct ContextBuilder {
    budget_chars: usize,
}

impl ContextBuilder {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    pub fn budget_chars(&self) -> usize {
        self.budget_chars
    }

    /// Smallest budget whose equal split still fits every section's marker line
    pub fn min_budget(kinds: &[SourceKind]) -> usize {
        let widest = kinds
            .iter()
            .map(|kind| char_len(&section_header(*kind)))
            .max()
            .unwrap_or(0);
        widest * kinds.len()
    }

    /// Serialize the bundle without exceeding the character budget.
    ///
    /// Every non-empty section gets an equal share. Output depends only on
    /// the bundle, so repeated calls produce identical text.
    pub fn build(&self, bundle: &Bundle) -> SynthesisContext {
        let kinds = bundle.sections();
        if kinds.is_empty() {
            return SynthesisContext {
                text: String::new(),
                sections: Vec::new(),
            };
        }

        let share = self.budget_chars / kinds.len();
        let mut text = String::new();
        let mut sections = Vec::new();

        for kind in kinds {
            let rendered = render_section(kind, bundle.items_of(kind), share);
            if rendered.is_empty() {
                continue;
            }
            text.push_str(&rendered);
            sections.push(kind);
        }

        tracing::debug!(
            chars = text.chars().count(),
            budget = self.budget_chars,
            sections = sections.len(),
            "context built"
        );

        SynthesisContext { text, sections }
    }
}

fn render_section<'a>(
    kind: SourceKind,
    items: impl Iterator<Item = &'a ContentItem>,
    share: usize,
) -> String {
    let header = section_header(kind);
    let header_len = char_len(&header);
    if header_len > share {
        return String::new();
    }

    let mut out = header;
    let mut used = header_len;

    for (idx, item) in items.enumerate() {
        let head = item_head(idx + 1, item);
        let body = format!("{}\n\n", item.body);
        let head_len = char_len(&head);
        let block_len = head_len + char_len(&body);
        let remaining = share - used;

        if block_len <= remaining {
            out.push_str(&head);
            out.push_str(&body);
            used += block_len;
            continue;
        }

        // Out of room: keep this item in shortened form and stop
        let marker_len = char_len(TRUNCATION_MARKER) + 2;
        if head_len + marker_len <= remaining {
            let room = remaining - head_len - marker_len;
            out.push_str(&head);
            out.push_str(&truncate_at_word(&item.body, room));
            out.push_str(TRUNCATION_MARKER);
            out.push_str("\n\n");
        } else {
            let block = format!("{}{}", head, body);
            out.push_str(take_chars(&block, remaining));
        }
        break;
    }

    out
}

fn section_header(kind: SourceKind) -> String {
    format!("{}\n\n", section_marker(kind))
}

fn item_head(position: usize, item: &ContentItem) -> String {
    let mut head = format!("[{}] {}\nURL: {}\n", position, item.title, item.url);
    if let Some(published) = item.published_at {
        head.push_str(&format!("Published: {}\n", published.format("%Y-%m-%d")));
    }
    head
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
