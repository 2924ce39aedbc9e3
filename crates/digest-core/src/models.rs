use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::SourceError;

/// Which external index an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Paper,
    News,
}

impl SourceKind {
    /// Label used for section markers and rendered headings
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Paper => "Research Papers",
            SourceKind::News => "News",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        [SourceKind::Paper, SourceKind::News]
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Paper => write!(f, "paper"),
            SourceKind::News => write!(f, "news"),
        }
    }
}

/// Canonical unit of content after normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub source_kind: SourceKind,
    pub title: String,
    pub body: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Everything fetched during one run, grouped in section order
#[derive(Debug, Default)]
pub struct Bundle {
    pub items: Vec<ContentItem>,
    pub source_failures: BTreeMap<SourceKind, SourceError>,
}

impl Bundle {
    /// True when nothing was fetched because every source failed
    pub fn is_total_failure(&self) -> bool {
        self.items.is_empty() && !self.source_failures.is_empty()
    }

    /// Section kinds that hold at least one item, in bundle order
    pub fn sections(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<SourceKind> = Vec::new();
        for item in &self.items {
            if !kinds.contains(&item.source_kind) {
                kinds.push(item.source_kind);
            }
        }
        kinds
    }

    pub fn items_of(&self, kind: SourceKind) -> impl Iterator<Item = &ContentItem> {
        self.items.iter().filter(move |item| item.source_kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingSection {
    /// Empty for the unlabeled fallback section
    pub heading: String,
    pub body_text: String,
    pub items: Vec<ContentItem>,
}

/// Final artifact of a run, ready for rendering and delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub version: String,
    pub created_at: String,
    pub sections: Vec<BriefingSection>,
}

impl Briefing {
    pub fn new(sections: Vec<BriefingSection>) -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: Utc::now().to_rfc3339(),
            sections,
        }
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }
}
