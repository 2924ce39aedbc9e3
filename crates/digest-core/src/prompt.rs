use chrono::{DateTime, Utc};

use crate::context::section_marker;
use crate::models::SourceKind;

/// Fill `{sections}` and `{date}`, leaving `{context}` for the synthesis call
pub fn prepare_template(template: &str, sections: &[SourceKind], now: DateTime<Utc>) -> String {
    let markers = sections
        .iter()
        .map(|kind| section_marker(*kind))
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replace("{sections}", &markers)
        .replace("{date}", &now.format("%A, %-d %B %Y").to_string())
}

/// Substitute the context into a prepared template
pub fn render_prompt(template: &str, context_text: &str) -> String {
    template.replace("{context}", context_text)
}
