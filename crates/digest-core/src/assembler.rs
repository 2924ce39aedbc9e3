use crate::context::parse_section_marker;
use crate::error::AssemblyWarning;
use crate::models::{Briefing, BriefingSection, Bundle, SourceKind};

pub struct BriefingAssembler;

impl BriefingAssembler {
    /// Split synthesized text into the expected sections and attach each
    /// section's source items.
    ///
    /// Sections come only from explicit marker lines. When the markers don't
    /// line up with `expected`, the whole text becomes one unlabeled section
    /// and a warning is returned alongside the briefing.
    pub fn assemble(
        text: &str,
        expected: &[SourceKind],
        bundle: &Bundle,
    ) -> (Briefing, Option<AssemblyWarning>) {
        match Self::split_by_markers(text, expected) {
            Ok(bodies) => {
                let sections = expected
                    .iter()
                    .zip(bodies)
                    .map(|(kind, body_text)| BriefingSection {
                        heading: kind.label().to_string(),
                        body_text,
                        items: bundle.items_of(*kind).cloned().collect(),
                    })
                    .collect();
                (Briefing::new(sections), None)
            }
            Err(found) => {
                let warning = AssemblyWarning::MarkerMismatch {
                    expected: expected.len(),
                    found,
                };
                tracing::warn!(%warning, "falling back to a single section");
                let section = BriefingSection {
                    heading: String::new(),
                    body_text: text.trim().to_string(),
                    items: bundle.items.clone(),
                };
                (Briefing::new(vec![section]), Some(warning))
            }
        }
    }

    /// Section bodies in `expected` order, or the number of markers found
    /// when they don't match
    fn split_by_markers(text: &str, expected: &[SourceKind]) -> Result<Vec<String>, usize> {
        let mut preamble: Vec<&str> = Vec::new();
        let mut found: Vec<(Option<SourceKind>, Vec<&str>)> = Vec::new();

        for line in text.lines() {
            if let Some(label) = parse_section_marker(line) {
                found.push((SourceKind::from_label(label), Vec::new()));
                continue;
            }
            match found.last_mut() {
                Some((_, lines)) => lines.push(line),
                None => preamble.push(line),
            }
        }

        let labels_match = found.len() == expected.len()
            && found
                .iter()
                .zip(expected)
                .all(|((kind, _), want)| *kind == Some(*want));
        if expected.is_empty() || !labels_match {
            return Err(found.len());
        }

        let mut bodies: Vec<String> = found
            .into_iter()
            .map(|(_, lines)| lines.join("\n").trim().to_string())
            .collect();

        let preamble = preamble.join("\n").trim().to_string();
        if !preamble.is_empty() {
            if let Some(first) = bodies.first_mut() {
                *first = if first.is_empty() {
                    preamble
                } else {
                    format!("{}\n\n{}", preamble, first)
                };
            }
        }

        Ok(bodies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;

    fn bundle() -> Bundle {
        let mk = |kind: SourceKind, title: &str| ContentItem {
            source_kind: kind,
            title: title.to_string(),
            body: String::new(),
            url: format!("https://example.com/{}", title),
            published_at: None,
        };
        Bundle {
            items: vec![
                mk(SourceKind::Paper, "P1"),
                mk(SourceKind::Paper, "P2"),
                mk(SourceKind::News, "N1"),
            ],
            source_failures: Default::default(),
        }
    }

    const BOTH: [SourceKind; 2] = [SourceKind::Paper, SourceKind::News];

    #[test]
    fn test_splits_at_markers() {
        let text = "## SECTION: Research Papers\nPapers were good.\n\nVery good.\n## SECTION: News\nNews was fine.\n";
        let (briefing, warning) = BriefingAssembler::assemble(text, &BOTH, &bundle());
        assert!(warning.is_none());
        assert_eq!(briefing.sections.len(), 2);
        assert_eq!(briefing.sections[0].heading, "Research Papers");
        assert_eq!(briefing.sections[0].body_text, "Papers were good.\n\nVery good.");
        assert_eq!(briefing.sections[0].items.len(), 2);
        assert_eq!(briefing.sections[1].heading, "News");
        assert_eq!(briefing.sections[1].items[0].title, "N1");
    }

    #[test]
    fn test_preamble_goes_to_first_section() {
        let text = "Good morning.\n## SECTION: Research Papers\nBody.\n## SECTION: News\nMore.";
        let (briefing, warning) = BriefingAssembler::assemble(text, &BOTH, &bundle());
        assert!(warning.is_none());
        assert_eq!(briefing.sections[0].body_text, "Good morning.\n\nBody.");
    }

    #[test]
    fn test_missing_marker_falls_back() {
        let text = "## SECTION: Research Papers\nEverything in one place.";
        let (briefing, warning) = BriefingAssembler::assemble(text, &BOTH, &bundle());
        assert_eq!(
            warning,
            Some(AssemblyWarning::MarkerMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(briefing.sections.len(), 1);
        assert_eq!(briefing.sections[0].heading, "");
        assert_eq!(briefing.sections[0].body_text, text);
        assert_eq!(briefing.sections[0].items.len(), 3);
    }

    #[test]
    fn test_out_of_order_markers_fall_back() {
        let text = "## SECTION: News\nA\n## SECTION: Research Papers\nB";
        let (briefing, warning) = BriefingAssembler::assemble(text, &BOTH, &bundle());
        assert!(warning.is_some());
        assert_eq!(briefing.sections.len(), 1);
    }

    #[test]
    fn test_unknown_label_falls_back() {
        let text = "## SECTION: Research Papers\nA\n## SECTION: Weather\nB";
        let (_, warning) = BriefingAssembler::assemble(text, &BOTH, &bundle());
        assert!(warning.is_some());
    }

    #[test]
    fn test_single_expected_section() {
        let text = "## SECTION: Research Papers\nOnly papers today.";
        let (briefing, warning) =
            BriefingAssembler::assemble(text, &[SourceKind::Paper], &bundle());
        assert!(warning.is_none());
        assert_eq!(briefing.sections.len(), 1);
        assert_eq!(briefing.sections[0].heading, "Research Papers");
        assert_eq!(briefing.item_count(), 2);
    }
}
