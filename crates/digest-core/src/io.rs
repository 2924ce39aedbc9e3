use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::Briefing;
use crate::render::RenderedBriefing;

/// Get the default directory for storing rendered briefings
pub fn get_default_output_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("research-digest")
        .join("briefings");

    Ok(data_dir)
}

/// File stem for a run, e.g. `briefing-2026-10-16-0600`
pub fn briefing_stem(date: DateTime<Utc>) -> String {
    format!("briefing-{}", date.format("%Y-%m-%d-%H%M"))
}

/// Write the rendered HTML and the structured briefing next to each other.
/// Returns the HTML path.
pub fn save_briefing(
    dir: &Path,
    stem: &str,
    rendered: &RenderedBriefing,
    briefing: &Briefing,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let html_path = dir.join(format!("{}.html", stem));
    fs::write(&html_path, &rendered.html).context("Failed to write briefing HTML")?;

    let json = serde_json::to_string_pretty(briefing).context("Failed to serialize briefing")?;
    let json_path = dir.join(format!("{}.json", stem));
    fs::write(&json_path, json).context("Failed to write briefing JSON")?;

    Ok(html_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BriefingSection;
    use chrono::TimeZone;

    #[test]
    fn test_briefing_stem_format() {
        let date = Utc.with_ymd_and_hms(2026, 10, 16, 6, 5, 0).unwrap();
        assert_eq!(briefing_stem(date), "briefing-2026-10-16-0605");
    }

    #[test]
    fn test_save_briefing_writes_both_files() {
        let dir = std::env::temp_dir().join(format!("research-digest-io-{}", std::process::id()));
        let briefing = Briefing::new(vec![BriefingSection {
            heading: "News".to_string(),
            body_text: "Body".to_string(),
            items: Vec::new(),
        }]);
        let rendered = RenderedBriefing {
            subject: "Subject".to_string(),
            html: "<p>Body</p>".to_string(),
            text: "Body".to_string(),
        };

        let html_path = save_briefing(&dir, "run", &rendered, &briefing).unwrap();
        assert_eq!(fs::read_to_string(&html_path).unwrap(), "<p>Body</p>");

        let json = fs::read_to_string(dir.join("run.json")).unwrap();
        let parsed: Briefing = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.sections[0].heading, "News");

        let _ = fs::remove_dir_all(&dir);
    }
}
