use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Briefing, BriefingSection};

/// A briefing in its deliverable form
#[derive(Debug, Clone, Serialize)]
pub struct RenderedBriefing {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub struct BriefingRenderer {
    subject: String,
}

impl BriefingRenderer {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn render(&self, briefing: &Briefing, date: DateTime<Utc>) -> RenderedBriefing {
        RenderedBriefing {
            subject: self.subject_line(date),
            html: Self::generate_html(briefing, &self.subject, date),
            text: Self::generate_text(briefing, &self.subject, date),
        }
    }

    fn subject_line(&self, date: DateTime<Utc>) -> String {
        format!("{} - {}", self.subject, date.format("%-d %b %Y"))
    }

    pub fn generate_html(briefing: &Briefing, title: &str, date: DateTime<Utc>) -> String {
        let mut html = String::new();

        // Format date as "Friday, 16 October 2026"
        let formatted_date = date.format("%A, %-d %B %Y").to_string();

        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(&format!(
            "  <title>{} - {}</title>\n",
            Self::escape_html(title),
            formatted_date
        ));
        html.push_str("</head>\n<body>\n");
        html.push_str("<div style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: auto;\">\n");
        html.push_str(&format!(
            "  <h1 style=\"color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px;\">{}</h1>\n",
            Self::escape_html(title)
        ));
        html.push_str(&format!(
            "  <p style=\"color: #777; margin-top: 0;\">{}</p>\n",
            formatted_date
        ));

        for section in &briefing.sections {
            Self::push_html_section(&mut html, section);
        }

        html.push_str("  <hr style=\"border: 0; border-top: 1px solid #eee; margin: 20px 0;\">\n");
        html.push_str("  <footer style=\"font-size: 0.8em; color: #777;\">Sent by your research digest agent</footer>\n");
        html.push_str("</div>\n");
        html.push_str("</body>\n</html>");
        html
    }

    fn push_html_section(html: &mut String, section: &BriefingSection) {
        if !section.heading.is_empty() {
            html.push_str(&format!(
                "  <h2 style=\"color: #34495e; margin-top: 30px;\">{}</h2>\n",
                Self::escape_html(&section.heading)
            ));
        }

        for paragraph in Self::paragraphs(&section.body_text) {
            html.push_str(&format!(
                "  <p>{}</p>\n",
                Self::escape_html(&paragraph).replace('\n', "<br>")
            ));
        }

        if !section.items.is_empty() {
            html.push_str("  <p style=\"margin-bottom: 5px;\"><b>Sources</b></p>\n");
            html.push_str("  <ul style=\"margin: 0 0 20px 0; padding-left: 20px;\">\n");
            for item in &section.items {
                html.push_str(&format!(
                    "    <li><a href=\"{}\" style=\"color: #3498db; text-decoration: none;\">{}</a></li>\n",
                    Self::escape_html(&item.url),
                    Self::escape_html(&item.title)
                ));
            }
            html.push_str("  </ul>\n");
        }
    }

    pub fn generate_text(briefing: &Briefing, title: &str, date: DateTime<Utc>) -> String {
        let mut text = String::new();
        text.push_str(&format!("{}\n{}\n\n", title, date.format("%A, %-d %B %Y")));

        for section in &briefing.sections {
            if !section.heading.is_empty() {
                text.push_str(&format!(
                    "{}\n{}\n\n",
                    section.heading,
                    "=".repeat(section.heading.chars().count())
                ));
            }
            let body = section.body_text.trim();
            if !body.is_empty() {
                text.push_str(body);
                text.push_str("\n\n");
            }
            if !section.items.is_empty() {
                text.push_str("Sources:\n");
                for item in &section.items {
                    text.push_str(&format!("- {} <{}>\n", item.title, item.url));
                }
                text.push('\n');
            }
        }

        text
    }

    /// Split on blank lines, dropping empty paragraphs
    fn paragraphs(body: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in body.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    out.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line.trim_end());
            }
        }
        if !current.is_empty() {
            out.push(current.join("\n"));
        }
        out
    }

    fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}
