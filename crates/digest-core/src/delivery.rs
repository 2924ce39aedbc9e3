use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DeliveryError, DeliveryErrorKind};
use crate::io::save_briefing;
use crate::models::Briefing;
use crate::render::RenderedBriefing;

/// Where a finished briefing goes
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(
        &self,
        rendered: &RenderedBriefing,
        briefing: &Briefing,
    ) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Sends the briefing as e-mail through the Resend HTTP API
pub struct ResendChannel {
    client: Client,
    api_key: String,
    from: String,
    to: Vec<String>,
}

impl ResendChannel {
    pub fn new(api_key: String, from: String, to: Vec<String>) -> Result<Self> {
        if to.is_empty() {
            anyhow::bail!(
                "No recipients configured.\n\n\
                Add them to the [delivery] table of digest.toml:\n  \
                to = [\"you@example.com\"]"
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            from,
            to,
        })
    }
}

#[async_trait]
impl DeliveryChannel for ResendChannel {
    async fn deliver(
        &self,
        rendered: &RenderedBriefing,
        _briefing: &Briefing,
    ) -> Result<(), DeliveryError> {
        let email = ResendEmail {
            from: &self.from,
            to: &self.to,
            subject: &rendered.subject,
            html: &rendered.html,
            text: &rendered.text,
        };

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await
            .map_err(|e| DeliveryError::new(DeliveryErrorKind::Transport, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(DeliveryError::from_status(status, &error_text));
        }

        tracing::info!(recipients = self.to.len(), "briefing e-mailed");
        Ok(())
    }
}

/// Writes the briefing to disk instead of sending it
pub struct DryRunChannel {
    dir: PathBuf,
    stem: String,
}

impl DryRunChannel {
    pub fn new(dir: PathBuf, stem: impl Into<String>) -> Self {
        Self {
            dir,
            stem: stem.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for DryRunChannel {
    async fn deliver(
        &self,
        rendered: &RenderedBriefing,
        briefing: &Briefing,
    ) -> Result<(), DeliveryError> {
        let path = save_briefing(&self.dir, &self.stem, rendered, briefing)
            .map_err(|e| DeliveryError::new(DeliveryErrorKind::Transport, format!("{:#}", e)))?;
        tracing::info!(path = %path.display(), "briefing written (dry run)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resend_requires_recipients() {
        let err = ResendChannel::new("key".to_string(), "a@b.c".to_string(), Vec::new())
            .err()
            .unwrap();
        assert!(err.to_string().contains("No recipients"));
    }

    #[test]
    fn test_resend_payload_shape() {
        let to = vec!["reader@example.com".to_string()];
        let email = ResendEmail {
            from: "onboarding@resend.dev",
            to: &to,
            subject: "S",
            html: "<p>x</p>",
            text: "x",
        };
        let json = serde_json::to_value(&email).unwrap();
        assert_eq!(json["to"][0], "reader@example.com");
        assert_eq!(json["from"], "onboarding@resend.dev");
        assert_eq!(json["html"], "<p>x</p>");
    }

    #[tokio::test]
    async fn test_dry_run_writes_files() {
        let dir = std::env::temp_dir().join(format!("research-digest-dry-{}", std::process::id()));
        let channel = DryRunChannel::new(dir.clone(), "dry");
        let rendered = RenderedBriefing {
            subject: "S".to_string(),
            html: "<p>hi</p>".to_string(),
            text: "hi".to_string(),
        };
        channel
            .deliver(&rendered, &Briefing::new(Vec::new()))
            .await
            .unwrap();
        assert!(dir.join("dry.html").exists());
        assert!(dir.join("dry.json").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
