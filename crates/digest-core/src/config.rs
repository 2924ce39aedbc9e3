use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::ContextBuilder;
use crate::models::SourceKind;

const APP_DIR: &str = "research-digest";

const MAX_ATTEMPTS: u32 = 10;

/// Default prompt. `{sections}` and `{date}` are filled before the context goes in.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are a top-tier AI researcher writing a daily briefing newsletter.
Today is {date}.

Summarize the material below for a technical reader. For each section, explain
what is new, why it matters, and how the items relate to each other. Write plain
prose paragraphs separated by blank lines. Do not use HTML or Markdown tables.

Begin each section with its marker line, exactly as written, in this order:
{sections}

Material:
{context}
"#;

/// API credentials, passed explicitly into each client
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub resend_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self {
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            google_api_key: non_empty_var("GOOGLE_API_KEY"),
            news_api_key: non_empty_var("NEWS_API_KEY"),
            resend_api_key: non_empty_var("RESEND_API_KEY"),
        }
    }

    pub fn require_anthropic(&self) -> Result<String> {
        require(
            &self.anthropic_api_key,
            "ANTHROPIC_API_KEY",
            "Get your Anthropic API key from: https://console.anthropic.com/settings/keys",
        )
    }

    pub fn require_google(&self) -> Result<String> {
        require(
            &self.google_api_key,
            "GOOGLE_API_KEY",
            "Get your Gemini API key from: https://aistudio.google.com/app/apikey",
        )
    }

    pub fn require_news(&self) -> Result<String> {
        require(
            &self.news_api_key,
            "NEWS_API_KEY",
            "Get your NewsAPI key from: https://newsapi.org/register",
        )
    }

    pub fn require_resend(&self) -> Result<String> {
        require(
            &self.resend_api_key,
            "RESEND_API_KEY",
            "Get your Resend API key from: https://resend.com/api-keys",
        )
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/research-digest/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // None found is fine; variables may be set by the scheduler
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn require(value: &Option<String>, name: &str, hint: &str) -> Result<String> {
    value.clone().with_context(|| {
        format!(
            "{name} not found.\n\n\
            To fix this, set it in the environment or add it to ~/.config/{APP_DIR}/.env:\n  \
            {name}=your_key_here\n\n\
            {hint}"
        )
    })
}

/// One configured source and how much to take from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub query: String,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisProvider {
    Anthropic,
    Gemini,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub provider: SynthesisProvider,
    pub model: String,
    pub max_tokens: u32,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            provider: SynthesisProvider::Anthropic,
            model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 4096,
            max_attempts: 3,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            from: "onboarding@resend.dev".to_string(),
            to: Vec::new(),
            subject: "Daily AI Research Briefing".to_string(),
        }
    }
}

/// Pipeline settings, read from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub sources: Vec<SourceSpec>,
    /// Section order of the briefing; defaults to first appearance in `sources`
    pub section_order: Vec<SourceKind>,
    pub context_budget_chars: usize,
    pub body_max_chars: usize,
    pub per_source_timeout_secs: u64,
    pub run_deadline_secs: u64,
    pub prompt_template: String,
    pub synthesis: SynthesisSettings,
    pub delivery: DeliverySettings,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                SourceSpec {
                    kind: SourceKind::Paper,
                    query: "Artificial Intelligence".to_string(),
                    limit: 3,
                },
                SourceSpec {
                    kind: SourceKind::News,
                    query: "artificial intelligence".to_string(),
                    limit: 5,
                },
            ],
            section_order: Vec::new(),
            context_budget_chars: 12_000,
            body_max_chars: 2_000,
            per_source_timeout_secs: 30,
            run_deadline_secs: 120,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            synthesis: SynthesisSettings::default(),
            delivery: DeliverySettings::default(),
        }
    }
}

impl DigestConfig {
    /// Load from an explicit path, else the default config location, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_path(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => Self::from_path(&p)?,
                None => {
                    tracing::info!("no config file found, using built-in defaults");
                    Self::default()
                }
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("digest.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("Config must list at least one source under [[sources]]");
        }
        for source in &self.sources {
            if source.limit == 0 {
                anyhow::bail!(
                    "Source {} ({:?}) has limit 0; limit must be positive",
                    source.kind,
                    source.query
                );
            }
            if source.query.trim().is_empty() {
                anyhow::bail!("Source {} has an empty query", source.kind);
            }
        }
        let min_budget = ContextBuilder::min_budget(&self.resolved_section_order());
        if self.context_budget_chars == 0 || self.context_budget_chars < min_budget {
            anyhow::bail!(
                "context_budget_chars is {} but must be at least {} to fit every section",
                self.context_budget_chars,
                min_budget
            );
        }
        if !self.prompt_template.contains("{context}") {
            anyhow::bail!("prompt_template must contain the {{context}} placeholder");
        }
        if self.synthesis.max_attempts == 0 || self.synthesis.max_attempts > MAX_ATTEMPTS {
            anyhow::bail!(
                "synthesis.max_attempts must be between 1 and {}",
                MAX_ATTEMPTS
            );
        }
        Ok(())
    }

    /// Briefing section order: explicit order first, then any remaining source kinds
    pub fn resolved_section_order(&self) -> Vec<SourceKind> {
        let mut order: Vec<SourceKind> = Vec::new();
        for kind in self
            .section_order
            .iter()
            .copied()
            .chain(self.sources.iter().map(|s| s.kind))
        {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        order
    }

    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_secs(self.per_source_timeout_secs)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = DigestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.resolved_section_order(),
            vec![SourceKind::Paper, SourceKind::News]
        );
    }

    #[test]
    fn test_parse_toml_with_partial_fields() {
        let toml = r#"
            context_budget_chars = 8000
            section_order = ["news"]

            [[sources]]
            kind = "paper"
            query = "cat:cs.LG"
            limit = 4

            [[sources]]
            kind = "news"
            query = "openai"
            limit = 2

            [delivery]
            to = ["reader@example.com"]
        "#;
        let config = DigestConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.context_budget_chars, 8000);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].query, "cat:cs.LG");
        assert_eq!(config.delivery.to, vec!["reader@example.com".to_string()]);
        assert_eq!(config.delivery.from, "onboarding@resend.dev");
        assert_eq!(config.body_max_chars, 2_000);
        assert_eq!(
            config.resolved_section_order(),
            vec![SourceKind::News, SourceKind::Paper]
        );
    }

    #[test]
    fn test_rejects_zero_limit() {
        let mut config = DigestConfig::default();
        config.sources[0].limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_template_without_context() {
        let config = DigestConfig {
            prompt_template: "Summarize {sections}".to_string(),
            ..DigestConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{context}"));
    }

    #[test]
    fn test_rejects_budget_too_small_for_markers() {
        let config = DigestConfig {
            context_budget_chars: 40,
            ..DigestConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 58"));

        let config = DigestConfig {
            context_budget_chars: 58,
            ..DigestConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_excessive_attempts() {
        let mut config = DigestConfig::default();
        config.synthesis.max_attempts = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_sources() {
        let config = DigestConfig {
            sources: Vec::new(),
            ..DigestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_reports_missing_key() {
        let creds = Credentials::default();
        let err = creds.require_news().unwrap_err();
        assert!(err.to_string().contains("NEWS_API_KEY"));
    }
}
