use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{RawItem, SourceConnector};
use crate::error::{SourceError, SourceErrorKind};
use crate::models::SourceKind;

const NEWS_API: &str = "https://newsapi.org/v2/everything";

/// NewsAPI caps `pageSize` at 100
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct NewsArticle {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

pub struct NewsApiConnector {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl NewsApiConnector {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            endpoint: NEWS_API.to_string(),
        })
    }

    fn request_url(&self, query: &str, limit: usize) -> Result<Url, SourceError> {
        let page_size = limit.min(MAX_PAGE_SIZE);
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query.trim().to_string()),
                ("sortBy", "publishedAt".to_string()),
                ("language", "en".to_string()),
                ("pageSize", page_size.to_string()),
            ],
        )
        .map_err(|e| {
            SourceError::new(SourceErrorKind::Transport, format!("bad NewsAPI URL: {}", e))
        })
    }
}

/// Interpret a NewsAPI body. Error codes in the body win over the HTTP status.
pub fn parse_response(
    status: reqwest::StatusCode,
    body: &str,
    query: &str,
) -> Result<Vec<NewsArticle>, SourceError> {
    let parsed: NewsResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if !status.is_success() => return Err(SourceError::from_status(status, body)),
        Err(e) => {
            return Err(SourceError::new(
                SourceErrorKind::Transport,
                format!("Failed to parse NewsAPI response: {}", e),
            ))
        }
    };

    if parsed.status != "ok" {
        let code = parsed.code.unwrap_or_default();
        let message = parsed.message.unwrap_or_else(|| "unknown error".to_string());
        let kind = match code.as_str() {
            "apiKeyInvalid" | "apiKeyMissing" | "apiKeyDisabled" | "apiKeyExhausted" => {
                SourceErrorKind::Auth
            }
            "rateLimited" => SourceErrorKind::RateLimit,
            _ if !status.is_success() => SourceError::from_status(status, &message).kind,
            _ => SourceErrorKind::Transport,
        };
        return Err(SourceError::new(kind, format!("NewsAPI {}: {}", code, message)));
    }

    if parsed.articles.is_empty() {
        return Err(SourceError::empty(query));
    }

    Ok(parsed.articles)
}

#[async_trait]
impl SourceConnector for NewsApiConnector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawItem>, SourceError> {
        let url = self.request_url(query, limit)?;

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(&e))?;

        let articles = parse_response(status, &body, query)?;
        Ok(articles.into_iter().map(RawItem::News).collect())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }
}
