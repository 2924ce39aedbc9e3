use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{RawItem, SourceConnector};
use crate::error::{SourceError, SourceErrorKind};
use crate::models::SourceKind;

const ARXIV_API: &str = "https://export.arxiv.org/api/query";

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<ArxivEntry>,
}

/// One `<entry>` of the arXiv Atom feed
#[derive(Debug, Clone, Deserialize)]
pub struct ArxivEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub published: Option<String>,
    #[serde(rename = "link", default)]
    pub links: Vec<AtomLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtomLink {
    #[serde(rename = "@href")]
    pub href: Option<String>,
    #[serde(rename = "@rel")]
    pub rel: Option<String>,
}

impl ArxivEntry {
    /// The abstract page link (`rel="alternate"`)
    pub fn alternate_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel.as_deref() == Some("alternate"))
            .and_then(|l| l.href.as_deref())
    }
}

/// Reads the newest submissions matching a query from the arXiv API
pub struct ArxivConnector {
    client: Client,
    endpoint: String,
}

impl ArxivConnector {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("research-digest/0.1 (+https://arxiv.org/help/api)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: ARXIV_API.to_string(),
        })
    }

    fn request_url(&self, query: &str, limit: usize) -> Result<Url, SourceError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("search_query", search_query(query)),
                ("start", "0".to_string()),
                ("max_results", limit.to_string()),
                ("sortBy", "submittedDate".to_string()),
                ("sortOrder", "descending".to_string()),
            ],
        )
        .map_err(|e| {
            SourceError::new(SourceErrorKind::Transport, format!("bad arXiv URL: {}", e))
        })
    }
}

/// Plain phrases search all fields; queries with a field prefix pass through
fn search_query(query: &str) -> String {
    let query = query.trim();
    if query.contains(':') {
        query.to_string()
    } else {
        format!("all:\"{}\"", query)
    }
}

/// Parse an Atom feed body into entries, newest first as served
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>, SourceError> {
    let feed: Feed = from_str(xml).map_err(|e| {
        SourceError::new(
            SourceErrorKind::Transport,
            format!("Failed to parse arXiv Atom feed: {}", e),
        )
    })?;
    Ok(feed.entries)
}

#[async_trait]
impl SourceConnector for ArxivConnector {
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawItem>, SourceError> {
        let url = self.request_url(query, limit)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(SourceError::from_status(status, &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(&e))?;

        let entries = parse_feed(&body)?;
        if entries.is_empty() {
            return Err(SourceError::empty(query));
        }

        Ok(entries.into_iter().map(RawItem::Paper).collect())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:"Artificial Intelligence"</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2026-10-16T00:00:00-04:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2610.01234v1</id>
    <updated>2026-10-15T17:59:58Z</updated>
    <published>2026-10-15T17:59:58Z</published>
    <title>Scaling Laws for
      Tiny Agents</title>
    <summary>  We study how small agents scale.
    </summary>
    <author><name>Ada Lovelace</name></author>
    <arxiv:primary_category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
    <link href="http://arxiv.org/abs/2610.01234v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2610.01234v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2610.00042v2</id>
    <published>2026-10-14T09:00:00Z</published>
    <title>Second Paper</title>
    <summary>Another abstract.</summary>
    <link href="http://arxiv.org/abs/2610.00042v2" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: nothing</title>
  <id>http://arxiv.org/api/def</id>
</feed>"#;

    #[test]
    fn test_parse_feed_preserves_order() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].alternate_link(),
            Some("http://arxiv.org/abs/2610.01234v1")
        );
        assert_eq!(entries[1].title.as_deref(), Some("Second Paper"));
    }

    // Entries with a DOI interleave other arxiv: elements between the links
    const DOI_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <entry>
    <id>http://arxiv.org/abs/2610.05555v1</id>
    <published>2026-10-15T12:00:00Z</published>
    <title>Published Elsewhere</title>
    <summary>Also in a journal.</summary>
    <author><name>Grace Hopper</name></author>
    <arxiv:doi>10.1000/xyz123</arxiv:doi>
    <link title="doi" href="http://dx.doi.org/10.1000/xyz123" rel="related"/>
    <arxiv:comment>12 pages, 3 figures</arxiv:comment>
    <arxiv:journal_ref>J. Imaginary Res. 1 (2026)</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/2610.05555v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2610.05555v1" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_entry_with_split_links() {
        let entries = parse_feed(DOI_FEED).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].links.len(), 3);
        assert_eq!(
            entries[0].alternate_link(),
            Some("http://arxiv.org/abs/2610.05555v1")
        );
    }

    #[test]
    fn test_parse_empty_feed() {
        let entries = parse_feed(EMPTY_FEED).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_transport_error() {
        let err = parse_feed("<feed><entry>").unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Transport);
    }

    #[test]
    fn test_search_query_prefixing() {
        assert_eq!(search_query("Artificial Intelligence"), "all:\"Artificial Intelligence\"");
        assert_eq!(search_query("cat:cs.LG"), "cat:cs.LG");
    }

    #[test]
    fn test_request_url_encodes_parameters() {
        let connector = ArxivConnector::new(Duration::from_secs(5)).unwrap();
        let url = connector.request_url("large language models", 3).unwrap();
        let query = url.query().unwrap_or_default();
        assert!(query.contains("max_results=3"));
        assert!(query.contains("sortBy=submittedDate"));
        assert!(query.contains("sortOrder=descending"));
        assert!(!query.contains(' '));
    }
}
