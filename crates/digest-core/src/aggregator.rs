use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::config::SourceSpec;
use crate::error::{SourceError, SourceErrorKind};
use crate::models::{Bundle, ContentItem, SourceKind};
use crate::normalize::normalize;
use crate::sources::SourceConnector;

/// A connector paired with what to ask it for
pub struct ConfiguredSource {
    pub connector: Box<dyn SourceConnector>,
    pub spec: SourceSpec,
}

impl ConfiguredSource {
    pub fn new(
        connector: Box<dyn SourceConnector>,
        query: impl Into<String>,
        limit: usize,
    ) -> Self {
        let spec = SourceSpec {
            kind: connector.kind(),
            query: query.into(),
            limit,
        };
        Self { connector, spec }
    }
}

pub struct Aggregator {
    sources: Vec<ConfiguredSource>,
    section_order: Vec<SourceKind>,
    per_source_timeout: Duration,
    run_deadline: Duration,
    body_max_chars: usize,
}

impl Aggregator {
    pub fn new(sources: Vec<ConfiguredSource>) -> Self {
        Self {
            sources,
            section_order: Vec::new(),
            per_source_timeout: Duration::from_secs(30),
            run_deadline: Duration::from_secs(120),
            body_max_chars: 2_000,
        }
    }

    pub fn with_section_order(mut self, order: Vec<SourceKind>) -> Self {
        self.section_order = order;
        self
    }

    pub fn with_timeouts(mut self, per_source: Duration, run_deadline: Duration) -> Self {
        self.per_source_timeout = per_source;
        self.run_deadline = run_deadline;
        self
    }

    pub fn with_body_max_chars(mut self, max_chars: usize) -> Self {
        self.body_max_chars = max_chars;
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Fetch every source concurrently and merge the results into one bundle.
    ///
    /// A failing source never affects the others. Sources still pending at the
    /// run deadline are dropped and recorded as timeouts.
    pub async fn aggregate(&self) -> Bundle {
        let deadline = Instant::now() + self.run_deadline;
        let source_deadline = (Instant::now() + self.per_source_timeout).min(deadline);

        let fetches = self.sources.iter().map(|source| async move {
            let spec = &source.spec;
            let result = match timeout_at(
                source_deadline,
                source.connector.fetch(&spec.query, spec.limit),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SourceError::new(
                    SourceErrorKind::Timeout,
                    format!("no response from {} source before the deadline", spec.kind),
                )),
            };
            let normalized = result.map(|raw| {
                raw.iter()
                    .filter_map(|r| normalize(r, self.body_max_chars))
                    .take(spec.limit)
                    .collect::<Vec<_>>()
            });
            (spec, normalized)
        });

        // Fan-in only after every source has finished or timed out
        let results = join_all(fetches).await;

        let mut per_source: Vec<(SourceKind, Vec<ContentItem>)> = Vec::new();
        let mut source_failures = BTreeMap::new();

        for (spec, result) in results {
            match result {
                Ok(items) => {
                    tracing::info!(
                        source = %spec.kind,
                        query = %spec.query,
                        items = items.len(),
                        "source fetched"
                    );
                    per_source.push((spec.kind, items));
                }
                Err(err) => {
                    tracing::warn!(
                        source = %spec.kind,
                        query = %spec.query,
                        kind = %err.kind,
                        cause = %err.cause,
                        "source failed, continuing without it"
                    );
                    source_failures.insert(spec.kind, err);
                }
            }
        }

        let items = merge_in_section_order(per_source, &self.section_order);

        Bundle {
            items,
            source_failures,
        }
    }
}

/// Concatenate per-source item lists grouped by section, keeping each list's
/// internal order and dropping URLs already seen earlier in the run
fn merge_in_section_order(
    per_source: Vec<(SourceKind, Vec<ContentItem>)>,
    section_order: &[SourceKind],
) -> Vec<ContentItem> {
    let mut order: Vec<SourceKind> = section_order.to_vec();
    for (kind, _) in &per_source {
        if !order.contains(kind) {
            order.push(*kind);
        }
    }

    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for kind in order {
        for (_, items) in per_source.iter().filter(|(k, _)| *k == kind) {
            for item in items {
                if seen_urls.insert(item.url.clone()) {
                    merged.push(item.clone());
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{NewsArticle, RawItem};
    use async_trait::async_trait;

    struct StaticNews {
        titles: Vec<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl SourceConnector for StaticNews {
        async fn fetch(&self, _query: &str, _limit: usize) -> Result<Vec<RawItem>, SourceError> {
            tokio::time::sleep(self.delay).await;
            Ok(self
                .titles
                .iter()
                .map(|t| {
                    RawItem::News(NewsArticle {
                        title: Some(t.to_string()),
                        url: Some(format!("https://news.example/{}", t)),
                        description: Some(format!("About {}", t)),
                        content: None,
                        published_at: None,
                    })
                })
                .collect())
        }

        fn kind(&self) -> SourceKind {
            SourceKind::News
        }
    }

    fn item(kind: SourceKind, url: &str) -> ContentItem {
        ContentItem {
            source_kind: kind,
            title: url.to_string(),
            body: String::new(),
            url: url.to_string(),
            published_at: None,
        }
    }

    #[test]
    fn test_merge_respects_section_order() {
        let per_source = vec![
            (
                SourceKind::Paper,
                vec![item(SourceKind::Paper, "p1"), item(SourceKind::Paper, "p2")],
            ),
            (SourceKind::News, vec![item(SourceKind::News, "n1")]),
        ];
        let merged = merge_in_section_order(per_source, &[SourceKind::News]);
        let urls: Vec<&str> = merged.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["n1", "p1", "p2"]);
    }

    #[test]
    fn test_merge_drops_repeated_urls() {
        let per_source = vec![
            (
                SourceKind::News,
                vec![item(SourceKind::News, "a"), item(SourceKind::News, "b")],
            ),
            (
                SourceKind::News,
                vec![item(SourceKind::News, "b"), item(SourceKind::News, "c")],
            ),
        ];
        let merged = merge_in_section_order(per_source, &[]);
        let urls: Vec<&str> = merged.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_limit_caps_normalized_items() {
        let source = ConfiguredSource::new(
            Box::new(StaticNews {
                titles: vec!["one", "two", "three"],
                delay: Duration::ZERO,
            }),
            "ai",
            2,
        );
        let bundle = Aggregator::new(vec![source]).aggregate().await;
        assert_eq!(bundle.items.len(), 2);
        assert_eq!(bundle.items[0].title, "one");
        assert!(bundle.source_failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_becomes_timeout() {
        let source = ConfiguredSource::new(
            Box::new(StaticNews {
                titles: vec!["late"],
                delay: Duration::from_secs(60),
            }),
            "ai",
            5,
        );
        let bundle = Aggregator::new(vec![source])
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(120))
            .aggregate()
            .await;
        assert!(bundle.is_total_failure());
        assert_eq!(
            bundle.source_failures[&SourceKind::News].kind,
            SourceErrorKind::Timeout
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_caps_per_source_timeout() {
        let source = ConfiguredSource::new(
            Box::new(StaticNews {
                titles: vec!["late"],
                delay: Duration::from_secs(20),
            }),
            "ai",
            5,
        );
        let bundle = Aggregator::new(vec![source])
            .with_timeouts(Duration::from_secs(30), Duration::from_secs(10))
            .aggregate()
            .await;
        assert!(bundle.items.is_empty());
        assert_eq!(
            bundle.source_failures[&SourceKind::News].kind,
            SourceErrorKind::Timeout
        );
    }
}
