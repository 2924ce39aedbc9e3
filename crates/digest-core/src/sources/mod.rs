//! External content providers.
//!
//! Each connector talks to one provider and hands back provider-native
//! [`RawItem`]s. Only [`crate::normalize`] looks inside them.

pub mod arxiv;
pub mod news;

pub use arxiv::{ArxivConnector, ArxivEntry};
pub use news::{NewsApiConnector, NewsArticle};

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::SourceKind;

/// A record exactly as a provider returned it
#[derive(Debug, Clone)]
pub enum RawItem {
    Paper(ArxivEntry),
    News(NewsArticle),
}

#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Fetch up to `limit` records. Zero records is `EmptyResult`, not success.
    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<RawItem>, SourceError>;

    fn kind(&self) -> SourceKind;
}
