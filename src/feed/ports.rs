use std::fmt;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::types::{AnomalyEvent, ArticleSummary, BucketSize, CountBucket, Topic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedErrorKind {
    InvalidRequest,
    Network,
    Timeout,
    Status,
    Decode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedError {
    pub kind: FeedErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
}

impl FeedError {
    pub fn new(kind: FeedErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (http {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FeedError {}

#[derive(Debug, Clone, Copy, Default)]
pub struct CountQuery {
    pub bucket_size: BucketSize,
    pub topic: Option<Topic>,
    pub since: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleQuery {
    pub topic: Option<Topic>,
    pub since: Option<OffsetDateTime>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyQuery {
    pub topic: Option<Topic>,
    pub since: Option<OffsetDateTime>,
    pub bucket_size: Option<BucketSize>,
    pub limit: Option<u64>,
}

/// Read-only boundary to the upstream data source. The three operations are
/// independent; one cycle issues all of them concurrently.
#[async_trait]
pub trait NewsFeedPort: Send + Sync {
    async fn list_counts(&self, query: CountQuery) -> Result<Vec<CountBucket>, FeedError>;

    async fn list_articles(&self, query: ArticleQuery) -> Result<Vec<ArticleSummary>, FeedError>;

    async fn list_anomalies(&self, query: AnomalyQuery) -> Result<Vec<AnomalyEvent>, FeedError>;
}
