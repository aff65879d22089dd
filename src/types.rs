use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Monitored subject domains. Closed set: every consumer matches exhaustively
/// instead of comparing topic strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Environment,
    Politics,
    Humanity,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Environment, Topic::Politics, Topic::Humanity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Environment => "environment",
            Topic::Politics => "politics",
            Topic::Humanity => "humanity",
        }
    }
}

/// Fixed bucket widths the upstream pre-aggregates counts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketSize {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
}

impl Default for BucketSize {
    fn default() -> Self {
        BucketSize::FiveMinutes
    }
}

impl BucketSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketSize::OneMinute => "1m",
            BucketSize::FiveMinutes => "5m",
            BucketSize::SixtyMinutes => "60m",
        }
    }
}

/// Rolling window selector for the dashboard view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl Timeframe {
    pub fn hours(&self) -> i64 {
        match self {
            Timeframe::OneHour => 1,
            Timeframe::SixHours => 6,
            Timeframe::TwentyFourHours => 24,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::SixHours => "6h",
            Timeframe::TwentyFourHours => "24h",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Rss,
    RedditSub,
    RedditUser,
}

/// One pre-aggregated count record as served by `/api/aggregate`. The same
/// `(bucket_start_utc, topic)` pair may appear once per source; partial counts
/// are summed downstream, never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountBucket {
    #[serde(with = "time::serde::rfc3339")]
    pub bucket_start_utc: OffsetDateTime,
    pub bucket_size: BucketSize,
    pub topic: Topic,
    pub source: Option<String>,
    pub count: u64,
}

/// Server-side detection tied to exactly one bucket. Read-only input here;
/// the detection itself happens upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub bucket_start_utc: OffsetDateTime,
    pub bucket_size: BucketSize,
    pub topic: Topic,
    pub observed: u64,
    pub expected: f64,
    pub deviation: f64,
    pub method: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at_utc: OffsetDateTime,
}

/// Article record from `/api/news`. Never aggregated, only window-filtered
/// and recency-sorted for the ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub source: String,
    pub source_type: SourceType,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub topic: Topic,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at_utc: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at_utc: OffsetDateTime,
    pub author: Option<String>,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub buckets: Vec<CountBucket>,
    pub bucket_size: BucketSize,
    pub topic: Option<Topic>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleListResponse {
    pub items: Vec<ArticleSummary>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyListResponse {
    pub items: Vec<AnomalyEvent>,
    pub total: u64,
}
