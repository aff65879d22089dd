use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::timeout;

use crate::{
    feed::ports::{
        AnomalyQuery, ArticleQuery, CountQuery, FeedError, FeedErrorKind, NewsFeedPort,
    },
    types::{
        AggregateResponse, AnomalyEvent, AnomalyListResponse, ArticleListResponse, ArticleSummary,
        CountBucket,
    },
};

/// `NewsFeedPort` over the upstream HTTP API. Each call is bounded by the
/// configured request timeout; callers treat a timeout like any other failure.
#[derive(Debug)]
pub struct HttpNewsFeed {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpNewsFeed {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, FeedError> {
        let base_url = Url::parse(base_url).map_err(|err| {
            FeedError::new(
                FeedErrorKind::InvalidRequest,
                format!("invalid api base url '{base_url}': {err}"),
            )
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(FeedError::new(
                FeedErrorKind::InvalidRequest,
                format!("unsupported api base url scheme '{}'", base_url.scheme()),
            ));
        }

        let client = Client::builder().no_proxy().build().map_err(|err| {
            FeedError::new(
                FeedErrorKind::Network,
                format!("failed to build http client: {err}"),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let url = self.base_url.join(path).map_err(|err| {
            FeedError::new(
                FeedErrorKind::InvalidRequest,
                format!("failed to build url for {path}: {err}"),
            )
        })?;

        let request = self.client.get(url).query(query);
        let response = match timeout(self.request_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(FeedError::new(
                    FeedErrorKind::Network,
                    format!("request to {path} failed: {err}"),
                ));
            }
            Err(_) => {
                return Err(FeedError::new(
                    FeedErrorKind::Timeout,
                    format!("request to {path} timed out"),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::new(
                FeedErrorKind::Status,
                format!("{path} returned non-success status"),
            )
            .with_http_status(status.as_u16()));
        }

        match timeout(self.request_timeout, response.json::<T>()).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(err)) => Err(FeedError::new(
                FeedErrorKind::Decode,
                format!("failed to decode {path} response: {err}"),
            )),
            Err(_) => Err(FeedError::new(
                FeedErrorKind::Timeout,
                format!("reading {path} response timed out"),
            )),
        }
    }
}

#[async_trait]
impl NewsFeedPort for HttpNewsFeed {
    async fn list_counts(&self, query: CountQuery) -> Result<Vec<CountBucket>, FeedError> {
        let mut params = vec![("bucket_size", query.bucket_size.as_str().to_string())];
        if let Some(topic) = query.topic {
            params.push(("topic", topic.as_str().to_string()));
        }
        if let Some(since) = query.since {
            params.push(("since", format_instant(since)?));
        }

        let response: AggregateResponse = self.get_json("api/aggregate", &params).await?;
        Ok(response.buckets)
    }

    async fn list_articles(&self, query: ArticleQuery) -> Result<Vec<ArticleSummary>, FeedError> {
        let mut params = Vec::new();
        if let Some(topic) = query.topic {
            params.push(("topic", topic.as_str().to_string()));
        }
        if let Some(since) = query.since {
            params.push(("since", format_instant(since)?));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let response: ArticleListResponse = self.get_json("api/news", &params).await?;
        Ok(response.items)
    }

    async fn list_anomalies(&self, query: AnomalyQuery) -> Result<Vec<AnomalyEvent>, FeedError> {
        let mut params = Vec::new();
        if let Some(topic) = query.topic {
            params.push(("topic", topic.as_str().to_string()));
        }
        if let Some(since) = query.since {
            params.push(("since", format_instant(since)?));
        }
        if let Some(bucket_size) = query.bucket_size {
            params.push(("bucket_size", bucket_size.as_str().to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let response: AnomalyListResponse = self.get_json("api/anomalies", &params).await?;
        Ok(response.items)
    }
}

fn format_instant(instant: OffsetDateTime) -> Result<String, FeedError> {
    instant.format(&Rfc3339).map_err(|err| {
        FeedError::new(
            FeedErrorKind::InvalidRequest,
            format!("failed to format since instant: {err}"),
        )
    })
}
