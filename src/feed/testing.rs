//! Scripted in-memory feed for exercising the refresh engine without a
//! network. Responses are consumed queue-front-first; an exhausted queue
//! yields empty lists. A response can carry a gate so a test can hold one
//! fetch open while a later cycle overtakes it.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::{
    feed::ports::{AnomalyQuery, ArticleQuery, CountQuery, FeedError, NewsFeedPort},
    types::{AnomalyEvent, ArticleSummary, CountBucket},
};

struct Scripted<T> {
    result: Result<Vec<T>, FeedError>,
    gate: Option<Arc<Notify>>,
}

#[derive(Default)]
pub struct ScriptedFeed {
    counts: Mutex<VecDeque<Scripted<CountBucket>>>,
    articles: Mutex<VecDeque<Scripted<ArticleSummary>>>,
    anomalies: Mutex<VecDeque<Scripted<AnomalyEvent>>>,
    seen_count_queries: Mutex<Vec<CountQuery>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_counts(&self, result: Result<Vec<CountBucket>, FeedError>) {
        self.counts.lock().await.push_back(Scripted { result, gate: None });
    }

    /// Queue a counts response that is only released once `gate` is notified.
    pub async fn push_counts_gated(
        &self,
        result: Result<Vec<CountBucket>, FeedError>,
        gate: Arc<Notify>,
    ) {
        self.counts.lock().await.push_back(Scripted {
            result,
            gate: Some(gate),
        });
    }

    pub async fn push_articles(&self, result: Result<Vec<ArticleSummary>, FeedError>) {
        self.articles.lock().await.push_back(Scripted { result, gate: None });
    }

    pub async fn push_anomalies(&self, result: Result<Vec<AnomalyEvent>, FeedError>) {
        self.anomalies.lock().await.push_back(Scripted { result, gate: None });
    }

    pub async fn seen_count_queries(&self) -> Vec<CountQuery> {
        self.seen_count_queries.lock().await.clone()
    }
}

async fn take<T>(queue: &Mutex<VecDeque<Scripted<T>>>) -> Result<Vec<T>, FeedError> {
    let scripted = queue.lock().await.pop_front();
    match scripted {
        Some(scripted) => {
            if let Some(gate) = scripted.gate {
                gate.notified().await;
            }
            scripted.result
        }
        None => Ok(Vec::new()),
    }
}

#[async_trait]
impl NewsFeedPort for ScriptedFeed {
    async fn list_counts(&self, query: CountQuery) -> Result<Vec<CountBucket>, FeedError> {
        self.seen_count_queries.lock().await.push(query);
        take(&self.counts).await
    }

    async fn list_articles(&self, _query: ArticleQuery) -> Result<Vec<ArticleSummary>, FeedError> {
        take(&self.articles).await
    }

    async fn list_anomalies(&self, _query: AnomalyQuery) -> Result<Vec<AnomalyEvent>, FeedError> {
        take(&self.anomalies).await
    }
}
