use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::{
        aggregate::{aggregate, ChartRow},
        overlay::{align, Marker},
        spike::{spike_state, SpikeState, SpikeThresholds},
        window,
    },
    feed::ports::{AnomalyQuery, ArticleQuery, CountQuery, FeedError, NewsFeedPort},
    types::{AnomalyEvent, ArticleSummary, BucketSize, CountBucket, Timeframe, Topic},
};

/// User-selectable view parameters. A change to any field starts a new cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineParams {
    pub topic: Option<Topic>,
    pub bucket_size: BucketSize,
    pub timeframe: Timeframe,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            topic: None,
            bucket_size: BucketSize::FiveMinutes,
            timeframe: Timeframe::TwentyFourHours,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub refresh_interval: Duration,
    pub params: EngineParams,
    pub thresholds: SpikeThresholds,
    pub article_fetch_limit: u64,
    pub article_display_limit: usize,
    pub anomaly_fetch_limit: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            params: EngineParams::default(),
            thresholds: SpikeThresholds::default(),
            article_fetch_limit: 20,
            article_display_limit: 15,
            anomaly_fetch_limit: 10,
        }
    }
}

/// One complete, internally consistent refresh result. Replaced wholesale on
/// every publish; consumers never observe a mix of old and new fields.
#[derive(Debug, Clone, Serialize)]
pub struct PulseBundle {
    pub sequence: u64,
    pub params: EngineParams,
    #[serde(with = "time::serde::rfc3339")]
    pub refreshed_at: OffsetDateTime,
    pub rows: Vec<ChartRow>,
    pub markers: Vec<Marker>,
    pub topic_states: BTreeMap<Topic, SpikeState>,
    pub recent_articles: Vec<ArticleSummary>,
}

impl PulseBundle {
    fn empty(params: EngineParams, thresholds: SpikeThresholds) -> Self {
        let topic_states = Topic::ALL
            .iter()
            .map(|topic| (*topic, spike_state(*topic, &[], &[], thresholds)))
            .collect();

        Self {
            sequence: 0,
            params,
            refreshed_at: OffsetDateTime::now_utc(),
            rows: Vec::new(),
            markers: Vec::new(),
            topic_states,
            recent_articles: Vec::new(),
        }
    }
}

/// Raw fan-in result of one cycle's three fetches, before aggregation.
struct CycleOutcome {
    sequence: u64,
    params: EngineParams,
    cutoff: OffsetDateTime,
    counts: Vec<CountBucket>,
    articles: Vec<ArticleSummary>,
    anomalies: Vec<AnomalyEvent>,
}

/// Consumer-side handle: push parameter changes in, read published bundles
/// out. The watch channel is the only surface the engine writes.
#[derive(Clone)]
pub struct EngineHandle {
    params_tx: mpsc::UnboundedSender<EngineParams>,
    bundle_rx: watch::Receiver<Arc<PulseBundle>>,
}

impl EngineHandle {
    pub fn set_params(&self, params: EngineParams) -> bool {
        self.params_tx.send(params).is_ok()
    }

    pub fn latest(&self) -> Arc<PulseBundle> {
        self.bundle_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PulseBundle>> {
        self.bundle_rx.clone()
    }
}

/// The refresh orchestrator. Two states: idle between triggers, fetching
/// while a cycle's fan-out is in flight. Cycles are sequenced eagerly at
/// start; a cycle that finishes after a newer one has started is discarded
/// at fan-in, so a slow early cycle can never clobber a faster later one.
pub struct RefreshEngine {
    feed: Arc<dyn NewsFeedPort>,
    settings: EngineSettings,
    params: EngineParams,
    sequence: u64,
    params_rx: mpsc::UnboundedReceiver<EngineParams>,
    bundle_tx: watch::Sender<Arc<PulseBundle>>,
}

impl RefreshEngine {
    pub fn new(feed: Arc<dyn NewsFeedPort>, settings: EngineSettings) -> (Self, EngineHandle) {
        let (params_tx, params_rx) = mpsc::unbounded_channel();
        let (bundle_tx, bundle_rx) = watch::channel(Arc::new(PulseBundle::empty(
            settings.params,
            settings.thresholds,
        )));

        let engine = Self {
            feed,
            params: settings.params,
            settings,
            sequence: 0,
            params_rx,
            bundle_tx,
        };
        let handle = EngineHandle {
            params_tx,
            bundle_rx,
        };
        (engine, handle)
    }

    /// Runs until `shutdown` is cancelled. The first tick fires immediately,
    /// so the initial load happens without waiting a full interval.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<CycleOutcome>();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.start_cycle(&outcome_tx);
                }
                Some(params) = self.params_rx.recv() => {
                    if params != self.params {
                        self.params = params;
                        self.start_cycle(&outcome_tx);
                    }
                }
                Some(outcome) = outcome_rx.recv() => {
                    self.finish_cycle(outcome);
                }
            }
        }

        tracing::info!(target: "engine", sequence = self.sequence, "refresh_engine_stopped");
    }

    fn start_cycle(&mut self, outcome_tx: &mpsc::UnboundedSender<CycleOutcome>) {
        self.sequence += 1;
        let sequence = self.sequence;
        let params = self.params;
        // Snapshot the cutoff with the cycle so downstream filtering stays
        // consistent even if the user changes filters mid-fetch.
        let cutoff = window::cutoff(params.timeframe);
        let feed = Arc::clone(&self.feed);
        let article_limit = self.settings.article_fetch_limit;
        let anomaly_limit = self.settings.anomaly_fetch_limit;
        let outcome_tx = outcome_tx.clone();

        tracing::debug!(
            target: "engine",
            sequence,
            topic = params.topic.map(|t| t.as_str()),
            bucket_size = params.bucket_size.as_str(),
            timeframe = params.timeframe.as_str(),
            "cycle_started"
        );

        tokio::spawn(async move {
            let (counts, articles, anomalies) = tokio::join!(
                guarded("counts", feed.list_counts(CountQuery {
                    bucket_size: params.bucket_size,
                    topic: params.topic,
                    since: Some(cutoff),
                })),
                guarded("articles", feed.list_articles(ArticleQuery {
                    topic: params.topic,
                    since: Some(cutoff),
                    limit: Some(article_limit),
                })),
                guarded("anomalies", feed.list_anomalies(AnomalyQuery {
                    topic: params.topic,
                    since: Some(cutoff),
                    bucket_size: None,
                    limit: Some(anomaly_limit),
                })),
            );

            // Receiver gone means the engine stopped; nothing to report.
            let _ = outcome_tx.send(CycleOutcome {
                sequence,
                params,
                cutoff,
                counts,
                articles,
                anomalies,
            });
        });
    }

    fn finish_cycle(&mut self, outcome: CycleOutcome) {
        if outcome.sequence != self.sequence {
            tracing::debug!(
                target: "engine",
                sequence = outcome.sequence,
                latest = self.sequence,
                "stale_cycle_discarded"
            );
            return;
        }

        let rows = aggregate(&outcome.counts, outcome.cutoff, outcome.params.topic);
        let markers = align(&rows, &outcome.anomalies, outcome.cutoff, outcome.params.topic);

        let window_anomalies: Vec<AnomalyEvent> = outcome
            .anomalies
            .into_iter()
            .filter(|anomaly| anomaly.bucket_start_utc >= outcome.cutoff)
            .collect();
        let topic_states: BTreeMap<Topic, SpikeState> = Topic::ALL
            .iter()
            .map(|topic| {
                (
                    *topic,
                    spike_state(*topic, &rows, &window_anomalies, self.settings.thresholds),
                )
            })
            .collect();

        // The upstream already applied `since`, but the response may predate
        // this cycle's cutoff snapshot; re-filter with the cycle's own window.
        let mut recent_articles: Vec<ArticleSummary> = outcome
            .articles
            .into_iter()
            .filter(|article| article.published_at_utc >= outcome.cutoff)
            .collect();
        recent_articles.sort_by(|a, b| b.published_at_utc.cmp(&a.published_at_utc));
        recent_articles.truncate(self.settings.article_display_limit);

        let bundle = PulseBundle {
            sequence: outcome.sequence,
            params: outcome.params,
            refreshed_at: OffsetDateTime::now_utc(),
            rows,
            markers,
            topic_states,
            recent_articles,
        };

        tracing::info!(
            target: "engine",
            sequence = bundle.sequence,
            rows = bundle.rows.len(),
            markers = bundle.markers.len(),
            articles = bundle.recent_articles.len(),
            "bundle_published"
        );

        self.bundle_tx.send_replace(Arc::new(bundle));
    }
}

/// Feed failures are contained here: the failing feed degrades to an empty
/// list and the other two proceed unaffected.
async fn guarded<T>(
    feed_name: &'static str,
    fetch: impl Future<Output = Result<Vec<T>, FeedError>>,
) -> Vec<T> {
    match fetch.await {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(
                target: "feed",
                feed = feed_name,
                kind = ?err.kind,
                error = %err,
                "feed_fetch_failed_using_empty_result"
            );
            Vec::new()
        }
    }
}
