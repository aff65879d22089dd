use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::{sync::Notify, time::timeout};
use tokio_util::sync::CancellationToken;

use pulsewatch::{
    engine::cycle::{EngineParams, EngineSettings, PulseBundle, RefreshEngine},
    feed::{FeedError, FeedErrorKind, ScriptedFeed},
    types::{
        AnomalyEvent, ArticleSummary, BucketSize, CountBucket, SourceType, Timeframe, Topic,
    },
};

fn count_bucket(start: OffsetDateTime, topic: Topic, count: u64) -> CountBucket {
    CountBucket {
        bucket_start_utc: start,
        bucket_size: BucketSize::FiveMinutes,
        topic,
        source: None,
        count,
    }
}

fn article(published_at: OffsetDateTime, title: &str) -> ArticleSummary {
    ArticleSummary {
        id: 1,
        source: "reuters".to_string(),
        source_type: SourceType::Rss,
        title: title.to_string(),
        url: "https://example.com/a".to_string(),
        summary: None,
        topic: Topic::Politics,
        published_at_utc: published_at,
        fetched_at_utc: published_at,
        author: None,
        score: None,
    }
}

fn anomaly(bucket_start: OffsetDateTime, topic: Topic) -> AnomalyEvent {
    AnomalyEvent {
        id: 7,
        bucket_start_utc: bucket_start,
        bucket_size: BucketSize::FiveMinutes,
        topic,
        observed: 18,
        expected: 4.0,
        deviation: 3.5,
        method: "zscore".to_string(),
        created_at_utc: bucket_start,
    }
}

/// Settings with an interval long enough that only the immediate first tick
/// fires during a test; further cycles are driven through `set_params`.
fn test_settings() -> EngineSettings {
    EngineSettings {
        refresh_interval: Duration::from_secs(3600),
        ..EngineSettings::default()
    }
}

async fn next_bundle(
    bundle_rx: &mut tokio::sync::watch::Receiver<Arc<PulseBundle>>,
) -> Arc<PulseBundle> {
    timeout(Duration::from_secs(5), bundle_rx.changed())
        .await
        .expect("bundle should be published before timeout")
        .expect("engine should still be running");
    bundle_rx.borrow_and_update().clone()
}

async fn wait_for_count_requests(feed: &ScriptedFeed, expected: usize) {
    timeout(Duration::from_secs(5), async {
        loop {
            if feed.seen_count_queries().await.len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("feed should receive the expected count requests");
}

#[tokio::test]
async fn first_cycle_aggregates_and_overlays_end_to_end() {
    let now = OffsetDateTime::now_utc();
    let t0 = now - time::Duration::minutes(10);
    let t1 = now - time::Duration::minutes(5);

    let feed = Arc::new(ScriptedFeed::new());
    feed.push_counts(Ok(vec![
        count_bucket(t0, Topic::Politics, 3),
        count_bucket(t0, Topic::Politics, 2),
        count_bucket(t1, Topic::Environment, 1),
    ]))
    .await;
    feed.push_anomalies(Ok(vec![anomaly(t0, Topic::Politics)])).await;
    feed.push_articles(Ok(vec![article(t1, "markets rattled")])).await;

    let (engine, handle) = RefreshEngine::new(feed.clone(), test_settings());
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));

    let mut bundle_rx = handle.subscribe();
    let bundle = next_bundle(&mut bundle_rx).await;

    assert_eq!(bundle.sequence, 1);
    assert_eq!(bundle.rows.len(), 2);
    assert_eq!(bundle.rows[0].timestamp, t0);
    assert_eq!(bundle.rows[0].counts.politics, 5);
    assert_eq!(bundle.rows[0].counts.environment, 0);
    assert_eq!(bundle.rows[0].counts.humanity, 0);
    assert_eq!(bundle.rows[0].total, 5);
    assert_eq!(bundle.rows[1].timestamp, t1);
    assert_eq!(bundle.rows[1].counts.environment, 1);
    assert_eq!(bundle.rows[1].total, 1);

    assert_eq!(bundle.markers.len(), 1);
    assert_eq!(bundle.markers[0].timestamp, t0);
    assert_eq!(bundle.markers[0].topic, Topic::Politics);

    let politics = &bundle.topic_states[&Topic::Politics];
    assert!(politics.has_server_anomaly);
    let environment = &bundle.topic_states[&Topic::Environment];
    assert!(!environment.has_server_anomaly);

    assert_eq!(bundle.recent_articles.len(), 1);
    assert_eq!(bundle.recent_articles[0].title, "markets rattled");

    shutdown.cancel();
    engine_task.await.expect("engine task should join");
}

#[tokio::test]
async fn superseded_cycle_is_discarded_even_when_it_finishes_last() {
    let now = OffsetDateTime::now_utc();
    let gate = Arc::new(Notify::new());

    let feed = Arc::new(ScriptedFeed::new());
    // Cycle 1 (sequence 1): held open until the gate is notified.
    feed.push_counts_gated(
        Ok(vec![count_bucket(
            now - time::Duration::minutes(10),
            Topic::Politics,
            99,
        )]),
        gate.clone(),
    )
    .await;
    // Cycle 2 (sequence 2): returns immediately.
    feed.push_counts(Ok(vec![count_bucket(
        now - time::Duration::minutes(5),
        Topic::Environment,
        7,
    )]))
    .await;

    let (engine, handle) = RefreshEngine::new(feed.clone(), test_settings());
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));
    let mut bundle_rx = handle.subscribe();

    // Cycle 1 is in flight (its counts fetch is parked on the gate).
    wait_for_count_requests(&feed, 1).await;

    // Start cycle 2 while cycle 1 is still fetching.
    assert!(handle.set_params(EngineParams {
        topic: None,
        bucket_size: BucketSize::FiveMinutes,
        timeframe: Timeframe::OneHour,
    }));

    let bundle = next_bundle(&mut bundle_rx).await;
    assert_eq!(bundle.sequence, 2);
    assert_eq!(bundle.rows.len(), 1);
    assert_eq!(bundle.rows[0].counts.environment, 7);

    // Let the slow cycle 1 finish; its result must be thrown away.
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let latest = handle.latest();
    assert_eq!(latest.sequence, 2);
    assert_eq!(latest.rows.len(), 1);
    assert_eq!(latest.rows[0].counts.environment, 7);
    assert_eq!(latest.rows[0].counts.politics, 0);

    shutdown.cancel();
    engine_task.await.expect("engine task should join");
}

#[tokio::test]
async fn counts_failure_degrades_that_feed_only() {
    let now = OffsetDateTime::now_utc();

    let feed = Arc::new(ScriptedFeed::new());
    feed.push_counts(Err(FeedError::new(
        FeedErrorKind::Network,
        "connection refused",
    )))
    .await;
    feed.push_articles(Ok(vec![article(
        now - time::Duration::minutes(2),
        "storm intensifies",
    )]))
    .await;
    feed.push_anomalies(Ok(vec![anomaly(
        now - time::Duration::minutes(5),
        Topic::Humanity,
    )]))
    .await;

    let (engine, handle) = RefreshEngine::new(feed.clone(), test_settings());
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));
    let mut bundle_rx = handle.subscribe();

    let bundle = next_bundle(&mut bundle_rx).await;

    assert!(bundle.rows.is_empty());
    assert!(bundle.markers.is_empty());
    assert_eq!(bundle.recent_articles.len(), 1);
    assert!(bundle.topic_states[&Topic::Humanity].has_server_anomaly);
    assert!(!bundle.topic_states[&Topic::Politics].has_server_anomaly);

    shutdown.cancel();
    engine_task.await.expect("engine task should join");
}

#[tokio::test]
async fn total_feed_failure_publishes_an_explicit_empty_bundle() {
    let feed = Arc::new(ScriptedFeed::new());
    feed.push_counts(Err(FeedError::new(FeedErrorKind::Timeout, "timed out")))
        .await;
    feed.push_articles(Err(FeedError::new(FeedErrorKind::Timeout, "timed out")))
        .await;
    feed.push_anomalies(Err(FeedError::new(FeedErrorKind::Timeout, "timed out")))
        .await;

    let (engine, handle) = RefreshEngine::new(feed, test_settings());
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));
    let mut bundle_rx = handle.subscribe();

    let bundle = next_bundle(&mut bundle_rx).await;

    assert_eq!(bundle.sequence, 1);
    assert!(bundle.rows.is_empty());
    assert!(bundle.markers.is_empty());
    assert!(bundle.recent_articles.is_empty());
    for state in bundle.topic_states.values() {
        assert!(!state.has_server_anomaly);
        assert!(!state.is_locally_elevated);
    }

    shutdown.cancel();
    engine_task.await.expect("engine task should join");
}

#[tokio::test]
async fn params_change_carries_topic_filter_into_the_fetch() {
    let feed = Arc::new(ScriptedFeed::new());
    let (engine, handle) = RefreshEngine::new(feed.clone(), test_settings());
    let shutdown = CancellationToken::new();
    let engine_task = tokio::spawn(engine.run(shutdown.clone()));

    wait_for_count_requests(&feed, 1).await;
    assert!(handle.set_params(EngineParams {
        topic: Some(Topic::Environment),
        bucket_size: BucketSize::OneMinute,
        timeframe: Timeframe::OneHour,
    }));
    wait_for_count_requests(&feed, 2).await;

    let queries = feed.seen_count_queries().await;
    assert_eq!(queries[0].topic, None);
    assert_eq!(queries[0].bucket_size, BucketSize::FiveMinutes);
    assert_eq!(queries[1].topic, Some(Topic::Environment));
    assert_eq!(queries[1].bucket_size, BucketSize::OneMinute);
    let since = queries[1].since.expect("since should be set");
    let age = OffsetDateTime::now_utc() - since;
    assert!(age >= time::Duration::minutes(59));
    assert!(age <= time::Duration::minutes(61));

    shutdown.cancel();
    engine_task.await.expect("engine task should join");
}
