use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use crate::types::{CountBucket, Topic};

/// Per-topic counts for one chart row. All three topic keys are always
/// present; absent topics read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopicCounts {
    pub environment: u64,
    pub politics: u64,
    pub humanity: u64,
}

impl TopicCounts {
    pub fn get(&self, topic: Topic) -> u64 {
        match topic {
            Topic::Environment => self.environment,
            Topic::Politics => self.politics,
            Topic::Humanity => self.humanity,
        }
    }

    pub fn add(&mut self, topic: Topic, count: u64) {
        match topic {
            Topic::Environment => self.environment += count,
            Topic::Politics => self.politics += count,
            Topic::Humanity => self.humanity += count,
        }
    }

    pub fn sum(&self) -> u64 {
        self.environment + self.politics + self.humanity
    }
}

/// One aggregated point per distinct bucket start. Invariant:
/// `total == counts.sum()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub counts: TopicCounts,
    pub total: u64,
}

/// Folds count buckets into a chronologically ordered, topic-partitioned
/// series restricted to `cutoff` (inclusive).
///
/// Grouping is by the exact bucket-start instant. Formatted clock labels are
/// strictly presentation: they collide across days and bucket widths and must
/// never be used as a join key. Duplicate `(bucket_start, topic)` pairs
/// (per-source partial counts) accumulate additively.
pub fn aggregate(
    buckets: &[CountBucket],
    cutoff: OffsetDateTime,
    topic_filter: Option<Topic>,
) -> Vec<ChartRow> {
    let mut grouped: BTreeMap<OffsetDateTime, TopicCounts> = BTreeMap::new();

    for bucket in buckets {
        if bucket.bucket_start_utc < cutoff {
            continue;
        }
        if let Some(topic) = topic_filter {
            if bucket.topic != topic {
                continue;
            }
        }

        grouped
            .entry(bucket.bucket_start_utc)
            .or_default()
            .add(bucket.topic, bucket.count);
    }

    grouped
        .into_iter()
        .map(|(timestamp, counts)| ChartRow {
            timestamp,
            counts,
            total: counts.sum(),
        })
        .collect()
}
