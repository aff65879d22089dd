use std::collections::BTreeSet;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    engine::aggregate::ChartRow,
    types::{AnomalyEvent, Topic},
};

/// Overlay annotation binding a server anomaly to a position in the series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub topic: Topic,
    pub observed: u64,
    pub deviation: f64,
}

/// Maps anomaly events onto the aggregated series. Best-effort overlay: an
/// anomaly whose bucket start matches no row (for example a bucket width
/// mismatch) is dropped, not an error. The join key is the exact instant.
pub fn align(
    rows: &[ChartRow],
    anomalies: &[AnomalyEvent],
    cutoff: OffsetDateTime,
    topic_filter: Option<Topic>,
) -> Vec<Marker> {
    let row_timestamps: BTreeSet<OffsetDateTime> =
        rows.iter().map(|row| row.timestamp).collect();

    let mut markers = Vec::new();
    let mut unmatched = 0usize;
    for anomaly in anomalies {
        if anomaly.bucket_start_utc < cutoff {
            continue;
        }
        if let Some(topic) = topic_filter {
            if anomaly.topic != topic {
                continue;
            }
        }

        if row_timestamps.contains(&anomaly.bucket_start_utc) {
            markers.push(Marker {
                timestamp: anomaly.bucket_start_utc,
                topic: anomaly.topic,
                observed: anomaly.observed,
                deviation: anomaly.deviation,
            });
        } else {
            unmatched += 1;
        }
    }

    if unmatched > 0 {
        tracing::debug!(
            target: "engine",
            unmatched,
            "anomalies_without_matching_row_dropped"
        );
    }

    markers
}
