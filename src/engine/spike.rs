use serde::{Deserialize, Serialize};

use crate::{
    engine::aggregate::ChartRow,
    types::{AnomalyEvent, Topic},
};

fn default_spike_multiplier() -> f64 {
    2.0
}

fn default_spike_floor() -> u64 {
    5
}

/// Local-elevation thresholds. Heuristic defaults inherited from the upstream
/// dashboard; both are configuration, not derived values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeThresholds {
    #[serde(default = "default_spike_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_spike_floor")]
    pub floor: u64,
}

impl Default for SpikeThresholds {
    fn default() -> Self {
        Self {
            multiplier: default_spike_multiplier(),
            floor: default_spike_floor(),
        }
    }
}

/// Per-topic spike signal for one refresh cycle. Recomputed fully every
/// cycle; never merged with a prior value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeState {
    pub has_server_anomaly: bool,
    pub anomaly: Option<AnomalyEvent>,
    pub is_locally_elevated: bool,
    pub recent_count: u64,
    pub average_count: f64,
}

/// Derives the spike state for `topic`. A server anomaly always wins: the
/// most recent one (by `created_at_utc`) is attached and local elevation is
/// not computed, though the count fields are still populated for
/// transparency. `window_anomalies` must already be restricted to the
/// cycle's window.
pub fn spike_state(
    topic: Topic,
    rows: &[ChartRow],
    window_anomalies: &[AnomalyEvent],
    thresholds: SpikeThresholds,
) -> SpikeState {
    let recent_count = rows.last().map(|row| row.counts.get(topic)).unwrap_or(0);
    let average_count = if rows.is_empty() {
        0.0
    } else {
        let sum: u64 = rows.iter().map(|row| row.counts.get(topic)).sum();
        sum as f64 / rows.len() as f64
    };

    let anomaly = window_anomalies
        .iter()
        .filter(|anomaly| anomaly.topic == topic)
        .max_by_key(|anomaly| anomaly.created_at_utc)
        .cloned();

    if let Some(anomaly) = anomaly {
        return SpikeState {
            has_server_anomaly: true,
            anomaly: Some(anomaly),
            is_locally_elevated: false,
            recent_count,
            average_count,
        };
    }

    let is_locally_elevated = recent_count as f64 > thresholds.multiplier * average_count
        && recent_count > thresholds.floor;

    SpikeState {
        has_server_anomaly: false,
        anomaly: None,
        is_locally_elevated,
        recent_count,
        average_count,
    }
}
