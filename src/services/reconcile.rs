//! Turns filtered anomaly sets and the fetched series into chart-ready
//! channels.
//!
//! The timestamp grid of the primary series is canonical: anomaly ranges are
//! located by exact timestamp match against it, never by interpolation. An
//! anomaly's `end_time` is the first sample outside its range.

use crate::models::{Anomaly, TimeSeries};
use crate::services::view_state::ViewState;
use serde::Serialize;

pub const CURRENT_LABEL: &str = "Current";
pub const BASELINE_LABEL: &str = "Baseline";
pub const UPPER_BOUND_LABEL: &str = "Upper and lower bound";
pub const LOWER_BOUND_LABEL: &str = "lowerBound";
pub const OLD_SETTINGS_LABEL: &str = "Old Settings Anomalies";
pub const CURRENT_ANOMALIES_LABEL: &str = "Current Anomalies";
pub const CURRENT_SETTINGS_LABEL: &str = "Current Settings Anomalies";
pub const NEW_SETTINGS_LABEL: &str = "New Settings Anomalies";
pub const OLD_EDGES_LABEL: &str = "old-anomaly-edges";
pub const NEW_EDGES_LABEL: &str = "new-anomaly-edges";

/// Above this many visible anomalies the legend is hidden.
pub const LEGEND_ANOMALY_THRESHOLD: usize = 20;

const NEW_CHANNEL_LEVEL: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Line,
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Y,
    Y2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub timestamps: Vec<i64>,
    pub values: Vec<Option<f64>>,
    pub kind: SeriesKind,
    pub axis: Axis,
}

impl ChartSeries {
    fn line(name: &str, timestamps: &[i64], values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.to_string(),
            timestamps: timestamps.to_vec(),
            values,
            kind: SeriesKind::Line,
            axis: Axis::Y,
        }
    }

    fn on_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }
}

/// How in-range samples are rendered for a channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelFill {
    /// Track the primary series value.
    Sample,
    /// Flat indicator band at a fixed level.
    Constant(f64),
}

impl ChannelFill {
    fn value_at(&self, values: &[Option<f64>], index: usize) -> Option<f64> {
        match self {
            ChannelFill::Sample => values.get(index).copied().flatten(),
            ChannelFill::Constant(level) => Some(*level),
        }
    }
}

/// Gapped overlay plus the start/end edge markers for one anomaly set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledChannel {
    pub values: Vec<Option<f64>>,
    pub edge_timestamps: Vec<i64>,
    pub edge_values: Vec<Option<f64>>,
}

impl ReconciledChannel {
    fn push_edge(&mut self, timestamp: i64, value: Option<f64>) {
        self.edge_timestamps.push(timestamp);
        self.edge_values.push(value);
    }
}

/// Walks `timestamps` once, emitting the overlay for `anomalies`.
///
/// `continuation` is searched when a range ends exactly on a sample, to pick
/// up an anomaly starting on that same sample. For the old channel it is the
/// old list itself; the new channel passes the old list too (see
/// `build_chart_series`).
pub fn reconcile_channel(
    timestamps: &[i64],
    values: &[Option<f64>],
    anomalies: &[Anomaly],
    continuation: &[Anomaly],
    fill: ChannelFill,
) -> ReconciledChannel {
    let mut channel = ReconciledChannel {
        values: Vec::with_capacity(timestamps.len()),
        ..ReconciledChannel::default()
    };
    let Some(first) = timestamps.first().copied() else {
        return channel;
    };

    // Ranges may open before the visible window.
    let mut current: Option<&Anomaly> = anomalies.iter().find(|a| a.start_time <= first);

    for (index, &timestamp) in timestamps.iter().enumerate() {
        match current {
            None => {
                current = anomalies.iter().find(|a| a.start_time == timestamp);
                if current.is_some() {
                    let value = fill.value_at(values, index);
                    channel.values.push(value);
                    channel.push_edge(timestamp, value);
                } else {
                    channel.values.push(None);
                }
            }
            Some(active) if active.end_time == timestamp => {
                current = continuation.iter().find(|a| a.start_time == timestamp);
                if current.is_some() {
                    let value = fill.value_at(values, index);
                    channel.values.push(value);
                    channel.push_edge(timestamp, value);
                } else {
                    if let Some(previous) = index.checked_sub(1) {
                        channel.push_edge(timestamps[previous], fill.value_at(values, previous));
                    }
                    channel.values.push(None);
                }
            }
            Some(_) => channel.values.push(fill.value_at(values, index)),
        }
    }
    channel
}

/// Replaces NaN and infinities with gaps.
pub fn strip_non_finite(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect()
}

pub fn old_anomalies_label(is_preview_mode: bool, is_edit_mode: bool, view_state: ViewState) -> &'static str {
    if is_preview_mode && view_state == ViewState::Shuffle {
        OLD_SETTINGS_LABEL
    } else if !is_preview_mode || is_edit_mode {
        CURRENT_ANOMALIES_LABEL
    } else {
        CURRENT_SETTINGS_LABEL
    }
}

pub fn show_legend(filtered_anomaly_count: usize) -> bool {
    filtered_anomaly_count <= LEGEND_ANOMALY_THRESHOLD
}

#[derive(Debug, Clone, Copy)]
pub struct ChartInputs<'a> {
    pub filtered_old: &'a [Anomaly],
    pub filtered_new: &'a [Anomaly],
    pub timeseries: Option<&'a TimeSeries>,
    pub baseline: Option<&'a TimeSeries>,
    pub rules_visible: bool,
    pub is_preview_mode: bool,
    pub is_edit_mode: bool,
    pub view_state: ViewState,
}

/// Every chart series in display order. Reads its inputs only.
pub fn build_chart_series(inputs: ChartInputs<'_>) -> Vec<ChartSeries> {
    let mut series = Vec::new();

    // Preview evaluations carry the primary series under `current`.
    let primary = inputs.timeseries.and_then(|ts| {
        let channel = if inputs.rules_visible { &ts.current } else { &ts.value };
        (!channel.is_empty()).then(|| (ts.timestamp.as_slice(), strip_non_finite(channel)))
    });
    if let Some((timestamps, values)) = &primary {
        series.push(ChartSeries::line(CURRENT_LABEL, timestamps, values.clone()));
    }

    if let Some(baseline) = inputs.baseline {
        for (label, channel) in [
            (BASELINE_LABEL, &baseline.value),
            (UPPER_BOUND_LABEL, &baseline.upper_bound),
            (LOWER_BOUND_LABEL, &baseline.lower_bound),
        ] {
            if !channel.is_empty() {
                series.push(ChartSeries::line(
                    label,
                    &baseline.timestamp,
                    strip_non_finite(channel),
                ));
            }
        }
    }

    let Some((timestamps, values)) = primary else {
        return series;
    };

    if !inputs.filtered_old.is_empty() {
        let channel = reconcile_channel(
            timestamps,
            &values,
            inputs.filtered_old,
            inputs.filtered_old,
            ChannelFill::Sample,
        );
        let label = old_anomalies_label(inputs.is_preview_mode, inputs.is_edit_mode, inputs.view_state);
        push_overlay(&mut series, timestamps, channel, label, OLD_EDGES_LABEL, Axis::Y);
    }

    if !inputs.filtered_new.is_empty() {
        // Back-to-back continuation on the new channel is looked up in the old
        // list. Kept as-is until the intended behavior is confirmed.
        let channel = reconcile_channel(
            timestamps,
            &values,
            inputs.filtered_new,
            inputs.filtered_old,
            ChannelFill::Constant(NEW_CHANNEL_LEVEL),
        );
        push_overlay(
            &mut series,
            timestamps,
            channel,
            NEW_SETTINGS_LABEL,
            NEW_EDGES_LABEL,
            Axis::Y2,
        );
    }

    series
}

fn push_overlay(
    series: &mut Vec<ChartSeries>,
    timestamps: &[i64],
    channel: ReconciledChannel,
    label: &str,
    edges_label: &str,
    axis: Axis,
) {
    series.push(ChartSeries::line(label, timestamps, channel.values).on_axis(axis));
    series.push(ChartSeries {
        name: edges_label.to_string(),
        timestamps: channel.edge_timestamps,
        values: channel.edge_values,
        kind: SeriesKind::Scatter,
        axis,
    });
}
