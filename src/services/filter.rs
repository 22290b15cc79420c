use crate::models::{Anomaly, MetricOffset, PredictionSeries, Rule};
use serde::Serialize;
use std::collections::HashSet;

pub const ALL_DIMENSIONS_LABEL: &str = "All Dimensions";
const METRIC_URN_HEAD_SEGMENTS: usize = 3;

/// Anomalies on `metric_urn` that belong to the selected rule, in input order.
///
/// With rules visible the rule predicate always applies, so a missing rule
/// selection matches nothing. With rules hidden only the slice is checked.
pub fn filter_anomalies(
    anomalies: &[Anomaly],
    metric_urn: Option<&str>,
    rule: Option<&Rule>,
    rules_visible: bool,
) -> Vec<Anomaly> {
    let Some(metric_urn) = metric_urn else {
        return Vec::new();
    };
    anomalies
        .iter()
        .filter(|anomaly| anomaly.metric_urn == metric_urn)
        .filter(|anomaly| !rules_visible || matches_rule(anomaly, rule))
        .cloned()
        .collect()
}

fn matches_rule(anomaly: &Anomaly, rule: Option<&Rule>) -> bool {
    match (rule, anomaly.detector_component_name()) {
        (Some(rule), Some(component)) => component.contains(rule.detector_name.as_str()),
        _ => false,
    }
}

/// Distinct detector rules in first-seen order.
pub fn rule_options(unique_time_series: &[PredictionSeries]) -> Vec<Rule> {
    let mut seen = HashSet::new();
    unique_time_series
        .iter()
        .filter(|series| seen.insert(series.detector_name.as_str()))
        .map(|series| Rule::from_detector_name(&series.detector_name))
        .collect()
}

/// Distinct anomaly slices in first-seen order.
pub fn unique_metric_urns(anomalies: &[Anomaly]) -> Vec<String> {
    let mut seen = HashSet::new();
    anomalies
        .iter()
        .filter(|anomaly| seen.insert(anomaly.metric_urn.as_str()))
        .map(|anomaly| anomaly.metric_urn.clone())
        .collect()
}

/// Filter tail of a metric URN (`thirdeye:metric:<id>:k=v:...`) rendered as
/// `k=v, ...`. Empty when the URN carries no filters.
pub fn metric_urn_tail_label(urn: &str) -> String {
    let decoded = urlencoding::decode(urn)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| urn.to_string());
    decoded
        .split(':')
        .skip(METRIC_URN_HEAD_SEGMENTS)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn dimension_label(urn: &str) -> String {
    let tail = metric_urn_tail_label(urn);
    if tail.is_empty() {
        ALL_DIMENSIONS_LABEL.to_string()
    } else {
        tail
    }
}

pub fn dimension_options(metric_urn_list: &[String]) -> Vec<String> {
    metric_urn_list.iter().map(|urn| dimension_label(urn)).collect()
}

pub fn alert_has_dimensions(metric_urn_list: &[String]) -> bool {
    metric_urn_list.len() > 1
}

/// Slice whose label matches `selected`.
pub fn resolve_dimension<'a>(metric_urn_list: &'a [String], selected: &str) -> Option<&'a str> {
    metric_urn_list
        .iter()
        .find(|urn| {
            let tail = metric_urn_tail_label(urn);
            tail == selected || (tail.is_empty() && selected == ALL_DIMENSIONS_LABEL)
        })
        .map(String::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaselineOption {
    pub name: MetricOffset,
    pub is_active: bool,
}

/// Offsets offered for the baseline selector. `predicted` leads the list when
/// rules are visible.
pub fn baseline_options(rules_visible: bool, selected: MetricOffset) -> Vec<BaselineOption> {
    let mut offsets = Vec::with_capacity(MetricOffset::COMPARISONS.len() + 1);
    if rules_visible {
        offsets.push(MetricOffset::Predicted);
    }
    offsets.extend(MetricOffset::COMPARISONS);
    offsets
        .into_iter()
        .map(|name| BaselineOption {
            name,
            is_active: name == selected,
        })
        .collect()
}
