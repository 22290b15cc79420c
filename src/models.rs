use crate::error::{ChartError, ChartResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const CLASSIFICATION_NONE: &str = "NONE";
pub const CLASSIFICATION_TRUE_POSITIVE: &str = "TRUE_POSITIVE";
pub const CLASSIFICATION_FALSE_POSITIVE: &str = "FALSE_POSITIVE";
pub const CLASSIFICATION_FALSE_NEGATIVE: &str = "FALSE_NEGATIVE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(default)]
    pub id: Option<i64>,
    pub metric_urn: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    /// Epoch milliseconds; the sample at this timestamp is outside the anomaly.
    pub end_time: i64,
    #[serde(default)]
    pub avg_current_val: Option<f64>,
    #[serde(default)]
    pub avg_baseline_val: Option<f64>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: Option<AnomalyProperties>,
    #[serde(default)]
    pub feedback: Option<AnomalyFeedback>,
    #[serde(default)]
    pub status_classification: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyProperties {
    #[serde(default)]
    pub detector_component_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFeedback {
    #[serde(default)]
    pub feedback_type: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl Anomaly {
    pub fn detector_component_name(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|props| props.detector_component_name.as_deref())
    }
}

/// Sample grid plus its named value channels. Channels that the response did
/// not carry stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub current: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upper_bound: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lower_bound: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionSeries {
    pub detector_name: String,
    pub metric_urn: String,
    #[serde(default)]
    pub predicted_time_series: TimeSeries,
}

/// Shape returned by both the draft-config preview and the saved-config bounds
/// evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    #[serde(default)]
    pub predictions: Vec<PredictionSeries>,
    #[serde(default)]
    pub diagnostics: Map<String, JsonValue>,
}

impl PreviewResponse {
    /// Metric-URN slices listed under diagnostics `"0"`, in response order.
    pub fn diagnostic_metric_urns(&self) -> Option<Vec<String>> {
        self.diagnostics
            .get("0")
            .and_then(|value| value.as_object())
            .map(|slices| slices.keys().cloned().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub detector_name: String,
    pub name: String,
}

impl Rule {
    pub fn from_detector_name(detector_name: &str) -> Self {
        let name = detector_name
            .split(':')
            .next()
            .unwrap_or(detector_name)
            .to_string();
        Self {
            detector_name: detector_name.to_string(),
            name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricOffset {
    Current,
    Wo1w,
    Wo2w,
    Wo3w,
    Wo4w,
    Mean4w,
    Median4w,
    Min4w,
    Max4w,
    Predicted,
    None,
}

impl MetricOffset {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricOffset::Current => "current",
            MetricOffset::Wo1w => "wo1w",
            MetricOffset::Wo2w => "wo2w",
            MetricOffset::Wo3w => "wo3w",
            MetricOffset::Wo4w => "wo4w",
            MetricOffset::Mean4w => "mean4w",
            MetricOffset::Median4w => "median4w",
            MetricOffset::Min4w => "min4w",
            MetricOffset::Max4w => "max4w",
            MetricOffset::Predicted => "predicted",
            MetricOffset::None => "none",
        }
    }

    /// Offsets offered as comparison baselines, in display order.
    pub const COMPARISONS: [MetricOffset; 9] = [
        MetricOffset::Wo1w,
        MetricOffset::Wo2w,
        MetricOffset::Wo3w,
        MetricOffset::Wo4w,
        MetricOffset::Mean4w,
        MetricOffset::Median4w,
        MetricOffset::Min4w,
        MetricOffset::Max4w,
        MetricOffset::None,
    ];
}

impl FromStr for MetricOffset {
    type Err = ChartError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "current" => Ok(MetricOffset::Current),
            "wo1w" => Ok(MetricOffset::Wo1w),
            "wo2w" => Ok(MetricOffset::Wo2w),
            "wo3w" => Ok(MetricOffset::Wo3w),
            "wo4w" => Ok(MetricOffset::Wo4w),
            "mean4w" => Ok(MetricOffset::Mean4w),
            "median4w" => Ok(MetricOffset::Median4w),
            "min4w" => Ok(MetricOffset::Min4w),
            "max4w" => Ok(MetricOffset::Max4w),
            "predicted" => Ok(MetricOffset::Predicted),
            "none" => Ok(MetricOffset::None),
            other => Err(ChartError::validation(format!("unknown offset {other}"))),
        }
    }
}

/// Form input for reporting a missed anomaly. Every field is optional until
/// `validate` runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAnomalyRequest {
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub feedback_type: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReport {
    pub start_time: i64,
    pub end_time: i64,
    pub feedback_type: String,
    pub extra: BTreeMap<String, String>,
}

impl ReportAnomalyRequest {
    pub fn validate(&self) -> ChartResult<ValidatedReport> {
        let mut missing: Vec<&str> = Vec::new();
        let start_time = self.start_time.filter(|value| *value != 0);
        let end_time = self.end_time.filter(|value| *value != 0);
        let feedback_type = self
            .feedback_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if start_time.is_none() {
            missing.push("startTime");
        }
        if end_time.is_none() {
            missing.push("endTime");
        }
        if feedback_type.is_none() {
            missing.push("feedbackType");
        }

        match (start_time, end_time, feedback_type) {
            (Some(start_time), Some(end_time), Some(feedback_type)) => Ok(ValidatedReport {
                start_time,
                end_time,
                feedback_type: feedback_type.to_string(),
                extra: self.extra.clone(),
            }),
            _ => Err(ChartError::validation(format!(
                "missing data: {}",
                missing.join(", ")
            ))),
        }
    }
}

impl ValidatedReport {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("startTime".to_string(), self.start_time.to_string()),
            ("endTime".to_string(), self.end_time.to_string()),
            ("feedbackType".to_string(), self.feedback_type.clone()),
        ];
        pairs.extend(
            self.extra
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        pairs
    }
}
