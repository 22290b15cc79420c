use crate::error::{ChartError, ChartResult};
use crate::models::{
    Anomaly, AnomalyProperties, MetricOffset, PredictionSeries, PreviewResponse, TimeSeries,
    ValidatedReport,
};
use crate::services::client::DetectionApi;
use crate::state::{DetailsState, ViewOptions};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::{Notify, Semaphore};

pub fn la() -> Tz {
    chrono_tz::America::Los_Angeles
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 10, 18, 30, 0)
        .single()
        .expect("fixed test time")
}

pub fn values(samples: &[f64]) -> Vec<Option<f64>> {
    samples.iter().copied().map(Some).collect()
}

pub fn anomaly(metric_urn: &str, start_time: i64, end_time: i64) -> Anomaly {
    Anomaly {
        id: None,
        metric_urn: metric_urn.to_string(),
        start_time,
        end_time,
        avg_current_val: Some(10.0),
        avg_baseline_val: Some(8.0),
        dimensions: BTreeMap::new(),
        properties: None,
        feedback: None,
        status_classification: None,
    }
}

pub fn anomaly_for_rule(metric_urn: &str, start_time: i64, end_time: i64, detector: &str) -> Anomaly {
    Anomaly {
        properties: Some(AnomalyProperties {
            detector_component_name: Some(detector.to_string()),
        }),
        ..anomaly(metric_urn, start_time, end_time)
    }
}

pub fn classified(classification: Option<&str>) -> Anomaly {
    Anomaly {
        status_classification: classification.map(str::to_string),
        ..anomaly("thirdeye:metric:1", 0, 1)
    }
}

pub fn prediction(detector_name: &str, metric_urn: &str) -> PredictionSeries {
    PredictionSeries {
        detector_name: detector_name.to_string(),
        metric_urn: metric_urn.to_string(),
        predicted_time_series: TimeSeries {
            timestamp: vec![0, 5, 10, 15, 20],
            value: values(&[1.0, 1.0, 1.0, 1.0, 1.0]),
            current: values(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            upper_bound: values(&[2.0, 2.0, 2.0, 2.0, 2.0]),
            lower_bound: values(&[0.0, 0.0, 0.0, 0.0, 0.0]),
        },
    }
}

/// Evaluation result for a single slice evaluated by a single rule.
pub fn preview_response(anomalies: Vec<Anomaly>, metric_urn: &str, detector: &str) -> PreviewResponse {
    let mut slices = Map::new();
    slices.insert(metric_urn.to_string(), json!({}));
    let mut diagnostics = Map::new();
    diagnostics.insert("0".to_string(), serde_json::Value::Object(slices));
    PreviewResponse {
        anomalies,
        predictions: vec![prediction(detector, metric_urn)],
        diagnostics,
    }
}

pub fn preview_state(edit: bool) -> DetailsState {
    DetailsState::new(
        ViewOptions {
            alert_id: 1,
            is_preview_mode: true,
            is_edit_mode: edit,
            alert_yaml: Some("live".to_string()),
            original_yaml: Some("saved".to_string()),
            ..ViewOptions::default()
        },
        test_now(),
        &la(),
    )
    .expect("preview state")
}

pub fn overview_state() -> DetailsState {
    DetailsState::new(
        ViewOptions {
            alert_id: 1,
            granularity: Some("5_MINUTES".to_string()),
            ..ViewOptions::default()
        },
        test_now(),
        &la(),
    )
    .expect("overview state")
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    AnomaliesByAlert { start: i64, end: i64 },
    YamlPreview { yaml: String },
    Bounds { start: i64, end: i64 },
    Timeseries { urn: String, offset: MetricOffset },
    Report { metric_urn: String },
}

#[derive(Default)]
struct FakeResponses {
    anomalies: Vec<Anomaly>,
    previews: HashMap<String, PreviewResponse>,
    bounds: PreviewResponse,
    timeseries: TimeSeries,
}

/// In-memory backend that records every call. A gated fake parks each call
/// until `open_gate` admits it.
#[derive(Default)]
pub struct FakeDetectionApi {
    responses: Mutex<FakeResponses>,
    calls: Mutex<Vec<ApiCall>>,
    failing: AtomicBool,
    gate: Option<Semaphore>,
    called: Notify,
}

impl FakeDetectionApi {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn set_anomalies(&self, anomalies: Vec<Anomaly>) {
        self.responses.lock().expect("responses").anomalies = anomalies;
    }

    pub fn set_preview(&self, yaml: &str, response: PreviewResponse) {
        self.responses
            .lock()
            .expect("responses")
            .previews
            .insert(yaml.to_string(), response);
    }

    pub fn set_bounds(&self, response: PreviewResponse) {
        self.responses.lock().expect("responses").bounds = response;
    }

    pub fn set_timeseries(&self, timeseries: TimeSeries) {
        self.responses.lock().expect("responses").timeseries = timeseries;
    }

    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().expect("calls").clone()
    }

    /// Resolves once at least `count` calls have been recorded.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.called.notified();
            if self.calls.lock().expect("calls").len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Lets exactly one parked call through, in arrival order.
    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    async fn enter(&self, call: ApiCall) -> ChartResult<()> {
        self.calls.lock().expect("calls").push(call);
        self.called.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(ChartError::fetch)?.forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChartError::fetch("backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DetectionApi for FakeDetectionApi {
    async fn fetch_anomalies_by_alert(
        &self,
        _alert_id: i64,
        start: i64,
        end: i64,
    ) -> ChartResult<Vec<Anomaly>> {
        self.enter(ApiCall::AnomaliesByAlert { start, end }).await?;
        Ok(self.responses.lock().expect("responses").anomalies.clone())
    }

    async fn fetch_yaml_preview_anomalies(
        &self,
        config_yaml: &str,
        _start: i64,
        _end: i64,
        _alert_id: i64,
    ) -> ChartResult<PreviewResponse> {
        self.enter(ApiCall::YamlPreview {
            yaml: config_yaml.to_string(),
        })
        .await?;
        Ok(self
            .responses
            .lock()
            .expect("responses")
            .previews
            .get(config_yaml)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_bounds(&self, _alert_id: i64, start: i64, end: i64) -> ChartResult<PreviewResponse> {
        self.enter(ApiCall::Bounds { start, end }).await?;
        Ok(self.responses.lock().expect("responses").bounds.clone())
    }

    async fn fetch_metric_timeseries(
        &self,
        urn: &str,
        _start: i64,
        _end: i64,
        offset: MetricOffset,
        _timezone: &str,
    ) -> ChartResult<TimeSeries> {
        self.enter(ApiCall::Timeseries {
            urn: urn.to_string(),
            offset,
        })
        .await?;
        Ok(self.responses.lock().expect("responses").timeseries.clone())
    }

    async fn report_anomaly(
        &self,
        _alert_id: i64,
        metric_urn: &str,
        _report: &ValidatedReport,
    ) -> ChartResult<()> {
        self.enter(ApiCall::Report {
            metric_urn: metric_urn.to_string(),
        })
        .await
    }
}
