use crate::error::ChartResult;
use crate::models::{Anomaly, MetricOffset, PredictionSeries, ReportAnomalyRequest, Rule, TimeSeries};
use crate::services::view_state::{resolve_view_state, ViewState, ViewStateInputs};
use crate::time::{self, AnalysisRange, RangePreset};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

const DAILY_GRANULARITY_MARKER: &str = "DAYS";

/// What the caller knows about the alert before anything is fetched.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub alert_id: i64,
    pub is_preview_mode: bool,
    pub is_edit_mode: bool,
    pub granularity: Option<String>,
    pub dimension_exploration: bool,
    pub alert_yaml: Option<String>,
    /// Saved configuration used as the comparison reference in edit preview.
    pub original_yaml: Option<String>,
    pub time_window_ms: Option<i64>,
    /// Explicit window; replaces the default one derived from `time_window_ms`.
    pub analysis_range: Option<AnalysisRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportState {
    pub is_success: bool,
    pub is_failure: bool,
    pub missing_anomaly_props: ReportAnomalyRequest,
    pub reported_range: Option<String>,
}

/// Single-owner state for one alert detail view. Only the controller mutates
/// it; derivations read it by reference.
#[derive(Debug, Clone)]
pub struct DetailsState {
    pub alert_id: i64,
    pub is_preview_mode: bool,
    pub is_edit_mode: bool,
    pub granularity: Option<String>,
    pub dimension_exploration: bool,
    pub alert_yaml: Option<String>,
    pub original_yaml: Option<String>,
    pub analysis_range: AnalysisRange,
    pub duration: RangePreset,
    anomalies_old: Vec<Anomaly>,
    anomalies_new: Vec<Anomaly>,
    anomalies_revision: u64,
    pub unique_time_series: Vec<PredictionSeries>,
    pub metric_urn: Option<String>,
    pub metric_urn_list: Vec<String>,
    pub selected_dimension: Option<String>,
    pub selected_rule: Option<Rule>,
    pub selected_baseline: MetricOffset,
    timeseries: Option<TimeSeries>,
    baseline: Option<TimeSeries>,
    series_revision: u64,
    pub is_loading: bool,
    pub is_loading_time_series: bool,
    pub fetch_errored: bool,
    pub show_details: bool,
    pub data_is_current: bool,
    pub report: ReportState,
}

impl DetailsState {
    pub fn new(options: ViewOptions, now: DateTime<Utc>, tz: &Tz) -> ChartResult<Self> {
        let window_ms = options.time_window_ms.unwrap_or(time::DEFAULT_WINDOW_MS);
        let analysis_range = match options.analysis_range {
            Some(range) => range,
            None => time::default_analysis_range(now, window_ms, tz)?,
        };
        let is_daily = is_daily_granularity(options.granularity.as_deref());
        let selected_baseline =
            if options.is_preview_mode || (is_daily && !options.dimension_exploration) {
                MetricOffset::Predicted
            } else {
                MetricOffset::Wo1w
            };
        let duration = if options.is_preview_mode || options.analysis_range.is_some() {
            RangePreset::Custom
        } else {
            time::default_duration(window_ms)
        };

        Ok(Self {
            alert_id: options.alert_id,
            is_preview_mode: options.is_preview_mode,
            is_edit_mode: options.is_edit_mode,
            granularity: options.granularity,
            dimension_exploration: options.dimension_exploration,
            alert_yaml: options.alert_yaml,
            original_yaml: options.original_yaml,
            analysis_range,
            duration,
            anomalies_old: Vec::new(),
            anomalies_new: Vec::new(),
            anomalies_revision: 0,
            unique_time_series: Vec::new(),
            metric_urn: None,
            metric_urn_list: Vec::new(),
            selected_dimension: None,
            selected_rule: None,
            selected_baseline,
            timeseries: None,
            baseline: None,
            series_revision: 0,
            is_loading: false,
            is_loading_time_series: false,
            fetch_errored: false,
            show_details: false,
            data_is_current: false,
            report: ReportState::default(),
        })
    }

    pub fn is_daily(&self) -> bool {
        is_daily_granularity(self.granularity.as_deref())
    }

    /// Baseline predictions, bounds and the rule selector are shown.
    pub fn rules_visible(&self) -> bool {
        self.is_preview_mode || (!self.dimension_exploration && self.is_daily())
    }

    pub fn view_state_inputs(&self) -> ViewStateInputs {
        ViewStateInputs {
            is_preview_mode: self.is_preview_mode,
            is_edit_mode: self.is_edit_mode,
            has_old_anomalies: !self.anomalies_old.is_empty(),
            has_new_anomalies: !self.anomalies_new.is_empty(),
            fetch_errored: self.fetch_errored,
        }
    }

    pub fn view_state(&self) -> ViewState {
        resolve_view_state(self.view_state_inputs())
    }

    pub fn anomalies_old(&self) -> &[Anomaly] {
        &self.anomalies_old
    }

    pub fn anomalies_new(&self) -> &[Anomaly] {
        &self.anomalies_new
    }

    /// Bumped on every slot assignment so derived views can tell a replaced
    /// set from an unchanged one without comparing contents.
    pub fn anomalies_revision(&self) -> u64 {
        self.anomalies_revision
    }

    pub fn set_anomalies_old(&mut self, anomalies: Vec<Anomaly>) {
        self.anomalies_old = anomalies;
        self.anomalies_revision += 1;
    }

    pub fn set_anomalies_new(&mut self, anomalies: Vec<Anomaly>) {
        self.anomalies_new = anomalies;
        self.anomalies_revision += 1;
    }

    /// Moves the new set into the old slot, leaving new empty.
    pub fn promote_new_to_old(&mut self) {
        self.anomalies_old = std::mem::take(&mut self.anomalies_new);
        self.anomalies_revision += 1;
    }

    pub fn clear_anomalies(&mut self) {
        self.anomalies_old.clear();
        self.anomalies_new.clear();
        self.anomalies_revision += 1;
    }

    pub fn timeseries(&self) -> Option<&TimeSeries> {
        self.timeseries.as_ref()
    }

    pub fn baseline(&self) -> Option<&TimeSeries> {
        self.baseline.as_ref()
    }

    pub fn series_revision(&self) -> u64 {
        self.series_revision
    }

    pub fn set_series(&mut self, timeseries: Option<TimeSeries>, baseline: Option<TimeSeries>) {
        self.timeseries = timeseries;
        self.baseline = baseline;
        self.series_revision += 1;
    }

    /// Config sent to the preview evaluation for the next pass: the saved
    /// reference while bootstrapping an edit preview, the live draft otherwise.
    pub fn preview_config(&self, force_live: bool) -> Option<&str> {
        if !force_live && self.is_edit_mode && self.anomalies_old.is_empty() {
            self.original_yaml.as_deref()
        } else {
            self.alert_yaml.as_deref()
        }
    }
}

pub fn is_daily_granularity(granularity: Option<&str>) -> bool {
    granularity.unwrap_or_default().contains(DAILY_GRANULARITY_MARKER)
}
