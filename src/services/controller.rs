use crate::config::ChartConfig;
use crate::error::{ChartError, ChartResult};
use crate::models::{Anomaly, MetricOffset, PredictionSeries, ReportAnomalyRequest, Rule};
use crate::services::client::DetectionApi;
use crate::services::filter::{
    alert_has_dimensions, baseline_options, dimension_label, dimension_options, resolve_dimension,
    rule_options, unique_metric_urns, BaselineOption,
};
use crate::services::memo::DerivedViews;
use crate::services::merger::{apply_fetch_result, FetchResult, MergeOutcome};
use crate::services::notify::Notifier;
use crate::services::reconcile::{show_legend, ChartSeries};
use crate::services::stats::StatCard;
use crate::services::table::{show_settings_column, AnomalyRow};
use crate::services::view_state::ViewState;
use crate::state::{DetailsState, ReportState, ViewOptions};
use crate::time::{format_reported_range, AnalysisRange, RangePreset};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::Instrument;

const ERROR_TITLE: &str = "Error";
const REPORTED_TITLE: &str = "Anomaly reported";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    Completed,
    /// Another fetch was in flight; this trigger was discarded.
    Dropped,
    /// The view is errored and the trigger was automatic.
    Suppressed,
    Failed,
}

/// Inputs for one anomaly-fetch pass, captured under the state lock.
#[derive(Debug, Clone)]
struct FetchPlan {
    alert_id: i64,
    view_state: ViewState,
    is_preview_mode: bool,
    rules_visible: bool,
    is_daily: bool,
    config_yaml: Option<String>,
    analysis_range: AnalysisRange,
    anomalies_range: (i64, i64),
}

impl FetchPlan {
    fn capture(state: &DetailsState, reentered: bool, now_ms: i64) -> Self {
        let mut view_state = state.view_state();
        // Reference config produced nothing; the follow-up pass still targets the new slot.
        if reentered && view_state == ViewState::Bootstrap {
            view_state = ViewState::Replace;
        }
        Self {
            alert_id: state.alert_id,
            view_state,
            is_preview_mode: state.is_preview_mode,
            rules_visible: state.rules_visible(),
            is_daily: state.is_daily(),
            config_yaml: state.preview_config(reentered).map(str::to_string),
            analysis_range: state.analysis_range,
            anomalies_range: state.analysis_range.anomalies_range(now_ms),
        }
    }

    /// Persisted anomalies (with real ids) are read in the overview and for
    /// the edit-preview reference set.
    fn reads_persisted_anomalies(&self) -> bool {
        (self.view_state == ViewState::Baseline && !self.is_preview_mode)
            || self.view_state == ViewState::Bootstrap
    }
}

#[derive(Debug, Default)]
struct SliceSelection {
    metric_urn_list: Vec<String>,
    selected_rule: Option<Rule>,
}

impl SliceSelection {
    fn apply(self, state: &mut DetailsState) {
        if let Some(first) = self.metric_urn_list.first() {
            state.selected_dimension = Some(dimension_label(first));
            state.metric_urn = Some(first.clone());
            state.metric_urn_list = self.metric_urn_list;
        }
        if let Some(rule) = self.selected_rule {
            state.selected_rule = Some(rule);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub alert_id: i64,
    pub view_state: ViewState,
    pub is_loading: bool,
    pub is_loading_time_series: bool,
    pub fetch_errored: bool,
    pub rules_visible: bool,
    pub analysis_range: AnalysisRange,
    pub duration: RangePreset,
    pub metric_urn: Option<String>,
    pub selected_dimension: Option<String>,
    pub dimension_options: Vec<String>,
    pub alert_has_dimensions: bool,
    pub selected_rule: Option<Rule>,
    pub rule_options: Vec<Rule>,
    pub selected_baseline: MetricOffset,
    pub baseline_options: Vec<BaselineOption>,
    pub series: Vec<ChartSeries>,
    pub show_legend: bool,
    pub stats: Vec<StatCard>,
    pub rows: Vec<AnomalyRow>,
    pub show_settings_column: bool,
    pub report: ReportState,
}

/// Owns the view state for one alert and runs the fetch pipeline against it.
/// At most one anomaly fetch is in flight; triggers arriving meanwhile are
/// dropped.
pub struct DetailsController {
    api: Arc<dyn DetectionApi>,
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
    state: Mutex<DetailsState>,
    views: Mutex<DerivedViews>,
    fetch_guard: Arc<Semaphore>,
    series_ticket: AtomicU64,
}

impl DetailsController {
    pub fn new(
        api: Arc<dyn DetectionApi>,
        notifier: Arc<dyn Notifier>,
        mut options: ViewOptions,
        config: &ChartConfig,
    ) -> ChartResult<Self> {
        options.time_window_ms = options.time_window_ms.or(Some(config.time_window_ms));
        let mut state = DetailsState::new(options, Utc::now(), &config.timezone)?;
        if !state.is_preview_mode {
            // The overview always renders its details.
            state.show_details = true;
            state.data_is_current = true;
        }
        Ok(Self {
            api,
            notifier,
            timezone: config.timezone,
            state: Mutex::new(state),
            views: Mutex::new(DerivedViews::default()),
            fetch_guard: Arc::new(Semaphore::new(1)),
            series_ticket: AtomicU64::new(0),
        })
    }

    /// Initial load. The overview fetches right away; a preview waits for
    /// `request_preview`.
    pub async fn start(&self) -> PipelineOutcome {
        let is_preview_mode = self.state.lock().await.is_preview_mode;
        if is_preview_mode {
            return PipelineOutcome::Completed;
        }
        self.run_pipeline().await
    }

    /// Manual preview request. Clears a previous error.
    pub async fn request_preview(&self) -> PipelineOutcome {
        {
            let mut state = self.state.lock().await;
            state.show_details = true;
            state.data_is_current = true;
            state.fetch_errored = false;
        }
        self.run_pipeline().await
    }

    /// Automatic re-fetch after an input change.
    pub async fn trigger_fetch(&self) -> PipelineOutcome {
        if self.state.lock().await.fetch_errored {
            tracing::debug!("fetch suppressed while view is errored");
            return PipelineOutcome::Suppressed;
        }
        self.run_pipeline().await
    }

    pub async fn set_alert_yaml(&self, yaml: String) {
        let mut state = self.state.lock().await;
        state.alert_yaml = Some(yaml);
        state.data_is_current = false;
    }

    pub async fn select_rule(&self, rule: Rule) -> ChartResult<()> {
        self.state.lock().await.selected_rule = Some(rule);
        self.refresh_time_series_reporting().await
    }

    pub async fn select_dimension(&self, label: &str) -> ChartResult<()> {
        {
            let mut state = self.state.lock().await;
            let urn = resolve_dimension(&state.metric_urn_list, label)
                .map(str::to_string)
                .ok_or_else(|| ChartError::validation(format!("unknown dimension {label}")))?;
            state.selected_dimension = Some(dimension_label(&urn));
            state.metric_urn = Some(urn);
        }
        self.refresh_time_series_reporting().await
    }

    /// Returns `false` when `offset` was already selected.
    pub async fn select_baseline(&self, offset: MetricOffset) -> ChartResult<bool> {
        {
            let mut state = self.state.lock().await;
            if state.selected_baseline == offset {
                return Ok(false);
            }
            state.selected_baseline = offset;
        }
        self.refresh_time_series_reporting().await?;
        Ok(true)
    }

    pub async fn select_range(
        &self,
        start: i64,
        end: i64,
        duration: RangePreset,
    ) -> ChartResult<PipelineOutcome> {
        let range = AnalysisRange::new(start, end)?;
        let should_fetch = {
            let mut state = self.state.lock().await;
            state.analysis_range = range;
            state.duration = duration;
            let should_fetch = state.show_details && state.data_is_current;
            if should_fetch && state.is_preview_mode {
                state.clear_anomalies();
            }
            should_fetch
        };
        if !should_fetch {
            return Ok(PipelineOutcome::Completed);
        }
        Ok(self.trigger_fetch().await)
    }

    pub async fn select_preset(&self, preset: RangePreset) -> ChartResult<PipelineOutcome> {
        let range = preset
            .range(Utc::now(), &self.timezone)
            .ok_or_else(|| ChartError::validation("custom ranges need explicit bounds"))?;
        self.select_range(range.start(), range.end(), preset).await
    }

    /// Validates and sends a missed-anomaly report. Nothing is sent when a
    /// required field is missing.
    pub async fn submit_report(&self, props: ReportAnomalyRequest) -> ChartResult<()> {
        let (alert_id, metric_urn) = {
            let mut state = self.state.lock().await;
            state.report.missing_anomaly_props = props.clone();
            (state.alert_id, state.metric_urn.clone())
        };
        let sent = match (props.validate(), metric_urn) {
            (Ok(report), Some(metric_urn)) => self
                .api
                .report_anomaly(alert_id, &metric_urn, &report)
                .await
                .map(|()| report),
            (Ok(_), None) => Err(ChartError::validation("no metric slice selected")),
            (Err(err), _) => Err(err),
        };

        let mut state = self.state.lock().await;
        match sent {
            Ok(report) => {
                let reported_range =
                    format_reported_range(report.start_time, report.end_time, &self.timezone);
                state.report.is_success = true;
                state.report.is_failure = false;
                state.report.reported_range = Some(reported_range.clone());
                tracing::info!(alert_id, "reported missing anomaly");
                self.notifier.success(REPORTED_TITLE, &reported_range);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(alert_id, error = %err, "report anomaly failed");
                state.report.missing_anomaly_props = ReportAnomalyRequest::default();
                state.report.is_failure = true;
                state.report.is_success = false;
                Err(err)
            }
        }
    }

    pub async fn snapshot(&self) -> DetailsState {
        self.state.lock().await.clone()
    }

    pub async fn view(&self) -> ChartView {
        let state = self.state.lock().await;
        let mut views = self.views.lock().await;
        let view_state = state.view_state();
        let rules_visible = state.rules_visible();
        ChartView {
            alert_id: state.alert_id,
            view_state,
            is_loading: state.is_loading,
            is_loading_time_series: state.is_loading_time_series,
            fetch_errored: state.fetch_errored,
            rules_visible,
            analysis_range: state.analysis_range,
            duration: state.duration,
            metric_urn: state.metric_urn.clone(),
            selected_dimension: state.selected_dimension.clone(),
            dimension_options: dimension_options(&state.metric_urn_list),
            alert_has_dimensions: alert_has_dimensions(&state.metric_urn_list),
            selected_rule: state.selected_rule.clone(),
            rule_options: rule_options(&state.unique_time_series),
            selected_baseline: state.selected_baseline,
            baseline_options: baseline_options(rules_visible, state.selected_baseline),
            series: views.series(&state).to_vec(),
            show_legend: show_legend(views.filtered_count(&state)),
            stats: views.stats(&state).to_vec(),
            rows: views.rows(&state, &self.timezone).to_vec(),
            show_settings_column: show_settings_column(state.is_edit_mode, view_state),
            report: state.report.clone(),
        }
    }

    async fn run_pipeline(&self) -> PipelineOutcome {
        let Ok(_permit) = self.fetch_guard.clone().try_acquire_owned() else {
            tracing::debug!("anomaly fetch already in flight; dropping trigger");
            return PipelineOutcome::Dropped;
        };
        let alert_id = self.state.lock().await.alert_id;
        let span = tracing::info_span!("anomaly_fetch", alert_id);
        match self.fetch_anomalies_and_series().instrument(span).await {
            Ok(()) => PipelineOutcome::Completed,
            Err(err) => {
                self.fail(&err).await;
                PipelineOutcome::Failed
            }
        }
    }

    async fn fetch_anomalies_and_series(&self) -> ChartResult<()> {
        let mut reentered = false;
        loop {
            let plan = {
                let mut state = self.state.lock().await;
                state.fetch_errored = false;
                state.is_loading = true;
                FetchPlan::capture(&state, reentered, Utc::now().timestamp_millis())
            };
            tracing::debug!(
                view_state = plan.view_state.as_str(),
                rules_visible = plan.rules_visible,
                reentered,
                "fetching anomalies"
            );

            let (result, selection) = self.fetch_anomalies(&plan).await?;

            let outcome = {
                let mut state = self.state.lock().await;
                selection.apply(&mut state);
                apply_fetch_result(&mut state, plan.view_state, result)
            };
            if outcome == MergeOutcome::Rerun && !reentered {
                reentered = true;
                continue;
            }
            break;
        }

        if self.state.lock().await.metric_urn.is_none() {
            return Err(ChartError::MissingSlice);
        }
        self.refresh_time_series().await
    }

    async fn fetch_anomalies(&self, plan: &FetchPlan) -> ChartResult<(FetchResult, SliceSelection)> {
        if !plan.rules_visible {
            let anomalies = self.fetch_persisted(plan).await?;
            let selection = SliceSelection {
                metric_urn_list: unique_metric_urns(&anomalies),
                selected_rule: None,
            };
            let result = FetchResult {
                anomalies,
                unique_time_series: Vec::new(),
            };
            return Ok((result, selection));
        }

        let (start, end) = plan.anomalies_range;
        let application = if plan.is_daily {
            self.api.fetch_bounds(plan.alert_id, start, end).await?
        } else {
            let yaml = plan
                .config_yaml
                .as_deref()
                .ok_or_else(|| ChartError::validation("no detection configuration to preview"))?;
            self.api
                .fetch_yaml_preview_anomalies(yaml, start, end, plan.alert_id)
                .await?
        };

        let mut selection = SliceSelection::default();
        if let Some(urns) = application.diagnostic_metric_urns() {
            selection.metric_urn_list = urns;
            selection.selected_rule = application
                .predictions
                .first()
                .map(|prediction| Rule::from_detector_name(&prediction.detector_name));
        }

        let anomalies = if plan.reads_persisted_anomalies() {
            self.fetch_persisted(plan).await?
        } else {
            application.anomalies
        };
        let result = FetchResult {
            anomalies,
            unique_time_series: application.predictions,
        };
        Ok((result, selection))
    }

    async fn fetch_persisted(&self, plan: &FetchPlan) -> ChartResult<Vec<Anomaly>> {
        self.api
            .fetch_anomalies_by_alert(
                plan.alert_id,
                plan.analysis_range.start(),
                plan.analysis_range.end(),
            )
            .await
    }

    async fn refresh_time_series_reporting(&self) -> ChartResult<()> {
        match self.refresh_time_series().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Fetches the primary and baseline series for the active slice. Only the
    /// latest request may write its result.
    async fn refresh_time_series(&self) -> ChartResult<()> {
        let ticket = self.series_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let (urn, range, offset, prediction) = {
            let mut state = self.state.lock().await;
            let Some(urn) = state.metric_urn.clone() else {
                return Err(ChartError::MissingSlice);
            };
            state.is_loading_time_series = true;
            let prediction = if state.rules_visible() {
                Some(find_prediction(
                    &state.unique_time_series,
                    state.selected_rule.as_ref(),
                    &urn,
                ))
            } else {
                None
            };
            (urn, state.analysis_range, state.selected_baseline, prediction)
        };
        let timezone = self.timezone.name();

        let series = match prediction {
            Some(None) => {
                tracing::warn!(metric_urn = %urn, "no prediction series for the selected rule");
                (None, None)
            }
            Some(Some(prediction)) if offset == MetricOffset::Predicted => {
                let predicted = prediction.predicted_time_series;
                (Some(predicted.clone()), Some(predicted))
            }
            Some(Some(prediction)) => {
                let baseline = self
                    .api
                    .fetch_metric_timeseries(&urn, range.start(), range.end(), offset, timezone)
                    .await?;
                (Some(prediction.predicted_time_series), Some(baseline))
            }
            None => {
                let (current, baseline) = tokio::try_join!(
                    self.api.fetch_metric_timeseries(
                        &urn,
                        range.start(),
                        range.end(),
                        MetricOffset::Current,
                        timezone,
                    ),
                    self.api
                        .fetch_metric_timeseries(&urn, range.start(), range.end(), offset, timezone),
                )?;
                (Some(current), Some(baseline))
            }
        };

        let mut state = self.state.lock().await;
        if self.series_ticket.load(Ordering::SeqCst) != ticket {
            tracing::debug!(metric_urn = %urn, "discarding superseded time series");
            return Ok(());
        }
        state.set_series(series.0, series.1);
        state.is_loading_time_series = false;
        Ok(())
    }

    async fn fail(&self, err: &ChartError) {
        tracing::warn!(error = %err, "anomaly view fetch failed");
        {
            let mut state = self.state.lock().await;
            state.is_loading = false;
            state.is_loading_time_series = false;
            state.fetch_errored = true;
        }
        self.notifier.error(ERROR_TITLE, &err.to_string());
    }
}

fn find_prediction(
    unique_time_series: &[PredictionSeries],
    rule: Option<&Rule>,
    metric_urn: &str,
) -> Option<PredictionSeries> {
    let rule = rule?;
    unique_time_series
        .iter()
        .find(|series| series.detector_name == rule.detector_name && series.metric_urn == metric_urn)
        .cloned()
}
