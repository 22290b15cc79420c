use crate::models::{Anomaly, PredictionSeries};
use crate::services::view_state::ViewState;
use crate::state::DetailsState;

/// Anomalies and prediction series produced by one pass of the fetch pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub anomalies: Vec<Anomaly>,
    pub unique_time_series: Vec<PredictionSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// Reference set landed in the old slot; the live configuration must run next.
    Rerun,
    Skipped,
}

/// Applies `result` to the anomaly slots per `view_state` and clears the
/// loading flag.
pub fn apply_fetch_result(
    state: &mut DetailsState,
    view_state: ViewState,
    result: FetchResult,
) -> MergeOutcome {
    state.is_loading = false;
    let count = result.anomalies.len();
    let outcome = match view_state {
        ViewState::Errored => {
            tracing::debug!(alert_id = state.alert_id, "skipping merge for errored view");
            return MergeOutcome::Skipped;
        }
        ViewState::Baseline => {
            state.set_anomalies_old(result.anomalies);
            MergeOutcome::Applied
        }
        ViewState::Replace => {
            state.set_anomalies_new(result.anomalies);
            MergeOutcome::Applied
        }
        ViewState::Shuffle => {
            state.promote_new_to_old();
            state.set_anomalies_new(result.anomalies);
            MergeOutcome::Applied
        }
        ViewState::Bootstrap => {
            state.set_anomalies_old(result.anomalies);
            state.set_anomalies_new(Vec::new());
            MergeOutcome::Rerun
        }
    };
    state.unique_time_series = result.unique_time_series;
    tracing::debug!(
        alert_id = state.alert_id,
        view_state = view_state.as_str(),
        anomalies = count,
        old = state.anomalies_old().len(),
        new = state.anomalies_new().len(),
        "merged fetch result"
    );
    outcome
}
