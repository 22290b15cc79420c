use crate::models::{Anomaly, AnomalyFeedback, CLASSIFICATION_NONE};
use crate::services::view_state::ViewState;
use crate::time::format_table_start;
use chrono_tz::Tz;
use serde::Serialize;

const PLACEHOLDER: &str = "--";
const ANONYMOUS_USER: &str = "no-auth-user";
const NO_FEEDBACK: &str = "NO_FEEDBACK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettingsTag {
    Current,
    Old,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRow {
    pub id: i64,
    pub metric_urn: String,
    pub settings: SettingsTag,
    pub dimension_str: String,
    pub start_date_str: String,
    pub current: Option<f64>,
    pub baseline: Option<f64>,
    pub rule: String,
    pub modified_by: String,
    pub start: i64,
    pub end: i64,
    pub feedback: Option<String>,
}

/// Detector prefix of the component name, or the placeholder.
pub fn formatted_rule(anomaly: &Anomaly) -> String {
    anomaly
        .detector_component_name()
        .filter(|name| !name.is_empty())
        .and_then(|name| name.split(':').next())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

pub fn formatted_modified_by(feedback: Option<&AnomalyFeedback>) -> String {
    feedback
        .and_then(|feedback| feedback.updated_by.as_deref())
        .filter(|user| !user.is_empty() && *user != ANONYMOUS_USER)
        .and_then(|user| user.split('@').next())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// Dimension keys followed by their values, comma-joined.
pub fn dimension_string(anomaly: &Anomaly) -> String {
    anomaly
        .dimensions
        .keys()
        .chain(anomaly.dimensions.values())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn feedback_label(anomaly: &Anomaly) -> Option<String> {
    let raw = match &anomaly.feedback {
        Some(feedback) => feedback.feedback_type.clone(),
        None => anomaly.status_classification.clone(),
    };
    raw.map(|value| {
        if value == CLASSIFICATION_NONE {
            NO_FEEDBACK.to_string()
        } else {
            value
        }
    })
}

pub fn show_settings_column(is_edit_mode: bool, view_state: ViewState) -> bool {
    (is_edit_mode && view_state == ViewState::Replace) || view_state == ViewState::Shuffle
}

/// Rows for the old set followed by the new set. The row counter advances on
/// every row; new rows always take it as their id.
pub fn table_rows(
    anomalies_old: &[Anomaly],
    anomalies_new: &[Anomaly],
    is_edit_mode: bool,
    view_state: ViewState,
    tz: &Tz,
) -> Vec<AnomalyRow> {
    let old_settings = if is_edit_mode && view_state == ViewState::Replace {
        SettingsTag::Current
    } else {
        SettingsTag::Old
    };
    let old_rows = anomalies_old.iter().map(|anomaly| (anomaly, old_settings));
    let new_rows = anomalies_new.iter().map(|anomaly| (anomaly, SettingsTag::New));

    old_rows
        .chain(new_rows)
        .enumerate()
        .map(|(counter, (anomaly, settings))| {
            let counter = counter as i64;
            let id = match settings {
                SettingsTag::New => counter,
                _ => anomaly.id.filter(|id| *id != 0).unwrap_or(counter),
            };
            AnomalyRow {
                id,
                metric_urn: anomaly.metric_urn.clone(),
                settings,
                dimension_str: dimension_string(anomaly),
                start_date_str: format_table_start(anomaly.start_time, tz),
                current: anomaly.avg_current_val,
                baseline: anomaly.avg_baseline_val,
                rule: formatted_rule(anomaly),
                modified_by: formatted_modified_by(anomaly.feedback.as_ref()),
                start: anomaly.start_time,
                end: anomaly.end_time,
                feedback: feedback_label(anomaly),
            }
        })
        .collect()
}
