use crate::models::{
    Anomaly, CLASSIFICATION_FALSE_NEGATIVE, CLASSIFICATION_FALSE_POSITIVE, CLASSIFICATION_NONE,
    CLASSIFICATION_TRUE_POSITIVE,
};
use serde::Serialize;

const UNDEFINED_RATE: &str = "N/A";

/// Feedback counts over the unfiltered old anomaly set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityCounts {
    pub total: usize,
    pub responded: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl QualityCounts {
    pub fn tally(anomalies: &[Anomaly]) -> Self {
        let mut counts = Self {
            total: anomalies.len(),
            ..Self::default()
        };
        for classification in anomalies
            .iter()
            .filter_map(|anomaly| anomaly.status_classification.as_deref())
            .filter(|classification| *classification != CLASSIFICATION_NONE)
        {
            counts.responded += 1;
            match classification {
                CLASSIFICATION_TRUE_POSITIVE => counts.true_positives += 1,
                CLASSIFICATION_FALSE_POSITIVE => counts.false_positives += 1,
                CLASSIFICATION_FALSE_NEGATIVE => counts.false_negatives += 1,
                _ => {}
            }
        }
        counts
    }

    /// `None` when nothing was reported.
    pub fn response_rate(&self) -> Option<f64> {
        ratio(self.responded, self.total)
    }

    pub fn precision(&self) -> Option<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    pub fn recall(&self) -> Option<f64> {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Digit,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCard {
    pub title: &'static str,
    pub description: &'static str,
    pub value: Option<f64>,
    pub display: String,
    pub kind: StatKind,
}

impl StatCard {
    fn digit(title: &'static str, description: &'static str, value: usize) -> Self {
        Self {
            title,
            description,
            value: Some(value as f64),
            display: value.to_string(),
            kind: StatKind::Digit,
        }
    }

    fn percent(title: &'static str, description: &'static str, value: Option<f64>) -> Self {
        Self {
            title,
            description,
            value,
            display: format_percent(value),
            kind: StatKind::Percent,
        }
    }
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.1}%", value * 100.0),
        None => UNDEFINED_RATE.to_string(),
    }
}

/// Cards shown above the chart. A create preview has no real feedback yet,
/// so it only reports the anomaly count.
pub fn stat_cards(anomalies_old: &[Anomaly], is_preview_mode: bool, is_edit_mode: bool) -> Vec<StatCard> {
    let counts = QualityCounts::tally(anomalies_old);
    let mut cards = vec![StatCard::digit(
        "Anomalies",
        "Total number of anomalies that occured over a period of time",
        counts.total,
    )];
    if !is_preview_mode || is_edit_mode {
        cards.extend([
            StatCard::percent(
                "Response Rate",
                "% of anomalies that are reviewed",
                counts.response_rate(),
            ),
            StatCard::percent(
                "Precision",
                "% of all anomalies detected by the system that are true",
                counts.precision(),
            ),
            StatCard::percent(
                "Recall",
                "% of all anomalies detected by the system",
                counts.recall(),
            ),
        ]);
    }
    cards
}
