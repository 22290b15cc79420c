use crate::models::Anomaly;
use crate::services::filter::filter_anomalies;
use crate::services::reconcile::{build_chart_series, ChartInputs, ChartSeries};
use crate::services::stats::{stat_cards, StatCard};
use crate::services::table::{table_rows, AnomalyRow};
use crate::services::view_state::ViewState;
use crate::state::DetailsState;
use chrono_tz::Tz;

/// Last computed value together with the inputs it was computed from.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    entry: Option<(K, V)>,
    computations: u64,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entry: None,
            computations: 0,
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        let fresh = matches!(&self.entry, Some((cached, _)) if *cached == key);
        if !fresh {
            self.computations += 1;
            self.entry = None;
        }
        let (_, value) = self.entry.get_or_insert_with(|| (key, compute()));
        value
    }

    pub fn computations(&self) -> u64 {
        self.computations
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FilterKey {
    anomalies_revision: u64,
    metric_urn: Option<String>,
    detector_name: Option<String>,
    rules_visible: bool,
}

impl FilterKey {
    fn of(state: &DetailsState) -> Self {
        Self {
            anomalies_revision: state.anomalies_revision(),
            metric_urn: state.metric_urn.clone(),
            detector_name: state
                .selected_rule
                .as_ref()
                .map(|rule| rule.detector_name.clone()),
            rules_visible: state.rules_visible(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SeriesKey {
    filter: FilterKey,
    series_revision: u64,
    view_state: ViewState,
    is_preview_mode: bool,
    is_edit_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SetKey {
    anomalies_revision: u64,
    view_state: ViewState,
    is_preview_mode: bool,
    is_edit_mode: bool,
}

impl SetKey {
    fn of(state: &DetailsState) -> Self {
        Self {
            anomalies_revision: state.anomalies_revision(),
            view_state: state.view_state(),
            is_preview_mode: state.is_preview_mode,
            is_edit_mode: state.is_edit_mode,
        }
    }
}

/// Filtered sets, chart series, stat cards and table rows for a view. Each is
/// recomputed only when one of its declared inputs changed.
#[derive(Debug, Default)]
pub struct DerivedViews {
    filtered: Memo<FilterKey, (Vec<Anomaly>, Vec<Anomaly>)>,
    series: Memo<SeriesKey, Vec<ChartSeries>>,
    stats: Memo<SetKey, Vec<StatCard>>,
    rows: Memo<SetKey, Vec<AnomalyRow>>,
}

impl DerivedViews {
    pub fn filtered(&mut self, state: &DetailsState) -> &(Vec<Anomaly>, Vec<Anomaly>) {
        filtered_sets(&mut self.filtered, state)
    }

    pub fn series(&mut self, state: &DetailsState) -> &[ChartSeries] {
        let key = SeriesKey {
            filter: FilterKey::of(state),
            series_revision: state.series_revision(),
            view_state: state.view_state(),
            is_preview_mode: state.is_preview_mode,
            is_edit_mode: state.is_edit_mode,
        };
        let Self {
            filtered, series, ..
        } = self;
        let (filtered_old, filtered_new) = filtered_sets(filtered, state);
        series.get_or_compute(key, || {
            build_chart_series(ChartInputs {
                filtered_old,
                filtered_new,
                timeseries: state.timeseries(),
                baseline: state.baseline(),
                rules_visible: state.rules_visible(),
                is_preview_mode: state.is_preview_mode,
                is_edit_mode: state.is_edit_mode,
                view_state: state.view_state(),
            })
        })
    }

    pub fn stats(&mut self, state: &DetailsState) -> &[StatCard] {
        self.stats.get_or_compute(SetKey::of(state), || {
            stat_cards(
                state.anomalies_old(),
                state.is_preview_mode,
                state.is_edit_mode,
            )
        })
    }

    pub fn rows(&mut self, state: &DetailsState, tz: &Tz) -> &[AnomalyRow] {
        self.rows.get_or_compute(SetKey::of(state), || {
            table_rows(
                state.anomalies_old(),
                state.anomalies_new(),
                state.is_edit_mode,
                state.view_state(),
                tz,
            )
        })
    }

    pub fn filtered_count(&mut self, state: &DetailsState) -> usize {
        let (old, new) = self.filtered(state);
        old.len() + new.len()
    }
}

fn filtered_sets<'a>(
    memo: &'a mut Memo<FilterKey, (Vec<Anomaly>, Vec<Anomaly>)>,
    state: &DetailsState,
) -> &'a (Vec<Anomaly>, Vec<Anomaly>) {
    memo.get_or_compute(FilterKey::of(state), || {
        let metric_urn = state.metric_urn.as_deref();
        let rule = state.selected_rule.as_ref();
        let rules_visible = state.rules_visible();
        (
            filter_anomalies(state.anomalies_old(), metric_urn, rule, rules_visible),
            filter_anomalies(state.anomalies_new(), metric_urn, rule, rules_visible),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSeries;
    use crate::test_support::{anomaly, overview_state, values};

    const URN: &str = "thirdeye:metric:1";

    #[test]
    fn memo_recomputes_only_on_key_change() {
        let mut memo: Memo<u64, String> = Memo::default();
        assert_eq!(memo.get_or_compute(1, || "a".to_string()), "a");
        assert_eq!(memo.get_or_compute(1, || "b".to_string()), "a");
        assert_eq!(memo.computations(), 1);
        assert_eq!(memo.get_or_compute(2, || "c".to_string()), "c");
        assert_eq!(memo.get_or_compute(1, || "d".to_string()), "d");
        assert_eq!(memo.computations(), 3);
    }

    #[test]
    fn derived_views_follow_state_changes() {
        let mut state = overview_state();
        state.metric_urn = Some(URN.to_string());
        state.set_anomalies_old(vec![anomaly(URN, 5, 15)]);
        state.set_series(
            Some(TimeSeries {
                timestamp: vec![0, 5, 10, 15],
                value: values(&[1.0, 2.0, 3.0, 4.0]),
                ..TimeSeries::default()
            }),
            None,
        );

        let mut views = DerivedViews::default();
        assert_eq!(views.series(&state).len(), 3);
        assert_eq!(views.series(&state).len(), 3);
        assert_eq!(views.series.computations(), 1);
        assert_eq!(views.filtered.computations(), 1);
        assert_eq!(views.filtered_count(&state), 1);

        state.metric_urn = Some("thirdeye:metric:2".to_string());
        assert_eq!(views.filtered_count(&state), 0);
        assert_eq!(views.series(&state).len(), 1);
        assert_eq!(views.series.computations(), 2);

        assert_eq!(views.stats(&state)[0].display, "1");
        state.set_anomalies_old(Vec::new());
        assert_eq!(views.stats(&state)[0].display, "0");
    }
}
