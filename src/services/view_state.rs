use serde::{Deserialize, Serialize};

/// Which anomaly slot a fetch result lands in. Always derived from the current
/// inputs; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    /// Overview (not previewing): results fill the old slot.
    Baseline,
    /// Preview with old loaded, and edit mode or no new set yet: results replace the new slot.
    Replace,
    /// Create preview with both slots loaded: new is promoted to old, then replaced.
    Shuffle,
    /// Edit preview with nothing loaded: reference config fills old, then the live config runs.
    Bootstrap,
    /// Last fetch failed: slots are left untouched.
    Errored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStateInputs {
    pub is_preview_mode: bool,
    pub is_edit_mode: bool,
    pub has_old_anomalies: bool,
    pub has_new_anomalies: bool,
    pub fetch_errored: bool,
}

impl ViewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::Baseline => "baseline",
            ViewState::Replace => "replace",
            ViewState::Shuffle => "shuffle",
            ViewState::Bootstrap => "bootstrap",
            ViewState::Errored => "errored",
        }
    }
}

pub fn resolve_view_state(inputs: ViewStateInputs) -> ViewState {
    if inputs.fetch_errored {
        return ViewState::Errored;
    }
    if !inputs.is_preview_mode {
        return ViewState::Baseline;
    }
    if inputs.has_old_anomalies {
        if inputs.is_edit_mode || !inputs.has_new_anomalies {
            ViewState::Replace
        } else {
            ViewState::Shuffle
        }
    } else if inputs.is_edit_mode {
        ViewState::Bootstrap
    } else {
        // Create preview with nothing loaded yet fills the old slot first.
        ViewState::Baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(preview: bool, edit: bool, old: bool, new: bool, errored: bool) -> ViewStateInputs {
        ViewStateInputs {
            is_preview_mode: preview,
            is_edit_mode: edit,
            has_old_anomalies: old,
            has_new_anomalies: new,
            fetch_errored: errored,
        }
    }

    #[test]
    fn errored_takes_precedence_over_every_combination() {
        for bits in 0u8..16 {
            let state = resolve_view_state(inputs(
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
                true,
            ));
            assert_eq!(state, ViewState::Errored, "bits={bits:04b}");
        }
    }

    #[test]
    fn overview_always_fills_old_slot() {
        for bits in 0u8..8 {
            let state = resolve_view_state(inputs(
                false,
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                false,
            ));
            assert_eq!(state, ViewState::Baseline);
        }
    }

    #[test]
    fn preview_transitions_follow_slot_occupancy() {
        assert_eq!(
            resolve_view_state(inputs(true, false, false, false, false)),
            ViewState::Baseline
        );
        assert_eq!(
            resolve_view_state(inputs(true, false, true, false, false)),
            ViewState::Replace
        );
        assert_eq!(
            resolve_view_state(inputs(true, false, true, true, false)),
            ViewState::Shuffle
        );
        assert_eq!(
            resolve_view_state(inputs(true, true, true, true, false)),
            ViewState::Replace
        );
        assert_eq!(
            resolve_view_state(inputs(true, true, false, false, false)),
            ViewState::Bootstrap
        );
        assert_eq!(
            resolve_view_state(inputs(true, true, false, true, false)),
            ViewState::Bootstrap
        );
    }
}
