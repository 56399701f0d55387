use cody_core::DEFAULT_LABEL;

/// Session behaviour that callers may tune. The retraining threshold is
/// fixed, see [`RETRAIN_THRESHOLD`](crate::RETRAIN_THRESHOLD).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Label that never triggers model retraining.
    pub default_label: String,
    /// Ask the model engine for suggestions once a switch has settled.
    pub suggest_after_switch: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            suggest_after_switch: false,
        }
    }
}
