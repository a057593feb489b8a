use serde::{Deserialize, Serialize};

/// Singleton user configuration. Loaded at the start of each request — never
/// held as ambient process-global mutable state (see spec §9 design notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub weight_deadline_pressure: f64,
    pub weight_behind_pace: f64,
    pub weight_spacing: f64,
    pub weight_variation: f64,
    /// Remaining-work safety margin, e.g. 0.15 = +15%.
    pub buffer_pct: f64,
    /// Minimum assumed daily pace. An explicit `0.0` is meaningfully
    /// different from "unset": it permits zero-activity projects to be
    /// classified critical (see spec §9, §4.4 rule 3).
    pub baseline_daily_min: f64,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            weight_deadline_pressure: 0.35,
            weight_behind_pace: 0.35,
            weight_spacing: 0.2,
            weight_variation: 0.1,
            buffer_pct: 0.15,
            baseline_daily_min: 30.0,
        }
    }
}
