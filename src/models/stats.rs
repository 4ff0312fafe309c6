use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-user, per-day rollup. Written as accumulating deltas after each
/// completion, so it tolerates out-of-order effect landing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub user_id: String,
    pub date: NaiveDate,
    pub tasks_completed: u64,
    pub minutes_focused: u64,
    pub cards_collected: u64,
}
