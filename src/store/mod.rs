//! Persistence and reward collaborator consumed by the session controller.
//!
//! Every call here is issued best-effort after a local transition has
//! already been applied; implementations must not assume ordering between
//! calls triggered by different transitions.

mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{RewardCard, Task};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Mark a task started: status `Incomplete`, `started_at` stamped.
    async fn start_task(&self, task_id: &str) -> Result<()>;

    /// Mark a task complete, accumulating the minutes spent.
    async fn complete_task(&self, task_id: &str, time_spent_minutes: u64) -> Result<()>;

    /// Made-progress variant of completion for the original task.
    async fn mark_made_progress(&self, task_id: &str, time_spent_minutes: u64) -> Result<()>;

    /// Mark a task paused, recording the minutes spent so far.
    async fn pause_task(&self, task_id: &str, time_spent_minutes: u64) -> Result<()>;

    async fn skip_task(&self, task_id: &str) -> Result<()>;

    /// Create a fresh `NotStarted` copy of `original` so unfinished work can
    /// continue later. Used only by made-progress.
    async fn duplicate_task_for_continuation(&self, original: &Task) -> Result<Task>;

    /// Hand the user their next uncollected catalog card, recording the
    /// collection. `Ok(None)` when the catalog is exhausted; that is a valid
    /// outcome, not an error.
    async fn unlock_next_reward(
        &self,
        user_id: &str,
        source_task_id: Option<&str>,
    ) -> Result<Option<RewardCard>>;

    /// Accumulate per-day rollup deltas.
    async fn record_daily_stats(
        &self,
        user_id: &str,
        date: NaiveDate,
        tasks_completed_delta: u64,
        minutes_delta: u64,
        cards_collected_delta: u64,
    ) -> Result<()>;
}
