use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::{
    db::Database,
    models::{RewardCard, Task, TaskStatus},
};

use super::TaskStore;

#[async_trait]
impl TaskStore for Database {
    async fn start_task(&self, task_id: &str) -> Result<()> {
        self.mark_task_started(task_id, Utc::now()).await
    }

    async fn complete_task(&self, task_id: &str, time_spent_minutes: u64) -> Result<()> {
        self.mark_task_completed(task_id, TaskStatus::Complete, Utc::now(), time_spent_minutes)
            .await
    }

    async fn mark_made_progress(&self, task_id: &str, time_spent_minutes: u64) -> Result<()> {
        self.mark_task_completed(
            task_id,
            TaskStatus::MadeProgress,
            Utc::now(),
            time_spent_minutes,
        )
        .await
    }

    async fn pause_task(&self, task_id: &str, time_spent_minutes: u64) -> Result<()> {
        self.mark_task_paused(task_id, time_spent_minutes).await
    }

    async fn skip_task(&self, task_id: &str) -> Result<()> {
        self.mark_task_skipped(task_id).await
    }

    async fn duplicate_task_for_continuation(&self, original: &Task) -> Result<Task> {
        self.create_continuation(original).await
    }

    async fn unlock_next_reward(
        &self,
        user_id: &str,
        source_task_id: Option<&str>,
    ) -> Result<Option<RewardCard>> {
        let Some(card) = self.next_uncollected_card(user_id).await? else {
            return Ok(None);
        };
        self.record_collection(user_id, &card.id, source_task_id)
            .await?;
        Ok(Some(card))
    }

    async fn record_daily_stats(
        &self,
        user_id: &str,
        date: NaiveDate,
        tasks_completed_delta: u64,
        minutes_delta: u64,
        cards_collected_delta: u64,
    ) -> Result<()> {
        self.accumulate_daily_stats(
            user_id,
            date,
            tasks_completed_delta,
            minutes_delta,
            cards_collected_delta,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use crate::models::CardRarity;

    use super::*;

    fn open_db(dir: &TempDir) -> Database {
        Database::new(dir.path().join("taskdeck.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn task_lifecycle_round_trips_through_sqlite() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let mut task = Task::new("write report", 0);
        task.is_urgent = true;
        task.estimated_duration = Some("30m".into());
        db.insert_task(&task).await.unwrap();

        db.start_task(&task.id).await.unwrap();
        let stored = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Incomplete);
        assert!(stored.started_at.is_some());

        db.pause_task(&task.id, 12).await.unwrap();
        let stored = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Paused);
        assert_eq!(stored.time_spent_minutes, 12);

        // Completion reports the session-cumulative figure, which replaces
        // the paused checkpoint rather than stacking on top of it.
        db.complete_task(&task.id, 20).await.unwrap();
        let stored = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Complete);
        assert_eq!(stored.time_spent_minutes, 20);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn pause_then_complete_stores_only_the_focused_minutes() {
        use std::time::{Duration, Instant};

        use crate::session::SessionState;

        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let task = Task::new("interrupted twice", 0);
        db.insert_task(&task).await.unwrap();

        // Drive the state machine the way the controller does: 4 minutes of
        // focus, a pause, then 3 more minutes to completion.
        let mut state = SessionState::new(vec![task.clone()], Duration::from_secs(300));
        let t0 = Instant::now();
        state.commit(0, t0).unwrap();
        let t1 = t0 + Duration::from_secs(4 * 60);
        let banked_ms = state.pause(&task.id, t1).unwrap();
        db.pause_task(&task.id, (banked_ms + 30_000) / 60_000)
            .await
            .unwrap();

        let t2 = t1 + Duration::from_secs(30 * 60);
        state.carry_on(&task.id, t2).unwrap();
        let t3 = t2 + Duration::from_secs(3 * 60);
        let minutes = state.complete(&task.id, t3).unwrap();
        db.complete_task(&task.id, minutes).await.unwrap();

        assert_eq!(minutes, 7);
        let stored = db.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.time_spent_minutes, 7);
    }

    #[tokio::test]
    async fn reopening_the_database_skips_applied_migrations() {
        let dir = TempDir::new().unwrap();
        {
            let db = open_db(&dir);
            db.insert_task(&Task::new("survives reopen", 0)).await.unwrap();
        }
        let db = Database::new(dir.path().join("taskdeck.sqlite3")).unwrap();
        let tasks = db.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "survives reopen");
    }

    #[tokio::test]
    async fn continuation_copies_tags_with_a_fresh_lifecycle() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let mut task = Task::new("refactor parser", 0);
        task.is_liked = true;
        task.is_quick = true;
        task.notes = Some("start with the lexer".into());
        db.insert_task(&task).await.unwrap();
        db.mark_made_progress(&task.id, 25).await.unwrap();

        let copy = db.duplicate_task_for_continuation(&task).await.unwrap();

        assert_ne!(copy.id, task.id);
        assert_eq!(copy.title, task.title);
        assert!(copy.is_liked && copy.is_quick);
        assert_eq!(copy.notes, task.notes);
        assert_eq!(copy.status, TaskStatus::NotStarted);
        assert_eq!(copy.time_spent_minutes, 0);

        let stored = db.get_task(&copy.id).await.unwrap().unwrap();
        assert!(stored.position > task.position);
    }

    #[tokio::test]
    async fn rewards_unlock_in_catalog_order_until_exhausted() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let catalog = db.list_reward_catalog().await.unwrap();
        assert!(!catalog.is_empty());
        assert_eq!(catalog[0].rarity, CardRarity::Common);

        let mut unlocked = Vec::new();
        while let Some(card) = db.unlock_next_reward("ada", None).await.unwrap() {
            unlocked.push(card);
        }

        assert_eq!(unlocked.len(), catalog.len());
        let orders: Vec<i64> = unlocked.iter().map(|c| c.sort_order).collect();
        let mut sorted = orders.clone();
        sorted.sort();
        assert_eq!(orders, sorted);

        // Exhausted catalog keeps returning None without erroring.
        assert!(db.unlock_next_reward("ada", None).await.unwrap().is_none());

        // A different user starts from the top again.
        let first = db.unlock_next_reward("grace", None).await.unwrap().unwrap();
        assert_eq!(first.id, catalog[0].id);
    }

    #[tokio::test]
    async fn daily_stats_accumulate_across_writes() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        db.record_daily_stats("ada", date, 1, 25, 1).await.unwrap();
        db.record_daily_stats("ada", date, 1, 10, 0).await.unwrap();

        let stats = db.get_daily_stats("ada", date).await.unwrap().unwrap();
        assert_eq!(stats.tasks_completed, 2);
        assert_eq!(stats.minutes_focused, 35);
        assert_eq!(stats.cards_collected, 1);

        assert!(db.get_daily_stats("ada", date.succ_opt().unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn editing_and_reordering_tasks_round_trips() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let a = Task::new("a", 0);
        let b = Task::new("b", 1);
        db.insert_task(&a).await.unwrap();
        db.insert_task(&b).await.unwrap();

        db.update_task_details(
            &a.id,
            "a, but urgent".into(),
            false,
            true,
            false,
            Some("10m".into()),
            None,
        )
        .await
        .unwrap();
        db.update_task_order(vec![b.id.clone(), a.id.clone()])
            .await
            .unwrap();

        let tasks = db.list_tasks().await.unwrap();
        assert_eq!(tasks[0].id, b.id);
        assert_eq!(tasks[1].title, "a, but urgent");
        assert!(tasks[1].is_urgent);
        assert_eq!(tasks[1].estimated_duration.as_deref(), Some("10m"));
    }

    #[tokio::test]
    async fn collections_record_their_source_task() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);

        let task = Task::new("earn a card", 0);
        db.insert_task(&task).await.unwrap();
        let card = db
            .unlock_next_reward("ada", Some(&task.id))
            .await
            .unwrap()
            .unwrap();

        let collected = db.list_collected("ada").await.unwrap();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].card_id, card.id);
        assert_eq!(collected[0].source_task_id.as_deref(), Some(task.id.as_str()));
    }

    #[tokio::test]
    async fn updating_a_missing_task_reports_an_error() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir);
        assert!(db.complete_task("no-such-id", 5).await.is_err());
    }
}
