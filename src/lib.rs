//! Session engine and storage core for a gamified focus-run task manager.
//! The UI lists and tags tasks, then works through them one card at a time;
//! this crate owns the focus-run state machine (commit, complete,
//! made-progress, pause, carry-on, skip, navigation lock) and the SQLite
//! persistence and reward collaborator behind it.

pub mod db;
pub mod models;
pub mod session;
pub mod store;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use log::warn;

pub use db::Database;
pub use models::{CardRarity, CollectedCard, DailyStats, RewardCard, Task, TaskStatus};
pub use session::{SessionConfig, SessionController, SessionEvent, SessionSnapshot};
pub use store::TaskStore;

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

/// Open the database at `db_path` and start a focus run over every
/// non-terminal task, in priority order. Tasks a crashed run left
/// `Incomplete` are reset first.
pub async fn start_run(db_path: PathBuf, config: SessionConfig) -> Result<SessionController> {
    let database = Database::new(db_path)?;

    let reset = database.reset_interrupted_tasks().await?;
    if reset > 0 {
        warn!("reset {reset} task(s) left running by a previous session");
    }

    let tasks: Vec<Task> = database
        .list_tasks()
        .await?
        .into_iter()
        .filter(|t| !t.status.is_terminal())
        .collect();

    Ok(SessionController::new(Arc::new(database), tasks, config))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn start_run_resets_interrupted_tasks_and_skips_finished_ones() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("taskdeck.sqlite3");

        {
            let db = Database::new(db_path.clone()).unwrap();
            let fresh = Task::new("fresh", 0);
            let crashed = Task::new("crashed mid-run", 1);
            let done = Task::new("already done", 2);
            db.insert_task(&fresh).await.unwrap();
            db.insert_task(&crashed).await.unwrap();
            db.insert_task(&done).await.unwrap();
            db.start_task(&crashed.id).await.unwrap();
            db.insert_task(&Task::new("paused earlier", 3)).await.unwrap();
            db.complete_task(&done.id, 5).await.unwrap();
        }

        let controller = start_run(db_path, SessionConfig::default()).await.unwrap();
        let snapshot = controller.snapshot().await;

        assert_eq!(snapshot.tasks.len(), 3);
        assert!(snapshot.tasks.iter().all(|t| !t.status.is_terminal()));
        assert!(snapshot
            .tasks
            .iter()
            .all(|t| t.status == TaskStatus::NotStarted));
        assert_eq!(snapshot.viewing_index, 0);
        assert!(snapshot.navigation_unlocked);
    }
}
