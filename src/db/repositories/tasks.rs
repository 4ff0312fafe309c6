use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        helpers::{
            parse_datetime, parse_optional_datetime, parse_task_status, to_i64, to_u64,
        },
        Database,
    },
    models::{Task, TaskStatus},
};

fn row_to_task(row: &Row) -> Result<Task> {
    let status: String = row.get("status")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let time_spent: i64 = row.get("time_spent_minutes")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        is_liked: row.get("is_liked")?,
        is_urgent: row.get("is_urgent")?,
        is_quick: row.get("is_quick")?,
        estimated_duration: row.get("estimated_duration")?,
        notes: row.get("notes")?,
        status: parse_task_status(&status)?,
        position: row.get("position")?,
        time_spent_minutes: to_u64(time_spent, "time_spent_minutes")?,
        started_at: parse_optional_datetime(started_at, "started_at")?,
        completed_at: parse_optional_datetime(completed_at, "completed_at")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

const TASK_COLUMNS: &str = "id, title, is_liked, is_urgent, is_quick, estimated_duration, notes, \
                            status, position, time_spent_minutes, started_at, completed_at, \
                            created_at, updated_at";

impl Database {
    pub async fn insert_task(&self, task: &Task) -> Result<()> {
        let record = task.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, is_liked, is_urgent, is_quick, estimated_duration,
                                    notes, status, position, time_spent_minutes, started_at,
                                    completed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.id,
                    record.title,
                    record.is_liked,
                    record.is_urgent,
                    record.is_quick,
                    record.estimated_duration,
                    record.notes,
                    record.status.as_str(),
                    record.position,
                    to_i64(record.time_spent_minutes)?,
                    record.started_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.completed_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert task")?;
            Ok(())
        })
        .await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
            stmt.query_row(params![task_id], |row| {
                Ok(row_to_task(row))
            })
            .optional()?
            .transpose()
        })
        .await
    }

    /// All tasks in priority order.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks ORDER BY position ASC, created_at ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut tasks = Vec::new();
            while let Some(row) = rows.next()? {
                tasks.push(row_to_task(row)?);
            }
            Ok(tasks)
        })
        .await
    }

    /// Status -> `Incomplete` with a start timestamp; called on commit.
    pub async fn mark_task_started(&self, task_id: &str, started_at: DateTime<Utc>) -> Result<()> {
        self.set_task_status(task_id, TaskStatus::Incomplete, Some(started_at), None, None)
            .await
    }

    pub async fn mark_task_completed(
        &self,
        task_id: &str,
        status: TaskStatus,
        completed_at: DateTime<Utc>,
        time_spent_minutes: u64,
    ) -> Result<()> {
        self.set_task_status(
            task_id,
            status,
            None,
            Some(completed_at),
            Some(time_spent_minutes),
        )
        .await
    }

    pub async fn mark_task_paused(&self, task_id: &str, time_spent_minutes: u64) -> Result<()> {
        self.set_task_status(task_id, TaskStatus::Paused, None, None, Some(time_spent_minutes))
            .await
    }

    pub async fn mark_task_skipped(&self, task_id: &str) -> Result<()> {
        self.set_task_status(task_id, TaskStatus::Skipped, None, None, None)
            .await
    }

    /// The caller sends session-cumulative minutes (the state machine's pause
    /// ledger already spans pause/resume cycles), so the column is SET, not
    /// summed; `None` leaves it untouched.
    async fn set_task_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        time_spent_minutes: Option<u64>,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        let updated_at = Utc::now();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET status = ?1,
                     started_at = COALESCE(?2, started_at),
                     completed_at = COALESCE(?3, completed_at),
                     time_spent_minutes = COALESCE(?4, time_spent_minutes),
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    status.as_str(),
                    started_at.map(|dt| dt.to_rfc3339()),
                    completed_at.map(|dt| dt.to_rfc3339()),
                    time_spent_minutes.map(to_i64).transpose()?,
                    updated_at.to_rfc3339(),
                    task_id,
                ],
            )
            .with_context(|| "failed to update task status")?;
            if changed == 0 {
                return Err(anyhow!("task {task_id} not found"));
            }
            Ok(())
        })
        .await
    }

    /// Fresh copy of a task for continuing after made-progress, appended to
    /// the end of the priority order.
    pub async fn create_continuation(&self, original: &Task) -> Result<Task> {
        let next_position = self
            .execute(|conn| {
                let max: Option<i64> =
                    conn.query_row("SELECT MAX(position) FROM tasks", [], |row| row.get(0))?;
                Ok(max.unwrap_or(0) + 1)
            })
            .await?;

        let copy = original.continuation(next_position);
        self.insert_task(&copy).await?;
        Ok(copy)
    }

    /// Tasks left `Incomplete` by a run that never finished (crash, closed
    /// tab) go back to `NotStarted` so the next run can pick them up.
    /// Returns how many were reset.
    pub async fn reset_interrupted_tasks(&self) -> Result<usize> {
        let updated_at = Utc::now();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET status = 'NotStarted', updated_at = ?1
                 WHERE status = 'Incomplete'",
                params![updated_at.to_rfc3339()],
            )?;
            Ok(changed)
        })
        .await
    }

    pub async fn update_task_order(&self, ordered_ids: Vec<String>) -> Result<()> {
        let updated_at = Utc::now();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            for (position, id) in ordered_ids.iter().enumerate() {
                tx.execute(
                    "UPDATE tasks SET position = ?1, updated_at = ?2 WHERE id = ?3",
                    params![position as i64, updated_at.to_rfc3339(), id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn update_task_details(
        &self,
        task_id: &str,
        title: String,
        is_liked: bool,
        is_urgent: bool,
        is_quick: bool,
        estimated_duration: Option<String>,
        notes: Option<String>,
    ) -> Result<()> {
        let task_id = task_id.to_string();
        let updated_at = Utc::now();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET title = ?1, is_liked = ?2, is_urgent = ?3, is_quick = ?4,
                     estimated_duration = ?5, notes = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    title,
                    is_liked,
                    is_urgent,
                    is_quick,
                    estimated_duration,
                    notes,
                    updated_at.to_rfc3339(),
                    task_id,
                ],
            )?;
            if changed == 0 {
                return Err(anyhow!("task {task_id} not found"));
            }
            Ok(())
        })
        .await
    }
}
