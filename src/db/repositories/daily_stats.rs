use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use crate::{
    db::{
        helpers::{parse_date, to_i64, to_u64},
        Database,
    },
    models::DailyStats,
};

impl Database {
    /// Accumulate rollup deltas for one user-day. Upsert so effects landing
    /// out of order still sum correctly.
    pub async fn accumulate_daily_stats(
        &self,
        user_id: &str,
        date: NaiveDate,
        tasks_completed_delta: u64,
        minutes_delta: u64,
        cards_collected_delta: u64,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let date = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO daily_stats (user_id, date, tasks_completed, minutes_focused, cards_collected)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, date) DO UPDATE SET
                     tasks_completed = tasks_completed + excluded.tasks_completed,
                     minutes_focused = minutes_focused + excluded.minutes_focused,
                     cards_collected = cards_collected + excluded.cards_collected",
                params![
                    user_id,
                    date,
                    to_i64(tasks_completed_delta)?,
                    to_i64(minutes_delta)?,
                    to_i64(cards_collected_delta)?,
                ],
            )
            .with_context(|| "failed to accumulate daily stats")?;
            Ok(())
        })
        .await
    }

    pub async fn get_daily_stats(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyStats>> {
        let user_id = user_id.to_string();
        let date_str = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, date, tasks_completed, minutes_focused, cards_collected
                 FROM daily_stats WHERE user_id = ?1 AND date = ?2",
            )?;
            stmt.query_row(params![user_id, date_str], |row| {
                let date: String = row.get("date")?;
                let tasks: i64 = row.get("tasks_completed")?;
                let minutes: i64 = row.get("minutes_focused")?;
                let cards: i64 = row.get("cards_collected")?;
                let user_id: String = row.get("user_id")?;
                Ok((user_id, date, tasks, minutes, cards))
            })
            .optional()?
            .map(|(user_id, date, tasks, minutes, cards)| {
                Ok(DailyStats {
                    user_id,
                    date: parse_date(&date)?,
                    tasks_completed: to_u64(tasks, "tasks_completed")?,
                    minutes_focused: to_u64(minutes, "minutes_focused")?,
                    cards_collected: to_u64(cards, "cards_collected")?,
                })
            })
            .transpose()
        })
        .await
    }
}
