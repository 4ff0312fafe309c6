use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        helpers::{parse_datetime, parse_rarity},
        Database,
    },
    models::{CollectedCard, RewardCard},
};

fn row_to_card(row: &Row) -> Result<RewardCard> {
    let rarity: String = row.get("rarity")?;
    Ok(RewardCard {
        id: row.get("id")?,
        name: row.get("name")?,
        rarity: parse_rarity(&rarity)?,
        flavor_text: row.get("flavor_text")?,
        sort_order: row.get("sort_order")?,
    })
}

impl Database {
    pub async fn list_reward_catalog(&self) -> Result<Vec<RewardCard>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, rarity, flavor_text, sort_order
                 FROM reward_cards ORDER BY sort_order ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut cards = Vec::new();
            while let Some(row) = rows.next()? {
                cards.push(row_to_card(row)?);
            }
            Ok(cards)
        })
        .await
    }

    /// The next catalog card this user has not collected yet, in sort
    /// order. `None` once the catalog is exhausted.
    pub async fn next_uncollected_card(&self, user_id: &str) -> Result<Option<RewardCard>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.rarity, c.flavor_text, c.sort_order
                 FROM reward_cards c
                 WHERE c.id NOT IN (
                     SELECT card_id FROM collected_cards WHERE user_id = ?1
                 )
                 ORDER BY c.sort_order ASC
                 LIMIT 1",
            )?;
            stmt.query_row(params![user_id], |row| Ok(row_to_card(row)))
                .optional()?
                .transpose()
        })
        .await
    }

    pub async fn record_collection(
        &self,
        user_id: &str,
        card_id: &str,
        source_task_id: Option<&str>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let card_id = card_id.to_string();
        let source_task_id = source_task_id.map(str::to_string);
        let unlocked_at = Utc::now();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO collected_cards (user_id, card_id, unlocked_at, source_task_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user_id,
                    card_id,
                    unlocked_at.to_rfc3339(),
                    source_task_id,
                ],
            )
            .with_context(|| "failed to record collected card")?;
            Ok(())
        })
        .await
    }

    pub async fn list_collected(&self, user_id: &str) -> Result<Vec<CollectedCard>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, card_id, unlocked_at, source_task_id
                 FROM collected_cards
                 WHERE user_id = ?1
                 ORDER BY unlocked_at ASC",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                let unlocked_at: String = row.get("unlocked_at")?;
                collected.push(CollectedCard {
                    user_id: row.get("user_id")?,
                    card_id: row.get("card_id")?,
                    unlocked_at: parse_datetime(&unlocked_at, "unlocked_at")?,
                    source_task_id: row.get("source_task_id")?,
                });
            }
            Ok(collected)
        })
        .await
    }
}
