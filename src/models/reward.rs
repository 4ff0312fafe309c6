use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CardRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl CardRarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardRarity::Common => "Common",
            CardRarity::Rare => "Rare",
            CardRarity::Epic => "Epic",
            CardRarity::Legendary => "Legendary",
        }
    }
}

/// A collectible unlocked on task completion, sourced from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RewardCard {
    pub id: String,
    pub name: String,
    pub rarity: CardRarity,
    pub flavor_text: Option<String>,
    pub sort_order: i64,
}

impl RewardCard {
    /// Local stand-in shown when the reward service has nothing to give
    /// (exhausted catalog or a failed call). Deterministic per task so the
    /// same completion always renders the same card.
    pub fn fallback_for(task: &Task) -> Self {
        const NAMES: [&str; 4] = ["Spark", "Ember", "Beacon", "Horizon"];
        let seed: u64 = task.id.bytes().map(u64::from).sum();
        let name = NAMES[(seed % NAMES.len() as u64) as usize];
        Self {
            id: format!("fallback-{}", task.id),
            name: name.to_string(),
            rarity: CardRarity::Common,
            flavor_text: Some(format!("Earned finishing \"{}\"", task.title)),
            sort_order: -1,
        }
    }
}

/// A catalog card a given user has unlocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedCard {
    pub user_id: String,
    pub card_id: String,
    pub unlocked_at: DateTime<Utc>,
    pub source_task_id: Option<String>,
}
