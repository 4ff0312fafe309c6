//! Row conversion helpers shared by the repositories.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{CardRarity, TaskStatus};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} is negative ({value})"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid {field} '{value}': {err}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_datetime(&s, field)).transpose()
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| anyhow!("invalid date '{value}': {err}"))
}

pub fn parse_task_status(value: &str) -> Result<TaskStatus> {
    match value {
        "NotStarted" => Ok(TaskStatus::NotStarted),
        "Incomplete" => Ok(TaskStatus::Incomplete),
        "Paused" => Ok(TaskStatus::Paused),
        "MadeProgress" => Ok(TaskStatus::MadeProgress),
        "Complete" => Ok(TaskStatus::Complete),
        "Skipped" => Ok(TaskStatus::Skipped),
        _ => Err(anyhow!("unknown task status '{value}'")),
    }
}

pub fn parse_rarity(value: &str) -> Result<CardRarity> {
    match value {
        "Common" => Ok(CardRarity::Common),
        "Rare" => Ok(CardRarity::Rare),
        "Epic" => Ok(CardRarity::Epic),
        "Legendary" => Ok(CardRarity::Legendary),
        _ => Err(anyhow!("unknown card rarity '{value}'")),
    }
}
