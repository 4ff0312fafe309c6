pub mod reward;
pub mod stats;
pub mod task;

pub use reward::{CardRarity, CollectedCard, RewardCard};
pub use stats::DailyStats;
pub use task::{Task, TaskStatus};
