mod daily_stats;
mod rewards;
mod tasks;
