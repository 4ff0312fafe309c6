use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};

use crate::models::{RewardCard, Task, TaskStatus};

/// Outcome of a ticker step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// True on exactly the tick where the lock window elapsed.
    pub unlocked_now: bool,
}

/// In-memory state of one focus run over an ordered task list.
///
/// All transitions take `now: Instant` so elapsed accounting is monotonic
/// and tests can drive a synthetic clock. Local effects here are the source
/// of truth for the run; persistence is the controller's detached concern.
#[derive(Debug, Clone)]
pub struct SessionState {
    tasks: Vec<Task>,
    viewing_index: usize,
    committed_index: Option<usize>,
    /// Commit anchor per task id. Rewound by the paused balance on resume so
    /// elapsed time stays continuous across pause boundaries.
    start_times: HashMap<String, Instant>,
    /// Task id -> accumulated elapsed milliseconds at the moment of pause.
    paused: HashMap<String, u64>,
    /// Ids completed or marked made-progress this run. Grows only.
    completed: HashSet<String>,
    /// Cards collected this run, for display.
    collected_cards: Vec<RewardCard>,
    flow_started: Option<Instant>,
    flow_progress: f64,
    navigation_unlocked: bool,
    unlock_fired: bool,
    lock_window: Duration,
}

impl SessionState {
    pub fn new(tasks: Vec<Task>, lock_window: Duration) -> Self {
        Self {
            tasks,
            viewing_index: 0,
            committed_index: None,
            start_times: HashMap::new(),
            paused: HashMap::new(),
            completed: HashSet::new(),
            collected_cards: Vec::new(),
            flow_started: None,
            flow_progress: 0.0,
            // Nothing is committed yet, so there is nothing to lock.
            navigation_unlocked: true,
            unlock_fired: false,
            lock_window,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn viewing_index(&self) -> usize {
        self.viewing_index
    }

    pub fn committed_index(&self) -> Option<usize> {
        self.committed_index
    }

    pub fn committed_task(&self) -> Option<&Task> {
        self.committed_index.and_then(|i| self.tasks.get(i))
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.completed.contains(task_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn paused_ms(&self, task_id: &str) -> Option<u64> {
        self.paused.get(task_id).copied()
    }

    pub fn flow_progress(&self) -> f64 {
        self.flow_progress
    }

    pub fn navigation_unlocked(&self) -> bool {
        self.navigation_unlocked
    }

    pub fn collected_cards(&self) -> &[RewardCard] {
        &self.collected_cards
    }

    pub fn record_card(&mut self, card: RewardCard) {
        self.collected_cards.push(card);
    }

    fn index_of(&self, task_id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("unknown task id {task_id}"))
    }

    /// Milliseconds of focus accumulated for a task: live anchor when
    /// running, paused balance otherwise, zero if never started.
    pub fn elapsed_ms(&self, task_id: &str, now: Instant) -> u64 {
        if let Some(start) = self.start_times.get(task_id) {
            now.saturating_duration_since(*start).as_millis() as u64
        } else {
            self.paused.get(task_id).copied().unwrap_or(0)
        }
    }

    fn reset_flow(&mut self, now: Instant) {
        self.flow_started = Some(now);
        self.flow_progress = 0.0;
        self.navigation_unlocked = false;
        self.unlock_fired = false;
    }

    fn release_commitment(&mut self) {
        self.committed_index = None;
        self.flow_started = None;
        self.flow_progress = 0.0;
        self.navigation_unlocked = true;
    }

    /// Begin (or resume) an active focus commitment on the task at `index`.
    ///
    /// Rejected while another task is committed: there is never more than
    /// one committed index. A task with a paused balance resumes with its
    /// anchor rewound so no time is lost; a fresh task gets an anchor only
    /// if it does not already have one.
    pub fn commit(&mut self, index: usize, now: Instant) -> Result<&Task> {
        if let Some(active) = self.committed_index {
            return Err(anyhow!(
                "task at index {active} is already committed; finish or pause it first"
            ));
        }
        let task = self
            .tasks
            .get(index)
            .ok_or_else(|| anyhow!("task index {index} out of range"))?;
        if task.status.is_terminal() {
            return Err(anyhow!("task '{}' is already finished this run", task.title));
        }

        let task_id = task.id.clone();
        if let Some(paused_ms) = self.paused.remove(&task_id) {
            // Rewind the anchor so the banked balance stays counted.
            let anchor = now
                .checked_sub(Duration::from_millis(paused_ms))
                .unwrap_or(now);
            self.start_times.insert(task_id.clone(), anchor);
        } else {
            self.start_times.entry(task_id.clone()).or_insert(now);
        }

        self.committed_index = Some(index);
        self.viewing_index = index;
        self.reset_flow(now);

        let task = &mut self.tasks[index];
        task.status = TaskStatus::Incomplete;
        Ok(&self.tasks[index])
    }

    fn committed_id_checked(&self, task_id: &str) -> Result<usize> {
        let index = self
            .committed_index
            .ok_or_else(|| anyhow!("no task is committed"))?;
        if self.tasks[index].id != task_id {
            return Err(anyhow!("task {task_id} is not the committed task"));
        }
        Ok(index)
    }

    /// Finish the committed task. Returns whole minutes spent, rounding to
    /// nearest; a missing anchor counts as zero rather than failing.
    pub fn complete(&mut self, task_id: &str, now: Instant) -> Result<u64> {
        let index = self.committed_id_checked(task_id)?;
        let minutes = self.take_minutes(task_id, now);

        self.completed.insert(task_id.to_string());
        self.release_commitment();

        let task = &mut self.tasks[index];
        task.status = TaskStatus::Complete;
        task.time_spent_minutes += minutes;
        Ok(minutes)
    }

    /// Completion variant for unfinished work: the original is done for this
    /// run; the controller asks the store for a continuation copy.
    pub fn made_progress(&mut self, task_id: &str, now: Instant) -> Result<u64> {
        let index = self.committed_id_checked(task_id)?;
        let minutes = self.take_minutes(task_id, now);

        self.completed.insert(task_id.to_string());
        self.release_commitment();

        let task = &mut self.tasks[index];
        task.status = TaskStatus::MadeProgress;
        task.time_spent_minutes += minutes;
        Ok(minutes)
    }

    /// Suspend the committed task, banking its elapsed time. Navigation
    /// unlocks immediately. Returns the banked milliseconds.
    pub fn pause(&mut self, task_id: &str, now: Instant) -> Result<u64> {
        let index = self.committed_id_checked(task_id)?;

        let elapsed_ms = match self.start_times.remove(task_id) {
            Some(start) => now.saturating_duration_since(start).as_millis() as u64,
            None => 0,
        };
        self.paused.insert(task_id.to_string(), elapsed_ms);
        self.release_commitment();

        self.tasks[index].status = TaskStatus::Paused;
        Ok(elapsed_ms)
    }

    /// Resume a paused task: recommit at its index with the anchor rewound
    /// by the banked balance. No store call happens here; status is
    /// re-asserted by the next complete or pause.
    pub fn carry_on(&mut self, task_id: &str, now: Instant) -> Result<usize> {
        if !self.paused.contains_key(task_id) {
            return Err(anyhow!("task {task_id} is not paused"));
        }
        let index = self.index_of(task_id)?;
        self.commit(index, now)?;
        Ok(index)
    }

    /// Drop a task from the run without credit. Clears any paused balance
    /// and, if it was the committed task, the commitment itself. Viewing
    /// advances to the next card when there is one.
    pub fn skip(&mut self, task_id: &str) -> Result<()> {
        let index = self.index_of(task_id)?;
        let task = &self.tasks[index];
        if task.status.is_terminal() {
            return Err(anyhow!("task '{}' is already finished this run", task.title));
        }
        self.paused.remove(task_id);
        self.start_times.remove(task_id);
        if self.committed_index == Some(index) {
            self.release_commitment();
        }
        self.tasks[index].status = TaskStatus::Skipped;
        if self.viewing_index == index && index + 1 < self.tasks.len() {
            self.viewing_index = index + 1;
        }
        Ok(())
    }

    /// Move the viewed card. Rejected while the navigation lock is held.
    pub fn navigate(&mut self, index: usize) -> Result<()> {
        if index >= self.tasks.len() {
            return Err(anyhow!("task index {index} out of range"));
        }
        if !self.navigation_unlocked {
            return Err(anyhow!("navigation is locked during the commitment window"));
        }
        self.viewing_index = index;
        Ok(())
    }

    /// One ticker step. Advances flow progress toward 100 and unlocks
    /// navigation exactly once per commitment window.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(flow_started) = self.flow_started else {
            return TickOutcome { unlocked_now: false };
        };
        if self.committed_index.is_none() {
            return TickOutcome { unlocked_now: false };
        }

        let elapsed = now.saturating_duration_since(flow_started);
        let window_ms = self.lock_window.as_millis().max(1) as f64;
        self.flow_progress = (elapsed.as_millis() as f64 / window_ms * 100.0).min(100.0);

        let mut unlocked_now = false;
        if elapsed >= self.lock_window && !self.unlock_fired {
            self.navigation_unlocked = true;
            self.unlock_fired = true;
            unlocked_now = true;
        }
        TickOutcome { unlocked_now }
    }

    fn take_minutes(&mut self, task_id: &str, now: Instant) -> u64 {
        let elapsed_ms = match self.start_times.remove(task_id) {
            Some(start) => now.saturating_duration_since(start).as_millis() as u64,
            None => self.paused.remove(task_id).unwrap_or(0),
        };
        self.paused.remove(task_id);
        (elapsed_ms + 30_000) / 60_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WINDOW: Duration = Duration::from_secs(5 * 60);

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task::new(format!("task {i}"), i as i64))
            .collect()
    }

    fn state(n: usize) -> SessionState {
        SessionState::new(tasks(n), WINDOW)
    }

    #[test]
    fn commit_then_immediate_pause_banks_zero() {
        let mut s = state(3);
        let t0 = Instant::now();
        let id = s.tasks()[0].id.clone();

        s.commit(0, t0).unwrap();
        let banked = s.pause(&id, t0).unwrap();

        assert_eq!(banked, 0);
        assert_eq!(s.committed_index(), None);
        assert!(s.navigation_unlocked());
    }

    #[test]
    fn paused_interval_is_excluded_from_minutes() {
        let mut s = state(1);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();

        s.commit(0, t0).unwrap();
        // 4 minutes of focus, then a long pause, then 3 more minutes.
        let t1 = t0 + Duration::from_secs(4 * 60);
        s.pause(&id, t1).unwrap();
        let t2 = t1 + Duration::from_secs(60 * 60);
        s.carry_on(&id, t2).unwrap();
        let t3 = t2 + Duration::from_secs(3 * 60);
        let minutes = s.complete(&id, t3).unwrap();

        assert_eq!(minutes, 7);
    }

    #[test]
    fn repeated_pause_resume_never_loses_time() {
        let mut s = state(1);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();

        let mut now = t0;
        let mut last_banked = 0;
        for _ in 0..5 {
            now += Duration::from_secs(90);
            let banked = s.pause(&id, now).unwrap();
            assert!(banked >= last_banked, "elapsed went backwards");
            last_banked = banked;
            now += Duration::from_secs(600); // idle gap, must not count
            s.carry_on(&id, now).unwrap();
        }
        now += Duration::from_secs(90);
        let banked = s.pause(&id, now).unwrap();
        // 6 focus stretches of 90s each.
        assert_eq!(banked, 6 * 90 * 1000);
    }

    #[test]
    fn second_commit_is_rejected_while_committed() {
        let mut s = state(3);
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();

        assert!(s.commit(1, t0).is_err());
        assert_eq!(s.committed_index(), Some(0));
    }

    #[test]
    fn terminal_task_cannot_be_recommitted() {
        let mut s = state(2);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        s.complete(&id, t0 + Duration::from_secs(60)).unwrap();

        assert!(s.commit(0, t0 + Duration::from_secs(120)).is_err());
    }

    #[test]
    fn unlock_fires_exactly_once_per_window() {
        let mut s = state(1);
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        assert!(!s.navigation_unlocked());

        let first = s.tick(t0 + WINDOW + Duration::from_secs(1));
        let second = s.tick(t0 + WINDOW + Duration::from_secs(2));

        assert!(first.unlocked_now);
        assert!(!second.unlocked_now);
        assert!(s.navigation_unlocked());
    }

    #[test]
    fn six_minutes_past_a_five_minute_window_is_fully_unlocked() {
        let mut s = state(3);
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();

        s.tick(t0 + Duration::from_secs(6 * 60));

        assert!(s.navigation_unlocked());
        assert_eq!(s.flow_progress(), 100.0);
    }

    #[test]
    fn progress_is_partial_before_the_window_elapses() {
        let mut s = state(1);
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();

        let out = s.tick(t0 + Duration::from_secs(60));

        assert!(!out.unlocked_now);
        assert!(!s.navigation_unlocked());
        assert!((s.flow_progress() - 20.0).abs() < 0.01);
    }

    #[test]
    fn navigation_is_locked_until_the_window_elapses() {
        let mut s = state(3);
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();

        assert!(s.navigate(2).is_err());
        s.tick(t0 + WINDOW);
        s.navigate(2).unwrap();
        assert_eq!(s.viewing_index(), 2);
    }

    #[test]
    fn pause_unlocks_navigation_immediately() {
        let mut s = state(2);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        s.pause(&id, t0 + Duration::from_secs(30)).unwrap();

        s.navigate(1).unwrap();
        assert_eq!(s.viewing_index(), 1);
    }

    #[test]
    fn commit_resets_the_unlock_guard_for_the_next_window() {
        let mut s = state(2);
        let id0 = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        s.tick(t0 + WINDOW);
        s.complete(&id0, t0 + WINDOW).unwrap();

        let t1 = t0 + WINDOW + Duration::from_secs(10);
        s.commit(1, t1).unwrap();
        assert!(!s.navigation_unlocked());
        let out = s.tick(t1 + WINDOW);
        assert!(out.unlocked_now);
    }

    #[test]
    fn skip_drops_pause_ledger_and_advances_viewing() {
        let mut s = state(3);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        s.pause(&id, t0 + Duration::from_secs(30)).unwrap();

        s.skip(&id).unwrap();

        assert_eq!(s.paused_ms(&id), None);
        assert!(!s.is_completed(&id));
        assert_eq!(s.tasks()[0].status, TaskStatus::Skipped);
        assert_eq!(s.viewing_index(), 1);
    }

    #[test]
    fn skip_cannot_overwrite_a_terminal_status() {
        let mut s = state(2);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        s.complete(&id, t0 + Duration::from_secs(60)).unwrap();

        assert!(s.skip(&id).is_err());
        assert_eq!(s.tasks()[0].status, TaskStatus::Complete);
        assert!(s.is_completed(&id));
    }

    #[test]
    fn carry_on_requires_a_paused_task() {
        let mut s = state(2);
        let id = s.tasks()[1].id.clone();
        assert!(s.carry_on(&id, Instant::now()).is_err());
    }

    #[test]
    fn complete_without_anchor_defaults_to_zero_minutes() {
        let mut s = state(1);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();
        // Simulate a lost anchor rather than failing the transition.
        s.start_times.remove(&id);

        let minutes = s.complete(&id, t0 + Duration::from_secs(600)).unwrap();
        assert_eq!(minutes, 0);
        assert!(s.is_completed(&id));
    }

    #[test]
    fn minutes_round_to_nearest() {
        let mut s = state(1);
        let id = s.tasks()[0].id.clone();
        let t0 = Instant::now();
        s.commit(0, t0).unwrap();

        // 2m29s rounds down, the next second rounds up.
        let minutes = s.complete(&id, t0 + Duration::from_secs(149)).unwrap();
        assert_eq!(minutes, 2);
    }
}
