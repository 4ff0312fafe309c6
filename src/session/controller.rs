use std::{sync::Arc, time::Instant};

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    models::{RewardCard, Task},
    store::TaskStore,
};

use super::{
    config::SessionConfig,
    events::{self, EventReceiver, EventSender, SessionEvent, SessionSnapshot},
    state::SessionState,
};

/// Drives one focus run: applies local transitions synchronously under the
/// session lock, then fires detached best-effort store effects and pushes
/// events to view subscribers. Local state is never rolled back on a remote
/// failure; failures are logged and swallowed.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    store: Arc<dyn TaskStore>,
    config: SessionConfig,
    events: EventSender,
    ticker: Arc<Mutex<Option<(JoinHandle<()>, CancellationToken)>>>,
}

impl SessionController {
    pub fn new(store: Arc<dyn TaskStore>, tasks: Vec<Task>, config: SessionConfig) -> Self {
        let (events, _) = events::channel(config.event_capacity);
        let state = SessionState::new(tasks, config.lock_window);
        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            config,
            events,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot::capture(&state, Instant::now())
    }

    /// Begin (or resume) a focus commitment on the task at `index`.
    pub async fn commit(&self, index: usize) -> Result<SessionSnapshot> {
        let now = Instant::now();
        let (task_id, snapshot) = {
            let mut state = self.state.lock().await;
            let task = state.commit(index, now)?;
            let task_id = task.id.clone();
            (task_id, SessionSnapshot::capture(&state, now))
        };

        info!("committed to task {task_id}");
        self.spawn_ticker().await;

        let store = self.store.clone();
        let effect_task_id = task_id.clone();
        tokio::spawn(async move {
            if let Err(err) = store.start_task(&effect_task_id).await {
                warn!("failed to persist task start for {effect_task_id}: {err:#}");
            }
        });

        self.emit(SessionEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Finish the committed task. Returns minutes spent. The completion is
    /// final locally regardless of what the store or reward catalog does.
    pub async fn complete(&self, task_id: &str) -> Result<u64> {
        let now = Instant::now();
        let (minutes, task) = {
            let mut state = self.state.lock().await;
            let minutes = state.complete(task_id, now)?;
            let task = state
                .tasks()
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("completed task {task_id} missing from run"))?;
            self.emit(SessionEvent::StateChanged {
                snapshot: SessionSnapshot::capture(&state, now),
            });
            (minutes, task)
        };
        self.cancel_ticker().await;
        info!("completed task {task_id} after {minutes} min");

        self.spawn_completion_effects(task, minutes, false);
        Ok(minutes)
    }

    /// Completion variant that also asks the store for a continuation copy
    /// of the task so unfinished work can be picked up later.
    pub async fn made_progress(&self, task_id: &str) -> Result<u64> {
        let now = Instant::now();
        let (minutes, task) = {
            let mut state = self.state.lock().await;
            let minutes = state.made_progress(task_id, now)?;
            let task = state
                .tasks()
                .iter()
                .find(|t| t.id == task_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("task {task_id} missing from run"))?;
            self.emit(SessionEvent::StateChanged {
                snapshot: SessionSnapshot::capture(&state, now),
            });
            (minutes, task)
        };
        self.cancel_ticker().await;
        info!("made progress on task {task_id} after {minutes} min");

        self.spawn_completion_effects(task, minutes, true);
        Ok(minutes)
    }

    /// Suspend the committed task, banking its elapsed time.
    pub async fn pause(&self, task_id: &str) -> Result<()> {
        let now = Instant::now();
        let elapsed_ms = {
            let mut state = self.state.lock().await;
            let elapsed_ms = state.pause(task_id, now)?;
            self.emit(SessionEvent::StateChanged {
                snapshot: SessionSnapshot::capture(&state, now),
            });
            elapsed_ms
        };
        self.cancel_ticker().await;

        let minutes = (elapsed_ms + 30_000) / 60_000;
        let store = self.store.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = store.pause_task(&task_id, minutes).await {
                warn!("failed to persist pause for {task_id}: {err:#}");
            }
        });
        Ok(())
    }

    /// Resume a paused task. No store call is made here; the status is
    /// re-asserted by the next complete or pause.
    pub async fn carry_on(&self, task_id: &str) -> Result<SessionSnapshot> {
        let now = Instant::now();
        let snapshot = {
            let mut state = self.state.lock().await;
            state.carry_on(task_id, now)?;
            SessionSnapshot::capture(&state, now)
        };
        self.spawn_ticker().await;
        self.emit(SessionEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Drop a task from the run without credit.
    pub async fn skip(&self, task_id: &str) -> Result<()> {
        let had_commitment = {
            let mut state = self.state.lock().await;
            let had_commitment = state
                .committed_task()
                .map(|t| t.id == task_id)
                .unwrap_or(false);
            state.skip(task_id)?;
            self.emit(SessionEvent::StateChanged {
                snapshot: SessionSnapshot::capture(&state, Instant::now()),
            });
            had_commitment
        };
        if had_commitment {
            self.cancel_ticker().await;
        }

        let store = self.store.clone();
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = store.skip_task(&task_id).await {
                warn!("failed to persist skip for {task_id}: {err:#}");
            }
        });
        Ok(())
    }

    /// Move the viewed card; rejected while the navigation lock is held.
    pub async fn navigate(&self, index: usize) -> Result<SessionSnapshot> {
        let mut state = self.state.lock().await;
        state.navigate(index)?;
        let snapshot = SessionSnapshot::capture(&state, Instant::now());
        self.emit(SessionEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// All the detached bookkeeping that follows a completion: store status
    /// write, reward unlock, continuation duplicate, daily stats. Each step
    /// is independent best-effort; a failure never reaches the caller.
    fn spawn_completion_effects(&self, task: Task, minutes: u64, continuation: bool) {
        let store = self.store.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let user_id = self.config.user_id.clone();

        tokio::spawn(async move {
            let write = if continuation {
                store.mark_made_progress(&task.id, minutes).await
            } else {
                store.complete_task(&task.id, minutes).await
            };
            if let Err(err) = write {
                warn!("failed to persist completion for {}: {err:#}", task.id);
            }

            if continuation {
                match store.duplicate_task_for_continuation(&task).await {
                    Ok(copy) => info!("created continuation task {} for {}", copy.id, task.id),
                    Err(err) => {
                        warn!("failed to create continuation for {}: {err:#}", task.id)
                    }
                }
            }

            let card = match store.unlock_next_reward(&user_id, Some(&task.id)).await {
                Ok(Some(card)) => {
                    let _ = events.send(SessionEvent::RewardUnlocked { card: card.clone() });
                    Some(card)
                }
                Ok(None) => None,
                Err(err) => {
                    warn!("reward unlock failed for {}: {err:#}", task.id);
                    None
                }
            };
            let catalog_cards = u64::from(card.is_some());

            // The run's display ledger always gets a card; the catalog one
            // when available, a deterministic local fallback otherwise.
            let shown = card.clone().unwrap_or_else(|| RewardCard::fallback_for(&task));
            {
                let mut state = state.lock().await;
                state.record_card(shown.clone());
            }

            let _ = events.send(SessionEvent::TaskCompleted {
                task_id: task.id.clone(),
                time_spent_minutes: minutes,
                card: Some(shown),
            });

            if let Err(err) = store
                .record_daily_stats(&user_id, Utc::now().date_naive(), 1, minutes, catalog_cards)
                .await
            {
                warn!("failed to record daily stats for {user_id}: {err:#}");
            }
        });
    }

    async fn spawn_ticker(&self) {
        let mut guard = self.ticker.lock().await;
        if let Some((handle, token)) = guard.take() {
            token.cancel();
            handle.abort();
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let tick_interval = self.config.tick_interval;
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            // The immediate first tick would report zero progress; skip it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let now = Instant::now();
                let (snapshot, unlocked_task) = {
                    let mut state = state.lock().await;
                    if state.committed_index().is_none() {
                        break;
                    }
                    let outcome = state.tick(now);
                    let unlocked_task = if outcome.unlocked_now {
                        state.committed_task().map(|t| t.id.clone())
                    } else {
                        None
                    };
                    (SessionSnapshot::capture(&state, now), unlocked_task)
                };

                let _ = events.send(SessionEvent::Heartbeat { snapshot });
                if let Some(task_id) = unlocked_task {
                    info!("navigation unlocked for task {task_id}");
                    let _ = events.send(SessionEvent::NavigationUnlocked { task_id });
                }
            }
        });

        *guard = Some((handle, token));
    }

    async fn cancel_ticker(&self) {
        if let Some((handle, token)) = self.ticker.lock().await.take() {
            token.cancel();
            handle.abort();
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Send fails only when no view is subscribed; that is fine.
        let _ = self.events.send(event);
    }
}
