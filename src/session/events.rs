use std::time::Instant;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{RewardCard, Task};

use super::state::SessionState;

/// Serialisable projection of [`SessionState`] pushed to view subscribers.
/// Every rendering surface (main card UI, picture-in-picture overlay) reads
/// this instead of holding a reference into the mutable model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub tasks: Vec<Task>,
    pub viewing_index: usize,
    pub committed_index: Option<usize>,
    pub committed_task_id: Option<String>,
    pub committed_elapsed_ms: u64,
    pub completed_task_ids: Vec<String>,
    pub collected_cards: Vec<RewardCard>,
    pub flow_progress: f64,
    pub navigation_unlocked: bool,
}

impl SessionSnapshot {
    pub fn capture(state: &SessionState, now: Instant) -> Self {
        let committed_task_id = state.committed_task().map(|t| t.id.clone());
        let committed_elapsed_ms = committed_task_id
            .as_deref()
            .map(|id| state.elapsed_ms(id, now))
            .unwrap_or(0);
        let mut completed_task_ids: Vec<String> = state
            .tasks()
            .iter()
            .filter(|t| state.is_completed(&t.id))
            .map(|t| t.id.clone())
            .collect();
        completed_task_ids.sort();

        Self {
            tasks: state.tasks().to_vec(),
            viewing_index: state.viewing_index(),
            committed_index: state.committed_index(),
            committed_task_id,
            committed_elapsed_ms,
            completed_task_ids,
            collected_cards: state.collected_cards().to_vec(),
            flow_progress: state.flow_progress(),
            navigation_unlocked: state.navigation_unlocked(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum SessionEvent {
    StateChanged {
        snapshot: SessionSnapshot,
    },
    Heartbeat {
        snapshot: SessionSnapshot,
    },
    NavigationUnlocked {
        task_id: String,
    },
    TaskCompleted {
        task_id: String,
        time_spent_minutes: u64,
        card: Option<RewardCard>,
    },
    RewardUnlocked {
        card: RewardCard,
    },
}

pub type EventSender = broadcast::Sender<SessionEvent>;
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use crate::models::Task;

    use super::*;

    #[test]
    fn snapshots_serialize_in_the_frontend_wire_shape() {
        let tasks = vec![Task::new("ship it", 0)];
        let state = SessionState::new(tasks, Duration::from_secs(300));
        let snapshot = SessionSnapshot::capture(&state, Instant::now());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["viewingIndex"], 0);
        assert_eq!(json["committedIndex"], serde_json::Value::Null);
        assert_eq!(json["navigationUnlocked"], true);
        assert_eq!(json["tasks"][0]["status"], "notStarted");
    }

    #[test]
    fn events_are_tagged_for_dispatch() {
        let event = SessionEvent::NavigationUnlocked {
            task_id: "t-1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "navigationUnlocked");
        assert_eq!(json["taskId"], "t-1");
    }
}
