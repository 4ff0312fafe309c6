pub mod config;
pub mod controller;
pub mod events;
pub mod state;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use events::{EventReceiver, EventSender, SessionEvent, SessionSnapshot};
pub use state::{SessionState, TickOutcome};
