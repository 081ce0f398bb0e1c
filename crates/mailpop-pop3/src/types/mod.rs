//! Core POP3 types.

mod listing;
mod reply;
mod state;

pub use listing::{ListEntry, UidEntry};
pub use reply::{Reply, ServerGreeting, Status};
pub use state::{AuthMethod, SessionState};
