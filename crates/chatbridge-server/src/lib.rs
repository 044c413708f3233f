//! Process-level wiring for the chat bridge: logging, the local HTTP
//! surface, and the run modes the binary exposes.

pub mod api;
pub mod logging;
pub mod modes;

pub use api::{router, AppState};
