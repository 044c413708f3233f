//! Accessibility-tree bridge for a desktop chat client
//!
//! Watches the client's window through the platform accessibility API, turns
//! new chat rows into structured messages for a backend service, and sends
//! replies back by driving the client's own input box. Every read and click
//! goes through one [`gate::InteractionGate`], so the background scanner and
//! outgoing sends never interleave.

pub mod config;
pub mod controls;
pub mod dedup;
pub mod direction;
pub mod dispatcher;
pub mod errors;
pub mod extractor;
pub mod gate;
pub mod inspect;
pub mod lists;
pub mod locator;
pub mod node;
pub mod pacing;
pub mod platforms;
pub mod poll;
pub mod popups;
pub mod reporter;
pub mod scanner;
pub mod ui;
pub mod unread;
pub mod window;

pub use config::BridgeConfig;
pub use dispatcher::{Command, CommandDispatcher, CommandRejection};
pub use errors::BridgeError;
pub use extractor::{ExtractedMessage, MessageKind};
pub use gate::{InteractionGate, NoopGate, ReentrantGate};
pub use locator::Matcher;
pub use node::{ControlKind, Key, Rect, UiNode, UiNodeImpl};
pub use platforms::{create_backend, init_thread, AutomationBackend};
pub use poll::PollBuffer;
pub use reporter::{HttpTransport, ReportHandle, ReportingPipeline, RetryPolicy};
pub use scanner::{MessageSink, ScanSchedule, Scanner};
pub use ui::ChatUi;
