//! Windows platform implementation
//!
//! Talks to the chat client through Windows UI Automation via the
//! `uiautomation` crate, with a few raw Win32 calls for things UIA has no
//! cheap answer to (native window lookup, hung detection, foregrounding).

pub mod capture;
pub mod element;
pub mod engine;
pub mod types;
pub mod utils;

pub use capture::XcapCapture;
pub use element::WindowsNode;
pub use engine::WindowsBackend;
pub use utils::init_com;
