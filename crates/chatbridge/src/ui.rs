//! Gated, paced access to the chat client
//!
//! [`ChatUi`] is what the scanner and the dispatcher talk to. Every method
//! enters the interaction gate for its whole duration, so callers composing
//! several steps only need to hold the gate themselves when the steps must not
//! be interleaved with another thread's.

use crate::config::BridgeConfig;
use crate::controls::current_chat_title;
use crate::direction::{DirectionClassifier, FixedDirection, VarianceClassifier};
use crate::extractor::{ExtractedMessage, MessageExtractor};
use crate::gate::{InteractionGate, ReentrantGate};
use crate::lists::{locate_message_list, locate_session_list, unread_sessions};
use crate::pacing::{self, DelayRange, HumanPacer, Pacer};
use crate::platforms::{self, AutomationBackend};
use crate::popups;
use crate::unread::normalize_contact_name;
use crate::window::{MainWindowLocator, WindowHandleCache};
use crate::{BridgeError, UiNode};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ChatUi {
    backend: Arc<dyn AutomationBackend>,
    gate: Arc<dyn InteractionGate>,
    pacer: Arc<dyn Pacer>,
    windows: WindowHandleCache,
    extractor: MessageExtractor,
    click_move: DelayRange,
    message_scan_limit: usize,
}

pub struct ChatUiBuilder {
    backend: Arc<dyn AutomationBackend>,
    config: BridgeConfig,
    gate: Option<Arc<dyn InteractionGate>>,
    pacer: Option<Arc<dyn Pacer>>,
    classifier: Option<Arc<dyn DirectionClassifier>>,
}

impl ChatUiBuilder {
    pub fn gate(mut self, gate: Arc<dyn InteractionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn DirectionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Defaults: reentrant gate, real sleeps, and the pixel classifier when
    /// the platform can capture the screen.
    pub fn build(self) -> ChatUi {
        self.backend.configure_timeouts(self.config.timeouts());

        let classifier = self.classifier.unwrap_or_else(|| {
            match platforms::create_screen_capture() {
                Some(capture) => Arc::new(VarianceClassifier::new(capture)),
                None => {
                    warn!("no screen capture on this platform, every message reads as incoming");
                    Arc::new(FixedDirection::default())
                }
            }
        });
        let locator = MainWindowLocator::new(Arc::clone(&self.backend), self.config.window.clone());

        ChatUi {
            windows: WindowHandleCache::new(locator, Arc::clone(&self.backend)),
            gate: self.gate.unwrap_or_else(|| Arc::new(ReentrantGate::new())),
            pacer: self.pacer.unwrap_or_else(|| Arc::new(HumanPacer)),
            extractor: MessageExtractor::new(classifier),
            click_move: self.config.click_move(),
            message_scan_limit: self.config.listener.message_scan_limit,
            backend: self.backend,
        }
    }
}

impl ChatUi {
    pub fn builder(backend: Arc<dyn AutomationBackend>, config: &BridgeConfig) -> ChatUiBuilder {
        ChatUiBuilder {
            backend,
            config: config.clone(),
            gate: None,
            pacer: None,
            classifier: None,
        }
    }

    pub fn backend(&self) -> &dyn AutomationBackend {
        self.backend.as_ref()
    }

    pub fn gate(&self) -> &dyn InteractionGate {
        self.gate.as_ref()
    }

    pub fn pacer(&self) -> &dyn Pacer {
        self.pacer.as_ref()
    }

    pub fn main_window(&self) -> Result<UiNode, BridgeError> {
        let _gate = self.gate.enter("main_window");
        self.windows.get()
    }

    pub fn main_window_class(&self) -> &str {
        &self.windows.locator().query().class_name
    }

    /// Raw title of the open chat.
    pub fn current_chat_title(&self) -> Result<Option<String>, BridgeError> {
        let _gate = self.gate.enter("current_chat_title");
        let window = self.windows.get()?;
        Ok(current_chat_title(&window))
    }

    /// Normalized contact of the open chat, empty when unknown.
    pub fn current_contact(&self) -> Result<String, BridgeError> {
        Ok(normalize_contact_name(
            &self.current_chat_title()?.unwrap_or_default(),
        ))
    }

    pub fn find_unread_sessions(&self, max: usize) -> Result<Vec<UiNode>, BridgeError> {
        let _gate = self.gate.enter("find_unread_sessions");
        let window = self.windows.get()?;
        let Some(list) = locate_session_list(self.backend(), &window) else {
            debug!("session list not found");
            return Ok(Vec::new());
        };
        Ok(unread_sessions(&list, max))
    }

    /// Click a session entry and report which contact is now open, falling
    /// back to the entry's own name.
    pub fn click_session_item(&self, item: &UiNode) -> Option<String> {
        let _gate = self.gate.enter("click_session_item");
        let name = normalize_contact_name(&item.name());

        self.pacer.pause(self.click_move);
        if let Err(e) = item.click() {
            debug!("session click failed for '{}': {}", name, e);
            return (!name.is_empty()).then_some(name);
        }
        self.pacer.pause(pacing::AFTER_CLICK);

        let current = self
            .windows
            .get()
            .ok()
            .and_then(|w| current_chat_title(&w))
            .map(|t| normalize_contact_name(&t))
            .unwrap_or_default();
        if !current.is_empty() {
            Some(current)
        } else if !name.is_empty() {
            Some(name)
        } else {
            None
        }
    }

    /// Make `target` the open chat, switching through the session list if
    /// needed. Matching is by containment of normalized names.
    #[instrument(level = "debug", skip(self))]
    pub fn ensure_chat_target(&self, target: &str) -> bool {
        let _gate = self.gate.enter("ensure_chat_target");
        let window = match self.windows.get() {
            Ok(window) => window,
            Err(e) => {
                debug!("cannot switch chat: {}", e);
                return false;
            }
        };
        let wanted = normalize_contact_name(target);
        if wanted.is_empty() {
            return false;
        }
        let is_open = |window: &UiNode| {
            let current = normalize_contact_name(&current_chat_title(window).unwrap_or_default());
            !current.is_empty() && current.contains(&wanted)
        };
        if is_open(&window) {
            debug!("'{}' is already open", wanted);
            return true;
        }

        let Some(list) = locate_session_list(self.backend(), &window) else {
            info!("session list not found while switching to '{}'", wanted);
            return false;
        };
        let entry = list.children().unwrap_or_default().into_iter().find(|item| {
            let name = normalize_contact_name(&item.name());
            !name.is_empty() && (name == wanted || name.contains(&wanted))
        });
        let Some(entry) = entry else {
            info!("no session entry matches '{}'", wanted);
            return false;
        };

        self.click_session_item(&entry);
        self.pacer.pause(pacing::SESSION_SETTLE);
        let switched = is_open(&window);
        if !switched {
            info!("clicked '{}' but the open chat did not change", wanted);
        }
        switched
    }

    /// Trailing messages of the open chat attributed to `contact`, or to the
    /// open chat's title when `contact` normalizes to nothing.
    pub fn extract_latest_messages(&self, contact: &str) -> Vec<ExtractedMessage> {
        let _gate = self.gate.enter("extract_latest_messages");
        let window = match self.windows.get() {
            Ok(window) => window,
            Err(e) => {
                debug!("cannot extract messages: {}", e);
                return Vec::new();
            }
        };
        let mut contact = normalize_contact_name(contact);
        if contact.is_empty() {
            contact = normalize_contact_name(&current_chat_title(&window).unwrap_or_default());
        }
        let Some(list) = locate_message_list(self.backend(), &window) else {
            debug!("message list not found");
            return Vec::new();
        };
        self.extractor
            .extract_latest(&contact, &list, self.message_scan_limit)
    }

    pub fn guard_popups(&self) -> Result<usize, BridgeError> {
        let _gate = self.gate.enter("guard_popups");
        popups::guard_popups(self.backend(), self.main_window_class())
    }
}
