//! Suppression of messages that were already forwarded

use crate::extractor::ExtractedMessage;
use std::collections::HashSet;
use tracing::debug;

/// Content fingerprint of a message (blake3, hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageSignature(String);

impl MessageSignature {
    /// The native row id is preferred because the client reuses identical
    /// text across rows; without one, contact and direction disambiguate.
    pub fn of(message: &ExtractedMessage) -> Self {
        let raw = match &message.native_id {
            Some(id) => format!("{}|{}", id, message.content),
            None => format!("{}|{}|{}", message.contact, message.content, message.is_self),
        };
        Self(blake3::hash(raw.as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub const DEFAULT_CAPACITY: usize = 2000;

/// Bounded set of seen signatures. Overflow clears the whole set.
#[derive(Debug)]
pub struct Deduplicator {
    seen: HashSet<MessageSignature>,
    capacity: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Deduplicator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Record `signature`; true only the first time it is seen.
    pub fn should_emit(&mut self, signature: MessageSignature) -> bool {
        if !self.seen.insert(signature) {
            return false;
        }
        if self.seen.len() > self.capacity {
            debug!("signature set exceeded {}, clearing", self.capacity);
            self.seen.clear();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
