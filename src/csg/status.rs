// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Status messages reported by the boolean pipeline

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
    /// Function that raised the message
    pub origin: String,
    /// Owning entity, when known
    pub entity: Option<String>,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.origin, self.text)?;
        if let Some(entity) = &self.entity {
            write!(f, " (entity {entity})")?;
        }
        Ok(())
    }
}

/// Receives user-facing diagnostics
pub trait StatusSink: Send + Sync {
    fn report(&self, text: &str, severity: Severity, origin: &str, entity: Option<&str>);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn report(&self, _text: &str, _severity: Severity, _origin: &str, _entity: Option<&str>) {}
}

/// Forwards messages to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&self, text: &str, severity: Severity, origin: &str, entity: Option<&str>) {
        let entity = entity.unwrap_or("-");
        match severity {
            Severity::Info => info!(origin, entity, "{text}"),
            Severity::Warning => warn!(origin, entity, "{text}"),
            Severity::Error => error!(origin, entity, "{text}"),
        }
    }
}

/// Collects messages, keeping only the first copy of each
#[derive(Debug, Default)]
pub struct MessageLog {
    inner: Mutex<LogState>,
}

#[derive(Debug, Default)]
struct LogState {
    seen: AHashSet<StatusMessage>,
    messages: Vec<StatusMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message; returns `false` if the same text was already reported for the same entity
    pub fn push(&self, message: StatusMessage) -> bool {
        let Ok(mut state) = self.inner.lock() else {
            return false;
        };
        if !state.seen.insert(message.clone()) {
            debug!(text = %message.text, "duplicate status message dropped");
            return false;
        }
        state.messages.push(message);
        true
    }

    pub fn messages(&self) -> Vec<StatusMessage> {
        self.inner
            .lock()
            .map(|state| state.messages.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<StatusMessage> {
        match self.inner.lock() {
            Ok(mut state) => {
                state.seen.clear();
                std::mem::take(&mut state.messages)
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|state| state.messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.inner
            .lock()
            .map(|state| state.messages.iter().filter(|m| m.severity == severity).count())
            .unwrap_or(0)
    }
}

impl StatusSink for MessageLog {
    fn report(&self, text: &str, severity: Severity, origin: &str, entity: Option<&str>) {
        self.push(StatusMessage {
            text: text.to_string(),
            severity,
            origin: origin.to_string(),
            entity: entity.map(str::to_string),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_dropped_per_entity() {
        let log = MessageLog::new();
        log.report("open edges", Severity::Warning, "compute_pair", Some("wall-1"));
        log.report("open edges", Severity::Warning, "compute_pair", Some("wall-1"));
        log.report("open edges", Severity::Warning, "compute_pair", Some("wall-2"));
        log.report("fallback", Severity::Error, "compute_pair", None);

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(Severity::Warning), 2);
        assert_eq!(log.count(Severity::Error), 1);
    }

    #[test]
    fn test_take_resets() {
        let log = MessageLog::new();
        log.report("a", Severity::Info, "test", None);
        assert_eq!(log.take().len(), 1);
        assert!(log.is_empty());
        log.report("a", Severity::Info, "test", None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_display() {
        let message = StatusMessage {
            text: "skipped".into(),
            severity: Severity::Warning,
            origin: "compute_pair".into(),
            entity: Some("door-7".into()),
        };
        assert_eq!(message.to_string(), "[warning] compute_pair: skipped (entity door-7)");
    }
}
