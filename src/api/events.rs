//! Real-time pipeline events via Server-Sent Events (SSE).
//!
//! This module provides a broadcast channel for pipeline progress and log
//! events that can be streamed to frontend clients via SSE. The UI drives
//! its progress bar from the `progress` events (0-100 across the parsing,
//! validating and importing phases).
//!
//! Events are also mirrored to `tracing` so server logs tell the same
//! story.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::import::ImportPhase;

/// Log level for frontend display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One event on the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum PipelineEvent {
    Log { level: LogLevel, message: String },
    Progress { phase: ImportPhase, percent: u8 },
}

/// Global event broadcaster.
pub static EVENT_BROADCASTER: Lazy<EventBroadcaster> = Lazy::new(EventBroadcaster::new);

/// Broadcasts pipeline events to all connected SSE clients.
pub struct EventBroadcaster {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send an event to all subscribers (ignored when nobody listens).
    pub fn emit(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::Log { level, message } => match level {
                LogLevel::Warning => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
                _ => tracing::info!("{}", message),
            },
            PipelineEvent::Progress { phase, percent } => {
                tracing::debug!(?phase, percent, "pipeline progress");
            }
        }

        let _ = self.sender.send(event);
    }

    /// Get a receiver for SSE streaming.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient emit functions used throughout the pipelines.
pub fn log_info(message: impl Into<String>) {
    EVENT_BROADCASTER.emit(PipelineEvent::Log {
        level: LogLevel::Info,
        message: message.into(),
    });
}

pub fn log_success(message: impl Into<String>) {
    EVENT_BROADCASTER.emit(PipelineEvent::Log {
        level: LogLevel::Success,
        message: message.into(),
    });
}

pub fn log_warning(message: impl Into<String>) {
    EVENT_BROADCASTER.emit(PipelineEvent::Log {
        level: LogLevel::Warning,
        message: message.into(),
    });
}

pub fn log_error(message: impl Into<String>) {
    EVENT_BROADCASTER.emit(PipelineEvent::Log {
        level: LogLevel::Error,
        message: message.into(),
    });
}

pub fn emit_progress(phase: ImportPhase, percent: u8) {
    EVENT_BROADCASTER.emit(PipelineEvent::Progress { phase, percent });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = PipelineEvent::Progress {
            phase: ImportPhase::Validating,
            percent: 30,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"progress\""));
        assert!(json.contains("\"phase\":\"validating\""));
        assert!(json.contains("\"percent\":30"));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.emit(PipelineEvent::Log {
            level: LogLevel::Info,
            message: "hello".to_string(),
        });

        match rx.recv().await.unwrap() {
            PipelineEvent::Log { message, .. } => assert_eq!(message, "hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
