//! Event types for the VideoKit bridge
//!
//! Events are broadcast on an [`EventBus`] and are serializable so the host
//! can log them as JSON lines or forward them to a UI.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Decode session lifecycle state
///
/// `Idle -> Starting -> Active -> Stopping -> Idle`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No engine resources held
    #[default]
    Idle,
    /// Engine instance opened, formats and callbacks being negotiated
    Starting,
    /// Decoding; transport commands reach the engine
    Active,
    /// Engine resources being released
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Why a session left the `Active` state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Engine reported playback stopped (end of stream or engine error)
    EngineStopped,
    /// A newer `start` call replaced this session
    Superseded,
    /// Explicit `stop` or bridge disposal
    Stopped,
}

/// Bridge event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// Session state machine transition
    SessionStateChanged {
        session: u64,
        old_state: SessionState,
        new_state: SessionState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session reached `Active`
    SessionStarted {
        session: u64,
        uri: String,
        length_ms: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// `start` failed; the bridge stays `Idle`
    SessionStartFailed {
        session: u64,
        uri: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session released its engine resources
    SessionEnded {
        session: u64,
        reason: EndReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A video frame was dropped because its byte count was wrong
    FrameDropped {
        session: u64,
        expected_bytes: usize,
        actual_bytes: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Buffered audio was discarded on a decoder flush
    AudioFlushed {
        session: u64,
        pts: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A seek was issued to the engine
    Seeked {
        session: u64,
        from_ms: i64,
        to_ms: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl BridgeEvent {
    /// Session tag this event belongs to
    pub fn session(&self) -> u64 {
        match self {
            BridgeEvent::SessionStateChanged { session, .. }
            | BridgeEvent::SessionStarted { session, .. }
            | BridgeEvent::SessionStartFailed { session, .. }
            | BridgeEvent::SessionEnded { session, .. }
            | BridgeEvent::FrameDropped { session, .. }
            | BridgeEvent::AudioFlushed { session, .. }
            | BridgeEvent::Seeked { session, .. } => *session,
        }
    }
}

/// Broadcast channel for bridge events
///
/// Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; having no subscribers is fine
    pub fn emit(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
