//! Decode session lifecycle
//!
//! `Idle -> Starting -> Active -> Stopping -> Idle`
//!
//! **Responsibilities:**
//! - `start`: supersede the previous session, open and negotiate, register
//!   callbacks, begin playback
//! - `stop`: explicit teardown
//! - Background wait-loop: waits for the engine's stopped signal, then
//!   releases the engine resources off the caller's thread
//!
//! ## Session tags
//!
//! Every `start` takes a fresh tag. The tag is published in `active_tag`
//! before the engine can deliver anything, and cleared (or replaced) before a
//! session is torn down. Callback handles compare their own tag with
//! `active_tag`, so callbacks from a superseded session are ignored no matter
//! how late they arrive.
//!
//! The slot mutex is never held while the engine opens a source or releases
//! one; render-tick transport calls only ever wait for a field update.

use crate::engine::{AudioCallbacks, MediaHandle, SessionGuard, VideoSink};
use crate::error::{Error, Result};
use crate::playback::bridge::{lock_streamer, DecodeBridge};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use videokit_common::events::{BridgeEvent, EndReason, EventBus, SessionState};

/// Teardown request shared between the bridge and a session's wait-loop
#[derive(Clone, Default)]
pub(super) struct Teardown {
    cancel: CancellationToken,
    reason: Arc<Mutex<Option<EndReason>>>,
}

impl Teardown {
    /// Ask the wait-loop to end the session; the first reason wins
    pub(super) fn request(&self, reason: EndReason) {
        let mut slot = self.reason.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(reason);
        }
        drop(slot);
        self.cancel.cancel();
    }

    fn reason(&self) -> EndReason {
        self.reason
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .unwrap_or(EndReason::Stopped)
    }
}

/// The session transport commands are routed to
pub(super) struct ActiveSession {
    pub(super) tag: u64,
    pub(super) uri: String,
    pub(super) media: Arc<dyn MediaHandle>,
    pub(super) teardown: Teardown,
}

/// Lifecycle state plus the active session, guarded together
#[derive(Default)]
pub(super) struct SessionSlot {
    pub(super) state: SessionState,
    pub(super) active: Option<ActiveSession>,
}

impl SessionSlot {
    fn transition(&mut self, events: &EventBus, session: u64, new_state: SessionState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        info!("Session {}: {} -> {}", session, old_state, new_state);
        events.emit(BridgeEvent::SessionStateChanged {
            session,
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}

impl DecodeBridge {
    /// Start decoding `uri`, superseding any current session
    ///
    /// Returns the new session tag. On failure the bridge is left `Idle` and
    /// the caller may retry with another source.
    pub fn start(&self, uri: &str) -> Result<u64> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut slot = self.lock_slot();
            if let Some(previous) = slot.active.take() {
                info!("Session {} superseded by session {}", previous.tag, tag);
                previous.teardown.request(EndReason::Superseded);
            }
            self.active_tag.store(tag, Ordering::Release);
            slot.transition(&self.events, tag, SessionState::Starting);
        }

        // Hand the frame slot and the sound stream to the new session. Both
        // block until an in-flight callback of the previous session is done.
        self.frames.begin_session(tag);
        lock_streamer(&self.audio).reset();

        let media = match self.open_session(tag, uri) {
            Ok(media) => media,
            Err(e) => {
                self.fail_start(tag, uri, &e);
                return Err(e);
            }
        };

        let teardown = Teardown::default();
        let length_ms = media.length_ms();
        {
            let mut slot = self.lock_slot();
            if self.active_tag.load(Ordering::Acquire) != tag {
                drop(slot);
                // A newer start or a stop won the race
                warn!("Session {} was superseded while starting", tag);
                release_in_background(&self.runtime, media);
                return Err(Error::InvalidState(format!("Session {} superseded during start", tag)));
            }
            slot.active = Some(ActiveSession {
                tag,
                uri: uri.to_string(),
                media: Arc::clone(&media),
                teardown: teardown.clone(),
            });
            slot.transition(&self.events, tag, SessionState::Active);
        }

        let engine_stopped = CancellationToken::new();
        let signal = engine_stopped.clone();
        media.on_stopped(Box::new(move || signal.cancel()));

        self.runtime.spawn(watch_session(SessionWatch {
            tag,
            media,
            teardown,
            engine_stopped,
            poll_interval: Duration::from_millis(self.config.session.poll_interval_ms),
            slot: Arc::clone(&self.slot),
            active_tag: Arc::clone(&self.active_tag),
            events: self.events.clone(),
        }));

        info!("Session {} active: {} (length {}ms)", tag, uri, length_ms);
        self.events.emit(BridgeEvent::SessionStarted {
            session: tag,
            uri: uri.to_string(),
            length_ms,
            timestamp: chrono::Utc::now(),
        });
        Ok(tag)
    }

    /// Open, negotiate, register callbacks and begin playback
    fn open_session(&self, tag: u64, uri: &str) -> Result<Arc<dyn MediaHandle>> {
        debug!("Session {}: opening {}", tag, uri);
        let media: Arc<dyn MediaHandle> = Arc::from(self.engine.open(uri)?);

        let negotiated = media
            .set_audio_format(&self.audio_format)
            .and_then(|_| media.set_video_format(&self.video_format))
            .and_then(|_| {
                let guard = SessionGuard::new(tag, Arc::clone(&self.active_tag));
                media.set_video_callbacks(VideoSink::new(
                    guard.clone(),
                    Arc::clone(&self.frames),
                    self.events.clone(),
                ));
                media.set_audio_callbacks(AudioCallbacks::new(guard, Arc::clone(&self.audio), self.events.clone()));
                media.play()
            });

        if let Err(e) = negotiated {
            media.release();
            return Err(e);
        }

        {
            let mut audio = lock_streamer(&self.audio);
            if self.active_tag.load(Ordering::Acquire) == tag {
                audio.start_output();
            }
        }
        if media.time_ms() != 0 {
            media.set_time_ms(0);
        }
        Ok(media)
    }

    fn fail_start(&self, tag: u64, uri: &str, error: &Error) {
        error!("Session {} failed to start {}: {}", tag, uri, error);
        {
            let mut slot = self.lock_slot();
            if self.active_tag.load(Ordering::Acquire) == tag {
                self.active_tag.store(0, Ordering::Release);
                slot.transition(&self.events, tag, SessionState::Idle);
            }
        }
        self.events.emit(BridgeEvent::SessionStartFailed {
            session: tag,
            uri: uri.to_string(),
            error: error.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Tear down the active session, if any
    ///
    /// Returns immediately; the engine is released by the session's wait-loop
    /// and the bridge reaches `Idle` once that is done. Audio the session
    /// buffered is discarded, unlike an engine drain which plays it out.
    pub fn stop(&self) {
        let mut slot = self.lock_slot();
        let Some(active) = slot.active.take() else {
            if slot.state == SessionState::Starting {
                // The starting session notices the cleared tag and backs out
                let tag = self.active_tag.swap(0, Ordering::AcqRel);
                lock_streamer(&self.audio).reset();
                info!("Cancelling session {} while starting", tag);
                slot.transition(&self.events, tag, SessionState::Idle);
            }
            return;
        };
        self.active_tag.store(0, Ordering::Release);
        // Lock order is slot then streamer; callbacks only take the streamer
        lock_streamer(&self.audio).reset();
        info!("Stopping session {} ({})", active.tag, active.uri);
        slot.transition(&self.events, active.tag, SessionState::Stopping);
        active.teardown.request(EndReason::Stopped);
    }
}

/// Everything a session's wait-loop needs, detached from the bridge
struct SessionWatch {
    tag: u64,
    media: Arc<dyn MediaHandle>,
    teardown: Teardown,
    engine_stopped: CancellationToken,
    poll_interval: Duration,
    slot: Arc<Mutex<SessionSlot>>,
    active_tag: Arc<AtomicU64>,
    events: EventBus,
}

/// Background wait-loop for one session
///
/// Reacts to the engine's stopped signal immediately and also polls
/// `has_stopped` at the configured interval, for engines whose signal is
/// unreliable. Teardown requests from the bridge end the loop as well.
async fn watch_session(watch: SessionWatch) {
    let mut ticker = tokio::time::interval(watch.poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            _ = watch.teardown.cancel.cancelled() => break watch.teardown.reason(),
            _ = watch.engine_stopped.cancelled() => break EndReason::EngineStopped,
            _ = ticker.tick() => {
                if watch.media.has_stopped() {
                    break EndReason::EngineStopped;
                }
            }
        }
    };
    debug!("Session {} wait-loop ended: {:?}", watch.tag, reason);

    if reason == EndReason::EngineStopped {
        let mut slot = watch.slot.lock().unwrap_or_else(|p| p.into_inner());
        if slot.active.as_ref().map(|a| a.tag) == Some(watch.tag) {
            slot.active = None;
            watch.active_tag.store(0, Ordering::Release);
            slot.transition(&watch.events, watch.tag, SessionState::Stopping);
        }
    }

    let media = Arc::clone(&watch.media);
    if let Err(e) = tokio::task::spawn_blocking(move || media.release()).await {
        error!("Session {}: engine release panicked: {}", watch.tag, e);
    }

    {
        let mut slot = watch.slot.lock().unwrap_or_else(|p| p.into_inner());
        // Only finish the transition if no newer session took over meanwhile
        if slot.state == SessionState::Stopping && slot.active.is_none() {
            slot.transition(&watch.events, watch.tag, SessionState::Idle);
        }
    }

    info!("Session {} ended ({:?})", watch.tag, reason);
    watch.events.emit(BridgeEvent::SessionEnded {
        session: watch.tag,
        reason,
        timestamp: chrono::Utc::now(),
    });
}

/// Release a media handle without blocking the caller
fn release_in_background(runtime: &tokio::runtime::Handle, media: Arc<dyn MediaHandle>) {
    runtime.spawn_blocking(move || media.release());
}
