//! Transport control surface
//!
//! Thin delegation to the active session. With no active session, time and
//! length read as 0 and every command is silently ignored; that is the normal
//! state before the first `start` and after end of stream.

use crate::engine::MediaHandle;
use crate::format::Vec3;
use crate::playback::bridge::{lock_streamer, DecodeBridge};
use std::sync::Arc;
use tracing::{debug, warn};
use videokit_common::events::{BridgeEvent, SessionState};

impl DecodeBridge {
    /// Active session's tag and media handle
    fn active_media(&self) -> Option<(u64, Arc<dyn MediaHandle>)> {
        let slot = self.lock_slot();
        if slot.state != SessionState::Active {
            return None;
        }
        slot.active
            .as_ref()
            .map(|active| (active.tag, Arc::clone(&active.media)))
    }

    pub fn play(&self) {
        if let Some((tag, media)) = self.active_media() {
            debug!("Session {}: play", tag);
            if let Err(e) = media.play() {
                warn!("Session {}: play failed: {}", tag, e);
            }
        }
    }

    pub fn pause(&self) {
        if let Some((tag, media)) = self.active_media() {
            debug!("Session {}: pause", tag);
            media.pause();
        }
    }

    /// Whether the engine is playing (false with no session)
    pub fn is_playing(&self) -> bool {
        self.active_media()
            .map(|(_, media)| media.is_playing())
            .unwrap_or(false)
    }

    /// Playback time in milliseconds (0 with no session)
    pub fn time(&self) -> i64 {
        self.active_media()
            .map(|(_, media)| media.time_ms().max(0))
            .unwrap_or(0)
    }

    /// Media length in milliseconds (0 with no session or while unknown)
    pub fn length(&self) -> i64 {
        self.active_media()
            .map(|(_, media)| media.length_ms().max(0))
            .unwrap_or(0)
    }

    pub fn set_time(&self, ms: i64) {
        self.seek_to(ms);
    }

    /// Seek to `ms`, clamped to `[0, length]`
    ///
    /// An unknown length (0) pins the target to 0. Seeking to the current time is a no-op, since some engines treat a
    /// repeated identical seek as an error. Returns whether a seek was issued.
    pub fn seek_to(&self, ms: i64) -> bool {
        let Some((tag, media)) = self.active_media() else {
            return false;
        };

        let target = ms.clamp(0, media.length_ms().max(0));
        let current = media.time_ms();
        if target == current {
            debug!("Session {}: seek to {}ms ignored (already there)", tag, target);
            return false;
        }

        debug!("Session {}: seek {}ms -> {}ms", tag, current, target);
        media.set_time_ms(target);
        self.events.emit(BridgeEvent::Seeked {
            session: tag,
            from_ms: current,
            to_ms: target,
            timestamp: chrono::Utc::now(),
        });
        true
    }

    /// Relative seek by `delta_ms` (negative skips back)
    pub fn skip(&self, delta_ms: i64) -> bool {
        match self.active_media() {
            Some((_, media)) => self.seek_to(media.time_ms().saturating_add(delta_ms)),
            None => false,
        }
    }

    /// Position of the playing sound instance
    ///
    /// Independent of session state; the last value survives pause and flush.
    pub fn sound_position(&self) -> Vec3 {
        lock_streamer(&self.audio).position()
    }

    pub fn set_sound_position(&self, position: Vec3) {
        lock_streamer(&self.audio).set_position(position);
    }

    /// Best-effort "sound stream is playing" record
    pub fn sound_playing(&self) -> bool {
        lock_streamer(&self.audio).is_playing()
    }
}
