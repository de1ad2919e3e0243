//! Decode engine seam
//!
//! The decode engine (demux, codecs, network fetch) is external. It is driven
//! through [`MediaEngine`] / [`MediaHandle`] and delivers data through the two
//! callback handles the bridge registers on each session:
//!
//! - [`VideoSink`]: `lock` a frame, write `pitch * lines` RGBA bytes,
//!   `display(written)` to publish (dropping the lock is "unlock")
//! - [`AudioCallbacks`]: `play` / `pause` / `resume` / `flush` / `drain`
//!
//! Both handles carry the session tag they were created for. Once the bridge
//! moves to another session (or tears this one down) every call on a stale
//! handle is a silent no-op, whichever engine thread it arrives on.

pub mod synthetic;

pub use synthetic::SyntheticEngine;

use crate::audio::streamer::AudioStreamer;
use crate::error::Result;
use crate::format::{AudioFormat, VideoFormat};
use crate::video::frame_buffer::{FrameBuffer, FrameWriteTarget};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;
use videokit_common::events::{BridgeEvent, EventBus};

/// Called once when the engine reports playback stopped
pub type StoppedCallback = Box<dyn Fn() + Send + Sync>;

/// Factory for decode sessions
pub trait MediaEngine: Send + Sync {
    /// Open the media at `uri`
    ///
    /// Unreachable or unsupported sources fail here.
    fn open(&self, uri: &str) -> Result<Box<dyn MediaHandle>>;
}

/// One opened media resource on one engine instance
///
/// Implementations may call the registered callbacks from any thread, but must
/// not call `VideoSink::lock` again before the previous frame lock is released.
pub trait MediaHandle: Send + Sync {
    fn set_audio_format(&self, format: &AudioFormat) -> Result<()>;
    fn set_video_format(&self, format: &VideoFormat) -> Result<()>;
    fn set_video_callbacks(&self, sink: VideoSink);
    fn set_audio_callbacks(&self, callbacks: AudioCallbacks);
    fn on_stopped(&self, callback: StoppedCallback);

    fn play(&self) -> Result<()>;
    fn pause(&self);
    fn is_playing(&self) -> bool;

    /// True once the engine reached end of stream or gave up
    fn has_stopped(&self) -> bool;

    fn time_ms(&self) -> i64;
    fn set_time_ms(&self, ms: i64);
    /// Total length; 0 or negative while unknown
    fn length_ms(&self) -> i64;

    /// Stop decoding and release engine resources. Idempotent.
    fn release(&self);
}

/// Session tag plus the bridge's notion of the current session
#[derive(Debug, Clone)]
pub struct SessionGuard {
    tag: u64,
    active: Arc<AtomicU64>,
}

impl SessionGuard {
    pub fn new(tag: u64, active: Arc<AtomicU64>) -> Self {
        Self { tag, active }
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Whether this handle still belongs to the active session
    pub fn is_current(&self) -> bool {
        self.active.load(Ordering::Acquire) == self.tag
    }
}

/// Video callback handle registered with the engine
#[derive(Clone)]
pub struct VideoSink {
    guard: SessionGuard,
    frames: Arc<FrameBuffer>,
    events: EventBus,
}

impl VideoSink {
    pub fn new(guard: SessionGuard, frames: Arc<FrameBuffer>, events: EventBus) -> Self {
        Self { guard, frames, events }
    }

    pub fn session(&self) -> u64 {
        self.guard.tag()
    }

    /// Format the engine must write in
    pub fn format(&self) -> &VideoFormat {
        self.frames.format()
    }

    /// Lock the frame buffer for writing
    ///
    /// `None` means this session is gone; the engine should skip the frame.
    pub fn lock(&self) -> Option<FrameLock<'_>> {
        if !self.guard.is_current() {
            trace!("Ignoring video lock from stale session {}", self.guard.tag());
            return None;
        }
        self.frames
            .acquire_write_target(self.guard.tag())
            .map(|target| FrameLock { sink: self, target })
    }
}

/// A locked frame being written by the engine
pub struct FrameLock<'a> {
    sink: &'a VideoSink,
    target: FrameWriteTarget<'a>,
}

impl FrameLock<'_> {
    /// Publish the frame; `written` is the byte count the engine produced
    ///
    /// Returns the new generation, or `None` if the frame was dropped (wrong
    /// size) or the session went stale while writing.
    pub fn display(self, written: usize) -> Option<u64> {
        let sink = self.sink;
        if !sink.guard.is_current() {
            trace!("Discarding frame from stale session {}", sink.guard.tag());
            return None;
        }

        match sink.frames.commit_frame(self.target, written) {
            Ok(generation) => Some(generation),
            Err(mismatch) => {
                sink.events.emit(BridgeEvent::FrameDropped {
                    session: sink.guard.tag(),
                    expected_bytes: mismatch.expected,
                    actual_bytes: mismatch.actual,
                    timestamp: chrono::Utc::now(),
                });
                None
            }
        }
    }
}

impl Deref for FrameLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.target
    }
}

impl DerefMut for FrameLock<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.target
    }
}

/// Audio callback handle registered with the engine
///
/// The session check happens while holding the streamer lock, so a callback
/// racing a session switch either lands before the new session resets the
/// stream or is rejected.
#[derive(Clone)]
pub struct AudioCallbacks {
    guard: SessionGuard,
    streamer: Arc<Mutex<AudioStreamer>>,
    events: EventBus,
}

impl AudioCallbacks {
    pub fn new(guard: SessionGuard, streamer: Arc<Mutex<AudioStreamer>>, events: EventBus) -> Self {
        Self {
            guard,
            streamer,
            events,
        }
    }

    pub fn session(&self) -> u64 {
        self.guard.tag()
    }

    fn with_streamer<R>(&self, signal: &str, f: impl FnOnce(&mut AudioStreamer) -> R) -> Option<R> {
        let mut streamer = self.streamer.lock().unwrap_or_else(|p| p.into_inner());
        if !self.guard.is_current() {
            trace!("Ignoring audio {} from stale session {}", signal, self.guard.tag());
            return None;
        }
        Some(f(&mut streamer))
    }

    /// `count` frames of interleaved S16 PCM at presentation time `pts`
    pub fn play(&self, samples: &[u8], count: u32, pts: i64) {
        trace!("Audio play: {} frames at pts {}", count, pts);
        self.with_streamer("play", |s| s.on_samples(samples, count));
    }

    pub fn pause(&self, pts: i64) {
        self.with_streamer("pause", |s| s.on_pause(pts));
    }

    pub fn resume(&self, pts: i64) {
        self.with_streamer("resume", |s| s.on_resume(pts));
    }

    pub fn flush(&self, pts: i64) {
        if self.with_streamer("flush", |s| s.on_flush(pts)).is_some() {
            self.events.emit(BridgeEvent::AudioFlushed {
                session: self.guard.tag(),
                pts,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    pub fn drain(&self) {
        self.with_streamer("drain", |s| s.on_drain());
    }
}
