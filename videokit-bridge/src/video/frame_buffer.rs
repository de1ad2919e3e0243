//! Single-slot frame handoff between the decode engine and the render tick
//!
//! The engine locks the slot, writes exactly `pitch * lines` bytes, and commits.
//! A commit with the wrong byte count drops the frame; a good commit bumps the
//! generation counter. The render tick polls the generation without locking
//! and only copies the slot out when the generation moved.
//!
//! ## Design
//!
//! ```text
//! engine thread                      render tick
//! acquire_write_target() ─┐
//!   write pitch*lines     │ slot      FrameReader::poll()
//! commit_frame(written) ──┘ mutex ──>   generation changed? try_lock, copy out
//! ```
//!
//! One buffer, not two or three: the engine does not start a new frame until
//! the previous commit returns, and the reader copies out under the lock, so a
//! frame is never observed half-written. The reader uses `try_lock` and simply
//! skips the tick if the engine is mid-write.
//!
//! Generations are scoped to a session tag. `begin_session` resets the counter
//! so a new session starts at generation 0 and its first frame is generation 1.

use crate::format::VideoFormat;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Error returned when the engine reports a frame of the wrong size
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
pub struct FrameSizeMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Slot contents, guarded by the buffer mutex
struct FrameSlot {
    /// Session the slot currently belongs to
    session: u64,
    /// Generation of the last complete frame (0 = none yet)
    generation: u64,
    /// Pixel data, allocated on the first write
    data: Vec<u8>,
}

/// Fixed-size frame buffer shared by the engine callbacks and the render tick
pub struct FrameBuffer {
    format: VideoFormat,
    slot: Mutex<FrameSlot>,

    /// Published (session, generation) hint for the lock-free poll.
    /// Written under the slot lock; the reader re-checks under the lock.
    published_session: AtomicU64,
    published_generation: AtomicU64,

    /// Total frames committed since creation
    frames_committed: AtomicU64,
    /// Total frames dropped for size mismatch
    frames_dropped: AtomicU64,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("format", &self.format)
            .field("session", &self.published_session.load(Ordering::Relaxed))
            .field("generation", &self.published_generation.load(Ordering::Relaxed))
            .field("frames_committed", &self.frames_committed.load(Ordering::Relaxed))
            .field("frames_dropped", &self.frames_dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl FrameBuffer {
    /// Create an empty buffer for `format`; pixel memory is allocated lazily
    pub fn new(format: VideoFormat) -> Self {
        debug!(
            "Creating frame buffer: {}x{} pitch={} lines={} ({} bytes)",
            format.width,
            format.height,
            format.pitch,
            format.lines,
            format.frame_len()
        );

        Self {
            format,
            slot: Mutex::new(FrameSlot {
                session: 0,
                generation: 0,
                data: Vec::new(),
            }),
            published_session: AtomicU64::new(0),
            published_generation: AtomicU64::new(0),
            frames_committed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    /// Exact byte length every committed frame must have
    pub fn frame_len(&self) -> usize {
        self.format.frame_len()
    }

    fn lock_slot(&self) -> MutexGuard<'_, FrameSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand the slot to a new session and reset its generation to 0
    ///
    /// Blocks until any in-flight write from the previous session is done.
    pub fn begin_session(&self, session: u64) {
        let mut slot = self.lock_slot();
        slot.session = session;
        slot.generation = 0;
        self.published_session.store(session, Ordering::Release);
        self.published_generation.store(0, Ordering::Release);
        debug!("Frame buffer assigned to session {}", session);
    }

    /// Lock the slot for the engine to write one frame
    ///
    /// Returns `None` if the slot no longer belongs to `session`.
    pub fn acquire_write_target(&self, session: u64) -> Option<FrameWriteTarget<'_>> {
        let mut slot = self.lock_slot();
        if slot.session != session {
            trace!(
                "Write target refused: slot belongs to session {}, caller is {}",
                slot.session,
                session
            );
            return None;
        }

        let len = self.frame_len();
        if slot.data.len() != len {
            slot.data = vec![0; len];
        }

        Some(FrameWriteTarget { slot })
    }

    /// Publish the frame in `target` if the engine wrote exactly one frame
    ///
    /// On success returns the new generation. On a size mismatch the frame is
    /// dropped and the generation is left alone.
    pub fn commit_frame(
        &self,
        target: FrameWriteTarget<'_>,
        written: usize,
    ) -> std::result::Result<u64, FrameSizeMismatch> {
        let mut slot = target.slot;
        let expected = self.frame_len();

        if written != expected {
            let dropped = self.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Dropping frame for session {}: expected {} bytes, got {} (total dropped: {})",
                slot.session, expected, written, dropped
            );
            return Err(FrameSizeMismatch {
                expected,
                actual: written,
            });
        }

        slot.generation += 1;
        self.published_generation.store(slot.generation, Ordering::Release);
        self.frames_committed.fetch_add(1, Ordering::Relaxed);
        trace!("Committed frame generation {} (session {})", slot.generation, slot.session);
        Ok(slot.generation)
    }

    /// Current (session, generation) without locking
    pub fn published(&self) -> (u64, u64) {
        (
            self.published_session.load(Ordering::Acquire),
            self.published_generation.load(Ordering::Acquire),
        )
    }

    pub fn frames_committed(&self) -> u64 {
        self.frames_committed.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}

/// Locked write access to the frame slot
///
/// Dropping it without committing is the engine's "unlock": nothing is
/// published.
pub struct FrameWriteTarget<'a> {
    slot: MutexGuard<'a, FrameSlot>,
}

impl FrameWriteTarget<'_> {
    /// Session this write belongs to
    pub fn session(&self) -> u64 {
        self.slot.session
    }
}

impl Deref for FrameWriteTarget<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.slot.data
    }
}

impl DerefMut for FrameWriteTarget<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.slot.data
    }
}

/// A frame copied out for the render tick
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub session: u64,
    pub generation: u64,
    /// Padded width in pixels
    pub width: u32,
    /// Padded height in rows
    pub height: u32,
    /// RGBA bytes, `pitch * lines` long
    pub data: &'a [u8],
}

/// Render-tick side of the handoff
///
/// Remembers the last rendered (session, generation) and owns the copy the
/// host reads from, so no reference into the shared slot outlives a poll.
#[derive(Debug, Default)]
pub struct FrameReader {
    front: Vec<u8>,
    last_session: u64,
    last_generation: u64,
    frames_rendered: u64,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the newest frame if it has not been rendered yet
    ///
    /// Never blocks: if the engine holds the slot, this tick yields nothing
    /// and the frame is picked up on a later tick.
    pub fn poll(&mut self, buffer: &FrameBuffer) -> Option<FrameView<'_>> {
        let (session, generation) = buffer.published();
        if session == self.last_session && generation == self.last_generation {
            return None;
        }

        let slot = match buffer.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::WouldBlock) => {
                trace!("Frame slot busy, skipping this tick");
                return None;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if slot.generation == 0 {
            // New session with no frame yet
            self.last_session = slot.session;
            self.last_generation = 0;
            return None;
        }
        if slot.session == self.last_session && slot.generation == self.last_generation {
            return None;
        }

        self.front.clear();
        self.front.extend_from_slice(&slot.data);
        self.last_session = slot.session;
        self.last_generation = slot.generation;
        drop(slot);

        self.frames_rendered += 1;
        let format = buffer.format();
        Some(FrameView {
            session: self.last_session,
            generation: self.last_generation,
            width: format.texture_width(),
            height: format.lines,
            data: &self.front,
        })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}
