//! Streaming sound sink over a lock-free ring buffer
//!
//! The bridge writes converted samples into a [`SoundStream`]; the audio
//! output reads them through a [`SoundTap`]. A stream has no "clear" primitive,
//! so discarding buffered audio means asking the factory for a fresh stream.
//! The tap always follows the newest stream, which makes samples written to a
//! replaced stream unreachable.
//!
//! Design:
//! - Producer (decoder callback via the streamer): `write_samples`, never blocks
//! - Consumer (output callback): `SoundTap::fill`, uses `try_lock` only
//! - Overrun (ring full) drops the excess and is counted
//! - Underrun (ring empty while running) pads with silence and is counted

use crate::format::{AudioFormat, Vec3};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{debug, trace, warn};

/// Streaming sound sink accepting incremental writes
///
/// The sink offers no "is playing" query; callers track that themselves.
pub trait SoundStream: Send {
    /// Append interleaved samples; returns how many were accepted
    fn write_samples(&mut self, samples: &[f32]) -> usize;

    /// Start (or keep) output at `position`
    fn play(&mut self, position: Vec3);

    /// Halt output; buffered samples are kept
    fn stop(&mut self);

    /// Move the playing instance
    fn set_position(&mut self, position: Vec3);
}

/// Allocates streaming sinks of a fixed buffer duration
pub trait SoundStreamFactory: Send + Sync {
    fn create_stream(&self, buffer_secs: f32) -> Box<dyn SoundStream>;
}

/// State shared between one stream and the tap
#[derive(Debug)]
struct StreamShared {
    running: AtomicBool,
    position: Mutex<Vec3>,
    underruns: AtomicU64,
    overruns: AtomicU64,
    capacity: usize,
}

/// Consumer half registered with the tap
struct TapSource {
    consumer: HeapCons<f32>,
    shared: Arc<StreamShared>,
}

type TapSlot = Arc<Mutex<Option<TapSource>>>;

/// Creates ring-backed streams and exposes the newest one through a tap
pub struct RingStreamFactory {
    format: AudioFormat,
    current: TapSlot,
    streams_created: AtomicU64,
}

impl RingStreamFactory {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            format: AudioFormat::s16(sample_rate, channels),
            current: Arc::new(Mutex::new(None)),
            streams_created: AtomicU64::new(0),
        }
    }

    /// Output-side reader following whichever stream was created last
    pub fn tap(&self) -> SoundTap {
        SoundTap {
            current: Arc::clone(&self.current),
        }
    }

    pub fn streams_created(&self) -> u64 {
        self.streams_created.load(Ordering::Relaxed)
    }
}

impl SoundStreamFactory for RingStreamFactory {
    fn create_stream(&self, buffer_secs: f32) -> Box<dyn SoundStream> {
        let capacity = self.format.samples_for(buffer_secs).max(1);
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();

        let shared = Arc::new(StreamShared {
            running: AtomicBool::new(false),
            position: Mutex::new(Vec3::ZERO),
            underruns: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            capacity,
        });

        // Replacing the source drops the old consumer and everything in it
        let mut slot = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(TapSource {
            consumer,
            shared: Arc::clone(&shared),
        });
        drop(slot);

        let created = self.streams_created.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Created sound stream #{}: {:.1}s ({} samples)",
            created, buffer_secs, capacity
        );

        Box::new(RingSoundStream { producer, shared })
    }
}

/// Producer half of a ring-backed stream
pub struct RingSoundStream {
    producer: HeapProd<f32>,
    shared: Arc<StreamShared>,
}

impl SoundStream for RingSoundStream {
    fn write_samples(&mut self, samples: &[f32]) -> usize {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            let count = self.shared.overruns.fetch_add(1, Ordering::Relaxed) + 1;
            // Log every 100th overrun to avoid spam
            if count % 100 == 1 {
                warn!(
                    "Sound stream overrun: dropped {} of {} samples (total overruns: {})",
                    samples.len() - pushed,
                    samples.len(),
                    count
                );
            }
        }
        pushed
    }

    fn play(&mut self, position: Vec3) {
        *self.shared.position.lock().unwrap_or_else(|p| p.into_inner()) = position;
        if !self.shared.running.swap(true, Ordering::AcqRel) {
            trace!("Sound stream output started");
        }
    }

    fn stop(&mut self) {
        if self.shared.running.swap(false, Ordering::AcqRel) {
            trace!("Sound stream output stopped");
        }
    }

    fn set_position(&mut self, position: Vec3) {
        *self.shared.position.lock().unwrap_or_else(|p| p.into_inner()) = position;
    }
}

/// Output-side reader for the current stream
#[derive(Clone)]
pub struct SoundTap {
    current: TapSlot,
}

impl SoundTap {
    /// Fill `out` with the next samples of the current stream
    ///
    /// Writes silence when there is no stream, the stream is stopped, or the
    /// slot is being swapped by a flush. Returns the number of real samples.
    pub fn fill(&self, out: &mut [f32]) -> usize {
        let mut slot = match self.current.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::WouldBlock) => {
                out.fill(0.0);
                return 0;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let source = match slot.as_mut() {
            Some(source) if source.shared.running.load(Ordering::Acquire) => source,
            _ => {
                out.fill(0.0);
                return 0;
            }
        };

        let read = source.consumer.pop_slice(out);
        if read < out.len() {
            out[read..].fill(0.0);
            let count = source.shared.underruns.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 1000 == 0 {
                trace!("Sound stream underrun (total: {})", count);
            }
        }
        read
    }

    /// Whether the current stream is outputting
    pub fn is_running(&self) -> bool {
        let slot = self.current.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref()
            .map(|source| source.shared.running.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Position of the current stream's instance
    pub fn position(&self) -> Option<Vec3> {
        let slot = self.current.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref()
            .map(|source| *source.shared.position.lock().unwrap_or_else(|p| p.into_inner()))
    }

    /// Statistics for the current stream
    pub fn stats(&self) -> Option<RingBufferStats> {
        let slot = self.current.lock().unwrap_or_else(|p| p.into_inner());
        slot.as_ref().map(|source| RingBufferStats {
            underruns: source.shared.underruns.load(Ordering::Relaxed),
            overruns: source.shared.overruns.load(Ordering::Relaxed),
            capacity: source.shared.capacity,
            occupied: source.consumer.occupied_len(),
        })
    }
}

/// Ring buffer statistics
#[derive(Debug, Clone, Copy)]
pub struct RingBufferStats {
    /// Output found the ring empty while running
    pub underruns: u64,

    /// Writes that did not fit
    pub overruns: u64,

    /// Capacity in samples
    pub capacity: usize,

    /// Samples waiting to be played
    pub occupied: usize,
}

impl RingBufferStats {
    /// Fill percentage (0.0 to 1.0)
    pub fn fill_percent(&self) -> f32 {
        self.occupied as f32 / self.capacity as f32
    }
}
