//! Decoder audio callbacks to streaming sink
//!
//! Converts S16 PCM to f32 and writes it into the current [`SoundStream`],
//! and applies the decoder's lifecycle signals:
//!
//! | signal   | stream                          | playing flag |
//! |----------|---------------------------------|--------------|
//! | samples  | write; start output if stopped  | true         |
//! | drain    | untouched, plays out its buffer | false        |
//! | flush    | replaced by a fresh stream      | false        |
//! | pause    | output halted, buffer kept      | false        |
//! | resume   | output restarted                | true         |
//!
//! The sink cannot report whether it is playing, so `playing` is our own
//! best-effort record, driven only by these signals and by session start.
//!
//! Not thread-safe by itself; the bridge keeps it behind a mutex because the
//! decoder may deliver the five signals from different threads.

use crate::audio::convert::convert_s16_ne;
use crate::audio::stream::{SoundStream, SoundStreamFactory};
use crate::format::{AudioFormat, Vec3};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters for the audio path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamerStats {
    /// Samples converted and offered to the sink
    pub samples_converted: u64,
    /// Samples the sink accepted
    pub samples_written: u64,
    /// Samples the sink refused (ring full)
    pub samples_overrun: u64,
    /// Streams discarded by flushes
    pub flushes: u64,
}

/// Converter and lifecycle tracker for the streaming sink
pub struct AudioStreamer {
    format: AudioFormat,
    buffer_secs: f32,
    factory: Arc<dyn SoundStreamFactory>,
    stream: Box<dyn SoundStream>,
    playing: bool,
    position: Vec3,
    scratch: Vec<f32>,
    stats: StreamerStats,
}

impl AudioStreamer {
    /// Create a streamer with one stream of `buffer_secs` capacity
    pub fn new(format: AudioFormat, buffer_secs: f32, factory: Arc<dyn SoundStreamFactory>) -> Self {
        let stream = factory.create_stream(buffer_secs);
        Self {
            format,
            buffer_secs,
            factory,
            stream,
            playing: false,
            position: Vec3::ZERO,
            scratch: Vec::with_capacity(4096 * 16),
            stats: StreamerStats::default(),
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Decoder delivered `sample_count` frames of interleaved S16 PCM
    ///
    /// Returns the number of f32 samples converted (`sample_count * channels`
    /// unless the buffer was short).
    pub fn on_samples(&mut self, raw_pcm: &[u8], sample_count: u32) -> usize {
        let expected = sample_count as usize * self.format.channels as usize;
        let converted = convert_s16_ne(raw_pcm, expected, &mut self.scratch);
        if converted < expected {
            warn!(
                "Short PCM buffer: {} bytes for {} samples, converted {}",
                raw_pcm.len(),
                expected,
                converted
            );
        }

        let written = self.stream.write_samples(&self.scratch);
        self.stats.samples_converted += converted as u64;
        self.stats.samples_written += written as u64;
        self.stats.samples_overrun += (converted - written) as u64;

        if !self.playing {
            // Samples arriving after a flush or pause restart output
            self.stream.play(self.position);
            self.playing = true;
        }
        converted
    }

    /// No more samples for this segment; buffered ones still play out
    pub fn on_drain(&mut self) {
        debug!("Audio drain");
        self.playing = false;
    }

    /// Discard everything buffered but not yet played
    pub fn on_flush(&mut self, pts: i64) {
        self.stream.stop();
        self.stream = self.factory.create_stream(self.buffer_secs);
        self.playing = false;
        self.stats.flushes += 1;
        debug!("Audio flush at pts {} (flushes: {})", pts, self.stats.flushes);
    }

    /// Halt output, keep the buffer
    pub fn on_pause(&mut self, pts: i64) {
        self.stream.stop();
        self.playing = false;
        debug!("Audio pause at pts {}", pts);
    }

    /// Restart output
    pub fn on_resume(&mut self, pts: i64) {
        self.stream.play(self.position);
        self.playing = true;
        debug!("Audio resume at pts {}", pts);
    }

    /// Start output without waiting for samples (session start, first frame)
    pub fn start_output(&mut self) {
        self.stream.play(self.position);
        self.playing = true;
    }

    /// Fresh stream for a new session; nothing from the previous one survives
    pub fn reset(&mut self) {
        self.stream.stop();
        self.stream = self.factory.create_stream(self.buffer_secs);
        self.playing = false;
        info!("Audio stream reset ({:.1}s buffer)", self.buffer_secs);
    }

    /// Best-effort "sink is playing" record
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Last known sound position; survives pause and flush
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.stream.set_position(position);
    }

    pub fn stats(&self) -> StreamerStats {
        self.stats
    }
}
