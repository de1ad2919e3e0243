//! Bridge construction and the render tick
//!
//! **Responsibilities:**
//! - DecodeBridge struct definition and initialization
//! - Output surface description for the host
//! - `step`: non-blocking per-tick poll of the frame buffer
//! - Statistics snapshot

use crate::audio::stream::SoundStreamFactory;
use crate::audio::streamer::AudioStreamer;
use crate::engine::MediaEngine;
use crate::error::Result;
use crate::format::{AudioFormat, SurfaceDescription, VideoFormat};
use crate::playback::session::SessionSlot;
use crate::video::frame_buffer::{FrameBuffer, FrameReader, FrameView};
use crate::video::texture::TextureTarget;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info};
use videokit_common::config::BridgeConfig;
use videokit_common::events::{BridgeEvent, EventBus, SessionState};

/// Snapshot of bridge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Frames published by the engine
    pub frames_committed: u64,
    /// Frames dropped for a wrong byte count
    pub frames_dropped: u64,
    /// Frames handed to the host by `step`
    pub frames_rendered: u64,
    /// Audio samples accepted by the sink
    pub samples_written: u64,
    /// Audio samples refused by a full sink
    pub audio_overruns: u64,
    /// Sink streams discarded by flushes
    pub audio_flushes: u64,
}

/// Decode bridge between a callback-driven engine and a polling host
///
/// One bridge drives at most one decode session at a time. Transport calls
/// are safe in every state; with no active session they are no-ops.
pub struct DecodeBridge {
    pub(super) config: BridgeConfig,
    pub(super) video_format: VideoFormat,
    pub(super) audio_format: AudioFormat,
    pub(super) engine: Arc<dyn MediaEngine>,
    /// Runtime the background wait-loops run on
    pub(super) runtime: Handle,

    pub(super) frames: Arc<FrameBuffer>,
    pub(super) reader: FrameReader,
    pub(super) audio: Arc<Mutex<AudioStreamer>>,

    pub(super) slot: Arc<Mutex<SessionSlot>>,
    /// Tag of the session whose callbacks are accepted (0 = none)
    pub(super) active_tag: Arc<AtomicU64>,
    pub(super) next_tag: AtomicU64,

    pub(super) events: EventBus,
}

impl DecodeBridge {
    /// Create a bridge with no session
    ///
    /// `sound` allocates the streaming sinks; `runtime` hosts the per-session
    /// wait-loop.
    pub fn new(
        config: BridgeConfig,
        engine: Arc<dyn MediaEngine>,
        sound: Arc<dyn SoundStreamFactory>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        let video_format = VideoFormat::from(&config.video);
        let audio_format = AudioFormat::from(&config.audio);
        let streamer = AudioStreamer::new(audio_format, config.audio.stream_buffer_secs, sound);

        info!(
            "Decode bridge created: video {}x{} (pitch {}, lines {}), audio {} Hz x{}",
            video_format.width,
            video_format.height,
            video_format.pitch,
            video_format.lines,
            audio_format.sample_rate,
            audio_format.channels
        );

        Ok(Self {
            config,
            video_format,
            audio_format,
            engine,
            runtime,
            frames: Arc::new(FrameBuffer::new(video_format)),
            reader: FrameReader::new(),
            audio: Arc::new(Mutex::new(streamer)),
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            active_tag: Arc::new(AtomicU64::new(0)),
            next_tag: AtomicU64::new(0),
            events: EventBus::default(),
        })
    }

    /// Output surface the host should allocate
    ///
    /// Dimensions are the padded texture size, not the requested resolution.
    pub fn initialize(&self) -> SurfaceDescription {
        let surface = self.video_format.surface();
        debug!(
            "Output surface: {}x{} {:?} (pitch {})",
            surface.width, surface.height, surface.pixel_format, surface.pitch
        );
        surface
    }

    pub fn video_format(&self) -> &VideoFormat {
        &self.video_format
    }

    pub fn audio_format(&self) -> &AudioFormat {
        &self.audio_format
    }

    /// Per-tick poll: the newest unrendered frame, if any
    ///
    /// Never blocks on the engine. The first frame of a session restarts the
    /// sound stream.
    pub fn step(&mut self) -> Option<FrameView<'_>> {
        let view = self.reader.poll(&self.frames)?;

        if view.generation == 1 {
            let mut audio = lock_streamer(&self.audio);
            if self.active_tag.load(Ordering::Acquire) == view.session {
                debug!("First frame of session {}, starting sound", view.session);
                audio.start_output();
            }
        }

        Some(view)
    }

    /// `step`, uploading the new frame into `target`
    ///
    /// Returns whether the texture changed.
    pub fn step_into<T: TextureTarget>(&mut self, target: &mut T) -> bool {
        match self.step() {
            Some(view) => {
                target.set_colors(view.width, view.height, view.data);
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> BridgeStats {
        let audio = lock_streamer(&self.audio).stats();
        BridgeStats {
            frames_committed: self.frames.frames_committed(),
            frames_dropped: self.frames.frames_dropped(),
            frames_rendered: self.reader.frames_rendered(),
            samples_written: audio.samples_written,
            audio_overruns: audio.samples_overrun,
            audio_flushes: audio.flushes,
        }
    }

    /// Subscribe to bridge events
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.lock_slot().state
    }

    /// Tag of the active session, if any
    pub fn session(&self) -> Option<u64> {
        match self.active_tag.load(Ordering::Acquire) {
            0 => None,
            tag => Some(tag),
        }
    }

    pub(super) fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}

pub(super) fn lock_streamer(audio: &Mutex<AudioStreamer>) -> MutexGuard<'_, AudioStreamer> {
    audio.lock().unwrap_or_else(|p| p.into_inner())
}

impl Drop for DecodeBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
