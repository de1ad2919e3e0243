//! Synthetic decode engine
//!
//! Stands in for a real decoder in the demo binary and the tests. Each opened
//! source runs one worker thread that paints a moving test pattern into the
//! video sink and emits a sine tone through the audio callbacks, paced in real
//! time at the source frame rate.
//!
//! Source URIs: `synthetic://<name>?duration_ms=10000&fps=30&tone_hz=440`.
//! Every query key is optional. Any other scheme, or the host `unreachable`,
//! fails to open.
//!
//! ## Design
//!
//! The worker follows the serial decoder pattern: control state behind a
//! mutex, a condvar to wake the worker on play/pause/seek/release, and a join
//! on release. Callbacks are invoked from the worker thread only, never while
//! the control lock is held.

use crate::engine::{AudioCallbacks, MediaEngine, MediaHandle, StoppedCallback, VideoSink};
use crate::error::{Error, Result};
use crate::format::{AudioFormat, Chroma, SampleCodec, VideoFormat};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// URI scheme accepted by [`SyntheticEngine`]
pub const SCHEME: &str = "synthetic";

/// Host name that always fails to open
pub const UNREACHABLE_HOST: &str = "unreachable";

const DEFAULT_DURATION_MS: i64 = 10_000;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_TONE_HZ: f64 = 440.0;

/// Tone amplitude relative to full scale
const TONE_LEVEL: f64 = 0.25;

/// Parsed synthetic source description
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSource {
    pub name: String,
    pub duration_ms: i64,
    pub fps: u32,
    pub tone_hz: f64,
}

impl SyntheticSource {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| Error::Open(format!("Invalid URI '{}': {}", uri, e)))?;

        if url.scheme() != SCHEME {
            return Err(Error::Open(format!(
                "Unsupported scheme '{}' in '{}' (expected {}://)",
                url.scheme(),
                uri,
                SCHEME
            )));
        }

        let name = url.host_str().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(Error::Open(format!("Missing source name in '{}'", uri)));
        }
        if name == UNREACHABLE_HOST {
            return Err(Error::Open(format!("Source '{}' is unreachable", uri)));
        }

        let mut source = Self {
            name,
            duration_ms: DEFAULT_DURATION_MS,
            fps: DEFAULT_FPS,
            tone_hz: DEFAULT_TONE_HZ,
        };

        for (key, value) in url.query_pairs() {
            let bad = |e: &dyn std::fmt::Display| Error::Open(format!("Invalid {} '{}': {}", key, value, e));
            match key.as_ref() {
                "duration_ms" => source.duration_ms = value.parse::<i64>().map_err(|e| bad(&e))?,
                "fps" => source.fps = value.parse::<u32>().map_err(|e| bad(&e))?,
                "tone_hz" => source.tone_hz = value.parse::<f64>().map_err(|e| bad(&e))?,
                other => warn!("Ignoring unknown synthetic source parameter '{}'", other),
            }
        }

        if source.duration_ms <= 0 {
            return Err(Error::Open(format!("duration_ms must be positive in '{}'", uri)));
        }
        if source.fps == 0 {
            return Err(Error::Open(format!("fps must be positive in '{}'", uri)));
        }

        Ok(source)
    }

    /// Media time covered by one video frame
    pub fn frame_ms(&self) -> i64 {
        (1000 / self.fps as i64).max(1)
    }
}

/// Engine producing test patterns and tones
#[derive(Debug, Default)]
pub struct SyntheticEngine {
    opened: AtomicU64,
}

impl SyntheticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sources opened so far
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }
}

impl MediaEngine for SyntheticEngine {
    fn open(&self, uri: &str) -> Result<Box<dyn MediaHandle>> {
        let source = SyntheticSource::parse(uri)?;
        let count = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Synthetic engine opened '{}' ({}ms @ {} fps, tone {} Hz, open #{})",
            source.name, source.duration_ms, source.fps, source.tone_hz, count
        );
        Ok(Box::new(SyntheticMedia::new(source)))
    }
}

/// Control state shared with the worker
#[derive(Default)]
struct Control {
    audio_format: Option<AudioFormat>,
    video_format: Option<VideoFormat>,
    video: Option<VideoSink>,
    audio: Option<AudioCallbacks>,
    stopped_callback: Option<Arc<StoppedCallback>>,
    playing: bool,
    time_ms: i64,
    /// A seek happened; buffered audio must be flushed
    flush_pending: bool,
    released: bool,
}

struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    stopped: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// One opened synthetic source
pub struct SyntheticMedia {
    source: SyntheticSource,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyntheticMedia {
    fn new(source: SyntheticSource) -> Self {
        Self {
            source,
            shared: Arc::new(Shared {
                control: Mutex::new(Control::default()),
                wake: Condvar::new(),
                stopped: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    fn spawn_worker(&self, ctl: &Control) -> Result<JoinHandle<()>> {
        let (Some(video_format), Some(audio_format)) = (ctl.video_format, ctl.audio_format) else {
            return Err(Error::InvalidState(
                "Audio and video formats must be set before play".to_string(),
            ));
        };
        let (Some(video), Some(audio)) = (ctl.video.clone(), ctl.audio.clone()) else {
            return Err(Error::InvalidState(
                "Audio and video callbacks must be set before play".to_string(),
            ));
        };

        let worker = Worker {
            source: self.source.clone(),
            shared: Arc::clone(&self.shared),
            video_format,
            audio_format,
            video,
            audio,
        };

        thread::Builder::new()
            .name(format!("synthetic-{}", self.source.name))
            .spawn(move || worker.run())
            .map_err(|e| Error::Engine(format!("Failed to spawn decode worker: {}", e)))
    }
}

impl MediaHandle for SyntheticMedia {
    fn set_audio_format(&self, format: &AudioFormat) -> Result<()> {
        if format.codec != SampleCodec::S16N {
            return Err(Error::Format(format!("Unsupported sample codec {}", format.codec.fourcc())));
        }
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(Error::Format(format!(
                "Invalid audio format: {} Hz, {} channels",
                format.sample_rate, format.channels
            )));
        }
        self.shared.lock().audio_format = Some(*format);
        debug!(
            "Audio format: {} {} Hz x{}",
            format.codec.fourcc(),
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    fn set_video_format(&self, format: &VideoFormat) -> Result<()> {
        if format.chroma != Chroma::Rgba {
            return Err(Error::Format(format!("Unsupported chroma {}", format.chroma.fourcc())));
        }
        if format.width == 0 || format.height == 0 || format.pitch < format.width * 4 || format.lines < format.height {
            return Err(Error::Format(format!(
                "Invalid video format: {}x{} pitch={} lines={}",
                format.width, format.height, format.pitch, format.lines
            )));
        }
        self.shared.lock().video_format = Some(*format);
        debug!(
            "Video format: {} {}x{} pitch={} lines={}",
            format.chroma.fourcc(),
            format.width,
            format.height,
            format.pitch,
            format.lines
        );
        Ok(())
    }

    fn set_video_callbacks(&self, sink: VideoSink) {
        self.shared.lock().video = Some(sink);
    }

    fn set_audio_callbacks(&self, callbacks: AudioCallbacks) {
        self.shared.lock().audio = Some(callbacks);
    }

    fn on_stopped(&self, callback: StoppedCallback) {
        let callback = Arc::new(callback);
        self.shared.lock().stopped_callback = Some(Arc::clone(&callback));
        if self.shared.stopped.load(Ordering::Acquire) {
            callback();
        }
    }

    fn play(&self) -> Result<()> {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(Error::Engine(format!("'{}' already stopped", self.source.name)));
        }

        let mut ctl = self.shared.lock();
        if ctl.released {
            return Err(Error::Engine(format!("'{}' already released", self.source.name)));
        }

        let mut worker = self.worker.lock().unwrap_or_else(|p| p.into_inner());
        if worker.is_none() {
            *worker = Some(self.spawn_worker(&ctl)?);
            debug!("Decode worker started for '{}'", self.source.name);
        }

        ctl.playing = true;
        self.shared.wake.notify_all();
        Ok(())
    }

    fn pause(&self) {
        let mut ctl = self.shared.lock();
        if ctl.playing {
            ctl.playing = false;
            self.shared.wake.notify_all();
        }
    }

    fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }

    fn has_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    fn time_ms(&self) -> i64 {
        self.shared.lock().time_ms
    }

    fn set_time_ms(&self, ms: i64) {
        let target = ms.clamp(0, self.source.duration_ms);
        let mut ctl = self.shared.lock();
        if ctl.time_ms == target {
            return;
        }
        debug!("Seek '{}': {}ms -> {}ms", self.source.name, ctl.time_ms, target);
        ctl.time_ms = target;
        ctl.flush_pending = true;
        self.shared.wake.notify_all();
    }

    fn length_ms(&self) -> i64 {
        self.source.duration_ms
    }

    fn release(&self) {
        {
            let mut ctl = self.shared.lock();
            if ctl.released {
                return;
            }
            ctl.released = true;
            ctl.playing = false;
            ctl.video = None;
            ctl.audio = None;
            ctl.stopped_callback = None;
            self.shared.wake.notify_all();
        }

        let handle = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(handle) = handle {
            // Joining from the worker itself would deadlock
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("Decode worker for '{}' panicked", self.source.name);
            }
        }
        debug!("Released synthetic source '{}'", self.source.name);
    }
}

impl Drop for SyntheticMedia {
    fn drop(&mut self) {
        self.release();
    }
}

/// What the worker does next
enum Step {
    Exit,
    Flush(i64),
    Announce { playing: bool, time_ms: i64 },
    Frame(i64),
    EndOfStream(i64),
}

struct Worker {
    source: SyntheticSource,
    shared: Arc<Shared>,
    video_format: VideoFormat,
    audio_format: AudioFormat,
    video: VideoSink,
    audio: AudioCallbacks,
}

impl Worker {
    fn run(self) {
        let frame_interval = Duration::from_millis(self.source.frame_ms() as u64);
        let mut announced_playing = false;
        let mut next_due = Instant::now();
        let mut pcm = Vec::new();

        loop {
            let step = self.next_step(announced_playing, next_due);
            match step {
                Step::Exit => break,
                Step::Flush(time_ms) => {
                    self.audio.flush(time_ms);
                    next_due = Instant::now();
                }
                Step::Announce { playing, time_ms } => {
                    if playing {
                        self.audio.resume(time_ms);
                    } else {
                        self.audio.pause(time_ms);
                    }
                    announced_playing = playing;
                    next_due = Instant::now();
                }
                Step::Frame(time_ms) => {
                    self.paint_frame(time_ms);
                    self.emit_tone(time_ms, &mut pcm);
                    self.advance(time_ms);
                    next_due += frame_interval;
                }
                Step::EndOfStream(time_ms) => {
                    self.audio.drain();
                    self.finish(time_ms);
                    break;
                }
            }
        }

        debug!("Decode worker for '{}' exiting", self.source.name);
    }

    fn next_step(&self, announced_playing: bool, next_due: Instant) -> Step {
        let mut ctl = self.shared.lock();
        loop {
            if ctl.released {
                return Step::Exit;
            }
            if ctl.flush_pending {
                ctl.flush_pending = false;
                return Step::Flush(ctl.time_ms);
            }
            if ctl.playing != announced_playing {
                return Step::Announce {
                    playing: ctl.playing,
                    time_ms: ctl.time_ms,
                };
            }
            if ctl.playing {
                if ctl.time_ms >= self.source.duration_ms {
                    return Step::EndOfStream(ctl.time_ms);
                }
                let now = Instant::now();
                if now >= next_due {
                    return Step::Frame(ctl.time_ms);
                }
                ctl = self
                    .shared
                    .wake
                    .wait_timeout(ctl, next_due - now)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|p| p.into_inner().0);
            } else {
                ctl = self.shared.wake.wait(ctl).unwrap_or_else(|p| p.into_inner());
            }
        }
    }

    /// Moving vertical bar over a horizontal gradient
    fn paint_frame(&self, time_ms: i64) {
        let Some(mut frame) = self.video.lock() else {
            return;
        };

        let format = &self.video_format;
        let pitch = format.pitch as usize;
        let width = format.width as usize;
        let bar_x = ((time_ms / 10) as usize) % width;
        let bar_w = (width / 16).max(1);

        for (y, row) in frame.chunks_mut(pitch).enumerate() {
            let visible_row = y < format.height as usize;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let rgba = if !visible_row || x >= width {
                    [0, 0, 0, 0]
                } else if x >= bar_x && x < bar_x + bar_w {
                    [255, 255, 255, 255]
                } else {
                    [(x * 255 / width) as u8, (y * 255 / format.height as usize) as u8, 96, 255]
                };
                px.copy_from_slice(&rgba);
            }
        }

        let written = frame.len();
        frame.display(written);
    }

    fn emit_tone(&self, time_ms: i64, pcm: &mut Vec<u8>) {
        let rate = self.audio_format.sample_rate as i64;
        let channels = self.audio_format.channels as usize;
        let first = time_ms * rate / 1000;
        let last = (time_ms + self.source.frame_ms()) * rate / 1000;
        let count = (last - first).max(0) as usize;

        pcm.clear();
        pcm.reserve(count * channels * 2);
        for n in first..first + count as i64 {
            let phase = TAU * self.source.tone_hz * n as f64 / rate as f64;
            let sample = (phase.sin() * TONE_LEVEL * i16::MAX as f64) as i16;
            for _ in 0..channels {
                pcm.extend_from_slice(&sample.to_ne_bytes());
            }
        }

        self.audio.play(pcm, count as u32, time_ms);
    }

    fn advance(&self, time_ms: i64) {
        let mut ctl = self.shared.lock();
        // A seek during this frame wins
        if ctl.time_ms == time_ms && !ctl.flush_pending {
            ctl.time_ms = (time_ms + self.source.frame_ms()).min(self.source.duration_ms);
        }
    }

    fn finish(&self, time_ms: i64) {
        let callback = {
            let mut ctl = self.shared.lock();
            ctl.playing = false;
            self.shared.stopped.store(true, Ordering::Release);
            ctl.stopped_callback.clone()
        };
        info!("Synthetic source '{}' reached end at {}ms", self.source.name, time_ms);
        if let Some(callback) = callback {
            callback();
        }
    }
}
