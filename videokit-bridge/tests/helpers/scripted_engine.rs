//! Decode engine driven by the test
//!
//! Nothing happens on its own: the test delivers frames, samples and the
//! stopped signal through the callbacks the bridge registered. Callbacks stay
//! reachable after release, so a test can play a misbehaving engine that
//! keeps calling into a torn-down session.

use std::sync::{Arc, Barrier, Mutex, MutexGuard};
use videokit_bridge::engine::{AudioCallbacks, MediaEngine, MediaHandle, StoppedCallback, VideoSink};
use videokit_bridge::{AudioFormat, Error, Result, VideoFormat};

/// Host name that fails to open
pub const UNREACHABLE: &str = "unreachable";

#[derive(Default)]
struct ScriptedState {
    audio_format: Option<AudioFormat>,
    video_format: Option<VideoFormat>,
    video: Option<VideoSink>,
    audio: Option<AudioCallbacks>,
    stopped_callback: Option<Arc<StoppedCallback>>,
    playing: bool,
    stopped: bool,
    released: bool,
    time_ms: i64,
    seeks: Vec<i64>,
}

/// One opened scripted source
pub struct ScriptedMedia {
    pub uri: String,
    length_ms: i64,
    state: Mutex<ScriptedState>,
}

impl ScriptedMedia {
    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn video_sink(&self) -> VideoSink {
        self.state().video.clone().expect("video callbacks not registered")
    }

    pub fn audio(&self) -> AudioCallbacks {
        self.state().audio.clone().expect("audio callbacks not registered")
    }

    pub fn video_format(&self) -> Option<VideoFormat> {
        self.state().video_format
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.state().audio_format
    }

    /// Lock, fill with `fill`, display a full frame; the new generation if accepted
    pub fn deliver_frame(&self, fill: u8) -> Option<u64> {
        let sink = self.video_sink();
        let mut frame = sink.lock()?;
        frame.fill(fill);
        let written = frame.len();
        frame.display(written)
    }

    /// Display a frame reporting only `written` bytes
    pub fn deliver_short_frame(&self, written: usize) -> Option<u64> {
        let sink = self.video_sink();
        let frame = sink.lock()?;
        frame.display(written)
    }

    /// Deliver mono S16 samples at the current time
    pub fn deliver_samples(&self, samples: &[i16]) {
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        let pts = self.state().time_ms;
        self.audio().play(&pcm, samples.len() as u32, pts);
    }

    /// End of stream: mark stopped and fire the stopped signal
    pub fn finish(&self) {
        let callback = {
            let mut state = self.state();
            state.stopped = true;
            state.playing = false;
            state.stopped_callback.clone()
        };
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Mark stopped without firing the signal (exercises the poll fallback)
    pub fn finish_silently(&self) {
        let mut state = self.state();
        state.stopped = true;
        state.playing = false;
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    pub fn playing(&self) -> bool {
        self.state().playing
    }

    /// Every `set_time_ms` the bridge issued, in order
    pub fn seeks(&self) -> Vec<i64> {
        self.state().seeks.clone()
    }
}

/// Boxed handle given to the bridge; the test keeps the `Arc`
struct ScriptedHandle(Arc<ScriptedMedia>);

impl MediaHandle for ScriptedHandle {
    fn set_audio_format(&self, format: &AudioFormat) -> Result<()> {
        self.0.state().audio_format = Some(*format);
        Ok(())
    }

    fn set_video_format(&self, format: &VideoFormat) -> Result<()> {
        self.0.state().video_format = Some(*format);
        Ok(())
    }

    fn set_video_callbacks(&self, sink: VideoSink) {
        self.0.state().video = Some(sink);
    }

    fn set_audio_callbacks(&self, callbacks: AudioCallbacks) {
        self.0.state().audio = Some(callbacks);
    }

    fn on_stopped(&self, callback: StoppedCallback) {
        self.0.state().stopped_callback = Some(Arc::new(callback));
    }

    fn play(&self) -> Result<()> {
        let mut state = self.0.state();
        if state.released {
            return Err(Error::Engine("released".to_string()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.0.state().playing = false;
    }

    fn is_playing(&self) -> bool {
        self.0.state().playing
    }

    fn has_stopped(&self) -> bool {
        self.0.state().stopped
    }

    fn time_ms(&self) -> i64 {
        self.0.state().time_ms
    }

    fn set_time_ms(&self, ms: i64) {
        let mut state = self.0.state();
        state.time_ms = ms;
        state.seeks.push(ms);
    }

    fn length_ms(&self) -> i64 {
        self.0.length_ms
    }

    fn release(&self) {
        let mut state = self.0.state();
        state.released = true;
        state.playing = false;
    }
}

/// Holds one `open` call until the test lets it continue
pub struct OpenGate {
    opening: Barrier,
    proceed: Barrier,
}

impl OpenGate {
    fn new() -> Self {
        Self {
            opening: Barrier::new(2),
            proceed: Barrier::new(2),
        }
    }

    /// Block until the gated `open` has been entered
    pub fn wait_opening(&self) {
        self.opening.wait();
    }

    /// Let the gated `open` finish
    pub fn proceed(&self) {
        self.proceed.wait();
    }

    fn hold(&self) {
        self.opening.wait();
        self.proceed.wait();
    }
}

/// Engine handing out [`ScriptedMedia`]
///
/// Accepts `scripted://<name>`; the host `unreachable` fails to open.
pub struct ScriptedEngine {
    length_ms: i64,
    opened: Mutex<Vec<Arc<ScriptedMedia>>>,
    gate: Mutex<Option<Arc<OpenGate>>>,
}

impl ScriptedEngine {
    pub fn new(length_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            length_ms,
            opened: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        })
    }

    /// Make the next `open` block inside the engine until released
    pub fn gate_next_open(&self) -> Arc<OpenGate> {
        let gate = Arc::new(OpenGate::new());
        *self.gate.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::clone(&gate));
        gate
    }

    /// The source opened from `uri`
    pub fn media_for(&self, uri: &str) -> Option<Arc<ScriptedMedia>> {
        let opened = self.opened.lock().unwrap_or_else(|p| p.into_inner());
        opened.iter().find(|media| media.uri == uri).cloned()
    }

    /// The `index`th source opened
    pub fn media(&self, index: usize) -> Arc<ScriptedMedia> {
        let opened = self.opened.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&opened[index])
    }

    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl MediaEngine for ScriptedEngine {
    fn open(&self, uri: &str) -> Result<Box<dyn MediaHandle>> {
        let name = uri
            .strip_prefix("scripted://")
            .ok_or_else(|| Error::Open(format!("unsupported uri {}", uri)))?;
        if name == UNREACHABLE {
            return Err(Error::Open(format!("{} is unreachable", uri)));
        }

        let gate = self.gate.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(gate) = gate {
            gate.hold();
        }

        let media = Arc::new(ScriptedMedia {
            uri: uri.to_string(),
            length_ms: self.length_ms,
            state: Mutex::new(ScriptedState::default()),
        });
        self.opened
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(Arc::clone(&media));
        Ok(Box::new(ScriptedHandle(media)))
    }
}
