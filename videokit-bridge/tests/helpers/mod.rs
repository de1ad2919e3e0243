//! Test helper modules for videokit-bridge integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedEngine: a decode engine whose callbacks are driven by the test
//! - EventStream: bridge event subscription with timeouts
//! - wait_until: poll a condition with a deadline

#![allow(dead_code, unused_imports)]

pub mod events;
pub mod scripted_engine;

pub use events::{wait_until, EventStream};
pub use scripted_engine::{ScriptedEngine, ScriptedMedia};

use std::sync::Arc;
use videokit_bridge::audio::{RingStreamFactory, SoundTap};
use videokit_bridge::engine::MediaEngine;
use videokit_bridge::{BridgeConfig, DecodeBridge};

/// Small frames and a low sample rate keep the tests fast
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.video.width = 16;
    config.video.height = 8;
    config.audio.sample_rate = 1000;
    config.audio.channels = 1;
    config.audio.stream_buffer_secs = 1.0;
    config.session.poll_interval_ms = 10;
    config
}

/// Bridge over `engine` with a ring-backed sound sink; returns the sink's tap
pub fn bridge_with(engine: Arc<dyn MediaEngine>, config: BridgeConfig) -> (DecodeBridge, SoundTap) {
    let sound = Arc::new(RingStreamFactory::new(config.audio.sample_rate, config.audio.channels));
    let tap = sound.tap();
    let bridge = DecodeBridge::new(config, engine, sound, tokio::runtime::Handle::current())
        .expect("Failed to create bridge");
    (bridge, tap)
}

/// Read up to `max` real samples from the tap
pub fn drain_tap(tap: &SoundTap, max: usize) -> Vec<f32> {
    let mut out = vec![0.0; max];
    let read = tap.fill(&mut out);
    out.truncate(read);
    out
}
