//! # VideoKit Decode Bridge (videokit-bridge)
//!
//! Bridges a push-style, callback-driven media decoder to a pull-style render
//! host that polls once per frame.
//!
//! **Purpose:** Own the decode session lifecycle, hand decoded RGBA frames to
//! the render tick without tearing, stream converted PCM into a sound sink, and
//! expose transport controls (play, pause, time, length, seek) that stay
//! consistent while frames and samples keep arriving.
//!
//! **Architecture:**
//! - [`video`]: single fixed-size frame buffer + generation counter
//! - [`audio`]: S16 to f32 conversion, streaming sink lifecycle, ring-backed sink
//! - [`engine`]: decoder seam (traits + session-tagged callbacks) and a
//!   synthetic reference engine
//! - [`playback`]: [`DecodeBridge`] session state machine and transport surface

pub mod audio;
pub mod engine;
pub mod error;
pub mod format;
pub mod playback;
pub mod video;

pub use error::{Error, Result};
pub use format::{AudioFormat, SurfaceDescription, Vec3, VideoFormat};
pub use playback::{BridgeStats, DecodeBridge};
pub use videokit_common::{BridgeConfig, BridgeEvent, SessionState};
