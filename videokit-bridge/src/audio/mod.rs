//! Audio conversion and streaming
//!
//! Decoder PCM arrives as S16 native-endian bytes, is scaled to f32, and is
//! written into a streaming sound sink that plays while more samples arrive.

pub mod convert;
pub mod output;
pub mod stream;
pub mod streamer;

pub use stream::{RingBufferStats, RingSoundStream, RingStreamFactory, SoundStream, SoundStreamFactory, SoundTap};
pub use streamer::{AudioStreamer, StreamerStats};
