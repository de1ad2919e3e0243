//! Video frame handoff and host texture upload

pub mod frame_buffer;
pub mod texture;

pub use frame_buffer::{FrameBuffer, FrameReader, FrameSizeMismatch, FrameView, FrameWriteTarget};
pub use texture::{CpuTexture, TextureTarget};
