//! Output surface and PCM formats negotiated with the decode engine
//!
//! The engine writes RGBA rows padded to a 32-byte stride and pads the row
//! count the same way, so the texture handed to the host is described by the
//! padded pitch and line count, not by the requested width and height.

use serde::{Deserialize, Serialize};
use videokit_common::config::{AudioConfig, VideoConfig};

/// RGBA: 4 bytes per pixel
pub const BYTES_PER_PIXEL: u32 = 4;

/// Row stride and row count alignment required by the decode engine
pub const ENGINE_ALIGNMENT: u32 = 32;

/// Round up to the next multiple of 32 (values already aligned are unchanged)
pub fn align_to_32(size: u32) -> u32 {
    if size % ENGINE_ALIGNMENT == 0 {
        size
    } else {
        (size / ENGINE_ALIGNMENT + 1) * ENGINE_ALIGNMENT
    }
}

/// Video chroma requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chroma {
    Rgba,
}

impl Chroma {
    /// Four-character code passed to the engine
    pub fn fourcc(&self) -> &'static str {
        match self {
            Chroma::Rgba => "RGBA",
        }
    }
}

/// Pixel format of the texture payload handed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, row-major
    Rgba8,
}

/// Fixed video output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub chroma: Chroma,
    /// Requested width in pixels
    pub width: u32,
    /// Requested height in pixels
    pub height: u32,
    /// Bytes per row: `width * 4` rounded up to a multiple of 32
    pub pitch: u32,
    /// Row count: `height` rounded up to a multiple of 32
    pub lines: u32,
}

impl VideoFormat {
    /// RGBA output at the requested size with engine padding applied
    pub fn rgba(width: u32, height: u32) -> Self {
        Self {
            chroma: Chroma::Rgba,
            width,
            height,
            pitch: align_to_32(width * BYTES_PER_PIXEL),
            lines: align_to_32(height),
        }
    }

    /// Exact byte length of one frame (`pitch * lines`)
    pub fn frame_len(&self) -> usize {
        self.pitch as usize * self.lines as usize
    }

    /// Width of the padded row in pixels
    pub fn texture_width(&self) -> u32 {
        self.pitch / BYTES_PER_PIXEL
    }

    /// Surface the host should allocate for this format
    pub fn surface(&self) -> SurfaceDescription {
        SurfaceDescription {
            width: self.texture_width(),
            height: self.lines,
            pitch: self.pitch,
            pixel_format: PixelFormat::Rgba8,
        }
    }
}

impl From<&VideoConfig> for VideoFormat {
    fn from(config: &VideoConfig) -> Self {
        VideoFormat::rgba(config.width, config.height)
    }
}

/// Texture description returned by `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceDescription {
    /// Padded width in pixels (`pitch / 4`)
    pub width: u32,
    /// Padded height in rows (`lines`)
    pub height: u32,
    /// Bytes per row
    pub pitch: u32,
    pub pixel_format: PixelFormat,
}

/// PCM sample codec requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleCodec {
    /// Signed 16-bit PCM, native endianness, interleaved
    S16N,
}

impl SampleCodec {
    /// Four-character code passed to the engine
    pub fn fourcc(&self) -> &'static str {
        match self {
            SampleCodec::S16N => "S16N",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleCodec::S16N => 2,
        }
    }
}

/// Fixed PCM format
///
/// Must match what the sound sink plays; a mismatch shows up as pitch or
/// speed distortion and is not corrected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub codec: SampleCodec,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn s16(sample_rate: u32, channels: u16) -> Self {
        Self {
            codec: SampleCodec::S16N,
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples in `seconds` of audio
    pub fn samples_for(&self, seconds: f32) -> usize {
        (seconds * self.sample_rate as f32 * self.channels as f32).ceil() as usize
    }
}

impl From<&AudioConfig> for AudioFormat {
    fn from(config: &AudioConfig) -> Self {
        AudioFormat::s16(config.sample_rate, config.channels)
    }
}

/// Position of the sound instance in host space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_32() {
        assert_eq!(align_to_32(0), 0);
        assert_eq!(align_to_32(1), 32);
        assert_eq!(align_to_32(32), 32);
        assert_eq!(align_to_32(33), 64);
        assert_eq!(align_to_32(540), 544);
    }

    #[test]
    fn test_default_output_is_padded() {
        let format = VideoFormat::rgba(960, 540);
        assert_eq!(format.pitch, 3840);
        assert_eq!(format.lines, 544);
        assert_eq!(format.frame_len(), 3840 * 544);

        let surface = format.surface();
        assert_eq!(surface.width, 960);
        assert_eq!(surface.height, 544);
        assert_eq!(surface.pixel_format, PixelFormat::Rgba8);
    }

    #[test]
    fn test_odd_width_pads_row_stride() {
        // 101 * 4 = 404 bytes -> 416
        let format = VideoFormat::rgba(101, 31);
        assert_eq!(format.pitch, 416);
        assert_eq!(format.texture_width(), 104);
        assert_eq!(format.lines, 32);
    }

    #[test]
    fn test_audio_samples_for_duration() {
        let format = AudioFormat::s16(48_000, 1);
        assert_eq!(format.samples_for(4.0), 192_000);
        assert_eq!(AudioFormat::s16(48_000, 2).samples_for(0.5), 48_000);
        assert_eq!(format.codec.fourcc(), "S16N");
    }
}
