//! Host texture seam
//!
//! The GPU texture belongs to the host's rendering framework. The bridge only
//! pushes RGBA rows into whatever implements [`TextureTarget`].

use crate::format::SurfaceDescription;

/// Destination for a rendered frame
pub trait TextureTarget {
    /// Replace the texture contents with `rgba` (`width * height * 4` bytes)
    fn set_colors(&mut self, width: u32, height: u32, rgba: &[u8]);
}

/// CPU-side texture, used by the headless host and in tests
#[derive(Debug, Clone, Default)]
pub struct CpuTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    /// Number of uploads received
    pub uploads: u64,
}

impl CpuTexture {
    pub fn new(surface: &SurfaceDescription) -> Self {
        Self {
            width: surface.width,
            height: surface.height,
            pixels: vec![0; surface.pitch as usize * surface.height as usize],
            uploads: 0,
        }
    }

    /// RGBA of the pixel at (x, y), if inside the texture
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(offset..offset + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

impl TextureTarget for CpuTexture {
    fn set_colors(&mut self, width: u32, height: u32, rgba: &[u8]) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.extend_from_slice(rgba);
        self.uploads += 1;
    }
}
