//! CPU-side output image the software path tracer tone-maps into
//! (`SPEC_FULL.md` §4.H: "Tone-map into the output `Image2D`"). Stored at
//! half precision, matching `CPURenderer`'s "float-16 image" that later
//! gets uploaded to a texture.

use glam::Vec4;
use half::f16;

#[derive(Debug, Clone)]
pub struct Image2D {
    width: u32,
    height: u32,
    pixels: Vec<[f16; 4]>,
}

impl Image2D {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[f16::ZERO; 4]; (width as usize) * (height as usize)],
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resizes in place, discarding contents, if the dimensions changed.
    pub fn resize_if_needed(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![[f16::ZERO; 4]; (width as usize) * (height as usize)];
    }

    pub fn set(&mut self, x: u32, y: u32, rgba: Vec4) {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        self.pixels[idx] = [f16::from_f32(rgba.x), f16::from_f32(rgba.y), f16::from_f32(rgba.z), f16::from_f32(rgba.w)];
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        let idx = (y as usize) * (self.width as usize) + x as usize;
        let p = self.pixels[idx];
        Vec4::new(p[0].to_f32(), p[1].to_f32(), p[2].to_f32(), p[3].to_f32())
    }

    #[must_use]
    pub fn as_half_slice(&self) -> &[[f16; 4]] {
        &self.pixels
    }

    /// Raw bytes for upload into an RHI texture staging buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 8);
        for p in &self.pixels {
            for c in p {
                bytes.extend_from_slice(&c.to_bits().to_le_bytes());
            }
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_half_precision() {
        let mut image = Image2D::new(4, 4);
        image.set(1, 2, Vec4::new(0.5, 0.25, 0.125, 1.0));
        let got = image.get(1, 2);
        assert!((got.x - 0.5).abs() < 1e-3);
        assert!((got.y - 0.25).abs() < 1e-3);
        assert!((got.z - 0.125).abs() < 1e-3);
        assert!((got.w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn resize_clears_contents() {
        let mut image = Image2D::new(2, 2);
        image.set(0, 0, Vec4::ONE);
        image.resize_if_needed(3, 3);
        assert_eq!(image.width(), 3);
        assert_eq!(image.get(0, 0), Vec4::ZERO);
    }
}
