//! Normalized single-channel image used by every analysis stage.
//!
//! All supported pixel formats (8/16-bit gray, RGB, any `DynamicImage`) are
//! converted once at ingestion into `f32` intensities in `[0, 1]`, so the
//! geometry code downstream never branches on sample depth.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};

use crate::error::{AnalysisError, Result};

/// Backing buffer type: one `f32` intensity per pixel.
pub type LumaF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Row-major 3×3 Scharr kernels for `imageproc::filter::filter3x3`.
const SCHARR_X: [f32; 9] = [-3.0, 0.0, 3.0, -10.0, 0.0, 10.0, -3.0, 0.0, 3.0];
const SCHARR_Y: [f32; 9] = [-3.0, -10.0, -3.0, 0.0, 0.0, 0.0, 3.0, 10.0, 3.0];

/// Immutable normalized intensity image.
#[derive(Debug, Clone)]
pub struct Image {
    buf: LumaF32Image,
}

/// Per-pixel Scharr gradient buffers (row-major, same size as the image).
#[derive(Debug, Clone)]
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub gx: Vec<f32>,
    pub gy: Vec<f32>,
}

impl Gradients {
    /// Largest gradient magnitude in the buffer.
    pub fn max_magnitude(&self) -> f32 {
        self.gx
            .iter()
            .zip(self.gy.iter())
            .map(|(&gx, &gy)| gx * gx + gy * gy)
            .fold(0.0f32, f32::max)
            .sqrt()
    }
}

impl Image {
    /// Wrap normalized samples (row-major, `width * height` values in `[0, 1]`).
    pub fn from_raw(width: u32, height: u32, samples: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnalysisError::InvalidImage(format!(
                "zero-sized image {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(AnalysisError::InvalidImage(format!(
                "expected {expected} samples for {width}x{height}, got {}",
                samples.len()
            )));
        }
        if samples.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidImage(
                "non-finite sample value".to_string(),
            ));
        }
        let buf = LumaF32Image::from_raw(width, height, samples).ok_or_else(|| {
            AnalysisError::InvalidImage("buffer does not match dimensions".to_string())
        })?;
        Ok(Self { buf })
    }

    /// Convert an 8-bit grayscale image.
    pub fn from_gray8(img: &GrayImage) -> Self {
        const INV_255: f32 = 1.0 / 255.0;
        let (w, h) = img.dimensions();
        let data = img.as_raw().iter().map(|&v| v as f32 * INV_255).collect();
        Self::from_parts(w, h, data)
    }

    /// Convert a 16-bit grayscale image.
    pub fn from_gray16(img: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Self {
        const INV_65535: f32 = 1.0 / 65535.0;
        let (w, h) = img.dimensions();
        let data = img.as_raw().iter().map(|&v| v as f32 * INV_65535).collect();
        Self::from_parts(w, h, data)
    }

    /// Convert an 8-bit RGB image using Rec. 601 luma weights.
    pub fn from_rgb8(img: &RgbImage) -> Self {
        const INV_255: f32 = 1.0 / 255.0;
        let (w, h) = img.dimensions();
        let data = img
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) * INV_255
            })
            .collect();
        Self::from_parts(w, h, data)
    }

    /// Convert any decoded image (any depth, any colour layout).
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let luma = img.to_luma32f();
        let (w, h) = luma.dimensions();
        let data = luma.into_raw().into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
        Self::from_parts(w, h, data)
    }

    fn from_parts(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        let buf = LumaF32Image::from_raw(width, height, data)
            .unwrap_or_else(|| LumaF32Image::new(width, height));
        Self { buf }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.buf.dimensions()
    }

    /// Row-major normalized samples.
    #[inline]
    pub fn as_raw(&self) -> &[f32] {
        self.buf.as_raw()
    }

    /// Underlying `image` buffer.
    pub fn buffer(&self) -> &LumaF32Image {
        &self.buf
    }

    /// Sample at integer coordinates, `None` when out of bounds.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<f32> {
        let (w, h) = self.dimensions();
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            return None;
        }
        Some(self.buf.as_raw()[y as usize * w as usize + x as usize])
    }

    /// Nearest-neighbour sample at a sub-pixel position.
    #[inline]
    pub fn nearest(&self, x: f32, y: f32) -> Option<f32> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        self.get(x.round() as i64, y.round() as i64)
    }

    /// Bilinear sample at a sub-pixel position, `None` when out of bounds.
    #[inline]
    pub fn bilinear(&self, x: f32, y: f32) -> Option<f32> {
        let (w, h) = self.dimensions();
        if w < 2 || h < 2 || !(x >= 0.0) || !(y >= 0.0) {
            return None;
        }
        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        if x0 >= w - 1 || y0 >= h - 1 {
            return None;
        }
        Some(self.bilinear_at(x0 as usize, y0 as usize, x - x0 as f32, y - y0 as f32))
    }

    /// Bilinear sample with border replication; always returns a value.
    #[inline]
    pub fn bilinear_clamped(&self, x: f32, y: f32) -> f32 {
        let (w, h) = self.dimensions();
        if w < 2 || h < 2 {
            return self.as_raw().first().copied().unwrap_or(0.0);
        }
        let xc = if x.is_finite() { x.clamp(0.0, (w - 1) as f32) } else { 0.0 };
        let yc = if y.is_finite() { y.clamp(0.0, (h - 1) as f32) } else { 0.0 };
        let x0 = (xc.floor() as usize).min(w as usize - 2);
        let y0 = (yc.floor() as usize).min(h as usize - 2);
        self.bilinear_at(x0, y0, xc - x0 as f32, yc - y0 as f32)
    }

    #[inline]
    fn bilinear_at(&self, x0: usize, y0: usize, fx: f32, fy: f32) -> f32 {
        let stride = self.width() as usize;
        let raw = self.buf.as_raw();
        let idx00 = y0 * stride + x0;
        let idx10 = idx00 + 1;
        let idx01 = idx00 + stride;
        let idx11 = idx01 + 1;
        (1.0 - fx) * (1.0 - fy) * raw[idx00]
            + fx * (1.0 - fy) * raw[idx10]
            + (1.0 - fx) * fy * raw[idx01]
            + fx * fy * raw[idx11]
    }

    /// Gaussian-smoothed copy. Non-positive sigma returns an unmodified copy.
    pub fn gaussian_blur(&self, sigma: f32) -> Image {
        if !(sigma > 0.0) || self.width() == 0 || self.height() == 0 {
            return self.clone();
        }
        Image {
            buf: imageproc::filter::gaussian_blur_f32(&self.buf, sigma),
        }
    }

    /// Scharr gradients with border clamping.
    pub fn gradients(&self) -> Gradients {
        let gx = imageproc::filter::filter3x3::<_, f32, f32>(&self.buf, &SCHARR_X);
        let gy = imageproc::filter::filter3x3::<_, f32, f32>(&self.buf, &SCHARR_Y);
        Gradients {
            width: self.width() as usize,
            height: self.height() as usize,
            gx: gx.into_raw(),
            gy: gy.into_raw(),
        }
    }

    /// Copy of the rectangle `[x, x + width) × [y, y + height)`, clipped to
    /// the image bounds.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Image {
        let (w, h) = self.dimensions();
        let x0 = x.min(w);
        let y0 = y.min(h);
        let x1 = x.saturating_add(width).min(w);
        let y1 = y.saturating_add(height).min(h);
        let stride = w as usize;
        let raw = self.buf.as_raw();
        let mut data = Vec::with_capacity((x1 - x0) as usize * (y1 - y0) as usize);
        for yy in y0 as usize..y1 as usize {
            data.extend_from_slice(&raw[yy * stride + x0 as usize..yy * stride + x1 as usize]);
        }
        Self::from_parts(x1 - x0, y1 - y0, data)
    }

    /// Area-averaging downsample by an integer factor (factor 1 is a copy).
    pub fn downsample(&self, factor: u32) -> Image {
        let factor = factor.max(1);
        if factor == 1 {
            return self.clone();
        }
        let (w, h) = self.dimensions();
        let nw = (w / factor).max(1);
        let nh = (h / factor).max(1);
        let stride = w as usize;
        let raw = self.buf.as_raw();
        let mut data = Vec::with_capacity(nw as usize * nh as usize);
        for oy in 0..nh {
            let y0 = (oy * factor) as usize;
            let y1 = ((oy + 1) * factor).min(h) as usize;
            for ox in 0..nw {
                let x0 = (ox * factor) as usize;
                let x1 = ((ox + 1) * factor).min(w) as usize;
                let mut sum = 0.0f32;
                for y in y0..y1 {
                    sum += raw[y * stride + x0..y * stride + x1].iter().sum::<f32>();
                }
                let n = ((y1 - y0) * (x1 - x0)).max(1);
                data.push(sum / n as f32);
            }
        }
        Self::from_parts(nw, nh, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilinear_sample() {
        let mut img = GrayImage::new(4, 4);
        img.put_pixel(1, 1, Luma([100]));
        img.put_pixel(2, 1, Luma([200]));
        img.put_pixel(1, 2, Luma([100]));
        img.put_pixel(2, 2, Luma([200]));
        let img = Image::from_gray8(&img);
        let val = img.bilinear(1.5, 1.5).unwrap();
        let expected = 150.0 / 255.0;
        assert!(
            (val - expected).abs() < 0.01,
            "bilinear at midpoint should be ~{:.3}, got {:.3}",
            expected,
            val
        );
        assert!(img.bilinear(3.5, 1.0).is_none());
        assert!(img.bilinear(-0.1, 1.0).is_none());
    }

    #[test]
    fn depth_conversions_agree() {
        let g8 = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let g16 = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(2, 1, vec![0, 65535]).unwrap();
        let rgb = RgbImage::from_raw(2, 1, vec![0, 0, 0, 255, 255, 255]).unwrap();
        for img in [
            Image::from_gray8(&g8),
            Image::from_gray16(&g16),
            Image::from_rgb8(&rgb),
            Image::from_dynamic(&DynamicImage::ImageLuma8(g8.clone())),
        ] {
            assert!(img.as_raw()[0].abs() < 1e-6);
            assert!((img.as_raw()[1] - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn from_raw_rejects_bad_buffers() {
        assert!(Image::from_raw(0, 4, Vec::new()).is_err());
        assert!(Image::from_raw(2, 2, vec![0.0; 3]).is_err());
        assert!(Image::from_raw(1, 1, vec![f32::NAN]).is_err());
        assert!(Image::from_raw(2, 1, vec![0.1, 0.2]).is_ok());
    }

    #[test]
    fn scharr_gradient_points_toward_brighter_side() {
        let mut data = vec![0.0f32; 8 * 8];
        for y in 0..8 {
            for x in 4..8 {
                data[y * 8 + x] = 1.0;
            }
        }
        let img = Image::from_raw(8, 8, data).unwrap();
        let g = img.gradients();
        let idx = 4 * 8 + 4;
        assert!(g.gx[idx] > 0.0);
        assert!(g.gy[idx].abs() < 1e-6);
        // Step of 1.0 across a full Scharr kernel: 3 + 10 + 3.
        assert!((g.gx[idx] - 16.0).abs() < 1e-4, "gx {}", g.gx[idx]);
        assert!((g.max_magnitude() - 16.0).abs() < 1e-4);
        // Borders replicate, so the flat left column has no response.
        assert!(g.gx[4 * 8].abs() < 1e-6);

        let transposed: Vec<f32> = (0..64).map(|i| if i / 8 >= 4 { 1.0 } else { 0.0 }).collect();
        let g = Image::from_raw(8, 8, transposed).unwrap().gradients();
        assert!(g.gy[idx] > 0.0);
        assert!(g.gx[idx].abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn mismatched_parts_fail_loudly() {
        Image::from_parts(3, 3, vec![0.0; 4]);
    }

    #[test]
    fn downsample_averages_blocks() {
        let img = Image::from_raw(4, 2, vec![0.0, 1.0, 0.5, 0.5, 1.0, 0.0, 0.5, 0.5]).unwrap();
        let small = img.downsample(2);
        assert_eq!(small.dimensions(), (2, 1));
        assert!((small.as_raw()[0] - 0.5).abs() < 1e-6);
        assert!((small.as_raw()[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn crop_is_clipped_to_bounds() {
        let img = Image::from_raw(3, 3, (0..9).map(|v| v as f32 / 8.0).collect()).unwrap();
        let c = img.crop(1, 1, 5, 5);
        assert_eq!(c.dimensions(), (2, 2));
        assert!((c.as_raw()[0] - 4.0 / 8.0).abs() < 1e-6);
        assert!((c.as_raw()[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clamped_sampling_replicates_border() {
        let img = Image::from_raw(2, 2, vec![0.2, 0.4, 0.6, 0.8]).unwrap();
        assert!((img.bilinear_clamped(-5.0, -5.0) - 0.2).abs() < 1e-6);
        assert!((img.bilinear_clamped(10.0, 10.0) - 0.8).abs() < 1e-6);
    }
}
