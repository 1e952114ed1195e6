//! Statistical signature of one frame.
//!
//! Every measurement samples the same fixed stride, so numbers from different
//! reads of the same surface size are directly comparable.

use serde::Serialize;

use super::readback::PixelBuffer;

/// Roughly how many pixels a metrics pass looks at, independent of resolution.
pub const TARGET_SAMPLES: usize = 1000;

pub fn sample_stride(pixel_count: usize) -> usize {
    (pixel_count / TARGET_SAMPLES).max(1)
}

/// 6 bits per channel.
pub fn quantized_key(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32 / 4) << 12) | ((g as u32 / 4) << 6) | (b as u32 / 4)
}

pub fn luma(r: f64, g: f64, b: f64) -> f64 {
    0.299 * r + 0.587 * g + 0.114 * b
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameMetrics {
    pub width: u32,
    pub height: u32,
    pub sample_count: usize,
    /// Normalized to [0,1].
    pub mean_rgb: [f64; 3],
    pub std_rgb: [f64; 3],
    pub mean_alpha: f64,
    pub luma_mean: f64,
    pub luma_variance: f64,
    pub unique_sampled_colors: usize,
    pub is_all_zero: bool,
    pub is_all_transparent: bool,
    pub is_essentially_blank: bool,
    pub is_monochrome: bool,
}

impl FrameMetrics {
    pub fn from_pixels(buf: &PixelBuffer) -> Self {
        let pixels = buf.pixel_count();
        let stride = sample_stride(pixels);

        let mut sum = [0f64; 3];
        let mut sum_sq = [0f64; 3];
        let mut sum_alpha = 0f64;
        let mut sum_luma = 0f64;
        let mut sum_luma_sq = 0f64;
        let mut colors = std::collections::HashSet::new();
        let mut all_zero = true;
        let mut all_transparent = true;
        let mut n = 0usize;

        for px in (0..pixels).step_by(stride) {
            let [r, g, b, a] = buf.rgba(px);
            if r != 0 || g != 0 || b != 0 {
                all_zero = false;
            }
            if a != 0 {
                all_transparent = false;
            }
            let c = [r as f64, g as f64, b as f64];
            for i in 0..3 {
                sum[i] += c[i];
                sum_sq[i] += c[i] * c[i];
            }
            sum_alpha += a as f64;
            let l = luma(c[0], c[1], c[2]);
            sum_luma += l;
            sum_luma_sq += l * l;
            colors.insert(quantized_key(r, g, b));
            n += 1;
        }

        let count = n.max(1) as f64;
        let mut mean_rgb = [0f64; 3];
        let mut std_rgb = [0f64; 3];
        for i in 0..3 {
            let mean = sum[i] / count;
            mean_rgb[i] = mean / 255.0;
            // Clamp tiny negative variances from float cancellation.
            std_rgb[i] = (sum_sq[i] / count - mean * mean).max(0.0).sqrt() / 255.0;
        }
        let luma_mean = sum_luma / count;
        let luma_variance = (sum_luma_sq / count - luma_mean * luma_mean).max(0.0) / (255.0 * 255.0);
        let unique = colors.len();

        Self {
            width: buf.width,
            height: buf.height,
            sample_count: n,
            mean_rgb,
            std_rgb,
            mean_alpha: sum_alpha / count / 255.0,
            luma_mean: luma_mean / 255.0,
            luma_variance,
            unique_sampled_colors: unique,
            is_all_zero: all_zero,
            is_all_transparent: all_transparent,
            is_essentially_blank: mean_rgb.iter().all(|m| *m < 0.01) && unique <= 10,
            is_monochrome: unique <= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> PixelBuffer {
        let data = px.repeat((w * h) as usize);
        PixelBuffer::new(w, h, data).unwrap()
    }

    #[test]
    fn stride_targets_a_thousand_samples() {
        assert_eq!(sample_stride(0), 1);
        assert_eq!(sample_stride(999), 1);
        assert_eq!(sample_stride(1280 * 720), 921);
    }

    #[test]
    fn black_frame_is_zero_blank_and_monochrome() {
        let m = FrameMetrics::from_pixels(&solid(64, 64, [0, 0, 0, 255]));
        assert!(m.is_all_zero);
        assert!(m.is_essentially_blank);
        assert!(m.is_monochrome);
        assert!(!m.is_all_transparent);
        assert_eq!(m.mean_rgb, [0.0, 0.0, 0.0]);
        assert_eq!(m.mean_alpha, 1.0);
    }

    #[test]
    fn transparent_frame_is_flagged() {
        let m = FrameMetrics::from_pixels(&solid(8, 8, [200, 10, 10, 0]));
        assert!(m.is_all_transparent);
        assert!(!m.is_all_zero);
        assert!(!m.is_essentially_blank);
        assert_eq!(m.mean_alpha, 0.0);
    }

    #[test]
    fn gradient_has_many_colors() {
        let (w, h) = (256u32, 4u32);
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for _y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[x as u8, 255 - x as u8, 128, 255]);
            }
        }
        let m = FrameMetrics::from_pixels(&PixelBuffer::new(w, h, data).unwrap());
        assert_eq!(m.sample_count, 1024);
        assert!(m.unique_sampled_colors > 10);
        assert!(!m.is_monochrome);
        assert!(m.luma_variance > 0.0);
    }
}
