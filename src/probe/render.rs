use std::collections::BTreeMap;

use serde_json::Value;

use super::{FrameMetrics, PixelBuffer, RenderProbe};
use crate::{error::Result, graph::PRIMARY_SURFACE, types::EffectId};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub warmup_frames: u64,
    /// Reuse the live compile instead of selecting the effect again.
    pub skip_compile: bool,
    /// Written into the live pipeline before warm-up.
    pub uniform_overrides: BTreeMap<String, Value>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            warmup_frames: 10,
            skip_compile: false,
            uniform_overrides: BTreeMap::new(),
        }
    }
}

impl RenderOptions {
    pub fn reuse_compile(warmup_frames: u64) -> Self {
        Self {
            warmup_frames,
            skip_compile: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub metrics: FrameMetrics,
    pub pixels: PixelBuffer,
    /// Frame counter value when the capture was taken.
    pub frame: u64,
}

impl RenderProbe<'_> {
    pub fn render(&self, effect: &EffectId, opts: &RenderOptions) -> Result<RenderOutcome> {
        if !opts.skip_compile {
            self.compile(effect)?;
        }
        self.apply_uniforms(&opts.uniform_overrides)?;
        let frame = self.wait_frames(&effect.to_string(), opts.warmup_frames)?;
        let pixels = self.reader.read_surface(self.page, PRIMARY_SURFACE)?;
        let metrics = FrameMetrics::from_pixels(&pixels);
        log::debug!(
            "[probe] {effect} frame {frame}: {} colors, mean_rgb={:.4?}",
            metrics.unique_sampled_colors,
            metrics.mean_rgb
        );
        Ok(RenderOutcome {
            metrics,
            pixels,
            frame,
        })
    }
}
