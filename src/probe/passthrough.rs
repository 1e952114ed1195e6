//! Proves a filter effect actually transforms its input.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::{
    PixelBuffer, RenderProbe,
    metrics::sample_stride,
    params::numeric_params,
};
use crate::{
    error::{GateError, Result},
    graph::{PassGraph, Resolution},
    page::{eval_as, scripts},
    types::{EffectId, ProbeStatus},
};

/// Tolerates float/precision noise between input and output, nothing more.
pub const PASSTHROUGH_SIMILARITY: f64 = 0.99;
const SETTLE_FRAMES: u64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct PassthroughReport {
    pub status: ProbeStatus,
    pub similarity: Option<f64>,
    pub input_texture: Option<String>,
    pub output_texture: Option<String>,
    pub details: String,
}

impl PassthroughReport {
    pub fn skipped(details: &str) -> Self {
        Self {
            status: ProbeStatus::Skipped,
            similarity: None,
            input_texture: None,
            output_texture: None,
            details: details.to_string(),
        }
    }

    /// The probe itself could not run; counts as a failure.
    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            details: details.into(),
            ..Self::skipped("")
        }
    }
}

/// 1 − normalized mean absolute RGB difference over a fixed-stride sample of `output`.
///
/// Buffers of different size are compared by nearest-neighbour mapping of
/// each sampled output pixel into `input`.
pub fn similarity(input: &PixelBuffer, output: &PixelBuffer) -> f64 {
    let pixels = output.pixel_count();
    if pixels == 0 || input.pixel_count() == 0 {
        return 0.0;
    }
    let stride = sample_stride(pixels);
    let (ow, oh) = (output.width as usize, output.height as usize);
    let (iw, ih) = (input.width as usize, input.height as usize);

    let mut total = 0u64;
    let mut samples = 0u64;
    for px in (0..pixels).step_by(stride) {
        let (x, y) = (px % ow, px / ow);
        let ipx = (y * ih / oh) * iw + (x * iw / ow);
        let o = output.rgba(px);
        let i = input.rgba(ipx);
        total += (0..3).map(|c| o[c].abs_diff(i[c]) as u64).sum::<u64>();
        samples += 1;
    }
    let mad = total as f64 / (samples as f64 * 3.0 * 255.0);
    1.0 - mad
}

impl RenderProbe<'_> {
    /// Run the passthrough check on the already-compiled `effect`.
    ///
    /// `is_filter` comes from the descriptor: only effects declaring an
    /// external input are checked, everything else is skipped.
    pub fn passthrough(&self, effect: &EffectId, is_filter: bool) -> Result<PassthroughReport> {
        if !is_filter {
            return Ok(PassthroughReport::skipped("not a filter effect (no external input)"));
        }

        let globals = self.effect_globals()?;
        let params: Vec<_> = numeric_params(&globals)
            .into_iter()
            .filter(|p| p.declared_range)
            .collect();
        let perturbed: BTreeMap<String, Value> = params
            .iter()
            .map(|p| (p.uniform.clone(), p.to_json(p.perturbed_value())))
            .collect();
        let defaults: BTreeMap<String, Value> = params
            .iter()
            .map(|p| (p.uniform.clone(), p.to_json(p.default)))
            .collect();

        let result = self
            .apply_uniforms(&perturbed)
            .and_then(|()| self.compare_filter_io(effect));
        let restored = self.apply_uniforms(&defaults).and_then(|()| self.reset_uniforms());
        let report = result?;
        restored?;
        Ok(report)
    }

    fn compare_filter_io(&self, effect: &EffectId) -> Result<PassthroughReport> {
        self.wait_frames(&effect.to_string(), SETTLE_FRAMES)?;

        let graph: PassGraph = eval_as(self.page, &scripts::graph_snapshot())?;
        let unresolved = || GateError::PassGraphResolution {
            effect: effect.to_string(),
            passes: graph.pass_ids(),
        };
        let input = graph.resolve_filter_input().ok_or_else(unresolved)?;
        let output = graph
            .primary_surface()
            .map(|s| s.read.clone())
            .ok_or_else(unresolved)?;
        if input.texture == output {
            return Err(unresolved());
        }
        if input.via == Resolution::ProducerScan {
            log::debug!(
                "[probe] {effect}: filter input inferred from producer pass {:?}",
                input.pass
            );
        }

        let mut bufs = self
            .reader
            .read_textures(self.page, &[input.texture.clone(), output.clone()])?;
        let (Some(out_buf), Some(in_buf)) = (bufs.pop(), bufs.pop()) else {
            return Err(GateError::Readback("filter input/output read incomplete".into()));
        };

        let sim = similarity(&in_buf, &out_buf);
        let status = if sim >= PASSTHROUGH_SIMILARITY {
            ProbeStatus::Passthrough
        } else {
            ProbeStatus::Ok
        };
        let details = match status {
            ProbeStatus::Passthrough => format!(
                "output matches input ({:.2}% similar: {} vs {})",
                sim * 100.0,
                input.texture,
                output
            ),
            _ => format!("output differs from input ({:.2}% similar)", sim * 100.0),
        };
        Ok(PassthroughReport {
            status,
            similarity: Some(sim),
            input_texture: Some(input.texture),
            output_texture: Some(output),
            details,
        })
    }
}
