use serde::Serialize;
use serde_json::Value;

use super::{
    RenderOptions, RenderProbe,
    metrics::FrameMetrics,
    params::{NumericParam, numeric_params},
};
use crate::{
    error::Result,
    page::{eval_as, scripts},
    types::{EffectId, ProbeStatus},
};

/// Only the first few testable parameters are exercised, to bound cost.
pub const MAX_TESTED_PARAMS: usize = 3;
pub const COLOR_DELTA_THRESHOLD: usize = 5;
pub const LUMA_DELTA_THRESHOLD: f64 = 0.01;
const WARMUP_FRAMES: u64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ParamResponse {
    pub name: String,
    pub test_value: f64,
    pub color_delta: usize,
    pub luma_delta: f64,
    pub responded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsivenessReport {
    pub status: ProbeStatus,
    pub tested: Vec<ParamResponse>,
    pub details: String,
}

impl ResponsivenessReport {
    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            tested: Vec::new(),
            details: details.into(),
        }
    }

    /// `name:✓` / `name:✗` per tested parameter.
    pub fn tested_labels(&self) -> Vec<String> {
        self.tested
            .iter()
            .map(|t| format!("{}:{}", t.name, if t.responded { '✓' } else { '✗' }))
            .collect()
    }
}

pub fn responds(base: &FrameMetrics, test: &FrameMetrics) -> (usize, f64, bool) {
    let color_delta = base.unique_sampled_colors.abs_diff(test.unique_sampled_colors);
    let luma_delta = (base.luma_mean - test.luma_mean).abs();
    let responded = color_delta > COLOR_DELTA_THRESHOLD || luma_delta > LUMA_DELTA_THRESHOLD;
    (color_delta, luma_delta, responded)
}

impl RenderProbe<'_> {
    /// Check that at least one numeric parameter visibly changes the output.
    ///
    /// Assumes the effect is already compiled. Every touched value is restored,
    /// whatever the outcome.
    pub fn responsiveness(&self, effect: &EffectId) -> Result<ResponsivenessReport> {
        let globals = self.effect_globals()?;
        let params = numeric_params(&globals);
        if params.is_empty() {
            return Ok(ResponsivenessReport {
                status: ProbeStatus::Skipped,
                tested: Vec::new(),
                details: "No testable numeric uniforms".to_string(),
            });
        }

        let result = self.probe_params(effect, &params);
        let reset = self.reset_uniforms();
        let tested = result?;
        reset?;

        let any = tested.iter().any(|t| t.responded);
        Ok(ResponsivenessReport {
            status: if any {
                ProbeStatus::Ok
            } else {
                ProbeStatus::Error
            },
            tested,
            details: if any {
                "Uniforms affect output".to_string()
            } else {
                "No uniforms affected output".to_string()
            },
        })
    }

    fn probe_params(&self, effect: &EffectId, params: &[NumericParam]) -> Result<Vec<ParamResponse>> {
        let opts = RenderOptions::reuse_compile(WARMUP_FRAMES);
        let base = self.render(effect, &opts)?.metrics;

        let mut tested = Vec::new();
        for p in params.iter().take(MAX_TESTED_PARAMS) {
            let test_value = p.responsiveness_value();
            self.set_effect_uniform(effect, &p.uniform, &p.to_json(test_value))?;
            let rendered = self.render(effect, &opts);
            self.set_effect_uniform(effect, &p.uniform, &p.to_json(p.default))?;

            match rendered {
                Ok(out) => {
                    let (color_delta, luma_delta, responded) = responds(&base, &out.metrics);
                    log::debug!(
                        "[probe] {effect} {}={test_value}: Δcolors={color_delta} Δluma={luma_delta:.4}",
                        p.key
                    );
                    tested.push(ParamResponse {
                        name: p.key.clone(),
                        test_value,
                        color_delta,
                        luma_delta,
                        responded,
                    });
                }
                Err(e) => log::warn!("[probe] {effect} {}: render failed: {e}", p.key),
            }
        }
        Ok(tested)
    }

    fn set_effect_uniform(&self, effect: &EffectId, uniform: &str, value: &Value) -> Result<u64> {
        eval_as(self.page, &scripts::set_effect_uniform(effect, uniform, value))
    }
}
