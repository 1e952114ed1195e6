//! Reduce every signal gathered for one effect into a single pass/fail.
//!
//! The policy is a strict conjunction. Reasons are listed in a fixed order,
//! but the order never changes the outcome. Exemptions suppress exactly the
//! one failure class they name for the effect ids they list.

use serde::Serialize;

use crate::{
    analyzer::StructureReport,
    config::Exemptions,
    probe::{
        BenchmarkStats, FrameMetrics, passthrough::PassthroughReport,
        responsiveness::ResponsivenessReport,
    },
    session::console::ConsoleMessage,
    types::{BackendKind, EffectId, ProbeStatus},
    vision::{AlgEquivReport, VisionReport},
};

/// State of a mandatory stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    NotRun,
    Ok,
    Error(String),
}

impl Stage {
    pub fn is_ok(&self) -> bool {
        *self == Stage::Ok
    }
}

/// Everything observed for one effect. Optional probes are `None` when not requested.
#[derive(Debug, Clone, Serialize)]
pub struct EffectResult {
    pub effect: EffectId,
    pub backend: BackendKind,
    pub compile: Stage,
    pub render: Stage,
    pub metrics: Option<FrameMetrics>,
    pub console_errors: Vec<ConsoleMessage>,
    pub structure: Option<StructureReport>,
    pub alg_equiv: Option<AlgEquivReport>,
    pub responsiveness: Option<ResponsivenessReport>,
    pub passthrough: Option<PassthroughReport>,
    pub benchmark: Option<std::result::Result<BenchmarkStats, String>>,
    pub vision: Option<VisionReport>,
    /// `(stage, milliseconds)` in execution order.
    pub timings: Vec<(String, u128)>,
}

impl EffectResult {
    pub fn new(effect: EffectId, backend: BackendKind) -> Self {
        Self {
            effect,
            backend,
            compile: Stage::NotRun,
            render: Stage::NotRun,
            metrics: None,
            console_errors: Vec::new(),
            structure: None,
            alg_equiv: None,
            responsiveness: None,
            passthrough: None,
            benchmark: None,
            vision: None,
            timings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub effect: EffectId,
    pub passed: bool,
    pub reasons: Vec<String>,
}

pub fn evaluate(r: &EffectResult, exemptions: &Exemptions) -> Verdict {
    let mut reasons = Vec::new();
    let id = &r.effect;

    match &r.compile {
        Stage::Ok => match &r.render {
            Stage::Ok => {}
            Stage::NotRun => reasons.push("render: not run".to_string()),
            Stage::Error(e) => reasons.push(format!("render: {e}")),
        },
        Stage::NotRun => reasons.push("compile: not run".to_string()),
        Stage::Error(e) => reasons.push(format!("compile: {e}")),
    }

    if let Some(m) = &r.metrics {
        if m.is_monochrome && !exemptions.is_monochrome_exempt(id) {
            reasons.push("monochrome output".to_string());
        }
        if m.is_essentially_blank && !exemptions.is_blank_exempt(id) {
            reasons.push("blank output".to_string());
        }
        if m.is_all_transparent && !exemptions.is_transparent_exempt(id) {
            reasons.push(format!("transparent output (mean alpha {:.4})", m.mean_alpha));
        }
    }

    if !r.console_errors.is_empty() {
        reasons.push(format!("{} console error(s)", r.console_errors.len()));
    }

    if r
        .responsiveness
        .as_ref()
        .is_some_and(|u| u.status == ProbeStatus::Error)
    {
        reasons.push("uniforms unresponsive".to_string());
    }

    if let Some(p) = &r.passthrough {
        match p.status {
            ProbeStatus::Passthrough => reasons.push("passthrough (no-op)".to_string()),
            ProbeStatus::Error => reasons.push(format!("passthrough: {}", p.details)),
            ProbeStatus::Ok | ProbeStatus::Skipped => {}
        }
    }

    match &r.benchmark {
        Some(Ok(stats)) if !stats.meets_target => reasons.push("below target FPS".to_string()),
        Some(Err(e)) => reasons.push(format!("benchmark: {e}")),
        _ => {}
    }

    if r.vision.as_ref().is_some_and(VisionReport::failed) {
        reasons.push("vision check failed".to_string());
    }

    if r.alg_equiv.as_ref().is_some_and(AlgEquivReport::failed) {
        reasons.push("GLSL/WGSL divergent".to_string());
    }

    if let Some(s) = &r.structure {
        reasons.extend(s.failure_reasons());
    }

    Verdict {
        effect: id.clone(),
        passed: reasons.is_empty(),
        reasons,
    }
}
