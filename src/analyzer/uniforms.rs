//! Runtime-provided uniforms: never exposed as parameters, always declared when used.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use super::{
    descriptor::EffectDescriptor,
    shader_scan::{scan, usage},
};
use crate::{
    error::{GateError, Result},
    types::BackendKind,
};

/// Uniforms the pipeline updates every frame.
pub const RUNTIME_UNIFORMS: &[&str] = &[
    "time",
    "deltaTime",
    "frame",
    "resolution",
    "aspect",
    "aspectRatio",
];

/// Parameters bound to runtime uniforms, unless their UI explicitly disables control.
pub fn leaked_internal_uniforms(desc: &EffectDescriptor) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (_, spec) in &desc.globals {
        let Some(uniform) = spec.get("uniform").and_then(Value::as_str) else {
            continue;
        };
        if !RUNTIME_UNIFORMS.contains(&uniform) {
            continue;
        }
        let hidden = spec
            .get("ui")
            .and_then(|ui| ui.get("control"))
            .is_some_and(|c| c == &Value::Bool(false));
        if !hidden && !out.iter().any(|u| u == uniform) {
            out.push(uniform.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredUniformIssue {
    pub file: String,
    pub uniform: String,
    pub line: usize,
    pub message: String,
}

/// Runtime uniforms used in `file` without any declaration or shadowing binding.
pub fn check_required_uniforms(
    file: &Path,
    display_name: &str,
    backend: BackendKind,
) -> Result<Vec<RequiredUniformIssue>> {
    let src = std::fs::read_to_string(file).map_err(|e| GateError::analyzer(file, e))?;
    Ok(required_uniform_issues(&src, display_name, backend))
}

pub fn required_uniform_issues(
    src: &str,
    display_name: &str,
    backend: BackendKind,
) -> Vec<RequiredUniformIssue> {
    let toks = scan(src);
    RUNTIME_UNIFORMS
        .iter()
        .filter_map(|name| {
            let u = usage(&toks, name, backend);
            let first = *u.use_lines.first()?;
            (!u.is_declared_or_shadowed()).then(|| RequiredUniformIssue {
                file: display_name.to_string(),
                uniform: name.to_string(),
                line: first,
                message: format!("`{name}` used (line {first}) but never declared"),
            })
        })
        .collect()
}
