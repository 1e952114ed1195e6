//! Static checks over an effect's descriptor and shader files.
//!
//! Nothing here executes effect code. Every rule appends to its own list in
//! [`StructureReport`]; a file that cannot be read disables only the rule
//! that needed it and is recorded in `rule_errors`.

pub mod compute;
pub mod descriptor;
pub mod files;
pub mod inline;
pub mod lexer;
pub mod naming;
pub mod shader_scan;
pub mod uniforms;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    config::Exemptions,
    error::{GateError, Result},
    types::{BackendKind, EffectId},
};

pub use compute::PassShape;
pub use descriptor::{DEFINITION_FILES, EffectDescriptor};
pub use files::{ParityIssue, ShaderFile, SplitShaderIssue};
pub use inline::InlineShaderLocation;
pub use naming::NamingIssue;
pub use uniforms::RequiredUniformIssue;

/// A rule that could not run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleError {
    pub rule: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureReport {
    pub has_inline_shaders: bool,
    pub inline_shader_locations: Vec<InlineShaderLocation>,
    pub naming_issues: Vec<NamingIssue>,
    pub unused_files: Vec<String>,
    pub leaked_internal_uniforms: Vec<String>,
    pub split_shader_issues: Vec<SplitShaderIssue>,
    pub structural_parity_issues: Vec<ParityIssue>,
    pub required_uniform_issues: Vec<RequiredUniformIssue>,
    pub compute_pass_issues: Vec<String>,
    #[serde(flatten)]
    pub shape: PassShape,
    pub rule_errors: Vec<RuleError>,
}

impl StructureReport {
    pub fn issue_count(&self) -> usize {
        self.naming_issues.len()
            + self.unused_files.len()
            + self.leaked_internal_uniforms.len()
            + self.split_shader_issues.len()
            + self.structural_parity_issues.len()
            + self.required_uniform_issues.len()
            + self.compute_pass_issues.len()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_inline_shaders && self.issue_count() == 0 && self.rule_errors.is_empty()
    }

    /// One short reason per non-empty list, in a fixed order.
    pub fn failure_reasons(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.has_inline_shaders {
            out.push("inline shaders".to_string());
        }
        let counted: [(usize, &str); 7] = [
            (self.naming_issues.len(), "naming issue(s)"),
            (self.unused_files.len(), "unused file(s)"),
            (self.leaked_internal_uniforms.len(), "leaked uniform(s)"),
            (self.split_shader_issues.len(), "split shader issue(s)"),
            (self.structural_parity_issues.len(), "parity issue(s)"),
            (self.required_uniform_issues.len(), "missing uniform decl(s)"),
            (self.compute_pass_issues.len(), "compute pass issue(s)"),
        ];
        out.extend(
            counted
                .iter()
                .filter(|(n, _)| *n > 0)
                .map(|(n, what)| format!("{n} {what}")),
        );
        if !self.rule_errors.is_empty() {
            out.push(format!("{} unreadable rule input(s)", self.rule_errors.len()));
        }
        out
    }

    fn rule_error(&mut self, rule: &str, err: &GateError) {
        log::warn!("[analyzer] {rule}: {err}");
        self.rule_errors.push(RuleError {
            rule: rule.to_string(),
            message: err.to_string(),
        });
    }
}

pub struct StaticAnalyzer {
    effects_dir: PathBuf,
    exemptions: Exemptions,
}

impl StaticAnalyzer {
    pub fn new(effects_dir: impl Into<PathBuf>, exemptions: Exemptions) -> Self {
        Self {
            effects_dir: effects_dir.into(),
            exemptions,
        }
    }

    pub fn effects_dir(&self) -> &Path {
        &self.effects_dir
    }

    pub fn effect_dir(&self, effect: &EffectId) -> PathBuf {
        self.effects_dir.join(effect.namespace()).join(effect.name())
    }

    /// Load the descriptor of `effect`, e.g. to decide whether it is a filter.
    pub fn descriptor(&self, effect: &EffectId) -> Result<EffectDescriptor> {
        EffectDescriptor::load(&self.effect_dir(effect))
    }

    pub fn analyze(&self, effect: &EffectId, backend: BackendKind) -> StructureReport {
        let dir = self.effect_dir(effect);
        let mut report = StructureReport::default();

        let desc = match EffectDescriptor::load(&dir) {
            Ok(d) => Some(d),
            Err(e) => {
                report.rule_error("descriptor", &e);
                None
            }
        };

        if let Some(desc) = &desc {
            let inline = inline::find_inline_shaders(&desc.tokens);
            if !inline.is_empty() {
                log::debug!("[analyzer] {effect}: {} inline shader(s)", inline.len());
                report.has_inline_shaders = true;
                report.inline_shader_locations = inline;
                return report;
            }

            report.naming_issues = naming::check_names(effect.name(), desc);
            report.leaked_internal_uniforms = uniforms::leaked_internal_uniforms(desc);
            report.shape =
                compute::pass_shape(desc, self.exemptions.is_compute_pass_exempt(effect));
            if report.shape.violates() {
                report.compute_pass_issues.push(format!(
                    "{} passes ({}) but no compute pass",
                    report.shape.pass_count,
                    report.shape.pass_types.join(", ")
                ));
            }
        }

        match files::list_shader_files(&dir, backend) {
            Ok(shader_files) => {
                if let Some(desc) = &desc {
                    report.unused_files = files::unused_files(&shader_files, desc, backend);
                    if backend == BackendKind::Raster {
                        report.split_shader_issues = files::split_shader_issues(&shader_files, desc);
                    }
                }
                for f in &shader_files {
                    match uniforms::check_required_uniforms(&f.path, &f.display(backend), backend) {
                        Ok(issues) => report.required_uniform_issues.extend(issues),
                        Err(e) => report.rule_error("requiredUniforms", &e),
                    }
                }
            }
            Err(e) => report.rule_error("shaderFiles", &e),
        }

        let listing = files::list_shader_files(&dir, BackendKind::Raster).and_then(|r| {
            files::list_shader_files(&dir, BackendKind::Compute).map(|c| (r, c))
        });
        match listing {
            Ok((raster, compute)) => {
                report.structural_parity_issues = files::parity_issues(&raster, &compute);
            }
            Err(e) => report.rule_error("structuralParity", &e),
        }

        log::debug!(
            "[analyzer] {effect} ({backend}): {} issue(s), {} rule error(s)",
            report.issue_count(),
            report.rule_errors.len()
        );
        report
    }
}

/// Effects on disk: `<ns>/<name>/` directories holding a definition file.
/// Dot-directories are skipped; the result is sorted.
pub fn discover_effects(effects_dir: &Path) -> Result<Vec<EffectId>> {
    let mut out = Vec::new();
    for ns in read_subdirs(effects_dir)? {
        for effect in read_subdirs(&ns)? {
            if !DEFINITION_FILES.iter().any(|f| effect.join(f).is_file()) {
                continue;
            }
            let (Some(ns_name), Some(name)) = (dir_name(&ns), dir_name(&effect)) else {
                continue;
            };
            match EffectId::new(ns_name, name) {
                Ok(id) => out.push(id),
                Err(e) => log::warn!("[analyzer] skipping {}: {e}", effect.display()),
            }
        }
    }
    out.sort();
    Ok(out)
}

fn dir_name(p: &Path) -> Option<String> {
    p.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn read_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| GateError::analyzer(dir, e))?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GateError::analyzer(dir, e))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && path.is_dir() {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_follow_list_order() {
        let report = StructureReport {
            unused_files: vec!["glsl/a.glsl".into()],
            naming_issues: vec![NamingIssue {
                kind: "uniform".into(),
                name: "My_U".into(),
                expected: Some("myU".into()),
                reason: None,
            }],
            ..Default::default()
        };
        assert_eq!(
            report.failure_reasons(),
            vec!["1 naming issue(s)".to_string(), "1 unused file(s)".to_string()]
        );
        assert!(!report.is_clean());
        assert!(StructureReport::default().is_clean());
    }
}
