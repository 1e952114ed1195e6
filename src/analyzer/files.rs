//! Shader files on disk: usage, vertex/fragment pairing, cross-backend parity.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use serde::Serialize;

use super::descriptor::EffectDescriptor;
use crate::{
    error::{GateError, Result},
    types::BackendKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFile {
    pub path: PathBuf,
    pub file_name: String,
    pub program: String,
}

impl ShaderFile {
    /// `glsl/name.frag`, relative to the effect directory.
    pub fn display(&self, backend: BackendKind) -> String {
        format!("{}/{}", backend.shader_dir(), self.file_name)
    }
}

/// Shader sources for `backend`, sorted by file name. A missing directory is empty.
pub fn list_shader_files(effect_dir: &Path, backend: BackendKind) -> Result<Vec<ShaderFile>> {
    let dir = effect_dir.join(backend.shader_dir());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&dir).map_err(|e| GateError::analyzer(&dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GateError::analyzer(&dir, e))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !backend.is_shader_file(&file_name) {
            continue;
        }
        if let Some(program) = backend.program_stem(&file_name) {
            files.push(ShaderFile {
                program: program.to_string(),
                path: entry.path(),
                file_name,
            });
        }
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

/// Files whose program no pass references.
pub fn unused_files(files: &[ShaderFile], desc: &EffectDescriptor, backend: BackendKind) -> Vec<String> {
    let programs = desc.programs();
    files
        .iter()
        .filter(|f| !programs.contains(&f.program.as_str()))
        .map(|f| f.display(backend))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitShaderIssue {
    pub program: String,
    pub message: String,
}

#[derive(Default)]
struct Halves {
    combined: bool,
    vert: bool,
    frag: bool,
}

/// Raster-only: custom-vertex programs live as a referenced `.vert`/`.frag` pair.
pub fn split_shader_issues(files: &[ShaderFile], desc: &EffectDescriptor) -> Vec<SplitShaderIssue> {
    let mut by_program: std::collections::BTreeMap<&str, Halves> = Default::default();
    for f in files {
        let h = by_program.entry(f.program.as_str()).or_default();
        if f.file_name.ends_with(".vert") {
            h.vert = true;
        } else if f.file_name.ends_with(".frag") {
            h.frag = true;
        } else {
            h.combined = true;
        }
    }

    let programs = desc.programs();
    let mut out = Vec::new();
    let mut push = |program: &str, message: String| {
        out.push(SplitShaderIssue {
            program: program.to_string(),
            message,
        })
    };

    for (&program, h) in &by_program {
        if h.vert && !h.frag {
            push(program, format!("{program}.vert has no matching {program}.frag"));
        }
        if h.frag && !h.vert {
            push(program, format!("{program}.frag has no matching {program}.vert"));
        }
        if h.combined && (h.vert || h.frag) {
            push(
                program,
                format!("{program} exists both as combined {program}.glsl and as split files"),
            );
        }
        if h.vert && h.frag && !programs.contains(&program) {
            push(
                program,
                format!("split pair {program}.vert/{program}.frag is not referenced by any pass"),
            );
        }
    }

    for pass in desc.passes.iter().filter(|p| p.custom_vertex) {
        let Some(program) = pass.program.as_deref() else {
            continue;
        };
        match by_program.get(program) {
            Some(h) if h.vert && h.frag => {}
            Some(h) if h.combined && !h.vert && !h.frag => push(
                program,
                format!("custom-vertex program {program} must be split into .vert/.frag, not a combined .glsl"),
            ),
            Some(_) => {}
            None => push(
                program,
                format!("custom-vertex program {program} has no .vert/.frag pair"),
            ),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParityIssue {
    pub program: String,
    pub present_in: String,
    pub missing_from: String,
    pub message: String,
}

/// Programs present under one backend's directory but not the other's.
pub fn parity_issues(raster: &[ShaderFile], compute: &[ShaderFile]) -> Vec<ParityIssue> {
    let programs = |files: &[ShaderFile]| -> BTreeSet<String> {
        files.iter().map(|f| f.program.clone()).collect()
    };
    let r = programs(raster);
    let c = programs(compute);

    let mut out = Vec::new();
    for (have, lack, from, to) in [
        (&r, &c, BackendKind::Raster, BackendKind::Compute),
        (&c, &r, BackendKind::Compute, BackendKind::Raster),
    ] {
        for program in have.difference(lack) {
            out.push(ParityIssue {
                program: program.clone(),
                present_in: from.shader_dir().to_string(),
                missing_from: to.shader_dir().to_string(),
                message: format!(
                    "program {program} exists in {}/ but not in {}/",
                    from.shader_dir(),
                    to.shader_dir()
                ),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(backend: BackendKind, names: &[&str]) -> Vec<ShaderFile> {
        names
            .iter()
            .map(|n| ShaderFile {
                path: PathBuf::from(n),
                file_name: n.to_string(),
                program: backend.program_stem(n).unwrap_or(*n).to_string(),
            })
            .collect()
    }

    fn desc(src: &str) -> EffectDescriptor {
        EffectDescriptor::parse(PathBuf::from("definition.js"), src.to_string())
    }

    #[test]
    fn unreferenced_file_is_unused() {
        let d = desc(r#"class X { passes = [{ program: "main" }]; }"#);
        let f = files(BackendKind::Raster, &["main.glsl", "old.glsl"]);
        assert_eq!(unused_files(&f, &d, BackendKind::Raster), vec!["glsl/old.glsl"]);
    }

    #[test]
    fn split_halves_must_pair() {
        let d = desc(r#"class X { passes = [{ program: "deposit", drawMode: "points" }, { program: "trail" }]; }"#);
        let f = files(BackendKind::Raster, &["deposit.vert", "trail.glsl", "trail.frag"]);
        let issues = split_shader_issues(&f, &d);
        let msgs: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert!(msgs.iter().any(|m| m.contains("deposit.vert has no matching")));
        assert!(msgs.iter().any(|m| m.contains("trail.frag has no matching")));
        assert!(msgs.iter().any(|m| m.contains("both as combined")));
    }

    #[test]
    fn combined_custom_vertex_program_rejected() {
        let d = desc(r#"class X { passes = [{ program: "agents", count: 500 }]; }"#);
        let f = files(BackendKind::Raster, &["agents.glsl"]);
        let issues = split_shader_issues(&f, &d);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("must be split"));
    }

    #[test]
    fn parity_checked_both_ways() {
        let r = files(BackendKind::Raster, &["a.glsl", "b.vert", "b.frag"]);
        let c = files(BackendKind::Compute, &["a.wgsl", "c.wgsl"]);
        let issues = parity_issues(&r, &c);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].program, "b");
        assert_eq!(issues[0].missing_from, "wgsl");
        assert_eq!(issues[1].program, "c");
        assert_eq!(issues[1].missing_from, "glsl");
    }
}
