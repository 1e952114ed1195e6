//! Ask the model whether each program's GLSL and WGSL sources compute the same thing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::VisionClient;
use crate::{
    analyzer::files::{ShaderFile, list_shader_files},
    error::{GateError, Result},
    types::BackendKind,
};

const COMPARE_PROMPT: &str = "You are reviewing two implementations of the same shader program, \
one in GLSL (WebGL2) and one in WGSL (WebGPU). Decide whether they implement the same algorithm: \
same math, same uniforms and their meaning, same sampling and output. Ignore syntax differences, \
binding layout, and coordinate conventions that are compensated for.\n\
Respond with a JSON object containing:\n\
- parity: \"equivalent\" or \"divergent\"\n\
- notes: one or two sentences summarizing the comparison\n\
- concerns: an array of specific differences (empty when equivalent)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramPair {
    pub program: String,
    pub glsl: String,
    pub wgsl: String,
}

/// Programs with sources under both `glsl/` and `wgsl/`, sorted.
///
/// A raster program is its combined `.glsl`, or its `.vert` followed by its `.frag`.
pub fn shared_programs(effect_dir: &Path) -> Result<Vec<ProgramPair>> {
    let raster = list_shader_files(effect_dir, BackendKind::Raster)?;
    let compute = list_shader_files(effect_dir, BackendKind::Compute)?;
    let mut pairs = Vec::new();
    for w in &compute {
        let Some(glsl) = raster_source(&raster, &w.program)? else {
            continue;
        };
        let wgsl = read(w)?;
        pairs.push(ProgramPair {
            program: w.program.clone(),
            glsl,
            wgsl,
        });
    }
    pairs.sort_by(|a, b| a.program.cmp(&b.program));
    Ok(pairs)
}

fn read(f: &ShaderFile) -> Result<String> {
    std::fs::read_to_string(&f.path).map_err(|e| GateError::analyzer(&f.path, e))
}

fn raster_source(files: &[ShaderFile], program: &str) -> Result<Option<String>> {
    let find = |ext: &str| files.iter().find(|f| f.program == program && f.file_name.ends_with(ext));
    if let Some(combined) = find(".glsl") {
        return read(combined).map(Some);
    }
    match (find(".vert"), find(".frag")) {
        (Some(v), Some(f)) => Ok(Some(format!("{}\n\n{}", read(v)?, read(f)?))),
        (None, Some(f)) => read(f).map(Some),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairVerdict {
    #[serde(default)]
    pub program: String,
    pub parity: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

impl PairVerdict {
    pub fn is_divergent(&self) -> bool {
        self.parity == "divergent"
    }

    pub fn is_equivalent(&self) -> bool {
        self.parity == "equivalent"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityStatus {
    Ok,
    Divergent,
    Error,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlgEquivReport {
    pub status: ParityStatus,
    pub pairs: Vec<PairVerdict>,
    pub summary: String,
}

impl AlgEquivReport {
    pub fn unavailable() -> Self {
        Self {
            status: ParityStatus::Unavailable,
            pairs: Vec::new(),
            summary: "no vision credential".to_string(),
        }
    }

    fn error(summary: impl Into<String>) -> Self {
        Self {
            status: ParityStatus::Error,
            pairs: Vec::new(),
            summary: summary.into(),
        }
    }

    /// Divergence, a failed comparison, and an empty comparison all fail the gate.
    pub fn failed(&self) -> bool {
        matches!(self.status, ParityStatus::Divergent | ParityStatus::Error)
    }

    pub fn divergent_pairs(&self) -> impl Iterator<Item = &PairVerdict> {
        self.pairs.iter().filter(|p| p.is_divergent())
    }

    /// Fold per-program verdicts into one status.
    pub fn from_pairs(pairs: Vec<PairVerdict>) -> Self {
        if pairs.is_empty() {
            return Self::error("no program exists under both glsl/ and wgsl/");
        }
        let divergent = pairs.iter().filter(|p| p.is_divergent()).count();
        let unknown = pairs
            .iter()
            .filter(|p| !p.is_divergent() && !p.is_equivalent())
            .count();
        let (status, summary) = if divergent > 0 {
            (
                ParityStatus::Divergent,
                format!("{divergent} of {} program(s) divergent", pairs.len()),
            )
        } else if unknown > 0 {
            (
                ParityStatus::Error,
                format!("{unknown} program(s) could not be compared"),
            )
        } else {
            (
                ParityStatus::Ok,
                format!("{} program(s) equivalent", pairs.len()),
            )
        };
        Self {
            status,
            pairs,
            summary,
        }
    }
}

impl VisionClient {
    pub fn compare_sources(&self, pair: &ProgramPair) -> Result<PairVerdict> {
        let text = format!(
            "{COMPARE_PROMPT}\n\nProgram: {}\n\n--- GLSL ---\n{}\n\n--- WGSL ---\n{}",
            pair.program, pair.glsl, pair.wgsl
        );
        let reply = self.ask_json(vec![json!({ "type": "text", "text": text })])?;
        let mut verdict: PairVerdict = serde_json::from_value(reply)?;
        verdict.program = pair.program.clone();
        Ok(verdict)
    }
}

/// Compare every shared program of the effect in `effect_dir`.
pub fn check_alg_equiv(client: Option<&VisionClient>, effect_dir: &Path) -> AlgEquivReport {
    let Some(client) = client else {
        return AlgEquivReport::unavailable();
    };
    let pairs = match shared_programs(effect_dir) {
        Ok(p) => p,
        Err(e) => return AlgEquivReport::error(e.to_string()),
    };
    let mut verdicts = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        match client.compare_sources(pair) {
            Ok(v) => {
                log::debug!("[alg-equiv] {}: {}", v.program, v.parity);
                verdicts.push(v);
            }
            Err(e) => {
                log::warn!("[alg-equiv] {}: {e}", pair.program);
                return AlgEquivReport::error(format!("{}: {e}", pair.program));
            }
        }
    }
    AlgEquivReport::from_pairs(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(program: &str, parity: &str) -> PairVerdict {
        PairVerdict {
            program: program.into(),
            parity: parity.into(),
            notes: String::new(),
            concerns: Vec::new(),
        }
    }

    #[test]
    fn one_divergent_pair_diverges() {
        let r = AlgEquivReport::from_pairs(vec![verdict("a", "equivalent"), verdict("b", "divergent")]);
        assert_eq!(r.status, ParityStatus::Divergent);
        assert_eq!(r.divergent_pairs().count(), 1);
        assert!(r.failed());
    }

    #[test]
    fn nothing_to_compare_is_an_error() {
        let r = AlgEquivReport::from_pairs(Vec::new());
        assert_eq!(r.status, ParityStatus::Error);
        assert!(r.failed());
        assert!(!AlgEquivReport::unavailable().failed());
    }

    #[test]
    fn shared_programs_join_split_raster_halves() {
        let dir = tempfile::tempdir().unwrap();
        let glsl = dir.path().join("glsl");
        let wgsl = dir.path().join("wgsl");
        std::fs::create_dir_all(&glsl).unwrap();
        std::fs::create_dir_all(&wgsl).unwrap();
        std::fs::write(glsl.join("agents.vert"), "VERT").unwrap();
        std::fs::write(glsl.join("agents.frag"), "FRAG").unwrap();
        std::fs::write(glsl.join("only.glsl"), "X").unwrap();
        std::fs::write(wgsl.join("agents.wgsl"), "W").unwrap();

        let pairs = shared_programs(dir.path()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].program, "agents");
        assert_eq!(pairs[0].glsl, "VERT\n\nFRAG");
        assert_eq!(pairs[0].wgsl, "W");
    }
}
