//! Identifiers shared by every stage of the gate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// `namespace/name` key for one effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EffectId {
    namespace: String,
    name: String,
}

impl EffectId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, GateError> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() || name.is_empty() || namespace.contains('/') || name.contains('/')
        {
            return Err(GateError::InvalidEffectId(format!("{namespace}/{name}")));
        }
        Ok(Self { namespace, name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for EffectId {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((namespace, name)) = s.split_once('/') else {
            return Err(GateError::InvalidEffectId(s.to_string()));
        };
        Self::new(namespace, name)
    }
}

impl TryFrom<String> for EffectId {
    type Error = GateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EffectId> for String {
    fn from(id: EffectId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Which of the two interchangeable graphics backends a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// WebGL2 / GLSL.
    Raster,
    /// WebGPU / WGSL.
    Compute,
}

impl BackendKind {
    /// Value of the page's backend radio input and of `__noisemakerCurrentBackend()`.
    pub fn page_label(self) -> &'static str {
        match self {
            Self::Raster => "glsl",
            Self::Compute => "wgsl",
        }
    }

    /// Name reported by the live backend object's `getName()`.
    pub fn backend_name(self) -> &'static str {
        match self {
            Self::Raster => "WebGL2",
            Self::Compute => "WebGPU",
        }
    }

    /// Per-effect directory holding this backend's shader sources.
    pub fn shader_dir(self) -> &'static str {
        self.page_label()
    }

    pub fn other(self) -> Self {
        match self {
            Self::Raster => Self::Compute,
            Self::Compute => Self::Raster,
        }
    }

    /// Whether `file_name` is a shader source for this backend.
    pub fn is_shader_file(self, file_name: &str) -> bool {
        match self {
            Self::Raster => [".glsl", ".vert", ".frag"]
                .iter()
                .any(|ext| file_name.ends_with(ext)),
            Self::Compute => file_name.ends_with(".wgsl"),
        }
    }

    /// Strip the backend's shader extension, yielding the program name.
    pub fn program_stem(self, file_name: &str) -> Option<&str> {
        let exts: &[&str] = match self {
            Self::Raster => &[".glsl", ".vert", ".frag"],
            Self::Compute => &[".wgsl"],
        };
        exts.iter().find_map(|ext| file_name.strip_suffix(ext))
    }
}

impl FromStr for BackendKind {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webgl2" | "glsl" | "raster" => Ok(Self::Raster),
            "webgpu" | "wgsl" | "compute" => Ok(Self::Compute),
            other => Err(GateError::InvalidBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raster => "webgl2",
            Self::Compute => "webgpu",
        })
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Error,
    Skipped,
    Passthrough,
}

impl ProbeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_id_parses_namespace_and_name() {
        let id: EffectId = "filter/bloom".parse().unwrap();
        assert_eq!(id.namespace(), "filter");
        assert_eq!(id.name(), "bloom");
        assert_eq!(id.to_string(), "filter/bloom");
    }

    #[test]
    fn effect_id_rejects_missing_or_extra_segments() {
        assert!("bloom".parse::<EffectId>().is_err());
        assert!("/bloom".parse::<EffectId>().is_err());
        assert!("a/b/c".parse::<EffectId>().is_err());
    }

    #[test]
    fn backend_aliases() {
        assert_eq!("webgl2".parse::<BackendKind>().unwrap(), BackendKind::Raster);
        assert_eq!("WGSL".parse::<BackendKind>().unwrap(), BackendKind::Compute);
        assert!("metal".parse::<BackendKind>().is_err());
    }

    #[test]
    fn program_stem_respects_backend_extensions() {
        assert_eq!(BackendKind::Raster.program_stem("blur.frag"), Some("blur"));
        assert_eq!(BackendKind::Raster.program_stem("blur.wgsl"), None);
        assert_eq!(BackendKind::Compute.program_stem("blur.wgsl"), Some("blur"));
    }
}
