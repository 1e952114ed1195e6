use std::{path::PathBuf, time::Duration};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("compile failed for {effect}: {status}")]
    Compile { effect: String, status: String },

    #[error("render timed out for {effect}: frame counter reached {reached} of {target}")]
    RenderTimeout {
        effect: String,
        reached: u64,
        target: u64,
    },

    #[error("readback failed: {0}")]
    Readback(String),

    #[error("could not resolve filter input for {effect}; passes: [{}]", passes.join(", "))]
    PassGraphResolution { effect: String, passes: Vec<String> },

    #[error("failed to read {}: {source}", path.display())]
    Analyzer {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vision service error: {0}")]
    VisionService(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("invalid effect id: {0:?} (expected namespace/name)")]
    InvalidEffectId(String),

    #[error("unknown backend: {0:?} (expected webgl2 or webgpu)")]
    InvalidBackend(String),
}

impl GateError {
    pub fn analyzer(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Analyzer {
            path: path.into(),
            source,
        }
    }

    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after,
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(format!("json: {e}"))
    }
}
