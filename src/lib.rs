pub mod analyzer;
pub mod browser;
pub mod config;
pub mod error;
pub mod graph;
pub mod page;
pub mod probe;
pub mod runner;
pub mod session;
pub mod types;
pub mod verdict;
pub mod vision;
pub mod wait;

pub use error::{GateError, Result};
pub use types::{BackendKind, EffectId};
