use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::RenderProbe;
use crate::{
    error::{GateError, Result},
    page::{eval_as, scripts},
    types::EffectId,
    wait::poll_until,
};

/// Status-element substrings, matched case-insensitively.
pub const STATUS_COMPILED: &str = "compiled";
pub const STATUS_FAILED: &str = "compilation failed";

#[derive(Debug, Clone, Serialize)]
pub struct CompileReport {
    pub effect: EffectId,
    /// Ids of the passes in the compiled graph.
    pub passes: Vec<String>,
    pub status_text: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Deserialize)]
struct Selected {
    found: bool,
    frame: u64,
}

#[derive(Debug, Deserialize)]
struct Status {
    frame: u64,
    status: String,
    #[serde(default)]
    passes: Vec<String>,
}

enum Marker {
    Compiled(Status),
    Failed(String),
}

/// Either marker counts only once the render loop moved past `start_frame`;
/// until then the status text may still belong to the previous effect.
fn classify(status: Status, start_frame: u64) -> Option<Marker> {
    if status.frame <= start_frame {
        return None;
    }
    let lower = status.status.to_lowercase();
    if lower.contains(STATUS_FAILED) {
        return Some(Marker::Failed(status.status));
    }
    lower
        .contains(STATUS_COMPILED)
        .then_some(Marker::Compiled(status))
}

impl RenderProbe<'_> {
    /// Select `effect` and wait for the page to report the compile outcome.
    pub fn compile(&self, effect: &EffectId) -> Result<CompileReport> {
        let started = Instant::now();
        let selected: Selected = eval_as(self.page, &scripts::select_effect(effect))?;
        if !selected.found {
            return Err(GateError::Compile {
                effect: effect.to_string(),
                status: "effect not in page catalog".to_string(),
            });
        }

        let mut last_status = String::new();
        let outcome = poll_until(self.timing.status_timeout(), self.timing.poll_interval(), || {
            let status: Status = eval_as(self.page, &scripts::compile_status())?;
            last_status.clone_from(&status.status);
            Ok(classify(status, selected.frame))
        })?;

        match outcome {
            Some(Marker::Compiled(status)) => {
                log::debug!(
                    "[probe] {effect} compiled ({} passes) in {:?}",
                    status.passes.len(),
                    started.elapsed()
                );
                let passes = if status.passes.is_empty() {
                    vec![effect.to_string()]
                } else {
                    status.passes
                };
                Ok(CompileReport {
                    effect: effect.clone(),
                    passes,
                    status_text: status.status,
                    elapsed_ms: started.elapsed().as_millis(),
                })
            }
            Some(Marker::Failed(text)) => Err(GateError::Compile {
                effect: effect.to_string(),
                status: text,
            }),
            None => Err(GateError::Compile {
                effect: effect.to_string(),
                status: if last_status.trim().is_empty() {
                    "Compilation timeout".to_string()
                } else {
                    format!("Compilation timeout (status: {last_status})")
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(frame: u64, text: &str) -> Status {
        Status {
            frame,
            status: text.to_string(),
            passes: vec![],
        }
    }

    #[test]
    fn failure_marker_needs_frame_advance_too() {
        // Still showing the previous effect's failure.
        assert!(classify(status(3, "Compilation FAILED: bad token"), 3).is_none());
        assert!(matches!(
            classify(status(4, "Compilation FAILED: bad token"), 3),
            Some(Marker::Failed(t)) if t.contains("bad token")
        ));
    }

    #[test]
    fn compiled_requires_frame_advance() {
        assert!(classify(status(3, "Compiled filter/bloom"), 3).is_none());
        assert!(matches!(
            classify(status(4, "Compiled filter/bloom"), 3),
            Some(Marker::Compiled(_))
        ));
        assert!(classify(status(9, "Loading..."), 3).is_none());
    }
}
