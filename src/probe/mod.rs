//! Render-side probes: compile, render + metrics, benchmark, passthrough,
//! parameter responsiveness.

pub mod benchmark;
pub mod compile;
pub mod metrics;
pub mod params;
pub mod passthrough;
pub mod readback;
pub mod render;
pub mod responsiveness;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    config::TimingConfig,
    error::{GateError, Result},
    page::{PageDriver, eval_as, scripts},
    types::BackendKind,
    wait::poll_until,
};

pub use benchmark::BenchmarkStats;
pub use compile::CompileReport;
pub use metrics::FrameMetrics;
pub use readback::{PixelBuffer, SurfaceReader};
pub use render::{RenderOptions, RenderOutcome};

/// One compile→render→read-back driver bound to a live page and backend.
pub struct RenderProbe<'a> {
    page: &'a dyn PageDriver,
    backend: BackendKind,
    timing: &'a TimingConfig,
    reader: &'static dyn SurfaceReader,
}

impl<'a> RenderProbe<'a> {
    pub fn new(page: &'a dyn PageDriver, backend: BackendKind, timing: &'a TimingConfig) -> Self {
        Self {
            page,
            backend,
            timing,
            reader: readback::reader_for(backend),
        }
    }

    pub fn page(&self) -> &'a dyn PageDriver {
        self.page
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn reader(&self) -> &'static dyn SurfaceReader {
        self.reader
    }

    pub fn frame_count(&self) -> Result<u64> {
        eval_as(self.page, &scripts::frame_count())
    }

    /// Block until the render loop has produced `frames` more frames.
    ///
    /// Returns the frame count reached; `what` names the effect in the timeout error.
    pub fn wait_frames(&self, what: &str, frames: u64) -> Result<u64> {
        let baseline = self.frame_count()?;
        let target = baseline + frames;
        let mut reached = baseline;
        let done = poll_until(self.timing.render_timeout(), self.timing.poll_interval(), || {
            reached = self.frame_count()?;
            Ok((reached >= target).then_some(reached))
        })?;
        done.ok_or_else(|| GateError::RenderTimeout {
            effect: what.to_string(),
            reached,
            target,
        })
    }

    pub fn apply_uniforms(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let applied: u64 = eval_as(self.page, &scripts::apply_uniforms(values))?;
        log::debug!("[probe] applied {applied} uniform override(s)");
        Ok(())
    }

    /// Put every bound parameter back to its default and rewind time.
    pub fn reset_uniforms(&self) -> Result<()> {
        let done: bool = eval_as(self.page, &scripts::reset_uniforms())?;
        if !done {
            log::debug!("[probe] no loaded effect to reset");
        }
        Ok(())
    }

    /// Parameter specs of the loaded effect in declaration order.
    pub fn effect_globals(&self) -> Result<Vec<(String, Value)>> {
        eval_as(self.page, &scripts::effect_globals())
    }
}
