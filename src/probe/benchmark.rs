use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RenderProbe;
use crate::{
    error::Result,
    page::{eval_as, scripts},
    types::EffectId,
};

#[derive(Debug, Deserialize)]
struct Window {
    frame_count: u64,
    total_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkStats {
    pub frame_count: u64,
    pub total_time_ms: f64,
    pub avg_frame_time_ms: f64,
    pub achieved_fps: f64,
    pub target_fps: f64,
    pub meets_target: bool,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl BenchmarkStats {
    pub fn from_window(frame_count: u64, total_time_ms: f64, target_fps: f64) -> Self {
        let fps = if total_time_ms > 0.0 {
            frame_count as f64 / (total_time_ms / 1000.0)
        } else {
            0.0
        };
        let avg = if frame_count > 0 {
            total_time_ms / frame_count as f64
        } else {
            0.0
        };
        Self {
            frame_count,
            total_time_ms,
            avg_frame_time_ms: round2(avg),
            achieved_fps: round2(fps),
            target_fps,
            meets_target: fps >= target_fps,
        }
    }
}

impl RenderProbe<'_> {
    /// Count frames over a real-time window. Never reads pixels.
    pub fn benchmark(
        &self,
        effect: &EffectId,
        target_fps: f64,
        duration: Duration,
        skip_compile: bool,
    ) -> Result<BenchmarkStats> {
        if !skip_compile {
            self.compile(effect)?;
        }
        let window: Window = eval_as(
            self.page,
            &scripts::benchmark_window(duration.as_millis() as u64),
        )?;
        let stats = BenchmarkStats::from_window(window.frame_count, window.total_time_ms, target_fps);
        log::debug!(
            "[probe] {effect} benchmark: {} frames in {:.1}ms = {} fps",
            stats.frame_count,
            stats.total_time_ms,
            stats.achieved_fps
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_rounded_and_compared_to_target() {
        let s = BenchmarkStats::from_window(31, 500.0, 60.0);
        assert_eq!(s.achieved_fps, 62.0);
        assert!(s.meets_target);
        assert_eq!(s.avg_frame_time_ms, 16.13);

        let s = BenchmarkStats::from_window(7, 500.0, 30.0);
        assert_eq!(s.achieved_fps, 14.0);
        assert!(!s.meets_target);
    }

    #[test]
    fn empty_window_is_zero_fps() {
        let s = BenchmarkStats::from_window(0, 0.0, 30.0);
        assert_eq!(s.achieved_fps, 0.0);
        assert_eq!(s.avg_frame_time_ms, 0.0);
        assert!(!s.meets_target);
    }
}
