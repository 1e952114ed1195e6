//! Human-readable progress lines and the end-of-run summary.

use std::time::Duration;

use crate::{
    analyzer::StructureReport,
    probe::FrameMetrics,
    types::BackendKind,
    verdict::Verdict,
    vision::{AlgEquivReport, ParityStatus},
};

pub const RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────";

pub fn print_structure(s: &StructureReport, backend: BackendKind) {
    if s.has_inline_shaders {
        println!("  ❌ INLINE SHADERS DETECTED - FORBIDDEN");
        for loc in &s.inline_shader_locations {
            println!("     Line {}: {}", loc.line, loc.kind);
            println!("       {}...", loc.snippet);
        }
        println!("  All shaders MUST be in separate files under glsl/ or wgsl/ directories.");
        return;
    }
    println!("  ✓ no inline shaders");

    if s.naming_issues.is_empty() {
        println!("  ✓ naming conventions (camelCase)");
    } else {
        println!("  ❌ naming issues ({}):", s.naming_issues.len());
        for issue in &s.naming_issues {
            println!("     {issue}");
        }
    }

    if s.unused_files.is_empty() {
        println!("  ✓ no unused shader files");
    } else {
        println!("  ❌ unused files: {}", s.unused_files.join(", "));
    }

    if s.leaked_internal_uniforms.is_empty() {
        println!("  ✓ no leaked internal uniforms");
    } else {
        println!(
            "  ❌ leaked internal uniforms: {}",
            s.leaked_internal_uniforms.join(", ")
        );
    }

    if !s.split_shader_issues.is_empty() {
        println!("  ❌ split shader issues:");
        for issue in &s.split_shader_issues {
            println!("     {}", issue.message);
        }
    } else if backend == BackendKind::Raster {
        println!("  ✓ split shaders consistent");
    }

    if s.required_uniform_issues.is_empty() {
        println!("  ✓ required uniforms declared");
    } else {
        println!(
            "  ❌ required uniform issues ({}):",
            s.required_uniform_issues.len()
        );
        for issue in &s.required_uniform_issues {
            println!("     {}: {}", issue.file, issue.message);
        }
    }

    if s.structural_parity_issues.is_empty() {
        println!("  ✓ GLSL ↔ WGSL structural parity");
    } else {
        println!(
            "  ❌ structural parity issues ({}):",
            s.structural_parity_issues.len()
        );
        for issue in &s.structural_parity_issues {
            println!("     {}", issue.message);
        }
    }

    if s.compute_pass_issues.is_empty() {
        match &s.shape.compute_pass_exempt_reason {
            Some(reason) if !s.shape.has_compute_pass => {
                println!("  ⊘ compute pass: exempt ({reason})")
            }
            _ => println!("  ✓ compute pass present"),
        }
    } else {
        for issue in &s.compute_pass_issues {
            println!("  ❌ compute pass: {issue}");
        }
    }

    for e in &s.rule_errors {
        println!("  ❌ {} unreadable: {}", e.rule, e.message);
    }
}

pub fn print_alg_equiv(r: &AlgEquivReport) {
    match r.status {
        ParityStatus::Unavailable => println!("  ⊘ alg-equiv: skipped (no .openai key)"),
        ParityStatus::Divergent => {
            println!("  ❌ ALG-EQUIV DIVERGENT");
            for pair in r.divergent_pairs() {
                println!("     {}: {}", pair.program, pair.notes);
                for concern in &pair.concerns {
                    println!("       - {concern}");
                }
            }
        }
        ParityStatus::Error => println!("  ❌ alg-equiv: {}", r.summary),
        ParityStatus::Ok => println!("  ✓ alg-equiv: {} pairs equivalent", r.pairs.len()),
    }
}

/// One line describing the captured frame, honouring exemptions.
pub fn render_line(
    m: &FrameMetrics,
    monochrome_exempt: bool,
    blank_exempt: bool,
    transparent_exempt: bool,
) -> String {
    if m.is_all_transparent && !transparent_exempt {
        format!(
            "  ❌ render: FULLY TRANSPARENT (alpha=0 everywhere, mean_alpha={:.4})",
            m.mean_alpha
        )
    } else if m.is_all_transparent {
        "  ⊘ render: transparent (exempt)".to_string()
    } else if m.is_essentially_blank && blank_exempt {
        "  ⊘ render: essentially blank (exempt)".to_string()
    } else if m.is_essentially_blank {
        format!(
            "  ❌ render: ESSENTIALLY BLANK (mean_rgb=[{:.4}, {:.4}, {:.4}], {} colors)",
            m.mean_rgb[0], m.mean_rgb[1], m.mean_rgb[2], m.unique_sampled_colors
        )
    } else if m.is_monochrome && !monochrome_exempt {
        format!(
            "  ❌ render: monochrome output ({} colors)",
            m.unique_sampled_colors
        )
    } else if m.is_monochrome {
        "  ⊘ render: monochrome (exempt)".to_string()
    } else {
        format!("  ✓ render ({} colors)", m.unique_sampled_colors)
    }
}

pub fn timings_line(timings: &[(String, u128)]) -> String {
    let parts: Vec<String> = timings
        .iter()
        .map(|(stage, ms)| format!("{stage}:{ms}ms"))
        .collect();
    format!("  [{}]", parts.join(", "))
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub verdicts: Vec<Verdict>,
    pub unmatched: Vec<String>,
    pub elapsed: Duration,
}

impl Summary {
    pub fn failed(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.verdicts.iter().all(|v| v.passed)
    }

    pub fn print(&self) {
        let total = self.verdicts.len();
        let secs = self.elapsed.as_secs_f64();
        println!("\n=== Summary ===");
        if self.all_passed() {
            println!("\n✅ ALL {total} EFFECTS PASSED ✅");
        } else {
            let failed: Vec<_> = self.failed().collect();
            println!("\n❌❌❌ FAILED: {}/{total} effects ❌❌❌\n", failed.len());
            for v in failed {
                println!("  ❌ {}: {}", v.effect, v.reasons.join(", "));
            }
            println!();
        }
        println!("{}/{total} passed in {secs:.1}s", self.passed_count());
        if total > 0 {
            println!("{:.2}s per effect", secs / total as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_render_in_order() {
        let t = vec![("compile".to_string(), 12), ("render".to_string(), 40)];
        assert_eq!(timings_line(&t), "  [compile:12ms, render:40ms]");
    }

    #[test]
    fn empty_run_counts_as_passed() {
        let s = Summary::default();
        assert!(s.all_passed());
        assert_eq!(s.passed_count(), 0);
    }
}
