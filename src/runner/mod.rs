//! Batch orchestration: pick effects, probe each one in a fixed order, judge.
//!
//! A failure inside one effect is recorded on that effect's result and the
//! batch moves on; only session setup can abort a run.

pub mod report;
pub mod select;

use std::time::Instant;

use anyhow::{Context, Result};

use crate::{
    analyzer::{StaticAnalyzer, discover_effects},
    config::{Exemptions, GateConfig},
    probe::{
        RenderOptions, RenderProbe, passthrough::PassthroughReport,
        responsiveness::ResponsivenessReport,
    },
    session::{Session, SessionManager},
    types::{BackendKind, EffectId, ProbeStatus},
    verdict::{self, EffectResult, Stage, Verdict},
    vision::{self, ParityStatus, VisionClient, VisionReport},
};

pub use report::Summary;
pub use select::{DEFAULT_PATTERN, Selection, match_effects, select, split_patterns};

/// Which checks a run performs beyond compile, render and console capture.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub backend: BackendKind,
    pub patterns: Vec<String>,
    pub uniforms: bool,
    pub passthrough: bool,
    pub benchmark: bool,
    pub structure: bool,
    pub structure_only: bool,
    pub alg_equiv: bool,
    pub skip_vision: bool,
    pub headless: bool,
    pub verbose: bool,
}

impl RunOptions {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            patterns: Vec::new(),
            uniforms: false,
            passthrough: false,
            benchmark: false,
            structure: false,
            structure_only: false,
            alg_equiv: false,
            skip_vision: false,
            headless: false,
            verbose: false,
        }
    }

    /// Every optional check.
    pub fn enable_all(&mut self) {
        self.uniforms = true;
        self.passthrough = true;
        self.benchmark = true;
        self.structure = true;
        self.alg_equiv = true;
    }

    fn patterns(&self) -> Vec<String> {
        if self.patterns.is_empty() {
            vec![DEFAULT_PATTERN.to_string()]
        } else {
            self.patterns.clone()
        }
    }
}

pub struct Runner {
    cfg: GateConfig,
    opts: RunOptions,
    exemptions: Exemptions,
    analyzer: StaticAnalyzer,
    vision: Option<VisionClient>,
}

fn elapsed_ms(t0: Instant) -> u128 {
    t0.elapsed().as_millis()
}

impl Runner {
    pub fn new(cfg: GateConfig, opts: RunOptions) -> Result<Self> {
        let exemptions = Exemptions::from(&cfg.exemptions);
        let analyzer = StaticAnalyzer::new(cfg.effects_dir(), exemptions.clone());
        let wants_model = opts.alg_equiv || !opts.skip_vision;
        let vision = if wants_model && !opts.structure_only {
            VisionClient::from_config(&cfg.vision, &cfg.project_root)
                .context("failed to set up vision client")?
        } else {
            None
        };
        Ok(Self {
            cfg,
            opts,
            exemptions,
            analyzer,
            vision,
        })
    }

    pub fn run(&self) -> Result<Summary> {
        if self.opts.structure_only {
            return self.run_structure_only();
        }
        self.run_browser()
    }

    /// Static analysis of disk-discovered effects; no server, no browser.
    pub fn run_structure_only(&self) -> Result<Summary> {
        let backend = self.opts.backend;
        println!("\n[STRUCTURE-ONLY MODE] No browser will be launched.");
        println!("Backend: {backend}\n");

        let all: Vec<String> = discover_effects(self.analyzer.effects_dir())
            .context("failed to discover effects")?
            .iter()
            .map(EffectId::to_string)
            .collect();
        println!("Found {} effects on disk.", all.len());

        let sel = select(&all, &self.opts.patterns());
        for p in &sel.unmatched {
            println!("No effects matched pattern: {p}");
        }
        if sel.matched.is_empty() {
            println!("No effects matched. Exiting.");
            return Ok(Summary {
                unmatched: sel.unmatched,
                ..Summary::default()
            });
        }
        println!("Testing {} effect(s):\n", sel.matched.len());

        let started = Instant::now();
        let mut verdicts = Vec::new();
        for id in &sel.matched {
            let Ok(effect) = id.parse::<EffectId>() else {
                continue;
            };
            let t0 = Instant::now();
            let report = self.analyzer.analyze(&effect, backend);
            let ms = elapsed_ms(t0);
            let reasons = report.failure_reasons();
            if reasons.is_empty() {
                println!("✓ {effect} [{ms}ms]");
            } else {
                println!("❌ {effect}: {} [{ms}ms]", reasons.join(", "));
                if self.opts.verbose || !report.naming_issues.is_empty() {
                    for issue in &report.naming_issues {
                        println!("   {issue}");
                    }
                }
            }
            verdicts.push(Verdict {
                effect,
                passed: reasons.is_empty(),
                reasons,
            });
        }

        let summary = Summary {
            verdicts,
            unmatched: sel.unmatched,
            elapsed: started.elapsed(),
        };
        summary.print();
        Ok(summary)
    }

    fn run_browser(&self) -> Result<Summary> {
        let backend = self.opts.backend;
        println!("\nStarting browser session (backend: {backend})...");
        let manager = SessionManager::new(self.cfg.clone());
        let mut session = manager
            .setup(self.opts.headless)
            .context("browser session setup failed")?;

        let outcome = self.run_in_session(&manager, &mut session);
        session.teardown();
        let summary = outcome?;
        summary.print();
        Ok(summary)
    }

    fn run_in_session(&self, manager: &SessionManager, session: &mut Session) -> Result<Summary> {
        let backend = self.opts.backend;
        session
            .configure_backend(backend, &self.cfg.timing)
            .with_context(|| format!("failed to switch page to {backend}"))?;

        let all = session.list_effects().context("failed to list effects")?;
        let sel = select(&all, &self.opts.patterns());
        for p in &sel.unmatched {
            println!("No effects matched pattern: {p}");
            let preview: Vec<&str> = all.iter().take(10).map(String::as_str).collect();
            println!("Available: {}...", preview.join(", "));
        }
        if sel.matched.is_empty() {
            println!("No effects matched. Exiting.");
            return Ok(Summary {
                unmatched: sel.unmatched,
                ..Summary::default()
            });
        }
        println!("\nTesting {} effect(s):\n", sel.matched.len());

        let started = Instant::now();
        let mut verdicts = Vec::new();
        for id in &sel.matched {
            let effect = match id.parse::<EffectId>() {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("[runner] skipping {id}: {e}");
                    continue;
                }
            };
            println!("\n{}", report::RULE);
            println!("[{effect}] ({backend})");

            let result = self.test_effect(manager, session, &effect);
            verdicts.push(verdict::evaluate(&result, &self.exemptions));

            std::thread::sleep(self.cfg.timing.grace_period());
        }

        Ok(Summary {
            verdicts,
            unmatched: sel.unmatched,
            elapsed: started.elapsed(),
        })
    }

    /// Every requested check for one effect, in a fixed order.
    pub fn test_effect(&self, manager: &SessionManager, session: &Session, effect: &EffectId) -> EffectResult {
        let backend = self.opts.backend;
        let mut r = EffectResult::new(effect.clone(), backend);
        session.clear_console();
        let mut t0 = Instant::now();

        if self.opts.structure {
            let report = self.analyzer.analyze(effect, backend);
            r.timings.push(("structure".into(), elapsed_ms(t0)));
            report::print_structure(&report, backend);
            let inline = report.has_inline_shaders;
            r.structure = Some(report);
            if inline {
                r.compile = Stage::Error("inline shaders".into());
                return r;
            }
        }

        if self.opts.alg_equiv {
            t0 = Instant::now();
            let dir = self.analyzer.effect_dir(effect);
            let eq = vision::parity::check_alg_equiv(self.vision.as_ref(), &dir);
            if eq.status != ParityStatus::Unavailable {
                r.timings.push(("alg-equiv".into(), elapsed_ms(t0)));
            }
            report::print_alg_equiv(&eq);
            r.alg_equiv = Some(eq);
        }

        let probe = RenderProbe::new(session, backend, &self.cfg.timing);

        t0 = Instant::now();
        let compiled = probe.compile(effect);
        r.timings.push(("compile".into(), elapsed_ms(t0)));
        match compiled {
            Ok(c) => {
                log::debug!("[runner] {effect}: passes {:?}", c.passes);
                r.compile = Stage::Ok;
                println!("  ✓ compile");
            }
            Err(e) => {
                println!("  ❌ compile: {e}");
                r.compile = Stage::Error(e.to_string());
                return r;
            }
        }

        t0 = Instant::now();
        let warmup = self.cfg.thresholds.warmup_frames;
        let rendered = probe.render(effect, &RenderOptions::reuse_compile(warmup));
        r.timings.push(("render".into(), elapsed_ms(t0)));
        match rendered {
            Ok(out) => {
                println!(
                    "{}",
                    report::render_line(
                        &out.metrics,
                        self.exemptions.is_monochrome_exempt(effect),
                        self.exemptions.is_blank_exempt(effect),
                        self.exemptions.is_transparent_exempt(effect),
                    )
                );
                r.render = Stage::Ok;
                r.metrics = Some(out.metrics);
            }
            Err(e) => {
                println!("  ❌ render: {e}");
                let messages = session.console_messages();
                if !messages.is_empty() {
                    println!("  Console errors:");
                    for msg in messages.iter().take(10) {
                        println!("    {}: {}", msg.kind, truncate(&msg.text, 500));
                    }
                }
                r.render = Stage::Error(e.to_string());
            }
        }

        if self.opts.uniforms {
            t0 = Instant::now();
            let u = probe
                .responsiveness(effect)
                .unwrap_or_else(|e| ResponsivenessReport::failed(e.to_string()));
            r.timings.push(("uniforms".into(), elapsed_ms(t0)));
            match u.status {
                ProbeStatus::Skipped => println!("  ⊘ uniforms: {}", u.details),
                ProbeStatus::Ok => println!("  ✓ uniforms: {}", u.tested_labels().join(", ")),
                _ => println!(
                    "  ❌ uniforms: {} [{}]",
                    u.details,
                    u.tested_labels().join(", ")
                ),
            }
            r.responsiveness = Some(u);
        }

        if self.opts.passthrough {
            t0 = Instant::now();
            let p = if self.exemptions.is_passthrough_exempt(effect) {
                PassthroughReport::skipped("exempt (effect preserves average colors by design)")
            } else {
                self.run_passthrough(&probe, effect)
            };
            r.timings.push(("passthrough".into(), elapsed_ms(t0)));
            match p.status {
                ProbeStatus::Skipped => println!("  ⊘ passthrough: {}", p.details),
                ProbeStatus::Ok => println!("  ✓ passthrough: {}", p.details),
                ProbeStatus::Passthrough => println!("  ❌ PASSTHROUGH DETECTED: {}", p.details),
                ProbeStatus::Error => println!("  ❌ passthrough: {}", p.details),
            }
            r.passthrough = Some(p);
        }

        if self.opts.benchmark {
            t0 = Instant::now();
            let b = manager.benchmark(session, effect, backend);
            r.timings.push(("benchmark".into(), elapsed_ms(t0)));
            match &b {
                Ok(stats) if stats.meets_target => {
                    println!("  ✓ benchmark: {} fps", stats.achieved_fps)
                }
                Ok(stats) => println!(
                    "  ❌ benchmark: {} fps (below {} fps target)",
                    stats.achieved_fps, stats.target_fps
                ),
                Err(e) => println!("  ❌ benchmark: {e}"),
            }
            r.benchmark = Some(b.map_err(|e| e.to_string()));
        }

        reset(&probe, effect);

        if !self.opts.skip_vision {
            if let Some(client) = &self.vision {
                t0 = Instant::now();
                let v = self.judge(&probe, client, effect);
                r.timings.push(("vision".into(), elapsed_ms(t0)));
                match (&v.observation, &v.reason) {
                    (None, Some(err)) => println!("  ❌ vision: {err}"),
                    (Some(_), Some(reason)) => println!("  ❌ vision: INVALID OUTPUT - {reason}"),
                    _ => println!("  ✓ vision: {}", v.summary()),
                }
                r.vision = Some(v);
            }
        }

        r.console_errors = session.console_errors();
        if !r.console_errors.is_empty() {
            println!(
                "  ❌ console errors: {} error(s)/warning(s)",
                r.console_errors.len()
            );
            if self.opts.verbose {
                for msg in r.console_errors.iter().take(5) {
                    println!("    {}: {}", msg.kind, truncate(&msg.text, 200));
                }
            }
        }

        reset(&probe, effect);
        println!("{}", report::timings_line(&r.timings));
        r
    }

    fn run_passthrough(&self, probe: &RenderProbe<'_>, effect: &EffectId) -> PassthroughReport {
        let is_filter = match self.analyzer.descriptor(effect) {
            Ok(d) => d.declares_external_input(),
            Err(e) => return PassthroughReport::failed(format!("descriptor unreadable: {e}")),
        };
        probe
            .passthrough(effect, is_filter)
            .unwrap_or_else(|e| PassthroughReport::failed(e.to_string()))
    }

    /// Capture a fresh frame from the live compile and ask the model about it.
    fn judge(&self, probe: &RenderProbe<'_>, client: &VisionClient, effect: &EffectId) -> VisionReport {
        let warmup = self.cfg.thresholds.warmup_frames;
        let png = probe
            .render(effect, &RenderOptions::reuse_compile(warmup))
            .and_then(|out| out.pixels.to_png());
        match png {
            Ok(png) => vision::frame::judge_frame(
                Some(client),
                &png,
                self.exemptions.is_monochrome_exempt(effect),
                self.exemptions.is_transparent_exempt(effect),
            ),
            Err(e) => VisionReport {
                status: vision::VisionStatus::Failed,
                observation: None,
                reason: Some(format!("frame capture failed: {e}")),
            },
        }
    }
}

fn reset(probe: &RenderProbe<'_>, effect: &EffectId) {
    if let Err(e) = probe.reset_uniforms() {
        log::warn!("[runner] {effect}: uniform reset failed: {e}");
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[test]
    fn all_enables_every_optional_check() {
        let mut o = RunOptions::new(BackendKind::Raster);
        o.enable_all();
        assert!(o.uniforms && o.passthrough && o.benchmark && o.structure && o.alg_equiv);
        assert!(!o.structure_only);
        assert_eq!(o.patterns(), vec![DEFAULT_PATTERN.to_string()]);
    }

    #[test]
    fn structure_only_run_needs_no_browser() {
        let dir = tempfile::tempdir().unwrap();
        let effect = dir.path().join("shaders/effects/basics/grain");
        std::fs::create_dir_all(effect.join("glsl")).unwrap();
        std::fs::write(
            effect.join("definition.js"),
            r#"export default class Grain { name = "grain"; func = "grain"; passes = [{ name: "main", program: "grain" }]; }"#,
        )
        .unwrap();
        std::fs::write(effect.join("glsl/grain.glsl"), "void main() {}").unwrap();

        let cfg = GateConfig {
            project_root: dir.path().to_path_buf(),
            ..GateConfig::default()
        };
        let mut opts = RunOptions::new(BackendKind::Raster);
        opts.structure_only = true;
        opts.patterns = vec!["basics/*".into()];
        let summary = Runner::new(cfg, opts).unwrap().run().unwrap();
        assert_eq!(summary.verdicts.len(), 1);
    }
}
