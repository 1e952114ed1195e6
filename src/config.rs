//! Gate configuration.
//!
//! Loaded from `--config <path>` or `effect-gate.toml` in the project root.
//! Every field has a default so an absent or partial file is fine.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::EffectId;

pub const DEFAULT_CONFIG_FILE: &str = "effect-gate.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Repository root; effects live under `shaders/effects/<ns>/<name>/`.
    pub project_root: PathBuf,
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub timing: TimingConfig,
    pub thresholds: ThresholdConfig,
    pub exemptions: ExemptionConfig,
    pub vision: VisionConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            thresholds: ThresholdConfig::default(),
            exemptions: ExemptionConfig::default(),
            vision: VisionConfig::default(),
        }
    }
}

impl GateConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg: GateConfig = toml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(cfg)
    }

    /// Load `path` if given, else `effect-gate.toml` under `project_root` when it exists,
    /// else defaults.
    pub fn load_or_default(path: Option<&Path>, project_root: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let candidate = project_root.join(DEFAULT_CONFIG_FILE);
        let mut cfg = if candidate.is_file() {
            Self::load(&candidate)?
        } else {
            Self::default()
        };
        if cfg.project_root == Path::new(".") {
            cfg.project_root = project_root.to_path_buf();
        }
        Ok(cfg)
    }

    pub fn effects_dir(&self) -> PathBuf {
        self.project_root.join("shaders").join("effects")
    }

    pub fn effect_dir(&self, effect: &EffectId) -> PathBuf {
        self.effects_dir()
            .join(effect.namespace())
            .join(effect.name())
    }
}

/// The external static file server serving the demo page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub command: String,
    pub args: Vec<String>,
    pub startup_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4173,
            command: "node".to_string(),
            args: vec!["shaders/scripts/serve.js".to_string()],
            startup_timeout_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chrome/Chromium binary. Falls back to `CHROME_PATH`, then the driver's own lookup.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub window_size: [u32; 2],
    pub extra_args: Vec<String>,
    pub demo_path: String,
    /// How long the browser may stay silent before its connection is considered dead.
    pub idle_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: false,
            window_size: [1280, 720],
            extra_args: Vec::new(),
            demo_path: "/demo/shaders/".to_string(),
            idle_timeout_ms: 300_000,
        }
    }
}

impl BrowserConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Bound on compile-status and page-readiness waits.
    pub status_timeout_ms: u64,
    /// Bound on warm-up frame waits.
    pub render_timeout_ms: u64,
    pub backend_switch_timeout_ms: u64,
    pub page_ready_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Pause between effects so prior GPU work settles.
    pub grace_period_ms: u64,
    /// Bound on a single CDP round trip.
    pub command_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            status_timeout_ms: 1_000,
            render_timeout_ms: 5_000,
            backend_switch_timeout_ms: 10_000,
            page_ready_timeout_ms: 15_000,
            poll_interval_ms: 10,
            grace_period_ms: 100,
            command_timeout_ms: 30_000,
        }
    }
}

impl TimingConfig {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn backend_switch_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_switch_timeout_ms)
    }

    pub fn page_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.page_ready_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub warmup_frames: u64,
    pub benchmark_target_fps: f64,
    pub benchmark_duration_secs: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warmup_frames: 10,
            benchmark_target_fps: 30.0,
            benchmark_duration_secs: 0.5,
        }
    }
}

impl ThresholdConfig {
    pub fn benchmark_duration(&self) -> Duration {
        Duration::from_secs_f64(self.benchmark_duration_secs.max(0.0))
    }
}

/// Per-class exemption lists. Each list suppresses exactly one failure class
/// for exactly the effect ids it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExemptionConfig {
    pub monochrome: Vec<String>,
    pub blank: Vec<String>,
    pub transparent: Vec<String>,
    pub passthrough: Vec<String>,
    pub compute_pass: Vec<String>,
}

impl Default for ExemptionConfig {
    fn default() -> Self {
        Self {
            monochrome: vec![
                "classicBasics/alpha".to_string(),
                "classicBasics/shape".to_string(),
                "classicBasics/solid".to_string(),
            ],
            blank: Vec::new(),
            transparent: Vec::new(),
            passthrough: vec![
                "classicBasics/pixelate".to_string(),
                "classicNoisemaker/aberration".to_string(),
                "classicNoisemaker/fxaa".to_string(),
                "classicNoisemaker/onScreenDisplay".to_string(),
                "classicNoisemaker/strayHair".to_string(),
            ],
            compute_pass: Vec::new(),
        }
    }
}

/// The same lists, resolved into lookup sets.
#[derive(Debug, Clone, Default)]
pub struct Exemptions {
    pub monochrome: HashSet<String>,
    pub blank: HashSet<String>,
    pub transparent: HashSet<String>,
    pub passthrough: HashSet<String>,
    pub compute_pass: HashSet<String>,
}

impl From<&ExemptionConfig> for Exemptions {
    fn from(cfg: &ExemptionConfig) -> Self {
        let set = |v: &Vec<String>| v.iter().map(|s| s.trim().to_string()).collect();
        Self {
            monochrome: set(&cfg.monochrome),
            blank: set(&cfg.blank),
            transparent: set(&cfg.transparent),
            passthrough: set(&cfg.passthrough),
            compute_pass: set(&cfg.compute_pass),
        }
    }
}

impl Exemptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_monochrome_exempt(&self, effect: &EffectId) -> bool {
        self.monochrome.contains(&effect.to_string())
    }

    pub fn is_blank_exempt(&self, effect: &EffectId) -> bool {
        self.blank.contains(&effect.to_string())
    }

    pub fn is_transparent_exempt(&self, effect: &EffectId) -> bool {
        self.transparent.contains(&effect.to_string())
    }

    pub fn is_passthrough_exempt(&self, effect: &EffectId) -> bool {
        self.passthrough.contains(&effect.to_string())
    }

    pub fn is_compute_pass_exempt(&self, effect: &EffectId) -> bool {
        self.compute_pass.contains(&effect.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub model: String,
    pub endpoint: String,
    /// Credential file, relative to the project root.
    pub key_file: PathBuf,
    pub key_env: String,
    pub request_timeout_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            key_file: PathBuf::from(".openai"),
            key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: GateConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [exemptions]
            monochrome = ["basics/solid"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.timing.status_timeout_ms, 1_000);
        assert_eq!(cfg.exemptions.monochrome, vec!["basics/solid".to_string()]);
        assert!(!cfg.exemptions.passthrough.is_empty());
    }

    #[test]
    fn exemptions_are_per_class() {
        let ex = Exemptions::from(&ExemptionConfig::default());
        let solid: EffectId = "classicBasics/solid".parse().unwrap();
        assert!(ex.is_monochrome_exempt(&solid));
        assert!(!ex.is_blank_exempt(&solid));
        assert!(!ex.is_transparent_exempt(&solid));
    }
}
