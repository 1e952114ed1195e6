//! Browser session lifecycle: shared server, isolated page, backend selection.

pub mod console;
pub mod server;

use std::sync::Mutex;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    browser::{Browser, BrowserPage, LaunchSettings, resolve_executable},
    config::{GateConfig, TimingConfig},
    error::{GateError, Result},
    page::{PageDriver, eval_as, scripts},
    probe::{BenchmarkStats, RenderProbe},
    types::{BackendKind, EffectId},
    wait::poll_or_timeout,
};

pub use console::ConsoleMessage;
pub use server::{ServerLease, SharedServer};

/// Status text fragment the page shows once a backend switch finished.
const SWITCHED_MARKER: &str = "switched to";

#[derive(Debug, Deserialize)]
struct BackendState {
    label: Option<String>,
    name: Option<String>,
    #[serde(default)]
    status: String,
}

impl BackendState {
    fn is(&self, kind: BackendKind) -> bool {
        self.label.as_deref() == Some(kind.page_label())
    }

    /// Both the status text and the live backend object agree on `kind`.
    fn confirms(&self, kind: BackendKind) -> bool {
        let status = self.status.to_lowercase();
        let status_ok = status.contains(SWITCHED_MARKER)
            && (status.contains(&kind.backend_name().to_lowercase())
                || status.contains(kind.page_label()));
        let name_ok = self
            .name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(kind.backend_name()));
        status_ok && name_ok
    }
}

/// One launched browser with one isolated page on the demo.
///
/// Created by [`SessionManager::setup`]; consumed by [`Session::teardown`].
pub struct Session {
    page: BrowserPage,
    browser: Browser,
    console: Mutex<Vec<ConsoleMessage>>,
    backend: Option<BackendKind>,
    headless: bool,
    _lease: ServerLease,
}

impl PageDriver for Session {
    fn evaluate(&self, script: &str) -> Result<Value> {
        self.page.evaluate(script)
    }
}

impl Session {
    pub fn backend(&self) -> Option<BackendKind> {
        self.backend
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Move pending page events into the console buffer.
    fn drain_events(&self) {
        let Ok(mut buf) = self.console.lock() else {
            return;
        };
        for msg in self.page.console().try_iter() {
            log::debug!("[session] console {}: {}", msg.kind, msg.text);
            buf.push(msg);
        }
    }

    /// Forget everything captured so far; called before each effect.
    pub fn clear_console(&self) {
        self.drain_events();
        if let Ok(mut buf) = self.console.lock() {
            buf.clear();
        }
    }

    pub fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.drain_events();
        self.console.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Captured messages that fail an effect (error, warning, pageerror).
    pub fn console_errors(&self) -> Vec<ConsoleMessage> {
        self.console_messages()
            .into_iter()
            .filter(ConsoleMessage::is_error)
            .collect()
    }

    /// Effect ids offered by the page's selector.
    pub fn list_effects(&self) -> Result<Vec<String>> {
        eval_as(self, &scripts::list_effects())
    }

    /// Switch the page to `kind`. A no-op when it is already active.
    pub fn configure_backend(&mut self, kind: BackendKind, timing: &TimingConfig) -> Result<()> {
        let state: BackendState = eval_as(&*self, &scripts::backend_state())?;
        if state.is(kind) {
            self.backend = Some(kind);
            log::debug!("[session] backend already {kind}");
            return Ok(());
        }

        log::info!("[session] switching backend to {kind}");
        let _: Value = eval_as(&*self, &scripts::switch_backend(kind))?;
        poll_or_timeout(
            &format!("backend switch to {kind}"),
            timing.backend_switch_timeout(),
            timing.poll_interval(),
            || {
                let state: BackendState = eval_as(&*self, &scripts::backend_state())?;
                Ok(state.confirms(kind).then_some(()))
            },
        )
        .map_err(|e| GateError::Session(format!("backend switch to {kind} not confirmed: {e}")))?;
        self.backend = Some(kind);
        Ok(())
    }

    /// Close page and browser. The browser goes even if the page close failed.
    pub fn teardown(self) {
        let Session {
            browser,
            page,
            _lease,
            ..
        } = self;
        if let Err(e) = page.close() {
            log::debug!("[session] page close: {e}");
        }
        drop(page);
        browser.close();
        drop(_lease);
        log::debug!("[session] torn down");
    }
}

/// Creates sessions against one shared server.
pub struct SessionManager {
    cfg: GateConfig,
    server: SharedServer,
}

impl SessionManager {
    pub fn new(cfg: GateConfig) -> Self {
        let server = SharedServer::new(cfg.server.clone(), cfg.project_root.clone());
        Self { cfg, server }
    }

    pub fn config(&self) -> &GateConfig {
        &self.cfg
    }

    pub fn server(&self) -> &SharedServer {
        &self.server
    }

    /// Launch a browser on the demo page and wait until its effect catalog is populated.
    pub fn setup(&self, headless: bool) -> Result<Session> {
        let lease = self.server.acquire()?;
        let browser_cfg = &self.cfg.browser;
        let opts = LaunchSettings {
            executable: resolve_executable(browser_cfg.executable.as_deref()),
            headless,
            window_size: browser_cfg.window_size,
            extra_args: browser_cfg.extra_args.clone(),
            idle_timeout: browser_cfg.idle_timeout(),
        };
        // Each session owns its browser and throwaway profile, so nothing leaks between runs.
        let browser = Browser::launch(&opts)?;
        let page = match browser.new_page(self.cfg.timing.command_timeout()) {
            Ok(p) => p,
            Err(e) => {
                browser.close();
                return Err(e);
            }
        };
        let session = Session {
            page,
            browser,
            console: Mutex::new(Vec::new()),
            backend: None,
            headless,
            _lease: lease,
        };

        let url = format!("{}{}", self.server.base_url(), browser_cfg.demo_path);
        if let Err(e) = self.open_demo(&session, &url) {
            session.teardown();
            return Err(e);
        }
        log::info!(
            "[session] ready at {url} ({})",
            if headless { "headless" } else { "headed" }
        );
        Ok(session)
    }

    fn open_demo(&self, session: &Session, url: &str) -> Result<()> {
        session.page.navigate(url)?;
        let timing = &self.cfg.timing;
        poll_or_timeout(
            "demo page effect catalog",
            timing.page_ready_timeout(),
            timing.poll_interval().max(std::time::Duration::from_millis(50)),
            || {
                // The page may still be loading; script errors here are not fatal.
                let ready = eval_as::<bool>(session, &scripts::app_ready()).unwrap_or(false);
                Ok(ready.then_some(()))
            },
        )
    }

    /// Benchmark `effect` on `kind`.
    ///
    /// Headless GPU timing is unreliable, so a headless `primary` hands the
    /// measurement to a short-lived headed session that is torn down right
    /// after.
    pub fn benchmark(
        &self,
        primary: &Session,
        effect: &EffectId,
        kind: BackendKind,
    ) -> Result<BenchmarkStats> {
        let t = &self.cfg.thresholds;
        if !primary.is_headless() {
            let probe = RenderProbe::new(primary, kind, &self.cfg.timing);
            return probe.benchmark(effect, t.benchmark_target_fps, t.benchmark_duration(), true);
        }

        log::info!("[session] headed session for benchmarking {effect}");
        let mut secondary = self.setup(false)?;
        let result = secondary
            .configure_backend(kind, &self.cfg.timing)
            .and_then(|()| {
                let probe = RenderProbe::new(&secondary, kind, &self.cfg.timing);
                probe.benchmark(effect, t.benchmark_target_fps, t.benchmark_duration(), false)
            });
        secondary.teardown();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(label: &str, name: &str, status: &str) -> BackendState {
        BackendState {
            label: Some(label.into()),
            name: Some(name.into()),
            status: status.into(),
        }
    }

    #[test]
    fn switch_needs_both_status_and_backend_object() {
        let kind = BackendKind::Compute;
        assert!(state("wgsl", "WebGPU", "Switched to WebGPU").confirms(kind));
        // Status updated but the backend object is still the old one.
        assert!(!state("wgsl", "WebGL2", "Switched to WebGPU").confirms(kind));
        // Backend rebuilt but status not yet updated.
        assert!(!state("wgsl", "WebGPU", "compiling...").confirms(kind));
    }

    #[test]
    fn current_backend_matches_by_label() {
        assert!(state("glsl", "WebGL2", "").is(BackendKind::Raster));
        assert!(!state("glsl", "WebGL2", "").is(BackendKind::Compute));
    }
}
