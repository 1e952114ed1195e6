//! Chrome driven through `headless_chrome`: launch with GPU flags, open one
//! tab, evaluate page scripts, forward console events.

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crossbeam_channel::Receiver;
use headless_chrome::{LaunchOptionsBuilder, Tab, protocol::cdp::types::Event};
use serde_json::Value;

use crate::{
    error::{GateError, Result},
    session::console::{self, ConsoleMessage},
};

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// `None` lets the driver find an installed Chrome.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub window_size: [u32; 2],
    pub extra_args: Vec<String>,
    pub idle_timeout: Duration,
}

/// Flags that expose the compute-capable API and keep GPU access inside the sandboxed child.
pub fn gpu_flags() -> Vec<String> {
    let angle = if cfg!(target_os = "macos") {
        "--use-angle=metal"
    } else {
        "--use-angle=vulkan"
    };
    vec![
        "--enable-unsafe-webgpu".to_string(),
        "--enable-features=Vulkan".to_string(),
        "--enable-webgpu-developer-features".to_string(),
        "--disable-gpu-sandbox".to_string(),
        angle.to_string(),
    ]
}

/// Explicit config wins, then `CHROME_PATH`.
pub fn resolve_executable(configured: Option<&Path>) -> Option<PathBuf> {
    configured.map(Path::to_path_buf).or_else(|| {
        std::env::var_os("CHROME_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    })
}

fn launch_args(opts: &LaunchSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--force-device-scale-factor=1".into(),
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
    ];
    args.extend(gpu_flags().into_iter().map(OsString::from));
    args.extend(opts.extra_args.iter().map(OsString::from));
    args
}

/// A launched Chrome. Dropping it kills the process.
pub struct Browser {
    inner: headless_chrome::Browser,
}

impl Browser {
    pub fn launch(opts: &LaunchSettings) -> Result<Self> {
        let args = launch_args(opts);
        let flags: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();
        let launch = LaunchOptionsBuilder::default()
            .headless(opts.headless)
            .enable_gpu(true)
            .window_size(Some((opts.window_size[0], opts.window_size[1])))
            .path(opts.executable.clone())
            .idle_browser_timeout(opts.idle_timeout)
            .args(flags)
            .build()
            .map_err(|e| GateError::Session(format!("launch options: {e}")))?;
        log::info!(
            "[session] launching {} (headless={})",
            opts.executable
                .as_deref()
                .map_or_else(|| "default chrome".to_string(), |p| p.display().to_string()),
            opts.headless
        );
        let inner = headless_chrome::Browser::new(launch)
            .map_err(|e| GateError::Session(format!("browser launch failed: {e}")))?;
        Ok(Self { inner })
    }

    /// Open a tab with the runtime domain on and console output routed to the returned page.
    pub fn new_page(&self, command_timeout: Duration) -> Result<BrowserPage> {
        let tab = self
            .inner
            .new_tab()
            .map_err(|e| GateError::Session(format!("open tab: {e}")))?;
        tab.set_default_timeout(command_timeout);
        tab.enable_runtime()
            .map_err(|e| GateError::Session(format!("enable runtime: {e}")))?;

        let (tx, rx) = crossbeam_channel::unbounded();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            if let Some(msg) = console_message(event) {
                let _ = tx.send(msg);
            }
        }))
        .map_err(|e| GateError::Session(format!("console listener: {e}")))?;

        Ok(BrowserPage { tab, console: rx })
    }

    pub fn close(self) {
        drop(self.inner);
        log::debug!("[session] browser closed");
    }
}

fn console_message(event: &Event) -> Option<ConsoleMessage> {
    let (method, params) = match event {
        Event::RuntimeConsoleAPICalled(e) => {
            ("Runtime.consoleAPICalled", serde_json::to_value(&e.params))
        }
        Event::RuntimeExceptionThrown(e) => {
            ("Runtime.exceptionThrown", serde_json::to_value(&e.params))
        }
        _ => return None,
    };
    console::from_event(method, &params.ok()?)
}

/// One tab on the demo page.
pub struct BrowserPage {
    tab: Arc<Tab>,
    console: Receiver<ConsoleMessage>,
}

impl BrowserPage {
    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| GateError::Session(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    /// Evaluate `script`, awaiting a returned promise, and return its JSON value.
    ///
    /// A throwing script comes back as `{ "error": ... }`.
    pub fn evaluate(&self, script: &str) -> Result<Value> {
        let remote = self
            .tab
            .evaluate(&json_result(script), true)
            .map_err(|e| GateError::Protocol(format!("evaluate: {e}")))?;
        decode_result(remote.value)
    }

    /// Console messages captured since the last call.
    pub fn console(&self) -> &Receiver<ConsoleMessage> {
        &self.console
    }

    pub fn close(&self) -> Result<()> {
        self.tab
            .close(false)
            .map_err(|e| GateError::Session(format!("close tab: {e}")))?;
        Ok(())
    }
}

/// Wrap `script` so its result crosses the protocol as a JSON string and
/// exceptions turn into an `error` field.
fn json_result(script: &str) -> String {
    format!(
        "(async () => {{\ntry {{\nconst value = await (\n{script}\n);\nreturn JSON.stringify(value ?? null);\n}} catch (e) {{\nreturn JSON.stringify({{ error: String((e && e.stack) || e) }});\n}}\n}})()"
    )
}

fn decode_result(value: Option<Value>) -> Result<Value> {
    match value {
        Some(Value::String(json)) => Ok(serde_json::from_str(&json)?),
        Some(other) => Err(GateError::Protocol(format!(
            "script result was not serialized: {other}"
        ))),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::page::scripts;

    fn settings(headless: bool) -> LaunchSettings {
        LaunchSettings {
            executable: None,
            headless,
            window_size: [1280, 720],
            extra_args: vec!["--mute-audio".into()],
            idle_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn launch_args_carry_gpu_and_extra_flags() {
        let args = launch_args(&settings(true));
        assert!(args.iter().any(|a| a == "--enable-unsafe-webgpu"));
        assert!(args.iter().any(|a| a == "--disable-gpu-sandbox"));
        assert!(args.iter().any(|a| a == "--mute-audio"));
        assert!(!args.iter().any(|a| a == "--disable-gpu"));
    }

    #[test]
    fn configured_executable_wins() {
        let p = resolve_executable(Some(Path::new("/opt/chrome/chrome")));
        assert_eq!(p, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[test]
    fn wrapped_script_keeps_op_tag_and_body() {
        let raw = scripts::frame_count();
        let wrapped = json_result(&raw);
        assert!(wrapped.contains(&raw));
        assert!(wrapped.contains("JSON.stringify(value ?? null)"));
        // The tag comment ends its own line inside the wrapper.
        assert!(wrapped.contains("await (\n// op:frame_count\n"));
    }

    #[test]
    fn serialized_results_decode() {
        assert_eq!(
            decode_result(Some(json!(r#"{"frame":12}"#))).unwrap(),
            json!({ "frame": 12 })
        );
        assert_eq!(decode_result(None).unwrap(), Value::Null);
        assert!(matches!(
            decode_result(Some(json!(3))),
            Err(GateError::Protocol(_))
        ));
        assert!(decode_result(Some(json!("{not json"))).is_err());
    }
}
