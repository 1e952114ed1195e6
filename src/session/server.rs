//! Reference-counted static file server.
//!
//! The first lease spawns the server, the last lease dropped stops it.

use std::{
    net::{TcpStream, ToSocketAddrs},
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    config::ServerConfig,
    error::{GateError, Result},
    wait::poll_or_timeout,
};

#[derive(Default)]
struct ServerState {
    count: usize,
    child: Option<Child>,
}

/// Handle to the shared server. Clone it freely; all clones share one process.
#[derive(Clone)]
pub struct SharedServer {
    cfg: ServerConfig,
    root: PathBuf,
    state: Arc<Mutex<ServerState>>,
}

impl SharedServer {
    pub fn new(cfg: ServerConfig, root: PathBuf) -> Self {
        Self {
            cfg,
            root,
            state: Arc::default(),
        }
    }

    pub fn base_url(&self) -> String {
        self.cfg.base_url()
    }

    pub fn ref_count(&self) -> usize {
        self.state.lock().map(|s| s.count).unwrap_or(0)
    }

    pub fn acquire(&self) -> Result<ServerLease> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GateError::Session("server state poisoned".into()))?;
        if state.count == 0 && state.child.is_none() {
            state.child = Some(self.spawn()?);
        }
        state.count += 1;
        log::debug!("[session] server acquired (refs={})", state.count);
        Ok(ServerLease {
            server: self.clone(),
        })
    }

    fn release(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.count = state.count.saturating_sub(1);
        log::debug!("[session] server released (refs={})", state.count);
        if state.count == 0 {
            if let Some(mut child) = state.child.take() {
                let _ = child.kill();
                let _ = child.wait();
                log::info!("[session] static server stopped");
            }
        }
    }

    fn spawn(&self) -> Result<Child> {
        log::info!(
            "[session] starting static server: {} {} on {}",
            self.cfg.command,
            self.cfg.args.join(" "),
            self.base_url()
        );
        let mut child = Command::new(&self.cfg.command)
            .args(&self.cfg.args)
            .current_dir(&self.root)
            .env("HOST", &self.cfg.host)
            .env("PORT", self.cfg.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                GateError::Session(format!("failed to start server `{}`: {e}", self.cfg.command))
            })?;

        let addr = format!("{}:{}", self.cfg.host, self.cfg.port);
        let ready = poll_or_timeout(
            "static server to accept connections",
            self.cfg.startup_timeout(),
            Duration::from_millis(50),
            || {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(GateError::Session(format!("server exited early: {status}")));
                }
                Ok(accepts(&addr).then_some(()))
            },
        );
        if let Err(e) = ready {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        Ok(child)
    }
}

fn accepts(addr: &str) -> bool {
    let Ok(mut addrs) = addr.to_socket_addrs() else {
        return false;
    };
    addrs.any(|a| TcpStream::connect_timeout(&a, Duration::from_millis(200)).is_ok())
}

/// Scoped reference to the running server; dropping it releases the reference.
pub struct ServerLease {
    server: SharedServer,
}

impl ServerLease {
    pub fn base_url(&self) -> String {
        self.server.base_url()
    }
}

impl Drop for ServerLease {
    fn drop(&mut self) {
        self.server.release();
    }
}
