//! Remote vision model: frame judgement and cross-backend shader comparison.
//!
//! Without a credential every check here reports `unavailable`, never failed.

pub mod frame;
pub mod parity;

use std::{path::Path, time::Duration};

use reqwest::blocking::Client;
use serde_json::{Value, json};

use crate::{
    config::VisionConfig,
    error::{GateError, Result},
};

pub use frame::{VisionObservation, VisionReport, VisionStatus};
pub use parity::{AlgEquivReport, ParityStatus};

const MAX_TOKENS: u32 = 500;

/// Credential from the key file under `project_root`, else the configured env var.
pub fn api_key(cfg: &VisionConfig, project_root: &Path) -> Option<String> {
    let from_file = std::fs::read_to_string(project_root.join(&cfg.key_file))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    from_file.or_else(|| {
        std::env::var(&cfg.key_env)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

pub struct VisionClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl VisionClient {
    /// `Ok(None)` when no credential is configured.
    pub fn from_config(cfg: &VisionConfig, project_root: &Path) -> Result<Option<Self>> {
        let Some(api_key) = api_key(cfg, project_root) else {
            log::info!("[vision] no credential; vision checks unavailable");
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| GateError::VisionService(format!("http client: {e}")))?;
        Ok(Some(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key,
        }))
    }

    /// Send one user message made of `content` parts; parse the reply as a JSON object.
    pub fn ask_json(&self, content: Vec<Value>) -> Result<Value> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": MAX_TOKENS,
            "response_format": { "type": "json_object" },
        });
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| GateError::VisionService(format!("request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(GateError::VisionService(format!(
                "API error: {} - {}",
                status.as_u16(),
                text
            )));
        }
        let data: Value = resp
            .json()
            .map_err(|e| GateError::VisionService(format!("bad response body: {e}")))?;
        let content = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| GateError::VisionService("no response from vision model".into()))?;
        serde_json::from_str(content)
            .map_err(|e| GateError::VisionService(format!("reply is not JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_wins_and_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".openai"), "  sk-test\n").unwrap();
        let cfg = VisionConfig {
            key_env: "EFFECT_GATE_TEST_UNSET_KEY".into(),
            ..VisionConfig::default()
        };
        assert_eq!(api_key(&cfg, dir.path()).as_deref(), Some("sk-test"));
    }

    #[test]
    fn no_credential_means_no_client() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = VisionConfig {
            key_env: "EFFECT_GATE_TEST_UNSET_KEY".into(),
            ..VisionConfig::default()
        };
        assert!(VisionClient::from_config(&cfg, dir.path()).unwrap().is_none());
    }
}
