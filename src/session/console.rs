//! Captured console output, bounded by a keyword allow-list.

use serde::Serialize;
use serde_json::Value;


/// Substrings that make an ordinary log line worth keeping.
pub const KEYWORDS: &[&str] = &[
    "Error",
    "error",
    "warning",
    "Storage",
    "getOutput",
    "[bindTextures]",
    "DSL",
    "[WebGPU",
    "GPGPU",
    "[passthrough]",
    "[DEBUG]",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleMessage {
    /// `error`, `warning`, `log`, ... or `pageerror` for uncaught exceptions.
    pub kind: String,
    pub text: String,
}

impl ConsoleMessage {
    /// Whether this message fails an effect.
    pub fn is_error(&self) -> bool {
        matches!(self.kind.as_str(), "error" | "warning" | "pageerror")
    }
}

pub fn keep(kind: &str, text: &str) -> bool {
    matches!(kind, "error" | "warning") || KEYWORDS.iter().any(|k| text.contains(k))
}

/// Turn a runtime event (method name plus its params as JSON) into a
/// captured message, if it passes the filter.
pub fn from_event(method: &str, params: &Value) -> Option<ConsoleMessage> {
    match method {
        "Runtime.consoleAPICalled" => {
            let raw = params.get("type").and_then(Value::as_str).unwrap_or("log");
            // CDP spells it `warning`; normalize `warn` just in case.
            let kind = if raw == "warn" { "warning" } else { raw };
            let text = params
                .get("args")
                .and_then(Value::as_array)
                .map(|args| args.iter().map(remote_object_text).collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            keep(kind, &text).then(|| ConsoleMessage {
                kind: kind.to_string(),
                text,
            })
        }
        "Runtime.exceptionThrown" => {
            let details = params.get("exceptionDetails")?;
            Some(ConsoleMessage {
                kind: "pageerror".to_string(),
                text: exception_text(details),
            })
        }
        _ => None,
    }
}

/// Best human-readable line out of a `Runtime.ExceptionDetails`.
pub fn exception_text(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("unknown exception")
        .to_string()
}

fn remote_object_text(obj: &Value) -> String {
    match obj.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(v) if !v.is_null() => v.to_string(),
        _ => obj
            .get("description")
            .or_else(|| obj.get("unserializableValue"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ev(method: &str, params: Value) -> Option<ConsoleMessage> {
        from_event(method, &params)
    }

    #[test]
    fn errors_always_kept() {
        let m = ev(
            "Runtime.consoleAPICalled",
            json!({"type": "error", "args": [{"type": "string", "value": "shader link failed"}]}),
        )
        .unwrap();
        assert_eq!(m.kind, "error");
        assert!(m.is_error());
    }

    #[test]
    fn plain_logs_need_a_keyword() {
        let noisy = ev(
            "Runtime.consoleAPICalled",
            json!({"type": "log", "args": [{"type": "string", "value": "frame 12"}]}),
        );
        assert!(noisy.is_none());

        let tagged = ev(
            "Runtime.consoleAPICalled",
            json!({"type": "log", "args": [{"type": "string", "value": "[WebGPU] pipeline created"}, {"type": "number", "value": 3}]}),
        );
        let m = tagged.unwrap();
        assert_eq!(m.text, "[WebGPU] pipeline created 3");
        assert!(!m.is_error());
    }

    #[test]
    fn uncaught_exception_is_pageerror() {
        let m = ev(
            "Runtime.exceptionThrown",
            json!({"exceptionDetails": {"text": "Uncaught", "exception": {"description": "RangeError: bad"}}}),
        )
        .unwrap();
        assert_eq!(m.kind, "pageerror");
        assert_eq!(m.text, "RangeError: bad");
    }

    #[test]
    fn exception_text_prefers_description() {
        let d = json!({"text": "Uncaught", "exception": {"description": "TypeError: x is undefined"}});
        assert_eq!(exception_text(&d), "TypeError: x is undefined");
        assert_eq!(exception_text(&json!({"text": "Uncaught"})), "Uncaught");
    }

    #[test]
    fn other_runtime_events_are_ignored() {
        assert!(ev("Runtime.executionContextCreated", json!({"context": {"id": 1}})).is_none());
    }
}
