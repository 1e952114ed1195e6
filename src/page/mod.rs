//! The page under test, seen as a capability: evaluate a script, get JSON back.
//!
//! Everything the gate knows about the demo page goes through [`PageDriver`],
//! so probes run the same against a live browser tab or a scripted fake.

pub mod scripts;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    browser::BrowserPage,
    error::{GateError, Result},
};

pub trait PageDriver {
    /// Evaluate a script produced by [`scripts`] and return its JSON result.
    fn evaluate(&self, script: &str) -> Result<Value>;
}

impl PageDriver for BrowserPage {
    fn evaluate(&self, script: &str) -> Result<Value> {
        if let Some(op) = scripts::op_of(script) {
            log::trace!("[page] evaluate {op}");
        }
        BrowserPage::evaluate(self, script)
    }
}

impl<T: PageDriver + ?Sized> PageDriver for &T {
    fn evaluate(&self, script: &str) -> Result<Value> {
        (**self).evaluate(script)
    }
}

/// Evaluate and deserialize. A `{ "error": "..." }` result becomes `GateError::Protocol`.
pub fn eval_as<T: DeserializeOwned>(page: &dyn PageDriver, script: &str) -> Result<T> {
    let value = page.evaluate(script)?;
    if let Some(err) = script_error(&value) {
        return Err(GateError::Protocol(format!(
            "{}: {err}",
            scripts::op_of(script).unwrap_or("script")
        )));
    }
    serde_json::from_value(value).map_err(|e| {
        GateError::Protocol(format!(
            "{}: unexpected result shape: {e}",
            scripts::op_of(script).unwrap_or("script")
        ))
    })
}

/// The error string a page script reported, if any.
pub fn script_error(value: &Value) -> Option<&str> {
    value.get("error").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned(Value);

    impl PageDriver for Canned {
        fn evaluate(&self, _script: &str) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn eval_as_maps_script_error() {
        let page = Canned(json!({"error": "Pipeline not available"}));
        let err = eval_as::<u64>(&page, &scripts::frame_count()).unwrap_err();
        assert!(err.to_string().contains("frame_count"));
        assert!(err.to_string().contains("Pipeline not available"));
    }

    #[test]
    fn eval_as_deserializes() {
        let page = Canned(json!(42));
        assert_eq!(eval_as::<u64>(&page, &scripts::frame_count()).unwrap(), 42);
    }
}
