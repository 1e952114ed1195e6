use serde::Serialize;

use super::descriptor::EffectDescriptor;

pub const SINGLE_PASS_REASON: &str = "single-pass effect";
pub const EXEMPTION_LIST_REASON: &str = "on compute-pass exemption list";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassShape {
    pub multi_pass: bool,
    pub has_compute_pass: bool,
    pub pass_count: usize,
    pub pass_types: Vec<String>,
    pub compute_pass_exempt: bool,
    pub compute_pass_exempt_reason: Option<String>,
}

impl PassShape {
    /// A multi-pass effect without a compute pass that nothing exempts.
    pub fn violates(&self) -> bool {
        self.multi_pass && !self.has_compute_pass && !self.compute_pass_exempt
    }
}

pub fn pass_shape(desc: &EffectDescriptor, listed_exempt: bool) -> PassShape {
    let pass_count = desc.passes.len();
    let pass_types: Vec<String> = desc
        .passes
        .iter()
        .map(|p| p.kind.clone().unwrap_or_else(|| "render".to_string()))
        .collect();
    let multi_pass = pass_count > 1;
    let has_compute_pass = desc.passes.iter().any(|p| p.is_compute());
    let reason = if !multi_pass {
        Some(SINGLE_PASS_REASON)
    } else if listed_exempt {
        Some(EXEMPTION_LIST_REASON)
    } else {
        None
    };
    PassShape {
        multi_pass,
        has_compute_pass,
        pass_count,
        pass_types,
        compute_pass_exempt: reason.is_some(),
        compute_pass_exempt_reason: reason.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shape(src: &str, listed: bool) -> PassShape {
        pass_shape(
            &EffectDescriptor::parse(PathBuf::from("definition.js"), src.to_string()),
            listed,
        )
    }

    #[test]
    fn render_only_multi_pass_violates() {
        let s = shape(r#"class X { passes = [{ type: "render", program: "a" }, { type: "render", program: "b" }]; }"#, false);
        assert!(!s.has_compute_pass);
        assert!(!s.compute_pass_exempt);
        assert!(s.violates());
        assert!(!shape(r#"class X { passes = [{ program: "a" }, { program: "b" }]; }"#, true).violates());
    }

    #[test]
    fn single_pass_is_exempt() {
        let s = shape(r#"class X { passes = [{ program: "grain" }]; }"#, false);
        assert_eq!(s.compute_pass_exempt_reason.as_deref(), Some(SINGLE_PASS_REASON));
        assert_eq!(s.pass_types, vec!["render"]);
    }
}
