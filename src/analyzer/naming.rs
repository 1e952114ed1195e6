//! Lower-camel-case naming rules for every identifier an effect declares.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::descriptor::EffectDescriptor;

fn lower_camel_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("invalid naming regex"))
}

/// Texture names wired by the runtime itself.
pub const RESERVED_TEXTURES: &[&str] = &[
    "inputTex",
    "outputTex",
    "outputColor",
    "outputBuffer",
    "o0",
    "o1",
    "o2",
    "o3",
    "o4",
    "o5",
    "o6",
    "o7",
    "none",
];

/// Texture prefixes whose remainder only needs to start lowercase.
pub const TEXTURE_PREFIXES: &[&str] = &["global_", "_"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl std::fmt::Display for NamingIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.expected, &self.reason) {
            (Some(exp), _) => write!(f, "{}: \"{}\" → expected \"{}\"", self.kind, self.name, exp),
            (None, Some(reason)) => write!(f, "{}: \"{}\" - {}", self.kind, self.name, reason),
            (None, None) => write!(f, "{}: \"{}\"", self.kind, self.name),
        }
    }
}

pub fn is_lower_camel(s: &str) -> bool {
    lower_camel_regex().is_match(s)
}

/// Best-effort lower-camel spelling: words split on separators and case
/// changes, first word lowercased, the rest capitalized.
pub fn to_lower_camel(s: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if !c.is_alphanumeric() {
            if !cur.is_empty() {
                words.push(std::mem::take(&mut cur));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !cur.is_empty() {
            words.push(std::mem::take(&mut cur));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        cur.push(c);
    }
    if !cur.is_empty() {
        words.push(cur);
    }

    let mut out = String::new();
    for (i, w) in words.iter().enumerate() {
        let lower = w.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

fn issue(kind: &str, name: &str) -> NamingIssue {
    let expected = to_lower_camel(name);
    if is_lower_camel(&expected) {
        NamingIssue {
            kind: kind.to_string(),
            name: name.to_string(),
            expected: Some(expected),
            reason: None,
        }
    } else {
        NamingIssue {
            kind: kind.to_string(),
            name: name.to_string(),
            expected: None,
            reason: Some("must start with a lowercase letter and contain only letters and digits".into()),
        }
    }
}

fn check(out: &mut Vec<NamingIssue>, kind: &str, name: &str) {
    if !is_lower_camel(name) {
        out.push(issue(kind, name));
    }
}

pub fn is_valid_texture_name(name: &str) -> bool {
    if RESERVED_TEXTURES.contains(&name) || is_lower_camel(name) {
        return true;
    }
    TEXTURE_PREFIXES.iter().any(|p| {
        name.strip_prefix(p)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_lowercase())
    })
}

/// All naming issues for the effect stored in directory `dir_name`.
pub fn check_names(dir_name: &str, desc: &EffectDescriptor) -> Vec<NamingIssue> {
    let mut out = Vec::new();

    check(&mut out, "effectDir", dir_name);
    if let Some(func) = desc.func.as_deref() {
        check(&mut out, "func", func);
        if func != dir_name {
            out.push(NamingIssue {
                kind: "diskNameMismatch".into(),
                name: dir_name.to_string(),
                expected: Some(func.to_string()),
                reason: Some(format!(
                    "directory \"{dir_name}\" does not match func \"{func}\""
                )),
            });
        }
    }

    for (key, spec) in &desc.globals {
        check(&mut out, "globalKey", key);
        if let Some(uniform) = spec.get("uniform").and_then(Value::as_str) {
            check(&mut out, "uniform", uniform);
        }
        if let Some(choices) = spec.get("choices").and_then(Value::as_object) {
            for choice in choices.keys() {
                check(&mut out, "enumKey", choice);
            }
        }
    }

    for pass in &desc.passes {
        if let Some(name) = pass.name.as_deref() {
            check(&mut out, "passName", name);
        }
        if let Some(program) = pass.program.as_deref() {
            check(&mut out, "program", program);
        }
        for (key, _) in &pass.inputs {
            check(&mut out, "passInputKey", key);
        }
        for (key, _) in &pass.outputs {
            check(&mut out, "passOutputKey", key);
        }
    }

    let mut seen: Vec<&str> = Vec::new();
    let referenced = desc
        .passes
        .iter()
        .flat_map(|p| p.inputs.iter().chain(&p.outputs))
        .filter_map(|(_, v)| v.as_str());
    for tex in desc.textures.iter().map(String::as_str).chain(referenced) {
        if seen.contains(&tex) {
            continue;
        }
        seen.push(tex);
        if !is_valid_texture_name(tex) {
            out.push(issue("texture", tex));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn desc(src: &str) -> EffectDescriptor {
        EffectDescriptor::parse(PathBuf::from("definition.js"), src.to_string())
    }

    #[test]
    fn lower_camel_conversion() {
        assert_eq!(to_lower_camel("Random Mix"), "randomMix");
        assert_eq!(to_lower_camel("erosion_worms"), "erosionWorms");
        assert_eq!(to_lower_camel("BrightPass"), "brightPass");
        assert_eq!(to_lower_camel("my-effect2"), "myEffect2");
    }

    #[test]
    fn texture_relaxations() {
        assert!(is_valid_texture_name("_brightTex"));
        assert!(is_valid_texture_name("global_physarum_state"));
        assert!(is_valid_texture_name("outputTex"));
        assert!(!is_valid_texture_name("_BrightTex"));
        assert!(!is_valid_texture_name("bright_tex"));
    }

    #[test]
    fn enum_key_with_space() {
        let d = desc(
            r#"class X { func = "mix"; globals = { mode: { type: "int", uniform: "mode", choices: { "Random Mix": 0, plain: 1 } } }; }"#,
        );
        let issues = check_names("mix", &d);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, "enumKey");
        assert_eq!(issues[0].expected.as_deref(), Some("randomMix"));
    }

    #[test]
    fn digit_leading_name_gets_reason() {
        let d = desc(r#"class X { func = "x"; passes = [{ name: "2nd", program: "x" }]; }"#);
        let issues = check_names("x", &d);
        assert_eq!(issues[0].kind, "passName");
        assert!(issues[0].reason.is_some());
    }
}
