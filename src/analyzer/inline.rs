//! Shader source embedded in descriptor text.

use serde::Serialize;

use super::lexer::{Token, TokenKind};

/// Substrings that only appear in shader code.
const MARKERS: &[(&str, &str)] = &[
    ("#version", "version pragma"),
    ("precision highp", "precision qualifier"),
    ("precision mediump", "precision qualifier"),
    ("precision lowp", "precision qualifier"),
    ("@binding", "binding attribute"),
    ("@group", "binding attribute"),
    ("@vertex", "entry point attribute"),
    ("@fragment", "entry point attribute"),
    ("@compute", "entry point attribute"),
];

/// Object keys that hold shader source when given a template literal.
const SOURCE_FIELDS: &[&str] = &["glsl", "wgsl", "fragment", "vertex", "source"];

const SNIPPET_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineShaderLocation {
    pub line: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub snippet: String,
}

fn snippet(s: &str) -> String {
    s.trim_start()
        .chars()
        .take(SNIPPET_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/// Every string literal carrying a shader marker, and every shader-source
/// field assigned a template literal. One location per literal.
pub fn find_inline_shaders(tokens: &[Token]) -> Vec<InlineShaderLocation> {
    let mut out = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        let (TokenKind::Str(text) | TokenKind::Template(text)) = &tok.kind else {
            continue;
        };
        if let Some((_, kind)) = MARKERS.iter().find(|(m, _)| text.contains(m)) {
            out.push(InlineShaderLocation {
                line: tok.line,
                kind: kind.to_string(),
                snippet: snippet(text),
            });
            continue;
        }
        let is_template = matches!(tok.kind, TokenKind::Template(_));
        let field = i
            .checked_sub(2)
            .filter(|_| tokens[i - 1].is_punct(':'))
            .and_then(|k| tokens[k].ident().or(match &tokens[k].kind {
                TokenKind::Str(s) => Some(s.as_str()),
                _ => None,
            }));
        if let Some(field) = field.filter(|f| is_template && SOURCE_FIELDS.contains(f)) {
            out.push(InlineShaderLocation {
                line: tok.line,
                kind: format!("template shader field `{field}`"),
                snippet: snippet(text),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::lexer::tokenize;

    #[test]
    fn version_pragma_in_template() {
        let src = "class X {\n  shaders = {\n    deposit: {\n      vertex: `#version 300 es\nprecision highp float;\nvoid main() {}`\n    }\n  };\n}";
        let locs = find_inline_shaders(&tokenize(src));
        assert_eq!(locs.len(), 1);
        assert_eq!(locs[0].line, 4);
        assert_eq!(locs[0].kind, "version pragma");
        assert!(locs[0].snippet.starts_with("#version 300 es"));
    }

    #[test]
    fn wgsl_attributes_in_string() {
        let locs = find_inline_shaders(&tokenize(r#"x = "@group(0) @binding(1) var t: texture_2d<f32>;""#));
        assert_eq!(locs[0].kind, "binding attribute");
    }

    #[test]
    fn markerless_template_in_source_field() {
        let locs = find_inline_shaders(&tokenize("p = { fragment: `void main() { }` };"));
        assert_eq!(locs.len(), 1);
        assert!(locs[0].kind.contains("fragment"));
    }

    #[test]
    fn ordinary_strings_are_fine() {
        let src = r#"class X { name = "Grain"; passes = [{ program: "grain", vertex: "default" }]; }"#;
        assert!(find_inline_shaders(&tokenize(src)).is_empty());
    }
}
