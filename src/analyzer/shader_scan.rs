//! Line/token scanner for GLSL and WGSL sources.
//!
//! Good enough to tell declarations from uses of a handful of well-known
//! names. It does not understand expressions.

use crate::types::BackendKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Ident(String),
    Punct(char),
    /// Preprocessor directive name without the `#`, e.g. `define`.
    Directive(String),
    Num,
}

#[derive(Debug, Clone)]
pub struct ShaderToken {
    pub tok: Tok,
    pub line: usize,
}

impl ShaderToken {
    fn ident(&self) -> Option<&str> {
        match &self.tok {
            Tok::Ident(s) => Some(s),
            _ => None,
        }
    }

    fn is(&self, c: char) -> bool {
        self.tok == Tok::Punct(c)
    }
}

/// Tokenize shader source with comments removed.
pub fn scan(src: &str) -> Vec<ShaderToken> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut line = 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i += 2;
        } else if c == '#' {
            let begin = i + 1;
            i = begin;
            while i < chars.len() && chars[i].is_ascii_alphabetic() {
                i += 1;
            }
            out.push(ShaderToken {
                tok: Tok::Directive(chars[begin..i].iter().collect()),
                line,
            });
        } else if c.is_ascii_alphabetic() || c == '_' {
            let begin = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(ShaderToken {
                tok: Tok::Ident(chars[begin..i].iter().collect()),
                line,
            });
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            out.push(ShaderToken { tok: Tok::Num, line });
        } else {
            out.push(ShaderToken {
                tok: Tok::Punct(c),
                line,
            });
            i += 1;
        }
    }
    out
}

const GLSL_TYPES: &[&str] = &[
    "float", "int", "uint", "bool", "vec2", "vec3", "vec4", "ivec2", "ivec3", "ivec4", "uvec2",
    "uvec3", "uvec4", "bvec2", "bvec3", "bvec4", "mat2", "mat3", "mat4", "sampler2D", "sampler3D",
    "samplerCube", "void",
];

/// How a name is made available, if it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Uniform,
    Local,
    Macro,
    Function,
    Param,
    StructField,
}

/// Analysis of one name within one shader.
#[derive(Debug, Clone, Default)]
pub struct NameUsage {
    pub bindings: Vec<Binding>,
    /// Lines using the name outside its own declarations.
    pub use_lines: Vec<usize>,
}

impl NameUsage {
    pub fn is_declared_or_shadowed(&self) -> bool {
        !self.bindings.is_empty()
    }
}

/// Find how `name` is declared in `toks` and where it is used.
pub fn usage(toks: &[ShaderToken], name: &str, backend: BackendKind) -> NameUsage {
    let mut usage = NameUsage::default();
    let mut decl_lines: Vec<usize> = Vec::new();

    for (i, t) in toks.iter().enumerate() {
        if t.ident() != Some(name) {
            if let Tok::Directive(d) = &t.tok {
                if d == "define" && toks.get(i + 1).and_then(ShaderToken::ident) == Some(name) {
                    usage.bindings.push(Binding::Macro);
                    decl_lines.push(t.line);
                }
            }
            continue;
        }

        let prev = i.checked_sub(1).and_then(|p| toks.get(p));
        let next = toks.get(i + 1);
        let prev_ident = prev.and_then(ShaderToken::ident);

        if prev.is_some_and(|p| p.is('.')) {
            // Member access: `u.time` is the struct's name, not a bare use.
            continue;
        }
        if matches!(backend, BackendKind::Raster) && enclosing_keyword(toks, i) == Some("struct") {
            // GLSL members are only reachable through an instance, so they neither
            // declare nor use the bare name.
            continue;
        }

        let binding = match backend {
            BackendKind::Raster => glsl_binding(toks, i, prev_ident, next),
            BackendKind::Compute => wgsl_binding(toks, i, prev_ident, next),
        };
        match binding {
            Some(b) => {
                usage.bindings.push(b);
                decl_lines.push(t.line);
            }
            None => usage.use_lines.push(t.line),
        }
    }

    usage.use_lines.retain(|l| !decl_lines.contains(l));
    usage.use_lines.dedup();
    usage
}

fn glsl_binding(
    toks: &[ShaderToken],
    i: usize,
    prev_ident: Option<&str>,
    next: Option<&ShaderToken>,
) -> Option<Binding> {
    prev_ident.filter(|p| GLSL_TYPES.contains(p))?;
    // `uniform [precision] <type> name`
    let uniform = toks[..i]
        .iter()
        .rev()
        .skip(1)
        .take(2)
        .filter_map(ShaderToken::ident)
        .any(|w| w == "uniform");
    if uniform {
        return Some(Binding::Uniform);
    }
    if next.is_some_and(|n| n.is('(')) {
        // `float name(`; constructor calls have no type before the name.
        return Some(Binding::Function);
    }
    let in_params = toks[..i]
        .iter()
        .rev()
        .take_while(|t| !t.is(';') && !t.is('{') && !t.is('}'))
        .any(|t| t.is('('));
    Some(if in_params { Binding::Param } else { Binding::Local })
}

fn wgsl_binding(
    toks: &[ShaderToken],
    i: usize,
    prev_ident: Option<&str>,
    next: Option<&ShaderToken>,
) -> Option<Binding> {
    match prev_ident {
        Some("fn") => return Some(Binding::Function),
        Some("let" | "const" | "override") => return Some(Binding::Local),
        Some("var") => return Some(Binding::Local),
        _ => {}
    }
    // `var<uniform> name`
    if i >= 4
        && toks[i - 1].is('>')
        && toks[i - 2].ident() == Some("uniform")
        && toks[i - 3].is('<')
        && toks[i - 4].ident() == Some("var")
    {
        return Some(Binding::Uniform);
    }
    if !next.is_some_and(|n| n.is(':')) {
        return None;
    }
    match enclosing_keyword(toks, i)? {
        "struct" => Some(Binding::StructField),
        _ => Some(Binding::Param),
    }
}

/// `struct` or `fn` when `i` sits directly inside `struct Name { .. }` or `fn name( .. )`.
fn enclosing_keyword(toks: &[ShaderToken], i: usize) -> Option<&str> {
    let mut depth = 0usize;
    for j in (0..i).rev() {
        let t = &toks[j];
        if t.is(')') || t.is('}') {
            depth += 1;
        } else if t.is('(') || t.is('{') {
            if depth == 0 {
                return j
                    .checked_sub(2)
                    .and_then(|k| toks[k].ident())
                    .filter(|kw| matches!(*kw, "struct" | "fn"));
            }
            depth -= 1;
        }
    }
    None
}
