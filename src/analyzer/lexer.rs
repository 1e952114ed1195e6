//! Token scanner for effect descriptor modules.
//!
//! Descriptors are JavaScript class bodies or object literals holding plain
//! data. This scanner never evaluates anything: it tokenizes, drops comments,
//! and reads literal values back as JSON. Any expression that is not a
//! literal becomes `null`.

use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Quoted string with escapes resolved.
    Str(String),
    /// Backtick literal, raw (substitutions included verbatim).
    Template(String),
    Num(f64),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line of the token's first character.
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }
}

pub fn tokenize(src: &str) -> Vec<Token> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i += 2;
            continue;
        }

        let start_line = line;
        let kind = if c == '"' || c == '\'' {
            let mut s = String::new();
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                    s.push(match chars[i] {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                } else {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    s.push(chars[i]);
                }
                i += 1;
            }
            i += 1;
            TokenKind::Str(s)
        } else if c == '`' {
            let mut s = String::new();
            i += 1;
            let mut subst_depth = 0usize;
            while i < chars.len() && !(chars[i] == '`' && subst_depth == 0) {
                match chars[i] {
                    '\\' if i + 1 < chars.len() => {
                        s.push('\\');
                        i += 1;
                    }
                    '$' if chars.get(i + 1) == Some(&'{') => {
                        subst_depth += 1;
                        s.push('$');
                        i += 1;
                    }
                    '{' if subst_depth > 0 => subst_depth += 1,
                    '}' if subst_depth > 0 => subst_depth -= 1,
                    '\n' => line += 1,
                    _ => {}
                }
                s.push(chars[i]);
                i += 1;
            }
            i += 1;
            TokenKind::Template(s)
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let begin = i;
            if c == '0' && matches!(chars.get(i + 1), Some('x' | 'X')) {
                i += 2;
                while i < chars.len() && (chars[i].is_ascii_hexdigit() || chars[i] == '_') {
                    i += 1;
                }
                let digits: String = chars[begin + 2..i].iter().filter(|c| **c != '_').collect();
                TokenKind::Num(i64::from_str_radix(&digits, 16).map(|v| v as f64).unwrap_or(0.0))
            } else {
                while i < chars.len() {
                    let d = chars[i];
                    let exp_sign = matches!(d, '+' | '-') && matches!(chars[i - 1], 'e' | 'E');
                    if d.is_ascii_digit() || matches!(d, '.' | 'e' | 'E' | '_') || exp_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[begin..i].iter().filter(|c| **c != '_').collect();
                TokenKind::Num(text.parse().unwrap_or(0.0))
            }
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let begin = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            TokenKind::Ident(chars[begin..i].iter().collect())
        } else {
            i += 1;
            TokenKind::Punct(c)
        };
        out.push(Token {
            kind,
            line: start_line,
        });
    }
    out
}

/// Literal reader over a token slice.
pub struct Parser<'a> {
    toks: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(toks: &'a [Token]) -> Self {
        Self { toks, pos: 0 }
    }

    pub fn at(toks: &'a [Token], pos: usize) -> Self {
        Self { toks, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<&'a Token> {
        self.toks.get(self.pos)
    }

    fn peek_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(c))
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn at_value_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(t) => matches!(t.kind, TokenKind::Punct(',' | '}' | ']' | ')' | ';')),
        }
    }

    /// Skip to the next `,` or closer at this nesting level, without consuming it.
    fn skip_expression(&mut self) {
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            match t.kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Punct(',' | ';') if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Skip a balanced bracket group starting at the current opener.
    pub fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(t) = self.bump() {
            match t.kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    pub fn parse_value(&mut self) -> Value {
        let Some(tok) = self.peek() else {
            return Value::Null;
        };
        let value = match &tok.kind {
            TokenKind::Punct('{') => self.parse_object(),
            TokenKind::Punct('[') => self.parse_array(),
            TokenKind::Str(s) | TokenKind::Template(s) => {
                self.pos += 1;
                Value::String(s.clone())
            }
            TokenKind::Num(n) => {
                self.pos += 1;
                number(*n)
            }
            TokenKind::Punct('-') => match self.toks.get(self.pos + 1).map(|t| &t.kind) {
                Some(TokenKind::Num(n)) => {
                    self.pos += 2;
                    number(-*n)
                }
                _ => Value::Null,
            },
            TokenKind::Ident(id) => match id.as_str() {
                "true" => {
                    self.pos += 1;
                    Value::Bool(true)
                }
                "false" => {
                    self.pos += 1;
                    Value::Bool(false)
                }
                "null" | "undefined" => {
                    self.pos += 1;
                    Value::Null
                }
                _ => Value::Null,
            },
            _ => Value::Null,
        };
        if self.at_value_end() {
            value
        } else {
            // Part of a larger expression (`Math.PI * 2`, `palettes.x`, ...).
            self.skip_expression();
            Value::Null
        }
    }

    fn parse_object(&mut self) -> Value {
        let mut map = Map::new();
        self.bump();
        loop {
            let before = self.pos;
            let Some(tok) = self.peek() else { break };
            if tok.is_punct('}') {
                self.bump();
                break;
            }
            if tok.is_punct(',') {
                self.bump();
                continue;
            }
            let key = match &tok.kind {
                TokenKind::Ident(s) | TokenKind::Str(s) => Some(s.clone()),
                TokenKind::Num(n) => Some(number(*n).to_string()),
                _ => None,
            };
            match key {
                Some(key) => {
                    self.bump();
                    if self.peek_punct(':') {
                        self.bump();
                        let v = self.parse_value();
                        map.insert(key, v);
                    } else if self.peek_punct('(') {
                        // Method shorthand: skip params and body.
                        self.skip_group();
                        if self.peek_punct('{') {
                            self.skip_group();
                        }
                    } else {
                        map.insert(key, Value::Null);
                    }
                }
                None => self.skip_expression(),
            }
            if self.pos == before {
                self.bump();
            }
        }
        Value::Object(map)
    }

    fn parse_array(&mut self) -> Value {
        let mut items = Vec::new();
        self.bump();
        loop {
            let before = self.pos;
            let Some(tok) = self.peek() else { break };
            if tok.is_punct(']') {
                self.bump();
                break;
            }
            if tok.is_punct(',') {
                self.bump();
                continue;
            }
            items.push(self.parse_value());
            if self.pos == before {
                self.bump();
            }
        }
        Value::Array(items)
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Read the data fields of a descriptor module.
///
/// Class field initializers (`name = "x";`) and `this.name = ...` in a
/// constructor are collected; a module exporting a plain object literal
/// (`export default { ... }`) yields that object's entries.
pub fn module_fields(toks: &[Token]) -> Map<String, Value> {
    if let Some(body) = toks.iter().position(|t| t.ident() == Some("class")).and_then(|c| {
        toks[c..]
            .iter()
            .position(|t| t.is_punct('{'))
            .map(|o| c + o)
    }) {
        return class_fields(toks, body);
    }
    default_export_object(toks).unwrap_or_default()
}

fn class_fields(toks: &[Token], open: usize) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut depth = 0usize;
    let mut i = open;
    while i < toks.len() {
        let t = &toks[i];
        match t.kind {
            TokenKind::Punct('{') | TokenKind::Punct('(') | TokenKind::Punct('[') => depth += 1,
            TokenKind::Punct('}') | TokenKind::Punct(')') | TokenKind::Punct(']') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }

        let field = if depth == 1 {
            t.ident().filter(|_| is_assignment(toks, i + 1)).map(|n| (n, i + 2))
        } else if t.ident() == Some("this")
            && toks.get(i + 1).is_some_and(|d| d.is_punct('.'))
            && is_assignment(toks, i + 3)
        {
            toks.get(i + 2).and_then(Token::ident).map(|n| (n, i + 4))
        } else {
            None
        };

        if let Some((name, value_at)) = field {
            let mut p = Parser::at(toks, value_at);
            let v = p.parse_value();
            fields.entry(name.to_string()).or_insert(v);
            i = p.pos();
            continue;
        }
        i += 1;
    }
    fields
}

/// `=` that is not part of `==`, `=>`.
fn is_assignment(toks: &[Token], i: usize) -> bool {
    toks.get(i).is_some_and(|t| t.is_punct('='))
        && !toks
            .get(i + 1)
            .is_some_and(|n| n.is_punct('=') || n.is_punct('>'))
}

fn default_export_object(toks: &[Token]) -> Option<Map<String, Value>> {
    let export = toks.windows(2).position(|w| {
        w[0].ident() == Some("export") && w[1].ident() == Some("default")
    })?;
    let open = toks[export..].iter().position(|t| t.is_punct('{'))? + export;
    match Parser::at(toks, open).parse_value() {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comments_are_dropped_and_lines_tracked() {
        let toks = tokenize("// a\n/* b\n c */ x = 1");
        assert_eq!(toks[0].ident(), Some("x"));
        assert_eq!(toks[0].line, 3);
    }

    #[test]
    fn reads_class_fields() {
        let src = r#"
import { Effect } from '../../../src/runtime/effect.js';
export default class Grain extends Effect {
  name = "Grain";
  namespace = "filter";
  func = "grain";
  globals = {
    alpha: { type: "float", default: 0.5, min: 0, max: 1, uniform: "alpha" },
    speed: { type: "float", default: -1.5, uniform: "speed", ui: { control: false } },
    scale: { type: "float", default: Math.PI * 2, uniform: "scale" },
  };
  passes = [{ name: "main", program: "grain", inputs: { inputTex: "inputTex" }, outputs: { fragColor: "outputTex" } }];
  onInit() { this.ready = true; }
}
"#;
        let f = module_fields(&tokenize(src));
        assert_eq!(f["func"], json!("grain"));
        assert_eq!(f["globals"]["alpha"]["max"], json!(1));
        assert_eq!(f["globals"]["speed"]["default"], json!(-1.5));
        assert_eq!(f["globals"]["speed"]["ui"]["control"], json!(false));
        assert_eq!(f["globals"]["scale"]["default"], Value::Null);
        assert_eq!(f["passes"][0]["inputs"]["inputTex"], json!("inputTex"));
        assert_eq!(f["ready"], json!(true));
    }

    #[test]
    fn reads_default_export_object() {
        let f = module_fields(&tokenize("export default { func: 'solid', passes: [] }"));
        assert_eq!(f["func"], json!("solid"));
    }

    #[test]
    fn template_literals_keep_substitutions() {
        let toks = tokenize("x = `a ${ {b: 1}.b } c`;");
        assert_eq!(toks[2].kind, TokenKind::Template("a ${ {b: 1}.b } c".into()));
    }
}
