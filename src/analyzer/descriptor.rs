//! Structured view of an effect's `definition.js` / `definition.json`.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::lexer::{Token, module_fields, tokenize};
use crate::{
    error::{GateError, Result},
    graph::EXTERNAL_INPUT,
};

pub const DEFINITION_FILES: &[&str] = &["definition.js", "definition.json"];

#[derive(Debug, Clone, Default)]
pub struct PassDecl {
    pub name: Option<String>,
    /// `render` or `compute`; absent means render.
    pub kind: Option<String>,
    pub program: Option<String>,
    pub inputs: Vec<(String, Value)>,
    pub outputs: Vec<(String, Value)>,
    /// Draws with its own vertex stage (point/line draw modes, explicit counts).
    pub custom_vertex: bool,
}

impl PassDecl {
    fn from_value(v: &Value) -> Self {
        let s = |k: &str| v.get(k).and_then(Value::as_str).map(str::to_string);
        let entries = |k: &str| {
            v.get(k)
                .and_then(Value::as_object)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default()
        };
        let draw_mode = s("drawMode");
        Self {
            name: s("name"),
            kind: s("type"),
            program: s("program"),
            inputs: entries("inputs"),
            outputs: entries("outputs"),
            custom_vertex: draw_mode.is_some_and(|m| m != "triangles")
                || v.get("count").is_some()
                || v.get("vertex").is_some(),
        }
    }

    pub fn is_compute(&self) -> bool {
        self.kind.as_deref() == Some("compute")
    }
}

#[derive(Debug, Clone)]
pub struct EffectDescriptor {
    pub path: PathBuf,
    /// Full descriptor text, for rules that scan it lexically.
    pub text: String,
    pub tokens: Vec<Token>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub func: Option<String>,
    pub globals: Vec<(String, Value)>,
    pub passes: Vec<PassDecl>,
    pub textures: Vec<String>,
}

impl EffectDescriptor {
    /// Locate and read the descriptor in `effect_dir`.
    pub fn load(effect_dir: &Path) -> Result<Self> {
        let path = DEFINITION_FILES
            .iter()
            .map(|f| effect_dir.join(f))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                GateError::analyzer(
                    effect_dir.join(DEFINITION_FILES[0]),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no effect definition"),
                )
            })?;
        let text = std::fs::read_to_string(&path).map_err(|e| GateError::analyzer(&path, e))?;
        Ok(Self::parse(path, text))
    }

    pub fn parse(path: PathBuf, text: String) -> Self {
        let tokens = tokenize(&text);
        let is_json = path.extension().is_some_and(|e| e == "json");
        let fields = if is_json {
            serde_json::from_str::<Map<String, Value>>(&text)
                .unwrap_or_else(|_| module_fields(&tokens))
        } else {
            module_fields(&tokens)
        };

        let s = |k: &str| fields.get(k).and_then(Value::as_str).map(str::to_string);
        let globals = fields
            .get("globals")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let passes = fields
            .get("passes")
            .and_then(Value::as_array)
            .map(|a| a.iter().map(PassDecl::from_value).collect())
            .unwrap_or_default();
        let textures = fields
            .get("textures")
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        Self {
            path,
            name: s("name"),
            namespace: s("namespace"),
            func: s("func"),
            globals,
            passes,
            textures,
            text,
            tokens,
        }
    }

    /// Programs referenced by any pass, in pass order, deduplicated.
    pub fn programs(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for p in self.passes.iter().filter_map(|p| p.program.as_deref()) {
            if !out.contains(&p) {
                out.push(p);
            }
        }
        out
    }

    /// Whether the effect consumes an externally bound input texture.
    pub fn declares_external_input(&self) -> bool {
        let is_ext = |v: &Value| v.as_str() == Some(EXTERNAL_INPUT);
        let in_passes = self
            .passes
            .iter()
            .flat_map(|p| &p.inputs)
            .any(|(k, v)| k == EXTERNAL_INPUT || is_ext(v));
        let as_surface_default = self.globals.iter().any(|(_, spec)| {
            spec.get("type").and_then(Value::as_str) == Some("surface")
                && spec.get("default").is_some_and(is_ext)
        });
        in_passes || as_surface_default
    }
}
