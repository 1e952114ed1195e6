//! Read-only snapshot of the page's compiled render graph.
//!
//! The graph belongs to the page; the gate only inspects it to find which
//! textures to read back. Binding lists keep the page's declaration order
//! because resolution takes the *first* matching input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved input name for the texture fed into a filter effect from upstream.
pub const EXTERNAL_INPUT: &str = "inputTex";

/// The surface every chain ultimately renders to.
pub const PRIMARY_SURFACE: &str = "o0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pass {
    pub id: String,
    pub program: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub inputs: Vec<(String, String)>,
    pub outputs: Vec<(String, String)>,
    /// Input binding the compiler marked as the chain's external input, when it publishes one.
    pub external_input: Option<String>,
    pub effect_namespace: Option<String>,
    pub effect_func: Option<String>,
}

impl Pass {
    pub fn input(&self, key: &str) -> Option<&str> {
        self.inputs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Double-buffered render target; `read` and `write` swap every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub read: String,
    pub write: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassGraph {
    /// Live backend object's name (`WebGL2` / `WebGPU`).
    pub backend: Option<String>,
    pub filter_input: Option<String>,
    pub surfaces: BTreeMap<String, Surface>,
    /// Texture ids the backend currently tracks.
    pub textures: Vec<String>,
    pub passes: Vec<Pass>,
}

/// How a texture identifier relates to the graph's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRef<'a> {
    /// The reserved external input name itself.
    External,
    /// Alias for a global surface, carrying the surface name.
    GlobalSurface(&'a str),
    /// One of a surface's concrete ping-pong textures.
    SurfaceBuffer(&'a str),
    /// Auto-generated output of a chain node (`node_<n>_<tex>`).
    ChainOutput,
    /// Effect-private intermediate (`_<name>`).
    NodeLocal,
    Other,
}

impl PassGraph {
    pub fn pass_ids(&self) -> Vec<String> {
        self.passes.iter().map(|p| p.id.clone()).collect()
    }

    pub fn primary_surface(&self) -> Option<&Surface> {
        self.surfaces.get(PRIMARY_SURFACE)
    }

    pub fn classify<'a>(&'a self, id: &'a str) -> TextureRef<'a> {
        if id == EXTERNAL_INPUT {
            return TextureRef::External;
        }
        if self.surfaces.contains_key(id) {
            return TextureRef::GlobalSurface(id);
        }
        if let Some(rest) = id.strip_prefix("global_") {
            for suffix in ["_read", "_write"] {
                if let Some(name) = rest.strip_suffix(suffix) {
                    if !name.is_empty() {
                        return TextureRef::SurfaceBuffer(name);
                    }
                }
            }
            if !rest.is_empty() {
                return TextureRef::GlobalSurface(rest);
            }
        }
        if let Some(rest) = id.strip_prefix("global") {
            // `globalName` spelling of `global_name`.
            if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                if let Some(name) = self
                    .surfaces
                    .keys()
                    .find(|k| k.eq_ignore_ascii_case(rest))
                {
                    return TextureRef::GlobalSurface(name.as_str());
                }
            }
        }
        if is_chain_output(id) {
            return TextureRef::ChainOutput;
        }
        if id.len() > 1 && id.starts_with('_') {
            return TextureRef::NodeLocal;
        }
        TextureRef::Other
    }

    /// The texture currently holding `surface`'s last completed frame.
    pub fn surface_read(&self, surface: &str) -> Option<&str> {
        self.surfaces.get(surface).map(|s| s.read.as_str())
    }

    fn writes_primary(&self, pass: &Pass) -> bool {
        pass.outputs.iter().any(|(_, v)| match self.classify(v) {
            TextureRef::GlobalSurface(name) | TextureRef::SurfaceBuffer(name) => {
                name == PRIMARY_SURFACE
            }
            _ => false,
        })
    }

    /// Find the readable texture feeding a filter effect.
    ///
    /// Preference order: an explicit binding published by the compiler, then a
    /// pass binding the reserved input key, then the first structural input of
    /// the pass producing the primary surface.
    pub fn resolve_filter_input(&self) -> Option<ResolvedInput> {
        if let Some(explicit) = self.filter_input.as_deref() {
            if let Some(texture) = self.resolve_texture(explicit) {
                return Some(ResolvedInput {
                    texture,
                    pass: None,
                    via: Resolution::Explicit,
                });
            }
        }
        for pass in &self.passes {
            if let Some(ext) = pass.external_input.as_deref() {
                let bound = pass.input(ext).unwrap_or(ext);
                if let Some(texture) = self.resolve_texture(bound) {
                    return Some(ResolvedInput {
                        texture,
                        pass: Some(pass.id.clone()),
                        via: Resolution::Explicit,
                    });
                }
            }
        }

        for pass in &self.passes {
            if let Some(bound) = pass.input(EXTERNAL_INPUT) {
                if let Some(texture) = self.resolve_texture(bound) {
                    return Some(ResolvedInput {
                        texture,
                        pass: Some(pass.id.clone()),
                        via: Resolution::ReservedKey,
                    });
                }
            }
        }

        let producer = self
            .passes
            .iter()
            .rev()
            .find(|p| self.writes_primary(p))?;
        let candidate = producer.inputs.iter().map(|(_, v)| v.as_str()).find(|v| {
            matches!(
                self.classify(v),
                TextureRef::ChainOutput | TextureRef::GlobalSurface(_) | TextureRef::SurfaceBuffer(_)
            ) && !self.is_primary(v)
        })?;
        let texture = self.resolve_texture(candidate)?;
        Some(ResolvedInput {
            texture,
            pass: Some(producer.id.clone()),
            via: Resolution::ProducerScan,
        })
    }

    fn is_primary(&self, id: &str) -> bool {
        matches!(
            self.classify(id),
            TextureRef::GlobalSurface(PRIMARY_SURFACE) | TextureRef::SurfaceBuffer(PRIMARY_SURFACE)
        )
    }

    /// Map an identifier to a texture the backend can read.
    ///
    /// Surface aliases resolve to the surface's `read` texture, never `write`.
    pub fn resolve_texture(&self, id: &str) -> Option<String> {
        match self.classify(id) {
            TextureRef::External => None,
            TextureRef::GlobalSurface(name) => self.surface_read(name).map(str::to_string),
            _ if self.textures.is_empty() || self.textures.iter().any(|t| t == id) => {
                Some(id.to_string())
            }
            _ => None,
        }
    }
}

fn is_chain_output(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("node_") else {
        return false;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && rest[digits..].starts_with('_') && rest.len() > digits + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Explicit,
    ReservedKey,
    ProducerScan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub texture: String,
    pub pass: Option<String>,
    pub via: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surfaces() -> BTreeMap<String, Surface> {
        ["o0", "o1"]
            .into_iter()
            .map(|n| {
                (
                    n.to_string(),
                    Surface {
                        read: format!("global_{n}_read"),
                        write: format!("global_{n}_write"),
                    },
                )
            })
            .collect()
    }

    fn pass(id: &str, inputs: &[(&str, &str)], outputs: &[(&str, &str)]) -> Pass {
        let pairs = |v: &[(&str, &str)]| {
            v.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        Pass {
            id: id.to_string(),
            inputs: pairs(inputs),
            outputs: pairs(outputs),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_structural_identifiers() {
        let g = PassGraph {
            surfaces: surfaces(),
            ..Default::default()
        };
        assert_eq!(g.classify("inputTex"), TextureRef::External);
        assert_eq!(g.classify("o1"), TextureRef::GlobalSurface("o1"));
        assert_eq!(g.classify("global_o1"), TextureRef::GlobalSurface("o1"));
        assert_eq!(g.classify("globalO1"), TextureRef::GlobalSurface("o1"));
        assert_eq!(g.classify("global_o0_write"), TextureRef::SurfaceBuffer("o0"));
        assert_eq!(g.classify("node_3_outputTex"), TextureRef::ChainOutput);
        assert_eq!(g.classify("node_x_out"), TextureRef::Other);
        assert_eq!(g.classify("_blurH"), TextureRef::NodeLocal);
        assert_eq!(g.classify("noise"), TextureRef::Other);
    }

    #[test]
    fn reserved_key_wins_over_scan() {
        let g = PassGraph {
            surfaces: surfaces(),
            passes: vec![
                pass("node_0_pass_0", &[], &[("fragColor", "node_0_out")]),
                pass(
                    "node_1_pass_0",
                    &[("inputTex", "node_0_out")],
                    &[("fragColor", "global_o0")],
                ),
            ],
            ..Default::default()
        };
        let r = g.resolve_filter_input().unwrap();
        assert_eq!(r.texture, "node_0_out");
        assert_eq!(r.via, Resolution::ReservedKey);
    }

    #[test]
    fn explicit_binding_is_preferred() {
        let g = PassGraph {
            surfaces: surfaces(),
            filter_input: Some("global_o1".into()),
            passes: vec![pass(
                "p",
                &[("inputTex", "node_0_out")],
                &[("fragColor", "global_o0")],
            )],
            ..Default::default()
        };
        let r = g.resolve_filter_input().unwrap();
        assert_eq!(r.texture, "global_o1_read");
        assert_eq!(r.via, Resolution::Explicit);
    }

    #[test]
    fn rewritten_chain_falls_back_to_producer_inputs() {
        let g = PassGraph {
            surfaces: surfaces(),
            passes: vec![
                pass("gen", &[], &[("fragColor", "global_o1")]),
                pass(
                    "fx",
                    &[("tex0", "noise"), ("tex1", "global_o1")],
                    &[("fragColor", "global_o0")],
                ),
            ],
            ..Default::default()
        };
        let r = g.resolve_filter_input().unwrap();
        // Alias resolves to the read side of the ping-pong pair.
        assert_eq!(r.texture, "global_o1_read");
        assert_eq!(r.pass.as_deref(), Some("fx"));
        assert_eq!(r.via, Resolution::ProducerScan);
    }

    #[test]
    fn untracked_texture_does_not_resolve() {
        let g = PassGraph {
            surfaces: surfaces(),
            textures: vec!["global_o0_read".into()],
            passes: vec![pass(
                "fx",
                &[("inputTex", "node_9_out")],
                &[("fragColor", "global_o0")],
            )],
            ..Default::default()
        };
        assert!(g.resolve_filter_input().is_none());
    }
}
