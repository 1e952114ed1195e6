#![allow(dead_code)]

//! A scripted stand-in for the demo page, answering the gate's page scripts by op tag.

use std::{collections::BTreeMap, sync::Mutex};

use base64::Engine as _;
use effect_gate::{
    GateError, Result,
    page::{PageDriver, scripts},
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct Pixels {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Pixels {
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::from_fn(width, height, |_, _| rgba)
    }

    /// A colourful diagonal gradient.
    pub fn gradient(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |x, y| {
            [(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) * 5 % 256) as u8, 255]
        })
    }

    pub fn inverted(&self) -> Self {
        let mut data = self.data.clone();
        for px in data.chunks_mut(4) {
            for c in &mut px[..3] {
                *c = 255 - *c;
            }
        }
        Self { data, ..*self }
    }
}

#[derive(Debug, Default)]
pub struct PageState {
    pub frame: u64,
    /// Frames the fake render loop advances per polled script.
    pub frames_per_poll: u64,
    pub catalog: Vec<String>,
    pub status: String,
    /// Status text to show once a selected effect "finishes" compiling.
    pub compile_outcome: String,
    /// Status polls answered with the untouched previous status before the loop moves on.
    pub stale_polls: u32,
    pub passes: Vec<String>,
    pub graph: Value,
    pub globals: Value,
    pub textures: BTreeMap<String, Pixels>,
    /// `uniform -> (texture id, pixels)`: while the uniform is off its default, the texture reads as these pixels.
    pub responsive: BTreeMap<String, (String, Pixels)>,
    pub uniforms: BTreeMap<String, Value>,
    pub applied: Vec<BTreeMap<String, Value>>,
    pub resets: usize,
    pub bench: (u64, f64),
    pub ops: Vec<String>,
}

pub struct FakePage {
    pub state: Mutex<PageState>,
}

impl FakePage {
    pub fn new(state: PageState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut PageState) -> T) -> T {
        let mut s = self.state.lock().unwrap();
        f(&mut s)
    }
}

impl PageState {
    /// One effect on a 16x16 primary surface fed by a generator pass.
    pub fn single_effect(effect: &str) -> Self {
        Self {
            frames_per_poll: 1,
            catalog: vec![effect.to_string()],
            compile_outcome: "Compiled successfully".into(),
            passes: vec!["node_0_pass_0".into()],
            ..Default::default()
        }
    }

    fn default_of(&self, uniform: &str) -> Option<Value> {
        self.globals.as_array()?.iter().find_map(|pair| {
            let spec = pair.get(1)?;
            (spec.get("uniform")?.as_str()? == uniform).then(|| spec.get("default").cloned())?
        })
    }

    fn off_default(&self, uniform: &str) -> bool {
        let Some(v) = self.uniforms.get(uniform) else {
            return false;
        };
        match (v.as_f64(), self.default_of(uniform).and_then(|d| d.as_f64())) {
            (Some(v), Some(d)) => (v - d).abs() > f64::EPSILON,
            _ => true,
        }
    }

    fn resolve(&self, r: &str) -> Option<String> {
        match r.strip_prefix(scripts::SURFACE_REF_PREFIX) {
            Some(surface) => self.graph["surfaces"][surface]["read"]
                .as_str()
                .map(str::to_string),
            None => Some(r.to_string()),
        }
    }

    fn read(&self, r: &str) -> Value {
        let Some(id) = self.resolve(r) else {
            return json!({ "ref": r, "id": null, "error": format!("surface for {r} not found") });
        };
        let swapped = self
            .responsive
            .iter()
            .find(|(u, (tex, _))| *tex == id && self.off_default(u))
            .map(|(_, (_, px))| px);
        match swapped.or_else(|| self.textures.get(&id)) {
            Some(px) => json!({
                "ref": r,
                "id": id,
                "width": px.width,
                "height": px.height,
                "data": base64::engine::general_purpose::STANDARD.encode(&px.data),
            }),
            None => json!({ "ref": r, "id": id, "error": format!("texture {id} not tracked") }),
        }
    }
}

impl PageDriver for FakePage {
    fn evaluate(&self, script: &str) -> Result<Value> {
        let op = scripts::op_of(script)
            .ok_or_else(|| GateError::Protocol("untagged script".into()))?
            .to_string();
        let args = scripts::args_of(script).unwrap_or(Value::Null);
        let mut s = self.state.lock().unwrap();
        s.ops.push(op.clone());
        let out = match op.as_str() {
            "app_ready" => json!(true),
            "list_effects" => json!(s.catalog),
            "select_effect" => {
                let wanted = args["effect"].as_str().unwrap_or_default();
                let found = s.catalog.iter().any(|e| e == wanted);
                if found && s.stale_polls == 0 {
                    s.status = "Compiling...".into();
                }
                json!({ "found": found, "frame": s.frame })
            }
            "compile_status" => {
                if s.stale_polls > 0 {
                    s.stale_polls -= 1;
                    if s.stale_polls == 0 {
                        s.status = "Compiling...".into();
                    }
                    return Ok(json!({ "frame": s.frame, "status": s.status, "passes": s.passes }));
                }
                s.frame += s.frames_per_poll;
                if s.status == "Compiling..." {
                    s.status = s.compile_outcome.clone();
                }
                json!({ "frame": s.frame, "status": s.status, "passes": s.passes })
            }
            "frame_count" => {
                s.frame += s.frames_per_poll;
                json!(s.frame)
            }
            "apply_uniforms" => {
                let values: BTreeMap<String, Value> =
                    serde_json::from_value(args["values"].clone()).unwrap_or_default();
                let n = values.len();
                s.uniforms.extend(values.clone());
                s.applied.push(values);
                json!(n)
            }
            "set_effect_uniform" => {
                let name = args["uniform"].as_str().unwrap_or_default().to_string();
                s.uniforms.insert(name, args["value"].clone());
                json!(1)
            }
            "reset_uniforms" => {
                s.uniforms.clear();
                s.resets += 1;
                json!(true)
            }
            "effect_globals" => s.globals.clone(),
            "graph_snapshot" => s.graph.clone(),
            "read_textures_raster" | "read_textures_compute" => {
                let refs: Vec<String> = serde_json::from_value(args["refs"].clone()).unwrap_or_default();
                Value::Array(refs.iter().map(|r| s.read(r)).collect())
            }
            "benchmark_window" => json!({ "frame_count": s.bench.0, "total_time_ms": s.bench.1 }),
            other => json!({ "error": format!("fake page has no {other}") }),
        };
        Ok(out)
    }
}

/// `o0` ping-pong surface plus a generator pass feeding a filter pass through `inputTex`.
pub fn filter_graph() -> Value {
    json!({
        "backend": "WebGL2",
        "filterInput": null,
        "surfaces": {
            "o0": { "read": "global_o0_read", "write": "global_o0_write" }
        },
        "textures": ["node_0_out", "global_o0_read", "global_o0_write"],
        "passes": [
            {
                "id": "node_0_pass_0", "program": "noise",
                "inputs": [], "outputs": [["fragColor", "node_0_out"]]
            },
            {
                "id": "node_1_pass_0", "program": "blur",
                "inputs": [["inputTex", "node_0_out"]], "outputs": [["fragColor", "global_o0"]]
            }
        ]
    })
}
