//! Page-side scripts.
//!
//! Each builder returns a self-invoking async expression whose first line is
//! `// op:<name>`. Arguments are embedded as a JSON literal so no string
//! escaping ever happens by hand.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::types::{BackendKind, EffectId};

const OP_PREFIX: &str = "// op:";

/// The op tag of a script built here.
pub fn op_of(script: &str) -> Option<&str> {
    script.lines().next()?.strip_prefix(OP_PREFIX)
}

/// Args a script was built with, recovered from its trailing `(...)` literal.
pub fn args_of(script: &str) -> Option<Value> {
    // Serialized JSON never contains a raw newline, so this is the wrapper's own.
    let open = script.rfind("\n})(")?;
    let inner = script[open + 4..].strip_suffix(')')?;
    serde_json::from_str(inner).ok()
}

fn script(op: &str, args: Value, body: &str) -> String {
    format!("{OP_PREFIX}{op}\n(async (args) => {{\n{body}\n}})({args})")
}

/// Prefix a texture ref with this to ask for a surface's current read texture.
pub const SURFACE_REF_PREFIX: &str = "surface:";

pub fn surface_ref(surface: &str) -> String {
    format!("{SURFACE_REF_PREFIX}{surface}")
}

pub fn app_ready() -> String {
    script(
        "app_ready",
        Value::Null,
        r#"
const app = document.getElementById('app-container');
const visible = !!app && window.getComputedStyle(app).display !== 'none';
const count = document.querySelectorAll('#effect-select option').length;
return visible && count > 0;"#,
    )
}

pub fn list_effects() -> String {
    script(
        "list_effects",
        Value::Null,
        r#"
return Array.from(document.querySelectorAll('#effect-select option'))
    .map(o => o.value)
    .filter(v => v);"#,
    )
}

pub fn backend_state() -> String {
    script(
        "backend_state",
        Value::Null,
        r#"
const pipeline = window.__noisemakerRenderingPipeline;
const label = typeof window.__noisemakerCurrentBackend === 'function'
    ? window.__noisemakerCurrentBackend()
    : null;
const name = pipeline?.backend?.getName?.() ?? null;
const status = document.getElementById('status')?.textContent ?? '';
return { label, name, status };"#,
    )
}

pub fn switch_backend(kind: BackendKind) -> String {
    script(
        "switch_backend",
        json!({ "label": kind.page_label() }),
        r#"
const radio = document.querySelector(`input[name="backend"][value="${args.label}"]`);
if (!radio) return { error: `no backend control for ${args.label}` };
radio.click();
return true;"#,
    )
}

pub fn select_effect(effect: &EffectId) -> String {
    script(
        "select_effect",
        json!({ "effect": effect.to_string() }),
        r#"
const select = document.getElementById('effect-select');
if (!select) return { error: 'effect selector missing' };
const frame = window.__noisemakerFrameCount || 0;
const found = Array.from(select.options).some(o => o.value === args.effect);
if (!found) return { found, frame };
// Drop the previous effect's outcome so only this compile can set a marker.
const status = document.getElementById('status');
if (status) status.textContent = '';
select.value = args.effect;
select.dispatchEvent(new Event('change', { bubbles: true }));
return { found, frame };"#,
    )
}

pub fn compile_status() -> String {
    script(
        "compile_status",
        Value::Null,
        r#"
const status = document.getElementById('status');
const pipeline = window.__noisemakerRenderingPipeline;
const passes = (pipeline?.graph?.passes || []).map(p => String(p.id || p.program));
return {
    frame: window.__noisemakerFrameCount || 0,
    status: status ? (status.textContent || '') : '',
    passes,
};"#,
    )
}

pub fn frame_count() -> String {
    script(
        "frame_count",
        Value::Null,
        "return window.__noisemakerFrameCount || 0;",
    )
}

/// Write uniforms through `setUniform`, else straight into the global map and every pass using them.
pub fn apply_uniforms(values: &BTreeMap<String, Value>) -> String {
    script(
        "apply_uniforms",
        json!({ "values": values }),
        r#"
const pipeline = window.__noisemakerRenderingPipeline;
if (!pipeline) return { error: 'Pipeline not available' };
let applied = 0;
for (const [name, value] of Object.entries(args.values)) {
    if (typeof pipeline.setUniform === 'function') {
        pipeline.setUniform(name, value);
    } else {
        if (pipeline.globalUniforms) pipeline.globalUniforms[name] = value;
        for (const pass of pipeline.graph?.passes || []) {
            if (pass.uniforms && name in pass.uniforms) pass.uniforms[name] = value;
        }
    }
    applied++;
}
return applied;"#,
    )
}

/// Set one uniform only on passes that belong to `effect`, leaving upstream generators alone.
pub fn set_effect_uniform(effect: &EffectId, uniform: &str, value: &Value) -> String {
    script(
        "set_effect_uniform",
        json!({
            "namespace": effect.namespace(),
            "func": effect.name(),
            "uniform": uniform,
            "value": value,
        }),
        r#"
const pipeline = window.__noisemakerRenderingPipeline;
if (!pipeline?.graph?.passes) return { error: 'Pipeline not available' };
let touched = 0;
for (const pass of pipeline.graph.passes) {
    if (!pass.uniforms || !(args.uniform in pass.uniforms)) continue;
    if (pass.effectNamespace === args.namespace || pass.effectFunc === args.func) {
        pass.uniforms[args.uniform] = args.value;
        touched++;
    }
}
return touched;"#,
    )
}

pub fn reset_uniforms() -> String {
    script(
        "reset_uniforms",
        Value::Null,
        r#"
const pipeline = window.__noisemakerRenderingPipeline;
const globals = window.__noisemakerCurrentEffect?.instance?.globals;
if (!pipeline || !globals) return false;
const passes = pipeline.graph?.passes || [];
for (const spec of Object.values(globals)) {
    if (!spec?.uniform) continue;
    const value = spec.default ?? spec.min ?? 0;
    if (pipeline.globalUniforms) pipeline.globalUniforms[spec.uniform] = value;
    for (const pass of passes) {
        if (pass.uniforms && spec.uniform in pass.uniforms) pass.uniforms[spec.uniform] = value;
    }
}
for (const map of [pipeline.globalUniforms, ...passes.map(p => p.uniforms)]) {
    if (!map) continue;
    if ('time' in map) map.time = 0;
    if ('u_time' in map) map.u_time = 0;
}
return true;"#,
    )
}

/// Parameter specs of the loaded effect as `[key, spec]` pairs, in declaration order.
pub fn effect_globals() -> String {
    script(
        "effect_globals",
        Value::Null,
        "return Object.entries(window.__noisemakerCurrentEffect?.instance?.globals || {});",
    )
}

pub fn graph_snapshot() -> String {
    script(
        "graph_snapshot",
        Value::Null,
        r#"
const pipeline = window.__noisemakerRenderingPipeline;
if (!pipeline) return { error: 'Pipeline not available' };
const entries = (m) => Object.entries(m || {}).filter(([, v]) => typeof v === 'string');
const surfaces = {};
for (const [name, s] of pipeline.surfaces?.entries?.() ?? []) {
    surfaces[name] = { read: s.read, write: s.write };
}
const backend = pipeline.backend;
const textures = backend?.textures?.keys ? Array.from(backend.textures.keys()).map(String) : [];
const passes = (pipeline.graph?.passes || []).map(p => ({
    id: String(p.id || p.program),
    program: p.program ?? null,
    type: p.type ?? null,
    inputs: entries(p.inputs),
    outputs: entries(p.outputs),
    externalInput: typeof p.externalInput === 'string' ? p.externalInput : null,
    effectNamespace: p.effectNamespace ?? null,
    effectFunc: p.effectFunc ?? null,
}));
const filterInput = typeof pipeline.graph?.filterInput === 'string' ? pipeline.graph.filterInput : null;
return { backend: backend?.getName?.() ?? null, filterInput, surfaces, textures, passes };"#,
    )
}

const RESOLVE_AND_ENCODE: &str = r#"
const pipeline = window.__noisemakerRenderingPipeline;
const backend = pipeline?.backend;
const resolve = (ref) => ref.startsWith('surface:')
    ? pipeline?.surfaces?.get(ref.slice(8))?.read
    : ref;
const encode = (bytes) => {
    let s = '';
    for (let i = 0; i < bytes.length; i += 0x8000) {
        s += String.fromCharCode.apply(null, bytes.subarray(i, i + 0x8000));
    }
    return btoa(s);
};
const toBytes = (src) => {
    if (src instanceof Uint8Array || src instanceof Uint8ClampedArray) return new Uint8Array(src);
    const out = new Uint8Array(src.length);
    for (let i = 0; i < src.length; i++) out[i] = Math.round(Math.min(1, Math.max(0, src[i])) * 255);
    return out;
};
"#;

/// Raster readback: bind each texture to a scratch framebuffer, prefer a float read.
pub fn read_textures_raster(refs: &[String]) -> String {
    let body = format!(
        "{RESOLVE_AND_ENCODE}{}",
        r#"
const gl = backend?.gl;
if (!gl) return { error: 'GL context not available' };
const floatOk = !!gl.getExtension('EXT_color_buffer_float');
const out = [];
for (const ref of args.refs) {
    const id = resolve(ref);
    const info = id ? backend.textures?.get(id) : null;
    if (!info) { out.push({ ref, id: id ?? null, error: `texture ${id ?? ref} not tracked` }); continue; }
    const { width, height } = info;
    for (let i = 0; i < 8 && gl.getError() !== gl.NO_ERROR; i++);
    const fbo = gl.createFramebuffer();
    gl.bindFramebuffer(gl.FRAMEBUFFER, fbo);
    gl.framebufferTexture2D(gl.FRAMEBUFFER, gl.COLOR_ATTACHMENT0, gl.TEXTURE_2D, info.handle, 0);
    let bytes = null;
    if (gl.checkFramebufferStatus(gl.FRAMEBUFFER) === gl.FRAMEBUFFER_COMPLETE) {
        if (floatOk) {
            const f = new Float32Array(width * height * 4);
            gl.readPixels(0, 0, width, height, gl.RGBA, gl.FLOAT, f);
            if (gl.getError() === gl.NO_ERROR) bytes = toBytes(f);
        }
        if (!bytes) {
            const b = new Uint8Array(width * height * 4);
            gl.readPixels(0, 0, width, height, gl.RGBA, gl.UNSIGNED_BYTE, b);
            if (gl.getError() === gl.NO_ERROR) bytes = b;
        }
    }
    gl.bindFramebuffer(gl.FRAMEBUFFER, null);
    gl.deleteFramebuffer(fbo);
    if (!bytes) { out.push({ ref, id, error: `framebuffer unreadable for ${id}` }); continue; }
    out.push({ ref, id, width, height, data: encode(bytes) });
}
return out;"#
    );
    script("read_textures_raster", json!({ "refs": refs }), &body)
}

/// Compute readback: issue every async whole-texture read in the same task.
pub fn read_textures_compute(refs: &[String]) -> String {
    let body = format!(
        "{RESOLVE_AND_ENCODE}{}",
        r#"
if (typeof backend?.readPixels !== 'function') return { error: 'readPixels not available' };
return await Promise.all(args.refs.map(async (ref) => {
    const id = resolve(ref);
    if (!id) return { ref, id: null, error: `surface for ${ref} not found` };
    try {
        const r = await backend.readPixels(id);
        if (!r || !r.data) return { ref, id, error: `no pixel data for ${id}` };
        return { ref, id, width: r.width, height: r.height, data: encode(toBytes(r.data)) };
    } catch (err) {
        return { ref, id, error: `readPixels(${id}) failed: ${err?.message ?? err}` };
    }
}));"#
    );
    script("read_textures_compute", json!({ "refs": refs }), &body)
}

pub fn read_textures(kind: BackendKind, refs: &[String]) -> String {
    match kind {
        BackendKind::Raster => read_textures_raster(refs),
        BackendKind::Compute => read_textures_compute(refs),
    }
}

/// Sample the frame counter across a real-time window.
pub fn benchmark_window(duration_ms: u64) -> String {
    script(
        "benchmark_window",
        json!({ "durationMs": duration_ms }),
        r#"
const startFrame = window.__noisemakerFrameCount || 0;
const startTime = performance.now();
await new Promise(r => setTimeout(r, args.durationMs));
const endFrame = window.__noisemakerFrameCount || 0;
return { frame_count: endFrame - startFrame, total_time_ms: performance.now() - startTime };"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_tag_is_first_line() {
        assert_eq!(op_of(&frame_count()), Some("frame_count"));
        assert_eq!(op_of(&reset_uniforms()), Some("reset_uniforms"));
        assert_eq!(op_of("1 + 1"), None);
    }

    #[test]
    fn args_survive_as_json_literal() {
        let id: EffectId = "filter/bloom".parse().unwrap();
        let s = set_effect_uniform(&id, "amount", &json!(0.75));
        let args = args_of(&s).unwrap();
        assert_eq!(args["namespace"], "filter");
        assert_eq!(args["func"], "bloom");
        assert_eq!(args["value"], 0.75);
    }

    #[test]
    fn quotes_in_ids_do_not_break_out() {
        let refs = vec!["x'); alert(1); ('".to_string()];
        let s = read_textures_compute(&refs);
        assert_eq!(args_of(&s).unwrap()["refs"][0], refs[0]);
    }

    #[test]
    fn readback_picks_backend_primitive() {
        let refs = vec![surface_ref("o0")];
        assert_eq!(
            op_of(&read_textures(BackendKind::Raster, &refs)),
            Some("read_textures_raster")
        );
        assert_eq!(
            op_of(&read_textures(BackendKind::Compute, &refs)),
            Some("read_textures_compute")
        );
    }
}
