//! Numeric parameter specs and the off-default values probes apply to them.

use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Float,
    Int,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericParam {
    pub key: String,
    pub uniform: String,
    pub kind: ParamKind,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// False when the range was synthesized around the default.
    pub declared_range: bool,
}

const NON_NUMERIC: &[&str] = &["boolean", "button", "member", "surface", "color", "string", "text"];

fn kind_of(ty: &str) -> ParamKind {
    match ty {
        "int" | "integer" => ParamKind::Int,
        _ => ParamKind::Float,
    }
}

impl NumericParam {
    /// Interpret one `globals` entry; `None` for anything not numerically testable.
    pub fn from_spec(key: &str, spec: &Value) -> Option<Self> {
        let uniform = spec.get("uniform")?.as_str()?.to_string();
        let ty = spec.get("type").and_then(Value::as_str).unwrap_or("float");
        if NON_NUMERIC.contains(&ty) {
            return None;
        }
        let min = spec.get("min").and_then(Value::as_f64);
        let max = spec.get("max").and_then(Value::as_f64);
        let default = spec.get("default").and_then(Value::as_f64);

        if let (Some(min), Some(max)) = (min, max) {
            if min != max {
                return Some(Self {
                    key: key.to_string(),
                    uniform,
                    kind: kind_of(ty),
                    default: default.unwrap_or(min),
                    min,
                    max,
                    declared_range: true,
                });
            }
        }
        let default = default?;
        if !matches!(ty, "float" | "int" | "integer") {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            uniform,
            kind: kind_of(ty),
            default,
            min: default * 0.1,
            max: default * 2.0 + 1.0,
            declared_range: false,
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    fn finish(&self, v: f64) -> f64 {
        match self.kind {
            ParamKind::Int => v.round(),
            ParamKind::Float => v,
        }
    }

    /// Value used to check that a parameter influences the output.
    ///
    /// 75% of the range when the default sits at min, 25% at max, otherwise
    /// halfway toward the farther extreme. Stays off exact 1.0 steps, which
    /// `fract()`-style shaders map back onto the default.
    pub fn responsiveness_value(&self) -> f64 {
        let range = self.range();
        let d = self.default;
        let v = if range <= 0.0 {
            d
        } else if d == self.min {
            self.min + range * 0.75
        } else if d == self.max {
            self.min + range * 0.25
        } else {
            let to_min = d - self.min;
            let to_max = self.max - d;
            if to_max > to_min {
                d + to_max * 0.5
            } else {
                d - to_min * 0.5
            }
        };
        self.finish(v)
    }

    /// Value used to push a filter away from any identity setting.
    ///
    /// At an edge: 90% of the range toward the other extreme. Centered: 90%
    /// of the way to whichever extreme is farther.
    pub fn perturbed_value(&self) -> f64 {
        let range = self.range();
        let d = self.default;
        let v = if range <= 0.0 {
            d
        } else if d <= self.min {
            self.min + range * 0.9
        } else if d >= self.max {
            self.max - range * 0.9
        } else {
            let to_min = d - self.min;
            let to_max = self.max - d;
            if to_max >= to_min {
                d + to_max * 0.9
            } else {
                d - to_min * 0.9
            }
        };
        self.finish(v)
    }

    pub fn to_json(&self, v: f64) -> Value {
        match self.kind {
            ParamKind::Int => json!(v as i64),
            ParamKind::Float => json!(v),
        }
    }
}

/// Testable parameters in declaration order.
pub fn numeric_params(globals: &[(String, Value)]) -> Vec<NumericParam> {
    globals
        .iter()
        .filter_map(|(k, spec)| NumericParam::from_spec(k, spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(spec: Value) -> NumericParam {
        NumericParam::from_spec("p", &spec).unwrap()
    }

    #[test]
    fn declared_range_is_kept() {
        let p = param(json!({"type": "float", "uniform": "amt", "default": 0.5, "min": 0, "max": 1}));
        assert!(p.declared_range);
        assert_eq!((p.min, p.max), (0.0, 1.0));
    }

    #[test]
    fn synthetic_range_around_default() {
        let p = param(json!({"type": "float", "uniform": "speed", "default": 2.0}));
        assert!(!p.declared_range);
        assert!((p.min - 0.2).abs() < 1e-9);
        assert_eq!(p.max, 5.0);
    }

    #[test]
    fn skips_unbound_and_non_numeric() {
        assert!(NumericParam::from_spec("x", &json!({"type": "float", "default": 1})).is_none());
        assert!(
            NumericParam::from_spec("x", &json!({"type": "boolean", "uniform": "x", "default": true}))
                .is_none()
        );
        assert!(
            NumericParam::from_spec("x", &json!({"type": "surface", "default": "inputTex"})).is_none()
        );
    }

    #[test]
    fn responsiveness_values() {
        let at_min = param(json!({"uniform": "a", "default": 0, "min": 0, "max": 4}));
        assert_eq!(at_min.responsiveness_value(), 3.0);
        let at_max = param(json!({"uniform": "a", "default": 4, "min": 0, "max": 4}));
        assert_eq!(at_max.responsiveness_value(), 1.0);
        let near_min = param(json!({"uniform": "a", "default": 1, "min": 0, "max": 9}));
        assert_eq!(near_min.responsiveness_value(), 5.0);
        let int = param(json!({"type": "int", "uniform": "n", "default": 1, "min": 1, "max": 10}));
        assert_eq!(int.responsiveness_value(), 8.0);
    }

    #[test]
    fn perturbation_moves_far_from_default() {
        let at_min = param(json!({"uniform": "a", "default": 0, "min": 0, "max": 10}));
        assert_eq!(at_min.perturbed_value(), 9.0);
        let at_max = param(json!({"uniform": "a", "default": 10, "min": 0, "max": 10}));
        assert_eq!(at_max.perturbed_value(), 1.0);
        let centered = param(json!({"uniform": "a", "default": 4, "min": 0, "max": 10}));
        assert!((centered.perturbed_value() - 9.4).abs() < 1e-9);
        let int = param(json!({"type": "integer", "uniform": "o", "default": 5, "min": 1, "max": 10}));
        assert_eq!(int.perturbed_value(), 10.0);
        assert_eq!(int.to_json(int.perturbed_value()), json!(10));
    }
}
