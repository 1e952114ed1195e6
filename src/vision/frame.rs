use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::VisionClient;
use crate::error::Result;

pub const FRAME_PROMPT: &str = r#"Is this shader output valid?
Valid = shows actual visual content (patterns, colors, textures, effects, colorful mosaic, grid of colors)
Invalid = completely blank, solid color only, or obviously broken/corrupted

CRITICAL TRANSPARENCY CHECK: If you see a GRAY AND WHITE checkerboard pattern (like Photoshop's transparency background), this means the output is TRANSPARENT. Tag as "transparency-background". This is different from colorful grids/mosaics which are valid.

Only include these tags if problems exist: "blank", "solid", "broken", "invalid", "transparency-background".
Do NOT tag colorful patterns or mosaics as problematic - those are valid outputs."#;

const FAILURE_INDICATORS: &[&str] = &[
    "blank",
    "solid color",
    "broken",
    "invalid",
    "corrupted",
    "empty",
    "nothing",
    "transparency-background",
];
const MONOCHROME_TOLERATED: &[&str] = &["solid color", "blank", "empty", "nothing", "invalid"];
const TRANSPARENT_TOLERATED: &[&str] = &["transparency-background", "blank", "empty", "nothing", "invalid"];

fn instructions(prompt: &str) -> String {
    format!(
        "You are an expert at analyzing procedural graphics and shader effects.\n\
         Analyze the provided image and respond with a JSON object containing:\n\
         - description: A detailed description of what you see (2-3 sentences)\n\
         - tags: An array of relevant tags (e.g., \"noise\", \"colorful\", \"abstract\", \"pattern\", \"gradient\", etc.)\n\
         - notes: Any additional observations about the quality, artifacts, or issues (optional)\n\n\
         User prompt: {prompt}"
    )
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionObservation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionStatus {
    Ok,
    Failed,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisionReport {
    pub status: VisionStatus,
    pub observation: Option<VisionObservation>,
    /// Why the frame was judged invalid, or the service error.
    pub reason: Option<String>,
}

impl VisionReport {
    pub fn unavailable() -> Self {
        Self {
            status: VisionStatus::Unavailable,
            observation: None,
            reason: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.status == VisionStatus::Failed
    }

    /// First few tags, or the start of the description.
    pub fn summary(&self) -> String {
        match &self.observation {
            Some(o) if !o.tags.is_empty() => o.tags.iter().take(3).cloned().collect::<Vec<_>>().join(", "),
            Some(o) => o.description.chars().take(50).collect(),
            None => String::new(),
        }
    }
}

/// Reason the observation marks the frame invalid, if it does.
///
/// Exempt effects tolerate exactly the wording of their exempted failure class.
pub fn classify(obs: &VisionObservation, monochrome_exempt: bool, transparent_exempt: bool) -> Option<String> {
    let desc = obs.description.to_lowercase();
    let tags: Vec<String> = obs.tags.iter().map(|t| t.to_lowercase()).collect();
    let notes = obs.notes.as_deref().unwrap_or("").to_lowercase();
    let all_text = format!("{desc} {} {notes}", tags.join(" "));

    let indicator = FAILURE_INDICATORS
        .iter()
        .filter(|i| !(monochrome_exempt && MONOCHROME_TOLERATED.contains(i)))
        .filter(|i| !(transparent_exempt && TRANSPARENT_TOLERATED.contains(i)))
        .any(|i| all_text.contains(i));

    let problem_tags: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|t| match *t {
            "broken" | "corrupted" | "artifact" => true,
            "transparency-background" => !transparent_exempt,
            _ if monochrome_exempt || transparent_exempt => false,
            t => matches!(t, "blank" | "solid" | "empty" | "invalid"),
        })
        .collect();

    if !problem_tags.is_empty() {
        Some(problem_tags.join(", "))
    } else if indicator {
        Some(desc.chars().take(100).collect())
    } else {
        None
    }
}

impl VisionClient {
    pub fn describe_frame(&self, png: &[u8], prompt: &str) -> Result<VisionObservation> {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(png));
        let reply = self.ask_json(vec![
            json!({ "type": "text", "text": instructions(prompt) }),
            json!({ "type": "image_url", "image_url": { "url": uri } }),
        ])?;
        Ok(serde_json::from_value(reply)?)
    }
}

/// Judge one captured frame. A service error fails the check.
pub fn judge_frame(
    client: Option<&VisionClient>,
    png: &[u8],
    monochrome_exempt: bool,
    transparent_exempt: bool,
) -> VisionReport {
    let Some(client) = client else {
        return VisionReport::unavailable();
    };
    match client.describe_frame(png, FRAME_PROMPT) {
        Ok(obs) => {
            let reason = classify(&obs, monochrome_exempt, transparent_exempt);
            VisionReport {
                status: if reason.is_some() {
                    VisionStatus::Failed
                } else {
                    VisionStatus::Ok
                },
                observation: Some(obs),
                reason,
            }
        }
        Err(e) => {
            log::warn!("[vision] {e}");
            VisionReport {
                status: VisionStatus::Failed,
                observation: None,
                reason: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(desc: &str, tags: &[&str]) -> VisionObservation {
        VisionObservation {
            description: desc.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            notes: None,
        }
    }

    #[test]
    fn colorful_pattern_passes() {
        assert_eq!(classify(&obs("Swirling colorful noise.", &["noise", "colorful"]), false, false), None);
    }

    #[test]
    fn problem_tags_fail() {
        let r = classify(&obs("A grid.", &["pattern", "Broken"]), false, false);
        assert_eq!(r.as_deref(), Some("broken"));
    }

    #[test]
    fn solid_tolerated_only_when_monochrome_exempt() {
        let o = obs("A solid color fill in red.", &["solid"]);
        assert!(classify(&o, false, false).is_some());
        assert_eq!(classify(&o, true, false), None);
    }

    #[test]
    fn checkerboard_fails_unless_transparent_exempt() {
        let o = obs("Gray and white checkerboard.", &["transparency-background"]);
        assert!(classify(&o, true, false).is_some());
        assert_eq!(classify(&o, false, true), None);
    }

    #[test]
    fn indicator_in_description_fails() {
        let r = classify(&obs("The image is completely blank.", &[]), false, false);
        assert!(r.unwrap().contains("blank"));
    }

    #[test]
    fn no_client_is_unavailable() {
        let r = judge_frame(None, &[], false, false);
        assert_eq!(r.status, VisionStatus::Unavailable);
        assert!(!r.failed());
    }
}
