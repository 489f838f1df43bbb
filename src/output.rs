//! Data carried between pipeline stages.
//!
//! Everything here is request-scoped: produced once, consumed once by the
//! next stage, then dropped.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Brand name used when the model did not report one.
pub const DEFAULT_BRAND_NAME: &str = "BRAND";
/// Scene used when the model did not describe one.
pub const DEFAULT_SCENE: &str = "a clean studio set filled with objects that represent the brand";
/// Primary colour used when the model did not extract one.
pub const DEFAULT_PRIMARY_COLOR: &str = "#000000";
/// Mood used when the model did not report one.
pub const DEFAULT_MOOD: &str = "modern and clean";

/// Structured result of the vision-analysis stage.
///
/// Upstream model output is untrusted free text, so every field is optional.
/// Accessors substitute the documented defaults; the raw `Option`s stay
/// public so callers can tell "missing" from "defaulted".
///
/// Deserialisation accepts the schema variants vision models tend to drift
/// between (`title` for `brand_name`, `what_they_do` for `what_it_provides`,
/// a flat `primary_color` instead of `color_palette`, …). Unknown fields are
/// ignored and scalars of the wrong type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisRecord {
    pub brand_name: Option<String>,
    pub what_it_provides: Option<String>,
    pub scene_description: Option<String>,
    pub color_palette: ColorPalette,
    pub mood: Option<String>,
    pub key_objects: Vec<String>,
}

/// Brand colours as reported by the model, usually hex strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColorPalette {
    pub primary: Option<String>,
    pub secondary: Vec<String>,
}

impl AnalysisRecord {
    pub fn brand_name(&self) -> &str {
        self.brand_name.as_deref().unwrap_or(DEFAULT_BRAND_NAME)
    }

    pub fn what_it_provides(&self) -> &str {
        self.what_it_provides.as_deref().unwrap_or("")
    }

    pub fn scene_description(&self) -> &str {
        self.scene_description.as_deref().unwrap_or(DEFAULT_SCENE)
    }

    pub fn primary_color(&self) -> &str {
        self.color_palette
            .primary
            .as_deref()
            .unwrap_or(DEFAULT_PRIMARY_COLOR)
    }

    pub fn mood(&self) -> &str {
        self.mood.as_deref().unwrap_or(DEFAULT_MOOD)
    }

    /// One-line summary: `"<brand>: <what it provides>"`, or just the brand.
    pub fn summary(&self) -> String {
        match self.what_it_provides() {
            "" => self.brand_name().to_string(),
            what => format!("{}: {}", self.brand_name(), what),
        }
    }
}

// ── Lenient deserialisation ──────────────────────────────────────────────

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    what_it_provides: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    what_they_provide: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    what_they_do: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    scene_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    poster_scene: Option<String>,
    #[serde(default)]
    color_palette: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    primary_color: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    secondary_color: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    accent_color: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    mood: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    atmosphere: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    key_objects: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    objects_list: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    keywords: Vec<String>,
}

/// First non-empty list, in priority order.
fn first_non_empty(lists: [Vec<String>; 3]) -> Vec<String> {
    lists.into_iter().find(|l| !l.is_empty()).unwrap_or_default()
}

impl<'de> Deserialize<'de> for AnalysisRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRecord::deserialize(deserializer)?;

        let nested = raw.color_palette.as_ref().and_then(Value::as_object);
        let nested_primary = nested
            .and_then(|m| m.get("primary"))
            .and_then(value_to_string);
        let nested_secondary = nested
            .and_then(|m| m.get("secondary"))
            .map(value_to_list)
            .unwrap_or_default();

        let color_palette = ColorPalette {
            primary: nested_primary.or(raw.primary_color),
            secondary: first_non_empty([nested_secondary, raw.secondary_color, raw.accent_color]),
        };

        Ok(AnalysisRecord {
            brand_name: raw.brand_name.or(raw.title),
            what_it_provides: raw
                .what_it_provides
                .or(raw.what_they_provide)
                .or(raw.what_they_do),
            scene_description: raw.scene_description.or(raw.poster_scene),
            color_palette,
            mood: raw.mood.or(raw.atmosphere),
            key_objects: first_non_empty([raw.key_objects, raw.objects_list, raw.keywords]),
        })
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_string(&Value::deserialize(d)?))
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(value_to_list(&Value::deserialize(d)?))
}

fn value_to_string(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Arrays keep their string items; a bare string is split on commas.
fn value_to_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(value_to_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

// ── Generation inputs & final result ─────────────────────────────────────

/// Sampling parameters sent to the image model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
}

/// Output of the synthesizer, passed unmodified to the image generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterPrompt {
    pub instruction: String,
    pub exclusions: String,
    pub generation_params: GenerationParams,
}

/// Terminal artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub poster_url: String,
    pub summary: String,
}
