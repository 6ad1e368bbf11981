// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canvas every generated icon is drawn on.
pub const ICON_VIEWBOX: &str = "0 0 24 24";

/// Number of variations requested per generation call.
pub const ICONS_PER_GENERATION: usize = 5;

pub const SETTINGS_ID: &str = "user-settings";

pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Strips the last extension from a filename ("logo.png" -> "logo").
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < filename.len() && !filename[idx + 1..].contains('/') => {
            &filename[..idx]
        }
        _ => filename,
    }
}

// ---------------------------------------------------------------------------
// Design specification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Rounded,
    Square,
    Pill,
    Circle,
    Organic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Solid,
    Dashed,
    Dotted,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    None,
    Tight,
    Normal,
    Loose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignStyle {
    pub shape: Shape,
    pub border_radius: f64,
    pub has_border: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<Padding>,
}

impl Default for DesignStyle {
    fn default() -> Self {
        Self {
            shape: Shape::Rounded,
            border_radius: 8.0,
            has_border: false,
            border_style: None,
            border_width: None,
            padding: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_stroke: Option<String>,
}

impl Default for DesignColors {
    fn default() -> Self {
        Self {
            primary: "#3b82f6".to_string(),
            secondary: "#64748b".to_string(),
            accent: "#f59e0b".to_string(),
            background: "#ffffff".to_string(),
            text: "#1f2937".to_string(),
            border: None,
            icon_fill: None,
            icon_stroke: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPattern {
    Solid,
    Gradient,
    Noise,
    Texture,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSpec {
    pub is_transparent: bool,
    /// Percentage in [0, 100].
    pub opacity: f64,
    pub pattern: BackgroundPattern,
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        Self {
            is_transparent: false,
            opacity: 100.0,
            pattern: BackgroundPattern::Solid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowType {
    Soft,
    Hard,
    Glow,
    Long,
    Layered,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientType {
    Linear,
    Radial,
    Conic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
    Diagonal,
    Center,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignEffects {
    pub has_shadow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_type: Option<ShadowType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_offset: Option<ShadowOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_blur: Option<f64>,
    pub has_gradient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_type: Option<GradientType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_direction: Option<GradientDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_colors: Option<Vec<String>>,
    pub has_inner_shadow: bool,
    #[serde(default)]
    pub has_glow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glow_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glow_intensity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientSpec {
    pub direction: GradientDirection,
    pub start_color: String,
    pub end_color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconWeight {
    Thin,
    Light,
    #[default]
    Regular,
    Medium,
    Bold,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeLinecap {
    Round,
    Square,
    Butt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeLinejoin {
    Round,
    Miter,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerStyle {
    Sharp,
    Rounded,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Minimal,
    Simple,
    Moderate,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualStyle {
    Flat,
    Outlined,
    Duotone,
    #[serde(rename = "3d")]
    ThreeD,
    Isometric,
    HandDrawn,
    Geometric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconStyle {
    pub weight: IconWeight,
    pub filled: bool,
    /// Pixels at the 24x24 working viewBox.
    pub stroke_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_linecap: Option<StrokeLinecap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_linejoin: Option<StrokeLinejoin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_style: Option<CornerStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_style: Option<VisualStyle>,
}

impl Default for IconStyle {
    fn default() -> Self {
        Self {
            weight: IconWeight::Regular,
            filled: false,
            stroke_width: 2.0,
            stroke_linecap: None,
            stroke_linejoin: None,
            corner_style: None,
            complexity: None,
            visual_style: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "custom")]
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSpec {
    pub aspect_ratio: AspectRatio,
    pub suggested_size: u32,
}

impl Default for DimensionSpec {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Square,
            suggested_size: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Modern,
    Classic,
    Playful,
    Professional,
    Minimal,
    Skeuomorphic,
    Neumorphic,
    Glassmorphism,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Neutral,
    Friendly,
    Serious,
    Energetic,
    Calm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignLanguage {
    pub theme: Theme,
    pub mood: Mood,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_style: Option<String>,
}

impl Default for DesignLanguage {
    fn default() -> Self {
        Self {
            theme: Theme::Modern,
            mood: Mood::Neutral,
            brand_style: None,
        }
    }
}

/// The fully populated design contract derived from one reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSpecification {
    pub id: String,
    pub name: String,
    pub style: DesignStyle,
    pub colors: DesignColors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundSpec>,
    pub effects: DesignEffects,
    pub gradient: GradientSpec,
    pub icon_style: IconStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<DimensionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_language: Option<DesignLanguage>,
    pub raw_analysis: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Projects and icons
// ---------------------------------------------------------------------------

/// Image supplied by the user as the style reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImage {
    pub filename: String,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn is_vector(&self) -> bool {
        self.mime_type.starts_with("image/svg")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedIcon {
    pub id: String,
    pub project_id: String,
    pub subject: String,
    pub svg_code: String,
    pub llm_model: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignProject {
    pub id: String,
    pub name: String,
    pub reference_image: ReferenceImage,
    pub specification: DesignSpecification,
    pub generated_icons: Vec<GeneratedIcon>,
    #[serde(default)]
    pub icon_subject: Option<String>,
    pub llm_model: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl DesignProject {
    pub fn to_summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            icon_subject: self.icon_subject.clone(),
            llm_model: self.llm_model.clone(),
            icon_count: self.generated_icons.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub icon_subject: Option<String>,
    pub llm_model: String,
    pub icon_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::Ollama => "ollama",
        }
    }

    /// Local models run without a secret.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

impl std::str::FromStr for Provider {
    type Err = crate::errors::IconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::errors::IconError::InvalidProvider(s.to_string()))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeys {
    #[serde(default)]
    pub openai: String,
    #[serde(default)]
    pub anthropic: String,
    #[serde(default)]
    pub google: String,
}

impl ApiKeys {
    pub fn get(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Google => &self.google,
            Provider::Ollama => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub provider: Provider,
    pub model: String,
    #[serde(default)]
    pub api_keys: ApiKeys,
}

impl Default for Settings {
    fn default() -> Self {
        let provider = Provider::default();
        Self {
            id: SETTINGS_ID.to_string(),
            provider,
            model: crate::services::providers::catalog::default_model(provider).to_string(),
            api_keys: ApiKeys::default(),
        }
    }
}

impl Settings {
    /// Secret for the active provider. `None` when one is required but missing.
    pub fn credential(&self) -> Option<&str> {
        self.credential_for(self.provider)
    }

    pub fn credential_for(&self, provider: Provider) -> Option<&str> {
        let key = self.api_keys.get(provider);
        if !provider.requires_api_key() {
            Some("")
        } else if key.trim().is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
