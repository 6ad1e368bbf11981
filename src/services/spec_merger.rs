// src/services/spec_merger.rs
//! Turns the partial JSON a provider returns into a complete [`DesignSpecification`].
//!
//! Every section starts from a declared default record; provider fields are
//! overlaid one by one and kept only if the section still deserializes, so an
//! unknown enum member or a wrongly typed value falls back to the default
//! instead of failing the whole analysis.

use crate::models::*;
use chrono::Utc;
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Overlays every non-null field of `provided` onto `defaults`.
pub fn overlay_section<T>(defaults: &T, provided: Option<&Value>) -> T
where
    T: Serialize + DeserializeOwned + Clone,
{
    let Some(Value::Object(fields)) = provided else {
        return defaults.clone();
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(defaults) else {
        return defaults.clone();
    };

    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let previous = merged.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            warn!("Ignoring unsupported value for '{}': {}", key, value);
            match previous {
                Some(previous) => {
                    merged.insert(key.clone(), previous);
                }
                None => {
                    merged.remove(key);
                }
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| defaults.clone())
}

/// Like [`overlay_section`] but only produces a section the provider mentioned.
fn optional_section<T>(current: Option<&T>, provided: Option<&Value>) -> Option<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    match provided {
        Some(value @ Value::Object(_)) => {
            let base = current.cloned().unwrap_or_default();
            Some(overlay_section(&base, Some(value)))
        }
        _ => current.cloned(),
    }
}

fn clamp_background(mut background: BackgroundSpec) -> BackgroundSpec {
    background.opacity = background.opacity.clamp(0.0, 100.0);
    background
}

/// Gradient implied by the colors and the `effects.gradient*` fields.
fn gradient_from_effects(colors: &DesignColors, effects: &DesignEffects) -> GradientSpec {
    let mut gradient = GradientSpec {
        direction: GradientDirection::Top,
        start_color: colors.primary.clone(),
        end_color: colors.secondary.clone(),
    };
    if let Some(direction) = effects.gradient_direction {
        gradient.direction = direction;
    }
    if let Some(stops) = effects.gradient_colors.as_ref() {
        if let Some(start) = stops.first() {
            gradient.start_color = start.clone();
        }
        if let Some(end) = stops.get(1) {
            gradient.end_color = end.clone();
        }
    }
    gradient
}

/// Writes the gradient back into the effects section so both agree.
fn sync_effects(effects: &mut DesignEffects, gradient: &GradientSpec) {
    effects.gradient_direction = Some(gradient.direction);
    effects.gradient_colors = Some(vec![
        gradient.start_color.clone(),
        gradient.end_color.clone(),
    ]);
}

/// Builds a complete specification from a provider's partial analysis result.
///
/// Never fails: missing, null or invalid fields keep their defaults.
pub fn merge_analysis(partial: &Value, filename: &str) -> DesignSpecification {
    let style = overlay_section(&DesignStyle::default(), partial.get("style"));
    let colors = overlay_section(&DesignColors::default(), partial.get("colors"));
    let mut effects = overlay_section(&DesignEffects::default(), partial.get("effects"));
    let icon_style = overlay_section(&IconStyle::default(), partial.get("iconStyle"));
    let background = optional_section(None, partial.get("background")).map(clamp_background);
    let dimensions = optional_section::<DimensionSpec>(None, partial.get("dimensions"));
    let design_language = optional_section::<DesignLanguage>(None, partial.get("designLanguage"));

    let gradient = overlay_section(
        &gradient_from_effects(&colors, &effects),
        partial.get("gradient"),
    );
    sync_effects(&mut effects, &gradient);

    let raw_analysis = serde_json::to_string_pretty(partial).unwrap_or_else(|_| partial.to_string());
    let now = Utc::now();

    let specification = DesignSpecification {
        id: generate_id("spec"),
        name: strip_extension(filename).to_string(),
        style,
        colors,
        background,
        effects,
        gradient,
        icon_style,
        dimensions,
        design_language,
        raw_analysis,
        created_at: now,
        updated_at: now,
    };
    debug!(
        "Merged specification {} from {}",
        specification.id, filename
    );
    specification
}

/// Applies a partial edit (same shape as the specification JSON) to a specification.
///
/// `id`, `rawAnalysis` and `createdAt` are never touched; `updatedAt` always moves forward.
pub fn apply_specification_patch(
    specification: &DesignSpecification,
    patch: &Value,
) -> DesignSpecification {
    let mut updated = specification.clone();

    if let Some(name) = patch.get("name").and_then(Value::as_str) {
        let name = name.trim();
        if !name.is_empty() {
            updated.name = name.to_string();
        }
    }

    updated.style = overlay_section(&updated.style, patch.get("style"));
    updated.colors = overlay_section(&updated.colors, patch.get("colors"));
    updated.effects = overlay_section(&updated.effects, patch.get("effects"));
    updated.icon_style = overlay_section(&updated.icon_style, patch.get("iconStyle"));
    updated.background =
        optional_section(updated.background.as_ref(), patch.get("background")).map(clamp_background);
    updated.dimensions = optional_section(updated.dimensions.as_ref(), patch.get("dimensions"));
    updated.design_language =
        optional_section(updated.design_language.as_ref(), patch.get("designLanguage"));

    let touches_effects_gradient = patch
        .get("effects")
        .map(|e| !e["gradientDirection"].is_null() || !e["gradientColors"].is_null())
        .unwrap_or(false);

    if patch.get("gradient").is_some_and(Value::is_object) {
        updated.gradient = overlay_section(&updated.gradient, patch.get("gradient"));
    } else if touches_effects_gradient {
        // effects still carry the previous stops, so a direction-only edit keeps them
        updated.gradient = gradient_from_effects(&updated.colors, &updated.effects);
    }
    sync_effects(&mut updated.effects, &updated.gradient);

    let now = Utc::now();
    updated.updated_at = if now > specification.updated_at {
        now
    } else {
        specification.updated_at + chrono::Duration::milliseconds(1)
    };
    updated
}
