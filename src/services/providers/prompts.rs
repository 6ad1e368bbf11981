// src/services/providers/prompts.rs
use crate::models::{DesignSpecification, ICON_VIEWBOX};

pub const IMAGE_ANALYSIS_PROMPT: &str = r#"
Analyze this UI button/icon reference image and extract its design specification.
Return ONLY a valid JSON object with this structure (no markdown, no explanation):

{
  "style": {
    "shape": "rounded|square|pill|circle|organic",
    "borderRadius": <number 0-50>,
    "hasBorder": <boolean>,
    "borderStyle": "solid|dashed|dotted|double",
    "borderWidth": <number 1-5>,
    "padding": "none|tight|normal|loose"
  },
  "colors": {
    "primary": "<hex color>",
    "secondary": "<hex color>",
    "accent": "<hex color>",
    "background": "<hex color or 'transparent'>",
    "text": "<hex color>",
    "border": "<hex color>",
    "iconFill": "<hex color or 'none'>",
    "iconStroke": "<hex color>"
  },
  "background": {
    "isTransparent": <boolean>,
    "opacity": <number 0-100>,
    "pattern": "solid|gradient|noise|texture|none"
  },
  "effects": {
    "hasShadow": <boolean>,
    "shadowType": "soft|hard|glow|long|layered",
    "shadowColor": "<hex color with alpha, e.g. #00000033>",
    "shadowOffset": { "x": <number>, "y": <number> },
    "shadowBlur": <number 0-20>,
    "hasGradient": <boolean>,
    "gradientType": "linear|radial|conic",
    "gradientDirection": "top|bottom|left|right|diagonal|center",
    "gradientColors": ["<hex color>", "<hex color>"],
    "hasInnerShadow": <boolean>,
    "hasGlow": <boolean>,
    "glowColor": "<hex color>",
    "glowIntensity": <number 0-100>
  },
  "iconStyle": {
    "weight": "thin|light|regular|medium|bold|heavy",
    "filled": <boolean>,
    "strokeWidth": <number 0.5-4>,
    "strokeLinecap": "round|square|butt",
    "strokeLinejoin": "round|miter|bevel",
    "cornerStyle": "sharp|rounded|mixed",
    "complexity": "minimal|simple|moderate|detailed",
    "visualStyle": "flat|outlined|duotone|3d|isometric|hand-drawn|geometric"
  },
  "dimensions": {
    "aspectRatio": "1:1|4:3|16:9|custom",
    "suggestedSize": <number 16-128>
  },
  "designLanguage": {
    "theme": "modern|classic|playful|professional|minimal|skeuomorphic|neumorphic|glassmorphism",
    "mood": "neutral|friendly|serious|energetic|calm",
    "brandStyle": "<brief description of overall visual identity>"
  }
}

Check carefully:
- whether the background is transparent or solid
- the exact icon stroke style and weight
- shadows, glows and gradients
- the overall design language
- exact hex values as observed in the image
"#;

const VARIATION_GUIDANCE: [&str; 5] = [
    "Most literal/standard interpretation",
    "Minimal/simplified version",
    "Creative/unique interpretation",
    "Detailed/elaborate version",
    "Alternative metaphor/symbol",
];

/// Prompt asking for `count` SVG variations of `subject` in the given style.
///
/// When a previous round exists, the prompt either asks for fresh alternatives
/// (same subject) or for stylistic continuity with the last icon set (new subject).
pub fn svg_generation_prompt(
    specification: &DesignSpecification,
    subject: &str,
    count: usize,
    prior_subject: Option<&str>,
    prior_svgs: &[String],
) -> String {
    let spec_json = serde_json::to_string_pretty(specification).unwrap_or_default();

    let variations = (0..count)
        .map(|i| {
            let guidance = VARIATION_GUIDANCE
                .get(i)
                .copied()
                .unwrap_or("Another distinct interpretation");
            format!("   - Variation {}: {}", i + 1, guidance)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let history = match prior_subject {
        Some(prior) if !prior_svgs.is_empty() => {
            let previous = prior_svgs
                .iter()
                .enumerate()
                .map(|(i, svg)| format!("{}. {}", i + 1, svg))
                .collect::<Vec<_>>()
                .join("\n");
            if prior.trim().eq_ignore_ascii_case(subject.trim()) {
                format!(
                    "\nPreviously generated icons for \"{prior}\" (do NOT repeat them, produce new alternatives in the same style):\n{previous}\n"
                )
            } else {
                format!(
                    "\nThe last icon set was for \"{prior}\". Keep the new icons visually consistent with it:\n{previous}\n"
                )
            }
        }
        _ => String::new(),
    };

    format!(
        r#"You are an expert SVG icon designer. Generate {count} professional-quality SVG icon variations for "{subject}" based on the design specification below.

Design Specification:
{spec_json}
{history}
Requirements:
1. Each SVG must be valid, self-contained and production-ready
2. Use viewBox="{ICON_VIEWBOX}" and no width/height attributes
3. Follow the specification's visual style strictly:
   - "outlined" means stroke only (fill="none")
   - "duotone" means two-tone coloring
   - match strokeWidth, strokeLinecap and strokeLinejoin from iconStyle
4. Use iconStroke for strokes and iconFill for fills, and respect background transparency
5. Match the complexity level: minimal=few strokes/shapes, simple=clean and clear, moderate=balanced detail, detailed=intricate design
6. Each variation must be distinctly different:
{variations}

Prefer <path> elements with optimized d attributes, avoid unnecessary transforms or groups, close all paths, and use SVG filters for shadows or glows when the specification asks for them.

Return ONLY a JSON array of {count} complete SVG strings:
["<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{ICON_VIEWBOX}\">...</svg>", ...]"#
    )
}
