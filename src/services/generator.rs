// src/services/generator.rs
use crate::errors::IconError;
use crate::models::*;
use crate::services::providers::catalog::display_name;
use crate::services::providers::{GenerationRequest, ProviderAdapter};
use crate::services::svg_normalizer::SvgNormalizer;
use chrono::Utc;
use log::{debug, info};

/// 32-bit rolling hash of `"{specification_id}_{subject}"`, taken as an absolute value.
///
/// Runs over UTF-16 code units so the value matches the seeds stored by earlier sessions.
pub fn derive_seed(specification_id: &str, subject: &str) -> u32 {
    string_hash(&format!("{}_{}", specification_id, subject))
}

fn string_hash(key: &str) -> u32 {
    key.encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Where the icons of one generation call land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationTarget {
    /// Append to the active project.
    Extend(String),
    /// Start a fresh project seeded from the active project or the current upload.
    NewProject,
}

/// Same subject extends; a different subject (or no active project) forks.
///
/// A project fresh out of analysis has no subject and no icons yet; its first
/// generation claims it instead of leaving an empty project behind.
pub fn plan_target(active: Option<&DesignProject>, subject: &str) -> GenerationTarget {
    match active {
        Some(project) => match project.icon_subject.as_deref() {
            Some(previous) if previous == subject => GenerationTarget::Extend(project.id.clone()),
            None if project.generated_icons.is_empty() => {
                GenerationTarget::Extend(project.id.clone())
            }
            _ => GenerationTarget::NewProject,
        },
        None => GenerationTarget::NewProject,
    }
}

/// Display name of a project after generating `subject` with `model_id`.
pub fn project_name(subject: &str, model_id: &str) -> String {
    format!("{}({})", subject, display_name(model_id))
}

/// Normalizes every raw SVG and drops the ones that end up empty.
pub fn accept_svgs(raw: Vec<String>) -> Vec<String> {
    let total = raw.len();
    let accepted: Vec<String> = raw
        .iter()
        .map(|svg| SvgNormalizer::normalize(svg))
        .filter(|svg| !svg.trim().is_empty())
        .collect();
    if accepted.len() < total {
        debug!("Dropped {} empty SVGs", total - accepted.len());
    }
    accepted
}

/// One batch request: seed derivation, adapter dispatch and post-processing.
pub async fn generate_svgs(
    adapter: &dyn ProviderAdapter,
    specification: &DesignSpecification,
    subject: &str,
    model_id: &str,
    api_key: &str,
    prior_subject: Option<&str>,
    prior_svgs: &[String],
) -> Result<Vec<String>, IconError> {
    let seed = derive_seed(&specification.id, subject);
    debug!("Seed for {:?} on {}: {}", subject, specification.id, seed);

    let request = GenerationRequest {
        specification,
        subject,
        seed,
        model_id,
        count: ICONS_PER_GENERATION,
        prior_subject,
        prior_svgs,
    };

    info!(
        "Generating {} icons for {:?} with {} ({})",
        ICONS_PER_GENERATION,
        subject,
        adapter.provider(),
        model_id
    );
    let raw = adapter.generate_icons(&request, api_key).await?;
    let accepted = accept_svgs(raw);
    info!("Accepted {} icons for {:?}", accepted.len(), subject);
    Ok(accepted)
}

fn build_icons(project_id: &str, subject: &str, model_id: &str, svgs: &[String]) -> Vec<GeneratedIcon> {
    let now = Utc::now();
    svgs.iter()
        .map(|svg| GeneratedIcon {
            id: generate_id("icon"),
            project_id: project_id.to_string(),
            subject: subject.to_string(),
            svg_code: svg.clone(),
            llm_model: model_id.to_string(),
            created_at: now,
        })
        .collect()
}

/// Folds an accepted batch into the project it targets and returns that project.
///
/// `image` and `specification` seed a new project; when the target is the
/// active project they are ignored and the project keeps its own.
pub fn fold_batch(
    active: Option<&DesignProject>,
    image: &ReferenceImage,
    specification: &DesignSpecification,
    subject: &str,
    model_id: &str,
    svgs: &[String],
) -> DesignProject {
    let now = Utc::now();
    match (plan_target(active, subject), active) {
        (GenerationTarget::Extend(_), Some(project)) => {
            let mut project = project.clone();
            let icons = build_icons(&project.id, subject, model_id, svgs);
            project.generated_icons.extend(icons);
            project.name = project_name(subject, model_id);
            project.icon_subject = Some(subject.to_string());
            project.llm_model = model_id.to_string();
            project.updated_at = now;
            project
        }
        _ => {
            let id = generate_id("proj");
            let generated_icons = build_icons(&id, subject, model_id, svgs);
            DesignProject {
                id,
                name: project_name(subject, model_id),
                reference_image: image.clone(),
                specification: specification.clone(),
                generated_icons,
                icon_subject: Some(subject.to_string()),
                llm_model: model_id.to_string(),
                created_at: now,
                updated_at: now,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::GoogleAdapter;
    use crate::services::spec_merger::merge_analysis;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Replays a canned response and records the seeds it was given.
    struct Scripted {
        response: Result<Vec<String>, IconError>,
        seeds: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn returning(svgs: Vec<&str>) -> Self {
            Self {
                response: Ok(svgs.into_iter().map(str::to_string).collect()),
                seeds: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for Scripted {
        fn provider(&self) -> Provider {
            Provider::Google
        }

        async fn analyze(&self, _: &ReferenceImage, _: &str, _: &str) -> Result<Value, IconError> {
            Ok(json!({}))
        }

        async fn generate_icons(
            &self,
            request: &GenerationRequest<'_>,
            _: &str,
        ) -> Result<Vec<String>, IconError> {
            self.seeds.lock().unwrap().push(request.seed);
            self.response.clone()
        }
    }

    fn image() -> ReferenceImage {
        ReferenceImage {
            filename: "logo.png".to_string(),
            mime_type: "image/png".to_string(),
            data: vec![0x89, 0x50],
        }
    }

    fn project_with(subject: &str, icon_count: usize) -> DesignProject {
        let spec = merge_analysis(&json!({}), "logo.png");
        let svgs: Vec<String> = (0..icon_count)
            .map(|i| format!("<svg viewBox=\"0 0 24 24\"><path d=\"M{} 0\"/></svg>", i))
            .collect();
        fold_batch(None, &image(), &spec, subject, "gpt-4o", &svgs)
    }

    fn assert_owned(project: &DesignProject) {
        for icon in &project.generated_icons {
            assert_eq!(icon.project_id, project.id);
        }
    }

    #[test]
    fn string_hash_matches_rolling_hash() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("ab"), 97 * 31 + 98);
        assert_eq!(derive_seed("s", "x"), string_hash("s_x"));
    }

    #[test]
    fn seed_is_stable_and_input_sensitive() {
        let seed = derive_seed("spec_1", "Save");
        assert_eq!(seed, derive_seed("spec_1", "Save"));
        assert_ne!(seed, derive_seed("spec_1", "Delete"));
        assert_ne!(seed, derive_seed("spec_2", "Save"));
    }

    #[test]
    fn seed_of_long_input_wraps_without_overflow() {
        let subject = "A very long subject that overflows thirty-two bits many times over";
        assert_eq!(derive_seed("spec", subject), derive_seed("spec", subject));
    }

    #[test]
    fn targeting_follows_subject() {
        let saved = project_with("Save", 3);
        assert_eq!(
            plan_target(Some(&saved), "Save"),
            GenerationTarget::Extend(saved.id.clone())
        );
        assert_eq!(plan_target(Some(&saved), "Delete"), GenerationTarget::NewProject);
        assert_eq!(plan_target(None, "Save"), GenerationTarget::NewProject);

        let mut fresh = saved.clone();
        fresh.icon_subject = None;
        fresh.generated_icons.clear();
        assert_eq!(
            plan_target(Some(&fresh), "Anything"),
            GenerationTarget::Extend(fresh.id.clone())
        );
    }

    #[test]
    fn same_subject_appends_after_existing_icons() {
        let original = project_with("Save", 3);
        let new_svgs = vec!["<svg viewBox=\"0 0 24 24\"><circle r=\"1\"/></svg>".to_string(); 2];
        let spec = original.specification.clone();

        let extended = fold_batch(Some(&original), &image(), &spec, "Save", "gpt-4o", &new_svgs);

        assert_eq!(extended.id, original.id);
        assert_eq!(extended.generated_icons.len(), 5);
        assert_eq!(&extended.generated_icons[..3], &original.generated_icons[..]);
        assert_eq!(extended.name, "Save(GPT-4o)");
        assert!(extended.updated_at >= original.updated_at);
        assert_owned(&extended);
    }

    #[test]
    fn new_subject_forks_a_project() {
        let original = project_with("Save", 3);
        let svgs = vec!["<svg viewBox=\"0 0 24 24\"/>".to_string()];

        let forked = fold_batch(
            Some(&original),
            &original.reference_image,
            &original.specification,
            "Delete",
            "claude-opus-4-5-20251101",
            &svgs,
        );

        assert_ne!(forked.id, original.id);
        assert_eq!(forked.icon_subject.as_deref(), Some("Delete"));
        assert_eq!(forked.name, "Delete(Claude Opus 4.5)");
        assert_eq!(forked.specification, original.specification);
        assert_eq!(forked.generated_icons.len(), 1);
        assert_eq!(original.generated_icons.len(), 3);
        assert_owned(&forked);
    }

    #[tokio::test]
    async fn empty_svgs_are_dropped() {
        let adapter = Scripted::returning(vec![
            "<svg viewBox='0 0 24 24'></svg>",
            "",
            "<svg><path d=\"M0 0h24\"/></svg>",
        ]);
        let spec = merge_analysis(&json!({}), "logo.png");

        let svgs = generate_svgs(&adapter, &spec, "Save", "gemini-2.5-pro", "key", None, &[])
            .await
            .unwrap();
        assert_eq!(svgs.len(), 2);

        let project = fold_batch(None, &image(), &spec, "Save", "gemini-2.5-pro", &svgs);
        assert_eq!(project.generated_icons.len(), 2);
        assert!(project.generated_icons[1].svg_code.contains("viewBox=\"0 0 24 24\""));
    }

    #[tokio::test]
    async fn adapter_receives_derived_seed() {
        let adapter = Scripted::returning(vec!["<svg/>"]);
        let spec = merge_analysis(&json!({}), "logo.png");

        generate_svgs(&adapter, &spec, "Save", "gemini-2.5-pro", "key", None, &[])
            .await
            .unwrap();
        generate_svgs(&adapter, &spec, "Save", "gemini-2.5-pro", "key", None, &[])
            .await
            .unwrap();

        let seeds = adapter.seeds.lock().unwrap().clone();
        assert_eq!(seeds, vec![derive_seed(&spec.id, "Save"); 2]);
    }

    #[tokio::test]
    async fn adapter_failure_propagates_untouched() {
        let adapter = Scripted {
            response: Err(IconError::Generation("quota exceeded (HTTP 429)".to_string())),
            seeds: Mutex::new(Vec::new()),
        };
        let spec = merge_analysis(&json!({}), "logo.png");

        let err = generate_svgs(&adapter, &spec, "Save", "gemini-2.5-pro", "key", None, &[])
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "quota exceeded (HTTP 429)");
    }

    #[test]
    fn malformed_fenced_output_recovers_two_icons() {
        let text = "Here you go:\n```svg\n<svg viewBox=\"0 0 24 24\"><path d=\"M4 12h16\"/></svg>\n<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=0 0 24 24><circle cx=\"12\" cy=\"12\" r=\"4\"/></svg>\n```";
        let raw = GoogleAdapter::parse_generation_text(text).unwrap();
        let svgs = accept_svgs(raw);

        assert_eq!(svgs.len(), 2);
        assert!(svgs[0].contains("xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svgs[1].contains("viewBox=\"0 0 24 24\""));
    }
}
