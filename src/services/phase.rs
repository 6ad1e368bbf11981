// src/services/phase.rs
//! Derives the session phase and which actions are enabled from current data.
//! Nothing here is stored; every call recomputes from its inputs.

use crate::models::{DesignProject, DesignSpecification};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Upload,
    Analyze,
    Generate,
}

/// The slice of session state the phase depends on.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInputs<'a> {
    pub specification: Option<&'a DesignSpecification>,
    pub active_project: Option<&'a DesignProject>,
    pub generated_svgs: &'a [String],
}

impl<'a> PhaseInputs<'a> {
    /// The in-memory draft wins over the active project's stored specification.
    pub fn active_specification(&self) -> Option<&'a DesignSpecification> {
        self.specification
            .or_else(|| self.active_project.map(|p| &p.specification))
    }

    fn has_saved_icons(&self) -> bool {
        self.active_project
            .is_some_and(|p| !p.generated_icons.is_empty())
    }
}

pub fn determine_phase(inputs: &PhaseInputs<'_>) -> Phase {
    if !inputs.generated_svgs.is_empty() || inputs.has_saved_icons() {
        Phase::Generate
    } else if inputs.active_specification().is_some() {
        Phase::Analyze
    } else {
        Phase::Upload
    }
}

/// One icon in the grid. `id` is set only for icons already saved in a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayedIcon {
    pub index: usize,
    pub id: Option<String>,
    pub subject: Option<String>,
    pub svg: String,
}

/// Fresh icons from this session take precedence; saved icons are never mixed in.
pub fn displayed_icons(inputs: &PhaseInputs<'_>) -> Vec<DisplayedIcon> {
    if !inputs.generated_svgs.is_empty() {
        return inputs
            .generated_svgs
            .iter()
            .enumerate()
            .map(|(index, svg)| DisplayedIcon {
                index,
                id: None,
                subject: None,
                svg: svg.clone(),
            })
            .collect();
    }

    inputs
        .active_project
        .map(|project| {
            project
                .generated_icons
                .iter()
                .enumerate()
                .map(|(index, icon)| DisplayedIcon {
                    index,
                    id: Some(icon.id.clone()),
                    subject: Some(icon.subject.clone()),
                    svg: icon.svg_code.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Flags that gate the two network actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Readiness {
    pub has_image: bool,
    pub has_credentials: bool,
    pub is_analyzing: bool,
    pub is_generating: bool,
}

impl Readiness {
    fn busy(&self) -> bool {
        self.is_analyzing || self.is_generating
    }
}

pub fn can_analyze(readiness: &Readiness) -> bool {
    readiness.has_image && readiness.has_credentials && !readiness.busy()
}

/// Generation needs a specification, a subject, credentials and something to
/// seed a project from: either an active project or an uploaded image.
pub fn can_generate(inputs: &PhaseInputs<'_>, subject: &str, readiness: &Readiness) -> bool {
    inputs.active_specification().is_some()
        && !subject.trim().is_empty()
        && readiness.has_credentials
        && (inputs.active_project.is_some() || readiness.has_image)
        && !readiness.busy()
}
