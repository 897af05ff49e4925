//! Projecting lookup results back onto a build's dependencies, one row per
//! module dependency, ready for display.

use crate::build::Module;
use crate::keys::{ContentKeyed, ResultMap};
use crate::models::{DependencyProps, NOT_AVAILABLE};
use serde::Serialize;

/// Column titles, in the order of [`DependencyRow::columns()`].
pub const HEADERS: [&str; 4] = ["Module Id", "Dependency name", "BUILD", "VCS URL"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyRow {
    pub module: String,
    pub dependency: String,
    pub build: String,
    pub vcs: String,
}
impl DependencyRow {
    pub fn columns(&self) -> [&str; 4] {
        [&self.module, &self.dependency, &self.build, &self.vcs]
    }
}

/// One row per dependency of every module, in document order. Values that
/// are unknown render as `N/A`.
pub fn rows(modules: &[Module], results: &ResultMap) -> Vec<DependencyRow> {
    let unknown = DependencyProps::default();
    modules
        .iter()
        .flat_map(|module| module.dependencies.iter().map(move |dependency| (module, dependency)))
        .map(|(module, dependency)| {
            let props = dependency.content_key().and_then(|k| results.get(k)).unwrap_or(&unknown);
            DependencyRow {
                module: module.id.clone(),
                dependency: if dependency.id.is_empty() { NOT_AVAILABLE.to_string() } else { dependency.id.clone() },
                build: props.build_label().to_string(),
                vcs: props.vcs.label(),
            }
        })
        .collect()
}
