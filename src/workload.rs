//! Workload descriptors
//!
//! A workload is a kustomize-able directory in a git repository, optionally
//! customized by a JSON overlay patch.

use serde::{Deserialize, Serialize};

/// Source locator and overlay for one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDescriptor {
    /// Git repository URL, without a trailing slash
    pub repository_url: String,

    /// Directory inside the repository
    pub path: String,

    /// Branch, tag or commit
    pub revision: String,

    /// JSON object merged into the generated kustomization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_patch: Option<String>,
}

impl WorkloadDescriptor {
    pub fn new(
        repository_url: impl Into<String>,
        path: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            path: path.into(),
            revision: revision.into(),
            overlay_patch: None,
        }
    }

    /// Set the overlay patch
    #[must_use]
    pub fn overlay(mut self, patch: impl Into<String>) -> Self {
        self.overlay_patch = Some(patch.into());
        self
    }

    /// Overlay text, or `None` when absent or blank
    pub fn overlay_text(&self) -> Option<&str> {
        self.overlay_patch
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Kustomize remote reference, `repo/path?ref=revision`
    pub fn source_ref(&self) -> String {
        format!("{}/{}?ref={}", self.repository_url, self.path, self.revision)
    }
}
