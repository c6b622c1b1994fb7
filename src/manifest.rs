//! Manifest composition
//!
//! Turns a [`WorkloadDescriptor`] into a single `kustomization.yaml` that
//! points at the workload's git source, extended by the workload's overlay.
//!
//! # Merge policy
//!
//! The overlay is merged with [`merge_shallow`]: each top-level key of the
//! overlay replaces (or adds) the same key in the generated document. Nested
//! values are not merged and types are not checked, so an overlay may replace
//! the `resources` sequence with anything, including a scalar.
//!
//! # Example
//!
//! ```
//! use fleetstage::manifest::compose;
//! use fleetstage::WorkloadDescriptor;
//!
//! let workload = WorkloadDescriptor::new("https://example/repo", "app", "main")
//!     .overlay(r#"{"patchesJson6902": []}"#);
//!
//! let manifest = compose(&workload).unwrap();
//! assert_eq!(manifest.keys().collect::<Vec<_>>(), ["resources", "patchesJson6902"]);
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::workload::WorkloadDescriptor;

/// File name the external tool looks for in a kustomize directory
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Key holding the remote source references
pub const RESOURCES_KEY: &str = "resources";

/// Error type for manifest composition
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Invalid overlay patch: {0}")]
    InvalidOverlay(String),

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Failed to write manifest {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level fields of a kustomization, in insertion order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    /// Generated document for `workload`, ignoring its overlay
    pub fn base(workload: &WorkloadDescriptor) -> Self {
        let mut fields = Map::new();
        fields.insert(
            RESOURCES_KEY.to_string(),
            Value::Array(vec![Value::String(workload.source_ref())]),
        );
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The `resources` sequence, if it is still a sequence
    pub fn resources(&self) -> Option<&Vec<Value>> {
        self.fields.get(RESOURCES_KEY).and_then(Value::as_array)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Render as one YAML document
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        Ok(serde_yaml::to_string(&self.fields)?)
    }

    /// Write `kustomization.yaml` into `dir`, readable only by the owner
    ///
    /// The document is rendered before the file is opened, so a render
    /// failure leaves `dir` untouched.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ManifestError> {
        let yaml = self.to_yaml()?;
        let path = dir.join(KUSTOMIZATION_FILE);

        write_private(&path, yaml.as_bytes()).map_err(|source| ManifestError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "Wrote kustomization");
        Ok(path)
    }
}

/// Parse overlay text into a top-level mapping
pub fn parse_overlay(text: &str) -> Result<Map<String, Value>, ManifestError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ManifestError::InvalidOverlay(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(ManifestError::InvalidOverlay(e.to_string())),
    }
}

/// Copy every overlay key into `base`, replacing existing values
pub fn merge_shallow(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Build the combined manifest for `workload`
///
/// An absent or blank overlay returns the generated document unchanged.
pub fn compose(workload: &WorkloadDescriptor) -> Result<Manifest, ManifestError> {
    let mut manifest = Manifest::base(workload);

    if let Some(text) = workload.overlay_text() {
        let overlay = parse_overlay(text)?;
        debug!(keys = overlay.len(), "Merging overlay patch");
        merge_shallow(&mut manifest.fields, overlay);
    }

    Ok(manifest)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn workload() -> WorkloadDescriptor {
        WorkloadDescriptor::new("https://example/repo", "app", "main")
    }

    #[test]
    fn test_compose_without_overlay() {
        let manifest = compose(&workload()).unwrap();

        assert_eq!(
            manifest.into_value(),
            json!({ "resources": ["https://example/repo/app?ref=main"] })
        );
    }

    #[test]
    fn test_compose_with_empty_overlay_string() {
        let manifest = compose(&workload().overlay("")).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest, Manifest::base(&workload()));
    }

    #[test]
    fn test_compose_adds_overlay_keys_after_resources() {
        let manifest = compose(&workload().overlay(r#"{"patchesJson6902":[]}"#)).unwrap();

        assert_eq!(
            manifest.keys().collect::<Vec<_>>(),
            vec!["resources", "patchesJson6902"]
        );
        assert_eq!(manifest.get("patchesJson6902"), Some(&json!([])));
        assert_eq!(
            manifest.resources(),
            Some(&vec![json!("https://example/repo/app?ref=main")])
        );
    }

    #[test]
    fn test_overlay_replaces_resources() {
        let overlay = r#"{"resources": ["https://other/repo/x?ref=v1", "extra.yaml"]}"#;
        let manifest = compose(&workload().overlay(overlay)).unwrap();

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.resources().map(Vec::len), Some(2));
    }

    #[test]
    fn test_overlay_type_mismatch_is_accepted() {
        let manifest = compose(&workload().overlay(r#"{"resources": "scalar"}"#)).unwrap();

        assert_eq!(manifest.get("resources"), Some(&json!("scalar")));
        assert_eq!(manifest.resources(), None);
    }

    #[test]
    fn test_merge_is_not_recursive() {
        let mut base = Map::new();
        base.insert("images".to_string(), json!({ "name": "busybox", "newTag": "1" }));

        let overlay = parse_overlay(r#"{"images": {"newTag": "2"}}"#).unwrap();
        merge_shallow(&mut base, overlay);

        assert_eq!(base["images"], json!({ "newTag": "2" }));
    }

    #[test]
    fn test_truncated_overlay_is_invalid() {
        let err = compose(&workload().overlay(r#"{"patches": [{"target": "#)).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidOverlay(_)), "got: {err}");
    }

    #[test]
    fn test_non_object_overlay_is_invalid() {
        let err = compose(&workload().overlay("[1, 2]")).unwrap_err();
        assert!(err.to_string().contains("an array"), "got: {err}");
    }

    #[test]
    fn test_write_to_produces_parseable_yaml() {
        let dir = TempDir::new().unwrap();
        let manifest = compose(&workload().overlay(r#"{"namespace": "busybox"}"#)).unwrap();

        let path = manifest.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(KUSTOMIZATION_FILE));

        let written: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, manifest.into_value());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_to_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = compose(&workload()).unwrap().write_to(dir.path()).unwrap();

        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
