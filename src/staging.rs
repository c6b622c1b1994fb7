//! Scratch directories for the external manifest tool
//!
//! A [`StagedManifest`] owns a fresh temporary directory holding one
//! `kustomization.yaml`. The directory is removed when the value is dropped,
//! whichever way the operation using it ends.

use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

use crate::manifest::{Manifest, ManifestError};

/// Prefix of every staging directory
pub const STAGING_PREFIX: &str = "fleetstage-";

/// A manifest written to its own temporary directory
#[derive(Debug)]
pub struct StagedManifest {
    dir: TempDir,
}

impl StagedManifest {
    /// Stage `manifest` under the system temp directory
    pub fn write(manifest: &Manifest) -> Result<Self, ManifestError> {
        Self::write_in(&std::env::temp_dir(), manifest)
    }

    /// Stage `manifest` under `parent`
    pub fn write_in(parent: &Path, manifest: &Manifest) -> Result<Self, ManifestError> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| ManifestError::Write {
                path: parent.to_path_buf(),
                source,
            })?;

        // On error `dir` drops here and takes the directory with it.
        manifest.write_to(dir.path())?;

        debug!(dir = %dir.path().display(), "Staged manifest");
        Ok(Self { dir })
    }

    /// Directory to hand to `kubectl -k`
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{compose, KUSTOMIZATION_FILE};
    use crate::workload::WorkloadDescriptor;

    fn manifest() -> Manifest {
        compose(&WorkloadDescriptor::new("https://example/repo", "app", "main")).unwrap()
    }

    #[test]
    fn test_stage_writes_kustomization() {
        let parent = tempfile::TempDir::new().unwrap();
        let staged = StagedManifest::write_in(parent.path(), &manifest()).unwrap();

        assert!(staged.dir().join(KUSTOMIZATION_FILE).is_file());
        let name = staged.dir().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(STAGING_PREFIX), "got: {name}");
    }

    #[test]
    fn test_stage_is_removed_on_drop() {
        let parent = tempfile::TempDir::new().unwrap();
        let staged = StagedManifest::write_in(parent.path(), &manifest()).unwrap();
        let dir = staged.dir().to_path_buf();

        drop(staged);

        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_each_stage_gets_its_own_directory() {
        let parent = tempfile::TempDir::new().unwrap();
        let a = StagedManifest::write_in(parent.path(), &manifest()).unwrap();
        let b = StagedManifest::write_in(parent.path(), &manifest()).unwrap();

        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn test_missing_parent_is_a_write_error() {
        let parent = tempfile::TempDir::new().unwrap();
        let missing = parent.path().join("does-not-exist");

        let err = StagedManifest::write_in(&missing, &manifest()).unwrap_err();
        assert!(matches!(err, ManifestError::Write { .. }));
    }
}
