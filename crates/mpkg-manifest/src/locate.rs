//! Manifest discovery inside a project directory

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::ManifestError;
use crate::format::{ManifestFormat, DISCOVERY_ORDER};

/// File stem every build-info manifest shares
pub const MANIFEST_STEM: &str = "build-info";

/// Path a manifest of the given format would have inside `project_dir`
pub fn manifest_path(project_dir: &Path, format: ManifestFormat) -> PathBuf {
    project_dir.join(format!("{}.{}", MANIFEST_STEM, format.extension()))
}

/// Find the single build-info file of a project
///
/// With a format hint only that format's extensions are considered. Without
/// one, every known extension is checked and more than one hit is an error:
/// the caller must not guess which file the author meant.
pub fn locate_manifest(
    project_dir: &Path,
    hint: Option<ManifestFormat>,
) -> Result<PathBuf, ManifestError> {
    if let Some(format) = hint {
        return format
            .accepted_extensions()
            .iter()
            .map(|ext| project_dir.join(format!("{}.{}", MANIFEST_STEM, ext)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ManifestError::NoManifestFound(project_dir.to_path_buf()));
    }

    let mut found: Vec<PathBuf> = DISCOVERY_ORDER
        .iter()
        .map(|(ext, _)| project_dir.join(format!("{}.{}", MANIFEST_STEM, ext)))
        .filter(|candidate| candidate.is_file())
        .collect();

    debug!("Found {} build-info candidate(s) in {:?}", found.len(), project_dir);

    if found.len() > 1 {
        return Err(ManifestError::AmbiguousManifest {
            dir: project_dir.to_path_buf(),
            found,
        });
    }
    found
        .pop()
        .ok_or_else(|| ManifestError::NoManifestFound(project_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_single_manifest_found() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("build-info.yml"), "name: x\n").is_err() {
            return;
        }
        let result = locate_manifest(dir.path(), None);
        assert!(result.is_ok_and(|p| p.ends_with("build-info.yml")));
    }

    #[test]
    fn test_no_manifest() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let result = locate_manifest(dir.path(), None);
        assert!(matches!(result, Err(ManifestError::NoManifestFound(_))));
    }

    #[test]
    fn test_ambiguous_manifest_and_hint() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("build-info.json"), "{}").is_err()
            || fs::write(dir.path().join("build-info.plist"), "").is_err()
        {
            return;
        }

        let result = locate_manifest(dir.path(), None);
        assert!(matches!(
            &result,
            Err(ManifestError::AmbiguousManifest { found, .. }) if found.len() == 2
        ));

        let hinted = locate_manifest(dir.path(), Some(ManifestFormat::Json));
        assert!(hinted.is_ok_and(|p| p.ends_with("build-info.json")));
    }

    #[test]
    fn test_hint_for_absent_format() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("build-info.json"), "{}").is_err() {
            return;
        }
        let result = locate_manifest(dir.path(), Some(ManifestFormat::Yaml));
        assert!(matches!(result, Err(ManifestError::NoManifestFound(_))));
    }

    #[test]
    fn test_yaml_and_yml_are_ambiguous() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("build-info.yaml"), "").is_err()
            || fs::write(dir.path().join("build-info.yml"), "").is_err()
        {
            return;
        }
        let result = locate_manifest(dir.path(), None);
        assert!(matches!(result, Err(ManifestError::AmbiguousManifest { .. })));
    }
}
