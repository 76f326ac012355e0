use mpkg_logger as logger;
use mpkg_manifest::{manifest_path, write_manifest, BuildManifest, ManifestFormat, MANIFEST_STEM};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::MpkgError;
use crate::project::ProjectLayout;

/// Manifest a fresh project starts with
pub fn default_manifest(project_name: &str) -> BuildManifest {
    let slug: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect();
    BuildManifest::new(
        format!("{}-${{version}}.pkg", project_name),
        format!("com.example.pkg.{}", slug),
        "1.0",
    )
}

/// Remove every `build-info.*` so a forced rewrite cannot leave two manifests behind
pub(crate) fn remove_existing_manifests(dir: &Path) -> std::io::Result<()> {
    for format in ManifestFormat::ALL {
        for ext in format.accepted_extensions() {
            let path = dir.join(format!("{}.{}", MANIFEST_STEM, ext));
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }
    }
    Ok(())
}

/// Scaffold a new project directory and return the manifest path
pub fn create_project(
    dir: &Path,
    format: ManifestFormat,
    force: bool,
) -> Result<PathBuf, MpkgError> {
    if dir.exists() {
        if !force {
            return Err(MpkgError::ProjectExists(dir.to_path_buf()));
        }
        remove_existing_manifests(dir)?;
    }

    let layout = ProjectLayout::new(dir);
    layout.scaffold()?;

    let path = manifest_path(dir, format);
    write_manifest(&default_manifest(&layout.name()), &path)?;
    Ok(path)
}

pub fn handle_create(dir: &Path, format: ManifestFormat, force: bool) -> Result<(), MpkgError> {
    let path = create_project(dir, format, force)?;
    logger::success(&format!("Created project {}", dir.display()));
    logger::display(&format!("Edit {} and add files to payload/", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpkg_manifest::read_manifest;
    use tempfile::TempDir;

    #[test]
    fn test_create_project_layout() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let dir = tmp.path().join("Firefox");
        let result = create_project(&dir, ManifestFormat::Plist, false);
        assert!(result.is_ok_and(|p| p == dir.join("build-info.plist")));
        assert!(dir.join("payload").is_dir());
        assert!(dir.join("scripts").is_dir());
        assert!(dir.join(".gitignore").is_file());

        let manifest = read_manifest(&dir.join("build-info.plist"));
        assert!(manifest.is_ok_and(|m| m.name == "Firefox-${version}.pkg"
            && m.identifier == "com.example.pkg.Firefox"
            && m.version == "1.0"));
    }

    #[test]
    fn test_existing_directory_needs_force() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let dir = tmp.path().join("demo");
        assert!(create_project(&dir, ManifestFormat::Json, false).is_ok());
        assert!(matches!(
            create_project(&dir, ManifestFormat::Yaml, false),
            Err(MpkgError::ProjectExists(_))
        ));

        assert!(create_project(&dir, ManifestFormat::Yaml, true).is_ok());
        assert!(!dir.join("build-info.json").exists());
        assert!(dir.join("build-info.yaml").exists());
    }

    #[test]
    fn test_identifier_slug() {
        let manifest = default_manifest("My Tool");
        assert_eq!(manifest.identifier, "com.example.pkg.My-Tool");
        assert_eq!(manifest.name, "My Tool-${version}.pkg");
    }
}
