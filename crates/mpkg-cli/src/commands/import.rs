//! Rebuild a project directory from an existing installer package
//!
//! Flat packages are expanded with `pkgutil --expand-full`; bundle packages
//! (directories) carry their payload as `Contents/Archive.pax.gz`, which is
//! unpacked with `ditto`. Metadata comes from `PackageInfo` or `Info.plist`.

use anyhow::{bail, Context, Result};
use mpkg_config::ToolPaths;
use mpkg_logger as logger;
use mpkg_manifest::{manifest_path, write_manifest, BuildManifest, ManifestFormat};
use mpkg_process::{Invocation, ToolRunner};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::build::bom;
use super::create::remove_existing_manifests;
use crate::errors::MpkgError;
use crate::project::{make_executable, relocate_dir, ProjectLayout, SCRIPT_NAMES};

const DEFAULT_VERSION: &str = "1.0";

static PKG_INFO_TAG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)<pkg-info\b([^>]*)>").ok());
static XML_ATTRIBUTE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok());

/// Attributes recovered from a package's metadata document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub identifier: Option<String>,
    pub version: Option<String>,
    pub install_kbytes: Option<u64>,
    pub install_location: Option<String>,
}

impl PackageMetadata {
    /// Derive a manifest; absent attributes fall back to version 1.0 and an empty identifier
    pub fn into_manifest(self, package_stem: &str) -> BuildManifest {
        let mut manifest = BuildManifest::new(
            format!("{}-${{version}}.pkg", package_stem),
            self.identifier.unwrap_or_default(),
            self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        );
        manifest.install_kbytes = self.install_kbytes;
        manifest.install_location = self.install_location.filter(|loc| !loc.is_empty());
        manifest
    }
}

#[derive(Debug, Default, Deserialize)]
struct BundleInfo {
    #[serde(rename = "CFBundleIdentifier", default)]
    identifier: Option<String>,
    #[serde(rename = "CFBundleShortVersionString", default)]
    version: Option<String>,
    #[serde(rename = "IFPkgFlagInstalledSize", default)]
    installed_size: Option<u64>,
    #[serde(rename = "IFPkgFlagDefaultLocation", default)]
    default_location: Option<String>,
}

fn xml_attributes(fragment: &str) -> Vec<(String, String)> {
    let Some(re) = XML_ATTRIBUTE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(fragment)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_string(), value.to_string())
        })
        .collect()
}

/// Read identifier, version, size and location from a `PackageInfo` document
pub fn parse_package_info(xml: &str) -> PackageMetadata {
    let Some(tag) = PKG_INFO_TAG.as_ref().and_then(|re| re.captures(xml)) else {
        return PackageMetadata::default();
    };

    let mut metadata = PackageMetadata::default();
    for (name, value) in xml_attributes(&tag[1]) {
        match name.as_str() {
            "identifier" => metadata.identifier = Some(value),
            "version" => metadata.version = Some(value),
            "install-location" => metadata.install_location = Some(value),
            "install-kbytes" | "installKBytes" => metadata.install_kbytes = value.parse().ok(),
            _ => {}
        }
    }

    // pkgbuild records the size on the <payload> element
    if metadata.install_kbytes.is_none() {
        metadata.install_kbytes = xml_attributes(xml)
            .into_iter()
            .find(|(name, _)| name == "installKBytes" || name == "install-kbytes")
            .and_then(|(_, value)| value.parse().ok());
    }
    metadata
}

fn read_bundle_info(path: &Path) -> Result<PackageMetadata> {
    let info: BundleInfo = plist::from_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(PackageMetadata {
        identifier: info.identifier,
        version: info.version,
        install_kbytes: info.installed_size,
        install_location: info.default_location,
    })
}

/// Directory of an expanded flat package holding Payload/Scripts/PackageInfo
///
/// A distribution package expands into one subdirectory per component; the
/// first component is used.
pub fn find_component_root(expanded: &Path) -> Option<PathBuf> {
    let is_component =
        |dir: &Path| dir.join("PackageInfo").is_file() || dir.join("Payload").exists();
    if is_component(expanded) {
        return Some(expanded.to_path_buf());
    }

    let mut components: Vec<PathBuf> = fs::read_dir(expanded)
        .ok()?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "pkg") && is_component(path))
        .collect();
    components.sort();
    components.into_iter().next()
}

/// Copy the known lifecycle scripts, forcing them executable
pub fn copy_lifecycle_scripts(from: &Path, to: &Path) -> Result<usize> {
    if !from.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;

    let mut copied = 0;
    for name in SCRIPT_NAMES {
        let source = from.join(name);
        if !source.is_file() {
            continue;
        }
        let target = to.join(name);
        fs::copy(&source, &target).with_context(|| format!("Failed to copy script {}", name))?;
        make_executable(&target)?;
        copied += 1;
    }
    Ok(copied)
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub manifest_path: PathBuf,
    pub manifest: BuildManifest,
    pub scripts_copied: usize,
    pub bom_exported: bool,
}

/// Expansion results the project is assembled from
struct Expanded {
    payload: Option<PathBuf>,
    scripts: PathBuf,
    metadata: PackageMetadata,
}

async fn expand_flat(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    package: &Path,
    work: &Path,
) -> Result<Expanded> {
    let expanded = work.join("expanded");
    let invocation = Invocation::new(&tools.pkgutil)
        .arg("--expand-full")
        .arg(package)
        .arg(&expanded);
    let result = super::build::invoke(runner, &invocation).await;
    if !result.success() {
        bail!(
            "pkgutil --expand-full exited with {}: {}",
            result.exit_code,
            result.error_text()
        );
    }

    let Some(root) = find_component_root(&expanded) else {
        logger::warn(
            "No component found in the expanded package; importing without payload or metadata",
        );
        return Ok(Expanded {
            payload: None,
            scripts: expanded.join("Scripts"),
            metadata: PackageMetadata::default(),
        });
    };

    let info_path = root.join("PackageInfo");
    let metadata = if info_path.is_file() {
        let xml = fs::read_to_string(&info_path)
            .with_context(|| format!("Failed to read {}", info_path.display()))?;
        parse_package_info(&xml)
    } else {
        debug!("No PackageInfo in {}, using defaults", root.display());
        PackageMetadata::default()
    };

    let payload = root.join("Payload");
    Ok(Expanded {
        payload: payload.is_dir().then_some(payload),
        scripts: root.join("Scripts"),
        metadata,
    })
}

async fn expand_bundle(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    package: &Path,
    work: &Path,
) -> Result<Expanded> {
    let contents = package.join("Contents");
    let archive = contents.join("Archive.pax.gz");

    let payload = if archive.is_file() {
        let destination = work.join("payload");
        let invocation = Invocation::new(&tools.ditto)
            .args(["-x", "-z"])
            .arg(&archive)
            .arg(&destination);
        let result = super::build::invoke(runner, &invocation).await;
        if !result.success() {
            bail!("ditto exited with {}: {}", result.exit_code, result.error_text());
        }
        destination.is_dir().then_some(destination)
    } else {
        None
    };

    let info_path = contents.join("Info.plist");
    let metadata = if info_path.is_file() {
        read_bundle_info(&info_path)?
    } else {
        PackageMetadata::default()
    };

    Ok(Expanded {
        payload,
        scripts: contents.join("Resources"),
        metadata,
    })
}

async fn import_into(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    package: &Path,
    layout: &ProjectLayout,
    format: ManifestFormat,
) -> Result<ImportReport> {
    layout.scaffold().context("Failed to create project directories")?;

    let work = layout.temp_dir().join("import");
    if work.exists() {
        fs::remove_dir_all(&work)?;
    }
    fs::create_dir_all(&work).with_context(|| format!("Failed to create {}", work.display()))?;

    let expanded = if package.is_dir() {
        expand_bundle(runner, tools, package, &work).await?
    } else {
        expand_flat(runner, tools, package, &work).await?
    };

    match &expanded.payload {
        Some(payload) => relocate_dir(payload, &layout.payload_dir()).with_context(|| {
            format!("Failed to move payload into {}", layout.payload_dir().display())
        })?,
        None => logger::warn("Package has no payload; payload/ left empty"),
    }

    let scripts_copied = copy_lifecycle_scripts(&expanded.scripts, &layout.scripts_dir())?;

    let stem = package
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| layout.name());
    let manifest = expanded.metadata.into_manifest(&stem);
    let manifest_path = manifest_path(layout.root(), format);
    remove_existing_manifests(layout.root())?;
    write_manifest(&manifest, &manifest_path)?;

    let bom_exported = match bom::export_bom(runner, tools, package, &layout.bom_path()).await {
        Ok(()) => true,
        Err(e) => {
            logger::warn(&format!("BOM export failed: {}", e));
            false
        }
    };

    Ok(ImportReport {
        manifest_path,
        manifest,
        scripts_copied,
        bom_exported,
    })
}

/// Create `project_dir` from `package`
pub async fn import_package(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    package: &Path,
    project_dir: &Path,
    format: ManifestFormat,
    force: bool,
) -> Result<ImportReport, MpkgError> {
    if !package.exists() {
        return Err(MpkgError::ImportFailed(format!(
            "Package not found: {}",
            package.display()
        )));
    }
    if project_dir.exists() && !force {
        return Err(MpkgError::ProjectExists(project_dir.to_path_buf()));
    }

    let existed = project_dir.exists();
    let layout = ProjectLayout::new(project_dir);
    let result = import_into(runner, tools, package, &layout, format).await;

    let leftover = if result.is_err() && !existed {
        layout.root().to_path_buf()
    } else {
        layout.temp_dir()
    };
    if leftover.exists() {
        if let Err(e) = fs::remove_dir_all(&leftover) {
            debug!("Could not remove {}: {}", leftover.display(), e);
        }
    }

    result.map_err(|e| MpkgError::ImportFailed(format!("{:#}", e)))
}

pub async fn handle_import(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    package: &Path,
    project_dir: &Path,
    format: ManifestFormat,
    force: bool,
) -> Result<(), MpkgError> {
    logger::spinner_start(&format!("Importing {}", package.display()));
    let result = import_package(runner, tools, package, project_dir, format, force).await;
    logger::spinner_stop();
    let report = result?;

    logger::success(&format!("Imported {} into {}", package.display(), project_dir.display()));
    logger::display(&format!(
        "Wrote {} ({} script(s))",
        report.manifest_path.display(),
        report.scripts_copied
    ));
    if report.manifest.identifier.is_empty() {
        logger::warn("No identifier found in the package; set one in the manifest before building");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create::create_project;
    use async_trait::async_trait;
    use mpkg_manifest::read_manifest;
    use mpkg_process::mock::{MockResponse, MockRunner};
    use mpkg_process::ProcessResult;
    use tempfile::TempDir;

    const PACKAGE_INFO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<pkg-info overwrite-permissions="true" relocatable="false" identifier="com.example.tool" postinstall-action="none" version="2.4.1" format-version="2" generator-version="InstallCmds-807" install-location="/usr/local" auth="root">
    <payload numberOfFiles="12" installKBytes="3408"/>
    <bundle-version/>
    <scripts>
        <postinstall file="./postinstall"/>
    </scripts>
</pkg-info>
"#;

    #[test]
    fn test_parse_package_info() {
        assert_eq!(
            parse_package_info(PACKAGE_INFO),
            PackageMetadata {
                identifier: Some("com.example.tool".to_string()),
                version: Some("2.4.1".to_string()),
                install_kbytes: Some(3408),
                install_location: Some("/usr/local".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_package_info_install_kbytes_attribute() {
        let metadata = parse_package_info("<pkg-info identifier='com.x' install-kbytes='42'/>");
        assert_eq!(metadata.identifier.as_deref(), Some("com.x"));
        assert_eq!(metadata.install_kbytes, Some(42));
        assert_eq!(metadata.version, None);
    }

    #[test]
    fn test_missing_metadata_gives_defaults() {
        let manifest = parse_package_info("<not-a-package/>").into_manifest("Tool");
        assert_eq!(manifest.name, "Tool-${version}.pkg");
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.identifier, "");
    }

    #[test]
    fn test_find_component_root_in_distribution() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let component = tmp.path().join("tool.pkg");
        if fs::create_dir_all(component.join("Payload")).is_err()
            || fs::write(tmp.path().join("Distribution"), "<installer-gui-script/>").is_err()
        {
            return;
        }
        assert_eq!(find_component_root(tmp.path()), Some(component));
    }

    #[test]
    fn test_copy_lifecycle_scripts_only_known_names() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let from = tmp.path().join("Scripts");
        let to = tmp.path().join("scripts");
        if fs::create_dir_all(&from).is_err()
            || fs::write(from.join("postinstall"), "#!/bin/sh\n").is_err()
            || fs::write(from.join("helper.py"), "print()\n").is_err()
        {
            return;
        }
        assert!(copy_lifecycle_scripts(&from, &to).is_ok_and(|n| n == 1));
        assert!(to.join("postinstall").is_file());
        assert!(!to.join("helper.py").exists());
    }

    #[tokio::test]
    async fn test_missing_package_is_import_failure() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let runner = MockRunner::new();
        let result = import_package(
            &runner,
            &ToolPaths::default(),
            &tmp.path().join("missing.pkg"),
            &tmp.path().join("project"),
            ManifestFormat::Plist,
            false,
        )
        .await;
        assert!(matches!(result, Err(MpkgError::ImportFailed(_))));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_project_without_force() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let package = tmp.path().join("tool.pkg");
        let project = tmp.path().join("project");
        if fs::write(&package, b"xar!").is_err() || fs::create_dir_all(&project).is_err() {
            return;
        }
        let result = import_package(
            &MockRunner::new(),
            &ToolPaths::default(),
            &package,
            &project,
            ManifestFormat::Plist,
            false,
        )
        .await;
        assert!(matches!(result, Err(MpkgError::ProjectExists(_))));
    }

    #[tokio::test]
    async fn test_expansion_failure_is_import_failure() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let package = tmp.path().join("tool.pkg");
        if fs::write(&package, b"xar!").is_err() {
            return;
        }
        let runner = MockRunner::new().respond(
            "pkgutil --expand-full",
            MockResponse::failure(1, "Could not open package"),
        );
        let result = import_package(
            &runner,
            &ToolPaths::default(),
            &package,
            &tmp.path().join("project"),
            ManifestFormat::Json,
            false,
        )
        .await;
        assert!(matches!(
            result,
            Err(MpkgError::ImportFailed(ref msg)) if msg.contains("Could not open package")
        ));
        assert!(!tmp.path().join("project").exists());
    }

    #[tokio::test]
    async fn test_failed_forced_import_keeps_existing_manifest() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let package = tmp.path().join("tool.pkg");
        let project = tmp.path().join("project");
        if fs::write(&package, b"xar!").is_err()
            || create_project(&project, ManifestFormat::Json, false).is_err()
        {
            return;
        }
        let runner = MockRunner::new().respond(
            "pkgutil --expand-full",
            MockResponse::failure(1, "Could not open package"),
        );

        let result = import_package(
            &runner,
            &ToolPaths::default(),
            &package,
            &project,
            ManifestFormat::Plist,
            true,
        )
        .await;
        assert!(matches!(result, Err(MpkgError::ImportFailed(_))));
        assert!(project.join("build-info.json").is_file());
        assert!(!project.join("build-info.plist").exists());
        assert!(!project.join("build").join(".mpkg-tmp").exists());
    }

    /// Lays out what `pkgutil --expand-full` produces for a component package
    struct ExpandingRunner {
        package_info: Option<&'static str>,
    }

    #[async_trait]
    impl ToolRunner for ExpandingRunner {
        async fn run(&self, invocation: &Invocation) -> ProcessResult {
            let failed = ProcessResult {
                exit_code: 1,
                stderr: "unsupported".to_string(),
                ..Default::default()
            };
            if invocation.args.first().map(String::as_str) != Some("--expand-full") {
                return failed;
            }
            let Some(expanded) = invocation.args.get(2).map(PathBuf::from) else {
                return failed;
            };

            let bin = expanded.join("Payload").join("usr").join("local").join("bin");
            let scripts = expanded.join("Scripts");
            let laid_out = fs::create_dir_all(&bin).is_ok()
                && fs::write(bin.join("tool"), "#!/bin/sh\necho tool\n").is_ok()
                && fs::create_dir_all(&scripts).is_ok()
                && fs::write(scripts.join("postinstall"), "#!/bin/sh\nexit 0\n").is_ok()
                && fs::write(scripts.join("helper.sh"), "true\n").is_ok();
            let info_written = match self.package_info {
                Some(xml) => fs::write(expanded.join("PackageInfo"), xml).is_ok(),
                None => true,
            };
            if laid_out && info_written {
                ProcessResult::default()
            } else {
                failed
            }
        }
    }

    #[tokio::test]
    async fn test_import_flat_package() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let package = tmp.path().join("tool.pkg");
        let project = tmp.path().join("tool");
        if fs::write(&package, b"xar!").is_err() {
            return;
        }
        let runner = ExpandingRunner {
            package_info: Some(PACKAGE_INFO),
        };

        let result = import_package(
            &runner,
            &ToolPaths::default(),
            &package,
            &project,
            ManifestFormat::Json,
            false,
        )
        .await;
        assert!(result.as_ref().is_ok_and(|r| r.scripts_copied == 1 && !r.bom_exported));

        let tool = project.join("payload").join("usr").join("local").join("bin").join("tool");
        assert_eq!(fs::read_to_string(tool).unwrap_or_default(), "#!/bin/sh\necho tool\n");
        assert!(!project.join("scripts").join("helper.sh").exists());
        assert!(!project.join("build").join(".mpkg-tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(project.join("scripts").join("postinstall"))
                .map(|m| m.permissions().mode() & 0o777)
                .unwrap_or_default();
            assert_eq!(mode, 0o755);
        }

        let manifest = read_manifest(&project.join("build-info.json"));
        assert!(manifest.is_ok_and(|m| m.identifier == "com.example.tool"
            && m.version == "2.4.1"
            && m.install_kbytes == Some(3408)
            && m.install_location.as_deref() == Some("/usr/local")
            && m.name == "tool-${version}.pkg"));
    }

    #[tokio::test]
    async fn test_import_flat_package_without_package_info() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let package = tmp.path().join("bare.pkg");
        let project = tmp.path().join("bare");
        if fs::write(&package, b"xar!").is_err() {
            return;
        }
        let runner = ExpandingRunner { package_info: None };

        let result = import_package(
            &runner,
            &ToolPaths::default(),
            &package,
            &project,
            ManifestFormat::Plist,
            false,
        )
        .await;
        assert!(result.is_ok_and(|r| r.manifest.version == "1.0"
            && r.manifest.identifier.is_empty()
            && r.manifest.name == "bare-${version}.pkg"));
        assert!(project.join("payload").join("usr").join("local").join("bin").is_dir());
        assert!(project.join("build-info.plist").is_file());
    }

    #[tokio::test]
    async fn test_import_bundle_package() {
        let Ok(tmp) = TempDir::new() else {
            return;
        };
        let package = tmp.path().join("Legacy.pkg");
        let contents = package.join("Contents");
        let resources = contents.join("Resources");
        if fs::create_dir_all(&resources).is_err()
            || fs::write(resources.join("preinstall"), "#!/bin/sh\nexit 0\n").is_err()
        {
            return;
        }
        let mut info = plist::Dictionary::new();
        info.insert("CFBundleIdentifier".to_string(), "com.example.legacy".into());
        info.insert("CFBundleShortVersionString".to_string(), "5.0".into());
        info.insert("IFPkgFlagInstalledSize".to_string(), plist::Value::from(64_u64));
        if plist::Value::Dictionary(info)
            .to_file_xml(contents.join("Info.plist"))
            .is_err()
        {
            return;
        }

        let project = tmp.path().join("legacy");
        let runner = MockRunner::new();
        let result = import_package(
            &runner,
            &ToolPaths::default(),
            &package,
            &project,
            ManifestFormat::Yaml,
            false,
        )
        .await;
        assert!(result.as_ref().is_ok_and(|r| r.scripts_copied == 1 && !r.bom_exported));
        assert!(!runner.invoked("ditto"));
        assert!(project.join("scripts").join("preinstall").is_file());
        assert!(project.join(".gitignore").is_file());

        let manifest = read_manifest(&project.join("build-info.yaml"));
        assert!(manifest.is_ok_and(|m| m.identifier == "com.example.legacy"
            && m.version == "5.0"
            && m.install_kbytes == Some(64)
            && m.name == "Legacy-${version}.pkg"));
    }
}
