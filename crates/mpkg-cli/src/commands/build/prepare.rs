use mpkg_logger as logger;
use mpkg_manifest::BuildManifest;
use mpkg_process::Invocation;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{BuildError, BuildPipeline, PreparedInputs};
use crate::env_overlay::EnvironmentOverlay;
use crate::project::make_executable;

const PACKAGE_INFO_FILE: &str = "PackageInfo";
const COMPONENT_PLIST_FILE: &str = "component.plist";

/// Create the scratch area and everything pkgbuild reads besides the payload
pub(super) async fn prepare(
    pipeline: &BuildPipeline<'_>,
    manifest: &BuildManifest,
) -> Result<PreparedInputs, BuildError> {
    let project = &pipeline.project;
    let temp_dir = project.temp_dir();
    if temp_dir.exists() {
        fs::remove_dir_all(&temp_dir)?;
    }
    fs::create_dir_all(&temp_dir)?;

    let mut prepared = PreparedInputs::default();

    let scripts_src = project.scripts_dir();
    if has_entries(&scripts_src) {
        let overlay =
            EnvironmentOverlay::load(project.root(), pipeline.options.env_file_path.as_deref())?;
        let scripts_dst = temp_dir.join("scripts");
        let copied = copy_scripts(&scripts_src, &scripts_dst, &overlay)?;
        debug!("Staged {} script file(s) with {} overlay variable(s)", copied, overlay.len());
        prepared.scripts_dir = Some(scripts_dst);
    }

    if let Some(contents) = package_info_xml(manifest) {
        let path = temp_dir.join(PACKAGE_INFO_FILE);
        fs::write(&path, contents)?;
        prepared.package_info = Some(path);
    }

    if manifest.suppress_bundle_relocation == Some(true) && project.payload_dir().is_dir() {
        let path = temp_dir.join(COMPONENT_PLIST_FILE);
        let invocation = Invocation::new(&pipeline.tools.pkgbuild)
            .arg("--analyze")
            .arg("--root")
            .arg(project.payload_dir())
            .arg(&path);
        let result = pipeline.invoke(&invocation).await;
        BuildPipeline::check(&invocation, &result)?;
        let bundles = force_non_relocatable(&path)?;
        logger::debug(&format!("Disabled relocation for {} bundle(s)", bundles));
        prepared.component_plist = Some(path);
    }

    Ok(prepared)
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

/// Copy scripts, substituting overlay placeholders in text files
///
/// Every copied file is made executable. Nested directories are copied as
/// is so helper resources next to the scripts keep working.
pub(crate) fn copy_scripts(
    from: &Path,
    to: &Path,
    overlay: &EnvironmentOverlay,
) -> Result<usize, BuildError> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if source.is_dir() {
            crate::project::copy_tree(&source, &target)?;
            continue;
        }

        match fs::read_to_string(&source) {
            Ok(text) => fs::write(&target, overlay.substitute(&text))?,
            Err(_) => {
                fs::copy(&source, &target)?;
            }
        }
        make_executable(&target)?;
        copied += 1;
    }
    Ok(copied)
}

/// PackageInfo overrides, `None` when pkgbuild defaults are fine
pub(crate) fn package_info_xml(manifest: &BuildManifest) -> Option<String> {
    let action = manifest.postinstall_action.pkginfo_value();
    let preserve_xattr = manifest.preserve_xattr == Some(true);
    if action.is_none() && !preserve_xattr {
        return None;
    }

    let mut attributes = String::new();
    if let Some(action) = action {
        attributes.push_str(&format!(" postinstall-action=\"{}\"", action));
    }
    if preserve_xattr {
        attributes.push_str(" preserve-xattr=\"true\"");
    }
    Some(format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<pkg-info{}/>\n",
        attributes
    ))
}

/// Set `BundleIsRelocatable` to false for every bundle in a component plist
pub(crate) fn force_non_relocatable(path: &Path) -> Result<usize, BuildError> {
    let invalid = |message: String| BuildError::ComponentPlist {
        path: PathBuf::from(path),
        message,
    };

    let mut value = plist::Value::from_file(path).map_err(|e| invalid(e.to_string()))?;
    let bundles = value
        .as_array_mut()
        .ok_or_else(|| invalid("expected an array of bundles".to_string()))?;

    let mut changed = 0;
    for bundle in bundles.iter_mut() {
        if let Some(dict) = bundle.as_dictionary_mut() {
            dict.insert("BundleIsRelocatable".to_string(), plist::Value::Boolean(false));
            changed += 1;
        }
    }

    value.to_file_xml(path).map_err(|e| invalid(e.to_string()))?;
    Ok(changed)
}
