use mpkg_logger as logger;
use mpkg_manifest::BuildManifest;
use mpkg_process::Invocation;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::{BuildError, BuildPipeline, PreparedInputs, RunState};

pub(super) async fn build_component(
    pipeline: &BuildPipeline<'_>,
    manifest: &BuildManifest,
    state: &mut RunState,
) -> Result<(), BuildError> {
    fs::create_dir_all(pipeline.project.build_dir())?;
    if state.package_path.exists() {
        debug!("Removing previous {}", state.package_path.display());
        fs::remove_file(&state.package_path)?;
    }
    let payload = pipeline.project.payload_dir();
    let payload = payload.is_dir().then_some(payload.as_path());
    if payload.is_none() {
        logger::debug("No payload directory, building a payload-free package");
    }

    let invocation = pkgbuild_invocation(
        &pipeline.tools.pkgbuild,
        manifest,
        payload,
        &state.prepared,
        &state.package_path,
    );

    logger::display(&format!("Building component package {}", manifest.package_filename()));
    let result = pipeline.invoke(&invocation).await;
    BuildPipeline::check(&invocation, &result)?;

    if !state.package_path.exists() {
        return Err(BuildError::MissingArtifact {
            tool: invocation.program_name(),
            path: state.package_path.clone(),
        });
    }
    Ok(())
}

pub(crate) fn pkgbuild_invocation(
    pkgbuild: &Path,
    manifest: &BuildManifest,
    payload: Option<&Path>,
    prepared: &PreparedInputs,
    output: &Path,
) -> Invocation {
    let mut invocation = Invocation::new(pkgbuild);
    invocation = match payload {
        Some(root) => invocation.arg("--root").arg(root),
        None => invocation.arg("--nopayload"),
    };
    invocation = invocation
        .args(["--identifier", manifest.identifier.as_str()])
        .args(["--version", manifest.version.as_str()])
        .args(["--install-location", manifest.install_location()])
        .args(["--ownership", manifest.ownership.as_str()]);

    if let Some(scripts) = &prepared.scripts_dir {
        invocation = invocation.arg("--scripts").arg(scripts);
    }
    if let Some(plist) = &prepared.component_plist {
        invocation = invocation.arg("--component-plist").arg(plist);
    }
    if let Some(info) = &prepared.package_info {
        invocation = invocation.arg("--info").arg(info);
    }
    if let Some(compression) = manifest.compression {
        invocation = invocation.args(["--compression", compression.as_str()]);
    }
    if let Some(min_os) = &manifest.min_os_version {
        invocation = invocation.args(["--min-os-version", min_os.as_str()]);
    }
    if manifest.large_payload == Some(true) {
        invocation = invocation.arg("--large-payload");
    }

    invocation.arg(output)
}
