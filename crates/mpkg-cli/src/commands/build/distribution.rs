use mpkg_logger as logger;
use mpkg_manifest::{BuildManifest, SigningInfo};
use mpkg_process::Invocation;
use std::fs;
use std::path::{Path, PathBuf};

use super::{BuildError, BuildPipeline, RunState};

/// Wrap the component package and move the result over it
///
/// productbuild writes into the temp dir; a single rename then replaces the
/// component package, so the build directory never lacks both files.
pub(super) async fn build_distribution(
    pipeline: &BuildPipeline<'_>,
    manifest: &BuildManifest,
    state: &mut RunState,
) -> Result<(), BuildError> {
    let temp_dir = pipeline.project.temp_dir();
    fs::create_dir_all(&temp_dir)?;
    let output = distribution_output(&temp_dir, &state.package_path);

    let invocation = productbuild_invocation(
        &pipeline.tools.productbuild,
        manifest.signing_info.as_ref(),
        &state.package_path,
        &output,
    );

    match &manifest.signing_info {
        Some(signing) => logger::display(&format!(
            "Building signed distribution package ({})",
            signing.identity
        )),
        None => logger::display("Building distribution package"),
    }
    let result = pipeline.invoke(&invocation).await;
    BuildPipeline::check(&invocation, &result)?;

    if !output.exists() {
        return Err(BuildError::MissingArtifact {
            tool: invocation.program_name(),
            path: output,
        });
    }
    fs::rename(&output, &state.package_path)?;
    Ok(())
}

fn distribution_output(temp_dir: &Path, component: &Path) -> PathBuf {
    let stem = component
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    temp_dir.join(format!("{}-dist.pkg", stem))
}

pub(crate) fn productbuild_invocation(
    productbuild: &Path,
    signing: Option<&SigningInfo>,
    component: &Path,
    output: &Path,
) -> Invocation {
    let mut invocation = Invocation::new(productbuild);
    if let Some(signing) = signing {
        invocation = invocation.args(["--sign", signing.identity.as_str()]);
        if let Some(keychain) = &signing.keychain {
            invocation = invocation.args(["--keychain", keychain.as_str()]);
        }
        for cert in signing.additional_cert_names.iter().flatten() {
            invocation = invocation.args(["--certs", cert.as_str()]);
        }
        if signing.timestamp() {
            invocation = invocation.arg("--timestamp");
        }
    }
    invocation.arg("--package").arg(component).arg(output)
}
