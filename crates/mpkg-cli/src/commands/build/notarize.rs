use mpkg_logger as logger;
use mpkg_manifest::{BuildManifest, NotarizationInfo};
use mpkg_process::Invocation;
use std::path::Path;
use std::time::{Duration, Instant};

use super::{BuildPipeline, RunState};

/// Text notarytool prints once Apple accepted a submission
pub const ACCEPTED_MARKER: &str = "status: Accepted";

/// Pause between stapling attempts while the ticket propagates
pub const STAPLE_RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// How notarytool authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NotaryAuth<'a> {
    KeychainProfile(&'a str),
    AppleId {
        apple_id: &'a str,
        team_id: &'a str,
        password: &'a str,
        asc_provider: Option<&'a str>,
    },
}

impl<'a> NotaryAuth<'a> {
    /// A keychain profile wins; otherwise all three Apple ID fields are needed
    pub(crate) fn from_info(info: &'a NotarizationInfo) -> Option<Self> {
        let present = |v: &'a Option<String>| v.as_deref().filter(|s| !s.trim().is_empty());

        if let Some(profile) = present(&info.keychain_profile) {
            return Some(NotaryAuth::KeychainProfile(profile));
        }
        Some(NotaryAuth::AppleId {
            apple_id: present(&info.apple_id)?,
            team_id: present(&info.team_id)?,
            password: present(&info.password)?,
            asc_provider: present(&info.asc_provider),
        })
    }
}

pub(crate) fn submit_invocation(xcrun: &Path, package: &Path, auth: &NotaryAuth<'_>) -> Invocation {
    let invocation = Invocation::new(xcrun).args(["notarytool", "submit"]).arg(package);
    let invocation = match *auth {
        NotaryAuth::KeychainProfile(profile) => invocation.args(["--keychain-profile", profile]),
        NotaryAuth::AppleId {
            apple_id,
            team_id,
            password,
            asc_provider,
        } => {
            let invocation = invocation.args([
                "--apple-id",
                apple_id,
                "--team-id",
                team_id,
                "--password",
                password,
            ]);
            match asc_provider {
                Some(provider) => invocation.args(["--asc-provider", provider]),
                None => invocation,
            }
        }
    };
    invocation.arg("--wait")
}

/// Submit the package and wait for Apple's verdict
///
/// Returns false when the stage was skipped for lack of credentials. Every
/// outcome short of acceptance is a warning, never an error: the package on
/// disk is complete either way.
pub(super) async fn notarize(
    pipeline: &BuildPipeline<'_>,
    manifest: &BuildManifest,
    state: &mut RunState,
) -> bool {
    let Some(info) = &manifest.notarization_info else {
        return false;
    };
    let Some(auth) = NotaryAuth::from_info(info) else {
        state.warn(
            "Skipping notarization: incomplete credentials \
             (set keychain_profile, or apple_id, team_id and password)"
                .to_string(),
        );
        return false;
    };

    let invocation = submit_invocation(&pipeline.tools.xcrun, &state.package_path, &auth);
    logger::spinner_start("Submitting package for notarization");
    let result = pipeline.invoke(&invocation).await;
    logger::spinner_stop();

    if !result.success() {
        state.warn(format!(
            "Notarization failed (exit code {}): {}",
            result.exit_code,
            result.error_text()
        ));
    } else if result.stdout.contains(ACCEPTED_MARKER) {
        state.notarized = true;
        logger::success("Notarization accepted");
    } else {
        state.warn(
            "Notarization was not accepted; the package is built but not notarized".to_string(),
        );
    }
    true
}

/// Staple the ticket, retrying until the manifest's staple timeout passes
pub(super) async fn staple(
    pipeline: &BuildPipeline<'_>,
    manifest: &BuildManifest,
    state: &mut RunState,
) {
    let timeout = Duration::from_secs(
        manifest
            .notarization_info
            .as_ref()
            .map_or(0, NotarizationInfo::staple_timeout),
    );
    let invocation = Invocation::new(&pipeline.tools.xcrun)
        .args(["stapler", "staple"])
        .arg(&state.package_path);

    let started = Instant::now();
    let mut attempt = 1;
    loop {
        let result = pipeline.invoke(&invocation).await;
        if result.success() {
            state.stapled = true;
            logger::success("Notarization ticket stapled");
            return;
        }

        if started.elapsed() + pipeline.staple_retry_interval >= timeout {
            state.warn(format!(
                "Stapling failed after {} attempt(s): {}",
                attempt,
                result.error_text()
            ));
            return;
        }
        logger::debug(&format!("Stapling attempt {} failed, retrying", attempt));
        tokio::time::sleep(pipeline.staple_retry_interval).await;
        attempt += 1;
    }
}
