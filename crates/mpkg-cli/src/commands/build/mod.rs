//! Build pipeline: manifest in, installer package out
//!
//! The pipeline is an ordered list of [`Stage`]s. Each stage has a guard
//! evaluated against the manifest, the [`BuildOptions`] and what earlier
//! stages produced; stages whose guard is false are skipped. Component and
//! distribution failures abort the run; notarization, stapling and BOM export
//! failures only add warnings to the [`BuildReport`].

use mpkg_config::ToolPaths;
use mpkg_logger as logger;
use mpkg_manifest::{
    locate_manifest, read_manifest, resolve_substitutions, BuildManifest, ManifestError,
};
use mpkg_process::{Invocation, ProcessResult, ToolRunner};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::project::ProjectLayout;

pub mod bom;
mod component;
mod distribution;
mod notarize;
mod prepare;

pub use notarize::{ACCEPTED_MARKER, STAPLE_RETRY_INTERVAL};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("{tool} failed with exit code {exit_code}:\n{stderr}")]
    BuildFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{tool} reported success but {} was not created", .path.display())]
    MissingArtifact { tool: String, path: PathBuf },

    #[error("Invalid component plist {}: {message}", .path.display())]
    ComponentPlist { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Flags that change which optional stages run
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub export_bom_info: bool,
    pub skip_notarization: bool,
    pub skip_stapling: bool,
    pub env_file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadManifest,
    ResolveSubstitutions,
    Prepare,
    BuildComponent,
    BuildDistribution,
    Notarize,
    Staple,
    ExportBom,
}

impl Stage {
    /// Stages that run after the manifest is loaded and resolved, in order
    pub const PACKAGING: [Stage; 6] = [
        Stage::Prepare,
        Stage::BuildComponent,
        Stage::BuildDistribution,
        Stage::Notarize,
        Stage::Staple,
        Stage::ExportBom,
    ];

    fn should_run(
        self,
        manifest: &BuildManifest,
        options: &BuildOptions,
        state: &RunState,
    ) -> bool {
        match self {
            Stage::BuildDistribution => manifest.wants_distribution(),
            Stage::Notarize => manifest.notarization_info.is_some() && !options.skip_notarization,
            Stage::Staple => state.notarized && !options.skip_stapling,
            Stage::ExportBom => options.export_bom_info,
            Stage::LoadManifest
            | Stage::ResolveSubstitutions
            | Stage::Prepare
            | Stage::BuildComponent => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::LoadManifest => "load manifest",
            Stage::ResolveSubstitutions => "resolve substitutions",
            Stage::Prepare => "prepare",
            Stage::BuildComponent => "build component package",
            Stage::BuildDistribution => "build distribution package",
            Stage::Notarize => "notarize",
            Stage::Staple => "staple",
            Stage::ExportBom => "export BOM",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stages a run would attempt, assuming notarization is accepted
pub fn planned_stages(manifest: &BuildManifest, options: &BuildOptions) -> Vec<Stage> {
    let assume_accepted = RunState {
        notarized: manifest.notarization_info.is_some() && !options.skip_notarization,
        ..RunState::default()
    };
    let mut stages = vec![Stage::LoadManifest, Stage::ResolveSubstitutions];
    stages.extend(
        Stage::PACKAGING
            .into_iter()
            .filter(|stage| stage.should_run(manifest, options, &assume_accepted)),
    );
    stages
}

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub package_path: PathBuf,
    pub stages_run: Vec<Stage>,
    pub notarized: bool,
    pub stapled: bool,
    pub bom_exported: bool,
    pub warnings: Vec<String>,
}

/// Inputs produced by the prepare stage for pkgbuild
#[derive(Debug, Clone, Default)]
pub(crate) struct PreparedInputs {
    pub scripts_dir: Option<PathBuf>,
    pub package_info: Option<PathBuf>,
    pub component_plist: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub package_path: PathBuf,
    pub prepared: PreparedInputs,
    pub notarized: bool,
    pub stapled: bool,
    pub bom_exported: bool,
    pub stages_run: Vec<Stage>,
    pub warnings: Vec<String>,
}

impl RunState {
    fn warn(&mut self, message: String) {
        logger::warn(&message);
        self.warnings.push(message);
    }

    fn into_report(self) -> BuildReport {
        BuildReport {
            package_path: self.package_path,
            stages_run: self.stages_run,
            notarized: self.notarized,
            stapled: self.stapled,
            bom_exported: self.bom_exported,
            warnings: self.warnings,
        }
    }
}

pub struct BuildPipeline<'a> {
    runner: &'a dyn ToolRunner,
    tools: &'a ToolPaths,
    project: ProjectLayout,
    options: BuildOptions,
    staple_retry_interval: Duration,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        tools: &'a ToolPaths,
        project_dir: &Path,
        options: BuildOptions,
    ) -> Self {
        BuildPipeline {
            runner,
            tools,
            project: ProjectLayout::new(project_dir),
            options,
            staple_retry_interval: STAPLE_RETRY_INTERVAL,
        }
    }

    pub fn with_staple_retry_interval(mut self, interval: Duration) -> Self {
        self.staple_retry_interval = interval;
        self
    }

    /// Run every applicable stage and report what happened
    ///
    /// Nothing is spawned until the manifest has been found, decoded and
    /// resolved. The run's temp directory is removed on every exit path.
    pub async fn run(&self) -> Result<BuildReport, BuildError> {
        let manifest_path = locate_manifest(self.project.root(), None)?;
        let manifest = read_manifest(&manifest_path)?;
        logger::debug(&format!("Loaded {}", manifest_path.display()));
        let manifest = resolve_substitutions(manifest)?;

        let mut state = RunState {
            package_path: self.project.build_dir().join(manifest.package_filename()),
            stages_run: vec![Stage::LoadManifest, Stage::ResolveSubstitutions],
            ..RunState::default()
        };

        let result = self.run_stages(&manifest, &mut state).await;

        let temp_dir = self.project.temp_dir();
        if temp_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&temp_dir) {
                debug!("Could not remove {}: {}", temp_dir.display(), e);
            }
        }

        result.map(|()| state.into_report())
    }

    async fn run_stages(
        &self,
        manifest: &BuildManifest,
        state: &mut RunState,
    ) -> Result<(), BuildError> {
        for stage in Stage::PACKAGING {
            if !stage.should_run(manifest, &self.options, state) {
                debug!("Skipping stage: {}", stage);
                continue;
            }
            logger::step(&format!("Stage: {}", stage));

            let ran = match stage {
                Stage::Prepare => {
                    state.prepared = prepare::prepare(self, manifest).await?;
                    true
                }
                Stage::BuildComponent => {
                    component::build_component(self, manifest, state).await?;
                    true
                }
                Stage::BuildDistribution => {
                    distribution::build_distribution(self, manifest, state).await?;
                    true
                }
                Stage::Notarize => notarize::notarize(self, manifest, state).await,
                Stage::Staple => {
                    notarize::staple(self, manifest, state).await;
                    true
                }
                Stage::ExportBom => {
                    self.export_bom(state).await;
                    true
                }
                Stage::LoadManifest | Stage::ResolveSubstitutions => false,
            };

            if ran {
                state.stages_run.push(stage);
            }
        }
        Ok(())
    }

    async fn export_bom(&self, state: &mut RunState) {
        logger::display("Exporting BOM information");
        let destination = self.project.bom_path();
        match bom::export_bom(self.runner, self.tools, &state.package_path, &destination).await {
            Ok(()) => {
                state.bom_exported = true;
                logger::display(&format!("Wrote {}", self.project.bom_path().display()));
            }
            Err(e) => state.warn(format!("BOM export failed: {}", e)),
        }
    }

    /// Run a tool and record its output in the log file
    pub(crate) async fn invoke(&self, invocation: &Invocation) -> ProcessResult {
        invoke(self.runner, invocation).await
    }

    /// Turn a failed tool run into a terminal build error
    pub(crate) fn check(invocation: &Invocation, result: &ProcessResult) -> Result<(), BuildError> {
        if result.success() {
            return Ok(());
        }
        Err(BuildError::BuildFailed {
            tool: invocation.program_name(),
            exit_code: result.exit_code,
            stderr: result.stderr.clone(),
        })
    }
}

/// CLI entry point for the default build action
pub async fn handle_build(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    project_dir: &Path,
    options: BuildOptions,
) -> Result<BuildReport, BuildError> {
    let started = std::time::Instant::now();
    let report = BuildPipeline::new(runner, tools, project_dir, options).run().await?;

    logger::success(&format!(
        "Built {} in {:.1}s",
        report.package_path.display(),
        started.elapsed().as_secs_f64()
    ));
    if report.notarized {
        logger::display(&format!(
            "Notarized{}",
            if report.stapled { " and stapled" } else { "" }
        ));
    }
    if !report.warnings.is_empty() {
        logger::display(&format!("Finished with {} warning(s)", report.warnings.len()));
    }
    Ok(report)
}

pub(crate) async fn invoke(runner: &dyn ToolRunner, invocation: &Invocation) -> ProcessResult {
    let description = redacted(invocation);
    debug!("Running: {}", description);
    let result = runner.run(invocation).await;
    logger::capture_output(&description, &result);
    result
}

/// Command line for logs with secret arguments masked
pub(crate) fn redacted(invocation: &Invocation) -> String {
    let mut parts = vec![invocation.program.display().to_string()];
    let mut mask_next = false;
    for arg in &invocation.args {
        if mask_next {
            parts.push("********".to_string());
        } else {
            parts.push(arg.clone());
        }
        mask_next = arg == "--password";
    }
    parts.join(" ")
}
