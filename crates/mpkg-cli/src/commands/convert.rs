//! Manifest format conversion for one project or a directory of projects

use colored::Colorize;
use mpkg_logger as logger;
use mpkg_manifest::{
    locate_manifest, manifest_path, read_manifest, write_manifest, ManifestError, ManifestFormat,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("No projects found in {}", .0.display())]
    NoProjectsFound(PathBuf),

    #[error("{0} project(s) failed to convert")]
    BatchFailed(usize),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted { from: PathBuf, to: PathBuf },
    /// Already in the target format
    Skipped(PathBuf),
    /// Dry run: what would have been converted
    Planned { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Converted projects, or projects that would be converted in a dry run
    pub converted: usize,
    pub skipped: usize,
    pub errored: usize,
    pub failures: Vec<(PathBuf, String)>,
}

/// Convert the manifest of a single project to `target`
pub fn convert_project(
    project_dir: &Path,
    target: ManifestFormat,
    dry_run: bool,
) -> Result<ConvertOutcome, ConvertError> {
    let source = locate_manifest(project_dir, None)?;
    if ManifestFormat::from_path(&source) == Some(target) {
        return Ok(ConvertOutcome::Skipped(source));
    }

    let destination = manifest_path(project_dir, target);
    if dry_run {
        return Ok(ConvertOutcome::Planned {
            from: source,
            to: destination,
        });
    }

    let manifest = read_manifest(&source)?;
    write_manifest(&manifest, &destination)?;
    if source != destination {
        fs::remove_file(&source)?;
    }

    Ok(ConvertOutcome::Converted {
        from: source,
        to: destination,
    })
}

/// Convert every immediate subdirectory of `parent` that is a project
///
/// A directory counts as a project when exactly one manifest is found in it.
/// Failures are counted per project and never stop the batch.
pub fn convert_all(
    parent: &Path,
    target: ManifestFormat,
    dry_run: bool,
) -> Result<ConvertSummary, ConvertError> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(parent)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut summary = ConvertSummary::default();
    for dir in dirs {
        if locate_manifest(&dir, None).is_err() {
            continue;
        }
        match convert_project(&dir, target, dry_run) {
            Ok(outcome) => {
                report_outcome(&outcome);
                match outcome {
                    ConvertOutcome::Converted { .. } | ConvertOutcome::Planned { .. } => {
                        summary.converted += 1;
                    }
                    ConvertOutcome::Skipped(_) => summary.skipped += 1,
                }
            }
            Err(e) => {
                logger::error(&format!("{}: {}", dir.display(), e));
                summary.errored += 1;
                summary.failures.push((dir, e.to_string()));
            }
        }
    }

    if summary.converted == 0 && summary.skipped == 0 && summary.errored == 0 {
        return Err(ConvertError::NoProjectsFound(parent.to_path_buf()));
    }
    Ok(summary)
}

fn report_outcome(outcome: &ConvertOutcome) {
    match outcome {
        ConvertOutcome::Converted { from, to } => {
            logger::display(&format!("Converted {} -> {}", from.display(), to.display()));
        }
        ConvertOutcome::Planned { from, to } => {
            logger::display(&format!(
                "{} {} -> {}",
                "Would convert".cyan(),
                from.display(),
                to.display()
            ));
        }
        ConvertOutcome::Skipped(path) => {
            logger::display(&format!(
                "{} {} (already in target format)",
                "Skipped".dimmed(),
                path.display()
            ));
        }
    }
}

/// CLI entry point for `--convert`
pub fn handle_convert(
    project: &Path,
    target: ManifestFormat,
    all: bool,
    dry_run: bool,
) -> Result<(), ConvertError> {
    if !all {
        let outcome = convert_project(project, target, dry_run)?;
        report_outcome(&outcome);
        return Ok(());
    }

    let summary = convert_all(project, target, dry_run)?;
    logger::display(&format!(
        "{} converted, {} skipped, {} errored",
        summary.converted.to_string().green(),
        summary.skipped.to_string().yellow(),
        summary.errored.to_string().red()
    ));
    if summary.errored > 0 {
        return Err(ConvertError::BatchFailed(summary.errored));
    }
    Ok(())
}
