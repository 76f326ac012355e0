//! Top-level error type for the mpkg CLI
//!
//! Every terminal failure ends up as an [`MpkgError`]; [`MpkgError::exit_code`]
//! maps it onto the process exit status.

use mpkg_config::ConfigError;
use mpkg_manifest::ManifestError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::commands::build::BuildError;
use crate::commands::convert::ConvertError;

pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_PROJECT_EXISTS: i32 = 2;
pub const EXIT_INVALID_PROJECT: i32 = 3;
pub const EXIT_IMPORT_FAILED: i32 = 4;
pub const EXIT_BUILD_FAILED: i32 = 5;

#[derive(Error, Debug)]
pub enum MpkgError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("Project already exists: {} (use --force to reuse it)", .0.display())]
    ProjectExists(PathBuf),

    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("No BOM found at {} (build with --export-bom-info first)", .0.display())]
    MissingBom(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl MpkgError {
    pub fn exit_code(&self) -> i32 {
        match self {
            MpkgError::Manifest(e) => manifest_exit_code(e),
            MpkgError::Build(BuildError::Manifest(e)) => manifest_exit_code(e),
            MpkgError::Build(_) => EXIT_BUILD_FAILED,
            MpkgError::Convert(ConvertError::Manifest(e)) => manifest_exit_code(e),
            MpkgError::Convert(ConvertError::NoProjectsFound(_)) => EXIT_INVALID_PROJECT,
            MpkgError::Convert(_) => EXIT_GENERIC,
            MpkgError::ProjectExists(_) => EXIT_PROJECT_EXISTS,
            MpkgError::MissingBom(_) => EXIT_INVALID_PROJECT,
            MpkgError::ImportFailed(_) => EXIT_IMPORT_FAILED,
            MpkgError::Config(_) | MpkgError::Io(_) => EXIT_GENERIC,
        }
    }
}

fn manifest_exit_code(error: &ManifestError) -> i32 {
    match error {
        ManifestError::Io(_) | ManifestError::Encode { .. } => EXIT_GENERIC,
        _ => EXIT_INVALID_PROJECT,
    }
}
