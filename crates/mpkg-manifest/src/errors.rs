use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::format::ManifestFormat;

/// Errors that can occur while locating, reading or writing a build-info manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to decode {format} build-info: {message}")]
    Decode {
        format: ManifestFormat,
        message: String,
    },

    #[error("Failed to encode {format} build-info: {message}")]
    Encode {
        format: ManifestFormat,
        message: String,
    },

    #[error("build-info is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("No build-info file found in {}", .0.display())]
    NoManifestFound(PathBuf),

    #[error("Multiple build-info files found in {}: {}", .dir.display(), found_names(.found))]
    AmbiguousManifest { dir: PathBuf, found: Vec<PathBuf> },

    #[error("Unsupported build-info extension: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Unresolved placeholder '{token}' in field '{field}'")]
    UnresolvedPlaceholder { field: &'static str, token: String },
}

impl ManifestError {
    /// True for every failure that means "the manifest content is unusable"
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ManifestError::Decode { .. } | ManifestError::MissingField(_)
        )
    }
}

fn found_names(found: &[PathBuf]) -> String {
    found
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_display_lists_files() {
        let err = ManifestError::AmbiguousManifest {
            dir: PathBuf::from("/tmp/project"),
            found: vec![
                PathBuf::from("/tmp/project/build-info.plist"),
                PathBuf::from("/tmp/project/build-info.json"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Multiple build-info files found in /tmp/project: build-info.plist, build-info.json"
        );
    }

    #[test]
    fn test_decode_error_classification() {
        assert!(ManifestError::MissingField("name").is_decode_error());
        assert!(!ManifestError::NoManifestFound(PathBuf::from(".")).is_decode_error());
    }
}
