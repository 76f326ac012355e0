//! mpkg build-info manifest
//!
//! This crate holds the typed model of a package project's `build-info` file
//! and everything needed to move it between disk and memory:
//!
//! - [`BuildManifest`] and its nested signing/notarization sections
//! - decoding and encoding for plist, JSON and YAML ([`codec`])
//! - discovery of the single manifest inside a project directory ([`locate`])
//! - resolution of `${...}` placeholders in `name` and `version` ([`substitution`])

pub mod codec;
pub mod errors;
pub mod format;
pub mod locate;
mod strict;
pub mod substitution;
pub mod types;

pub use codec::{decode, encode, read_manifest, write_manifest};
pub use errors::ManifestError;
pub use format::ManifestFormat;
pub use locate::{locate_manifest, manifest_path, MANIFEST_STEM};
pub use substitution::{resolve_substitutions, resolve_substitutions_at};
pub use types::{
    BuildManifest, Compression, NotarizationInfo, Ownership, PostinstallAction, SigningInfo,
};
