//! Build-info data model
//!
//! Keys are snake_case on disk in every format. Optional fields are omitted
//! when unset so an encoded manifest only carries what the author populated,
//! plus the three enums that always have a value.

use serde::{Deserialize, Serialize};

use crate::strict;

/// Default install location when the manifest leaves it unset
pub const DEFAULT_INSTALL_LOCATION: &str = "/";

/// Default seconds to keep retrying `stapler` after an accepted notarization
pub const DEFAULT_STAPLE_TIMEOUT: u64 = 300;

// =============================================================================
// MANIFEST
// =============================================================================

/// Canonical build configuration for one package project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Output package filename, may contain `${version}` and date placeholders
    #[serde(deserialize_with = "strict::string")]
    pub name: String,
    /// Reverse-DNS package identifier
    #[serde(deserialize_with = "strict::string")]
    pub identifier: String,
    /// Free-form version string, never a number
    #[serde(deserialize_with = "strict::string")]
    pub version: String,

    #[serde(default)]
    pub distribution_style: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_location: Option<String>,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default)]
    pub postinstall_action: PostinstallAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_xattr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_bundle_relocation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_payload: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_kbytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_info: Option<SigningInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notarization_info: Option<NotarizationInfo>,
}

impl BuildManifest {
    /// Minimal manifest with every optional field unset
    pub fn new(
        name: impl Into<String>,
        identifier: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        BuildManifest {
            name: name.into(),
            identifier: identifier.into(),
            version: version.into(),
            distribution_style: false,
            install_location: None,
            ownership: Ownership::default(),
            postinstall_action: PostinstallAction::default(),
            preserve_xattr: None,
            suppress_bundle_relocation: None,
            compression: None,
            min_os_version: None,
            large_payload: None,
            install_kbytes: None,
            signing_info: None,
            notarization_info: None,
        }
    }

    pub fn install_location(&self) -> &str {
        self.install_location
            .as_deref()
            .unwrap_or(DEFAULT_INSTALL_LOCATION)
    }

    /// A distribution package wraps the component one when asked for
    /// explicitly or when the result has to be signed
    pub fn wants_distribution(&self) -> bool {
        self.distribution_style || self.signing_info.is_some()
    }

    /// Filename of the built package, `.pkg` appended when missing
    pub fn package_filename(&self) -> String {
        if self.name.to_ascii_lowercase().ends_with(".pkg") {
            self.name.clone()
        } else {
            format!("{}.pkg", self.name)
        }
    }

    /// Enforce the required-field contract after deserialization
    pub(crate) fn validate(&self) -> Result<(), crate::ManifestError> {
        if self.name.trim().is_empty() {
            return Err(crate::ManifestError::MissingField("name"));
        }
        if self.identifier.trim().is_empty() {
            return Err(crate::ManifestError::MissingField("identifier"));
        }
        if let Some(signing) = &self.signing_info {
            if signing.identity.trim().is_empty() {
                return Err(crate::ManifestError::MissingField("signing_info.identity"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// ENUMS - closed sets validated at decode time
// =============================================================================

/// How pkgbuild assigns ownership to payload files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ownership {
    #[default]
    Recommended,
    Preserve,
    PreserveOther,
}

impl Ownership {
    pub fn as_str(self) -> &'static str {
        match self {
            Ownership::Recommended => "recommended",
            Ownership::Preserve => "preserve",
            Ownership::PreserveOther => "preserve-other",
        }
    }
}

/// What the installer asks the user to do once the package is installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostinstallAction {
    #[default]
    None,
    Logout,
    Restart,
}

impl PostinstallAction {
    /// Attribute value for PackageInfo, `None` when nothing has to be written
    pub fn pkginfo_value(self) -> Option<&'static str> {
        match self {
            PostinstallAction::None => None,
            PostinstallAction::Logout => Some("logout"),
            PostinstallAction::Restart => Some("restart"),
        }
    }
}

/// Payload compression requested from pkgbuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Legacy,
    Latest,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::Legacy => "legacy",
            Compression::Latest => "latest",
        }
    }
}

// =============================================================================
// SIGNING / NOTARIZATION
// =============================================================================

/// Signing identity used by productbuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfo {
    #[serde(deserialize_with = "strict::string")]
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keychain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_cert_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<bool>,
}

impl SigningInfo {
    pub fn new(identity: impl Into<String>) -> Self {
        SigningInfo {
            identity: identity.into(),
            keychain: None,
            additional_cert_names: None,
            timestamp: None,
        }
    }

    pub fn timestamp(&self) -> bool {
        self.timestamp.unwrap_or(true)
    }
}

/// Credentials and tuning for notarytool submissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apple_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keychain_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asc_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staple_timeout: Option<u64>,
}

impl NotarizationInfo {
    pub fn staple_timeout(&self) -> u64 {
        self.staple_timeout.unwrap_or(DEFAULT_STAPLE_TIMEOUT)
    }
}
