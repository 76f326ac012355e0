use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// On-disk serialization of a build-info manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestFormat {
    Plist,
    Json,
    Yaml,
}

/// Every extension a manifest may carry, in discovery order
pub(crate) const DISCOVERY_ORDER: &[(&str, ManifestFormat)] = &[
    ("plist", ManifestFormat::Plist),
    ("json", ManifestFormat::Json),
    ("yaml", ManifestFormat::Yaml),
    ("yml", ManifestFormat::Yaml),
];

impl ManifestFormat {
    pub const ALL: [ManifestFormat; 3] = [
        ManifestFormat::Plist,
        ManifestFormat::Json,
        ManifestFormat::Yaml,
    ];

    /// Canonical extension used when writing a new manifest
    pub fn extension(self) -> &'static str {
        match self {
            ManifestFormat::Plist => "plist",
            ManifestFormat::Json => "json",
            ManifestFormat::Yaml => "yaml",
        }
    }

    /// Extensions accepted when looking for a manifest of this format
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            ManifestFormat::Plist => &["plist"],
            ManifestFormat::Json => &["json"],
            ManifestFormat::Yaml => &["yaml", "yml"],
        }
    }

    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        DISCOVERY_ORDER
            .iter()
            .find(|(candidate, _)| *candidate == ext)
            .map(|(_, format)| *format)
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown build-info format '{0}' (expected plist, json or yaml)")]
pub struct ParseFormatError(String);

impl FromStr for ManifestFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plist" => Ok(ManifestFormat::Plist),
            "json" => Ok(ManifestFormat::Json),
            "yaml" | "yml" => Ok(ManifestFormat::Yaml),
            other => Err(ParseFormatError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("build-info.yml")),
            Some(ManifestFormat::Yaml)
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("build-info.PLIST")),
            Some(ManifestFormat::Plist)
        );
        assert_eq!(ManifestFormat::from_path(Path::new("build-info.toml")), None);
    }

    #[test]
    fn test_parse() {
        assert!(matches!("yml".parse(), Ok(ManifestFormat::Yaml)));
        assert!("xml".parse::<ManifestFormat>().is_err());
    }
}
