//! Manifest encoding and decoding
//!
//! All three formats go through serde. JSON is routed through
//! `serde_json::Value` so keys come out sorted, which keeps generated files
//! stable under version control.

use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::errors::ManifestError;
use crate::format::ManifestFormat;
use crate::types::BuildManifest;

/// Decode a manifest payload in the given format
pub fn decode(bytes: &[u8], format: ManifestFormat) -> Result<BuildManifest, ManifestError> {
    let decode_err = |message: String| ManifestError::Decode { format, message };

    let manifest: BuildManifest = match format {
        ManifestFormat::Plist => plist::from_bytes(bytes).map_err(|e| decode_err(e.to_string()))?,
        ManifestFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| decode_err(e.to_string()))?
        }
        ManifestFormat::Yaml => {
            serde_yaml::from_slice(bytes).map_err(|e| decode_err(e.to_string()))?
        }
    };

    manifest.validate()?;
    Ok(manifest)
}

/// Encode a manifest, pretty-printed and newline terminated
pub fn encode(manifest: &BuildManifest, format: ManifestFormat) -> Result<Vec<u8>, ManifestError> {
    let encode_err = |message: String| ManifestError::Encode { format, message };

    let mut bytes = match format {
        ManifestFormat::Plist => {
            let mut buffer = Vec::new();
            plist::to_writer_xml(&mut buffer, manifest).map_err(|e| encode_err(e.to_string()))?;
            buffer
        }
        ManifestFormat::Json => {
            let value = serde_json::to_value(manifest).map_err(|e| encode_err(e.to_string()))?;
            serde_json::to_vec_pretty(&value).map_err(|e| encode_err(e.to_string()))?
        }
        ManifestFormat::Yaml => serde_yaml::to_string(manifest)
            .map_err(|e| encode_err(e.to_string()))?
            .into_bytes(),
    };

    if bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Read a manifest file, picking the format from its extension
pub fn read_manifest(path: &Path) -> Result<BuildManifest, ManifestError> {
    let format = ManifestFormat::from_path(path)
        .ok_or_else(|| ManifestError::UnsupportedFormat(path.to_path_buf()))?;
    debug!("Reading {} build-info from {:?}", format, path);

    let bytes = fs::read(path)?;
    decode(&bytes, format)
}

/// Write a manifest file, picking the format from its extension
///
/// The content is written to a sibling temp file first and renamed into place.
pub fn write_manifest(manifest: &BuildManifest, path: &Path) -> Result<(), ManifestError> {
    let format = ManifestFormat::from_path(path)
        .ok_or_else(|| ManifestError::UnsupportedFormat(path.to_path_buf()))?;
    let content = encode(manifest, format)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&content)?;
        file.flush()?;
    }
    fs::rename(&temp_path, path)?;

    debug!("Wrote {} build-info to {:?}", format, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Compression, NotarizationInfo, Ownership, PostinstallAction, SigningInfo};
    use tempfile::TempDir;

    fn full_manifest() -> BuildManifest {
        let mut manifest = BuildManifest::new(
            "munki_kickstart-${version}.pkg",
            "com.example.pkg.munki_kickstart",
            "${DATE}",
        );
        manifest.distribution_style = true;
        manifest.install_location = Some("/Library/Example".to_string());
        manifest.ownership = Ownership::PreserveOther;
        manifest.postinstall_action = PostinstallAction::Restart;
        manifest.preserve_xattr = Some(true);
        manifest.suppress_bundle_relocation = Some(false);
        manifest.compression = Some(Compression::Latest);
        manifest.min_os_version = Some("12.0".to_string());
        manifest.large_payload = Some(false);
        manifest.install_kbytes = Some(2048);
        manifest.signing_info = Some(SigningInfo {
            identity: "Developer ID Installer: Example (ABCDE12345)".to_string(),
            keychain: Some("/Users/build/Library/Keychains/signing.keychain".to_string()),
            additional_cert_names: Some(vec!["Intermediate CA".to_string()]),
            timestamp: Some(false),
        });
        manifest.notarization_info = Some(NotarizationInfo {
            apple_id: Some("build@example.com".to_string()),
            team_id: Some("ABCDE12345".to_string()),
            password: Some("@keychain:AC_PASSWORD".to_string()),
            keychain_profile: None,
            asc_provider: Some("ExampleProvider".to_string()),
            staple_timeout: Some(600),
        });
        manifest
    }

    #[test]
    fn test_round_trip_every_format() {
        let manifest = full_manifest();
        for format in ManifestFormat::ALL {
            let Ok(bytes) = encode(&manifest, format) else {
                panic!("encoding {} failed", format);
            };
            let decoded = decode(&bytes, format);
            assert!(
                decoded.as_ref().is_ok_and(|m| *m == manifest),
                "{} round trip changed the manifest: {:?}",
                format,
                decoded
            );
        }
    }

    #[test]
    fn test_cross_format_reencode() {
        let manifest = full_manifest();
        let Ok(json) = encode(&manifest, ManifestFormat::Json) else {
            panic!("json encode failed");
        };
        let Ok(from_json) = decode(&json, ManifestFormat::Json) else {
            panic!("json decode failed");
        };
        let Ok(yaml) = encode(&from_json, ManifestFormat::Yaml) else {
            panic!("yaml encode failed");
        };
        let Ok(from_yaml) = decode(&yaml, ManifestFormat::Yaml) else {
            panic!("yaml decode failed");
        };
        let Ok(plist) = encode(&from_yaml, ManifestFormat::Plist) else {
            panic!("plist encode failed");
        };
        assert!(decode(&plist, ManifestFormat::Plist).is_ok_and(|m| m == manifest));
    }

    #[test]
    fn test_json_keys_sorted() {
        let Ok(bytes) = encode(&full_manifest(), ManifestFormat::Json) else {
            panic!("json encode failed");
        };
        let text = String::from_utf8_lossy(&bytes);
        let identifier = text.find("\"identifier\"");
        let name = text.find("\"name\"");
        let version = text.find("\"version\"");
        assert!(identifier < name && name < version);
    }

    #[test]
    fn test_missing_name_fails() {
        let payload = br#"{"identifier": "com.example.pkg", "version": "1.0"}"#;
        let result = decode(payload, ManifestFormat::Json);
        assert!(result.is_err_and(|e| e.is_decode_error()));
    }

    #[test]
    fn test_empty_identifier_fails() {
        let payload = "name: example\nidentifier: ''\nversion: '1.0'\n";
        let result = decode(payload.as_bytes(), ManifestFormat::Yaml);
        assert!(matches!(result, Err(ManifestError::MissingField("identifier"))));
    }

    #[test]
    fn test_numeric_version_fails_in_every_format() {
        let json = br#"{"name": "example", "identifier": "com.example.pkg", "version": 1.0}"#;
        assert!(decode(json, ManifestFormat::Json).is_err_and(|e| e.is_decode_error()));

        let yaml = "name: example\nidentifier: com.example.pkg\nversion: 1.0\n";
        assert!(decode(yaml.as_bytes(), ManifestFormat::Yaml).is_err_and(|e| e.is_decode_error()));

        let plist = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>name</key>
    <string>example</string>
    <key>identifier</key>
    <string>com.example.pkg</string>
    <key>version</key>
    <real>1.0</real>
</dict>
</plist>
"#;
        assert!(decode(plist.as_bytes(), ManifestFormat::Plist)
            .is_err_and(|e| e.is_decode_error()));
    }

    #[test]
    fn test_quoted_yaml_version_is_a_string() {
        let yaml = "name: example\nidentifier: com.example.pkg\nversion: '1.0'\n";
        assert!(decode(yaml.as_bytes(), ManifestFormat::Yaml).is_ok_and(|m| m.version == "1.0"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let payload = br#"{
            "name": "example",
            "identifier": "com.example.pkg",
            "version": "1.0",
            "product_id": "ignored",
            "nested": {"anything": [1, 2, 3]}
        }"#;
        let result = decode(payload, ManifestFormat::Json);
        assert!(result.is_ok_and(|m| m == BuildManifest::new("example", "com.example.pkg", "1.0")));
    }

    #[test]
    fn test_invalid_enum_value_fails() {
        let payload =
            br#"{"name": "e", "identifier": "i", "version": "1", "ownership": "everyone"}"#;
        assert!(decode(payload, ManifestFormat::Json).is_err_and(|e| e.is_decode_error()));
    }

    #[test]
    fn test_syntax_error_fails() {
        assert!(decode(b"{not json", ManifestFormat::Json).is_err_and(|e| e.is_decode_error()));
        assert!(decode(b"<plist><dict>", ManifestFormat::Plist)
            .is_err_and(|e| e.is_decode_error()));
    }

    #[test]
    fn test_write_and_read_manifest_file() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let path = dir.path().join("build-info.yaml");
        let manifest = full_manifest();

        assert!(write_manifest(&manifest, &path).is_ok());
        assert!(!dir.path().join("build-info.yaml.tmp").exists());
        assert!(read_manifest(&path).is_ok_and(|m| m == manifest));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = read_manifest(Path::new("/tmp/build-info.toml"));
        assert!(matches!(result, Err(ManifestError::UnsupportedFormat(_))));
    }
}
