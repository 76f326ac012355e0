//! Placeholder resolution for `name` and `version`
//!
//! Supported tokens:
//! - `${version}` (in `name` only) - the resolved version
//! - `${DATE}` - `YYYY.MM.DD`
//! - `${DATETIME}` - `YYYY.MM.DD.HHMMSS`
//! - `${TIMESTAMP}` - `YYYY.MM.DD.HHMM`
//!
//! Resolution is a single left-to-right pass; text inserted for a token is
//! never scanned again. Anything still looking like `${...}` afterwards is an
//! error, since it would otherwise leak into a package filename or version.

use chrono::{Local, NaiveDateTime};

use crate::errors::ManifestError;
use crate::types::BuildManifest;

/// Resolve placeholders against the current local time
pub fn resolve_substitutions(manifest: BuildManifest) -> Result<BuildManifest, ManifestError> {
    resolve_substitutions_at(manifest, Local::now().naive_local())
}

/// Resolve placeholders against a fixed point in time
pub fn resolve_substitutions_at(
    mut manifest: BuildManifest,
    now: NaiveDateTime,
) -> Result<BuildManifest, ManifestError> {
    let version = substitute(&manifest.version, "version", |token| {
        dynamic_token(token, now)
    })?;
    let name = substitute(&manifest.name, "name", |token| match token {
        "version" => Some(version.clone()),
        other => dynamic_token(other, now),
    })?;

    manifest.version = version;
    manifest.name = name;
    Ok(manifest)
}

fn dynamic_token(token: &str, now: NaiveDateTime) -> Option<String> {
    let pattern = match token {
        "DATE" => "%Y.%m.%d",
        "DATETIME" => "%Y.%m.%d.%H%M%S",
        "TIMESTAMP" => "%Y.%m.%d.%H%M",
        _ => return None,
    };
    Some(now.format(pattern).to_string())
}

fn substitute<F>(input: &str, field: &'static str, lookup: F) -> Result<String, ManifestError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find('}') else {
            return Err(ManifestError::UnresolvedPlaceholder {
                field,
                token: rest[start..].to_string(),
            });
        };

        let token = &after_open[..end];
        let value = lookup(token).ok_or_else(|| ManifestError::UnresolvedPlaceholder {
            field,
            token: format!("${{{}}}", token),
        })?;
        result.push_str(&value);
        rest = &after_open[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
