//! Variables available to `${VAR}` placeholders in lifecycle scripts
//!
//! The overlay merges, lowest precedence first, the process environment
//! filtered to names starting with [`ENV_PREFIX`] and the project's env file.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PREFIX: &str = "MPKG_";
pub const ENV_FILE_NAME: &str = ".env";

static ENV_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$").ok()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverlay {
    vars: HashMap<String, String>,
}

impl EnvironmentOverlay {
    /// Build the overlay for a project
    ///
    /// `env_file` overrides `<project>/.env`. An explicit file that does not
    /// exist is an error; a missing default file is not.
    pub fn load(project_dir: &Path, env_file: Option<&Path>) -> io::Result<Self> {
        let (path, required): (PathBuf, bool) = match env_file {
            Some(path) => (path.to_path_buf(), true),
            None => (project_dir.join(ENV_FILE_NAME), false),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!("Loaded env file {}", path.display());
                Some(contents)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => None,
            Err(e) => {
                return Err(io::Error::new(
                    e.kind(),
                    format!("Failed to read env file {}: {}", path.display(), e),
                ))
            }
        };

        Ok(Self::from_sources(std::env::vars(), contents.as_deref()))
    }

    pub fn from_sources<I>(process_env: I, env_file: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars: HashMap<String, String> = process_env
            .into_iter()
            .filter(|(name, _)| name.starts_with(ENV_PREFIX))
            .collect();
        if let Some(contents) = env_file {
            vars.extend(parse_env_file(contents));
        }
        EnvironmentOverlay { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Replace every known `${NAME}` in one left-to-right pass
    ///
    /// Unknown names and unclosed tokens are copied through untouched; shell
    /// scripts legitimately use `${VAR}` for their own variables.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let name = &after[..end];
                    match self.vars.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Parse `KEY=VALUE` lines; comments, blank lines and malformed lines are skipped
pub fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    let Some(re) = ENV_LINE.as_ref() else {
        return Vec::new();
    };

    contents
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .filter_map(|line| re.captures(line))
        .map(|caps| {
            let key = caps[1].to_string();
            let value = unquote(&caps[2]).to_string();
            (key, value)
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
