use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::ConfigError;

/// Environment variable naming an alternate config file
pub const CONFIG_ENV_VAR: &str = "MPKG_CONFIG";

/// Locations of the external tools the pipelines drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub pkgbuild: PathBuf,
    pub productbuild: PathBuf,
    pub xcrun: PathBuf,
    pub pkgutil: PathBuf,
    pub lsbom: PathBuf,
    pub ditto: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        ToolPaths {
            pkgbuild: PathBuf::from("/usr/bin/pkgbuild"),
            productbuild: PathBuf::from("/usr/bin/productbuild"),
            xcrun: PathBuf::from("/usr/bin/xcrun"),
            pkgutil: PathBuf::from("/usr/sbin/pkgutil"),
            lsbom: PathBuf::from("/usr/bin/lsbom"),
            ditto: PathBuf::from("/usr/bin/ditto"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    tools: ToolPaths,
}

impl ToolPaths {
    /// Load from the user's config file, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path(std::env::var_os(CONFIG_ENV_VAR))?;
        Self::load_from_path(&path)
    }

    /// Load from an explicit file; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}, using default tool paths", path.display());
            return Ok(ToolPaths::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!("Loaded tool paths from {}", path.display());
        file.tools.resolved()
    }

    /// Resolve bare program names (`pkgbuild`) through `PATH`
    pub fn resolved(self) -> Result<Self, ConfigError> {
        Ok(ToolPaths {
            pkgbuild: resolve_tool("pkgbuild", self.pkgbuild)?,
            productbuild: resolve_tool("productbuild", self.productbuild)?,
            xcrun: resolve_tool("xcrun", self.xcrun)?,
            pkgutil: resolve_tool("pkgutil", self.pkgutil)?,
            lsbom: resolve_tool("lsbom", self.lsbom)?,
            ditto: resolve_tool("ditto", self.ditto)?,
        })
    }
}

fn resolve_tool(tool: &'static str, configured: PathBuf) -> Result<PathBuf, ConfigError> {
    if configured.components().count() != 1 || configured.is_absolute() {
        return Ok(configured);
    }
    which::which(&configured).map_err(|_| ConfigError::ToolNotFound {
        tool,
        name: configured.to_string_lossy().into_owned(),
    })
}

/// Config file location: `override_path` when given, else `~/.config/mpkg/mpkg.toml`
pub fn config_path(override_path: Option<OsString>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    #[cfg(not(target_os = "windows"))]
    let config_dir = dirs::home_dir()
        .ok_or(ConfigError::NoHomeDir)?
        .join(".config")
        .join("mpkg");

    #[cfg(target_os = "windows")]
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoHomeDir)?.join("mpkg");

    Ok(config_dir.join("mpkg.toml"))
}
