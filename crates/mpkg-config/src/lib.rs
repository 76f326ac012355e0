//! Configuration for the mpkg CLI
//!
//! The only configurable surface is where the Apple packaging tools live.
//! Defaults match a stock macOS install; `~/.config/mpkg/mpkg.toml` (or the
//! file named by `$MPKG_CONFIG`) can point any of them elsewhere.

mod errors;
mod tool_paths;

pub use errors::ConfigError;
pub use tool_paths::{config_path, ToolPaths, CONFIG_ENV_VAR};
