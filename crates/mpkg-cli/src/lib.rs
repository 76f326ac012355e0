//! mpkg library - command implementations behind the `mpkg` binary

pub mod commands;
pub mod common;
pub mod env_overlay;
pub mod errors;
pub mod project;

pub use common::GlobalOpts;
pub use errors::MpkgError;
