//! On-disk layout of a package project

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Lifecycle script names pkgbuild recognises
pub const SCRIPT_NAMES: [&str; 5] = [
    "preinstall",
    "postinstall",
    "preupgrade",
    "postupgrade",
    "preexpansion",
];

pub const BOM_FILE_NAME: &str = "Bom.txt";
pub const GITIGNORE_CONTENTS: &str = "build/\n.DS_Store\n";
const TEMP_DIR_NAME: &str = ".mpkg-tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name, used to derive default package names
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package".to_string())
    }

    pub fn payload_dir(&self) -> PathBuf {
        self.root.join("payload")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    /// Scratch space owned by a single build run
    pub fn temp_dir(&self) -> PathBuf {
        self.build_dir().join(TEMP_DIR_NAME)
    }

    pub fn bom_path(&self) -> PathBuf {
        self.root.join(BOM_FILE_NAME)
    }

    /// Create `payload/`, `scripts/`, `build/` and `.gitignore`
    ///
    /// An existing `.gitignore` is left alone.
    pub fn scaffold(&self) -> io::Result<()> {
        fs::create_dir_all(self.payload_dir())?;
        fs::create_dir_all(self.scripts_dir())?;
        fs::create_dir_all(self.build_dir())?;

        let gitignore = self.root.join(".gitignore");
        if !gitignore.exists() {
            fs::write(&gitignore, GITIGNORE_CONTENTS)?;
        }
        Ok(())
    }
}

/// Mark a file `0755`
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Move a directory tree, copying when a rename is not possible
pub fn relocate_dir(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if to.exists() {
        fs::remove_dir_all(to)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_tree(from, to)?;
    fs::remove_dir_all(from)
}

/// Recursive copy preserving symlinks and permissions
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in walkdir::WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let link = fs::read_link(from)?;
    std::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}
