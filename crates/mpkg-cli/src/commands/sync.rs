//! Apply the permissions recorded in `Bom.txt` back onto `payload/`
//!
//! Git does not keep modes beyond the executable bit, nor owners. After a
//! fresh checkout this restores directory structure and modes; owners are
//! only changed with `--sync-ownership` since that needs root.

use mpkg_logger as logger;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::MpkgError;
use crate::project::ProjectLayout;

const FILE_TYPE_MASK: u32 = 0o170_000;
const DIRECTORY: u32 = 0o040_000;
const SYMLINK: u32 = 0o120_000;

/// One line of `lsbom` output: `path<TAB>mode<TAB>uid/gid[<TAB>...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomEntry {
    pub path: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl BomEntry {
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split('\t');
        let path = fields.next()?.trim();
        let mode = u32::from_str_radix(fields.next()?.trim(), 8).ok()?;
        let (uid, gid) = fields.next()?.trim().split_once('/')?;
        if path.is_empty() {
            return None;
        }
        Some(BomEntry {
            path: path.to_string(),
            mode,
            uid: uid.parse().ok()?,
            gid: gid.parse().ok()?,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.mode & FILE_TYPE_MASK == DIRECTORY
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & FILE_TYPE_MASK == SYMLINK
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// root:wheel, what pkgbuild's recommended ownership produces anyway
    pub fn is_root_owned(&self) -> bool {
        self.uid == 0 && self.gid == 0
    }

    /// Location of the entry below `payload`
    pub fn target(&self, payload: &Path) -> PathBuf {
        let relative = self.path.trim_start_matches("./");
        if relative.is_empty() || relative == "." {
            payload.to_path_buf()
        } else {
            payload.join(relative)
        }
    }
}

/// Parse every valid line, ignoring the rest
pub fn parse_bom(contents: &str) -> Vec<BomEntry> {
    contents.lines().filter_map(BomEntry::parse).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created_dirs: usize,
    pub modes_updated: usize,
    pub owners_updated: usize,
    /// Entries with a non-root owner left alone because ownership sync was off
    pub ownership_pending: usize,
    pub missing: Vec<PathBuf>,
    pub errors: Vec<String>,
}

pub fn sync_project(project_dir: &Path, sync_ownership: bool) -> Result<SyncReport, MpkgError> {
    let layout = ProjectLayout::new(project_dir);
    let bom_path = layout.bom_path();
    if !bom_path.is_file() {
        return Err(MpkgError::MissingBom(bom_path));
    }
    let contents = fs::read_to_string(&bom_path)?;
    let payload = layout.payload_dir();

    let mut report = SyncReport::default();
    for entry in parse_bom(&contents) {
        let target = entry.target(&payload);

        if !target.exists() && fs::symlink_metadata(&target).is_err() {
            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                report.created_dirs += 1;
            } else {
                report.missing.push(target);
                continue;
            }
        }

        if entry.is_symlink()
            || fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink())
        {
            debug!("Skipping symlink {}", target.display());
            continue;
        }

        match apply_mode(&target, entry.permissions()) {
            Ok(true) => report.modes_updated += 1,
            Ok(false) => {}
            Err(e) => report.errors.push(format!("{}: {}", target.display(), e)),
        }

        if !sync_ownership {
            if !entry.is_root_owned() {
                report.ownership_pending += 1;
            }
            continue;
        }
        match apply_owner(&target, entry.uid, entry.gid) {
            Ok(()) => report.owners_updated += 1,
            Err(e) => report.errors.push(format!("{}: {}", target.display(), e)),
        }
    }
    Ok(report)
}

#[cfg(unix)]
fn apply_mode(path: &Path, permissions: u32) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let current = fs::metadata(path)?.permissions().mode() & 0o7777;
    if current == permissions {
        return Ok(false);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(permissions))?;
    Ok(true)
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _permissions: u32) -> std::io::Result<bool> {
    Ok(false)
}

#[cfg(unix)]
fn apply_owner(path: &Path, uid: u32, gid: u32) -> std::io::Result<()> {
    std::os::unix::fs::chown(path, Some(uid), Some(gid))
}

#[cfg(not(unix))]
fn apply_owner(_path: &Path, _uid: u32, _gid: u32) -> std::io::Result<()> {
    Ok(())
}

pub fn handle_sync(project_dir: &Path, sync_ownership: bool) -> Result<(), MpkgError> {
    let report = sync_project(project_dir, sync_ownership)?;

    logger::display(&format!(
        "Created {} director(ies), updated {} mode(s), {} owner(s)",
        report.created_dirs, report.modes_updated, report.owners_updated
    ));
    for path in &report.missing {
        logger::warn(&format!("Missing from payload: {}", path.display()));
    }
    for error in &report.errors {
        logger::warn(error);
    }
    if report.ownership_pending > 0 {
        logger::display(&format!(
            "{} item(s) are not owned by root:wheel in Bom.txt. \
             Rerun with --sync-ownership using sudo to apply owners.",
            report.ownership_pending
        ));
    }
    logger::success("Payload synced from Bom.txt");
    Ok(())
}
