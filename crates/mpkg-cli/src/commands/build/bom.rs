//! Bill-of-materials export: `pkgutil --bom` then `lsbom`

use mpkg_config::ToolPaths;
use mpkg_process::{Invocation, ToolRunner};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::invoke;

#[derive(Error, Debug)]
pub enum BomExportError {
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Tool {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("pkgutil did not report a BOM for {}", .0.display())]
    NoBom(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Write the package's BOM listing verbatim to `destination`
pub async fn export_bom(
    runner: &dyn ToolRunner,
    tools: &ToolPaths,
    package: &Path,
    destination: &Path,
) -> Result<(), BomExportError> {
    let extract = Invocation::new(&tools.pkgutil).arg("--bom").arg(package);
    let result = invoke(runner, &extract).await;
    if !result.success() {
        return Err(BomExportError::Tool {
            tool: extract.program_name(),
            exit_code: result.exit_code,
            message: result.error_text().to_string(),
        });
    }

    let bom = result
        .stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| BomExportError::NoBom(package.to_path_buf()))?;

    let list = Invocation::new(&tools.lsbom).arg(&bom);
    let result = invoke(runner, &list).await;

    remove_extracted(&bom);

    if !result.success() {
        return Err(BomExportError::Tool {
            tool: list.program_name(),
            exit_code: result.exit_code,
            message: result.error_text().to_string(),
        });
    }

    fs::write(destination, format!("{}\n", result.stdout))?;
    Ok(())
}

/// Delete the `<package>.boms.<random>` directory pkgutil extracted into
fn remove_extracted(bom: &Path) {
    let extraction_dir = bom.ancestors().skip(1).find(|dir| {
        dir.file_name().is_some_and(|name| name.to_string_lossy().contains(".boms."))
    });
    let removed = match extraction_dir {
        Some(dir) => fs::remove_dir_all(dir),
        None => fs::remove_file(bom),
    };
    if let Err(e) = removed {
        debug!("Could not remove extracted BOM {}: {}", bom.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpkg_process::mock::{MockResponse, MockRunner};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_pkgutil_output_is_no_bom() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let runner = MockRunner::new().respond("pkgutil", MockResponse::stdout("\n"));
        let result = export_bom(
            &runner,
            &ToolPaths::default(),
            Path::new("demo.pkg"),
            &dir.path().join("Bom.txt"),
        )
        .await;
        assert!(matches!(result, Err(BomExportError::NoBom(_))));
        assert!(!runner.invoked("lsbom"));
    }

    #[tokio::test]
    async fn test_export_removes_extraction_dir() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let extracted = dir.path().join("demo.pkg.boms.Wkb7sP");
        let bom = extracted.join("Bom");
        if fs::create_dir_all(&extracted).is_err() || fs::write(&bom, b"BOMStore").is_err() {
            return;
        }
        let runner = MockRunner::new()
            .respond("pkgutil", MockResponse::stdout(bom.display().to_string()))
            .respond("lsbom", MockResponse::stdout(".\t40755\t0/0"));

        let destination = dir.path().join("Bom.txt");
        let result = export_bom(
            &runner,
            &ToolPaths::default(),
            Path::new("demo.pkg"),
            &destination,
        )
        .await;
        assert!(result.is_ok());
        assert!(!extracted.exists());
        assert_eq!(fs::read_to_string(&destination).unwrap_or_default(), ".\t40755\t0/0\n");
    }

    #[tokio::test]
    async fn test_lsbom_failure() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let runner = MockRunner::new()
            .respond("pkgutil", MockResponse::stdout("/tmp/x.boms/Bom"))
            .respond("lsbom", MockResponse::failure(1, "lsbom: bad file"));
        let result = export_bom(
            &runner,
            &ToolPaths::default(),
            Path::new("demo.pkg"),
            &dir.path().join("Bom.txt"),
        )
        .await;
        assert!(matches!(result, Err(BomExportError::Tool { ref tool, .. }) if tool == "lsbom"));
    }
}
