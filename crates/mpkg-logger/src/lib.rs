use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use mpkg_process::ProcessResult;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);
static QUIET: Mutex<bool> = Mutex::new(false);
static SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

const LOG_FILE_NAME: &str = "mpkg.log";

pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map(|v| *v).unwrap_or(0)
}

pub fn is_quiet() -> bool {
    QUIET.lock().ok().map(|v| *v).unwrap_or(false)
}

fn set_flags(verbosity: u8, quiet: bool) {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = if quiet { 0 } else { verbosity };
    }
    if let Ok(mut q) = QUIET.lock() {
        *q = quiet;
    }
}

/// Map verbosity to a `tracing` filter directive
/// 0 = warn, 1 = debug (-v), 2 = trace (-vv)
pub fn verbosity_to_filter() -> &'static str {
    match get_verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize the logger; the log file lives in `~/.config/mpkg/`
pub fn init_with_verbosity(verbosity: u8, quiet: bool) -> Result<(), String> {
    set_flags(verbosity, quiet);
    let config_dir = get_config_dir()?;
    init_log_file(&config_dir.join(LOG_FILE_NAME))
}

/// Initialize the logger writing to an explicit file
pub fn init_with_log_file(log_file: &Path, verbosity: u8, quiet: bool) -> Result<(), String> {
    set_flags(verbosity, quiet);
    init_log_file(log_file)
}

fn init_log_file(log_file: &Path) -> Result<(), String> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;
    }

    // One log per run
    if log_file.exists() {
        let _ = fs::remove_file(log_file);
    }

    let mut guard = LOG_FILE
        .lock()
        .map_err(|_| "Logger state is poisoned".to_string())?;
    *guard = Some(log_file.to_path_buf());
    Ok(())
}

fn get_config_dir() -> Result<PathBuf, String> {
    #[cfg(not(target_os = "windows"))]
    let config_dir = dirs::home_dir()
        .ok_or("Could not determine home directory")?
        .join(".config")
        .join("mpkg");

    #[cfg(target_os = "windows")]
    let config_dir = dirs::config_dir()
        .ok_or("Could not determine config directory")?
        .join("mpkg");

    Ok(config_dir)
}

fn write_to_log(message: &str) {
    if let Ok(guard) = LOG_FILE.lock() {
        if let Some(ref log_path) = *guard {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let _ = writeln!(file, "[{}] {}", timestamp, message);
            }
        }
    }
}

pub fn debug(message: &str) {
    write_to_log(&format!("DEBUG {}", message));
    if get_verbosity() >= 1 {
        eprintln!("{} {}", "DEBUG:".blue().bold(), message);
    }
}

pub fn step(message: &str) {
    write_to_log(&format!("STEP {}", message));
    if get_verbosity() >= 2 {
        eprintln!("TRACE: {}", message);
    }
}

pub fn warn(message: &str) {
    write_to_log(&format!("WARN {}", message));
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

pub fn error(message: &str) {
    write_to_log(&format!("ERROR {}", message));
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Completion message on stdout next to [`display`] output
pub fn success(message: &str) {
    write_to_log(&format!("SUCCESS {}", message));
    if !is_quiet() {
        println!("{} {}", "\u{2714}".green().bold(), message);
    }
}

/// Progress narration on stdout, silenced by `--quiet`
pub fn display(message: &str) {
    write_to_log(&format!("DISPLAY {}", message));
    if !is_quiet() {
        println!("{}", message);
    }
}

/// Record a finished tool invocation in the log file
pub fn capture_output(command: &str, result: &ProcessResult) {
    write_to_log(&format!(
        "COMMAND: {} (exit code: {})",
        command, result.exit_code
    ));
    if !result.stdout.is_empty() {
        write_to_log(&format!("  STDOUT:\n{}", result.stdout));
    }
    if !result.stderr.is_empty() {
        write_to_log(&format!("  STDERR:\n{}", result.stderr));
    }
}

pub fn get_log_path() -> Option<PathBuf> {
    LOG_FILE.lock().ok().and_then(|guard| guard.clone())
}

/// Start a spinner (skipped in verbose and quiet modes)
pub fn spinner_start(message: &str) {
    write_to_log(&format!("STEP {}", message));
    if get_verbosity() > 0 || is_quiet() {
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());

    if let Ok(mut guard) = SPINNER.lock() {
        *guard = Some(spinner);
    }
}

pub fn spinner_stop() {
    if let Ok(mut guard) = SPINNER.lock() {
        if let Some(spinner) = guard.take() {
            spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_receives_messages_and_tool_output() {
        let Ok(dir) = tempfile::tempdir() else {
            return;
        };
        let log = dir.path().join("logs").join(LOG_FILE_NAME);
        assert!(init_with_log_file(&log, 3, true).is_ok());

        assert!(is_quiet());
        assert_eq!(get_verbosity(), 0);
        assert_eq!(verbosity_to_filter(), "warn");

        display("Building component package");
        success("Built demo.pkg");
        warn("notarization skipped");
        capture_output(
            "pkgbuild",
            &ProcessResult {
                exit_code: 1,
                stderr: "pkgbuild: error".to_string(),
                ..Default::default()
            },
        );

        let content = fs::read_to_string(&log).unwrap_or_default();
        assert!(content.contains("DISPLAY Building component package"));
        assert!(content.contains("SUCCESS Built demo.pkg"));
        assert!(content.contains("WARN notarization skipped"));
        assert!(content.contains("COMMAND: pkgbuild (exit code: 1)"));
        assert!(content.contains("pkgbuild: error"));
        assert_eq!(get_log_path(), Some(log));
    }
}
