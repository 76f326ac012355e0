use std::process::ExitStatus;

/// Exit code reported when the program could not be started at all
pub const LAUNCH_FAILURE: i32 = -1;

/// Outcome of one external tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessResult {
    pub(crate) fn from_output(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        ProcessResult {
            exit_code: exit_code(status),
            stdout: trim_one_newline(String::from_utf8_lossy(stdout).into_owned()),
            stderr: trim_one_newline(String::from_utf8_lossy(stderr).into_owned()),
            timed_out: false,
        }
    }

    pub(crate) fn launch_failure(error: &std::io::Error) -> Self {
        ProcessResult {
            exit_code: LAUNCH_FAILURE,
            stdout: String::new(),
            stderr: error.to_string(),
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// True when the tool never ran, as opposed to running and failing
    pub fn launch_failed(&self) -> bool {
        self.exit_code == LAUNCH_FAILURE
    }

    /// Best single line to show a user when the tool failed
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => LAUNCH_FAILURE,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(LAUNCH_FAILURE)
}

/// Strip exactly one trailing newline (`\n` or `\r\n`)
pub(crate) fn trim_one_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}
