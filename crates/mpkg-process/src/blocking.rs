use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

use crate::invocation::Invocation;
use crate::result::ProcessResult;

/// Blocking twin of [`crate::run`]
///
/// `wait_with_output` drains stdout and stderr concurrently; stdin is written
/// from a separate thread so a full pipe cannot stall the readers.
pub fn run_blocking(invocation: &Invocation) -> ProcessResult {
    debug!("Running (blocking): {}", invocation);

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(env) = &invocation.env {
        command.envs(env);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to launch {}: {}", invocation.program.display(), e);
            return ProcessResult::launch_failure(&e);
        }
    };

    let writer = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut pipe), Some(text)) => Some(thread::spawn(move || {
            if let Err(e) = pipe.write_all(text.as_bytes()) {
                debug!("stdin write ended early: {}", e);
            }
        })),
        _ => None,
    };

    let output = child.wait_with_output();
    if let Some(writer) = writer {
        let _ = writer.join();
    }

    match output {
        Ok(output) => ProcessResult::from_output(output.status, &output.stdout, &output.stderr),
        Err(e) => {
            warn!("Failed to wait for {}: {}", invocation.program.display(), e);
            ProcessResult::launch_failure(&e)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::result::LAUNCH_FAILURE;

    #[test]
    fn test_blocking_matches_async_contract() {
        let invocation =
            Invocation::new("/bin/sh").args(["-c", "echo out; echo err >&2; exit 4"]);
        let result = run_blocking(&invocation);
        assert_eq!(result.exit_code, 4);
        assert_eq!(result.stdout, "out");
        assert_eq!(result.stderr, "err");
    }

    #[test]
    fn test_blocking_stdin() {
        let result = run_blocking(&Invocation::new("/bin/cat").stdin("line\n"));
        assert_eq!(result.stdout, "line");
    }

    #[test]
    fn test_blocking_launch_failure() {
        let result = run_blocking(&Invocation::new("/nonexistent/mpkg-tool-12345"));
        assert_eq!(result.exit_code, LAUNCH_FAILURE);
    }
}
