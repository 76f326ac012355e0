use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::invocation::Invocation;
use crate::result::{ProcessResult, LAUNCH_FAILURE};

/// Seam between the build pipeline and the tools it drives
///
/// The system implementation launches real processes; tests substitute a
/// scripted runner so pipeline branching can be checked without Apple tools.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> ProcessResult;
}

/// Runs invocations as real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> ProcessResult {
        run(invocation).await
    }
}

/// Run a tool to completion and capture its output
///
/// stdout and stderr are drained by two independent tasks; both are joined
/// before the exit status is awaited, so the status is only read once all
/// output has been observed. stdin, when given, is fed from a third task and
/// closed afterwards.
pub async fn run(invocation: &Invocation) -> ProcessResult {
    debug!("Running: {}", invocation);

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

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

    let stdin_task = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut pipe), Some(text)) => Some(tokio::spawn(async move {
            // A tool may exit without reading its input; the broken pipe is not our failure.
            if let Err(e) = pipe.write_all(text.as_bytes()).await {
                debug!("stdin write ended early: {}", e);
            }
        })),
        _ => None,
    };

    let stdout_task = spawn_reader(child.stdout.take());
    let stderr_task = spawn_reader(child.stderr.take());
    let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);
    let stdout = stdout.unwrap_or_default();
    let stderr = stderr.unwrap_or_default();

    if let Some(task) = stdin_task {
        let _ = task.await;
    }

    match child.wait().await {
        Ok(status) => {
            let result = ProcessResult::from_output(status, &stdout, &stderr);
            debug!(
                "{} exited with {}",
                invocation.program_name(),
                result.exit_code
            );
            result
        }
        Err(e) => {
            warn!("Failed to wait for {}: {}", invocation.program.display(), e);
            ProcessResult {
                exit_code: LAUNCH_FAILURE,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: e.to_string(),
                timed_out: false,
            }
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buffer).await {
                debug!("Output stream closed with error: {}", e);
            }
        }
        buffer
    })
}
