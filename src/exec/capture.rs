// src/exec/capture.rs

//! Short-lived commands whose output is needed as a value.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::info;

use crate::errors::{DevtaskError, Result};
use crate::exec::runner::RunStatus;
use crate::exec::spec::shell_command;

/// Upper bound on combined stdout + stderr of a captured command.
pub const MAX_CAPTURE_BYTES: usize = 500 * 1024;

/// Run `command_line` through the shell in `cwd` and return stdout followed
/// by stderr.
///
/// A non-zero exit is an error, as is output larger than
/// [`MAX_CAPTURE_BYTES`]; in that case the child is killed as soon as the
/// limit is passed.
pub async fn exec_capture(command_line: &str, cwd: Option<&Path>) -> Result<String> {
    let dir = cwd.unwrap_or(Path::new("."));
    let resolved = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    info!("EXEC[{}]: {}", resolved.display(), command_line);

    let mut cmd = shell_command(command_line);
    cmd.current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| DevtaskError::Launch {
        command: command_line.to_string(),
        cwd: resolved.clone(),
        source,
    })?;

    let captured = match (child.stdout.take(), child.stderr.take()) {
        (Some(stdout), Some(stderr)) => {
            let total = AtomicUsize::new(0);
            tokio::try_join!(
                read_capped(stdout, &total, command_line),
                read_capped(stderr, &total, command_line),
            )
        }
        _ => Err(DevtaskError::IoError(std::io::Error::other(
            "child output pipes were not captured",
        ))),
    };
    let (stdout, stderr) = match captured {
        Ok(streams) => streams,
        Err(e) => {
            // Nobody reads the pipes any more; don't leave the child blocked on them.
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(e);
        }
    };
    let status = child.wait().await?;

    match RunStatus::from_exit(status) {
        RunStatus::Success => {}
        RunStatus::Exited(code) => {
            return Err(DevtaskError::NonZeroExit {
                command: command_line.to_string(),
                cwd: resolved,
                code,
            });
        }
        RunStatus::Signaled(signal) => {
            return Err(DevtaskError::SignalTermination {
                command: command_line.to_string(),
                cwd: resolved,
                signal,
            });
        }
    }

    let mut text = String::from_utf8_lossy(&stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&stderr));
    Ok(text)
}

/// Read a pipe to EOF, failing once both pipes together pass the cap.
async fn read_capped<R>(mut reader: R, total: &AtomicUsize, command_line: &str) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut buf = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(out);
        }
        if total.fetch_add(n, Ordering::Relaxed) + n > MAX_CAPTURE_BYTES {
            return Err(DevtaskError::OutputTooLarge {
                command: command_line.to_string(),
                limit: MAX_CAPTURE_BYTES,
            });
        }
        out.extend_from_slice(&buf[..n]);
    }
}
