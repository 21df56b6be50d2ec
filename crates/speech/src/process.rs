use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Failure of a one-shot external process (ffmpeg, piper, espeak-ng).
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("'{program}' is not installed or not executable")]
    Missing { program: String },
    #[error("'{program}' did not finish within {}s", timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },
    #[error("'{program}' failed ({status}): {diagnostic}")]
    Failed {
        program: String,
        status: String,
        diagnostic: String,
    },
    #[error("'{program}' I/O error: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs `program` once, feeding `input` on stdin and collecting all of stdout.
///
/// The child is killed if it outlives `timeout` (or if the returned future is
/// dropped). A non-zero exit yields [`ProcessError::Failed`] carrying stderr cut
/// to `diagnostic_limit` characters.
pub async fn run_process<I, S>(
    program: &str,
    args: I,
    input: Vec<u8>,
    timeout: Duration,
    diagnostic_limit: usize,
) -> Result<Vec<u8>, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();
    let input_len = input.len();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => ProcessError::Missing {
                program: program.to_string(),
            },
            _ => ProcessError::Io {
                program: program.to_string(),
                source: e,
            },
        })?;

    let mut stdin = child.stdin.take().ok_or_else(|| ProcessError::Io {
        program: program.to_string(),
        source: std::io::Error::other("stdin was not captured"),
    })?;

    // Feed stdin concurrently so a child that fills its stdout pipe before
    // draining stdin cannot deadlock us.
    let writer = tokio::spawn(async move {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    });

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| ProcessError::Io {
            program: program.to_string(),
            source: e,
        })?,
        Err(_) => {
            // Dropping the wait future drops the child, which kills it.
            writer.abort();
            debug!(program, timeout_ms = timeout.as_millis() as u64, "External process timed out");
            return Err(ProcessError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
    };

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
            debug!(program, "Process closed stdin before consuming all input");
        }
        Ok(Err(e)) if output.status.success() => {
            return Err(ProcessError::Io {
                program: program.to_string(),
                source: e,
            });
        }
        _ => {}
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProcessError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            diagnostic: truncate_chars(stderr.trim(), diagnostic_limit),
        });
    }

    debug!(
        program,
        input_bytes = input_len,
        output_bytes = output.stdout.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "External process finished"
    );

    Ok(output.stdout)
}

/// Cuts `text` to at most `limit` characters (not bytes).
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
