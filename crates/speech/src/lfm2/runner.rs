//! Persistent model runner process.
//!
//! The runner loads the audio LM once and then answers one JSON request per
//! stdin line with one JSON response per stdout line:
//!
//! - startup: the runner prints `{"event":"ready"}` once the model is loaded
//! - `{"op":"generate","system":..,"text":..|"audio_path":..,"max_new_tokens":N}`
//!   → `{"ok":true,"tokens":[[id],[c0,c1,..],..]}`
//! - `{"op":"detokenize_text","ids":[..]}` → `{"ok":true,"text":".."}`
//! - `{"op":"decode_audio","frames":[[..],..]}`
//!   → `{"ok":true,"audio_b64":"..","sample_rate":24000}` (f32 little-endian, mono)
//! - any failure → `{"ok":false,"error":".."}`

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RunnerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub startup_timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RunnerRequest {
    Generate {
        system: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_path: Option<PathBuf>,
        max_new_tokens: u32,
    },
    DetokenizeText {
        ids: Vec<i64>,
    },
    DecodeAudio {
        frames: Vec<Vec<i64>>,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct RunnerResponse {
    #[serde(default)]
    pub ok: bool,
    pub error: Option<String>,
    pub event: Option<String>,
    pub tokens: Option<Vec<Vec<i64>>>,
    pub text: Option<String>,
    pub audio_b64: Option<String>,
    pub sample_rate: Option<u32>,
}

impl RunnerResponse {
    /// Decodes `audio_b64` as little-endian f32 samples.
    pub fn audio_samples(&self) -> anyhow::Result<Vec<f32>> {
        let encoded = self
            .audio_b64
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Runner response carries no audio"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("Invalid audio payload: {}", e))?;
        if bytes.len() % 4 != 0 {
            anyhow::bail!("Audio payload is not a whole number of f32 samples");
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

struct RunnerIo {
    // Held so the child is killed when the runner goes away.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl RunnerIo {
    async fn call(&mut self, request: &RunnerRequest) -> anyhow::Result<RunnerResponse> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.stdin
            .write_all(&line)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write to model runner: {}", e))?;
        self.stdin.flush().await?;

        loop {
            let Some(line) = self.stdout.next_line().await? else {
                anyhow::bail!("Model runner exited");
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response: RunnerResponse = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(_) => {
                    debug!(line, "Model runner output");
                    continue;
                }
            };
            if response.event.is_some() {
                continue;
            }
            if !response.ok {
                anyhow::bail!(
                    "Model runner error: {}",
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
            return Ok(response);
        }
    }
}

/// Handle to a running model process. Requests are served one at a time.
#[derive(Clone)]
pub struct Lfm2Runner {
    io: Arc<Mutex<RunnerIo>>,
}

impl Lfm2Runner {
    /// Spawns the runner and waits for its ready line.
    pub async fn start(command: &RunnerCommand) -> anyhow::Result<Self> {
        info!(program = %command.program, args = ?command.args, "Starting model runner");
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to start model runner '{}': {}", command.program, e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Model runner stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Model runner stdout not captured"))?;
        let mut stdout = BufReader::new(stdout).lines();

        let wait_ready = async {
            while let Some(line) = stdout.next_line().await? {
                match serde_json::from_str::<RunnerResponse>(line.trim()) {
                    Ok(r) if r.event.as_deref() == Some("ready") => return Ok(()),
                    Ok(r) if r.error.is_some() => {
                        anyhow::bail!(
                            "Model runner failed to load: {}",
                            r.error.unwrap_or_default()
                        )
                    }
                    _ => debug!(line = %line, "Model runner output"),
                }
            }
            Err::<(), anyhow::Error>(anyhow::anyhow!("Model runner exited before becoming ready"))
        };

        tokio::time::timeout(command.startup_timeout, wait_ready)
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Model runner not ready within {}s",
                    command.startup_timeout.as_secs()
                )
            })??;

        info!("Model runner ready");
        Ok(Self {
            io: Arc::new(Mutex::new(RunnerIo {
                _child: child,
                stdin,
                stdout,
            })),
        })
    }

    /// Sends one request and waits for its response.
    ///
    /// The exchange runs in its own task so a dropped caller cannot leave a
    /// response unread on the pipe.
    pub async fn call(&self, request: RunnerRequest) -> anyhow::Result<RunnerResponse> {
        let io = Arc::clone(&self.io);
        tokio::spawn(async move {
            let mut io = io.lock().await;
            io.call(&request).await
        })
        .await
        .map_err(|e| anyhow::anyhow!("Model runner task join error: {}", e))?
    }
}
