//! Subprocess transport speaking newline-delimited JSON over stdio.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::debug;

use super::{MAX_MESSAGE_SIZE, line_error};
use crate::error::{Error, Result};

/// How long a server gets to exit on its own after stdin closes.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Handle to a spawned server process.
pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<FramedRead<ChildStdout, LinesCodec>>,
}

impl StdioTransport {
    /// Spawn `command` with the parent environment plus `env` overrides.
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        debug!(command, pid = ?child.id(), "spawned server process");

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(FramedRead::new(
                stdout,
                LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE),
            )),
        })
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(message.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Next non-blank line. A line is rejected as soon as it outgrows
    /// [`MAX_MESSAGE_SIZE`], before the newline arrives.
    pub async fn recv(&self) -> Result<String> {
        let mut stdout = self.stdout.lock().await;

        loop {
            let line = stdout
                .next()
                .await
                .ok_or(Error::ServerExited)?
                .map_err(line_error)?;

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
    }

    /// Close stdin, give the process a moment to exit, then kill it.
    pub async fn close(self) -> Result<()> {
        let Self { child, stdin, stdout } = self;
        drop(stdin);
        drop(stdout);

        let mut child = child.into_inner();
        let exited = tokio::time::timeout(EXIT_GRACE, child.wait()).await;
        match exited {
            Ok(status) => {
                let status = status?;
                debug!(%status, "server process exited");
            }
            Err(_) => {
                child.kill().await?;
                debug!("server process killed");
            }
        }
        Ok(())
    }
}
