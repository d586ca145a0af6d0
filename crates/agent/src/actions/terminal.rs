//! Long-lived bash session
//!
//! Each command is followed by a printed end marker carrying its exit
//! status, so output can be read back without closing the shell. State
//! such as `cd` and exported variables persists between commands.

use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;
use uuid::Uuid;

/// Bytes of a line always kept, enough for the end marker and status
const MARKER_ROOM: usize = 128;

/// Captured output of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Interleaved stdout and stderr, up to the capture limit
    pub output: String,
    /// Bytes dropped past the capture limit
    pub truncated: usize,
    /// `None` when the shell exited before reporting a status
    pub exit_code: Option<i32>,
}

pub struct TerminalSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl TerminalSession {
    /// Start `bash` in `workspace` with stderr folded into stdout
    pub async fn spawn(workspace: &Path) -> io::Result<Self> {
        let mut child = Command::new("bash")
            .arg("--noprofile")
            .arg("--norc")
            .current_dir(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "shell stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "shell stdout unavailable"))?;

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };
        session.send("exec 2>&1\n").await?;
        debug!("◆ Shell session started in {:?}", workspace);
        Ok(session)
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Run `command` and read until its end marker.
    ///
    /// At most `limit` bytes of output are kept. The command's stdin is
    /// `/dev/null` so it cannot swallow the marker line.
    pub async fn run(&mut self, command: &str, limit: usize) -> io::Result<CommandOutput> {
        let marker = format!("__TAGLOOP_END_{}__", Uuid::new_v4().simple());
        let script = format!(
            "{{\n{}\n}} < /dev/null\nprintf '\\n%s %d\\n' '{}' \"$?\"\n",
            command, marker
        );
        self.send(&script).await?;

        let mut capture = Capture::new(limit);
        let line_limit = limit.max(MARKER_ROOM);
        // The marker printf starts with a newline; the last line is held
        // back so that separator can be dropped.
        let mut pending: Option<Vec<u8>> = None;
        loop {
            let mut line = Vec::new();
            let (read, dropped) = self.read_line(&mut line, line_limit).await?;
            capture.truncated += dropped;
            if read == 0 {
                if let Some(last) = pending.take() {
                    capture.push(&last);
                }
                return Ok(capture.finish(None));
            }
            let status = String::from_utf8_lossy(&line)
                .trim_end()
                .strip_prefix(marker.as_str())
                .map(|status| status.trim().to_string());
            if let Some(status) = status {
                let exit_code = status.parse().ok();
                if let Some(last) = pending.take().filter(|last| last.as_slice() != b"\n") {
                    capture.push(&last);
                }
                return Ok(capture.finish(exit_code));
            }
            if let Some(previous) = pending.replace(line) {
                capture.push(&previous);
            }
        }
    }

    /// Read one line into `line`, storing at most `max` bytes of it.
    ///
    /// Returns the bytes consumed and how many of them were dropped.
    async fn read_line(&mut self, line: &mut Vec<u8>, max: usize) -> io::Result<(usize, usize)> {
        let mut read = 0;
        let mut dropped = 0;
        loop {
            let available = self.stdout.fill_buf().await?;
            if available.is_empty() {
                return Ok((read, dropped));
            }
            let (used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(newline) => (newline + 1, true),
                None => (available.len(), false),
            };
            let keep = max.saturating_sub(line.len()).min(used);
            line.extend_from_slice(&available[..keep]);
            dropped += used - keep;
            read += used;
            self.stdout.consume(used);
            if done {
                return Ok((read, dropped));
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("◆ Shell already gone: {}", e);
        }
    }

    async fn send(&mut self, text: &str) -> io::Result<()> {
        self.stdin.write_all(text.as_bytes()).await?;
        self.stdin.flush().await
    }
}

struct Capture {
    output: Vec<u8>,
    truncated: usize,
    limit: usize,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            output: Vec::new(),
            truncated: 0,
            limit,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let keep = self.limit.saturating_sub(self.output.len()).min(bytes.len());
        self.output.extend_from_slice(&bytes[..keep]);
        self.truncated += bytes.len() - keep;
    }

    fn finish(self, exit_code: Option<i32>) -> CommandOutput {
        CommandOutput {
            output: String::from_utf8_lossy(&self.output).trim_end().to_string(),
            truncated: self.truncated,
            exit_code,
        }
    }
}
