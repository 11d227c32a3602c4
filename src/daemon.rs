//! Request loop over line-delimited JSON.
//!
//! The daemon reads one request line, runs it to completion, writes exactly
//! one response line, and only then reads the next. It stops at end of input
//! or on an interrupt received while idle. A command in flight always
//! completes before the interrupt is observed.

use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ErrorKind, RagError};
use crate::pipeline::RagContext;
use crate::protocol::{ErrorResponse, Response, StartupStatus, parse_line};

/// Lifecycle of the request loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Waiting for the next input line
    Idle,
    /// A command is running
    Processing,
    /// End of input or interrupt
    Stopped,
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    Interrupted,
}

pub struct Daemon {
    context: RagContext,
    state: DaemonState,
    handled: u64,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("state", &self.state)
            .field("handled", &self.handled)
            .finish()
    }
}

impl Daemon {
    pub fn new(context: RagContext) -> Self {
        Self {
            context,
            state: DaemonState::Idle,
            handled: 0,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Requests answered so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn context(&self) -> &RagContext {
        &self.context
    }

    /// Serve until end of input or Ctrl-C.
    pub async fn run<R, W>(&mut self, reader: R, writer: W) -> io::Result<StopReason>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.run_until(reader, writer, async {
            // Without a signal handler only end of input stops the loop
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until end of input or until `shutdown` resolves while idle.
    ///
    /// Only I/O failures end the loop early. A line that is not valid UTF-8
    /// gets a parse error response like any other malformed request.
    pub async fn run_until<R, W, S>(
        &mut self,
        mut reader: R,
        mut writer: W,
        shutdown: S,
    ) -> io::Result<StopReason>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let mut buf = Vec::new();
        tokio::pin!(shutdown);

        let reason = loop {
            self.state = DaemonState::Idle;
            buf.clear();

            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read?,
                _ = &mut shutdown => {
                    tracing::info!(target: "daemon", "interrupted, shutting down");
                    break StopReason::Interrupted;
                }
            };

            if read == 0 {
                tracing::info!(target: "daemon", "end of input, shutting down");
                break StopReason::EndOfInput;
            }

            self.state = DaemonState::Processing;
            let response = match line_text(&buf) {
                Some(line) => self.handle_line(line).await,
                None => {
                    tracing::warn!(target: "daemon", "rejected line: not valid UTF-8");
                    Response::new(
                        ErrorResponse::new(
                            RagError::Parse("line is not valid UTF-8".to_string()).to_string(),
                        ),
                        None,
                    )
                }
            };
            self.handled += 1;

            writer.write_all(response.to_line().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        };

        self.state = DaemonState::Stopped;
        Ok(reason)
    }

    /// Produce the response for one input line. Never fails.
    pub async fn handle_line(&self, line: &str) -> Response {
        let envelope = parse_line(line);

        let result = match envelope.command {
            Ok(command) => {
                let name = command.name();
                tracing::debug!(target: "daemon", "handling {name}");
                self.context.handle(command).await.inspect_err(|e| {
                    tracing::warn!(target: "daemon", "{name} failed: {e}");
                })
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(body) => Response::new(body, envelope.request_id),
            Err(e) => {
                if e.kind() == ErrorKind::Parse {
                    tracing::warn!(target: "daemon", "rejected line: {e}");
                }
                Response::new(
                    ErrorResponse::new(e.to_string()).with_document_id(envelope.document_id),
                    envelope.request_id,
                )
            }
        }
    }
}

/// Line content without its terminator, or `None` when it is not UTF-8.
fn line_text(buf: &[u8]) -> Option<&str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line).ok()
}

/// Write the startup status line.
pub async fn write_status<W>(mut writer: W, status: &StartupStatus) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(status.to_line().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
