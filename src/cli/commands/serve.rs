//! Serve command - the stdio request daemon.

use tokio::io::{AsyncWrite, BufReader};

use crate::config::Settings;
use crate::daemon::{Daemon, StopReason, write_status};
use crate::protocol::StartupStatus;

/// Report a startup failure on stdout in protocol form.
pub async fn report_startup_failure(message: String) {
    report_startup_failure_to(tokio::io::stdout(), message).await;
}

/// Write the error status line to `writer`. A failed write is logged.
pub async fn report_startup_failure_to<W>(writer: W, message: String)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = write_status(writer, &StartupStatus::Error { message }).await {
        tracing::error!(target: "daemon", "failed to write startup status: {e}");
    }
}

/// Run the serve command.
///
/// Emits the startup status line, then serves stdin until end of input or
/// interrupt.
pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let context = match super::load_context(settings).await {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(target: "daemon", "startup failed: {e}");
            report_startup_failure(e.to_string()).await;
            return Err(e.into());
        }
    };

    let mut stdout = tokio::io::stdout();
    write_status(&mut stdout, &StartupStatus::Ready).await?;
    tracing::info!(target: "daemon", "ready: {context:?}");

    let mut daemon = Daemon::new(context);
    let reason = daemon
        .run(BufReader::new(tokio::io::stdin()), stdout)
        .await?;

    match reason {
        StopReason::EndOfInput => tracing::info!(
            target: "daemon",
            "stopped after {} requests (end of input)",
            daemon.handled()
        ),
        StopReason::Interrupted => tracing::info!(
            target: "daemon",
            "stopped after {} requests (interrupted)",
            daemon.handled()
        ),
    }
    Ok(())
}
