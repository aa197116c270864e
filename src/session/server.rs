//! JSON-lines transport for the host protocol.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::orchestrator::Orchestrator;
use super::protocol::{InboundMessage, OutboundMessage};

/// Serve the protocol until `reader` reaches EOF.
///
/// Each inbound line is handled on its own task so a long generation does
/// not block status queries. A single writer task emits outbound messages in
/// the order they were queued. On EOF, in-flight handlers finish and their
/// output is flushed before this returns.
pub async fn serve<R, W>(
    orchestrator: Arc<Orchestrator>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    reader: R,
    writer: W,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let writer_task = tokio::spawn(write_messages(outbound, writer, shutdown_rx));

    let mut lines = reader.lines();
    let mut handlers = JoinSet::new();
    info!("serving protocol on stdio");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match InboundMessage::parse(&line) {
            Ok(message) => {
                let orchestrator = Arc::clone(&orchestrator);
                handlers.spawn(async move { orchestrator.handle(message).await });
            }
            Err(e) => {
                warn!(error = %e, "ignoring unparseable message");
                orchestrator.notify(OutboundMessage::error(format!("Invalid message: {e}")));
            }
        }
        while let Some(finished) = handlers.try_join_next() {
            if let Err(e) = finished {
                warn!(error = %e, "message handler panicked");
            }
        }
    }

    debug!(pending = handlers.len(), "input closed; draining handlers");
    while let Some(finished) = handlers.join_next().await {
        if let Err(e) = finished {
            warn!(error = %e, "message handler panicked");
        }
    }

    // The writer may already be gone after a write error; that error is
    // reported through the join below.
    let _ = shutdown_tx.send(());
    writer_task.await.map_err(io::Error::other)?
}

async fn write_messages<W>(
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    mut writer: W,
    mut shutdown: oneshot::Receiver<()>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            message = outbound.recv() => match message {
                Some(message) => write_line(&mut writer, &message).await?,
                None => break,
            },
            _ = &mut shutdown => {
                while let Ok(message) = outbound.try_recv() {
                    write_line(&mut writer, &message).await?;
                }
                break;
            }
        }
    }
    writer.shutdown().await
}

async fn write_line<W>(writer: &mut W, message: &OutboundMessage) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = message.to_line().map_err(io::Error::other)?;
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
