//! TCP connection handler
//!
//! Frames the socket into text lines, feeds inbound lines to the
//! connection's `Dispatcher` and writes out both the dispatcher's direct
//! replies and whatever the router drops into the session mailbox.

use std::io;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::router::Router;
use crate::types::ConnectionId;

/// Upper bound on flushing the last lines to a peer that stopped reading
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle an accepted TCP connection
///
/// Runs until the client leaves, the transport fails or `shutdown` is
/// cancelled. The session is always cleaned up before this returns.
pub async fn handle_connection(
    stream: TcpStream,
    router: Router,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let id = ConnectionId::new();
    let span = info_span!("connection", id = %id, peer = %peer_addr);

    serve_lines(stream, id, router, config, shutdown)
        .instrument(span)
        .await
}

/// Run the chat protocol over any byte stream
pub async fn serve_lines<S>(
    stream: S,
    id: ConnectionId,
    router: Router,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Client connected");

    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(config.max_line_length));

    // Router -> client mailbox, handed to the session on join
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.mailbox_capacity);
    let mut dispatcher = Dispatcher::new(id, router, msg_tx, config.max_nickname_len);

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Server shutdown, closing connection");
                break Ok(());
            }
            frame = lines.next() => match frame {
                Some(Ok(line)) => {
                    let replies = dispatcher.handle_line(&line);
                    match write_until_cancelled(&mut lines, replies, &shutdown).await {
                        Some(Ok(())) => {}
                        Some(Err(e)) => break Err(e),
                        None => break Ok(()),
                    }
                    if dispatcher.is_terminated() {
                        break Ok(());
                    }
                }
                Some(Err(e)) => {
                    // the framed stream does not resume after a decode error
                    if let Some(reason) = decode_failure(&e, config.max_line_length) {
                        warn!("{}, closing", reason);
                        let notice = vec![ServerMessage::error(reason)];
                        if let Some(Err(write_err)) =
                            write_until_cancelled(&mut lines, notice, &shutdown).await
                        {
                            debug!("Failed to report bad line: {}", write_err);
                        }
                    }
                    break Err(e.into());
                }
                None => {
                    debug!("Client closed connection");
                    break Ok(());
                }
            },
            Some(msg) = msg_rx.recv() => {
                match write_until_cancelled(&mut lines, vec![msg], &shutdown).await {
                    Some(Ok(())) => {}
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                }
            }
        }
    };

    dispatcher.terminate();

    // Flush and shut down the write half; the peer may already be gone
    match timeout(CLOSE_TIMEOUT, SinkExt::<String>::close(&mut lines)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Error closing connection: {}", e),
        Err(_) => debug!("Peer not reading, dropping unsent lines"),
    }

    info!("Client disconnected");
    result
}

/// Client-facing reason for a line the codec refused, if it has one
fn decode_failure(err: &LinesCodecError, max_line_length: usize) -> Option<String> {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            Some(format!("Line too long (limit {} bytes)", max_line_length))
        }
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            Some("Line is not valid UTF-8".to_string())
        }
        _ => None,
    }
}

/// Write `replies`, giving up if `shutdown` fires first
///
/// `None` means the server is shutting down. A peer that never reads
/// keeps the write pending, so the caller must not wait on it alone.
async fn write_until_cancelled<S>(
    lines: &mut Framed<S, LinesCodec>,
    replies: Vec<ServerMessage>,
    shutdown: &CancellationToken,
) -> Option<Result<(), AppError>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::select! {
        _ = shutdown.cancelled() => {
            debug!("Server shutdown during write, closing connection");
            None
        }
        result = write_lines(lines, replies) => Some(result),
    }
}

async fn write_lines<S>(
    lines: &mut Framed<S, LinesCodec>,
    replies: Vec<ServerMessage>,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for reply in replies {
        lines.feed(reply.to_string()).await?;
    }
    SinkExt::<String>::flush(lines).await?;
    Ok(())
}
