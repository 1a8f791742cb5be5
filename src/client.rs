//! Terminal chat client
//!
//! Sends the nickname, checks the handshake reply, then relays input
//! lines to the server while echoing server lines to the output.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, Lines};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info};

use crate::error::AppError;

/// Prefix of a handshake rejection line
pub const ERROR_PREFIX: &str = "ERROR:";

/// Server reply to the nickname
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First line was a welcome; the session is active
    Welcome(String),
    /// First line was an `ERROR:` rejection; the server closes next
    Rejected(String),
}

/// Client side of one chat connection
pub struct ChatClient<S> {
    lines: Framed<S, LinesCodec>,
}

impl ChatClient<TcpStream> {
    /// Connect to a chat server
    pub async fn connect(addr: &str) -> Result<Self, AppError> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to {}", addr);
        Ok(Self::new(stream))
    }
}

impl<S> ChatClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            lines: Framed::new(stream, LinesCodec::new()),
        }
    }

    /// Send the nickname and read the server's first line
    pub async fn join(&mut self, nickname: &str) -> Result<JoinOutcome, AppError> {
        self.lines.send(nickname).await?;

        match self.lines.next().await {
            Some(Ok(line)) if line.starts_with(ERROR_PREFIX) => Ok(JoinOutcome::Rejected(line)),
            Some(Ok(line)) => Ok(JoinOutcome::Welcome(line)),
            Some(Err(e)) => Err(e.into()),
            None => Err(AppError::ConnectionClosed),
        }
    }

    /// Relay `input` to the server and server lines to `output`
    ///
    /// Ends on `/exit`, on end of input (which sends `/exit`), or when the
    /// server closes the connection.
    pub async fn run<R, W>(mut self, mut input: Lines<R>, mut output: W) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                line = input.next_line() => match line? {
                    Some(line) => {
                        let exit = line.trim().eq_ignore_ascii_case("/exit");
                        self.lines.send(line).await?;
                        if exit {
                            debug!("Exit requested");
                            break;
                        }
                    }
                    None => {
                        debug!("Input closed, leaving chat");
                        self.lines.send("/exit").await?;
                        break;
                    }
                },
                frame = self.lines.next() => match frame {
                    Some(Ok(line)) => {
                        output.write_all(line.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                        output.flush().await?;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                },
            }
        }

        output.flush().await?;
        Ok(())
    }
}
