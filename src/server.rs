//! NDJSON protocol server.
//!
//! Requests are read one line at a time. Lookups are answered in arrival
//! order; fetches run on their own task so a slow download does not hold up
//! the cursor or the logs. All replies go through a single writer task.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use probewatch_engine::{Coordinator, Transport};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::protocol::{decode, Reply};
use crate::session::Session;

const REPLY_BUFFER: usize = 64;

/// Creates a fresh [`Session`] per client, all sharing one transport.
#[derive(Debug, Clone)]
pub struct Sessions {
    transport: Arc<dyn Transport>,
    separator: String,
    follows_base_url: bool,
    timeout: Duration,
}

impl Sessions {
    pub fn new(transport: Arc<dyn Transport>, separator: impl Into<String>) -> Self {
        Self {
            transport,
            separator: separator.into(),
            follows_base_url: false,
            timeout: Duration::from_secs(10),
        }
    }

    /// Sessions as described by `settings`.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            transport: settings.transport().await?,
            separator: settings.separator.clone(),
            follows_base_url: settings.follows_base_url(),
            timeout: settings.timeout()?,
        })
    }

    pub fn session(&self) -> Session {
        let coordinator =
            Coordinator::new(self.transport.clone()).with_separator(self.separator.clone());
        Session::new(coordinator, self.follows_base_url, self.timeout)
    }
}

/// Serve one client until its input ends.
///
/// Returns once every started request has been answered and the replies
/// are written.
pub async fn serve<R, W>(reader: R, writer: W, session: Session) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(REPLY_BUFFER);
    let writer = tokio::spawn(write_replies(writer, rx));

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut fetches = JoinSet::new();
    let mut result = Ok(());

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                while let Some(joined) = fetches.try_join_next() {
                    if let Err(e) = joined {
                        error!(error = %e, "fetch task failed");
                    }
                }
                let message = line.trim();
                if message.is_empty() {
                    continue;
                }
                match decode(message) {
                    Ok(envelope) if envelope.request.fetches() => {
                        let session = session.clone();
                        let tx = tx.clone();
                        fetches.spawn(async move {
                            send(&tx, session.handle(envelope).await).await;
                        });
                    }
                    Ok(envelope) => send(&tx, session.handle(envelope).await).await,
                    Err(e) => {
                        warn!(error = %e, "rejected message");
                        send(&tx, vec![Reply::error(e.to_string(), None)]).await;
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "read error");
                result = Err(e);
                break;
            }
        }
    }

    while let Some(joined) = fetches.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "fetch task failed");
        }
    }
    drop(tx);

    writer.await.map_err(io::Error::other)??;
    result
}

async fn send(tx: &mpsc::Sender<Reply>, replies: Vec<Reply>) {
    for reply in replies {
        if tx.send(reply).await.is_err() {
            debug!("reply dropped, writer closed");
            return;
        }
    }
}

async fn write_replies<W>(mut writer: W, mut rx: mpsc::Receiver<Reply>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        let line = match reply.encode() {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to encode reply");
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

/// Serve the protocol on stdin/stdout.
pub async fn serve_stdio(sessions: &Sessions) -> Result<()> {
    info!("serving on stdin/stdout");
    serve(tokio::io::stdin(), tokio::io::stdout(), sessions.session())
        .await
        .context("stdio session failed")
}

/// Accept TCP clients forever, one session each.
pub async fn listen(listener: TcpListener, sessions: Sessions) -> Result<()> {
    info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let session = sessions.session();
        debug!(%peer, "client connected");

        tokio::spawn(async move {
            let (reader, writer) = stream.into_split();
            match serve(reader, writer, session).await {
                Ok(()) => debug!(%peer, "client disconnected"),
                Err(e) => warn!(%peer, error = %e, "session ended with error"),
            }
        });
    }
}
