//! Relay server - accepts TCP connections and serves requests
//!
//! Each accepted connection gets its own task. A connection carries any
//! number of request/response exchanges and ends when the peer closes it,
//! sends malformed input, or stays silent past the configured read timeout.
//! A semaphore caps how many connections are served at once.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::directory::KeyDirectory;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::framing::JsonStream;
use crate::mailbox::MailboxRelay;

/// The relay server
pub struct RelayServer {
    config: RelayConfig,
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl RelayServer {
    /// Bind the listening socket
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let dispatcher = Dispatcher::new(
            KeyDirectory::new(config.registration),
            MailboxRelay::new(),
        );
        Ok(Self {
            config,
            listener,
            dispatcher,
        })
    }

    /// Actual listening address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn directory(&self) -> &KeyDirectory {
        self.dispatcher.directory()
    }

    pub fn mailboxes(&self) -> &MailboxRelay {
        self.dispatcher.mailboxes()
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        info!(
            "Relay listening on {} (max {} connections)",
            self.local_addr()?,
            self.config.max_connections
        );
        let slots = Arc::new(Semaphore::new(self.config.max_connections.max(1)));

        loop {
            let permit = slots
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Protocol(format!("connection limiter closed: {}", e)))?;

            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let _permit = permit;
                info!("Connected by {}", remote_addr);
                if let Err(e) = serve_connection(stream, &dispatcher, &config).await {
                    warn!("Connection from {} ended with error: {}", remote_addr, e);
                }
                info!("Connection from {} closed", remote_addr);
            });
        }
    }
}

/// Serve one connection until the peer hangs up or misbehaves
async fn serve_connection(
    stream: TcpStream,
    dispatcher: &Dispatcher,
    config: &RelayConfig,
) -> Result<()> {
    let mut conn = JsonStream::new(stream, config.max_request_size);

    loop {
        let next = match config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, conn.read_document())
                .await
                .map_err(|_| Error::Timeout)?,
            None => conn.read_document().await,
        };

        let document = match next? {
            Some(document) => document,
            None => return Ok(()),
        };

        let response = dispatcher.dispatch(document).await;
        conn.write_document(&response).await?;
    }
}
