//! Relay client
//!
//! Speaks the relay's JSON protocol. Every operation opens its own TCP
//! connection, sends one request and reads one response.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use courier_core::{Envelope, PublicKey};
use courier_relay::{JsonStream, Request, Response, DEFAULT_PORT};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Error, Result};

/// Relay client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Relay address
    pub server_addr: SocketAddr,
    /// Give up on a request that takes longer than this
    pub io_timeout: Option<Duration>,
    /// Largest accepted response document in bytes
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            io_timeout: Some(Duration::from_secs(30)),
            max_response_size: 16 * 1024 * 1024,
        }
    }
}

/// Client for the relay's four actions
#[derive(Clone, Debug)]
pub struct RelayClient {
    config: ClientConfig,
}

impl RelayClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.config.server_addr
    }

    /// Publish `public_key` (wire form) under `user_id`
    pub async fn register_key(
        &self,
        user_id: &str,
        public_key: &str,
        proof: Option<String>,
    ) -> Result<String> {
        let response = self
            .request(&Request::RegisterKey {
                user_id: user_id.to_string(),
                public_key: public_key.to_string(),
                proof,
            })
            .await?;
        Ok(response.message.unwrap_or_default())
    }

    /// Fetch and parse `target_id`'s public key
    pub async fn get_public_key(&self, target_id: &str) -> Result<PublicKey> {
        let response = self
            .request(&Request::GetPublicKey {
                target_id: target_id.to_string(),
            })
            .await?;
        let wire = response.public_key.ok_or_else(|| {
            Error::UnexpectedResponse("lookup succeeded without a public_key".to_string())
        })?;
        Ok(PublicKey::from_wire(&wire)?)
    }

    /// Hand an envelope to the relay
    pub async fn send_message(&self, envelope: Envelope) -> Result<String> {
        let response = self.request(&Request::SendMessage(envelope)).await?;
        Ok(response.message.unwrap_or_default())
    }

    /// Drain `user_id`'s mailbox
    pub async fn get_messages(&self, user_id: &str) -> Result<Vec<Envelope>> {
        let response = self
            .request(&Request::GetMessages {
                user_id: user_id.to_string(),
            })
            .await?;
        Ok(response.messages.unwrap_or_default())
    }

    /// One request/response exchange on a fresh connection.
    ///
    /// A `{status: error}` answer becomes [`Error::Server`].
    pub async fn request(&self, request: &Request) -> Result<Response> {
        let exchange = self.exchange(request);
        let response = match self.config.io_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| Error::Connection("relay did not answer in time".to_string()))??,
            None => exchange.await?,
        };

        if response.is_success() {
            Ok(response)
        } else {
            Err(Error::Server(
                response
                    .message
                    .unwrap_or_else(|| "unspecified error".to_string()),
            ))
        }
    }

    async fn exchange(&self, request: &Request) -> Result<Response> {
        let addr = self.config.server_addr;
        debug!("{} -> {}", request.action(), addr);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", addr, e)))?;
        let mut conn = JsonStream::new(stream, self.config.max_response_size);

        conn.write_document(request).await.map_err(connection_error)?;
        let document = conn
            .read_document()
            .await
            .map_err(connection_error)?
            .ok_or_else(|| Error::Connection("relay closed the connection without answering".to_string()))?;

        serde_json::from_value(document).map_err(|e| Error::UnexpectedResponse(e.to_string()))
    }
}

fn connection_error(e: courier_relay::Error) -> Error {
    match e {
        courier_relay::Error::Io(io) => Error::Connection(io.to_string()),
        other => Error::Relay(other),
    }
}
