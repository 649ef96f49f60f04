//! Application error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not reach the relay: {0}")]
    Connection(String),

    #[error("Relay error: {0}")]
    Server(String),

    #[error("Unexpected relay response: {0}")]
    UnexpectedResponse(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] courier_core::Error),

    #[error("Relay protocol error: {0}")]
    Relay(#[from] courier_relay::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
