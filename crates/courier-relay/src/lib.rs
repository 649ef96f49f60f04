//! Courier Relay - key directory and mailbox server
//!
//! This crate provides:
//! - The JSON request/response wire protocol
//! - Self-delimiting JSON framing over TCP
//! - A shared key directory (user id -> public key)
//! - Per-recipient FIFO mailboxes drained on pull
//! - A request dispatcher and the TCP server that drives it

pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod framing;
pub mod mailbox;
pub mod protocol;
pub mod server;

pub use config::{RegistrationPolicy, RelayConfig, DEFAULT_PORT};
pub use directory::KeyDirectory;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use framing::JsonStream;
pub use mailbox::MailboxRelay;
pub use protocol::{Request, Response, Status};
pub use server::RelayServer;
