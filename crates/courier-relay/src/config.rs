//! Relay configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// TCP port the relay listens on by default
pub const DEFAULT_PORT: u16 = 65432;

/// Default cap on concurrently served connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// Default upper bound on a single request document
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// How `register_key` treats the caller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegistrationPolicy {
    /// Anyone may bind any key to any id; last write wins
    #[default]
    Open,
    /// The registrant must sign the registration with the key being
    /// registered, and an id stays pinned to its first key
    ProofOfPossession,
}

/// Relay server configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Maximum connections served at once; further connections wait
    pub max_connections: usize,
    /// Close a connection that sends nothing for this long
    pub read_timeout: Option<Duration>,
    /// Largest accepted request document in bytes
    pub max_request_size: usize,
    /// Registration policy for the key directory
    pub registration: RegistrationPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            read_timeout: None,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            registration: RegistrationPolicy::Open,
        }
    }
}
