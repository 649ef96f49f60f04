//! Request routing
//!
//! Turns one parsed request document into one response. Holds no state of
//! its own beyond handles to the shared directory and mailboxes.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::directory::KeyDirectory;
use crate::error::Error;
use crate::mailbox::MailboxRelay;
use crate::protocol::{Request, Response};

/// Routes requests to the key directory and mailbox relay
#[derive(Clone, Default)]
pub struct Dispatcher {
    directory: KeyDirectory,
    mailboxes: MailboxRelay,
}

impl Dispatcher {
    pub fn new(directory: KeyDirectory, mailboxes: MailboxRelay) -> Self {
        Self {
            directory,
            mailboxes,
        }
    }

    pub fn directory(&self) -> &KeyDirectory {
        &self.directory
    }

    pub fn mailboxes(&self) -> &MailboxRelay {
        &self.mailboxes
    }

    /// Handle a raw request document
    pub async fn dispatch(&self, document: Value) -> Response {
        match Request::from_value(document) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("Rejected request: {}", e.message());
                Response::error(e.message())
            }
        }
    }

    /// Handle a typed request
    pub async fn handle(&self, request: Request) -> Response {
        debug!("Dispatching {}", request.action());
        match request {
            Request::RegisterKey {
                user_id,
                public_key,
                proof,
            } => match self
                .directory
                .register(&user_id, &public_key, proof.as_deref())
                .await
            {
                Ok(()) => {
                    info!("Registered public key for user: {}", user_id);
                    Response::ok(format!("Public key for {} registered.", user_id))
                }
                Err(Error::Registration(reason)) => {
                    warn!("Registration for {} refused: {}", user_id, reason);
                    Response::error(reason)
                }
                Err(e) => Response::error(e.to_string()),
            },

            Request::GetPublicKey { target_id } => match self.directory.lookup(&target_id).await {
                Ok(public_key) => {
                    debug!("Sending public key of user: {}", target_id);
                    Response::public_key(public_key)
                }
                Err(Error::NotFound(_)) => {
                    info!("Public key for user '{}' not found", target_id);
                    Response::error(format!("Public key for '{}' not found.", target_id))
                }
                Err(e) => Response::error(e.to_string()),
            },

            Request::SendMessage(envelope) => {
                let recipient = envelope.recipient_id().to_string();
                if recipient.is_empty() {
                    return Response::error("Missing recipient_id or message_payload.");
                }
                let depth = self.mailboxes.enqueue(&recipient, envelope).await;
                info!(
                    "Envelope queued for user: {} ({} pending)",
                    recipient, depth
                );
                Response::ok("Message sent to queue.")
            }

            Request::GetMessages { user_id } => {
                let messages = self.mailboxes.drain_all(&user_id).await;
                info!("Sending {} messages to user: {}", messages.len(), user_id);
                Response::messages(messages)
            }
        }
    }
}
