//! Messenger - one user's view of the relay
//!
//! Owns the user's identity and turns text into envelopes and envelopes back
//! into text. Envelopes that fail any check are reported, never shown.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use courier_core::protocol::prove_registration;
use courier_core::{Envelope, Identity, PublicKey, RejectionReason};
use tracing::{info, warn};

use crate::client::RelayClient;
use crate::error::{Error, Result};

/// Why an envelope was not delivered to the user
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The directory has no usable key for the claimed sender
    #[error("sender's public key is not available")]
    UnknownSender,

    /// The relay could not be asked for the sender's key
    #[error("could not look up sender's public key: {0}")]
    KeyLookupFailed(String),

    #[error("{0}")]
    Envelope(RejectionReason),
}

impl From<RejectionReason> for Rejection {
    fn from(reason: RejectionReason) -> Self {
        Rejection::Envelope(reason)
    }
}

/// Outcome of opening one pulled envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sender_id: String,
    pub outcome: std::result::Result<String, Rejection>,
}

/// A user's messaging session
pub struct Messenger {
    identity: Identity,
    relay: RelayClient,
}

impl Messenger {
    pub fn new(identity: Identity, relay: RelayClient) -> Self {
        Self { identity, relay }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn relay(&self) -> &RelayClient {
        &self.relay
    }

    /// Publish our public key, with a proof of possession attached
    pub async fn register(&self) -> Result<String> {
        let (wire, proof) = prove_registration(&self.identity)?;
        let message = self
            .relay
            .register_key(self.identity.user_id(), &wire, Some(BASE64.encode(proof)))
            .await?;
        info!("Registered as {}", self.identity.user_id());
        Ok(message)
    }

    /// Encrypt `text` for `recipient_id` and queue it on the relay
    pub async fn send(&self, recipient_id: &str, text: &str) -> Result<String> {
        let recipient_key = self.relay.get_public_key(recipient_id).await?;
        let envelope = Envelope::build(
            &self.identity,
            recipient_id,
            &recipient_key,
            text.as_bytes(),
        )?;
        let message = self.relay.send_message(envelope).await?;
        info!("Sent message to {}", recipient_id);
        Ok(message)
    }

    /// Pull our mailbox and open every envelope in arrival order
    pub async fn check(&self) -> Result<Vec<Delivery>> {
        let envelopes = self.relay.get_messages(self.identity.user_id()).await?;
        let mut sender_keys: HashMap<String, Option<PublicKey>> = HashMap::new();
        let mut deliveries = Vec::with_capacity(envelopes.len());

        for envelope in envelopes {
            let sender_id = envelope.sender_id().to_string();
            let outcome = match self.sender_key(&mut sender_keys, &sender_id).await {
                Ok(key) => self.open(&envelope, key),
                Err(rejection) => Err(rejection),
            };
            if let Err(rejection) = &outcome {
                warn!("Rejected message from {}: {}", sender_id, rejection);
            }
            deliveries.push(Delivery { sender_id, outcome });
        }
        Ok(deliveries)
    }

    /// Sender key for this batch. Only a definite answer (not registered, or
    /// registered but unusable) is cached; a failed lookup is retried for the
    /// next envelope from the same sender.
    async fn sender_key<'a>(
        &self,
        cache: &'a mut HashMap<String, Option<PublicKey>>,
        sender_id: &str,
    ) -> std::result::Result<&'a PublicKey, Rejection> {
        if !cache.contains_key(sender_id) {
            let key = match self.relay.get_public_key(sender_id).await {
                Ok(key) => Some(key),
                Err(e @ (Error::Server(_) | Error::Crypto(_))) => {
                    warn!("No usable public key for {}: {}", sender_id, e);
                    None
                }
                Err(e) => return Err(Rejection::KeyLookupFailed(e.to_string())),
            };
            cache.insert(sender_id.to_string(), key);
        }
        cache
            .get(sender_id)
            .and_then(Option::as_ref)
            .ok_or(Rejection::UnknownSender)
    }

    fn open(&self, envelope: &Envelope, sender_key: &PublicKey) -> std::result::Result<String, Rejection> {
        let plaintext = envelope.open(&self.identity, sender_key)?;
        String::from_utf8(plaintext).map_err(|_| Rejection::Envelope(RejectionReason::DecryptionFailed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use courier_relay::{MailboxRelay, RegistrationPolicy, RelayConfig, RelayServer};

    use super::*;
    use crate::client::ClientConfig;
    use crate::error::Error;

    fn key(slot: usize) -> Identity {
        static KEYS: OnceLock<Vec<String>> = OnceLock::new();
        let pems = KEYS.get_or_init(|| {
            (0..3)
                .map(|_| {
                    Identity::generate("seed")
                        .unwrap()
                        .to_pkcs8_pem()
                        .unwrap()
                        .to_string()
                })
                .collect()
        });
        Identity::from_pkcs8_pem(["alice", "bob", "mallory"][slot], &pems[slot]).unwrap()
    }

    fn alice() -> Identity {
        key(0)
    }

    fn bob() -> Identity {
        key(1)
    }

    fn mallory() -> Identity {
        key(2)
    }

    async fn relay(registration: RegistrationPolicy) -> (RelayClient, MailboxRelay) {
        let server = RelayServer::bind(RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            registration,
            ..RelayConfig::default()
        })
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let mailboxes = server.mailboxes().clone();
        tokio::spawn(server.run());
        let client = RelayClient::new(ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        });
        (client, mailboxes)
    }

    #[tokio::test]
    async fn test_send_and_check() {
        let (client, _) = relay(RegistrationPolicy::Open).await;
        let alice = Messenger::new(alice(), client.clone());
        let bob = Messenger::new(bob(), client);
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        assert_eq!(
            alice.send("bob", "hello").await.unwrap(),
            "Message sent to queue."
        );

        let deliveries = bob.check().await.unwrap();
        assert_eq!(
            deliveries,
            vec![Delivery {
                sender_id: "alice".to_string(),
                outcome: Ok("hello".to_string()),
            }]
        );

        // Drained on first pull
        assert!(bob.check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_arrival_order_preserved() {
        let (client, _) = relay(RegistrationPolicy::Open).await;
        let alice = Messenger::new(alice(), client.clone());
        let bob = Messenger::new(bob(), client);
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        for text in ["one", "two", "three"] {
            alice.send("bob", text).await.unwrap();
        }
        bob.send("bob", "note to self").await.unwrap();

        let texts: Vec<String> = bob
            .check()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.outcome.unwrap())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three", "note to self"]);
    }

    #[tokio::test]
    async fn test_send_to_unregistered_recipient() {
        let (client, mailboxes) = relay(RegistrationPolicy::Open).await;
        let alice = Messenger::new(alice(), client);
        alice.register().await.unwrap();

        assert!(matches!(
            alice.send("nobody", "hi").await,
            Err(Error::Server(_))
        ));
        assert_eq!(mailboxes.mailbox_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_sender_rejected() {
        let (client, mailboxes) = relay(RegistrationPolicy::Open).await;
        let bob = Messenger::new(bob(), client);
        bob.register().await.unwrap();

        // Built offline by a sender who never registered
        let envelope =
            Envelope::build(&alice(), "bob", bob.identity().public_key(), b"hi").unwrap();
        mailboxes.enqueue("bob", envelope).await;

        let deliveries = bob.check().await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].outcome, Err(Rejection::UnknownSender));
    }

    #[tokio::test]
    async fn test_tampered_envelope_rejected() {
        let (client, mailboxes) = relay(RegistrationPolicy::Open).await;
        let alice = Messenger::new(alice(), client.clone());
        let bob = Messenger::new(bob(), client);
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        let envelope =
            Envelope::build(alice.identity(), "bob", bob.identity().public_key(), b"pay 10").unwrap();
        let mut doc = serde_json::to_value(&envelope).unwrap();
        doc["message_payload"]["hash"] = "00".repeat(32).into();
        mailboxes
            .enqueue("bob", serde_json::from_value(doc).unwrap())
            .await;
        mailboxes.enqueue("bob", envelope).await;

        let deliveries = bob.check().await.unwrap();
        assert_eq!(
            deliveries[0].outcome,
            Err(Rejection::Envelope(RejectionReason::IntegrityCompromised))
        );
        // A bad envelope does not stop the rest of the batch
        assert_eq!(deliveries[1].outcome, Ok("pay 10".to_string()));
    }

    #[tokio::test]
    async fn test_impersonation_rejected() {
        let (client, mailboxes) = relay(RegistrationPolicy::Open).await;
        let alice = Messenger::new(alice(), client.clone());
        let bob = Messenger::new(bob(), client);
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        // Mallory signs with her own key but claims to be alice
        let forged = Identity::from_pkcs8_pem("alice", &mallory().to_pkcs8_pem().unwrap()).unwrap();
        let envelope = Envelope::build(&forged, "bob", bob.identity().public_key(), b"hi").unwrap();
        mailboxes.enqueue("bob", envelope).await;

        let deliveries = bob.check().await.unwrap();
        assert_eq!(
            deliveries[0].outcome,
            Err(Rejection::Envelope(RejectionReason::AuthenticityFailed))
        );
    }

    #[tokio::test]
    async fn test_non_utf8_plaintext_rejected() {
        let (client, mailboxes) = relay(RegistrationPolicy::Open).await;
        let alice = Messenger::new(alice(), client.clone());
        let bob = Messenger::new(bob(), client);
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        let envelope =
            Envelope::build(alice.identity(), "bob", bob.identity().public_key(), &[0xff, 0xfe])
                .unwrap();
        mailboxes.enqueue("bob", envelope).await;

        let deliveries = bob.check().await.unwrap();
        assert_eq!(
            deliveries[0].outcome,
            Err(Rejection::Envelope(RejectionReason::DecryptionFailed))
        );
    }

    #[tokio::test]
    async fn test_proof_policy_end_to_end() {
        let (client, _) = relay(RegistrationPolicy::ProofOfPossession).await;
        let alice = Messenger::new(alice(), client.clone());
        let bob = Messenger::new(bob(), client.clone());
        alice.register().await.unwrap();
        bob.register().await.unwrap();

        // Mallory cannot take over bob's id
        let squatter = Messenger::new(
            Identity::from_pkcs8_pem("bob", &mallory().to_pkcs8_pem().unwrap()).unwrap(),
            client,
        );
        assert!(matches!(squatter.register().await, Err(Error::Server(_))));

        alice.send("bob", "still you?").await.unwrap();
        let deliveries = bob.check().await.unwrap();
        assert_eq!(deliveries[0].outcome, Ok("still you?".to_string()));
    }

    /// Relay that hands out `envelopes` on the first connection and then
    /// hangs up on every later one without answering.
    async fn flaky_relay(envelopes: Vec<Envelope>) -> RelayClient {
        use courier_relay::{JsonStream, Response};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = JsonStream::new(stream, 1024 * 1024);
            conn.read_document().await.unwrap();
            conn.write_document(&Response::messages(envelopes))
                .await
                .unwrap();
            drop(conn);
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });
        RelayClient::new(ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        })
    }

    #[tokio::test]
    async fn test_lookup_outage_is_not_unknown_sender() {
        let bob_identity = bob();
        let envelopes = vec![
            Envelope::build(&alice(), "bob", bob_identity.public_key(), b"one").unwrap(),
            Envelope::build(&alice(), "bob", bob_identity.public_key(), b"two").unwrap(),
        ];
        let bob = Messenger::new(bob_identity, flaky_relay(envelopes).await);

        let deliveries = bob.check().await.unwrap();
        assert_eq!(deliveries.len(), 2);
        for delivery in deliveries {
            assert_eq!(delivery.sender_id, "alice");
            assert!(matches!(
                delivery.outcome,
                Err(Rejection::KeyLookupFailed(_))
            ));
        }
    }
}
