//! Public key directory
//!
//! Maps user ids to the wire form (base64 PEM) of their public keys. The map
//! is shared by every connection task and guarded by a single lock.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use courier_core::protocol::verify_registration;
use courier_core::PublicKey;
use tokio::sync::RwLock;

use crate::config::RegistrationPolicy;
use crate::error::{Error, Result};

/// Shared handle to the key directory
#[derive(Clone, Default)]
pub struct KeyDirectory {
    entries: Arc<RwLock<HashMap<String, String>>>,
    policy: RegistrationPolicy,
}

impl KeyDirectory {
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            policy,
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Bind `public_key` to `user_id`.
    ///
    /// Under [`RegistrationPolicy::Open`] this is an unconditional upsert.
    /// Under [`RegistrationPolicy::ProofOfPossession`] the proof must verify
    /// under the submitted key and an id cannot be moved to a different key.
    pub async fn register(&self, user_id: &str, public_key: &str, proof: Option<&str>) -> Result<()> {
        if user_id.is_empty() || public_key.is_empty() {
            return Err(Error::Registration("Missing user_id or public_key.".to_string()));
        }

        match self.policy {
            RegistrationPolicy::Open => {
                self.entries
                    .write()
                    .await
                    .insert(user_id.to_string(), public_key.to_string());
            }
            RegistrationPolicy::ProofOfPossession => {
                check_proof(user_id, public_key, proof)?;

                let mut entries = self.entries.write().await;
                match entries.get(user_id) {
                    Some(existing) if existing != public_key => {
                        return Err(Error::Registration(format!(
                            "{} is already bound to a different key",
                            user_id
                        )));
                    }
                    Some(_) => {}
                    None => {
                        entries.insert(user_id.to_string(), public_key.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    /// Public key registered for `user_id`
    pub async fn lookup(&self, user_id: &str) -> Result<String> {
        self.entries
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(user_id.to_string()))
    }

    /// Number of registered identities
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn check_proof(user_id: &str, public_key: &str, proof: Option<&str>) -> Result<()> {
    let proof = proof.ok_or_else(|| Error::Registration("proof of possession required".to_string()))?;
    let proof = BASE64
        .decode(proof)
        .map_err(|_| Error::Registration("proof is not base64".to_string()))?;
    let key = PublicKey::from_wire(public_key)
        .map_err(|e| Error::Registration(format!("unusable public key: {}", e)))?;
    verify_registration(user_id, public_key, &proof, &key)
        .map_err(|_| Error::Registration("invalid proof of possession".to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use courier_core::protocol::prove_registration;
    use courier_core::Identity;

    use super::*;

    fn alice() -> &'static Identity {
        static ALICE: OnceLock<Identity> = OnceLock::new();
        ALICE.get_or_init(|| Identity::generate("alice").unwrap())
    }

    fn eve() -> &'static Identity {
        static EVE: OnceLock<Identity> = OnceLock::new();
        EVE.get_or_init(|| Identity::generate("eve").unwrap())
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let dir = KeyDirectory::default();
        dir.register("alice", "a-key", None).await.unwrap();
        assert_eq!(dir.lookup("alice").await.unwrap(), "a-key");
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let dir = KeyDirectory::default();
        dir.register("alice", "k1", None).await.unwrap();
        dir.register("alice", "k2", None).await.unwrap();
        assert_eq!(dir.lookup("alice").await.unwrap(), "k2");
        assert_eq!(dir.len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_unknown() {
        let dir = KeyDirectory::default();
        assert!(matches!(dir.lookup("nobody").await, Err(Error::NotFound(id)) if id == "nobody"));
    }

    #[tokio::test]
    async fn test_empty_fields_refused() {
        let dir = KeyDirectory::default();
        assert!(dir.register("", "k", None).await.is_err());
        assert!(dir.register("alice", "", None).await.is_err());
        assert!(dir.is_empty().await);
    }

    #[tokio::test]
    async fn test_proof_policy_accepts_valid_proof() {
        let dir = KeyDirectory::new(RegistrationPolicy::ProofOfPossession);
        let (wire, proof) = prove_registration(alice()).unwrap();
        let proof = BASE64.encode(proof);

        dir.register("alice", &wire, Some(&proof)).await.unwrap();
        // Re-registering the same key is idempotent
        dir.register("alice", &wire, Some(&proof)).await.unwrap();
        assert_eq!(dir.lookup("alice").await.unwrap(), wire);
    }

    #[tokio::test]
    async fn test_proof_policy_refuses_missing_or_forged_proof() {
        let dir = KeyDirectory::new(RegistrationPolicy::ProofOfPossession);
        let (wire, _) = prove_registration(alice()).unwrap();
        assert!(matches!(
            dir.register("alice", &wire, None).await,
            Err(Error::Registration(_))
        ));

        // Eve's proof does not cover Alice's key
        let (_, eve_proof) = prove_registration(eve()).unwrap();
        assert!(matches!(
            dir.register("alice", &wire, Some(&BASE64.encode(eve_proof))).await,
            Err(Error::Registration(_))
        ));
        assert!(dir.is_empty().await);
    }

    #[tokio::test]
    async fn test_proof_policy_pins_first_key() {
        let dir = KeyDirectory::new(RegistrationPolicy::ProofOfPossession);
        let (wire, proof) = prove_registration(alice()).unwrap();
        dir.register("alice", &wire, Some(&BASE64.encode(proof)))
            .await
            .unwrap();

        // Eve holds her own key but tries to claim the "alice" id with it
        let eve_as_alice = Identity::from_pkcs8_pem("alice", &eve().to_pkcs8_pem().unwrap()).unwrap();
        let (eve_wire, eve_proof) = prove_registration(&eve_as_alice).unwrap();
        assert!(matches!(
            dir.register("alice", &eve_wire, Some(&BASE64.encode(eve_proof))).await,
            Err(Error::Registration(_))
        ));
        assert_eq!(dir.lookup("alice").await.unwrap(), wire);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations() {
        let dir = KeyDirectory::default();
        let mut tasks = Vec::new();
        for worker in 0..16 {
            let dir = dir.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    dir.register(&format!("user-{}-{}", worker, i), "k", None)
                        .await
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(dir.len().await, 16 * 50);
    }
}
