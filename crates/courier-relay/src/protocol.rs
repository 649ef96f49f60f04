//! Wire protocol for the Courier relay
//!
//! Every exchange is one JSON request document answered by one JSON response
//! document. Requests are tagged by their `action` field.

use courier_core::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request sent to the relay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Publish a public key under a user id
    RegisterKey {
        user_id: String,
        /// base64 of the SPKI PEM
        public_key: String,
        /// base64 registration proof, see `courier_core::protocol::registration`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        proof: Option<String>,
    },

    /// Fetch the public key registered for `target_id`
    GetPublicKey { target_id: String },

    /// Queue an envelope for its recipient
    SendMessage(Envelope),

    /// Drain the caller's mailbox
    GetMessages {
        #[serde(default)]
        user_id: String,
    },
}

/// Why a request document could not be turned into a [`Request`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// `action` missing or not one we serve
    UnknownAction,
    /// A known action with missing or malformed fields
    Invalid(String),
}

impl RequestError {
    /// Text returned to the client in the error response
    pub fn message(&self) -> String {
        match self {
            RequestError::UnknownAction => "Unknown action.".to_string(),
            RequestError::Invalid(message) => message.clone(),
        }
    }
}

impl Request {
    /// Wire name of the action
    pub fn action(&self) -> &'static str {
        match self {
            Request::RegisterKey { .. } => "register_key",
            Request::GetPublicKey { .. } => "get_public_key",
            Request::SendMessage(_) => "send_message",
            Request::GetMessages { .. } => "get_messages",
        }
    }

    /// Interpret an already parsed JSON document
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or(RequestError::UnknownAction)?
            .to_string();

        let missing = match action.as_str() {
            "register_key" => "Missing user_id or public_key.",
            "get_public_key" => "Missing target_id.",
            "send_message" => "Missing recipient_id or message_payload.",
            "get_messages" => "Missing user_id.",
            _ => return Err(RequestError::UnknownAction),
        };

        serde_json::from_value(value).map_err(|e| {
            let detail = e.to_string();
            if detail.starts_with("missing field") {
                RequestError::Invalid(missing.to_string())
            } else {
                RequestError::Invalid(format!("Invalid {} request: {}", action, detail))
            }
        })
    }
}

/// Outcome flag carried by every response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// A relay response. Which optional fields are present depends on the
/// action: `message` for confirmations and errors, `public_key` for lookups,
/// `messages` for mailbox pulls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Envelope>>,
}

impl Response {
    /// `{status: success, message}`
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: Some(message.into()),
            public_key: None,
            messages: None,
        }
    }

    /// `{status: error, message}`
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            public_key: None,
            messages: None,
        }
    }

    /// `{status: success, public_key}`
    pub fn public_key(public_key: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: None,
            public_key: Some(public_key.into()),
            messages: None,
        }
    }

    /// `{status: success, messages}`
    pub fn messages(messages: Vec<Envelope>) -> Self {
        Self {
            status: Status::Success,
            message: None,
            public_key: None,
            messages: Some(messages),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use courier_core::Envelope;
    use serde_json::json;

    /// A structurally valid envelope with meaningless contents
    pub fn opaque_envelope(sender: &str, recipient: &str, tag: u8) -> Envelope {
        serde_json::from_value(json!({
            "sender_id": sender,
            "recipient_id": recipient,
            "message_payload": {
                "iv": "AAAAAAAAAAA=",
                "cipher": "AAAAAAAAAAA=",
                "hash": format!("{:02x}", tag),
                "sig": "c2ln",
            },
            "encrypted_3des_key_payload": {
                "signed_info": "aW5mbw==",
                "encrypted_3des_key": "a2V5",
            },
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::opaque_envelope;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_request_shape() {
        let value = json!({"action": "register_key", "user_id": "alice", "public_key": "UEVN"});
        let request = Request::from_value(value.clone()).unwrap();
        assert_eq!(
            request,
            Request::RegisterKey {
                user_id: "alice".to_string(),
                public_key: "UEVN".to_string(),
                proof: None,
            }
        );
        assert_eq!(serde_json::to_value(&request).unwrap(), value);
    }

    #[test]
    fn test_send_message_is_flat() {
        let envelope = opaque_envelope("alice", "bob", 1);
        let mut value = serde_json::to_value(&envelope).unwrap();
        value["action"] = "send_message".into();

        let request = Request::from_value(value).unwrap();
        assert_eq!(request, Request::SendMessage(envelope));
        assert_eq!(request.action(), "send_message");
    }

    #[test]
    fn test_unknown_or_missing_action() {
        assert_eq!(
            Request::from_value(json!({"action": "delete_everything"})),
            Err(RequestError::UnknownAction)
        );
        assert_eq!(
            Request::from_value(json!({"user_id": "alice"})),
            Err(RequestError::UnknownAction)
        );
        assert_eq!(
            Request::from_value(json!([1, 2, 3])),
            Err(RequestError::UnknownAction)
        );
        assert_eq!(RequestError::UnknownAction.message(), "Unknown action.");
    }

    #[test]
    fn test_missing_fields_named() {
        assert_eq!(
            Request::from_value(json!({"action": "register_key", "user_id": "alice"})),
            Err(RequestError::Invalid("Missing user_id or public_key.".to_string()))
        );
        assert_eq!(
            Request::from_value(json!({"action": "get_public_key"})),
            Err(RequestError::Invalid("Missing target_id.".to_string()))
        );
        assert_eq!(
            Request::from_value(json!({"action": "send_message", "sender_id": "alice"})),
            Err(RequestError::Invalid(
                "Missing recipient_id or message_payload.".to_string()
            ))
        );
    }

    #[test]
    fn test_get_messages_without_user_id() {
        assert_eq!(
            Request::from_value(json!({"action": "get_messages"})).unwrap(),
            Request::GetMessages { user_id: String::new() }
        );
    }

    #[test]
    fn test_malformed_payload_reported() {
        let mut value = serde_json::to_value(opaque_envelope("alice", "bob", 1)).unwrap();
        value["action"] = "send_message".into();
        value["message_payload"]["cipher"] = "%%%".into();

        match Request::from_value(value) {
            Err(RequestError::Invalid(message)) => {
                assert!(message.starts_with("Invalid send_message request"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            serde_json::to_value(Response::ok("done")).unwrap(),
            json!({"status": "success", "message": "done"})
        );
        assert_eq!(
            serde_json::to_value(Response::error("nope")).unwrap(),
            json!({"status": "error", "message": "nope"})
        );
        assert_eq!(
            serde_json::to_value(Response::public_key("UEVN")).unwrap(),
            json!({"status": "success", "public_key": "UEVN"})
        );
        assert_eq!(
            serde_json::to_value(Response::messages(Vec::new())).unwrap(),
            json!({"status": "success", "messages": []})
        );
    }

    #[test]
    fn test_pulled_envelopes_carry_no_action() {
        let response = Response::messages(vec![opaque_envelope("alice", "bob", 7)]);
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["messages"][0].get("action").is_none());
        assert_eq!(value["messages"][0]["message_payload"]["hash"], "07");
    }
}
