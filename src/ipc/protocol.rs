//! Wire protocol message types for daemon IPC.
//!
//! All messages are MessagePack-encoded maps with at minimum `type` and
//! `id` fields. Indexes address the history newest-first (0 = most
//! recent) as of the moment the daemon handles the request.

use serde::{Deserialize, Serialize};

/// All wire protocol messages.
///
/// Serialized as a tagged union on the `type` field via MessagePack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32 },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- History queries --
    #[serde(rename = "list")]
    List {
        id: u32,
        #[serde(default)]
        limit: Option<u32>,
    },

    #[serde(rename = "get")]
    Get { id: u32, index: u32 },

    // -- History mutations --
    /// Write the entry back to the OS clipboard. The poller then sees
    /// the change and promotes the entry to the front.
    #[serde(rename = "copy")]
    Copy { id: u32, index: u32 },

    #[serde(rename = "delete")]
    Delete { id: u32, index: u32 },

    #[serde(rename = "clear")]
    Clear { id: u32 },

    // -- Settings --
    /// Update settings. Absent fields are left unchanged; with all
    /// absent this is a pure query.
    #[serde(rename = "configure")]
    Configure {
        id: u32,
        #[serde(default)]
        history_limit: Option<u32>,
        #[serde(default)]
        expiration: Option<String>,
        /// Capture-time display pattern, e.g. `yyyy-MM-dd HH:mm`.
        #[serde(default)]
        time_format: Option<String>,
    },

    // -- Observation --
    #[serde(rename = "subscribe")]
    Subscribe { id: u32 },

    /// Unsolicited (daemon → subscriber) after every history change.
    #[serde(rename = "history_changed")]
    HistoryChanged { id: u32, count: u32 },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        // -- List --
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entries: Option<Vec<EntryDescriptor>>,
        // -- Get --
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
        content: Option<Vec<u8>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        captured_at: Option<u64>,
        // -- Configure --
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<ConfigDescriptor>,
    },
}

impl Message {
    /// Bare success response.
    pub fn ok(id: u32) -> Self {
        Message::Response {
            id,
            status: Status::Ok,
            error: None,
            entries: None,
            kind: None,
            content: None,
            captured_at: None,
            config: None,
        }
    }

    /// Error response carrying a machine-readable reason.
    pub fn error(id: u32, reason: &str) -> Self {
        Message::Response {
            id,
            status: Status::Error,
            error: Some(reason.to_string()),
            entries: None,
            kind: None,
            content: None,
            captured_at: None,
            config: None,
        }
    }

    /// Request id, for echoing in responses.
    pub fn id(&self) -> u32 {
        match self {
            Message::Hello { id, .. }
            | Message::HelloAck { id, .. }
            | Message::List { id, .. }
            | Message::Get { id, .. }
            | Message::Copy { id, .. }
            | Message::Delete { id, .. }
            | Message::Clear { id }
            | Message::Configure { id, .. }
            | Message::Subscribe { id }
            | Message::HistoryChanged { id, .. }
            | Message::Response { id, .. } => *id,
        }
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Entry summary returned in list responses (no payload).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryDescriptor {
    pub index: u32,
    /// `text` or `image`.
    pub kind: String,
    /// First line of text or an image size summary.
    pub preview: String,
    pub byte_length: u32,
    /// Unix epoch millis at capture.
    pub captured_at: u64,
}

/// Effective settings returned by configure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigDescriptor {
    pub history_limit: u32,
    pub expiration: String,
    pub time_format: String,
}

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages.
///
/// Used by the daemon as a fallback when [`Message`] deserialization
/// fails (e.g., unknown `type` tag), so the request `id` can be echoed
/// in the error response.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Consumed by serde for structural matching; not read by daemon code.
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub msg_type: String,
    pub id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &Message) -> Message {
        let encoded = rmp_serde::to_vec_named(msg).unwrap();
        rmp_serde::from_slice(&encoded).unwrap()
    }

    #[test]
    fn hello_round_trip() {
        let msg = Message::Hello {
            id: 0,
            version: PROTOCOL_VERSION,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn hello_ack_error_round_trip() {
        let msg = Message::HelloAck {
            id: 0,
            status: Status::Error,
            error: Some("version_mismatch".into()),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn list_without_limit_defaults_to_none() {
        #[derive(Serialize)]
        struct BareList {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let encoded = rmp_serde::to_vec_named(&BareList {
            msg_type: "list",
            id: 3,
        })
        .unwrap();
        let decoded: Message = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(decoded, Message::List { id: 3, limit: None });
    }

    #[test]
    fn configure_partial_fields() {
        let msg = Message::Configure {
            id: 4,
            history_limit: None,
            expiration: Some("day".into()),
            time_format: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn response_with_entries_round_trip() {
        let msg = Message::Response {
            id: 7,
            status: Status::Ok,
            error: None,
            entries: Some(vec![EntryDescriptor {
                index: 0,
                kind: "text".into(),
                preview: "hello".into(),
                byte_length: 5,
                captured_at: 1_700_000_000_000,
            }]),
            kind: None,
            content: None,
            captured_at: None,
            config: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn response_content_is_binary() {
        let msg = Message::Response {
            id: 1,
            status: Status::Ok,
            error: None,
            entries: None,
            kind: Some("image".into()),
            content: Some((0..=255).collect()),
            captured_at: Some(42),
            config: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn ok_response_omits_optional_fields() {
        let encoded = rmp_serde::to_vec_named(&Message::ok(9)).unwrap();
        let needle = b"entries";
        assert!(!encoded.windows(needle.len()).any(|w| w == needle));
        assert_eq!(round_trip(&Message::ok(9)), Message::ok(9));
    }

    #[test]
    fn error_helper_sets_reason() {
        match Message::error(5, "index_out_of_range") {
            Message::Response { id, status, error, .. } => {
                assert_eq!(id, 5);
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("index_out_of_range"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn id_accessor_covers_variants() {
        assert_eq!(Message::Clear { id: 11 }.id(), 11);
        assert_eq!(Message::HistoryChanged { id: 0, count: 3 }.id(), 0);
        assert_eq!(Message::ok(12).id(), 12);
    }

    #[test]
    fn unknown_type_yields_envelope() {
        #[derive(Serialize)]
        struct Unknown {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
        }
        let encoded = rmp_serde::to_vec_named(&Unknown {
            msg_type: "teleport",
            id: 99,
        })
        .unwrap();
        assert!(rmp_serde::from_slice::<Message>(&encoded).is_err());
        let env: RawEnvelope = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(env.id, 99);
        assert_eq!(env.msg_type, "teleport");
    }
}
