//! Message dispatch and request handling.
//!
//! No socket I/O. Each handler takes a mutable reference to
//! [`DaemonState`] and returns a response message plus an optional
//! [`SideEffect`] that the daemon loop carries out before replying.
//! Store mutations persist through the store itself.

use crate::history::{
    ClipboardContent, ClipboardEntry, ExpirationPolicy, HistoryConfig, TimeFormat,
};
use crate::ipc::protocol::{
    ConfigDescriptor, EntryDescriptor, MAX_PAYLOAD_SIZE, Message, PROTOCOL_VERSION, Status,
};

use super::state::{ConnectionId, DaemonState};

/// Characters of text shown in a list preview.
const PREVIEW_CHARS: usize = 80;

/// Room left in a frame for the response fields around `content`.
const RESPONSE_OVERHEAD: usize = 1024;

/// Work the daemon loop must perform outside the pure handler.
#[derive(Debug, PartialEq)]
pub enum SideEffect {
    /// Put content back on the OS clipboard. The poller picks the
    /// change up and promotes the entry.
    WriteClipboard(ClipboardContent),
    /// Settings changed and must be persisted.
    Configure(HistoryConfig),
}

/// Dispatch a request message to the appropriate handler.
///
/// Server-originated variants are answered with `unknown_type`.
pub fn handle_message(
    state: &mut DaemonState,
    request: Message,
    connection_id: ConnectionId,
) -> (Message, Option<SideEffect>) {
    match request {
        Message::Hello { id, version } => (handle_hello(id, version), None),
        Message::List { id, limit } => (handle_list(state, id, limit), None),
        Message::Get { id, index } => (handle_get(state, id, index), None),
        Message::Copy { id, index } => handle_copy(state, id, index),
        Message::Delete { id, index } => (handle_delete(state, id, index), None),
        Message::Clear { id } => {
            state.store.clear();
            (Message::ok(id), None)
        }
        Message::Configure {
            id,
            history_limit,
            expiration,
            time_format,
        } => handle_configure(
            state,
            id,
            history_limit,
            expiration.as_deref(),
            time_format.as_deref(),
        ),
        Message::Subscribe { id } => {
            state.subscribe(connection_id);
            (Message::ok(id), None)
        }
        Message::HelloAck { id, .. }
        | Message::HistoryChanged { id, .. }
        | Message::Response { id, .. } => (Message::error(id, "unknown_type"), None),
    }
}

fn handle_hello(id: u32, version: u32) -> Message {
    let error = if id != 0 {
        Some("invalid_hello_id")
    } else if version != PROTOCOL_VERSION {
        Some("version_mismatch")
    } else {
        None
    };
    // hello_ack.id is always 0.
    Message::HelloAck {
        id: 0,
        status: if error.is_some() { Status::Error } else { Status::Ok },
        error: error.map(String::from),
    }
}

fn handle_list(state: &DaemonState, id: u32, limit: Option<u32>) -> Message {
    let take = limit.map_or(usize::MAX, |n| n as usize);
    let entries = state
        .store
        .entries()
        .take(take)
        .enumerate()
        .map(|(index, entry)| describe(index, entry))
        .collect();
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        entries: Some(entries),
        kind: None,
        content: None,
        captured_at: None,
        config: None,
    }
}

fn handle_get(state: &DaemonState, id: u32, index: u32) -> Message {
    let Some(entry) = state.store.get(index as usize) else {
        return Message::error(id, "index_out_of_range");
    };
    if entry.content.byte_len() > MAX_PAYLOAD_SIZE - RESPONSE_OVERHEAD {
        return Message::error(id, "payload_too_large");
    }
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        entries: None,
        kind: Some(entry.content.kind().to_string()),
        content: Some(entry.content.as_bytes().to_vec()),
        captured_at: Some(entry.captured_at),
        config: None,
    }
}

fn handle_copy(state: &DaemonState, id: u32, index: u32) -> (Message, Option<SideEffect>) {
    match state.store.get(index as usize) {
        Some(entry) => (
            Message::ok(id),
            Some(SideEffect::WriteClipboard(entry.content.clone())),
        ),
        None => (Message::error(id, "index_out_of_range"), None),
    }
}

fn handle_delete(state: &mut DaemonState, id: u32, index: u32) -> Message {
    let Some(entry) = state.store.get(index as usize).cloned() else {
        return Message::error(id, "index_out_of_range");
    };
    state.store.delete(&entry);
    Message::ok(id)
}

fn handle_configure(
    state: &mut DaemonState,
    id: u32,
    history_limit: Option<u32>,
    expiration: Option<&str>,
    time_format: Option<&str>,
) -> (Message, Option<SideEffect>) {
    let mut config = state.config();
    match history_limit {
        Some(0) => return (Message::error(id, "invalid_config"), None),
        Some(limit) => config.history_limit = limit as usize,
        None => {}
    }
    if let Some(raw) = expiration {
        match raw.parse::<ExpirationPolicy>() {
            Ok(policy) => config.expiration = policy,
            Err(e) => {
                tracing::debug!(error = %e, "rejected expiration setting");
                return (Message::error(id, "invalid_config"), None);
            }
        }
    }
    if let Some(raw) = time_format {
        match raw.parse::<TimeFormat>() {
            Ok(format) => config.time_format = format,
            Err(e) => {
                tracing::debug!(error = %e, "rejected time format setting");
                return (Message::error(id, "invalid_config"), None);
            }
        }
    }

    let effect = state.set_config(config).then(|| {
        tracing::info!(
            history_limit = config.history_limit,
            expiration = %config.expiration,
            time_format = %config.time_format,
            "settings updated"
        );
        SideEffect::Configure(config)
    });
    let descriptor = ConfigDescriptor {
        history_limit: u32::try_from(config.history_limit).unwrap_or(u32::MAX),
        expiration: config.expiration.to_string(),
        time_format: config.time_format.to_string(),
    };
    let response = Message::Response {
        id,
        status: Status::Ok,
        error: None,
        entries: None,
        kind: None,
        content: None,
        captured_at: None,
        config: Some(descriptor),
    };
    (response, effect)
}

fn describe(index: usize, entry: &ClipboardEntry) -> EntryDescriptor {
    EntryDescriptor {
        index: u32::try_from(index).unwrap_or(u32::MAX),
        kind: entry.content.kind().to_string(),
        preview: entry.content.preview(PREVIEW_CHARS),
        byte_length: u32::try_from(entry.content.byte_len()).unwrap_or(u32::MAX),
        captured_at: entry.captured_at,
    }
}
