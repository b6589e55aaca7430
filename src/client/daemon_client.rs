//! Daemon connection for one-shot CLI commands.
//!
//! Connects to the daemon socket, performs the handshake, and exposes
//! one method per request type. Each CLI invocation performs a single
//! request-response cycle, except `watch`, which subscribes and then
//! reads pushed notifications.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::ipc::codec::LengthPrefixedCodec;
use crate::ipc::protocol::{ConfigDescriptor, EntryDescriptor, Message, PROTOCOL_VERSION, Status};

use super::ClientError;

/// Content and metadata of one history entry.
#[derive(Debug)]
pub struct FetchedEntry {
    pub kind: String,
    pub content: Vec<u8>,
    pub captured_at: u64,
}

pub struct DaemonClient {
    framed: Framed<UnixStream, LengthPrefixedCodec>,
    next_id: u32,
}

impl DaemonClient {
    /// Connect to the daemon at the default socket path.
    pub async fn connect() -> Result<Self, ClientError> {
        let socket_path = crate::ipc::socket_path()
            .ok_or_else(|| ClientError::Daemon("$XDG_RUNTIME_DIR not set".into()))?;
        Self::connect_to(&socket_path).await
    }

    /// Connect to the daemon at `path` and perform the handshake.
    pub async fn connect_to(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).await.map_err(|e| {
            ClientError::Daemon(format!("connect to {} failed: {e}", path.display()))
        })?;
        let mut framed = Framed::new(stream, LengthPrefixedCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
            })
            .await
            .map_err(|e| ClientError::Daemon(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(ClientError::Daemon(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Daemon(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self { framed, next_id: 1 })
    }

    /// List history entries, newest first.
    pub async fn list(&mut self, limit: Option<u32>) -> Result<Vec<EntryDescriptor>, ClientError> {
        let id = self.take_id();
        match self.request("list", Message::List { id, limit }).await? {
            Message::Response { entries, .. } => Ok(entries.unwrap_or_default()),
            other => Err(unexpected("list", &other)),
        }
    }

    /// Fetch the content of the entry at `index`.
    pub async fn get(&mut self, index: u32) -> Result<FetchedEntry, ClientError> {
        let id = self.take_id();
        match self.request("get", Message::Get { id, index }).await? {
            Message::Response {
                kind: Some(kind),
                content: Some(content),
                captured_at: Some(captured_at),
                ..
            } => Ok(FetchedEntry {
                kind,
                content,
                captured_at,
            }),
            other => Err(unexpected("get", &other)),
        }
    }

    /// Put the entry at `index` back on the clipboard.
    pub async fn copy(&mut self, index: u32) -> Result<(), ClientError> {
        let id = self.take_id();
        self.request("copy", Message::Copy { id, index }).await?;
        Ok(())
    }

    pub async fn delete(&mut self, index: u32) -> Result<(), ClientError> {
        let id = self.take_id();
        self.request("delete", Message::Delete { id, index }).await?;
        Ok(())
    }

    pub async fn clear(&mut self) -> Result<(), ClientError> {
        let id = self.take_id();
        self.request("clear", Message::Clear { id }).await?;
        Ok(())
    }

    /// Update settings; with every field `None` this only reads them.
    pub async fn configure(
        &mut self,
        history_limit: Option<u32>,
        expiration: Option<String>,
        time_format: Option<String>,
    ) -> Result<ConfigDescriptor, ClientError> {
        let id = self.take_id();
        let request = Message::Configure {
            id,
            history_limit,
            expiration,
            time_format,
        };
        match self.request("configure", request).await? {
            Message::Response {
                config: Some(config),
                ..
            } => Ok(config),
            other => Err(unexpected("configure", &other)),
        }
    }

    /// Ask the daemon to push `history_changed` notifications.
    pub async fn subscribe(&mut self) -> Result<(), ClientError> {
        let id = self.take_id();
        self.request("subscribe", Message::Subscribe { id }).await?;
        Ok(())
    }

    /// Wait for the next pushed notification and return the new entry
    /// count. `None` when the daemon closes the connection.
    pub async fn next_change(&mut self) -> Result<Option<u32>, ClientError> {
        loop {
            match self.framed.next().await {
                None => return Ok(None),
                Some(Ok(Message::HistoryChanged { count, .. })) => return Ok(Some(count)),
                Some(Ok(other)) => {
                    tracing::debug!(?other, "ignoring unsolicited message");
                }
                Some(Err(e)) => return Err(ClientError::Daemon(format!("receive: {e}"))),
            }
        }
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Send one request and return its ok response. Error responses
    /// become `ClientError::Daemon` carrying the daemon's reason.
    async fn request(&mut self, op: &str, msg: Message) -> Result<Message, ClientError> {
        self.framed
            .send(msg)
            .await
            .map_err(|e| ClientError::Daemon(format!("send {op}: {e}")))?;

        match self.framed.next().await {
            Some(Ok(
                response @ Message::Response {
                    status: Status::Ok, ..
                },
            )) => Ok(response),
            Some(Ok(Message::Response { error, .. })) => Err(ClientError::Daemon(format!(
                "{op} failed: {}",
                error.unwrap_or_default()
            ))),
            Some(Ok(other)) => Err(unexpected(op, &other)),
            Some(Err(e)) => Err(ClientError::Daemon(format!("receive {op}: {e}"))),
            None => Err(ClientError::Daemon(format!(
                "daemon closed the connection during {op}"
            ))),
        }
    }
}

fn unexpected(op: &str, msg: &Message) -> ClientError {
    ClientError::Daemon(format!("unexpected {op} response: {msg:?}"))
}
