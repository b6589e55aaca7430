//! One task per client connection.
//!
//! The task speaks the framed protocol and owns nothing else: every
//! request, including the opening `hello`, is answered by the daemon
//! loop through a [`ClientRequest`]. Between requests the task relays
//! `history_changed` pushes queued for it by the loop; a connection that
//! never subscribes simply never receives any.

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};

use super::state::ConnectionId;

/// A decoded request waiting for the daemon loop's answer.
#[derive(Debug)]
pub struct ClientRequest {
    pub conn_id: ConnectionId,
    pub message: Message,
    pub reply: oneshot::Sender<Message>,
}

/// Sent once when a connection task exits, for whatever reason.
#[derive(Debug)]
pub struct ConnectionClosed(pub ConnectionId);

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("client left before hello")]
    NoHello,
    #[error("first message was not hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    Malformed(#[from] rmp_serde::decode::Error),
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    #[error("daemon loop is gone")]
    DaemonGone,
}

/// What arrived on the socket, already decoded.
enum Incoming {
    Request(Message),
    /// Well-formed frame with a `type` this daemon does not know.
    Unknown { id: u32 },
    Eof,
}

struct Connection {
    id: ConnectionId,
    framed: Framed<UnixStream, FrameCodec>,
    requests: mpsc::UnboundedSender<ClientRequest>,
    pushes: mpsc::UnboundedReceiver<Message>,
}

/// Spawn the task serving `stream`. It reports [`ConnectionClosed`]
/// on `closed` when it ends.
pub fn spawn_connection(
    stream: UnixStream,
    id: ConnectionId,
    requests: mpsc::UnboundedSender<ClientRequest>,
    pushes: mpsc::UnboundedReceiver<Message>,
    closed: mpsc::UnboundedSender<ConnectionClosed>,
) {
    let conn = Connection {
        id,
        framed: Framed::new(stream, FrameCodec::new()),
        requests,
        pushes,
    };
    tokio::spawn(async move {
        if let Err(e) = conn.run().await {
            tracing::debug!(conn_id = ?id, error = %e, "connection ended");
        }
        let _ = closed.send(ConnectionClosed(id));
    });
}

impl Connection {
    async fn run(mut self) -> Result<(), ConnectionError> {
        if !self.handshake().await? {
            return Ok(());
        }

        loop {
            tokio::select! {
                incoming = read(&mut self.framed) => {
                    let reply = match incoming? {
                        Incoming::Request(message) => self.ask(message).await?,
                        Incoming::Unknown { id } => Message::error(id, "unknown_type"),
                        Incoming::Eof => return Ok(()),
                    };
                    self.framed.send(reply).await?;
                }
                push = self.pushes.recv() => match push {
                    Some(notification) => self.framed.send(notification).await?,
                    // The loop dropped our sender: it is shutting down.
                    None => return Ok(()),
                },
            }
        }
    }

    /// Relay the opening `hello` and its ack. Returns whether the
    /// daemon accepted it; a rejected client gets the ack, then EOF.
    async fn handshake(&mut self) -> Result<bool, ConnectionError> {
        let hello = match read(&mut self.framed).await? {
            Incoming::Request(hello @ Message::Hello { .. }) => hello,
            Incoming::Eof => return Err(ConnectionError::NoHello),
            Incoming::Request(_) | Incoming::Unknown { .. } => {
                return Err(ConnectionError::NotHello);
            }
        };
        let ack = self.ask(hello).await?;
        let accepted = !matches!(
            ack,
            Message::HelloAck {
                status: Status::Error,
                ..
            }
        );
        self.framed.send(ack).await?;
        Ok(accepted)
    }

    /// Hand `message` to the daemon loop and wait for its answer.
    async fn ask(&self, message: Message) -> Result<Message, ConnectionError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(ClientRequest {
                conn_id: self.id,
                message,
                reply,
            })
            .map_err(|_| ConnectionError::DaemonGone)?;
        answer.await.map_err(|_| ConnectionError::DaemonGone)
    }
}

async fn read(framed: &mut Framed<UnixStream, FrameCodec>) -> Result<Incoming, ConnectionError> {
    let Some(frame) = framed.next().await else {
        return Ok(Incoming::Eof);
    };
    match decode_frame(&frame?) {
        DecodeResult::Ok(message) => Ok(Incoming::Request(message)),
        DecodeResult::UnknownType(envelope) => Ok(Incoming::Unknown { id: envelope.id }),
        DecodeResult::Malformed(e) => Err(e.into()),
    }
}
