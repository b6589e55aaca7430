//! Length-prefixed MessagePack codec for tokio I/O.
//!
//! Framing: `[4 bytes: payload length, big-endian u32][N bytes: MessagePack payload]`
//!
//! Two codecs share the framing helpers below. [`LengthPrefixedCodec`]
//! decodes straight into [`Message`] for the CLI client; the daemon uses
//! [`FrameCodec`] and [`decode_frame`] so that unknown message types can
//! still be answered with their request id.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{MAX_PAYLOAD_SIZE, Message, RawEnvelope};

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload too large: {0} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Pull one complete payload off `src`.
///
/// `pending_len` carries a consumed header across calls when the payload
/// has not fully arrived yet.
fn take_frame(
    pending_len: &mut Option<usize>,
    src: &mut BytesMut,
) -> Result<Option<BytesMut>, CodecError> {
    let payload_len = match *pending_len {
        Some(len) => len,
        None => {
            if src.len() < 4 {
                return Ok(None);
            }
            let len = src.get_u32() as usize;
            if len > MAX_PAYLOAD_SIZE {
                return Err(CodecError::PayloadTooLarge(len));
            }
            *pending_len = Some(len);
            len
        }
    };

    if src.len() < payload_len {
        src.reserve(payload_len - src.len());
        return Ok(None);
    }

    *pending_len = None;
    Ok(Some(src.split_to(payload_len)))
}

/// Serialize `msg` and append it to `dst` as one frame.
fn put_frame(msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
    let payload = rmp_serde::to_vec_named(msg)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    dst.reserve(4 + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.extend_from_slice(&payload);
    Ok(())
}

/// Length-prefixed MessagePack codec yielding decoded [`Message`]s.
#[derive(Debug, Default)]
pub struct LengthPrefixedCodec {
    pending_len: Option<usize>,
}

impl LengthPrefixedCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LengthPrefixedCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match take_frame(&mut self.pending_len, src)? {
            Some(payload) => Ok(Some(rmp_serde::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for LengthPrefixedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(&item, dst)
    }
}

/// Frame-level codec yielding raw payloads for [`decode_frame`].
#[derive(Debug, Default)]
pub struct FrameCodec {
    pending_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        take_frame(&mut self.pending_len, src)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(&item, dst)
    }
}

/// Result of attempting to decode a raw frame into a protocol message.
#[derive(Debug)]
pub enum DecodeResult {
    /// A known message variant.
    Ok(Message),
    /// Unknown type; the envelope carries the id to echo.
    UnknownType(RawEnvelope),
    /// Not even `{type, id}` could be extracted.
    Malformed(rmp_serde::decode::Error),
}

/// Decode a payload as [`Message`], falling back to [`RawEnvelope`].
pub fn decode_frame(payload: &[u8]) -> DecodeResult {
    match rmp_serde::from_slice::<Message>(payload) {
        Ok(msg) => DecodeResult::Ok(msg),
        Err(_) => match rmp_serde::from_slice::<RawEnvelope>(payload) {
            Ok(envelope) => DecodeResult::UnknownType(envelope),
            Err(e) => DecodeResult::Malformed(e),
        },
    }
}
