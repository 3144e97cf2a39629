//! # Protocol Frames
//!
//! The envelope around an encoded argument buffer as it crosses a transport.
//!
//! Three shapes travel between a host and a session:
//! - `Signal`: fire-and-forget, no reply.
//! - `Call`: expects exactly one `Reply` with the same `seq`.
//! - `Reply`: either the encoded return value or an error message.
//!
//! Each frame is a named variant wrapping a key/value map. Argument and return
//! values stay opaque `Bytes` blobs here; the codec decodes them separately.
//!
//! ## Invariants
//! - **Panic Safety**: all decoding paths return `Result`.
//! - **Forward Compatibility**: unknown header fields are skipped.

use flexpack::Decoder;
use flexpack::Encoder;

use crate::error::Error;
use crate::error::Result;

/// A fire-and-forget method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFrame<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub args: &'a [u8],
}

/// A method call that expects a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame<'a> {
    pub seq: u64,
    pub path: &'a str,
    pub method: &'a str,
    pub args: &'a [u8],
}

/// The answer to a `CallFrame` with the same `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame<'a> {
    pub seq: u64,
    /// - `Ok(bytes)`: the encoded return value.
    /// - `Err(message)`: the call failed on the remote side.
    pub status: std::result::Result<&'a [u8], &'a str>,
}

/// Top-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    Signal(SignalFrame<'a>),
    Call(CallFrame<'a>),
    Reply(ReplyFrame<'a>),
}

impl<'a> Frame<'a> {
    /// Encode this frame into the encoder.
    pub fn encode(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            Frame::Signal(f) => {
                enc.variant_begin("Signal")?;
                enc.map_begin()?;
                write_map_str(enc, "path", f.path)?;
                write_map_str(enc, "method", f.method)?;
                write_map_bytes(enc, "args", f.args)?;
            }
            Frame::Call(f) => {
                enc.variant_begin("Call")?;
                enc.map_begin()?;
                write_map_u64(enc, "seq", f.seq)?;
                write_map_str(enc, "path", f.path)?;
                write_map_str(enc, "method", f.method)?;
                write_map_bytes(enc, "args", f.args)?;
            }
            Frame::Reply(f) => {
                enc.variant_begin("Reply")?;
                enc.map_begin()?;
                write_map_u64(enc, "seq", f.seq)?;
                match f.status {
                    Ok(bytes) => write_map_bytes(enc, "ok", bytes)?,
                    Err(message) => write_map_str(enc, "err", message)?,
                }
            }
        }
        enc.map_end()?;
        enc.variant_end()?;
        Ok(())
    }

    /// Encode this frame into a standalone byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut enc = Encoder::new();
        self.encode(&mut enc)?;
        Ok(enc.into_bytes()?)
    }

    /// Decode a frame from raw bytes.
    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        let mut dec = Decoder::new(bytes);
        let (msg_type, mut body) = dec.variant()?;
        if !matches!(msg_type, "Signal" | "Call" | "Reply") {
            return Err(Error::UnknownVariant(format!("Top-level frame: {}", msg_type)));
        }
        let header = Header::read(&mut body)?;

        match msg_type {
            "Signal" => Ok(Frame::Signal(SignalFrame {
                path: required(header.path, "path")?,
                method: required(header.method, "method")?,
                args: required(header.args, "args")?,
            })),
            "Call" => Ok(Frame::Call(CallFrame {
                seq: required(header.seq, "seq")?,
                path: required(header.path, "path")?,
                method: required(header.method, "method")?,
                args: required(header.args, "args")?,
            })),
            "Reply" => {
                let seq = required(header.seq, "seq")?;
                let status = match (header.ok, header.err) {
                    (Some(bytes), None) => Ok(bytes),
                    (None, Some(message)) => Err(message),
                    (None, None) => return Err(Error::ProtocolViolation("Missing reply status".into())),
                    (Some(_), Some(_)) => return Err(Error::ProtocolViolation("Reply has both ok and err".into())),
                };
                Ok(Frame::Reply(ReplyFrame { seq, status }))
            }
            _ => Err(Error::UnknownVariant(format!("Top-level frame: {}", msg_type))),
        }
    }
}

/// Every header field any frame may carry.
#[derive(Default)]
struct Header<'a> {
    seq: Option<u64>,
    path: Option<&'a str>,
    method: Option<&'a str>,
    args: Option<&'a [u8]>,
    ok: Option<&'a [u8]>,
    err: Option<&'a str>,
}

impl<'a> Header<'a> {
    fn read(body: &mut Decoder<'a>) -> Result<Self> {
        let mut header = Header::default();
        let mut map = body.map()?;

        while let Some((key, mut val)) = map.next()? {
            match key {
                "seq" => header.seq = Some(val.u64()?),
                "path" => header.path = Some(val.str()?),
                "method" => header.method = Some(val.str()?),
                "args" => header.args = Some(val.bytes()?),
                "ok" => header.ok = Some(val.bytes()?),
                "err" => header.err = Some(val.str()?),
                // Values are already delimited by the map iterator.
                _ => {}
            }
        }
        Ok(header)
    }
}

fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| Error::ProtocolViolation(format!("Missing {}", name)))
}

/// Reads only the sequence number of a `Call` or `Reply`.
///
/// Lets a transport route a reply even when the rest of the frame is unusable.
pub fn decode_seq(bytes: &[u8]) -> Result<u64> {
    let mut dec = Decoder::new(bytes);
    let (_, mut body) = dec.variant()?;
    let mut map = body.map()?;

    while let Some((key, mut val)) = map.next()? {
        if key == "seq" {
            return Ok(val.u64()?);
        }
    }

    Err(Error::ProtocolViolation("Missing seq".into()))
}

// Helper functions

fn write_map_u64(enc: &mut Encoder, key: &str, val: u64) -> Result<()> {
    enc.key(key)?;
    enc.u64(val)?;
    Ok(())
}

fn write_map_str(enc: &mut Encoder, key: &str, val: &str) -> Result<()> {
    enc.key(key)?;
    enc.str(val)?;
    Ok(())
}

fn write_map_bytes(enc: &mut Encoder, key: &str, val: &[u8]) -> Result<()> {
    enc.key(key)?;
    enc.bytes(val)?;
    Ok(())
}
