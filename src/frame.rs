use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use thiserror::Error as ThisError;

use crate::item::Item;

/// The only command in the protocol; every other line is an encoded client record.
pub const GET_DATA: &[u8] = b"GET_DATA";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("malformed base64 line: {0}")]
    Decoding(#[from] base64::DecodeError),
    #[error("item {id} cannot be encoded: {reason}")]
    Encoding { id: i64, reason: String },
}

/// A classified inbound line.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// Request for a dump of the whole item catalog.
    GetData,
    /// Decoded payload of an upload line.
    Record(Bytes),
}

impl Frame {
    /// Classifies a line read from a client. Trailing whitespace is ignored; an exact
    /// `GET_DATA` is the dump command and anything else must be standard, padded Base64.
    pub fn parse(line: &[u8]) -> Result<Frame, Error> {
        if trim_end(line) == GET_DATA {
            return Ok(Frame::GetData);
        }

        decode_client_line(line).map(Frame::Record)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::GetData => write!(f, "GET_DATA"),
            Frame::Record(payload) => write!(f, "record ({} bytes)", payload.len()),
        }
    }
}

/// Encodes an item as one transport line: JSON, then Base64, then `\n`.
///
/// JSON has no representation for NaN or infinities, so an item carrying one is rejected
/// rather than silently serialized as `null`.
pub fn encode_item(item: &Item) -> Result<Bytes, Error> {
    if !item.price.is_finite() {
        return Err(Error::Encoding {
            id: item.id,
            reason: format!("price {} is not a finite number", item.price),
        });
    }

    let json = serde_json::to_vec(item).map_err(|e| Error::Encoding {
        id: item.id,
        reason: e.to_string(),
    })?;

    let mut line = STANDARD.encode(json).into_bytes();
    line.push(b'\n');

    Ok(Bytes::from(line))
}

/// Decodes the Base64 payload of an upload line, ignoring trailing whitespace.
pub fn decode_client_line(line: &[u8]) -> Result<Bytes, Error> {
    let payload = STANDARD.decode(trim_end(line))?;
    Ok(Bytes::from(payload))
}

fn trim_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);

    &line[..end]
}
