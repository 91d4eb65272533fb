use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// Default upper bound for a single inbound line, excluding the terminating newline.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

const LF: u8 = b'\n';

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("line length exceeds limit of {0} bytes")]
    LineTooLong(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Splits a byte stream into `\n`-delimited lines and writes terminated lines back.
///
/// Decoded lines are returned without the newline; any other trailing whitespace (such as
/// the `\r` of a CRLF client) is left for the caller to trim.
pub struct LineCodec {
    max_length: usize,
    // Number of buffered bytes already known not to contain a newline.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> LineCodec {
        LineCodec::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> LineCodec {
        LineCodec {
            max_length,
            next_index: 0,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..].iter().position(|b| *b == LF);

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;

                if end > self.max_length {
                    return Err(Error::LineTooLong(self.max_length));
                }

                let mut line = src.split_to(end + 1);
                line.truncate(end);

                Ok(Some(line.freeze()))
            }
            None if src.len() > self.max_length => Err(Error::LineTooLong(self.max_length)),
            None => {
                // Not enough data to complete a line, remember how far we scanned.
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        // A line is only complete once its newline arrives; whatever the peer left behind
        // before closing is dropped.
        if !src.is_empty() {
            debug!(bytes = src.len(), "Discarding unterminated line at end of stream");
            src.clear();
        }
        self.next_index = 0;

        Ok(None)
    }
}

impl Encoder<Bytes> for LineCodec {
    type Error = Error;

    /// Writes `line` to the buffer, appending the newline unless the line already ends with one.
    fn encode(&mut self, line: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let terminated = line.last() == Some(&LF);

        dst.reserve(line.len() + 1);
        dst.put(line);
        if !terminated {
            dst.put_u8(LF);
        }

        Ok(())
    }
}
