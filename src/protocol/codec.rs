//! Line codec that survives oversized lines.
//!
//! `LinesCodec` reports an over-long line as a decode error, and `Framed`
//! ends the stream after any decoder error. This wrapper turns that error
//! into a `Frame::Oversized` item instead, so the connection keeps going
//! while `LinesCodec` discards the rest of the offending line.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// A line longer than the limit; its bytes were dropped.
    Oversized,
}

pub struct LineCodec {
    inner: LinesCodec,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
        }
    }
}

fn frame(
    decoded: Result<Option<String>, LinesCodecError>,
) -> Result<Option<Frame>, LinesCodecError> {
    match decoded {
        Ok(line) => Ok(line.map(Frame::Line)),
        Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::Oversized)),
        Err(e) => Err(e),
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        frame(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, LinesCodecError> {
        frame(self.inner.decode_eof(buf))
    }
}

impl Encoder<String> for LineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.inner.encode(line, buf)
    }
}
