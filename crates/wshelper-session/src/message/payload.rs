//! Streamed inbound payloads and outbound payload shapes.

use std::fmt;
use std::io::{self, Read};

use bytes::{Buf, Bytes};

use wshelper_core::error::{ErrorKind, WsError};
use wshelper_core::result::WsResult;

use super::types::FrameKind;

/// Sequential reader over a binary message payload.
///
/// Handed to the stream handler by value; the handler consumes it before
/// returning.
pub struct StreamReader {
    inner: Box<dyn Read + Send>,
}

impl StreamReader {
    /// Wraps any byte source.
    pub fn new(source: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(source),
        }
    }

    /// Reader over an in-memory buffer.
    pub fn from_bytes(data: Bytes) -> Self {
        Self::new(data.reader())
    }

    /// Reads the remaining payload into memory.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader").finish_non_exhaustive()
    }
}

/// Payload accepted by `Session::write_message`.
#[derive(Debug)]
pub enum Payload {
    /// UTF-8 text, written as a text frame.
    Text(String),
    /// Raw bytes, written as a binary frame.
    Bytes(Bytes),
    /// Byte source drained into a single binary frame.
    Reader(StreamReader),
}

impl Payload {
    /// Short name of the payload shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Reader(_) => "reader",
        }
    }

    /// Converts the payload into frame bytes for `kind`.
    ///
    /// Text frames only take text; binary frames take bytes or a reader.
    /// Any other pairing is rejected without producing a frame.
    pub fn into_frame_bytes(self, kind: FrameKind) -> WsResult<Bytes> {
        match (kind, self) {
            (FrameKind::Text, Self::Text(text)) => Ok(Bytes::from(text)),
            (FrameKind::Binary, Self::Bytes(data)) => Ok(data),
            (FrameKind::Binary, Self::Reader(mut reader)) => {
                let data = reader.read_all().map_err(|e| {
                    WsError::with_source(
                        ErrorKind::StreamRead,
                        "failed to read outbound payload",
                        e,
                    )
                })?;
                Ok(Bytes::from(data))
            }
            (kind, payload) => Err(WsError::unsupported_payload(format!(
                "unsupported payload type: {} payload cannot be written as a {kind} frame",
                payload.shape()
            ))),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Self::Bytes(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(data))
    }
}

impl From<StreamReader> for Payload {
    fn from(reader: StreamReader) -> Self {
        Self::Reader(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_reader_yields_bytes_in_order() {
        let data: Vec<u8> = (0..=255).collect();
        let mut reader = StreamReader::from_bytes(Bytes::from(data.clone()));
        assert_eq!(reader.read_all().unwrap(), data);
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_matching_shapes() {
        let text = Payload::from("hello").into_frame_bytes(FrameKind::Text).unwrap();
        assert_eq!(&text[..], b"hello");

        let reader = StreamReader::new(io::Cursor::new(vec![7u8; 10]));
        let bytes = Payload::from(reader)
            .into_frame_bytes(FrameKind::Binary)
            .unwrap();
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        let err = Payload::from(vec![1u8, 2, 3])
            .into_frame_bytes(FrameKind::Text)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedPayload);

        let err = Payload::from("hi")
            .into_frame_bytes(FrameKind::Binary)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedPayload);

        let err = Payload::from("hi")
            .into_frame_bytes(FrameKind::Ping)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedPayload);
    }
}
