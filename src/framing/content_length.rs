//! `Content-Length` framing: an HTTP-style header block terminated by
//! `\r\n\r\n`, followed by exactly the announced number of payload bytes.
//!
//! The decoder is a three-state machine: reading a header name (or the
//! blank line that ends the block), reading a header value, reading the
//! payload. Header names are lowercased and trimmed; only
//! `content-length` is interpreted, every other header is skipped.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::LeftOverBytes;

#[derive(Debug, Error)]
pub enum ContentLengthError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The header block ended without announcing a payload length.
    #[error("header block carries no content-length header")]
    MissingContentLengthHeader,

    /// The announced length does not parse as a u32.
    #[error("illegal content-length value {0:?}")]
    IllegalContentLengthHeaderValue(String),

    #[error("header field is not valid utf-8")]
    InvalidUtf8,

    #[error("{0}")]
    LeftOver(LeftOverBytes),
}

#[derive(Debug, Clone)]
enum State {
    WaitingForHeaderNameOrBlockEnd,
    WaitingForHeaderValue(String),
    WaitingForPayload(usize),
}

/// Decoder/encoder pair for `Content-Length` framed payloads.
#[derive(Debug, Clone)]
pub struct ContentLengthCodec {
    state: State,
    content_length: Option<u32>,
}

impl Default for ContentLengthCodec {
    fn default() -> Self {
        Self { state: State::WaitingForHeaderNameOrBlockEnd, content_length: None }
    }
}

impl ContentLengthCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, ContentLengthError> {
    std::str::from_utf8(bytes).map_err(|_| ContentLengthError::InvalidUtf8)
}

/// Position of `\r\n` in `buf`, if complete.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == b"\r\n")
}

impl Decoder for ContentLengthCodec {
    type Item = Bytes;
    type Error = ContentLengthError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, ContentLengthError> {
        loop {
            match &self.state {
                State::WaitingForHeaderNameOrBlockEnd => {
                    // Either a blank line ending the block, or a header
                    // name up to the colon.
                    if src.starts_with(b"\r\n") {
                        let _ = src.split_to(2);
                        let Some(length) = self.content_length.take() else {
                            return Err(ContentLengthError::MissingContentLengthHeader);
                        };
                        self.state = State::WaitingForPayload(length as usize);
                        continue;
                    }
                    let Some(colon) = src.iter().position(|&b| b == b':') else {
                        // A lone '\r' could still become the block end.
                        return Ok(None);
                    };
                    if let Some(crlf) = find_crlf(&src[..colon]) {
                        // Malformed header line without a colon; skip it.
                        let _ = src.split_to(crlf + 2);
                        continue;
                    }
                    let name = src.split_to(colon + 1);
                    let name = utf8(&name[..name.len() - 1])?.trim().to_ascii_lowercase();
                    self.state = State::WaitingForHeaderValue(name);
                }
                State::WaitingForHeaderValue(name) => {
                    let Some(crlf) = find_crlf(src) else {
                        return Ok(None);
                    };
                    let value = src.split_to(crlf + 2);
                    let value = utf8(&value[..value.len() - 2])?.trim().to_string();
                    if name == "content-length" {
                        let parsed = value.parse::<u32>().map_err(|_| {
                            ContentLengthError::IllegalContentLengthHeaderValue(value.clone())
                        })?;
                        self.content_length = Some(parsed);
                    }
                    self.state = State::WaitingForHeaderNameOrBlockEnd;
                }
                State::WaitingForPayload(length) => {
                    let length = *length;
                    if src.len() < length {
                        src.reserve(length - src.len());
                        return Ok(None);
                    }
                    self.state = State::WaitingForHeaderNameOrBlockEnd;
                    return Ok(Some(src.split_to(length).freeze()));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, ContentLengthError> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None if src.is_empty()
                && matches!(self.state, State::WaitingForHeaderNameOrBlockEnd) =>
            {
                Ok(None)
            }
            None => Err(ContentLengthError::LeftOver(LeftOverBytes(src.split().freeze()))),
        }
    }
}

impl Encoder<Bytes> for ContentLengthCodec {
    type Error = ContentLengthError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), ContentLengthError> {
        let header = format!("Content-Length: {}\r\n\r\n", item.len());
        dst.reserve(header.len() + item.len());
        dst.extend_from_slice(header.as_bytes());
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut ContentLengthCodec, buf: &mut BytesMut) -> Vec<Bytes> {
        let mut payloads = Vec::new();
        while let Some(payload) = codec.decode(buf).unwrap() {
            payloads.push(payload);
        }
        payloads
    }

    #[test]
    fn zero_length_payload_is_emitted_immediately() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: 0\r\n\r\n"[..]);
        let payload = codec.decode(&mut buf).unwrap().unwrap();
        assert!(payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn exact_payload() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: 5\r\n\r\nHELLOrest"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), &b"HELLO"[..]);
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn missing_header_is_an_error() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::from(&b"\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ContentLengthError::MissingContentLengthHeader)
        ));
    }

    #[test]
    fn non_numeric_length_is_an_error() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: seven\r\n\r\n"[..]);
        match codec.decode(&mut buf) {
            Err(ContentLengthError::IllegalContentLengthHeaderValue(raw)) => {
                assert_eq!(raw, "seven")
            }
            other => panic!("expected illegal value, got {other:?}"),
        }
    }

    #[test]
    fn header_names_are_lowercased_and_unknown_headers_skipped() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::from(
            &b"X-Extra: ignored\r\ncOnTeNt-LeNgTh: 2\r\nAnother: one\r\n\r\nok"[..],
        );
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), &b"ok"[..]);
    }

    #[test]
    fn split_delivery_yields_one_payload() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::new();
        let mut payloads = Vec::new();

        buf.extend_from_slice(b"Conte");
        payloads.extend(drain(&mut codec, &mut buf));
        buf.extend_from_slice(b"nt-Length: 3\r\n\r\nAB");
        payloads.extend(drain(&mut codec, &mut buf));
        buf.extend_from_slice(b"C");
        payloads.extend(drain(&mut codec, &mut buf));

        assert_eq!(payloads, vec![&b"ABC"[..]]);
    }

    #[test]
    fn back_to_back_messages() {
        let mut codec = ContentLengthCodec::new();
        let mut buf =
            BytesMut::from(&b"Content-Length: 1\r\n\r\nAContent-Length: 2\r\n\r\nBC"[..]);
        assert_eq!(drain(&mut codec, &mut buf), vec![&b"A"[..], &b"BC"[..]]);
    }

    #[test]
    fn eof_mid_block_reports_leftover() {
        let mut codec = ContentLengthCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: 9\r\n\r\nshort"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(codec.decode_eof(&mut buf), Err(ContentLengthError::LeftOver(_))));
    }

    #[test]
    fn encoder_round_trips() {
        let mut codec = ContentLengthCodec::new();
        let mut wire = BytesMut::new();
        codec.encode(Bytes::from_static(b"payload"), &mut wire).unwrap();
        assert_eq!(codec.decode(&mut wire).unwrap().unwrap(), &b"payload"[..]);
    }
}
