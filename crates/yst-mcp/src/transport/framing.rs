//! Message framing for newline-delimited JSON.
//!
//! Every frame is one UTF-8 line holding one JSON-RPC message. [`FrameCodec`]
//! wraps [`LinesCodec`] with a maximum frame length, so a partial line is
//! buffered until its newline arrives and several messages in one read come out
//! one at a time, in order.
//!
//! Problems local to a single line (invalid JSON, invalid UTF-8, an oversized
//! line, a value that is not a JSON-RPC message) decode to
//! [`Frame::Malformed`] instead of an error. The stream keeps going and the
//! server answers the bad frame. Only I/O failures end the stream.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::types::{JsonRpcMessage, McpError, McpResult, RequestId};

/// Default maximum frame length: 4 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// One decoded inbound frame.
#[derive(Debug)]
pub enum Frame {
    Message(JsonRpcMessage),
    /// The line could not be turned into a message. `id` is recovered from
    /// the raw JSON when possible, otherwise [`RequestId::Null`].
    Malformed { id: RequestId, error: McpError },
}

/// NDJSON codec for the JSON-RPC stream.
#[derive(Debug)]
pub struct FrameCodec {
    lines: LinesCodec,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_frame_bytes),
            max_frame_bytes,
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    fn on_line(&self, line: Result<Option<String>, LinesCodecError>) -> McpResult<Option<Frame>> {
        match line {
            Ok(Some(line)) => Ok(Some(parse_frame(&line))),
            Ok(None) => Ok(None),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Frame::Malformed {
                id: RequestId::Null,
                error: McpError::ParseError(format!(
                    "Frame exceeds {} bytes",
                    self.max_frame_bytes
                )),
            })),
            Err(LinesCodecError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(Some(Frame::Malformed {
                    id: RequestId::Null,
                    error: McpError::ParseError(format!("Frame is not valid UTF-8: {e}")),
                }))
            }
            Err(LinesCodecError::Io(e)) => Err(McpError::Io(e)),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = McpError;

    fn decode(&mut self, src: &mut BytesMut) -> McpResult<Option<Frame>> {
        loop {
            let line = self.lines.decode(src);
            if matches!(&line, Ok(Some(l)) if l.trim().is_empty()) {
                continue;
            }
            return self.on_line(line);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> McpResult<Option<Frame>> {
        loop {
            let line = self.lines.decode_eof(src);
            if matches!(&line, Ok(Some(l)) if l.trim().is_empty()) {
                continue;
            }
            return self.on_line(line);
        }
    }
}

impl<T: Serialize> Encoder<T> for FrameCodec {
    type Error = McpError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> McpResult<()> {
        // Compact JSON never contains a raw newline.
        serde_json::to_writer((&mut *dst).writer(), &item)?;
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Classify one line: a message, invalid JSON, or JSON that is not a message.
pub fn parse_frame(line: &str) -> Frame {
    let value: Value = match serde_json::from_str(line.trim()) {
        Ok(value) => value,
        Err(e) => {
            return Frame::Malformed {
                id: RequestId::Null,
                error: McpError::ParseError(e.to_string()),
            }
        }
    };

    let id = recover_id(&value);
    match serde_json::from_value::<JsonRpcMessage>(value) {
        Ok(msg) => Frame::Message(msg),
        Err(e) => Frame::Malformed {
            id,
            error: McpError::InvalidRequest(e.to_string()),
        },
    }
}

fn recover_id(value: &Value) -> RequestId {
    value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value(id).ok())
        .unwrap_or(RequestId::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JsonRpcNotification, JsonRpcRequest};
    use serde_json::json;

    fn decode_all(codec: &mut FrameCodec, buf: &mut BytesMut) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn request(id: i64) -> JsonRpcMessage {
        JsonRpcMessage::Request(JsonRpcRequest::new(
            RequestId::Number(id),
            "tools/call",
            Some(json!({ "name": "echo", "arguments": { "text": "日报 \n line" } })),
        ))
    }

    #[test]
    fn test_encode_then_decode_is_identity() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let messages = vec![
            request(1),
            JsonRpcMessage::Notification(JsonRpcNotification::new(
                "notifications/cancelled",
                Some(json!({ "requestId": 1 })),
            )),
        ];
        for msg in &messages {
            codec.encode(msg, &mut buf).unwrap();
        }
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 2);

        let decoded: Vec<JsonRpcMessage> = decode_all(&mut codec, &mut buf)
            .into_iter()
            .map(|f| match f {
                Frame::Message(m) => m,
                Frame::Malformed { error, .. } => panic!("unexpected malformed frame: {error}"),
            })
            .collect();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_partial_frame_waits_for_newline() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&br#"{"jsonrpc":"2.0","id":1,"method":"pi"#[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ng\"}\n");
        match codec.decode(&mut buf).unwrap() {
            Some(Frame::Message(JsonRpcMessage::Request(req))) => assert_eq!(req.method, "ping"),
            other => panic!("expected ping request, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines_and_crlf_are_skipped() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"\n  \r\n{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"ping\"}\r\n"[..]);
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], Frame::Message(JsonRpcMessage::Request(r)) if r.id == RequestId::String("a".into())));
    }

    #[test]
    fn test_invalid_json_is_malformed_with_null_id() {
        match parse_frame(r#"{"broken":"#) {
            Frame::Malformed { id, error } => {
                assert_eq!(id, RequestId::Null);
                assert_eq!(error.kind(), "DecodeError");
            }
            other => panic!("expected malformed frame, got {other:?}"),
        }
    }

    #[test]
    fn test_non_message_json_keeps_recoverable_id() {
        match parse_frame(r#"{"id":42,"params":{}}"#) {
            Frame::Malformed { id, error } => {
                assert_eq!(id, RequestId::Number(42));
                assert_eq!(error.kind(), "InvalidRequest");
            }
            other => panic!("expected malformed frame, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_frame_then_recovery() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[b'x'; 200]);
        buf.extend_from_slice(b"\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");

        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Frame::Malformed { error: McpError::ParseError(_), .. }));
        assert!(matches!(&frames[1], Frame::Message(JsonRpcMessage::Request(r)) if r.id == RequestId::Number(2)));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"\xff\xfe\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n"[..]);
        let frames = decode_all(&mut codec, &mut buf);
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Frame::Malformed { .. }));
        assert!(matches!(&frames[1], Frame::Message(_)));
    }

    #[test]
    fn test_final_line_without_newline_at_eof() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&br#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(codec.decode_eof(&mut buf).unwrap(), Some(Frame::Message(_))));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }
}
