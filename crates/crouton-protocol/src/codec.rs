//! Incremental MessagePack framing.

use rmpv::Value;
use serde::Serialize;

use crate::errors::CodecError;
use crate::scan::{FrameScan, Scan};

/// Streaming decoder that splits a byte stream into MessagePack values.
///
/// Frame boundaries are found by walking headers as bytes arrive; a value is
/// decoded only once all of its bytes are buffered. The size bound applies
/// to the frame at the head of the buffer, never to frames already complete.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    scan: FrameScan,
    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// Creates an empty decoder bounding each frame at `max_frame_bytes`.
    #[must_use]
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scan: FrameScan::new(),
            max_frame_bytes,
        }
    }

    /// Appends bytes received from the peer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Yields the next complete value, or `None` when more bytes are needed.
    ///
    /// Bytes following the value stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] once the head frame is known to
    /// need more than the configured bound, and [`CodecError::Decode`] or
    /// [`CodecError::Header`] when the buffered bytes can never form a valid
    /// value. The decoder must be discarded after any error.
    pub fn next_value(&mut self) -> Result<Option<Value>, CodecError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let frame_len = match self.scan.advance(&self.buffer)? {
            Scan::Complete(len) => len,
            Scan::Incomplete { awaiting } => {
                self.check_bound(awaiting)?;
                return Ok(None);
            }
        };
        self.check_bound(frame_len)?;
        let decoded = {
            let mut frame = self.buffer.get(..frame_len).unwrap_or_default();
            rmpv::decode::read_value(&mut frame)
        };
        self.buffer.drain(..frame_len);
        Ok(Some(decoded?))
    }

    /// Number of bytes waiting for the rest of their frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffered length the head frame needs before decoding can progress;
    /// zero when no partial frame is pending.
    #[must_use]
    pub const fn awaiting(&self) -> usize {
        self.scan.awaiting()
    }

    const fn check_bound(&self, frame_bytes: usize) -> Result<(), CodecError> {
        if frame_bytes > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                buffered: frame_bytes,
                max_bytes: self.max_frame_bytes,
            });
        }
        Ok(())
    }
}

/// Encoder producing one MessagePack map per message.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    scratch: Vec<u8>,
}

impl FrameEncoder {
    /// Creates an encoder with an empty scratch buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scratch: Vec::new(),
        }
    }

    /// Encodes `message` with named fields and returns the frame bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] when serialisation fails. Nothing is
    /// returned for the partial frame, so a failed encode never reaches the
    /// socket.
    pub fn encode<T>(&mut self, message: &T) -> Result<&[u8], CodecError>
    where
        T: Serialize + ?Sized,
    {
        self.scratch.clear();
        rmp_serde::encode::write_named(&mut self.scratch, message)?;
        Ok(&self.scratch)
    }
}

/// The decoder/encoder pair owned by one connection.
#[derive(Debug)]
pub struct WireCodec {
    decoder: FrameDecoder,
    encoder: FrameEncoder,
    max_frame_bytes: usize,
}

impl WireCodec {
    /// Creates a fresh pair.
    #[must_use]
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self {
            decoder: FrameDecoder::new(max_frame_bytes),
            encoder: FrameEncoder::new(),
            max_frame_bytes,
        }
    }

    /// Replaces both halves with new instances, dropping any buffered bytes.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_frame_bytes);
    }

    /// Decoder half.
    pub fn decoder(&mut self) -> &mut FrameDecoder {
        &mut self.decoder
    }

    /// Encoder half.
    pub fn encoder(&mut self) -> &mut FrameEncoder {
        &mut self.encoder
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::{InstanceId, Request, Response};

    const LIMIT: usize = 1024 * 1024;

    #[fixture]
    fn decoder() -> FrameDecoder {
        FrameDecoder::new(LIMIT)
    }

    fn encode<T: Serialize>(message: &T) -> Vec<u8> {
        FrameEncoder::new()
            .encode(message)
            .expect("encode message")
            .to_vec()
    }

    #[rstest]
    fn yields_nothing_until_frame_is_complete(mut decoder: FrameDecoder) {
        let frame = encode(&Request::close(InstanceId::new(3)));
        let (head, tail) = frame.split_at(frame.len() / 2);

        decoder.feed(head);
        assert!(decoder.next_value().expect("partial frame").is_none());
        assert_eq!(decoder.buffered(), head.len());

        decoder.feed(tail);
        let value = decoder.next_value().expect("decode").expect("complete frame");
        let request = Request::from_value(value).expect("request shape");
        assert_eq!(request, Request::close(InstanceId::new(3)));
        assert_eq!(decoder.buffered(), 0);
    }

    #[rstest]
    fn byte_at_a_time_feeding_decodes(mut decoder: FrameDecoder) {
        let mut kwargs = BTreeMap::new();
        kwargs.insert("kwarg1".to_owned(), Value::from("a keyword arg"));
        let request = Request::open("Record", vec![Value::from("first arg")], kwargs);
        let frame = encode(&request);

        let mut decoded = None;
        for byte in &frame {
            decoder.feed(std::slice::from_ref(byte));
            if let Some(value) = decoder.next_value().expect("decode") {
                decoded = Some(value);
            }
        }
        let value = decoded.expect("frame decoded after the last byte");
        assert_eq!(Request::from_value(value).expect("request"), request);
    }

    #[rstest]
    fn keeps_trailing_bytes_for_the_next_frame(mut decoder: FrameDecoder) {
        let mut bytes = encode(&Response::Reference(InstanceId::new(1)));
        bytes.extend(encode(&Response::null()));
        let second = encode(&Response::Error("late".to_owned()));
        bytes.extend_from_slice(&second[..2]);

        decoder.feed(&bytes);
        let first = decoder.next_value().expect("first").expect("complete");
        assert_eq!(
            Response::from_value(first).expect("response"),
            Response::Reference(InstanceId::new(1))
        );
        let null = decoder.next_value().expect("second").expect("complete");
        assert_eq!(Response::from_value(null).expect("response"), Response::null());
        assert!(decoder.next_value().expect("partial third").is_none());
        assert_eq!(decoder.buffered(), 2);

        decoder.feed(&second[2..]);
        let third = decoder.next_value().expect("third").expect("complete");
        assert_eq!(
            Response::from_value(third).expect("response"),
            Response::Error("late".to_owned())
        );
    }

    #[rstest]
    fn reserved_marker_is_a_decode_error(mut decoder: FrameDecoder) {
        decoder.feed(&[0xc1]);
        assert!(matches!(decoder.next_value(), Err(CodecError::Decode(_))));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut decoder = FrameDecoder::new(4);
        decoder.feed(&encode(&Request::close("a-long-instance-name")));
        let error = decoder.next_value().expect_err("frame over limit");
        assert!(matches!(error, CodecError::FrameTooLarge { max_bytes: 4, .. }));
    }

    #[test]
    fn declared_length_over_limit_fails_before_the_payload_arrives() {
        let mut decoder = FrameDecoder::new(1024);
        decoder.feed(&[0xc6, 0x00, 0x10, 0x00, 0x00]);
        let error = decoder.next_value().expect_err("declared blob over limit");
        assert!(matches!(
            error,
            CodecError::FrameTooLarge {
                buffered: 0x10_0005,
                max_bytes: 1024
            }
        ));
    }

    #[test]
    fn complete_frames_do_not_count_towards_the_limit() {
        let null = encode(&Response::null());
        let mut decoder = FrameDecoder::new(2 * null.len());
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&null);
        }
        decoder.feed(&bytes);
        for _ in 0..4 {
            let value = decoder.next_value().expect("within limit").expect("frame");
            assert_eq!(Response::from_value(value).expect("response"), Response::null());
        }
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn large_blob_is_scanned_once_across_chunks() {
        let blob = Response::Value(Value::Binary(vec![7; 4 * 1024 * 1024]));
        let frame = encode(&blob);
        let mut decoder = FrameDecoder::new(8 * 1024 * 1024);

        let mut chunks = frame.chunks(64 * 1024).peekable();
        let mut decoded = None;
        while let Some(chunk) = chunks.next() {
            decoder.feed(chunk);
            let value = decoder.next_value().expect("decode");
            if chunks.peek().is_some() {
                // Every header sits in the first chunk; the rest is payload.
                assert!(value.is_none());
                assert_eq!(decoder.awaiting(), frame.len());
            } else {
                decoded = value;
            }
        }
        let value = decoded.expect("frame decoded after the last chunk");
        assert_eq!(Response::from_value(value).expect("response"), blob);
        assert_eq!(decoder.awaiting(), 0);
    }

    #[test]
    fn reset_discards_buffered_bytes() {
        let mut codec = WireCodec::new(LIMIT);
        codec.decoder().feed(&[0x92, 0x01]);
        assert_eq!(codec.decoder().buffered(), 2);
        codec.reset();
        assert_eq!(codec.decoder().buffered(), 0);
    }

    #[test]
    fn binary_and_string_payloads_stay_distinct() {
        let payload = Value::Array(vec![
            Value::Binary(b"bytes".to_vec()),
            Value::from("bytes"),
            Value::F64(1.1),
        ]);
        let frame = encode(&Response::Value(payload.clone()));
        let mut decoder = FrameDecoder::new(LIMIT);
        decoder.feed(&frame);
        let value = decoder.next_value().expect("decode").expect("complete");
        assert_eq!(
            Response::from_value(value).expect("response"),
            Response::Value(payload)
        );
    }
}
