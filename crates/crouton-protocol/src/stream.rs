//! Blocking framed I/O over any byte stream.

use std::io::{self, Read, Write};

use rmpv::Value;
use serde::Serialize;

use crate::codec::WireCodec;
use crate::errors::CodecError;

/// Bytes requested from the socket per read.
pub const READ_CHUNK_BYTES: usize = 64 * 1024;

/// A byte stream paired with the codec state of one connection.
///
/// Any [`CodecError`] returned from [`FramedStream::receive`] or
/// [`FramedStream::send`] has already reset the codec; callers treat the
/// connection as unusable.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    codec: WireCodec,
    chunk: Vec<u8>,
}

impl<S> FramedStream<S>
where
    S: Read + Write,
{
    /// Wraps `stream` with a fresh codec.
    pub fn new(stream: S, max_frame_bytes: usize) -> Self {
        Self {
            stream,
            codec: WireCodec::new(max_frame_bytes),
            chunk: vec![0_u8; READ_CHUNK_BYTES],
        }
    }

    /// Blocks until one complete value has arrived.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between frames.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on I/O failure, corrupt input, an oversized
    /// frame, or a stream that ends mid-frame.
    pub fn receive(&mut self) -> Result<Option<Value>, CodecError> {
        let result = self.receive_inner();
        if result.is_err() {
            self.codec.reset();
        }
        result
    }

    fn receive_inner(&mut self) -> Result<Option<Value>, CodecError> {
        loop {
            if let Some(value) = self.codec.decoder().next_value()? {
                return Ok(Some(value));
            }
            let read = read_with_retry(&mut self.stream, &mut self.chunk)?;
            if read == 0 {
                let buffered = self.codec.decoder().buffered();
                if buffered == 0 {
                    return Ok(None);
                }
                return Err(CodecError::Truncated { buffered });
            }
            let Some(received) = self.chunk.get(..read) else {
                return Err(CodecError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "read reported more bytes than the buffer holds",
                )));
            };
            self.codec.decoder().feed(received);
        }
    }

    /// Encodes `message` and writes it as one frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when encoding or writing fails.
    pub fn send<T>(&mut self, message: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        let result = self.send_inner(message);
        if result.is_err() {
            self.codec.reset();
        }
        result
    }

    fn send_inner<T>(&mut self, message: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        let frame = self.codec.encoder().encode(message)?;
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Releases the stream, dropping the codec state.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn read_with_retry<R: Read>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{FrameEncoder, InstanceId, Request, Response};

    /// In-memory duplex: reads from `input`, records writes in `output`.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Duplex {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame<T: Serialize>(message: &T) -> Vec<u8> {
        FrameEncoder::new().encode(message).expect("encode").to_vec()
    }

    #[test]
    fn receives_back_to_back_frames_then_orderly_end() {
        let mut input = frame(&Request::close(InstanceId::new(1)));
        input.extend(frame(&Request::close(InstanceId::new(2))));
        let mut framed = FramedStream::new(Duplex::new(input), 1024);

        for expected in [1, 2] {
            let value = framed.receive().expect("receive").expect("frame");
            let request = Request::from_value(value).expect("request");
            assert_eq!(request, Request::close(InstanceId::new(expected)));
        }
        assert!(framed.receive().expect("orderly end").is_none());
    }

    #[test]
    fn end_of_stream_mid_frame_is_truncation() {
        let mut input = frame(&Request::close(InstanceId::new(1)));
        input.truncate(input.len() - 1);
        let mut framed = FramedStream::new(Duplex::new(input), 1024);
        assert!(matches!(
            framed.receive(),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn send_writes_a_decodable_frame() {
        let mut framed = FramedStream::new(Duplex::new(Vec::new()), 1024);
        framed
            .send(&Response::Reference(InstanceId::new(9)))
            .expect("send");
        let written = framed.into_inner().output;
        assert_eq!(written, frame(&Response::Reference(InstanceId::new(9))));
    }
}
