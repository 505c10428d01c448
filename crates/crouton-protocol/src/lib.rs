//! Wire protocol shared by the crouton object server and its clients.
//!
//! A connection carries a continuous stream of MessagePack values with no
//! length prefix: each [`Request`] or [`Response`] is one self-delimiting map,
//! written back to back. [`FrameDecoder`] accepts arbitrary chunks as they
//! arrive and yields a value as soon as one is fully buffered, keeping any
//! trailing bytes for the next frame. [`FramedStream`] binds a codec to a
//! blocking socket and is used by both peers.
//!
//! ```text
//! request:  {action, provider?, instance?, method?, args, kwargs}
//! response: {type: "value" | "reference" | "error", value}
//! ```

mod codec;
mod errors;
mod message;
mod scan;
mod stream;

pub use codec::{FrameDecoder, FrameEncoder, WireCodec};
pub use errors::{CodecError, MessageError};
pub use message::{Action, InstanceId, InstanceKey, Request, Response, STOP_ITERATION};
pub use stream::{FramedStream, READ_CHUNK_BYTES};

/// Dynamically typed payload carried in arguments and results.
pub use rmpv::Value;
