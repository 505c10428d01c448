//! Frame boundary detection from MessagePack headers.

use rmp::Marker;
use rmp::decode::{self, ValueReadError};

/// Outcome of scanning the frame at the head of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// The first `len` bytes hold one whole frame.
    Complete(usize),
    /// The buffer must reach `awaiting` bytes before the scan can move on.
    Incomplete { awaiting: usize },
}

/// Resumable walk over the headers of one frame.
///
/// String, binary and extension payloads are skipped by their declared
/// length, and progress is kept between calls, so each header is read once
/// however the bytes are chunked.
#[derive(Debug, Default)]
pub(crate) struct FrameScan {
    cursor: usize,
    open: Vec<u64>,
    awaiting: usize,
}

impl FrameScan {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            cursor: 0,
            open: Vec::new(),
            awaiting: 0,
        }
    }

    /// Buffer length needed before the next call can make progress.
    #[must_use]
    pub(crate) const fn awaiting(&self) -> usize {
        self.awaiting
    }

    /// Continues the walk over `buffer`, which must start at the frame.
    pub(crate) fn advance(&mut self, buffer: &[u8]) -> Result<Scan, ValueReadError> {
        loop {
            if buffer.len() < self.awaiting {
                return Ok(Scan::Incomplete {
                    awaiting: self.awaiting,
                });
            }
            let Some(&first) = buffer.get(self.cursor) else {
                return Ok(self.wait_for(self.cursor.saturating_add(1)));
            };
            let marker = Marker::from_u8(first);
            let header_end = self.cursor.saturating_add(header_len(marker));
            let Some(mut header) = buffer.get(self.cursor..header_end) else {
                return Ok(self.wait_for(header_end));
            };
            let (payload, children) = item_shape(marker, &mut header)?;
            let item_end = header_end.saturating_add(payload);
            if buffer.len() < item_end {
                return Ok(self.wait_for(item_end));
            }
            self.cursor = item_end;
            if children > 0 {
                self.open.push(children);
            } else if self.close_item() {
                let len = self.cursor;
                *self = Self::default();
                return Ok(Scan::Complete(len));
            }
        }
    }

    const fn wait_for(&mut self, awaiting: usize) -> Scan {
        self.awaiting = awaiting;
        Scan::Incomplete { awaiting }
    }

    /// Counts one finished item against its enclosing containers; returns
    /// whether the outermost value is finished.
    fn close_item(&mut self) -> bool {
        while let Some(remaining) = self.open.last_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining > 0 {
                return false;
            }
            self.open.pop();
        }
        true
    }
}

const fn header_len(marker: Marker) -> usize {
    match marker {
        Marker::U8 | Marker::I8 | Marker::Str8 | Marker::Bin8 => 2,
        Marker::FixExt1 | Marker::FixExt2 | Marker::FixExt4 | Marker::FixExt8 => 2,
        Marker::FixExt16 => 2,
        Marker::U16 | Marker::I16 | Marker::Str16 | Marker::Bin16 => 3,
        Marker::Array16 | Marker::Map16 | Marker::Ext8 => 3,
        Marker::Ext16 => 4,
        Marker::U32 | Marker::I32 | Marker::F32 | Marker::Str32 | Marker::Bin32 => 5,
        Marker::Array32 | Marker::Map32 => 5,
        Marker::Ext32 => 6,
        Marker::U64 | Marker::I64 | Marker::F64 => 9,
        _ => 1,
    }
}

/// Payload bytes following the header, and the number of nested items.
fn item_shape(marker: Marker, header: &mut &[u8]) -> Result<(usize, u64), ValueReadError> {
    let shape = match marker {
        Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
            (0, u64::from(decode::read_array_len(header)?))
        }
        Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
            (0, u64::from(decode::read_map_len(header)?).saturating_mul(2))
        }
        Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
            (byte_len(decode::read_str_len(header)?), 0)
        }
        Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
            (byte_len(decode::read_bin_len(header)?), 0)
        }
        Marker::FixExt1
        | Marker::FixExt2
        | Marker::FixExt4
        | Marker::FixExt8
        | Marker::FixExt16
        | Marker::Ext8
        | Marker::Ext16
        | Marker::Ext32 => (byte_len(decode::read_ext_meta(header)?.size), 0),
        _ => (0, 0),
    };
    Ok(shape)
}

fn byte_len(declared: u32) -> usize {
    usize::try_from(declared).unwrap_or(usize::MAX)
}
