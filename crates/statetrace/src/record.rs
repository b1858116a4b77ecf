//! Output record model with byte-exact binary encode/decode.
//!
//! Every record starts with an 18-byte header: a one-byte type tag (`'C'`
//! call, `'D'` draw, `'F'` frame), a one-byte name id, and two reserved
//! 64-bit timestamps (written as zero). The body layout per type is fixed;
//! all integers are little-endian. Offline consumers depend on these exact
//! byte counts, so the lengths are exported as constants and asserted in
//! tests.

use crate::bins::{ChangeKind, NUM_BINS};

pub const HEADER_LEN: usize = 18;
/// `bin:i32, size:i32, valid:i32, object:u64` after the header.
pub const CALL_RECORD_LEN: usize = HEADER_LEN + 20;
/// `frame:i32, bytes:i32` after the header.
pub const FRAME_RECORD_LEN: usize = HEADER_LEN + 8;
/// Per bin `id:i32, change:u8, bytes:i32`, then `prim:i32, 'D':u8, bytes:i32`.
pub const DRAW_RECORD_LEN: usize = HEADER_LEN + NUM_BINS * 9 + 9;

/// One bin's slice of a draw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinState {
    pub id: i32,
    pub change: ChangeKind,
    pub bytes: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// One processed call: the slot it touched, its size argument, and the
    /// slot's value id at emission time.
    Call {
        name_id: u8,
        bin: i32,
        size: i32,
        valid: i32,
        object: u64,
    },
    /// Snapshot of all bins at a draw, plus the draw's primitive count and
    /// the byte volume uploaded during the closing window.
    Draw {
        name_id: u8,
        bins: [BinState; NUM_BINS],
        prim_count: i32,
        draw_bytes: i32,
    },
    /// Frame boundary: frame number and bytes uploaded since the previous
    /// present.
    Frame { frame: i32, bytes: i32 },
}

impl Record {
    pub fn tag(&self) -> u8 {
        match self {
            Record::Call { .. } => b'C',
            Record::Draw { .. } => b'D',
            Record::Frame { .. } => b'F',
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Record::Call { .. } => CALL_RECORD_LEN,
            Record::Draw { .. } => DRAW_RECORD_LEN,
            Record::Frame { .. } => FRAME_RECORD_LEN,
        }
    }

    fn name_id(&self) -> u8 {
        match self {
            Record::Call { name_id, .. } | Record::Draw { name_id, .. } => *name_id,
            Record::Frame { .. } => 0,
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.push(self.tag());
        out.push(self.name_id());
        out.extend_from_slice(&0u64.to_le_bytes()); // tstart, reserved
        out.extend_from_slice(&0u64.to_le_bytes()); // tstop, reserved

        match self {
            Record::Call {
                bin,
                size,
                valid,
                object,
                ..
            } => {
                out.extend_from_slice(&bin.to_le_bytes());
                out.extend_from_slice(&size.to_le_bytes());
                out.extend_from_slice(&valid.to_le_bytes());
                out.extend_from_slice(&object.to_le_bytes());
            }
            Record::Draw {
                bins,
                prim_count,
                draw_bytes,
                ..
            } => {
                for bin in bins {
                    out.extend_from_slice(&bin.id.to_le_bytes());
                    out.push(bin.change.as_u8());
                    out.extend_from_slice(&bin.bytes.to_le_bytes());
                }
                out.extend_from_slice(&prim_count.to_le_bytes());
                out.push(b'D');
                out.extend_from_slice(&draw_bytes.to_le_bytes());
            }
            Record::Frame { frame, bytes } => {
                out.extend_from_slice(&frame.to_le_bytes());
                out.extend_from_slice(&bytes.to_le_bytes());
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecordParseError {
    #[error("record stream truncated at offset {0}")]
    UnexpectedEof(usize),
    #[error("invalid record tag 0x{0:02X}")]
    InvalidTag(u8),
    #[error("invalid change byte 0x{0:02X} in draw record")]
    InvalidChange(u8),
    #[error("draw record marker byte is 0x{0:02X}, expected 'D'")]
    InvalidDrawMarker(u8),
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], RecordParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(RecordParseError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, RecordParseError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, RecordParseError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, RecordParseError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }
}

/// Decode a binary record stream back into records.
///
/// The reserved timestamp fields are validated for presence but their values
/// are ignored.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Record>, RecordParseError> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut records = Vec::new();

    while reader.pos < bytes.len() {
        let tag = reader.u8()?;
        let name_id = reader.u8()?;
        reader.u64()?; // tstart
        reader.u64()?; // tstop

        let record = match tag {
            b'C' => {
                let bin = reader.i32()?;
                let size = reader.i32()?;
                let valid = reader.i32()?;
                let object = reader.u64()?;
                Record::Call {
                    name_id,
                    bin,
                    size,
                    valid,
                    object,
                }
            }
            b'D' => {
                let mut bins = [BinState {
                    id: 0,
                    change: ChangeKind::Undef,
                    bytes: 0,
                }; NUM_BINS];
                for bin in &mut bins {
                    bin.id = reader.i32()?;
                    let change = reader.u8()?;
                    bin.change = ChangeKind::from_u8(change)
                        .ok_or(RecordParseError::InvalidChange(change))?;
                    bin.bytes = reader.i32()?;
                }
                let prim_count = reader.i32()?;
                let marker = reader.u8()?;
                if marker != b'D' {
                    return Err(RecordParseError::InvalidDrawMarker(marker));
                }
                let draw_bytes = reader.i32()?;
                Record::Draw {
                    name_id,
                    bins,
                    prim_count,
                    draw_bytes,
                }
            }
            b'F' => Record::Frame {
                frame: reader.i32()?,
                bytes: reader.i32()?,
            },
            other => return Err(RecordParseError::InvalidTag(other)),
        };
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_draw() -> Record {
        let mut bins = [BinState {
            id: -1,
            change: ChangeKind::Undef,
            bytes: 0,
        }; NUM_BINS];
        bins[8] = BinState {
            id: 0,
            change: ChangeKind::Update,
            bytes: 64,
        };
        Record::Draw {
            name_id: 101,
            bins,
            prim_count: 6,
            draw_bytes: 64,
        }
    }

    #[test]
    fn record_lengths_are_fixed() {
        assert_eq!(CALL_RECORD_LEN, 38);
        assert_eq!(FRAME_RECORD_LEN, 26);
        assert_eq!(DRAW_RECORD_LEN, 252);

        let call = Record::Call {
            name_id: 1,
            bin: 25,
            size: 6,
            valid: -1,
            object: 0,
        };
        assert_eq!(call.encode().len(), CALL_RECORD_LEN);
        assert_eq!(sample_draw().encode().len(), DRAW_RECORD_LEN);
        assert_eq!(
            Record::Frame { frame: 0, bytes: 64 }.encode().len(),
            FRAME_RECORD_LEN
        );
    }

    #[test]
    fn header_layout() {
        let bytes = Record::Frame { frame: 3, bytes: 9 }.encode();
        assert_eq!(bytes[0], b'F');
        assert_eq!(bytes[1], 0);
        assert!(bytes[2..18].iter().all(|&b| b == 0));
        assert_eq!(i32::from_le_bytes(bytes[18..22].try_into().unwrap()), 3);
        assert_eq!(i32::from_le_bytes(bytes[22..26].try_into().unwrap()), 9);
    }

    #[test]
    fn round_trip() {
        let records = vec![
            Record::Call {
                name_id: 111,
                bin: 8,
                size: 0,
                valid: 0,
                object: 10_042,
            },
            sample_draw(),
            Record::Frame { frame: 0, bytes: 64 },
        ];
        let mut stream = Vec::new();
        for record in &records {
            record.encode_into(&mut stream);
        }
        assert_eq!(parse_records(&stream).unwrap(), records);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let bytes = sample_draw().encode();
        // Everything up to the final draw_bytes field parses; the 4-byte
        // read at offset 248 runs past the truncated end.
        assert_eq!(
            parse_records(&bytes[..bytes.len() - 1]),
            Err(RecordParseError::UnexpectedEof(bytes.len() - 4))
        );
    }

    #[test]
    fn invalid_tag_is_an_error() {
        let mut bytes = Record::Frame { frame: 0, bytes: 0 }.encode();
        bytes[0] = b'X';
        assert_eq!(parse_records(&bytes), Err(RecordParseError::InvalidTag(b'X')));
    }
}
