// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Ogg page header decoding and CRC-32 validation (§4.6).
*/

use byteorder::{ByteOrder, LittleEndian};
use smallvec::SmallVec;

pub(crate) const FIXED_HEADER_LEN: usize = 27;

/// A page carries at most 255 segment-length bytes, but real-world
/// pages almost always carry a handful; this avoids a heap allocation
/// for the common case.
type SegmentTable = SmallVec<[u8; 16]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeaderFlags {
    pub continued: bool,
    pub first: bool,
    pub last: bool,
}

impl PageHeaderFlags {
    fn from_byte(b: u8) -> Self {
        PageHeaderFlags {
            continued: b & 0x1 != 0,
            first: b & 0x2 != 0,
            last: b & 0x4 != 0,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PageHeader {
    pub flags: PageHeaderFlags,
    pub absolute_granule_position: i64,
    pub stream_serial_number: u32,
    pub page_sequence_number: u32,
    pub page_checksum: u32,
    pub segment_table: SegmentTable,
    /// Total header length including the fixed 27 bytes and the
    /// segment table.
    pub header_len: usize,
    /// Sum of `segment_table`.
    pub payload_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageHeaderError {
    Truncated,
    BadMagic,
    UnsupportedVersion,
}

impl PageHeader {
    /// Parses the fixed header and segment table starting at `data[0]`.
    /// Does not validate the CRC (the caller needs the payload bytes
    /// too); see [`verify_page_crc`].
    pub fn parse(data: &[u8]) -> Result<Self, PageHeaderError> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(PageHeaderError::Truncated);
        }
        if &data[0..4] != b"OggS" {
            return Err(PageHeaderError::BadMagic);
        }
        if data[4] != 0 {
            return Err(PageHeaderError::UnsupportedVersion);
        }
        let flags = PageHeaderFlags::from_byte(data[5]);
        let absolute_granule_position = LittleEndian::read_i64(&data[6..14]);
        let stream_serial_number = LittleEndian::read_u32(&data[14..18]);
        let page_sequence_number = LittleEndian::read_u32(&data[18..22]);
        let page_checksum = LittleEndian::read_u32(&data[22..26]);
        let page_segments = data[26] as usize;

        if data.len() < FIXED_HEADER_LEN + page_segments {
            return Err(PageHeaderError::Truncated);
        }
        let segment_table: SegmentTable =
            data[FIXED_HEADER_LEN..FIXED_HEADER_LEN + page_segments].into();
        let payload_len: usize = segment_table.iter().map(|&b| b as usize).sum();
        let header_len = FIXED_HEADER_LEN + page_segments;

        Ok(PageHeader {
            flags,
            absolute_granule_position,
            stream_serial_number,
            page_sequence_number,
            page_checksum,
            segment_table,
            header_len,
            payload_len,
        })
    }
}

/// Computes the page CRC-32 over `page` (header + payload) with the
/// checksum field (bytes 22..26) zeroed, and compares it against
/// `header.page_checksum`.
pub(crate) fn verify_page_crc(page: &[u8], expected: u32) -> bool {
    let mut zeroed = page.to_vec();
    if zeroed.len() >= 26 {
        zeroed[22..26].fill(0);
    }
    crate::crc::ogg_crc32(&zeroed) == expected
}

/// Splits a page's payload bytes into per-segment views according to
/// the 255-terminated segment-table convention: a run of 255-length
/// segments followed by a shorter (or zero) one forms a single logical
/// packet segment. If the segment table's last entry is 255, that
/// trailing run is an unterminated packet continued on the next page;
/// it is returned separately as `incomplete_tail` rather than as a
/// completed segment, so the caller can perform continued-packet
/// stitching (§4.6).
pub(crate) fn build_segments(
    segment_table: &[u8],
    payload: &[u8],
) -> (Vec<Box<[u8]>>, Option<Vec<u8>>) {
    let mut segments = Vec::new();
    let mut offset = 0usize;
    let mut current = Vec::new();
    for &len in segment_table {
        let len = len as usize;
        current.extend_from_slice(&payload[offset..offset + len]);
        offset += len;
        if len < 255 {
            segments.push(std::mem::take(&mut current).into_boxed_slice());
        }
    }
    let incomplete_tail = if segment_table.last() == Some(&255) {
        Some(current)
    } else {
        debug_assert!(current.is_empty());
        None
    };
    (segments, incomplete_tail)
}
