// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
FLAC-in-Ogg nested parsing (§4.6): page 0 carries a "FLAC" marker with
a STREAMINFO suffix, page 1 carries (ignored) Vorbis comments, and
pages 2+ carry one or more native FLAC frames per segment.
*/

use crate::flac::header::{FlacHeader, StreamInfoDefaults};
use crate::frame::{map_codec_frame_stats, CodecFrame, Header};

pub(crate) const MAGIC: &[u8] = b"\x7fFLAC";

/// The STREAMINFO suffix of the page-0 packet starts at byte 13: 4
/// bytes "fLaC", 1 metadata-block-header byte, 3-byte length, then the
/// 34-byte STREAMINFO block itself (sample rate and bit depth are
/// packed fields within it).
pub(crate) fn parse_streaminfo_defaults(page0_packet: &[u8]) -> Option<StreamInfoDefaults> {
    if page0_packet.len() < 13 + 18 {
        return None;
    }
    let info = &page0_packet[13..];
    // STREAMINFO layout (after the 4-byte "fLaC" + 4-byte block header
    // already skipped by the `13` offset above): min/max blocksize (2+2
    // bytes), min/max framesize (3+3 bytes), then a 20-bit sample rate,
    // 3-bit channel count minus one, 5-bit bits-per-sample minus one,
    // packed into the next 8 bytes' leading 4 bytes.
    let packed_offset = 2 + 2 + 3 + 3;
    let b = &info[packed_offset..packed_offset + 4];
    let sample_rate = (b[0] as u32) << 12 | (b[1] as u32) << 4 | (b[2] as u32) >> 4;
    let bit_depth = (((b[2] & 0x0F) << 1) | (b[3] >> 7)) + 1;
    Some(StreamInfoDefaults { sample_rate, bit_depth })
}

pub(crate) struct FlacInOgg {
    streaminfo: Option<StreamInfoDefaults>,
}

impl FlacInOgg {
    pub fn new() -> Self {
        FlacInOgg { streaminfo: None }
    }

    /// Handles one Ogg page's already-stitched segments, returning the
    /// codec frames found within it (empty for pages 0 and 1).
    pub fn handle_page(
        &mut self,
        page_index: u64,
        segments: &[Box<[u8]>],
        frame_number: &mut u64,
        total_bytes_out: &mut u64,
        total_samples: &mut u64,
    ) -> Vec<CodecFrame> {
        if page_index == 0 {
            if let Some(first) = segments.first() {
                self.streaminfo = parse_streaminfo_defaults(first);
            }
            return Vec::new();
        }
        if page_index == 1 {
            return Vec::new();
        }
        let mut out = Vec::new();
        for segment in segments {
            if segment.first() != Some(&0xFF) {
                continue;
            }
            if let Ok(header) = FlacHeader::parse(segment, self.streaminfo.as_ref()) {
                let samples = header.block_size;
                let data: Box<[u8]> = segment.clone();
                let frame = map_codec_frame_stats(
                    Header::Flac(header),
                    data,
                    samples,
                    *frame_number,
                    *total_bytes_out,
                    *total_samples,
                );
                *frame_number += 1;
                *total_bytes_out += frame.data.len() as u64;
                *total_samples += frame.samples as u64;
                out.push(frame);
            }
        }
        out
    }
}

impl Default for FlacInOgg {
    fn default() -> Self {
        Self::new()
    }
}
