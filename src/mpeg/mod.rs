// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
MPEG audio frame synchronization (§4.4).
*/

pub mod header;

use crate::error::Warning;
use crate::frame::{map_codec_frame_stats, CodecFrame, Header, HeaderInfo};
use crate::framing::{next_fixed_length_frame, FixedLengthHeader};
use crate::header_cache::{HeaderCache, UpdateFields};
use crate::reader::RawBuffer;
use header::MpegHeader;

impl FixedLengthHeader for MpegHeader {
    fn frame_length(&self) -> usize {
        self.frame_length as usize
    }
}

/// Drives the MPEG sync loop against a shared raw buffer, owning the
/// header cache for codec-parameter-change detection.
pub struct MpegParser {
    cache: HeaderCache,
}

impl MpegParser {
    pub fn new() -> Self {
        MpegParser { cache: HeaderCache::new() }
    }

    /// Emits every frame that can be fully decoded right now, updating
    /// the driver's running counters in place and invoking
    /// `on_codec_update` whenever the header cache flags a
    /// codec-parameter change.
    pub(crate) fn step(
        &mut self,
        buf: &mut RawBuffer,
        frame_number: &mut u64,
        total_bytes_out: &mut u64,
        total_samples: &mut u64,
        warnings: &mut Vec<Warning>,
        on_codec_update: &mut dyn FnMut(u32, &UpdateFields),
    ) -> Vec<CodecFrame> {
        let mut out = Vec::new();
        while let Some((header, data)) =
            next_fixed_length_frame(buf, &mut self.cache, MpegHeader::parse, 4, warnings)
        {
            let key = header.cache_key();
            let fields = UpdateFields {
                sample_rate: header.sample_rate,
                channels: header.channels(),
                bit_depth: 16,
            };
            self.cache.set_header(&key, fields.clone());
            let samples = header.samples;

            let frame = map_codec_frame_stats(
                Header::Mpeg(header),
                data,
                samples,
                *frame_number,
                *total_bytes_out,
                *total_samples,
            );
            *frame_number += 1;
            *total_bytes_out += frame.data.len() as u64;
            *total_samples += frame.samples as u64;

            let bitrate = frame.header.bitrate();
            self.cache
                .check_codec_update(bitrate, |br| on_codec_update(br, &fields));
            out.push(frame);
        }
        out
    }

    pub(crate) fn reset(&mut self) {
        self.cache.reset();
    }
}

impl Default for MpegParser {
    fn default() -> Self {
        Self::new()
    }
}
