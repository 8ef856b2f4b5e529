// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
FLAC native frame synchronization (§4.5).

FLAC frames carry no length field, so confirmation works differently
from the MPEG/AAC skeleton in `crate::framing`: a tentative frame is
confirmed either by flushing or by finding another valid header at a
candidate offset *and* matching the trailing CRC-16 footer over
everything in between.
*/

pub mod header;

use crate::error::Warning;
use crate::frame::{map_codec_frame_stats, CodecFrame, Header, HeaderInfo};
use crate::header_cache::{HeaderCache, UpdateFields};
use crate::reader::RawBuffer;
use header::{FlacHeader, StreamInfoDefaults};

const MIN_FRAME_SIZE: usize = 2;
const MAX_FRAME_SIZE: usize = 512 * 1024;

enum Confirm {
    Frame(Box<[u8]>),
    Failed,
    Suspend,
}

fn crc_ok(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, footer) = frame.split_at(frame.len() - 2);
    let expected = u16::from_be_bytes([footer[0], footer[1]]);
    crate::crc::flac_crc16(body) == expected
}

/// Scans `data` for the next FLAC sync word (`0xFF` followed by
/// `0xF8`/`0xF9`) at or after byte index `from`. `None` means no
/// candidate exists within the currently buffered bytes.
fn next_sync_candidate(data: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < data.len() {
        if data[i] == 0xFF && (data[i + 1] & 0xFE) == 0xF8 {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Drives the FLAC native sync loop. Holds an optional STREAMINFO
/// fallback for coded-zero sample-rate/bit-depth fields; native FLAC
/// streams have no STREAMINFO in scope for this parser (it only
/// appears in the container's metadata blocks, out of scope here), so
/// this stays `None` outside the FLAC-in-Ogg path, which supplies it.
pub struct FlacParser {
    cache: HeaderCache,
    streaminfo: Option<StreamInfoDefaults>,
}

impl FlacParser {
    pub fn new() -> Self {
        FlacParser { cache: HeaderCache::new(), streaminfo: None }
    }

    pub(crate) fn with_streaminfo(defaults: StreamInfoDefaults) -> Self {
        FlacParser { cache: HeaderCache::new(), streaminfo: Some(defaults) }
    }

    fn confirm_and_take(&self, buf: &RawBuffer, header: &FlacHeader) -> Confirm {
        let mut next_offset = header.header_len + MIN_FRAME_SIZE;
        loop {
            if next_offset > MAX_FRAME_SIZE {
                return Confirm::Failed;
            }
            let whole = match buf.read_raw_data(0, 0) {
                Some(v) => v,
                None => return Confirm::Suspend,
            };
            if buf.flushing {
                let take = next_offset.min(whole.len());
                if take >= header.header_len + 2 && crc_ok(&whole[..take]) {
                    return Confirm::Frame(whole[..take].to_vec().into_boxed_slice());
                }
            } else {
                if whole.len() <= next_offset {
                    return Confirm::Suspend;
                }
                let candidate_view = &whole[next_offset..];
                let confirmed =
                    FlacHeader::parse(candidate_view, self.streaminfo.as_ref()).is_ok();
                if confirmed && crc_ok(&whole[..next_offset]) {
                    return Confirm::Frame(whole[..next_offset].to_vec().into_boxed_slice());
                }
            }
            match next_sync_candidate(whole, next_offset + 1) {
                Some(off) => next_offset = off,
                None => {
                    if !buf.flushing {
                        return Confirm::Suspend;
                    }
                    // No further sync word anywhere in the buffered
                    // tail: this is the last frame in the stream.
                    // Try the entire remainder once, in case it's
                    // longer than the last offset we checked.
                    if whole.len() > next_offset
                        && whole.len() >= header.header_len + 2
                        && crc_ok(whole)
                    {
                        return Confirm::Frame(whole.to_vec().into_boxed_slice());
                    }
                    return Confirm::Failed;
                }
            }
        }
    }

    fn next_frame(
        &mut self,
        buf: &mut RawBuffer,
        warnings: &mut Vec<Warning>,
    ) -> Option<(FlacHeader, Box<[u8]>)> {
        loop {
            let data = buf.read_raw_data(0, 0)?;
            if data.len() < 2 {
                return None;
            }
            if !(data[0] == 0xFF && (data[1] & 0xFE) == 0xF8) {
                warnings.push(Warning::UnrecognizedByte);
                buf.increment_raw_data(1);
                continue;
            }
            let header = match FlacHeader::parse(data, self.streaminfo.as_ref()) {
                Ok(h) => h,
                Err(_) => {
                    warnings.push(Warning::HeaderBadFormat);
                    buf.increment_raw_data(1);
                    continue;
                }
            };
            match self.confirm_and_take(buf, &header) {
                Confirm::Frame(frame_data) => {
                    self.cache.enable();
                    buf.increment_raw_data(frame_data.len());
                    return Some((header, frame_data));
                }
                Confirm::Failed => {
                    warnings.push(Warning::ConfirmationFailed);
                    self.cache.reset();
                    buf.increment_raw_data(1);
                    continue;
                }
                Confirm::Suspend => return None,
            }
        }
    }

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
        while let Some((header, data)) = self.next_frame(buf, warnings) {
            let key = header.cache_key();
            let fields = UpdateFields {
                sample_rate: header.sample_rate,
                channels: header.channels(),
                bit_depth: header.bit_depth,
            };
            self.cache.set_header(&key, fields.clone());
            let samples = header.block_size;

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

impl Default for FlacParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flac_frame(frame_number: u8) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xF8, 0x49, 0x18, frame_number, 0xAB];
        frame.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        let crc = crate::crc::flac_crc16(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame
    }

    #[test]
    fn confirms_a_frame_followed_by_more_data() {
        let mut buf = RawBuffer::new();
        let mut data = flac_frame(0);
        data.extend_from_slice(&flac_frame(1));
        buf.append(&data);

        let mut parser = FlacParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        let frames = parser.step(
            &mut buf,
            &mut frame_number,
            &mut total_bytes_out,
            &mut total_samples,
            &mut warnings,
            &mut |_, _| {},
        );

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, 1152);
    }

    /// Regression: the only frame left in the buffer at flush time, with
    /// no further sync word anywhere after it, must still confirm via
    /// its own CRC-16 footer rather than being discarded as `Failed`.
    #[test]
    fn flush_confirms_the_trailing_frame_with_no_following_sync_word() {
        let mut buf = RawBuffer::new();
        buf.append(&flac_frame(0));
        buf.set_flushing();

        let mut parser = FlacParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        let frames = parser.step(
            &mut buf,
            &mut frame_number,
            &mut total_bytes_out,
            &mut total_samples,
            &mut warnings,
            &mut |_, _| {},
        );

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, 1152);
    }

    #[test]
    fn unrecognized_leading_bytes_are_skipped_one_at_a_time() {
        let mut buf = RawBuffer::new();
        buf.append(&[0x00, 0x11, 0x22]);
        buf.append(&flac_frame(0));
        buf.set_flushing();

        let mut parser = FlacParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        let frames = parser.step(
            &mut buf,
            &mut frame_number,
            &mut total_bytes_out,
            &mut total_samples,
            &mut warnings,
            &mut |_, _| {},
        );

        assert_eq!(frames.len(), 1);
        assert_eq!(warnings.iter().filter(|w| matches!(w, Warning::UnrecognizedByte)).count(), 3);
    }
}
