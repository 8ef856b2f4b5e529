// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Ogg container state machine (§4.6): page sync + CRC-32 validation,
continued-packet stitching, codec identification from the first page,
and dispatch to the nested Opus/Vorbis/FLAC-in-Ogg parser.
*/

pub mod flac;
pub mod opus;
pub mod page;
pub mod vorbis;

use crate::error::{DemuxError, Warning};
use crate::frame::{map_codec_frame_stats, CodecFrame, Header, OggPage};
use crate::header_cache::UpdateFields;
use crate::reader::RawBuffer;
use page::{build_segments, verify_page_crc, PageHeader, PageHeaderError, FIXED_HEADER_LEN};

/// The nested codec selected at first-page identification (§9: "Ogg's
/// nested parser is chosen at first-page identification and stored as
/// a variant").
enum NestedCodec {
    Opus { header: Option<opus::OpusHeader> },
    Vorbis {
        header: Option<vorbis::VorbisHeader>,
        mode_table: Option<vorbis::ModeTable>,
    },
    Flac(flac::FlacInOgg),
    /// An Ogg Skeleton logical stream (`fishead`/`fisbone`/`index`);
    /// carries no audio frames, skipped silently.
    Skeleton,
}

fn identify_codec(first_packet: &[u8]) -> Result<NestedCodec, DemuxError> {
    if first_packet.len() >= 8 && &first_packet[0..8] == opus::MAGIC {
        return Ok(NestedCodec::Opus { header: opus::OpusHeader::parse(first_packet).ok() });
    }
    if first_packet.len() >= 7 && &first_packet[0..7] == vorbis::MAGIC {
        return Ok(NestedCodec::Vorbis {
            header: vorbis::VorbisHeader::parse(first_packet).ok(),
            mode_table: None,
        });
    }
    if first_packet.len() >= 5 && &first_packet[0..5] == flac::MAGIC {
        return Ok(NestedCodec::Flac(flac::FlacInOgg::new()));
    }
    if first_packet.starts_with(b"fishead\0")
        || first_packet.starts_with(b"fisbone\0")
        || first_packet.starts_with(b"index\0\0\0")
    {
        return Ok(NestedCodec::Skeleton);
    }
    Err(DemuxError::UnknownOggCodec)
}

fn codec_tag(codec: &NestedCodec) -> Option<&'static str> {
    match codec {
        NestedCodec::Opus { .. } => Some("opus"),
        NestedCodec::Vorbis { .. } => Some("vorbis"),
        NestedCodec::Flac(_) => Some("flac"),
        NestedCodec::Skeleton => None,
    }
}

/// Frame count encoded in an Opus TOC byte's low 2 bits. Every code
/// yields exactly one Ogg-level `CodecFrame` (one per segment, per
/// §4.6); this only scales the sample count the frame represents.
fn opus_frame_count(code: opus::FrameCountCode, segment: &[u8]) -> u32 {
    match code {
        opus::FrameCountCode::One => 1,
        opus::FrameCountCode::TwoEqual => 2,
        opus::FrameCountCode::TwoDifferent => 2,
        opus::FrameCountCode::Arbitrary => segment.get(1).map(|b| (b & 0x3F) as u32).unwrap_or(1).max(1),
    }
}

fn handle_opus_page(
    state: &mut Option<opus::OpusHeader>,
    page_index: u64,
    segments: &[Box<[u8]>],
    frame_number: &mut u64,
    total_bytes_out: &mut u64,
    total_samples: &mut u64,
) -> Vec<CodecFrame> {
    if page_index <= 1 {
        return Vec::new();
    }
    let header = match state {
        Some(h) => h.clone(),
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    for segment in segments {
        let Some(&toc_byte) = segment.first() else { continue };
        let toc = opus::Toc::decode(toc_byte);
        let frame_count = opus_frame_count(toc.code, segment);
        let samples = toc.samples_per_frame() * frame_count;
        let data: Box<[u8]> = segment.clone();
        let frame = map_codec_frame_stats(
            Header::Opus(header.clone()),
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
    out
}

fn handle_vorbis_page(
    header: &mut Option<vorbis::VorbisHeader>,
    mode_table: &mut Option<vorbis::ModeTable>,
    page_index: u64,
    segments: &[Box<[u8]>],
    frame_number: &mut u64,
    total_bytes_out: &mut u64,
    total_samples: &mut u64,
) -> Result<Vec<CodecFrame>, DemuxError> {
    if page_index == 0 {
        return Ok(Vec::new());
    }
    if page_index == 1 {
        if let (Some(h), Some(setup)) = (header.as_ref(), segments.get(1)) {
            *mode_table = Some(vorbis::build_mode_table(setup, h.blocksize_0, h.blocksize_1)?);
        }
        return Ok(Vec::new());
    }
    let (Some(h), Some(table)) = (header.as_ref().cloned(), mode_table.as_mut()) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for segment in segments {
        let Some(&first_byte) = segment.first() else { continue };
        let samples = table.samples_for_packet(first_byte);
        let data: Box<[u8]> = segment.clone();
        let frame = map_codec_frame_stats(
            Header::Vorbis(h.clone()),
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
    Ok(out)
}

/// Drives the Ogg page sync loop and the nested codec dispatch.
pub struct OggParser {
    codec: Option<NestedCodec>,
    codec_tag: &'static str,
    pages_seen: u64,
    continued_tail: Option<Vec<u8>>,
    last_sequence: Option<u32>,
    last_bitrate: Option<u32>,
    running_duration_ms: f64,
}

impl OggParser {
    pub fn new() -> Self {
        OggParser {
            codec: None,
            codec_tag: "",
            pages_seen: 0,
            continued_tail: None,
            last_sequence: None,
            last_bitrate: None,
            running_duration_ms: 0.0,
        }
    }

    pub(crate) fn codec_tag(&self) -> &'static str {
        self.codec_tag
    }

    pub(crate) fn reset(&mut self) {
        self.codec = None;
        self.codec_tag = "";
        self.pages_seen = 0;
        self.continued_tail = None;
        self.last_sequence = None;
        self.last_bitrate = None;
        self.running_duration_ms = 0.0;
    }

    /// Emits every Ogg page that can be fully validated right now.
    pub(crate) fn step(
        &mut self,
        buf: &mut RawBuffer,
        frame_number: &mut u64,
        total_bytes_out: &mut u64,
        total_samples: &mut u64,
        warnings: &mut Vec<Warning>,
        on_codec: &mut dyn FnMut(&str),
        on_codec_update: &mut dyn FnMut(u32, &UpdateFields),
    ) -> Result<Vec<OggPage>, DemuxError> {
        let mut out = Vec::new();
        loop {
            let Some(data) = buf.read_raw_data(FIXED_HEADER_LEN - 1, 0) else { break };
            if data.is_empty() {
                break;
            }
            if data.len() < 4 || &data[0..4] != b"OggS" {
                warnings.push(Warning::UnrecognizedByte);
                buf.increment_raw_data(1);
                continue;
            }
            let header = match PageHeader::parse(data) {
                Ok(h) => h,
                Err(PageHeaderError::Truncated) => {
                    if buf.flushing {
                        warnings.push(Warning::HeaderBadFormat);
                        buf.increment_raw_data(1);
                        continue;
                    }
                    break;
                }
                Err(_) => {
                    warnings.push(Warning::HeaderBadFormat);
                    buf.increment_raw_data(1);
                    continue;
                }
            };
            let total_len = header.header_len + header.payload_len;
            if data.len() < total_len {
                break;
            }
            let page_bytes = &data[..total_len];
            if !verify_page_crc(page_bytes, header.page_checksum) {
                warnings.push(Warning::OggPageCrcMismatch);
                buf.increment_raw_data(1);
                continue;
            }

            if let Some(last) = self.last_sequence {
                if last > 1 && header.page_sequence_number > 1 && header.page_sequence_number != last + 1 {
                    warnings.push(Warning::OggSequenceGap {
                        expected: last + 1,
                        actual: header.page_sequence_number,
                    });
                }
            }
            self.last_sequence = Some(header.page_sequence_number);

            let payload = &page_bytes[header.header_len..];
            let (mut segments, tail) = build_segments(&header.segment_table, payload);

            if header.flags.continued {
                if let Some(mut prev) = self.continued_tail.take() {
                    if let Some(first) = segments.first() {
                        prev.extend_from_slice(first);
                        segments[0] = prev.into_boxed_slice();
                    }
                }
            }
            self.continued_tail = tail;

            if self.pages_seen == 0 && self.codec.is_none() {
                let first_packet: &[u8] = segments.first().map(|s| &s[..]).unwrap_or(&[]);
                let codec = identify_codec(first_packet)?;
                if let Some(tag) = codec_tag(&codec) {
                    self.codec_tag = tag;
                    on_codec(tag);
                }
                self.codec = Some(codec);
            }

            let codec_frames = match self.codec.as_mut() {
                Some(NestedCodec::Opus { header }) => handle_opus_page(
                    header,
                    self.pages_seen,
                    &segments,
                    frame_number,
                    total_bytes_out,
                    total_samples,
                ),
                Some(NestedCodec::Vorbis { header, mode_table }) => handle_vorbis_page(
                    header,
                    mode_table,
                    self.pages_seen,
                    &segments,
                    frame_number,
                    total_bytes_out,
                    total_samples,
                )?,
                Some(NestedCodec::Flac(inner)) => inner.handle_page(
                    self.pages_seen,
                    &segments,
                    frame_number,
                    total_bytes_out,
                    total_samples,
                ),
                Some(NestedCodec::Skeleton) | None => Vec::new(),
            };

            for frame in &codec_frames {
                let bitrate = frame.header.bitrate();
                if self.last_bitrate != Some(bitrate) {
                    self.last_bitrate = Some(bitrate);
                    let fields = UpdateFields {
                        sample_rate: frame.header.sample_rate(),
                        channels: frame.header.channels(),
                        bit_depth: frame.header.bit_depth(),
                    };
                    on_codec_update(bitrate, &fields);
                }
            }

            // The running total once this page's frames are accounted
            // for; unchanged if the page carried no frames (header or
            // Skeleton pages).
            if let Some(last) = codec_frames.last() {
                self.running_duration_ms = last.total_duration_ms + last.duration_ms;
            }
            let total_duration_ms = self.running_duration_ms;

            let page = OggPage {
                raw_data: page_bytes.to_vec().into_boxed_slice(),
                segments,
                codec_frames,
                absolute_granule_position: header.absolute_granule_position,
                page_sequence_number: header.page_sequence_number,
                stream_serial_number: header.stream_serial_number,
                crc32: header.page_checksum,
                is_continued_packet: header.flags.continued,
                is_first_page: header.flags.first,
                is_last_page: header.flags.last,
                total_samples: *total_samples,
                total_duration_ms,
                total_bytes_out: *total_bytes_out,
            };
            out.push(page);
            self.pages_seen += 1;
            buf.increment_raw_data(total_len);
        }
        Ok(out)
    }
}

impl Default for OggParser {
    fn default() -> Self {
        Self::new()
    }
}

use crate::frame::HeaderInfo as _;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::ogg_crc32;

    fn build_page(
        serial: u32,
        sequence: u32,
        flags: u8,
        segment_table: &[u8],
        payload: &[u8],
    ) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0);
        page.push(flags);
        page.extend_from_slice(&0i64.to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&sequence.to_le_bytes());
        page.extend_from_slice(&0u32.to_le_bytes());
        page.push(segment_table.len() as u8);
        page.extend_from_slice(segment_table);
        page.extend_from_slice(payload);
        let crc = ogg_crc32(&page);
        page[22..26].copy_from_slice(&crc.to_le_bytes());
        page
    }

    fn opus_id_header() -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(opus::MAGIC);
        h.push(1);
        h.push(1);
        h.extend_from_slice(&0u16.to_le_bytes());
        h.extend_from_slice(&48_000u32.to_le_bytes());
        h.extend_from_slice(&0i16.to_le_bytes());
        h.push(0);
        h
    }

    #[test]
    fn s4_scenario_identifies_opus_and_decodes_toc_frame() {
        let mut buf = RawBuffer::new();
        let id = opus_id_header();
        let page0 = build_page(1, 0, 0x02, &[id.len() as u8], &id);
        let tags = b"OpusTags".to_vec();
        let page1 = build_page(1, 1, 0x00, &[tags.len() as u8], &tags);
        let toc = vec![0x78u8];
        let page2 = build_page(1, 2, 0x04, &[toc.len() as u8], &toc);
        buf.append(&page0);
        buf.append(&page1);
        buf.append(&page2);
        buf.set_flushing();

        let mut parser = OggParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        let mut codec_seen = String::new();
        let pages = parser
            .step(
                &mut buf,
                &mut frame_number,
                &mut total_bytes_out,
                &mut total_samples,
                &mut warnings,
                &mut |tag| codec_seen = tag.to_string(),
                &mut |_, _| {},
            )
            .unwrap();

        assert_eq!(codec_seen, "opus");
        assert_eq!(pages.len(), 3);
        assert!(pages[0].codec_frames.is_empty());
        assert!(pages[1].codec_frames.is_empty());
        assert_eq!(pages[2].codec_frames.len(), 1);
        assert_eq!(pages[2].codec_frames[0].samples, 960);
        assert!((pages[2].codec_frames[0].duration_ms - 20.0).abs() < 1e-6);
    }

    #[test]
    fn s5_scenario_stitches_continued_packet_across_pages() {
        let mut buf = RawBuffer::new();
        let id = {
            let mut h = Vec::new();
            h.push(1);
            h.extend_from_slice(b"vorbis");
            h.extend_from_slice(&0u32.to_le_bytes());
            h.push(1);
            h.extend_from_slice(&44_100u32.to_le_bytes());
            h.extend_from_slice(&0i32.to_le_bytes());
            h.extend_from_slice(&0i32.to_le_bytes());
            h.extend_from_slice(&0i32.to_le_bytes());
            h.push(0x08 | (0x0A << 4));
            h.push(0x01);
            h
        };
        let page0 = build_page(2, 0, 0x02, &[id.len() as u8], &id);
        buf.append(&page0);

        let a_last_segment = vec![0xAAu8; 255];
        let page_a = build_page(2, 1, 0x00, &[255], &a_last_segment);
        buf.append(&page_a);

        let b_first_segment = vec![0xBBu8; 10];
        let page_b = build_page(2, 2, 0x01, &[10], &b_first_segment);
        buf.append(&page_b);
        buf.set_flushing();

        let mut parser = OggParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        let pages = parser
            .step(
                &mut buf,
                &mut frame_number,
                &mut total_bytes_out,
                &mut total_samples,
                &mut warnings,
                &mut |_| {},
                &mut |_, _| {},
            )
            .unwrap();

        // page0 is the id header; page_a's only segment is a continued
        // tail (popped, not emitted as a segment); page_b's stitched
        // first segment is the id-header setup page, consumed as such
        // above, so the actual audio dispatch starts once a setup page
        // has been seen. Here we assert the raw stitching behavior
        // directly via the pages' `segments` field instead of routing
        // through the (separately tested) Vorbis mode table.
        assert_eq!(pages.len(), 3);
        assert!(pages[1].segments.is_empty());
        assert_eq!(pages[2].segments.len(), 1);
        let mut expected = a_last_segment.clone();
        expected.extend_from_slice(&b_first_segment);
        assert_eq!(&*pages[2].segments[0], &expected[..]);
    }

    #[test]
    fn sequence_gap_warning_skipped_during_initial_pages() {
        let mut buf = RawBuffer::new();
        let id = opus_id_header();
        // page sequence jumps from 0 straight to 5: both sides are
        // ≤1 is false for the second (5), but the *first* observed
        // sequence (0) is ≤1, so no warning on this first transition.
        let page0 = build_page(1, 0, 0x02, &[id.len() as u8], &id);
        let toc = vec![0x78u8];
        let page1 = build_page(1, 5, 0x00, &[toc.len() as u8], &toc);
        buf.append(&page0);
        buf.append(&page1);
        buf.set_flushing();

        let mut parser = OggParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        parser
            .step(
                &mut buf,
                &mut frame_number,
                &mut total_bytes_out,
                &mut total_samples,
                &mut warnings,
                &mut |_| {},
                &mut |_, _| {},
            )
            .unwrap();

        assert!(warnings.iter().all(|w| !matches!(w, Warning::OggSequenceGap { .. })));
    }

    #[test]
    fn crc_mismatch_is_warned_and_page_is_skipped() {
        let mut buf = RawBuffer::new();
        let id = opus_id_header();
        let mut page0 = build_page(1, 0, 0x02, &[id.len() as u8], &id);
        page0[22] ^= 0xFF;
        buf.append(&page0);
        buf.set_flushing();

        let mut parser = OggParser::new();
        let mut frame_number = 0u64;
        let mut total_bytes_out = 0u64;
        let mut total_samples = 0u64;
        let mut warnings = Vec::new();
        let pages = parser
            .step(
                &mut buf,
                &mut frame_number,
                &mut total_bytes_out,
                &mut total_samples,
                &mut warnings,
                &mut |_| {},
                &mut |_, _| {},
            )
            .unwrap();

        assert!(pages.is_empty());
        assert!(warnings.contains(&Warning::OggPageCrcMismatch));
    }
}
