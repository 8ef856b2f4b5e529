// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Top-level driver (§4.7, §6): MIME-to-parser selection, ID3v2 skip at
stream start for the MPEG family, and the `push`/`flush` loop that
ties a codec parser to the raw buffer and turns its output into
[`Frame`]s.
*/

use std::time::{SystemTime, UNIX_EPOCH};

use crate::aac::AacParser;
use crate::error::{DemuxError, Warning};
use crate::flac::FlacParser;
use crate::frame::{CodecFrame, Frame, OggPage};
use crate::header_cache::{CodecUpdate, UpdateFields};
use crate::mpeg::MpegParser;
use crate::ogg::OggParser;
use crate::reader::RawBuffer;
use crate::{DemuxerOptions, Mime};

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

enum ParserKind {
    Mpeg(MpegParser),
    Aac(AacParser),
    Flac(FlacParser),
    Ogg(OggParser),
}

impl ParserKind {
    fn reset(&mut self) {
        match self {
            ParserKind::Mpeg(p) => p.reset(),
            ParserKind::Aac(p) => p.reset(),
            ParserKind::Flac(p) => p.reset(),
            ParserKind::Ogg(p) => p.reset(),
        }
    }
}

/// Owns the raw buffer, the selected codec parser, the running driver
/// counters (§3: Driver state), and the caller's callbacks.
pub(crate) struct Driver {
    buf: RawBuffer,
    parser: ParserKind,
    mime: Mime,
    frame_number: u64,
    total_bytes_out: u64,
    total_samples: u64,
    id3_checked: bool,
    codec: String,
    on_codec: Option<Box<dyn FnMut(&str)>>,
    on_codec_update: Option<Box<dyn FnMut(&CodecUpdate, u128)>>,
    enable_logging: bool,
}

impl Driver {
    pub(crate) fn new(mime: Mime, options: DemuxerOptions) -> Self {
        let (parser, codec) = match mime {
            Mime::Mpeg => (ParserKind::Mpeg(MpegParser::new()), "mpeg".to_string()),
            Mime::Aac => (ParserKind::Aac(AacParser::new()), "aac".to_string()),
            Mime::Flac => (ParserKind::Flac(FlacParser::new()), "flac".to_string()),
            Mime::Ogg => (ParserKind::Ogg(OggParser::new()), String::new()),
        };
        Driver {
            buf: RawBuffer::new(),
            parser,
            mime,
            frame_number: 0,
            total_bytes_out: 0,
            total_samples: 0,
            id3_checked: false,
            codec,
            on_codec: options.on_codec,
            on_codec_update: options.on_codec_update,
            enable_logging: options.enable_logging,
        }
    }

    pub(crate) fn codec(&self) -> &str {
        &self.codec
    }

    pub(crate) fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, DemuxError> {
        self.buf.append(chunk);
        self.run()
    }

    pub(crate) fn flush(&mut self) -> Result<Vec<Frame>, DemuxError> {
        self.buf.set_flushing();
        let frames = self.run()?;
        // §3 lifecycle: after draining, rebuild a fresh coroutine and
        // cache so a subsequent push starts a new stream.
        self.buf = RawBuffer::new();
        self.parser.reset();
        self.frame_number = 0;
        self.total_bytes_out = 0;
        self.total_samples = 0;
        self.id3_checked = false;
        self.codec = match self.mime {
            Mime::Mpeg => "mpeg".to_string(),
            Mime::Aac => "aac".to_string(),
            Mime::Flac => "flac".to_string(),
            Mime::Ogg => String::new(),
        };
        Ok(frames)
    }

    fn maybe_skip_id3(&mut self) {
        if self.id3_checked {
            return;
        }
        self.id3_checked = true;
        if !matches!(self.mime, Mime::Mpeg | Mime::Aac) {
            return;
        }
        let Some(data) = self.buf.read_raw_data(9, 0) else { return };
        if let Some(skip) = crate::id3::leading_tag_length(data) {
            self.buf.increment_raw_data(skip.min(data.len()));
        }
    }

    fn run(&mut self) -> Result<Vec<Frame>, DemuxError> {
        self.maybe_skip_id3();

        let Driver {
            buf,
            parser,
            frame_number,
            total_bytes_out,
            total_samples,
            codec,
            on_codec,
            on_codec_update,
            mime,
            enable_logging,
            ..
        } = self;

        let mut warnings: Vec<Warning> = Vec::new();

        let mut update_cb = |bitrate: u32, fields: &UpdateFields| {
            if let Some(cb) = on_codec_update.as_mut() {
                let update = CodecUpdate {
                    bitrate,
                    sample_rate: fields.sample_rate,
                    channels: fields.channels,
                    bit_depth: fields.bit_depth,
                };
                cb(&update, now_millis());
            }
        };

        let frames: Vec<Frame> = match parser {
            ParserKind::Mpeg(p) => p
                .step(buf, frame_number, total_bytes_out, total_samples, &mut warnings, &mut update_cb)
                .into_iter()
                .map(Frame::Codec)
                .collect(),
            ParserKind::Aac(p) => p
                .step(buf, frame_number, total_bytes_out, total_samples, &mut warnings, &mut update_cb)
                .into_iter()
                .map(Frame::Codec)
                .collect(),
            ParserKind::Flac(p) => p
                .step(buf, frame_number, total_bytes_out, total_samples, &mut warnings, &mut update_cb)
                .into_iter()
                .map(Frame::Codec)
                .collect(),
            ParserKind::Ogg(p) => {
                let mut codec_cb = |tag: &str| {
                    *codec = tag.to_string();
                    if let Some(cb) = on_codec.as_mut() {
                        cb(tag);
                    }
                };
                let pages: Vec<OggPage> = p.step(
                    buf,
                    frame_number,
                    total_bytes_out,
                    total_samples,
                    &mut warnings,
                    &mut codec_cb,
                    &mut update_cb,
                )?;
                pages.into_iter().map(Frame::Ogg).collect()
            }
        };

        if *enable_logging {
            for warning in &warnings {
                log::warn!(
                    "{warning} (codec={codec}, mime={mime}, read_position={}, total_bytes_in={}, total_bytes_out={})",
                    buf.current_read_position,
                    buf.total_bytes_in,
                    *total_bytes_out,
                );
            }
        }

        Ok(frames)
    }
}

/// Flattens a slice of [`Frame`]s into their [`CodecFrame`]s, diving
/// into `OggPage::codec_frames` where present. Used by integration
/// tests asserting invariant 2 and 5 across both framed and Ogg-wrapped
/// inputs.
#[cfg(test)]
pub(crate) fn flatten_codec_frames(frames: &[Frame]) -> Vec<&CodecFrame> {
    frames
        .iter()
        .flat_map(|f| match f {
            Frame::Codec(cf) => vec![cf],
            Frame::Ogg(page) => page.codec_frames.iter().collect(),
        })
        .collect()
}
