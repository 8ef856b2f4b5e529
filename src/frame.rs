// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
The data model shared across codecs (§3): headers, frames and the Ogg
page wrapper.

Every emitted [`Frame`] owns its bytes — it is cloned out of the
driver's [`crate::reader::RawBuffer`] at emit time rather than
borrowing from it, per the zero-copy-vs-ownership decision recorded in
DESIGN.md: the buffer is advanced immediately after a frame is built,
which would otherwise invalidate a borrowed view before the caller
ever sees it.
*/

use crate::aac::header::AacHeader;
use crate::flac::header::FlacHeader;
use crate::mpeg::header::MpegHeader;
use crate::ogg::opus::OpusHeader;
use crate::ogg::vorbis::VorbisHeader;

/// Fields common to every codec header, exposed uniformly so the
/// statistics mapper (§4.7) doesn't need to match on codec identity.
pub trait HeaderInfo {
    /// Byte length of the header itself (not counting the payload).
    fn byte_length(&self) -> usize;
    fn bit_depth(&self) -> u8;
    fn channels(&self) -> u8;
    fn channel_mode(&self) -> &str;
    fn sample_rate(&self) -> u32;
    fn bitrate(&self) -> u32;
    fn set_bitrate(&mut self, bitrate: u32);
    /// A short string derived from the stable (non length-variable)
    /// bits of the header, used as the header-cache key.
    fn cache_key(&self) -> String;
}

/// The concrete codec header attached to every emitted [`CodecFrame`].
#[derive(Debug, Clone)]
pub enum Header {
    Mpeg(MpegHeader),
    Aac(AacHeader),
    Flac(FlacHeader),
    Opus(OpusHeader),
    Vorbis(VorbisHeader),
}

macro_rules! delegate {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            Header::Mpeg(h) => h.$method($($arg),*),
            Header::Aac(h) => h.$method($($arg),*),
            Header::Flac(h) => h.$method($($arg),*),
            Header::Opus(h) => h.$method($($arg),*),
            Header::Vorbis(h) => h.$method($($arg),*),
        }
    };
}

impl HeaderInfo for Header {
    fn byte_length(&self) -> usize {
        delegate!(self, byte_length)
    }
    fn bit_depth(&self) -> u8 {
        delegate!(self, bit_depth)
    }
    fn channels(&self) -> u8 {
        delegate!(self, channels)
    }
    fn channel_mode(&self) -> &str {
        delegate!(self, channel_mode)
    }
    fn sample_rate(&self) -> u32 {
        delegate!(self, sample_rate)
    }
    fn bitrate(&self) -> u32 {
        delegate!(self, bitrate)
    }
    fn set_bitrate(&mut self, bitrate: u32) {
        delegate!(self, set_bitrate, bitrate)
    }
    fn cache_key(&self) -> String {
        delegate!(self, cache_key)
    }
}

impl Header {
    pub fn codec_name(&self) -> &'static str {
        match self {
            Header::Mpeg(_) => "mpeg",
            Header::Aac(_) => "aac",
            Header::Flac(_) => "flac",
            Header::Opus(_) => "opus",
            Header::Vorbis(_) => "vorbis",
        }
    }
}

/// A fully decoded, self-contained audio frame (§3: CodecFrame).
#[derive(Debug, Clone)]
pub struct CodecFrame {
    pub header: Header,
    /// The exact frame payload bytes, header included.
    pub data: Box<[u8]>,
    pub samples: u32,
    /// `samples / header.sample_rate() * 1000`.
    pub duration_ms: f64,
    pub frame_number: u64,
    pub crc32: u32,
    pub total_bytes_out: u64,
    pub total_samples: u64,
    pub total_duration_ms: f64,
}

/// An Ogg page carrying zero or more codec frames (§3: OggPage).
#[derive(Debug, Clone)]
pub struct OggPage {
    pub raw_data: Box<[u8]>,
    pub segments: Vec<Box<[u8]>>,
    pub codec_frames: Vec<CodecFrame>,
    pub absolute_granule_position: i64,
    pub page_sequence_number: u32,
    pub stream_serial_number: u32,
    pub crc32: u32,
    pub is_continued_packet: bool,
    pub is_first_page: bool,
    pub is_last_page: bool,
    pub total_samples: u64,
    pub total_duration_ms: f64,
    pub total_bytes_out: u64,
}

/// The unit yielded by [`crate::Demuxer::push_chunk`] and
/// [`crate::Demuxer::flush`].
#[derive(Debug, Clone)]
pub enum Frame {
    Codec(CodecFrame),
    Ogg(OggPage),
}

/// Statistics mapping (§4.7): finalizes a decoded codec frame's
/// bitrate, CRC and running totals. `frame_number`, `total_bytes_out`
/// and `total_samples` are the driver's pre-increment counters; the
/// caller is responsible for advancing them afterward and for feeding
/// the resulting bitrate and cumulative duration into the header
/// cache's `check_codec_update`.
pub(crate) fn map_codec_frame_stats(
    mut header: Header,
    data: Box<[u8]>,
    samples: u32,
    frame_number: u64,
    total_bytes_out_before: u64,
    total_samples_before: u64,
) -> CodecFrame {
    let sample_rate = header.sample_rate() as f64;
    let duration_ms = samples as f64 / sample_rate * 1000.0;
    let duration_s = duration_ms / 1000.0;
    let bitrate = if duration_s > 0.0 {
        ((data.len() as f64 / duration_s).round() as i64 * 8).max(0) as u32
    } else {
        0
    };
    header.set_bitrate(bitrate);
    let crc32 = crate::crc::frame_crc32(&data);
    let total_duration_ms = total_samples_before as f64 / sample_rate * 1000.0;
    CodecFrame {
        header,
        data,
        samples,
        duration_ms,
        frame_number,
        crc32,
        total_bytes_out: total_bytes_out_before,
        total_samples: total_samples_before,
        total_duration_ms,
    }
}
