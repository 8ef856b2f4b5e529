// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Opus-in-Ogg identification header and per-packet TOC-byte decoding
(§4.6).
*/

use crate::frame::HeaderInfo;
use byteorder::{ByteOrder, LittleEndian};

pub(crate) const MAGIC: &[u8] = b"OpusHead";

#[derive(Debug, Clone)]
pub struct OpusHeader {
    pub version: u8,
    pub channel_count: u8,
    pub pre_skip: u16,
    pub input_sample_rate: u32,
    pub output_gain: i16,
    pub channel_mapping_family: u8,
    bitrate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpusHeaderError {
    Truncated,
    BadMagic,
    ZeroChannels,
}

impl OpusHeader {
    pub fn parse(data: &[u8]) -> Result<Self, OpusHeaderError> {
        if data.len() < 19 {
            return Err(OpusHeaderError::Truncated);
        }
        if &data[0..8] != MAGIC {
            return Err(OpusHeaderError::BadMagic);
        }
        let version = data[8];
        let channel_count = data[9];
        if channel_count == 0 {
            return Err(OpusHeaderError::ZeroChannels);
        }
        let pre_skip = LittleEndian::read_u16(&data[10..12]);
        let input_sample_rate = LittleEndian::read_u32(&data[12..16]);
        let output_gain = LittleEndian::read_i16(&data[16..18]);
        let channel_mapping_family = data[18];
        Ok(OpusHeader {
            version,
            channel_count,
            pre_skip,
            input_sample_rate,
            output_gain,
            channel_mapping_family,
            bitrate: 0,
        })
    }
}

// Opus audio is always decoded at a fixed internal rate regardless of
// the stream's original (`input_sample_rate`) rate.
const DECODED_SAMPLE_RATE: u32 = 48_000;

impl HeaderInfo for OpusHeader {
    fn byte_length(&self) -> usize {
        19
    }
    fn bit_depth(&self) -> u8 {
        16
    }
    fn channels(&self) -> u8 {
        self.channel_count
    }
    fn channel_mode(&self) -> &str {
        match self.channel_count {
            1 => "mono",
            2 => "stereo",
            _ => "multichannel",
        }
    }
    fn sample_rate(&self) -> u32 {
        DECODED_SAMPLE_RATE
    }
    fn bitrate(&self) -> u32 {
        self.bitrate
    }
    fn set_bitrate(&mut self, bitrate: u32) {
        self.bitrate = bitrate;
    }
    fn cache_key(&self) -> String {
        format!(
            "opus:v{}:ch{}:fam{}",
            self.version, self.channel_count, self.channel_mapping_family
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpusMode {
    Silk,
    Hybrid,
    Celt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpusBandwidth {
    Narrowband,
    Mediumband,
    Wideband,
    SuperWideband,
    Fullband,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountCode {
    One,
    TwoEqual,
    TwoDifferent,
    Arbitrary,
}

/// The decoded table-of-contents byte (RFC 6716 §3.1): `config`
/// selects mode/bandwidth/frame-duration, `stereo` and `code` (frame
/// count code) are read directly from the low 3 bits.
#[derive(Debug, Clone, Copy)]
pub struct Toc {
    pub config: u8,
    pub stereo: bool,
    pub code: FrameCountCode,
    pub mode: OpusMode,
    pub bandwidth: OpusBandwidth,
    pub frame_size_ms: f64,
}

const CONFIG_TABLE: [(OpusMode, OpusBandwidth, f64); 32] = {
    use OpusBandwidth::*;
    use OpusMode::*;
    [
        (Silk, Narrowband, 10.0),
        (Silk, Narrowband, 20.0),
        (Silk, Narrowband, 40.0),
        (Silk, Narrowband, 60.0),
        (Silk, Mediumband, 10.0),
        (Silk, Mediumband, 20.0),
        (Silk, Mediumband, 40.0),
        (Silk, Mediumband, 60.0),
        (Silk, Wideband, 10.0),
        (Silk, Wideband, 20.0),
        (Silk, Wideband, 40.0),
        (Silk, Wideband, 60.0),
        (Hybrid, SuperWideband, 10.0),
        (Hybrid, SuperWideband, 20.0),
        (Hybrid, Fullband, 10.0),
        (Hybrid, Fullband, 20.0),
        (Celt, Narrowband, 2.5),
        (Celt, Narrowband, 5.0),
        (Celt, Narrowband, 10.0),
        (Celt, Narrowband, 20.0),
        (Celt, Wideband, 2.5),
        (Celt, Wideband, 5.0),
        (Celt, Wideband, 10.0),
        (Celt, Wideband, 20.0),
        (Celt, SuperWideband, 2.5),
        (Celt, SuperWideband, 5.0),
        (Celt, SuperWideband, 10.0),
        (Celt, SuperWideband, 20.0),
        (Celt, Fullband, 2.5),
        (Celt, Fullband, 5.0),
        (Celt, Fullband, 10.0),
        (Celt, Fullband, 20.0),
    ]
};

impl Toc {
    pub fn decode(byte: u8) -> Self {
        let config = byte >> 3;
        let stereo = (byte >> 2) & 1 != 0;
        let code = match byte & 0x3 {
            0 => FrameCountCode::One,
            1 => FrameCountCode::TwoEqual,
            2 => FrameCountCode::TwoDifferent,
            _ => FrameCountCode::Arbitrary,
        };
        let (mode, bandwidth, frame_size_ms) = CONFIG_TABLE[config as usize];
        Toc { config, stereo, code, mode, bandwidth, frame_size_ms }
    }

    /// Number of 48 kHz samples represented by a single frame at this
    /// TOC's duration (not multiplied by frame count).
    pub fn samples_per_frame(&self) -> u32 {
        (self.frame_size_ms * DECODED_SAMPLE_RATE as f64 / 1000.0).round() as u32
    }
}
