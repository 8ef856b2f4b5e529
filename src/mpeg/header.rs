// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
MPEG audio frame header decoding (§4.4).
*/

use crate::bitreader::BitReader;
use crate::frame::HeaderInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg2_5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    LayerI,
    LayerII,
    LayerIII,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    fn as_str(&self) -> &'static str {
        match self {
            ChannelMode::Stereo => "stereo",
            ChannelMode::JointStereo => "joint stereo",
            ChannelMode::DualChannel => "dual channel",
            ChannelMode::Mono => "mono",
        }
    }

    fn channels(&self) -> u8 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    None,
    Ms50_15,
    CcitJ17,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MpegHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub has_crc: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub private_bit: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: Emphasis,
    pub sample_rate: u32,
    pub samples: u32,
    pub frame_length: u32,
    bitrate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegHeaderError {
    Truncated,
    BadSync,
    ReservedVersion,
    ReservedLayer,
    BadBitrateIndex,
    BadSampleRateIndex,
    ReservedEmphasis,
}

// index 0 is MPEG1, index 1 is MPEG2/2.5 (same bitrate table for both).
const BITRATE_TABLE_V1: [[u16; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448], // layer I
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],    // layer II
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],     // layer III
];
const BITRATE_TABLE_V2: [[u16; 15]; 3] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256], // layer I
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],      // layer II
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],      // layer III
];

const SAMPLE_RATE_TABLE: [[u32; 3]; 3] = [
    [44_100, 48_000, 32_000], // MPEG1
    [22_050, 24_000, 16_000], // MPEG2
    [11_025, 12_000, 8_000],  // MPEG2.5
];

impl MpegHeader {
    /// Parses a 4-byte (or 6-byte with CRC) header starting at `data[0]`.
    pub fn parse(data: &[u8]) -> Result<Self, MpegHeaderError> {
        if data.len() < 4 {
            return Err(MpegHeaderError::Truncated);
        }
        let mut r = BitReader::new(&data[..4]);
        let sync = r.read_bits(11).unwrap();
        if sync != 0b111_1111_1111 {
            return Err(MpegHeaderError::BadSync);
        }
        let version_bits = r.read_bits(2).unwrap();
        let version = match version_bits {
            0b00 => MpegVersion::Mpeg2_5,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return Err(MpegHeaderError::ReservedVersion),
        };
        let layer_bits = r.read_bits(2).unwrap();
        let layer = match layer_bits {
            0b01 => MpegLayer::LayerIII,
            0b10 => MpegLayer::LayerII,
            0b11 => MpegLayer::LayerI,
            _ => return Err(MpegHeaderError::ReservedLayer),
        };
        let protection_bit = r.read_bool().unwrap();
        let has_crc = !protection_bit;
        let bitrate_index = r.read_bits(4).unwrap() as u8;
        if bitrate_index == 0x0 || bitrate_index == 0xF {
            return Err(MpegHeaderError::BadBitrateIndex);
        }
        let sample_rate_index = r.read_bits(2).unwrap() as u8;
        if sample_rate_index == 0x3 {
            return Err(MpegHeaderError::BadSampleRateIndex);
        }
        let padding = r.read_bool().unwrap();
        let private_bit = r.read_bool().unwrap();
        let channel_mode_bits = r.read_bits(2).unwrap();
        let channel_mode = match channel_mode_bits {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };
        // Spec-correct indexing: this is a plain 2-bit field read via the
        // bit reader, not a raw masked byte, so it's always in 0..=3
        // regardless of layer (the source system's Layer III path
        // indexed from the unshifted byte instead).
        let mode_extension = r.read_bits(2).unwrap() as u8;
        let copyright = r.read_bool().unwrap();
        let original = r.read_bool().unwrap();
        let emphasis_bits = r.read_bits(2).unwrap();
        let emphasis = match emphasis_bits {
            0b00 => Emphasis::None,
            0b01 => Emphasis::Ms50_15,
            0b11 => Emphasis::CcitJ17,
            _ => return Err(MpegHeaderError::ReservedEmphasis),
        };

        let version_row = match version {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg2_5 => 1,
        };
        let layer_row = match layer {
            MpegLayer::LayerI => 0,
            MpegLayer::LayerII => 1,
            MpegLayer::LayerIII => 2,
        };
        let bitrate_kbps = if version_row == 0 {
            BITRATE_TABLE_V1[layer_row][bitrate_index as usize]
        } else {
            BITRATE_TABLE_V2[layer_row][bitrate_index as usize]
        } as u32;

        let sample_rate_row = match version {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            MpegVersion::Mpeg2_5 => 2,
        };
        let sample_rate = SAMPLE_RATE_TABLE[sample_rate_row][sample_rate_index as usize];

        let samples = match (version, layer) {
            (_, MpegLayer::LayerI) => 384,
            (_, MpegLayer::LayerII) => 1152,
            (MpegVersion::Mpeg1, MpegLayer::LayerIII) => 1152,
            (_, MpegLayer::LayerIII) => 576,
        };

        let pad_bytes: u32 = match layer {
            MpegLayer::LayerI => 4,
            _ => 1,
        };
        let frame_length =
            (125u64 * bitrate_kbps as u64 * samples as u64 / sample_rate as u64) as u32
                + if padding { pad_bytes } else { 0 };

        Ok(MpegHeader {
            version,
            layer,
            has_crc,
            bitrate_index,
            sample_rate_index,
            padding,
            private_bit,
            channel_mode,
            mode_extension,
            copyright,
            original,
            emphasis,
            sample_rate,
            samples,
            frame_length,
            bitrate: 0,
        })
    }

    pub fn header_byte_length(&self) -> usize {
        if self.has_crc {
            6
        } else {
            4
        }
    }
}

impl HeaderInfo for MpegHeader {
    fn byte_length(&self) -> usize {
        self.header_byte_length()
    }
    fn bit_depth(&self) -> u8 {
        16
    }
    fn channels(&self) -> u8 {
        self.channel_mode.channels()
    }
    fn channel_mode(&self) -> &str {
        self.channel_mode.as_str()
    }
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    fn bitrate(&self) -> u32 {
        self.bitrate
    }
    fn set_bitrate(&mut self, bitrate: u32) {
        self.bitrate = bitrate;
    }
    fn cache_key(&self) -> String {
        format!(
            "mpeg:{:?}:{:?}:crc{}:br{}:sr{}:cm{:?}:me{}:cp{}:or{}:em{:?}",
            self.version,
            self.layer,
            self.has_crc as u8,
            self.bitrate_index,
            self.sample_rate_index,
            self.channel_mode,
            self.mode_extension,
            self.copyright as u8,
            self.original as u8,
            self.emphasis,
        )
    }
}
