// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
AAC ADTS header decoding (§4.4).
*/

use crate::bitreader::BitReader;
use crate::frame::HeaderInfo;

const SAMPLE_RATE_TABLE: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
    8_000, 7_350,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelConfig {
    // 0 means "defined in the program-config element", not decodable
    // from the fixed header alone; kept distinct from the numbered
    // configurations rather than folded into Mono/Stereo.
    Pce,
    Mono,
    Stereo,
    Three,
    Four,
    Five,
    FiveOne,
    SevenOne,
}

impl ChannelConfig {
    fn from_index(i: u8) -> Option<Self> {
        Some(match i {
            0 => ChannelConfig::Pce,
            1 => ChannelConfig::Mono,
            2 => ChannelConfig::Stereo,
            3 => ChannelConfig::Three,
            4 => ChannelConfig::Four,
            5 => ChannelConfig::Five,
            6 => ChannelConfig::FiveOne,
            7 => ChannelConfig::SevenOne,
            _ => return None,
        })
    }

    fn channels(&self) -> u8 {
        match self {
            ChannelConfig::Pce => 0,
            ChannelConfig::Mono => 1,
            ChannelConfig::Stereo => 2,
            ChannelConfig::Three => 3,
            ChannelConfig::Four => 4,
            ChannelConfig::Five => 5,
            ChannelConfig::FiveOne => 6,
            ChannelConfig::SevenOne => 8,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ChannelConfig::Pce => "program config element",
            ChannelConfig::Mono => "mono",
            ChannelConfig::Stereo => "stereo (left, right)",
            ChannelConfig::Three => "3 channels",
            ChannelConfig::Four => "4 channels",
            ChannelConfig::Five => "5 channels",
            ChannelConfig::FiveOne => "5.1 channels",
            ChannelConfig::SevenOne => "7.1 channels",
        }
    }
}

/// `bufferFullness` is either a 0..0x7FE byte budget or the 0x7FF
/// sentinel meaning the stream is variable bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFullness {
    Bytes(u16),
    Vbr,
}

impl BufferFullness {
    fn from_bits(bits: u16) -> Self {
        if bits == 0x7FF {
            BufferFullness::Vbr
        } else {
            BufferFullness::Bytes(bits)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AacHeader {
    pub mpeg_version: u8, // 0 = MPEG-4, 1 = MPEG-2
    pub protection_absent: bool,
    pub profile: u8, // object type - 1
    pub sampling_frequency_index: u8,
    pub private_bit: bool,
    pub channel_config: ChannelConfig,
    /// Bit 3 of the four-bit flag nibble: `original/copy`'s sibling
    /// "home" indicator. The source system's reference reads the same
    /// bit position as `copyright_id`; here the two are kept distinct
    /// per the documented divergence (see DESIGN.md).
    pub is_home: bool,
    pub copyright_id: bool,
    pub copyright_id_start: bool,
    pub frame_length: u16,
    pub buffer_fullness: BufferFullness,
    pub number_aac_frames: u8,
    pub sample_rate: u32,
    pub samples: u32,
    bitrate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacHeaderError {
    Truncated,
    BadSync,
    NonZeroLayer,
    BadSamplingFrequencyIndex,
    BadChannelConfig,
    ZeroFrameLength,
}

impl AacHeader {
    /// Parses the fixed 7-byte ADTS header prefix starting at `data[0]`.
    /// The optional CRC word (bringing the header to 9 bytes) is not
    /// part of this struct; callers that need `protection_absent ==
    /// false` to mean "2 more bytes follow" handle that at the framing
    /// layer.
    pub fn parse(data: &[u8]) -> Result<Self, AacHeaderError> {
        if data.len() < 7 {
            return Err(AacHeaderError::Truncated);
        }
        let mut r = BitReader::new(&data[..7]);
        let sync = r.read_bits(12).unwrap();
        if sync != 0xFFF {
            return Err(AacHeaderError::BadSync);
        }
        let mpeg_version = r.read_bits(1).unwrap() as u8;
        let layer = r.read_bits(2).unwrap();
        if layer != 0 {
            return Err(AacHeaderError::NonZeroLayer);
        }
        let protection_absent = r.read_bool().unwrap();
        let profile = r.read_bits(2).unwrap() as u8;
        let sampling_frequency_index = r.read_bits(4).unwrap() as u8;
        if sampling_frequency_index as usize >= SAMPLE_RATE_TABLE.len() {
            return Err(AacHeaderError::BadSamplingFrequencyIndex);
        }
        let private_bit = r.read_bool().unwrap();
        let channel_config_bits = r.read_bits(3).unwrap() as u8;
        let channel_config = ChannelConfig::from_index(channel_config_bits)
            .ok_or(AacHeaderError::BadChannelConfig)?;
        // original/copy, home, copyright_id_bit, copyright_id_start.
        let original_copy_bit = r.read_bool().unwrap();
        let is_home = r.read_bool().unwrap();
        let copyright_id = r.read_bool().unwrap();
        let copyright_id_start = r.read_bool().unwrap();
        let _ = original_copy_bit;
        let frame_length = r.read_bits(13).unwrap() as u16;
        if frame_length == 0 {
            return Err(AacHeaderError::ZeroFrameLength);
        }
        let buffer_fullness_bits = r.read_bits(11).unwrap() as u16;
        let number_aac_frames = r.read_bits(2).unwrap() as u8;

        let sample_rate = SAMPLE_RATE_TABLE[sampling_frequency_index as usize];

        Ok(AacHeader {
            mpeg_version,
            protection_absent,
            profile,
            sampling_frequency_index,
            private_bit,
            channel_config,
            is_home,
            copyright_id,
            copyright_id_start,
            frame_length,
            buffer_fullness: BufferFullness::from_bits(buffer_fullness_bits),
            number_aac_frames,
            sample_rate,
            samples: 1024,
            bitrate: 0,
        })
    }

    pub fn header_byte_length(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }
}

impl HeaderInfo for AacHeader {
    fn byte_length(&self) -> usize {
        self.header_byte_length()
    }
    fn bit_depth(&self) -> u8 {
        16
    }
    fn channels(&self) -> u8 {
        self.channel_config.channels()
    }
    fn channel_mode(&self) -> &str {
        self.channel_config.as_str()
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
            "aac:{}:pa{}:pr{}:sfi{}:cc{:?}:oc{}:ih{}:ci{}:cis{}",
            self.mpeg_version,
            self.protection_absent as u8,
            self.profile,
            self.sampling_frequency_index,
            self.channel_config,
            self.private_bit as u8,
            self.is_home as u8,
            self.copyright_id as u8,
            self.copyright_id_start as u8,
        )
    }
}

impl AacHeader {
    /// `bufferFullness` rendered the way a log line or a test
    /// assertion wants it: `"VBR"` for the sentinel, otherwise the raw
    /// byte budget.
    pub fn buffer_fullness_label(&self) -> String {
        match self.buffer_fullness {
            BufferFullness::Vbr => "VBR".to_string(),
            BufferFullness::Bytes(n) => n.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // profile=LC(1), sampleRateIndex=4 (44100), channelConfig=2,
    // frameLength=359, bufferFullness=0x7FF (VBR), protection_absent=true.
    fn s3_header_bytes() -> [u8; 7] {
        // byte0: sync[11:4] = 1111_1111
        // byte1: sync[3:0]=1111, version=0, layer=00, protection_absent=1
        //      => 1111 0 00 1 = 0xF1
        // byte2: profile=01, sfi=0100, private=0, cc[2]=0
        //      => 01 0100 0 0 = 0x50
        // byte3: cc[1:0]=10, orig=0, home=0, copyId=0, copyIdStart=0, frameLength[12:11]=00
        //      => 10 0 0 0 0 0 0 = 0x80
        // frameLength=359 = 0b0_0101_0110_0111
        // already consumed top 2 bits (00) in byte3; remaining 11 bits = 0_0101_0110_0111? 359 in 13 bits:
        // 359 = 0b0000101100111
        // bits: [0000101100111] split as top2=00, remaining11=00101100111
        // byte4: next 8 bits of remaining 11 = 00101100, byte5 top3 = 111 then bufferFullness top5
        // bufferFullness = 0x7FF = 11111111111 (11 bits)
        // byte5: 111(frameLen tail) + 11111(bufferFullness top5) = 11111111 = 0xFF
        // byte6: bufferFullness remaining 6 bits (111111) + numberAACFrames(00) = 11111100 = 0xFC
        [0xFF, 0xF1, 0x50, 0x80, 0x2C, 0xFF, 0xFC]
    }

    #[test]
    fn parses_s3_scenario_header() {
        let hdr = AacHeader::parse(&s3_header_bytes()).unwrap();
        assert_eq!(hdr.profile, 1);
        assert_eq!(hdr.sample_rate, 44_100);
        assert_eq!(hdr.channels(), 2);
        assert_eq!(hdr.channel_mode(), "stereo (left, right)");
        assert_eq!(hdr.frame_length, 359);
        assert_eq!(hdr.buffer_fullness, BufferFullness::Vbr);
        assert_eq!(hdr.buffer_fullness_label(), "VBR");
        assert_eq!(hdr.samples, 1024);
        assert!(hdr.protection_absent);
        assert_eq!(hdr.header_byte_length(), 7);
    }

    #[test]
    fn rejects_bad_sync() {
        let mut bytes = s3_header_bytes();
        bytes[0] = 0x00;
        assert_eq!(AacHeader::parse(&bytes), Err(AacHeaderError::BadSync));
    }

    #[test]
    fn rejects_nonzero_layer() {
        // Force layer bits (sync tail + version + layer) to non-zero layer.
        let mut bytes = s3_header_bytes();
        bytes[1] = 0xFB; // 1111 0 01 1 -> layer = 01
        assert_eq!(AacHeader::parse(&bytes), Err(AacHeaderError::NonZeroLayer));
    }

    #[test]
    fn rejects_zero_frame_length() {
        let bytes = [0xFF, 0xF9, 0x50, 0x00, 0x00, 0x1F, 0xFC];
        assert_eq!(
            AacHeader::parse(&bytes),
            Err(AacHeaderError::ZeroFrameLength)
        );
    }

    #[test]
    fn copyright_id_and_is_home_are_distinct_bits() {
        // byte3 = 1000_0100: cc[1:0]=10, orig=0, home=0, copyId=0, copyIdStart=1...
        // Set is_home bit (third flag bit) and leave copyright_id clear to
        // show the two are read independently rather than aliasing the
        // same bit position.
        let mut bytes = s3_header_bytes();
        bytes[3] = 0b1001_0000; // cc_lo=10, orig=0, home=1, copyId=0, copyIdStart=0, len_hi=00
        let hdr = AacHeader::parse(&bytes).unwrap();
        assert!(hdr.is_home);
        assert!(!hdr.copyright_id);
    }
}
