// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Vorbis-in-Ogg identification header and the setup-header reverse scan
that builds a mode-index -> block-flag table (§4.6, §4.8).
*/

use std::collections::HashMap;

use crate::bitreader::ReverseBitReader;
use crate::error::DemuxError;
use crate::frame::HeaderInfo;
use byteorder::{ByteOrder, LittleEndian};

pub(crate) const MAGIC: &[u8] = b"\x01vorbis";

#[derive(Debug, Clone)]
pub struct VorbisHeader {
    pub vorbis_version: u32,
    pub audio_channels: u8,
    pub audio_sample_rate: u32,
    pub bitrate_maximum: i32,
    pub bitrate_nominal: i32,
    pub bitrate_minimum: i32,
    pub blocksize_0: u32,
    pub blocksize_1: u32,
    bitrate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VorbisHeaderError {
    Truncated,
    BadMagic,
    ZeroChannels,
    ZeroSampleRate,
}

impl VorbisHeader {
    pub fn parse(data: &[u8]) -> Result<Self, VorbisHeaderError> {
        if data.len() < 30 {
            return Err(VorbisHeaderError::Truncated);
        }
        if &data[0..7] != MAGIC {
            return Err(VorbisHeaderError::BadMagic);
        }
        let vorbis_version = LittleEndian::read_u32(&data[7..11]);
        let audio_channels = data[11];
        if audio_channels == 0 {
            return Err(VorbisHeaderError::ZeroChannels);
        }
        let audio_sample_rate = LittleEndian::read_u32(&data[12..16]);
        if audio_sample_rate == 0 {
            return Err(VorbisHeaderError::ZeroSampleRate);
        }
        let bitrate_maximum = LittleEndian::read_i32(&data[16..20]);
        let bitrate_nominal = LittleEndian::read_i32(&data[20..24]);
        let bitrate_minimum = LittleEndian::read_i32(&data[24..28]);
        let blocksize_byte = data[28];
        let blocksize_0 = 1u32 << (blocksize_byte & 0x0F);
        let blocksize_1 = 1u32 << ((blocksize_byte >> 4) & 0x0F);
        // data[29] is the framing bit byte (must have bit 0 set); not
        // load-bearing for any field we expose, so it is not validated
        // here beyond being present.
        Ok(VorbisHeader {
            vorbis_version,
            audio_channels,
            audio_sample_rate,
            bitrate_maximum,
            bitrate_nominal,
            bitrate_minimum,
            blocksize_0,
            blocksize_1,
            bitrate: 0,
        })
    }
}

impl HeaderInfo for VorbisHeader {
    fn byte_length(&self) -> usize {
        30
    }
    fn bit_depth(&self) -> u8 {
        16
    }
    fn channels(&self) -> u8 {
        self.audio_channels
    }
    fn channel_mode(&self) -> &str {
        match self.audio_channels {
            1 => "mono",
            2 => "stereo",
            _ => "multichannel",
        }
    }
    fn sample_rate(&self) -> u32 {
        self.audio_sample_rate
    }
    fn bitrate(&self) -> u32 {
        self.bitrate
    }
    fn set_bitrate(&mut self, bitrate: u32) {
        self.bitrate = bitrate;
    }
    fn cache_key(&self) -> String {
        format!(
            "vorbis:v{}:ch{}:sr{}:bs{}/{}",
            self.vorbis_version,
            self.audio_channels,
            self.audio_sample_rate,
            self.blocksize_0,
            self.blocksize_1
        )
    }
}

/// Mode-index -> block-flag mapping derived from the setup packet
/// (§4.8), plus enough state to derive each subsequent packet's sample
/// count.
#[derive(Debug, Clone)]
pub struct ModeTable {
    block_flags: Vec<u8>,
    mask: u32,
    prev_mask: u32,
    blocksize_0: u32,
    blocksize_1: u32,
    prev_block_size: u32,
}

fn ceil_log2(count: u32) -> u32 {
    if count <= 1 {
        0
    } else {
        32 - (count - 1).leading_zeros()
    }
}

/// Reads the setup packet backward to recover the mode table, per
/// §4.8. The packet's mode entries are stored as short runs near the
/// end of the packet; everything before them is codebook/floor/residue
/// configuration data this crate has no use for and never decodes
/// forward.
pub fn build_mode_table(
    setup_packet: &[u8],
    blocksize_0: u32,
    blocksize_1: u32,
) -> Result<ModeTable, DemuxError> {
    let mut r = ReverseBitReader::new(setup_packet);

    loop {
        match r.read_bit() {
            Some(1) => break,
            Some(_) => continue,
            None => return Err(DemuxError::VorbisSetupMismatch),
        }
    }

    let mut modes: HashMap<u8, u8> = HashMap::new();
    let mut count: u32 = 0;

    for _ in 0..64 {
        let mapping = r
            .read_bits(8)
            .ok_or(DemuxError::VorbisSetupMismatch)? as u8;
        if modes.contains_key(&mapping) && !(mapping == 0 && count == 1) {
            return Err(DemuxError::VorbisSetupMismatch);
        }
        let z0 = r.read_bits(8).ok_or(DemuxError::VorbisSetupMismatch)? as u8;
        let z1 = r.read_bits(8).ok_or(DemuxError::VorbisSetupMismatch)? as u8;
        let z2 = r.read_bits(8).ok_or(DemuxError::VorbisSetupMismatch)? as u8;
        if z0 == 0 && z1 == 0 && z2 == 0 {
            let mode_bits = r.read_bits(7).ok_or(DemuxError::VorbisSetupMismatch)? as u8;
            modes.insert(mapping, mode_bits & 1);
            r.rewind(6);
            count += 1;
        } else {
            let expected = (((z0.reverse_bits()) & 0b0111_1110) >> 1) as u32 + 1;
            if expected != count {
                return Err(DemuxError::VorbisSetupMismatch);
            }
            break;
        }
    }

    if count == 0 {
        return Err(DemuxError::VorbisSetupMismatch);
    }

    let mask = (1u32 << ceil_log2(count)) - 1;
    let prev_mask = (mask | 1) + 1;
    let mut block_flags = vec![0u8; mask as usize + 1];
    for (mapping, flag) in &modes {
        if (*mapping as u32) <= mask {
            block_flags[*mapping as usize] = *flag;
        }
    }

    Ok(ModeTable {
        block_flags,
        mask,
        prev_mask,
        blocksize_0,
        blocksize_1,
        prev_block_size: blocksize_0,
    })
}

impl ModeTable {
    /// Derives the sample count for a packet given its first payload
    /// byte, and advances the internal previous-block-size state for
    /// the next call.
    pub fn samples_for_packet(&mut self, first_byte: u8) -> u32 {
        let byte = (first_byte >> 1) as u32;
        let block_flag = self.block_flags[(byte & self.mask) as usize];
        let curr_block_size = if block_flag != 0 { self.blocksize_1 } else { self.blocksize_0 };
        let prev_block_size = if block_flag != 0 {
            if byte & self.prev_mask != 0 { self.blocksize_1 } else { self.blocksize_0 }
        } else {
            self.prev_block_size
        };
        let samples = (prev_block_size + curr_block_size) >> 2;
        self.prev_block_size = curr_block_size;
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_log2_matches_expected_bit_widths() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
    }

    fn table_for_test(mask: u32, flags: Vec<u8>) -> ModeTable {
        let prev_mask = (mask | 1) + 1;
        ModeTable {
            block_flags: flags,
            mask,
            prev_mask,
            blocksize_0: 256,
            blocksize_1: 2048,
            prev_block_size: 256,
        }
    }

    #[test]
    fn short_block_uses_carried_previous_size() {
        let mut table = table_for_test(0b1, vec![0, 0]);
        // block_flag = 0 (short) for both mode indices; prevBlockSize
        // stays at the carried state (blocksize_0) throughout.
        let samples = table.samples_for_packet(0b0000_0000);
        assert_eq!(samples, (256 + 256) >> 2);
        let samples2 = table.samples_for_packet(0b0000_0000);
        assert_eq!(samples2, (256 + 256) >> 2);
    }

    #[test]
    fn long_block_reads_prev_mask_bit() {
        let mut table = table_for_test(0b1, vec![0, 1]);
        // mapping index 1 has block_flag=1 (long); bit pattern chosen
        // so byte & mask == 1 and byte & prev_mask != 0.
        // byte = first_byte >> 1; want byte & 0b1 == 1 and byte & prev_mask(0b10) != 0
        // byte = 0b11 -> first_byte = 0b110 = 0x06
        let samples = table.samples_for_packet(0x06);
        assert_eq!(samples, (2048 + 2048) >> 2);
        assert_eq!(table.prev_block_size, 2048);
    }

    #[test]
    fn parses_identification_header() {
        let mut data = Vec::new();
        data.push(1);
        data.extend_from_slice(b"vorbis");
        data.extend_from_slice(&0u32.to_le_bytes());
        data.push(2); // channels
        data.extend_from_slice(&44_100u32.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&128_000i32.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.push(0x0B | (0x0C << 4)); // blocksize_0=2^11=2048, blocksize_1=2^12=4096
        data.push(0x01); // framing bit
        let hdr = VorbisHeader::parse(&data).unwrap();
        assert_eq!(hdr.audio_channels, 2);
        assert_eq!(hdr.sample_rate(), 44_100);
        assert_eq!(hdr.blocksize_0, 2048);
        assert_eq!(hdr.blocksize_1, 4096);
    }
}
