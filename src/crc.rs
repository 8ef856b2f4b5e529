// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
CRC implementations used by the framing engine.

Three distinct CRCs are in play, and they must never share tables:

- [`crc8`]: polynomial 0x07, init 0, no reflection. Not used by the Ogg
  page checksum (that's a CRC-32, see [`ogg_crc32`]) or by anything else
  in this crate's framing paths today; kept for parity with the source
  system, which carries it for potential future use.
- [`ogg_crc32`]: the Ogg page checksum, polynomial 0x04C11DB7, init 0,
  no reflection, no final XOR, MSB-first byte processing.
- [`flac_crc16`]: the FLAC frame footer checksum, polynomial 0x8005,
  init 0, MSB-first.
- [`frame_crc32`]: the per-frame statistics `crc32` field on
  [`crate::frame::CodecFrame`]. This is the reflected Ethernet/PNG
  CRC-32 (polynomial 0xEDB88320), unrelated to the Ogg page checksum.

Each public function is table-driven. A byte-by-byte reference
implementation is kept alongside each table-driven one and the two are
cross-checked in `#[cfg(test)]`, rather than chasing a full slicing-by-16
unroll: at the sizes these streams page through (a handful of kilobytes
per frame), a single 256-entry table already saturates the memory
bandwidth that would otherwise gate a wider slice.
*/

use std::sync::OnceLock;

fn crc8_table() -> &'static [u8; 256] {
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        let mut i = 0usize;
        while i < 256 {
            let mut crc = i as u8;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ 0x07
                } else {
                    crc << 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    })
}

/// CRC-8, polynomial 0x07, init 0, no reflection.
pub fn crc8(data: &[u8]) -> u8 {
    let table = crc8_table();
    let mut crc = 0u8;
    for &b in data {
        crc = table[(crc ^ b) as usize];
    }
    crc
}

fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
    }
    crc
}

fn ogg_crc32_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        let mut i = 0usize;
        while i < 256 {
            let mut crc = (i as u32) << 24;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 0x8000_0000 != 0 {
                    (crc << 1) ^ 0x04C1_1DB7
                } else {
                    crc << 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    })
}

/// The Ogg page checksum: polynomial 0x04C11DB7, init 0, no reflection,
/// no final XOR, MSB-first byte processing.
///
/// Callers must zero the 4-byte `pageChecksum` field of the page header
/// before hashing, per the Ogg spec.
pub fn ogg_crc32(data: &[u8]) -> u32 {
    let table = ogg_crc32_table();
    let mut crc = 0u32;
    for &b in data {
        crc = (crc << 8) ^ table[(((crc >> 24) ^ b as u32) & 0xff) as usize];
    }
    crc
}

fn ogg_crc32_slow(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &b in data {
        crc ^= (b as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn flac_crc16_table() -> &'static [u16; 256] {
    static TABLE: OnceLock<[u16; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u16; 256];
        let mut i = 0usize;
        while i < 256 {
            let mut crc = (i as u16) << 8;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    })
}

/// The FLAC frame footer checksum: polynomial 0x8005, init 0, MSB-first.
///
/// Computed over the full frame including the header and excluding the
/// trailing 2-byte footer itself.
pub fn flac_crc16(data: &[u8]) -> u16 {
    let table = flac_crc16_table();
    let mut crc = 0u16;
    for &b in data {
        crc = (crc << 8) ^ table[(((crc >> 8) ^ b as u16) & 0xff) as usize];
    }
    crc
}

fn flac_crc16_slow(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
    }
    crc
}

fn frame_crc32_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        let mut i = 0usize;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    })
}

/// The reflected Ethernet/PNG CRC-32 (polynomial 0xEDB88320, init
/// 0xFFFFFFFF, final XOR 0xFFFFFFFF), used only for the per-frame
/// `crc32` statistics field. Distinct from [`ogg_crc32`]; the two must
/// never be conflated.
pub fn frame_crc32(data: &[u8]) -> u32 {
    let table = frame_crc32_table();
    let mut crc = 0xFFFF_FFFFu32;
    for &b in data {
        crc = table[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

fn frame_crc32_slow(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in data {
        crc ^= b as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc8_matches_slow_reference() {
        let data = b"the quick brown fox jumps over the lazy dog";
        assert_eq!(crc8(data), crc8_slow(data));
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn ogg_crc32_matches_slow_reference() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(ogg_crc32(&data), ogg_crc32_slow(&data));
        assert_eq!(ogg_crc32(&[]), 0);
    }

    #[test]
    fn flac_crc16_matches_slow_reference() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(flac_crc16(&data), flac_crc16_slow(&data));
        assert_eq!(flac_crc16(&[]), 0);
    }

    #[test]
    fn frame_crc32_matches_slow_reference_and_known_vector() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert_eq!(frame_crc32(&data), frame_crc32_slow(&data));
        // Standard CRC-32/ISO-HDLC check value for the ASCII string "123456789".
        assert_eq!(frame_crc32(b"123456789"), 0xCBF4_3926);
    }
}
