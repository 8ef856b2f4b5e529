//! End-to-end FLAC native resynchronization: junk bytes before the
//! first valid sync word are skipped one at a time, and two
//! back-to-back frames are both confirmed via their CRC-16 footers.

use cadencepeek::{Demuxer, DemuxerOptions, Frame, Mime};

fn flac_crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
    }
    crc
}

/// A minimal fixed-blocksize FLAC frame: blocksize_enc=4 (1152
/// samples), sample_rate_enc=9 (44100), channel_enc=1 (independent
/// stereo), bit_depth_enc=4 (16-bit), a single-byte frame number, a
/// few body bytes that never start a spurious sync word, and a correct
/// trailing CRC-16.
fn flac_frame(frame_number: u8) -> Vec<u8> {
    let mut frame = vec![0xFF, 0xF8, 0x49, 0x18, frame_number, 0xAB];
    frame.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05]);
    let crc = flac_crc16(&frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame
}

#[test]
fn resyncs_past_leading_junk_and_decodes_two_frames() {
    let mut data = vec![0x00u8, 0x11, 0x22, 0x33];
    data.extend_from_slice(&flac_frame(0));
    data.extend_from_slice(&flac_frame(1));

    let frames = Demuxer::parse_all(Mime::Flac, DemuxerOptions::default(), &data).unwrap();

    assert_eq!(frames.len(), 2);
    for (i, frame) in frames.iter().enumerate() {
        let Frame::Codec(cf) = frame else { panic!("expected a codec frame") };
        assert_eq!(cf.frame_number, i as u64);
        assert_eq!(cf.samples, 1152);
    }
}

#[test]
fn a_corrupted_footer_is_resynced_past() {
    let mut good = flac_frame(0);
    let mut corrupt = flac_frame(1);
    // Flip a body byte without touching the footer, so the CRC no
    // longer matches and this frame must be skipped byte-at-a-time.
    corrupt[6] ^= 0xFF;
    let mut trailing = flac_frame(2);

    let mut data = Vec::new();
    data.append(&mut good);
    data.append(&mut corrupt);
    data.append(&mut trailing);

    let frames = Demuxer::parse_all(Mime::Flac, DemuxerOptions::default(), &data).unwrap();

    // The corrupted frame never confirms; only the leading and
    // trailing well-formed frames are emitted.
    assert_eq!(frames.len(), 2);
}
