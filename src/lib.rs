// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
A streaming demuxer/parser for audio bitstreams: MPEG audio, AAC-ADTS,
native FLAC, and Ogg-wrapped Opus/Vorbis/FLAC.

Given a declared MIME family, a [`Demuxer`] consumes incoming byte
chunks and emits a sequence of decoded [`Frame`]s — parsed header
fields, the exact frame payload, and running statistics — without
decoding audio samples. Frames are produced incrementally: a chunk
that ends mid-frame simply yields fewer frames, and parsing picks back
up on the next chunk.

```
use cadencepeek::{Demuxer, DemuxerOptions, Mime};

let mut demuxer = Demuxer::new(Mime::Mpeg, DemuxerOptions::default()).unwrap();
let frames = demuxer.push_chunk(&[]).unwrap();
assert!(frames.is_empty());
```
*/

mod aac;
mod bitreader;
mod crc;
mod driver;
pub mod error;
mod flac;
pub mod frame;
mod framing;
mod header_cache;
mod id3;
mod mpeg;
mod ogg;
mod reader;

pub use error::{DemuxError, Warning};
pub use frame::{CodecFrame, Frame, Header, HeaderInfo, OggPage};
pub use header_cache::CodecUpdate;

use driver::Driver;

/// The declared MIME family a [`Demuxer`] is constructed for. Chosen
/// by the caller up front; never auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mime {
    Mpeg,
    Aac,
    Flac,
    Ogg,
}

impl std::fmt::Display for Mime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mime::Mpeg => "audio/mpeg",
            Mime::Aac => "audio/aac",
            Mime::Flac => "audio/flac",
            Mime::Ogg => "audio/ogg",
        };
        f.write_str(s)
    }
}

impl Mime {
    /// Maps the MIME strings named in §6 to a family. `audio/aacp` is
    /// accepted as an alias for `audio/aac`; `application/ogg` as an
    /// alias for `audio/ogg`.
    pub fn from_str(mime: &str) -> Result<Self, DemuxError> {
        match mime {
            "audio/mpeg" => Ok(Mime::Mpeg),
            "audio/aac" | "audio/aacp" => Ok(Mime::Aac),
            "audio/flac" => Ok(Mime::Flac),
            "audio/ogg" | "application/ogg" => Ok(Mime::Ogg),
            other => Err(DemuxError::UnsupportedMime(other.to_string())),
        }
    }
}

/// Construction-time and per-callback configuration for a [`Demuxer`]
/// (§6). This is the crate's entire configuration surface — there is
/// no file-based config, matching a library rather than a service.
#[derive(Default)]
pub struct DemuxerOptions {
    /// Invoked exactly once, the first time the codec is identified
    /// (immediately at construction for MPEG/AAC/FLAC; at Ogg's first
    /// page for the Ogg family).
    pub on_codec: Option<Box<dyn FnMut(&str)>>,
    /// Invoked whenever the effective bitrate or codec parameters
    /// change, with the new values and a millisecond timestamp.
    pub on_codec_update: Option<Box<dyn FnMut(&CodecUpdate, u128)>>,
    /// When set, non-fatal parse warnings are additionally routed
    /// through the `log` crate's `warn!` macro.
    pub enable_logging: bool,
}

/// The streaming demuxer (§6). Construct once per logical stream;
/// feed it chunks via [`Demuxer::push_chunk`] and finalize with
/// [`Demuxer::flush`].
pub struct Demuxer {
    driver: Driver,
}

impl Demuxer {
    pub fn new(mime: Mime, options: DemuxerOptions) -> Result<Self, DemuxError> {
        Ok(Demuxer { driver: Driver::new(mime, options) })
    }

    /// Appends `chunk` and returns every frame that can be fully
    /// decoded from the data observed so far.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, DemuxError> {
        self.driver.push_chunk(chunk)
    }

    /// Signals end-of-input: drains any remaining best-effort frames,
    /// then resets the driver so it can be reused for a new stream.
    pub fn flush(&mut self) -> Result<Vec<Frame>, DemuxError> {
        self.driver.flush()
    }

    /// Parses `data` in one shot: equivalent to one `push_chunk`
    /// followed by `flush` (invariant 4).
    pub fn parse_all(mime: Mime, options: DemuxerOptions, data: &[u8]) -> Result<Vec<Frame>, DemuxError> {
        let mut demuxer = Demuxer::new(mime, options)?;
        let mut frames = demuxer.push_chunk(data)?;
        frames.extend(demuxer.flush()?);
        Ok(frames)
    }

    /// The currently detected codec tag (`"mpeg"`, `"aac"`, `"flac"`,
    /// `"opus"`, `"vorbis"`), or `""` until an Ogg stream's first page
    /// has identified one.
    pub fn codec(&self) -> &str {
        self.driver.codec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mime_string_is_an_error() {
        assert!(matches!(Mime::from_str("video/mp4"), Err(DemuxError::UnsupportedMime(_))));
    }

    #[test]
    fn aacp_is_an_alias_for_aac() {
        assert_eq!(Mime::from_str("audio/aacp").unwrap(), Mime::Aac);
    }

    #[test]
    fn mpeg_codec_is_known_immediately() {
        let demuxer = Demuxer::new(Mime::Mpeg, DemuxerOptions::default()).unwrap();
        assert_eq!(demuxer.codec(), "mpeg");
    }

    #[test]
    fn ogg_codec_is_unknown_until_first_page() {
        let demuxer = Demuxer::new(Mime::Ogg, DemuxerOptions::default()).unwrap();
        assert_eq!(demuxer.codec(), "");
    }

    fn mpeg_frame_bytes() -> Vec<u8> {
        // MPEG-1 Layer III, 128 kbps, 44.1 kHz, stereo, no padding: a
        // single 417-byte frame (S1 scenario).
        let mut frame = vec![0xFFu8, 0xFB, 0x90, 0x00];
        frame.resize(417, 0xAA);
        frame
    }

    #[test]
    fn s1_mpeg_roundtrip_three_frames() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&mpeg_frame_bytes());
        }
        let frames = Demuxer::parse_all(Mime::Mpeg, DemuxerOptions::default(), &data).unwrap();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            let Frame::Codec(cf) = frame else { panic!("expected codec frame") };
            assert_eq!(cf.data.len(), 417);
            assert_eq!(cf.samples, 1152);
        }
    }

    #[test]
    fn s2_id3v2_prefix_is_skipped_before_mpeg_sync() {
        let mut data = vec![b'I', b'D', b'3', 3, 0, 0, 0x00, 0x00, 0x00, 0x0A];
        data.extend_from_slice(&[0u8; 10]);
        for _ in 0..3 {
            data.extend_from_slice(&mpeg_frame_bytes());
        }
        let frames = Demuxer::parse_all(Mime::Mpeg, DemuxerOptions::default(), &data).unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn parse_all_matches_chunked_delivery() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&mpeg_frame_bytes());
        }
        let whole = Demuxer::parse_all(Mime::Mpeg, DemuxerOptions::default(), &data).unwrap();

        let mut demuxer = Demuxer::new(Mime::Mpeg, DemuxerOptions::default()).unwrap();
        let mut chunked = Vec::new();
        for byte in &data {
            chunked.extend(demuxer.push_chunk(&[*byte]).unwrap());
        }
        chunked.extend(demuxer.flush().unwrap());

        assert_eq!(whole.len(), chunked.len());
        for (a, b) in whole.iter().zip(chunked.iter()) {
            let (Frame::Codec(fa), Frame::Codec(fb)) = (a, b) else { panic!() };
            assert_eq!(fa.data, fb.data);
            assert_eq!(fa.samples, fb.samples);
        }
    }
}
