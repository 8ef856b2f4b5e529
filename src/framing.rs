// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
The fixed-length synchronization skeleton shared by MPEG and AAC-ADTS
framing (§4.4): find a header, then confirm it either by flushing or by
locating a second valid header exactly `frame_length` bytes later.

FLAC native framing does not fit this shape (frames are variable length
with no length field) and implements its own loop in `crate::flac`.
*/

use crate::error::Warning;
use crate::header_cache::HeaderCache;
use crate::reader::RawBuffer;

pub(crate) trait FixedLengthHeader {
    /// Total size of the frame in bytes, header included.
    fn frame_length(&self) -> usize;
}

/// Attempts to produce the next frame from `buf`, skipping bad sync
/// positions and failed confirmations internally. Returns `None` when
/// the buffer is exhausted and the caller must wait for more input
/// (or, while flushing, when no further frame can be formed).
pub(crate) fn next_fixed_length_frame<H, E>(
    buf: &mut RawBuffer,
    cache: &mut HeaderCache,
    parse: impl Fn(&[u8]) -> Result<H, E>,
    header_prefix_len: usize,
    warnings: &mut Vec<Warning>,
) -> Option<(H, Box<[u8]>)>
where
    H: FixedLengthHeader,
{
    loop {
        let view = buf.read_raw_data(header_prefix_len.saturating_sub(1), 0)?;
        if view.len() < header_prefix_len {
            return None;
        }
        let header = match parse(&view[..header_prefix_len]) {
            Ok(h) => h,
            Err(_) => {
                warnings.push(Warning::HeaderBadFormat);
                buf.increment_raw_data(1);
                continue;
            }
        };
        let frame_length = header.frame_length();
        let confirmed = if buf.flushing {
            true
        } else {
            match buf.read_raw_data(header_prefix_len.saturating_sub(1), frame_length) {
                Some(next_view) => parse(&next_view[..header_prefix_len]).is_ok(),
                None => return None,
            }
        };
        if !confirmed {
            warnings.push(Warning::ConfirmationFailed);
            cache.reset();
            buf.increment_raw_data(1);
            continue;
        }
        cache.enable();
        let full = buf.read_raw_data(0, 0).unwrap_or(&[]);
        let take = frame_length.min(full.len());
        let data = full[..take].to_vec().into_boxed_slice();
        buf.increment_raw_data(take);
        return Some((header, data));
    }
}
