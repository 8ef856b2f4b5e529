// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
The pull-based read/buffer protocol (§4.1, §5).

The source system models this as a suspendable coroutine that yields
inside `readRawData` until enough bytes have arrived. Rust has no
stackful coroutines in `std`, so [`RawBuffer`] realizes the same
contract as an explicit state machine instead, per the design note in
§9: `read_raw_data` returns `None` ("suspend") rather than blocking,
and the driver's parse loop treats `None` as "stop, wait for the next
`push_chunk`". `flushing` flips the contract from suspend-on-shortfall
to best-effort-return.
*/

/// An append-only byte window with a logical read position.
///
/// Only [`RawBuffer::increment_raw_data`] may shrink the buffer; only
/// [`RawBuffer::append`] may grow it. Everything else only reads views
/// into the current contents. Once `increment_raw_data` runs, any
/// slice borrowed from a prior `read_raw_data` call is invalidated by
/// the borrow checker (its lifetime ends at the `&mut self` call) —
/// callers that need to retain frame bytes past an advance must copy.
pub(crate) struct RawBuffer {
    data: Vec<u8>,
    pub current_read_position: u64,
    pub total_bytes_in: u64,
    pub flushing: bool,
}

impl RawBuffer {
    pub fn new() -> Self {
        RawBuffer { data: Vec::new(), current_read_position: 0, total_bytes_in: 0, flushing: false }
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.total_bytes_in += chunk.len() as u64;
    }

    pub fn set_flushing(&mut self) {
        self.flushing = true;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Suspends (returns `None`) until `buffer.len() > min_bytes +
    /// read_offset`, unless flushing, in which case it returns
    /// whatever prefix exists starting at `read_offset` (possibly
    /// shorter than requested, possibly empty).
    pub fn read_raw_data(&self, min_bytes: usize, read_offset: usize) -> Option<&[u8]> {
        if self.data.len() > min_bytes + read_offset {
            Some(&self.data[read_offset..])
        } else if self.flushing {
            if read_offset <= self.data.len() {
                Some(&self.data[read_offset..])
            } else {
                Some(&[])
            }
        } else {
            None
        }
    }

    /// Drops the first `n` bytes and advances `current_read_position`.
    pub fn increment_raw_data(&mut self, n: usize) {
        debug_assert!(n <= self.data.len());
        self.data.drain(0..n);
        self.current_read_position += n as u64;
    }
}

impl Default for RawBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspends_until_enough_bytes() {
        let mut buf = RawBuffer::new();
        buf.append(&[1, 2, 3]);
        assert_eq!(buf.read_raw_data(3, 0), None);
        buf.append(&[4]);
        assert_eq!(buf.read_raw_data(3, 0), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn flushing_returns_best_effort_prefix() {
        let mut buf = RawBuffer::new();
        buf.append(&[1, 2]);
        buf.set_flushing();
        assert_eq!(buf.read_raw_data(10, 0), Some(&[1u8, 2][..]));
        assert_eq!(buf.read_raw_data(10, 5), Some(&[][..]));
    }

    #[test]
    fn increment_advances_position_and_shrinks() {
        let mut buf = RawBuffer::new();
        buf.append(&[1, 2, 3, 4]);
        buf.increment_raw_data(2);
        assert_eq!(buf.current_read_position, 2);
        assert_eq!(buf.read_raw_data(0, 0), Some(&[3u8, 4][..]));
    }
}
