// cadencepeek: streaming audio bitstream demuxer
//
// Licensed under MIT license, or Apache 2 license,
// at your option. Please see the LICENSE file
// attached to this source distribution for details.

/*!
Error types for the demuxer.

Most malformed-input conditions are not fatal: resynchronization
(§7 of the design notes) absorbs bad headers and CRC mismatches by
advancing the read position and retrying. Only a handful of conditions
abort the stream outright; those are represented here.
*/

use std::fmt;

/// Errors that can occur while constructing or driving a [`crate::Demuxer`].
#[derive(Debug, thiserror::Error)]
pub enum DemuxError {
    /// The MIME type passed to [`crate::Demuxer::new`] is not one of the
    /// supported families.
    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),

    /// A Vorbis setup packet's mode table could not be derived; every
    /// subsequent audio packet in the logical stream depends on it, so
    /// the whole Ogg stream is aborted.
    #[error("vorbis setup header mode table is malformed")]
    VorbisSetupMismatch,

    /// The Ogg container encountered a page whose codec could not be
    /// identified from its first packet.
    #[error("unrecognized ogg codec signature")]
    UnknownOggCodec,
}

/// Non-fatal conditions logged during parsing (§7). Never surfaced as
/// an `Err`; collected for tests and passed to the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A byte at the current read position did not begin a valid header;
    /// the driver advanced one byte and retried.
    UnrecognizedByte,
    /// A header parsed but failed a structural/range check.
    HeaderBadFormat,
    /// A tentative frame's confirmation (second header or trailing CRC)
    /// failed; the header cache was reset.
    ConfirmationFailed,
    /// An Ogg page's CRC-32 did not match; the page was dropped.
    OggPageCrcMismatch,
    /// Ogg page sequence numbers were not contiguous.
    OggSequenceGap { expected: u32, actual: u32 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnrecognizedByte => write!(f, "unrecognized byte at read position"),
            Warning::HeaderBadFormat => write!(f, "header failed validation"),
            Warning::ConfirmationFailed => write!(f, "frame confirmation failed, resyncing"),
            Warning::OggPageCrcMismatch => write!(f, "ogg page crc-32 mismatch"),
            Warning::OggSequenceGap { expected, actual } => {
                write!(f, "ogg page sequence gap: expected {expected}, got {actual}")
            }
        }
    }
}
