//! Protocol and codec errors.

use thiserror::Error;

/// Errors surfaced by the codec.
///
/// Framing errors are terminal for the current frame; recovery (resync or
/// disconnect) is up to the connection owner. A failed decode returns only
/// the error, never a partially constructed message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Fewer than seven bytes available to read a message header
    #[error("ill-formed message header: not enough data to read a header")]
    IllFormedHeader,

    /// The frame declares a size smaller than the mandatory header
    #[error("ill-formed message: declared frame size less than a header")]
    FrameTooShort,

    /// The frame declares a size larger than the negotiated maximum
    #[error("ill-formed message: declared frame size greater than the negotiated one")]
    TooBig,

    /// The type code is not a legal 9P2000/9P2000.e message
    #[error("ill-formed message: unsupported message type {0}")]
    UnsupportedMessageType(u8),

    /// The payload is shorter than the frame declares
    #[error("ill-formed message: declared frame size larger than message data received")]
    NotEnoughData,

    /// The payload is longer than the frame declares
    #[error("ill-formed message: declared frame size less than message data received")]
    MoreThenExpectedData,

    /// A walk message carries more path elements or qids than the protocol allows
    #[error("walk message carries more than 16 elements")]
    TooManyWalkElements,

    /// A string field is not valid UTF-8
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A variable-length field does not fit its length prefix
    #[error("variable-length field exceeds its length prefix")]
    FieldTooLarge,

    /// The output buffer cannot hold the message being written
    #[error("output buffer too small for the message being written")]
    BufferTooSmall,
}

pub type Result<T> = ::std::result::Result<T, Error>;
