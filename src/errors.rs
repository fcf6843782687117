//! The error taxonomy shared by the codec, the transports and the resolver.

use crate::types::Rcode;
use std::io;
use thiserror::Error;

/// Constructs and returns an [`std::io::Error`] of the given kind.
///
/// Used throughout the wire codec, where failures are plain I/O errors until
/// they cross the [`Message::from_slice`](crate::Message::from_slice)
/// boundary and become [`ParseError`]s.
#[macro_export]
macro_rules! bail {
    ($kind:ident, $($arg:tt)*) => {
        // Construct the I/O error.
        return Err(
            ::std::io::Error::new(::std::io::ErrorKind::$kind, format!($($arg)*))
        )
    };
}

/// Error returned when a DNS message cannot be decoded.
///
/// Carries where in the buffer decoding stopped, so a transport can tell a
/// genuinely garbled payload apart from one that was cut short in flight.
#[derive(Error, Debug)]
#[error("malformed message at offset {index} of {data_length}: {source}")]
pub struct ParseError {
    /// Cursor position at which decoding failed.
    pub index: usize,

    /// Total length of the buffer being decoded.
    pub data_length: usize,

    #[source]
    pub source: io::Error,
}

impl ParseError {
    /// True when the decoder ran off the end of the available data, rather
    /// than rejecting something it read.
    pub fn overran(&self) -> bool {
        self.index >= self.data_length || self.source.kind() == io::ErrorKind::UnexpectedEof
    }
}

/// Everything that can go wrong while resolving a question.
///
/// The resolver engine branches on these kinds to decide whether to retry
/// the current server, rotate to the next one, or surface the failure. See
/// [`Resolver`](crate::resolver::Resolver).
#[derive(Error, Debug)]
pub enum Error {
    /// No name servers were configured or discovered. Raised before any
    /// network I/O takes place.
    #[error("no name servers configured")]
    EmptyServers,

    /// The per-transport-call deadline elapsed without a response.
    #[error("query timed out")]
    Timeout,

    /// The connection was refused, reset or otherwise dropped mid-exchange.
    #[error("transient I/O failure: {0}")]
    TransientIo(#[source] io::Error),

    /// The caller's cancellation token was triggered.
    #[error("query was cancelled")]
    Cancelled,

    /// The response echoed a transaction id other than the one sent.
    #[error("response id {got:#06x} does not match request id {expected:#06x}")]
    XidMismatch { expected: u16, got: u16 },

    /// The response had the TC bit set.
    #[error("response was truncated")]
    Truncated,

    /// The response was truncated over UDP but `use_tcp_fallback` is off.
    #[error("response was truncated and TCP fallback is disabled")]
    TruncatedFallbackDisabled,

    /// A truncated response arrived over TCP, where truncation has no
    /// recovery path.
    #[error("response was truncated over TCP")]
    UnexpectedTruncatedOverTcp,

    /// The response could not be decoded. `read_length` is the number of
    /// bytes the transport handed to the codec; `index` and `data_length`
    /// locate the failure inside them. A short UDP datagram that overran
    /// the decoder is treated by the engine as implicit truncation.
    #[error("malformed response: read {read_length} bytes, decode failed at offset {index} of {data_length}")]
    Malformed {
        read_length: usize,
        index: usize,
        data_length: usize,
    },

    /// The server answered with a non-zero response code.
    #[error("server responded with {0}")]
    Dns(Rcode),

    /// The last server in the roster failed in a way the engine does not
    /// retry.
    #[error("connection failure: {0}")]
    ConnectionFailure(#[source] io::Error),

    /// A domain name that cannot be encoded into a question.
    #[error("invalid domain name '{0}'")]
    InvalidName(String),

    /// A settings value outside its permitted range. Never retried.
    #[error("invalid resolver settings: {0}")]
    InvalidOptions(String),

    /// Any other I/O error. The engine rotates to the next server on these.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Classifies a raw I/O error from a transport into the taxonomy.
    pub(crate) fn from_io(e: io::Error) -> Error {
        use io::ErrorKind::*;
        match e.kind() {
            WouldBlock | TimedOut => Error::Timeout,
            ConnectionRefused | ConnectionReset | ConnectionAborted | BrokenPipe
            | NotConnected => Error::TransientIo(e),
            _ => Error::Io(e),
        }
    }

    /// Builds [`Error::Malformed`] from a codec failure over a payload of
    /// `read_length` bytes.
    pub(crate) fn from_parse(e: ParseError, read_length: usize) -> Error {
        Error::Malformed {
            read_length,
            index: e.index,
            data_length: e.data_length,
        }
    }

    /// Errors caused by the caller rather than the network. Never retried,
    /// never rotated to another server.
    pub(crate) fn is_argument(&self) -> bool {
        matches!(self, Error::InvalidName(_) | Error::InvalidOptions(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_classification() {
        let timeout = Error::from_io(io::Error::new(io::ErrorKind::WouldBlock, "rx"));
        assert!(matches!(timeout, Error::Timeout));

        let reset = Error::from_io(io::Error::new(io::ErrorKind::ConnectionReset, "rst"));
        assert!(matches!(reset, Error::TransientIo(_)));

        let other = Error::from_io(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(matches!(other, Error::Io(_)));
    }

    #[test]
    fn parse_error_overrun() {
        let e = ParseError {
            index: 12,
            data_length: 12,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "eof"),
        };
        assert!(e.overran());

        let e = ParseError {
            index: 4,
            data_length: 40,
            source: io::Error::new(io::ErrorKind::InvalidData, "bad opcode"),
        };
        assert!(!e.overran());
    }
}
