//! Transport layer for secure-element communication
//!
//! The physical link (ISO7816/NDLC, socket, whatever carries the frames) is
//! an external collaborator; this module only defines the trait the channel
//! drives and the error the link reports.

use std::fmt;

use bytes::Bytes;

/// Failure reported by the underlying link.
///
/// The signed `code` is the raw value the link returned (always `<= -1` on
/// failure) and is preserved verbatim so it can be surfaced in the
/// vendor-specific error space upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("secure element link failure (code {code})")]
pub struct TransportError {
    /// Raw link return code
    pub code: i32,
}

impl TransportError {
    /// Create a transport error from a raw link return code
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Trait for secure-element transport connections
///
/// Implementors provide a blocking exchange: given a complete command frame,
/// return the response frame, up to `max_response_len` bytes. `close` must
/// tolerate being called on an already-closed link.
pub trait SecureElementTransport: fmt::Debug + Send + Sync {
    /// Open the link to the element
    fn open(&mut self) -> Result<(), TransportError>;

    /// Close the link; a second close is a no-op
    fn close(&mut self) -> Result<(), TransportError>;

    /// Send a command frame and return the response frame
    fn transmit(&mut self, command: &[u8], max_response_len: usize)
    -> Result<Bytes, TransportError>;
}

#[cfg(test)]
pub(crate) use mock::MockTransport;
