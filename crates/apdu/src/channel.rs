//! APDU channel: frame building and raw exchange
//!
//! [`ApduChannel`] owns exactly one transport handle. It hex-encodes a
//! [`Command`] into the wire frame, drives the transport, and hands back the
//! still-hex response. Status-word interpretation is the caller's job; the
//! channel only rejects responses too short to carry one.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::command::Command;
use crate::hexwire::{self, STATUS_WIRE_LEN};
use crate::response::{Response, ResponseError};
use crate::transport::{SecureElementTransport, TransportError};

/// Errors produced by the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The transport reported a failure; the raw link code is preserved
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The transport returned fewer bytes than a status word occupies
    #[error("response of {len} bytes is shorter than a status word")]
    ShortResponse {
        /// Number of bytes actually returned
        len: usize,
    },
    /// The response could not be decoded from the hex wire form
    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Maximum wire length of a response whose decoded payload is `payload_len`
/// bytes: two characters per byte plus the trailing status word.
pub const fn response_capacity(payload_len: usize) -> usize {
    2 * payload_len + STATUS_WIRE_LEN
}

/// Channel for exchanging APDU frames with the secure element
#[derive(Debug)]
pub struct ApduChannel<T: SecureElementTransport> {
    transport: T,
}

impl<T: SecureElementTransport> ApduChannel<T> {
    /// Create a channel owning the given transport
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Get a reference to the underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the underlying link
    pub fn open(&mut self) -> Result<(), TransportError> {
        self.transport.open()
    }

    /// Close the underlying link
    pub fn close(&mut self) -> Result<(), TransportError> {
        self.transport.close()
    }

    /// Exchange one command, returning the raw (still hex-encoded) response
    pub fn exchange(
        &mut self,
        command: &Command,
        max_response_len: usize,
    ) -> Result<Bytes, ChannelError> {
        let frame = hexwire::encode(&command.to_bytes());
        trace!(
            frame = %String::from_utf8_lossy(&frame),
            max_response_len,
            "Transmitting command frame"
        );

        let response = match self.transport.transmit(&frame, max_response_len) {
            Ok(response) => response,
            Err(err) => {
                debug!(code = err.code, "Transport failure");
                return Err(err.into());
            }
        };

        if response.len() < STATUS_WIRE_LEN {
            return Err(ChannelError::ShortResponse {
                len: response.len(),
            });
        }

        trace!(
            response = %String::from_utf8_lossy(&response),
            "Received response frame"
        );
        Ok(response)
    }

    /// Exchange one command and decode the response.
    ///
    /// The status word is decoded but not interpreted.
    pub fn exchange_decoded(
        &mut self,
        command: &Command,
        max_response_len: usize,
    ) -> Result<Response, ChannelError> {
        let wire = self.exchange(command, max_response_len)?;
        Ok(Response::from_wire(&wire)?)
    }
}
