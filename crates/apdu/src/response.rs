//! APDU response parsing
//!
//! A response arrives as ASCII hex: optional payload characters followed by
//! the four characters of the status word. [`Response::from_wire`] decodes
//! the hex and splits the trailing status word; it does not judge whether the
//! status means success.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::hexwire::{self, CodecError};
use crate::status::StatusWord;

/// Errors produced while parsing a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResponseError {
    /// Response too short to contain a status word
    #[error("response of {0} bytes is too short for a status word")]
    TooShort(usize),
    /// Hex decoding failure
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Decoded APDU response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data
    payload: Option<Bytes>,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a response with payload and status
    pub fn new(payload: Option<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload,
            status: status.into(),
        }
    }

    /// Create a success response
    pub const fn success(payload: Option<Bytes>) -> Self {
        Self {
            payload,
            status: StatusWord::new(0x90, 0x00),
        }
    }

    /// Parse a response from its ASCII-hex wire form
    pub fn from_wire(wire: &[u8]) -> Result<Self, ResponseError> {
        if wire.len() < hexwire::STATUS_WIRE_LEN {
            return Err(ResponseError::TooShort(wire.len()));
        }

        let decoded = hexwire::decode(wire)?;
        let split = decoded.len() - 2;
        let status = StatusWord::new(decoded[split], decoded[split + 1]);
        let payload = (split > 0).then(|| decoded.slice(..split));

        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.as_ref().map_or(0, Bytes::len),
            "Parsed APDU response"
        );

        Ok(Self { payload, status })
    }

    /// Get the response payload data
    pub const fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Length of the decoded payload in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }

    /// Convert into the payload, or the offending status word on failure
    pub fn into_payload(self) -> Result<Option<Bytes>, StatusWord> {
        if self.status.is_success() {
            Ok(self.payload)
        } else {
            Err(self.status)
        }
    }

    /// Serialize back to the ASCII-hex wire form
    pub fn to_wire(&self) -> Bytes {
        let mut raw = BytesMut::with_capacity(self.payload_len() + 2);
        if let Some(payload) = &self.payload {
            raw.put_slice(payload);
        }
        raw.put_u8(self.status.sw1);
        raw.put_u8(self.status.sw2);
        hexwire::encode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_response_from_wire() {
        let resp = Response::from_wire(b"0102039000").unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.payload().unwrap().as_ref(), hex!("010203"));

        let resp = Response::from_wire(b"9000").unwrap();
        assert!(resp.is_success());
        assert!(resp.payload().is_none());

        let resp = Response::from_wire(b"6A82").unwrap();
        assert!(!resp.is_success());
        assert_eq!(resp.status(), StatusWord::new(0x6A, 0x82));
    }

    #[test]
    fn test_response_from_wire_rejects_short_input() {
        assert_eq!(Response::from_wire(b"90"), Err(ResponseError::TooShort(2)));
        assert!(Response::from_wire(b"").is_err());
    }

    #[test]
    fn test_response_into_payload() {
        let resp = Response::from_wire(b"AA559000").unwrap();
        assert_eq!(
            resp.into_payload().unwrap().unwrap().as_ref(),
            hex!("AA55")
        );

        let resp = Response::from_wire(b"6985").unwrap();
        assert_eq!(resp.into_payload(), Err(StatusWord::new(0x69, 0x85)));
    }

    #[test]
    fn test_response_wire_round_trip() {
        let resp = Response::success(Some(Bytes::from_static(&hex!("DEADBEEF"))));
        assert_eq!(resp.to_wire().as_ref(), b"DEADBEEF9000");
        assert_eq!(Response::from_wire(&resp.to_wire()).unwrap(), resp);
    }
}
