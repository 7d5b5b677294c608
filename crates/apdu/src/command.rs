//! APDU command framing
//!
//! Commands for this element always carry the five-byte header
//! `CLA INS P1 P2 Lc` followed by `Lc` payload bytes and an optional Le.
//! The Lc byte is emitted even when the payload is empty; the hex wire frame
//! for a command is therefore `2 * (5 + Lc (+ 1))` ASCII characters.

use bytes::{BufMut, Bytes, BytesMut};

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command payload data (optional)
    pub data: Option<Bytes>,
    /// Expected response length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Length of the serialized command in bytes (before hex encoding)
    pub fn serialized_length(&self) -> usize {
        5 + self.data.as_ref().map_or(0, |d| d.len()) + usize::from(self.le.is_some())
    }

    /// Serialize to raw bytes: `CLA INS P1 P2 Lc [data] [Le]`
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.serialized_length());

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        // Lc is always present on this wire, zero for an empty payload
        match &self.data {
            Some(data) => {
                buffer.put_u8(data.len() as u8);
                buffer.put_slice(data);
            }
            None => buffer.put_u8(0x00),
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Parse a command from raw bytes using the always-Lc framing
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 5 {
            return None;
        }

        let lc = data[4] as usize;
        if data.len() < 5 + lc {
            return None;
        }

        let mut command = Self::new(data[0], data[1], data[2], data[3]);
        if lc > 0 {
            command.data = Some(Bytes::copy_from_slice(&data[5..5 + lc]));
        }

        match data.len() - (5 + lc) {
            0 => {}
            1 => command.le = Some(data[5 + lc]),
            _ => return None,
        }

        Some(command)
    }
}
