//! Test support: scripted transports and wire helpers

use std::fmt;

use bytes::Bytes;

use hexlink_apdu::{
    Command, Response, SecureElementTransport, StatusWord, TransportError, hexwire,
};

use crate::constants::{CERT_HEADER_LEN, fid, ins};

/// Success response frame carrying `payload`
pub(crate) fn ok_wire(payload: &[u8]) -> Bytes {
    let payload = (!payload.is_empty()).then(|| Bytes::copy_from_slice(payload));
    Response::success(payload).to_wire()
}

/// Bare status-word response frame
pub(crate) fn sw_wire(sw: u16) -> Bytes {
    Response::new(None, StatusWord::from_u16(sw)).to_wire()
}

/// Transport that parses each command frame and answers via a handler
pub(crate) struct ScriptedTransport<F> {
    handler: F,
    commands: Vec<Command>,
}

impl<F> ScriptedTransport<F>
where
    F: FnMut(&Command) -> Bytes + Send + Sync,
{
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            commands: Vec::new(),
        }
    }

    /// Every command received so far, in order
    pub(crate) fn commands(&self) -> &[Command] {
        &self.commands
    }
}

impl<F> fmt::Debug for ScriptedTransport<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("commands", &self.commands.len())
            .finish()
    }
}

impl<F> SecureElementTransport for ScriptedTransport<F>
where
    F: FnMut(&Command) -> Bytes + Send + Sync,
{
    fn open(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn transmit(
        &mut self,
        command: &[u8],
        _max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        let raw = hexwire::decode(command).expect("command frame must be valid hex");
        let cmd = Command::from_bytes(&raw).expect("command frame must parse");
        let response = (self.handler)(&cmd);
        self.commands.push(cmd);
        Ok(response)
    }
}

/// Transport that answers via a handler for the first `ok_count` exchanges,
/// then fails with the given link code.
#[derive(Debug)]
pub(crate) struct FailingTransport {
    handler: fn(&Command) -> Bytes,
    remaining_ok: usize,
    code: i32,
}

impl FailingTransport {
    pub(crate) fn after(handler: fn(&Command) -> Bytes, ok_count: usize, code: i32) -> Self {
        Self {
            handler,
            remaining_ok: ok_count,
            code,
        }
    }
}

impl SecureElementTransport for FailingTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn transmit(
        &mut self,
        command: &[u8],
        _max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        if self.remaining_ok == 0 {
            return Err(TransportError::new(self.code));
        }
        self.remaining_ok -= 1;

        let raw = hexwire::decode(command).expect("command frame must be valid hex");
        let cmd = Command::from_bytes(&raw).expect("command frame must parse");
        Ok((self.handler)(&cmd))
    }
}

/// Canned element where every well-known resource is present.
///
/// Keys all report present; the certificate header announces 16 content
/// bytes; the data object's FCI reports 64 bytes; reads return filler.
pub(crate) fn stub_element(cmd: &Command) -> Bytes {
    match cmd.ins {
        ins::SELECT => {
            if cmd.data.as_deref() == Some(&fid::DATA_OBJECT.to_be_bytes()[..]) {
                ok_wire(&[0x85, 0x02, 0x00, 0x40])
            } else {
                ok_wire(&[])
            }
        }
        ins::KEY_STATUS => ok_wire(&[]),
        ins::READ_BINARY => {
            let le = cmd.le.unwrap_or(0) as usize;
            if le == CERT_HEADER_LEN {
                ok_wire(&[0x30, 0x82, 0x00, 0x10])
            } else {
                ok_wire(&vec![0xCC; le])
            }
        }
        ins::UPDATE_BINARY
        | ins::PUT_KEY
        | ins::DERIVE_HKDF
        | ins::GENERATE_KEY_PAIR
        | ins::PSO_VERIFY => ok_wire(&[]),
        ins::GET_CHALLENGE => ok_wire(&vec![0xAB; cmd.p2 as usize]),
        ins::COMPUTE_SIGNATURE => ok_wire(&[0x5A; 64]),
        ins::DERIVE_ECDH => {
            let mut payload = vec![0u8; 4];
            payload.extend_from_slice(&[0x77; 16]);
            ok_wire(&payload)
        }
        ins::ENCIPHER | ins::DECIPHER => ok_wire(&[0xE1; 16]),
        ins::READ_RECORD => ok_wire(&[0x01, 0x02]),
        _ => sw_wire(0x6D00),
    }
}
