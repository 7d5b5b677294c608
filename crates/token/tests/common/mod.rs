//! Emulated secure element for integration tests
//!
//! Parses each hex command frame and models just enough state to exercise
//! the middleware end to end: a tiny transparent-file system keyed by FID,
//! a set of present key slots, and canned key-operation responses.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use hexlink_apdu::{
    Command, Response, SecureElementTransport, StatusWord, TransportError, hexwire,
};
use hexlink_token::constants::{fid, ins};

#[derive(Debug)]
pub struct EmulatedElement {
    files: HashMap<u16, Vec<u8>>,
    keys: HashSet<u8>,
    selected: Option<u16>,
}

impl EmulatedElement {
    /// Element with empty files and no key material
    pub fn blank() -> Self {
        let mut files = HashMap::new();
        files.insert(fid::CERTIFICATE, Vec::new());
        files.insert(fid::DATA_OBJECT, Vec::new());
        files.insert(fid::PUBLIC_KEY, Vec::new());
        Self {
            files,
            keys: HashSet::new(),
            selected: None,
        }
    }

    /// Element with every well-known key present and populated files
    pub fn provisioned() -> Self {
        let mut element = Self::blank();
        element
            .keys
            .extend([0x00, 0x01, 0x02, b'1', b'2', b'3', b'4', b'5', b'6', b'7']);

        // Certificate: 4-byte length header announcing 8 content bytes
        let mut certificate = vec![0x30, 0x82, 0x00, 0x08];
        certificate.extend_from_slice(&[0xC1; 8]);
        element.files.insert(fid::CERTIFICATE, certificate);

        element.files.insert(
            fid::DATA_OBJECT,
            b"https://mud.example/device.json".to_vec(),
        );
        element
    }

    fn respond(&mut self, cmd: &Command) -> Response {
        match cmd.ins {
            ins::SELECT => self.select(cmd),
            ins::READ_BINARY => self.read_binary(cmd),
            ins::UPDATE_BINARY => self.update_binary(cmd),
            ins::KEY_STATUS => {
                if self.keys.contains(&cmd.p1) {
                    Response::success(None)
                } else {
                    Response::new(None, StatusWord::new(0x6A, 0x88))
                }
            }
            ins::PUT_KEY => {
                self.keys.insert(cmd.p1);
                Response::success(None)
            }
            ins::DERIVE_HKDF | ins::GENERATE_KEY_PAIR | ins::PSO_VERIFY => Response::success(None),
            ins::COMPUTE_SIGNATURE => {
                Response::success(Some(Bytes::from(vec![0x51; 64])))
            }
            ins::DERIVE_ECDH => {
                let mut payload = vec![0u8; 4];
                payload.extend_from_slice(&[0x99; 32]);
                Response::success(Some(Bytes::from(payload)))
            }
            ins::GET_CHALLENGE => {
                Response::success(Some(Bytes::from(vec![0x42; cmd.p2 as usize])))
            }
            _ => Response::new(None, StatusWord::new(0x6D, 0x00)),
        }
    }

    fn select(&mut self, cmd: &Command) -> Response {
        let Some(data) = cmd.data.as_deref() else {
            return Response::new(None, StatusWord::new(0x67, 0x00));
        };
        if data.len() != 2 {
            return Response::new(None, StatusWord::new(0x67, 0x00));
        }
        let fid = u16::from_be_bytes([data[0], data[1]]);

        if fid == fid::MASTER {
            self.selected = None;
            return Response::success(None);
        }
        match self.files.get(&fid) {
            Some(content) => {
                self.selected = Some(fid);
                let size = (content.len() as u16).to_be_bytes();
                // FCI: proprietary tag 85 carrying the file size
                let fci = vec![0x85, 0x02, size[0], size[1]];
                Response::success(Some(Bytes::from(fci)))
            }
            None => Response::new(None, StatusWord::new(0x6A, 0x82)),
        }
    }

    fn read_binary(&mut self, cmd: &Command) -> Response {
        let Some(selected) = self.selected else {
            return Response::new(None, StatusWord::new(0x69, 0x86));
        };
        let content = &self.files[&selected];
        let offset = u16::from_be_bytes([cmd.p1, cmd.p2]) as usize;
        let len = cmd.le.unwrap_or(0) as usize;
        if offset + len > content.len() {
            return Response::new(None, StatusWord::new(0x6B, 0x00));
        }
        Response::success(Some(Bytes::copy_from_slice(&content[offset..offset + len])))
    }

    fn update_binary(&mut self, cmd: &Command) -> Response {
        let Some(selected) = self.selected else {
            return Response::new(None, StatusWord::new(0x69, 0x86));
        };
        let Some(data) = cmd.data.as_deref() else {
            return Response::new(None, StatusWord::new(0x67, 0x00));
        };
        let offset = u16::from_be_bytes([cmd.p1, cmd.p2]) as usize;
        let content = self.files.get_mut(&selected).expect("selected file exists");
        if content.len() < offset + data.len() {
            content.resize(offset + data.len(), 0);
        }
        content[offset..offset + data.len()].copy_from_slice(data);
        Response::success(None)
    }
}

impl SecureElementTransport for EmulatedElement {
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
        Ok(self.respond(&cmd).to_wire())
    }
}
