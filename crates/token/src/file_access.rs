//! File-system access engine
//!
//! SELECT, chunked READ/UPDATE BINARY and READ RECORD against the element's
//! internal file system. The engine is a borrowing view over the channel;
//! every call is a complete APDU round trip and no state is kept between
//! calls.

use bytes::{Bytes, BytesMut};
use iso7816_tlv::simple::Tlv;
use tracing::{debug, trace};

use hexlink_apdu::channel::response_capacity;
use hexlink_apdu::{ApduChannel, Command, SecureElementTransport};

use crate::constants::{
    CERT_HEADER_LEN, READ_BINARY_BLOCK_SIZE, UPDATE_BINARY_BLOCK_SIZE, cla, fid, ins, select_p1,
    tags,
};
use crate::error::{Error, Result};

/// Upper bound on FCI payload length accepted after SELECT
const MAX_FCI_LEN: usize = 32;

/// Total certificate length from its 4-byte header: big-endian bytes 3-4
/// plus the header itself.
pub fn certificate_total_length(header: &[u8]) -> usize {
    if header.len() < CERT_HEADER_LEN {
        return 0;
    }
    u16::from_be_bytes([header[2], header[3]]) as usize + CERT_HEADER_LEN
}

/// Engine for file-system navigation and transparent-file I/O
#[derive(Debug)]
pub struct FileAccessEngine<'c, T: SecureElementTransport> {
    channel: &'c mut ApduChannel<T>,
}

impl<'c, T: SecureElementTransport> FileAccessEngine<'c, T> {
    /// Create a view over the channel
    pub fn new(channel: &'c mut ApduChannel<T>) -> Self {
        Self { channel }
    }

    /// SELECT a file by its identifier.
    ///
    /// On success returns the two-byte selection option from the FCI when the
    /// element sent one; a malformed or absent FCI yields `None` rather than
    /// an error.
    pub fn select_by_fid(&mut self, fid: u16) -> Result<Option<u16>> {
        let cmd = Command::new(cla::ISO7816, ins::SELECT, select_p1::BY_FID, 0x00)
            .with_data(fid.to_be_bytes().to_vec());
        let response = self
            .channel
            .exchange_decoded(&cmd, response_capacity(MAX_FCI_LEN))?;
        let payload = response.into_payload()?;

        trace!(fid = format_args!("{fid:04X}"), "Selected file");
        Ok(payload.as_deref().and_then(selection_option))
    }

    /// SELECT a path of file identifiers from the root.
    ///
    /// An empty path selects the master file; otherwise each identifier is
    /// selected in order, stopping at the first failure.
    pub fn select_by_path(&mut self, path: &[u16]) -> Result<()> {
        if path.is_empty() {
            self.select_by_fid(fid::MASTER)?;
            return Ok(());
        }
        for &element in path {
            self.select_by_fid(element)?;
        }
        Ok(())
    }

    /// Read `len` bytes from the selected file starting at `offset`.
    ///
    /// Reads are chunked into blocks of [`READ_BINARY_BLOCK_SIZE`]; after each
    /// block the offset advances and the remainder shrinks by the block size,
    /// and the terminal partial block is read after the loop. A mid-sequence
    /// failure aborts immediately; already-read blocks are discarded.
    pub fn read_binary(&mut self, mut offset: u16, len: usize) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(len);
        let mut remaining = len;

        while remaining > READ_BINARY_BLOCK_SIZE {
            self.read_block(offset, READ_BINARY_BLOCK_SIZE, &mut out)?;
            offset += READ_BINARY_BLOCK_SIZE as u16;
            remaining -= READ_BINARY_BLOCK_SIZE;
        }
        if remaining > 0 {
            self.read_block(offset, remaining, &mut out)?;
        }

        Ok(out.freeze())
    }

    fn read_block(&mut self, offset: u16, len: usize, out: &mut BytesMut) -> Result<()> {
        let [offset_hi, offset_lo] = offset.to_be_bytes();
        let cmd = Command::new(cla::ISO7816, ins::READ_BINARY, offset_hi, offset_lo)
            .with_le(len as u8);
        let response = self.channel.exchange_decoded(&cmd, response_capacity(len))?;
        let payload = response.into_payload()?.unwrap_or_default();
        if payload.len() != len {
            debug!(
                expected = len,
                actual = payload.len(),
                "READ BINARY returned a short block"
            );
            return Err(Error::UnexpectedResponseLength);
        }
        out.extend_from_slice(&payload);
        Ok(())
    }

    /// Write `data` into the selected file starting at `offset`.
    ///
    /// Writes are chunked into blocks of [`UPDATE_BINARY_BLOCK_SIZE`]. This is
    /// best-effort streaming: a failure mid-sequence aborts without rolling
    /// back blocks already written.
    pub fn update_binary(&mut self, data: &[u8], mut offset: u16) -> Result<()> {
        if data.is_empty() {
            return Err(Error::ArgumentsBad);
        }

        for chunk in data.chunks(UPDATE_BINARY_BLOCK_SIZE) {
            let [offset_hi, offset_lo] = offset.to_be_bytes();
            let cmd = Command::new(cla::ISO7816, ins::UPDATE_BINARY, offset_hi, offset_lo)
                .with_data(chunk.to_vec());
            let response = self.channel.exchange_decoded(&cmd, response_capacity(0))?;
            response.into_payload()?;
            offset += chunk.len() as u16;
        }

        Ok(())
    }

    /// Read one record into `out`, returning the decoded byte count
    pub fn read_record(
        &mut self,
        access_mode: u8,
        record_number: u8,
        out: &mut [u8],
    ) -> Result<usize> {
        let cmd = Command::new(cla::ISO7816, ins::READ_RECORD, record_number, access_mode)
            .with_le(0x00);
        let response = self
            .channel
            .exchange_decoded(&cmd, response_capacity(out.len()))?;
        let payload = response.into_payload()?.unwrap_or_default();
        if payload.len() > out.len() {
            return Err(Error::BufferTooSmall);
        }
        out[..payload.len()].copy_from_slice(&payload);
        Ok(payload.len())
    }
}

/// Extract the two-byte selection option from an FCI payload.
///
/// Fail-closed: any TLV inconsistency means "no option".
fn selection_option(fci: &[u8]) -> Option<u16> {
    let mut remaining = fci;
    while !remaining.is_empty() {
        let (parsed, rest) = Tlv::parse(remaining);
        let tlv = parsed.ok()?;
        let tag: u8 = tlv.tag().into();
        if tag == tags::SELECTION_OPTION {
            let value = tlv.value();
            return (value.len() == 2).then(|| u16::from_be_bytes([value[0], value[1]]));
        }
        remaining = rest;
    }
    None
}
