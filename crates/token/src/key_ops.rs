//! Key operation engine
//!
//! Key-pair generation, signing, verification, the provisional cipher
//! operations, secret derivation (ECDH and HKDF), the key presence probe,
//! PUT KEY and challenge generation. Like the file engine this is a borrowing
//! view over the channel; each operation is a single exchange apart from
//! key-pair generation, which first selects the public-key file.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use hexlink_apdu::channel::response_capacity;
use hexlink_apdu::hexwire::STATUS_WIRE_LEN;
use hexlink_apdu::{ApduChannel, Command, Response, SecureElementTransport};

use crate::constants::{
    MAX_DECRYPT_OUTPUT, MAX_ENCRYPT_OUTPUT, MAX_RANDOM_LENGTH, MAX_SIGNATURE_LENGTH, bso, cla,
    ecdh, ins, pso, tags,
};
use crate::error::{Error, Result};
use crate::file_access::FileAccessEngine;
use crate::labels;

/// Engine for key material operations on the element
#[derive(Debug)]
pub struct KeyOperationEngine<'c, T: SecureElementTransport> {
    channel: &'c mut ApduChannel<T>,
}

impl<'c, T: SecureElementTransport> KeyOperationEngine<'c, T> {
    /// Create a view over the channel
    pub fn new(channel: &'c mut ApduChannel<T>) -> Self {
        Self { channel }
    }

    /// Exchange a command whose only acceptable response is a bare status word
    fn exchange_status_only(&mut self, cmd: &Command) -> Result<()> {
        let wire = self.channel.exchange(cmd, response_capacity(0))?;
        if wire.len() != STATUS_WIRE_LEN {
            return Err(Error::UnexpectedResponseLength);
        }
        let response = Response::from_wire(&wire).map_err(|_| Error::FunctionFailed)?;
        response.into_payload()?;
        Ok(())
    }

    /// Generate a key pair in the given BSO slot, public part into
    /// `public_key_fid`.
    pub fn generate_key_pair(&mut self, bso_id: u8, public_key_fid: u16) -> Result<()> {
        FileAccessEngine::new(&mut *self.channel).select_by_fid(public_key_fid)?;

        let [fid_hi, fid_lo] = public_key_fid.to_be_bytes();
        let cmd = Command::new(cla::ISO7816, ins::GENERATE_KEY_PAIR, 0x00, 0x00)
            .with_data(vec![bso::CLASS_KEY, bso_id, fid_hi, fid_lo]);
        self.exchange_status_only(&cmd)?;

        debug!(bso_id, fid = format_args!("{public_key_fid:04X}"), "Generated key pair");
        Ok(())
    }

    /// Compute a signature over `digest` with the key selected by
    /// `target_key`.
    pub fn compute_signature(&mut self, target_key: u8, digest: &[u8]) -> Result<Bytes> {
        if digest.is_empty() {
            return Err(Error::ArgumentsBad);
        }

        let cmd = Command::new(cla::VENDOR, ins::COMPUTE_SIGNATURE, target_key, 0x00)
            .with_data(digest.to_vec());
        let response = self
            .channel
            .exchange_decoded(&cmd, response_capacity(MAX_SIGNATURE_LENGTH))?;
        let signature = response
            .into_payload()?
            .ok_or(Error::UnexpectedResponseLength)?;

        trace!(len = signature.len(), "Computed signature");
        Ok(signature)
    }

    /// Verify `signature` over `data` on the element.
    ///
    /// Data and signature travel in one payload, each as a tagged,
    /// length-prefixed element.
    pub fn verify_signature(&mut self, data: &[u8], signature: &[u8]) -> Result<()> {
        if data.is_empty() || signature.is_empty() {
            return Err(Error::ArgumentsBad);
        }
        if data.len() > u8::MAX as usize || signature.len() > u8::MAX as usize {
            return Err(Error::DataLenRange);
        }

        let mut payload = BytesMut::with_capacity(data.len() + signature.len() + 4);
        payload.put_u8(tags::DATA_TO_VERIFY);
        payload.put_u8(data.len() as u8);
        payload.put_slice(data);
        payload.put_u8(tags::SIGNATURE);
        payload.put_u8(signature.len() as u8);
        payload.put_slice(signature);

        let cmd = Command::new(cla::ISO7816, ins::PSO_VERIFY, pso::VERIFY_P1, pso::VERIFY_P2)
            .with_data(payload.freeze());
        self.exchange_status_only(&cmd)
    }

    /// Encipher `plaintext` with the key selected by `target_key`.
    ///
    /// TODO: confirm the cipher opcodes against the final applet release.
    pub fn encrypt(&mut self, target_key: u8, plaintext: &[u8]) -> Result<Bytes> {
        self.cipher(ins::ENCIPHER, target_key, plaintext, MAX_ENCRYPT_OUTPUT)
    }

    /// Decipher `ciphertext` with the key selected by `target_key`.
    pub fn decrypt(&mut self, target_key: u8, ciphertext: &[u8]) -> Result<Bytes> {
        self.cipher(ins::DECIPHER, target_key, ciphertext, MAX_DECRYPT_OUTPUT)
    }

    fn cipher(&mut self, ins: u8, target_key: u8, input: &[u8], max_output: usize) -> Result<Bytes> {
        if input.is_empty() {
            return Err(Error::ArgumentsBad);
        }
        if input.len() > u8::MAX as usize {
            return Err(Error::DataLenRange);
        }

        let cmd = Command::new(cla::VENDOR, ins, target_key, 0x00).with_data(input.to_vec());
        let response = self
            .channel
            .exchange_decoded(&cmd, response_capacity(max_output))?;
        let output = response
            .into_payload()?
            .ok_or(Error::UnexpectedResponseLength)?;
        if output.len() > max_output {
            return Err(Error::BufferTooSmall);
        }
        Ok(output)
    }

    /// Derive a shared secret from `peer_public_key` via ECDH inside the
    /// element.
    ///
    /// The decoded response starts with a fixed four-byte prefix that is
    /// discarded; the remainder is the secret.
    pub fn derive_secret_ecdh(&mut self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if peer_public_key.is_empty() {
            return Err(Error::ArgumentsBad);
        }
        if peer_public_key.len() > u8::MAX as usize {
            return Err(Error::DataLenRange);
        }

        let mut payload = BytesMut::with_capacity(ecdh::PREAMBLE.len() + 1 + peer_public_key.len());
        payload.put_slice(&ecdh::PREAMBLE);
        payload.put_u8(peer_public_key.len() as u8);
        payload.put_slice(peer_public_key);

        let cmd = Command::new(cla::VENDOR, ins::DERIVE_ECDH, 0x00, 0x00)
            .with_data(payload.freeze());
        let response = self
            .channel
            .exchange_decoded(&cmd, ecdh::MAX_RESPONSE_WIRE)?;
        let payload = response
            .into_payload()?
            .ok_or(Error::UnexpectedResponseLength)?;
        if payload.len() <= ecdh::PREFIX_LEN || payload.len() > ecdh::MAX_PAYLOAD {
            return Err(Error::UnexpectedResponseLength);
        }

        Ok(Zeroizing::new(payload[ecdh::PREFIX_LEN..].to_vec()))
    }

    /// Derive `derived_label` from `base_label` via HKDF inside the element.
    ///
    /// P1/P2 routing follows the label-suffix convention; see
    /// [`labels::hkdf_routing`].
    pub fn derive_secret_hkdf(
        &mut self,
        base_label: &str,
        derived_label: &str,
        salt: &[u8],
        info: &[u8],
    ) -> Result<()> {
        if salt.len() > u8::MAX as usize || info.len() > u8::MAX as usize {
            return Err(Error::DataLenRange);
        }
        let (p1, p2) = labels::hkdf_routing(base_label, derived_label)?;

        let mut payload = BytesMut::with_capacity(salt.len() + info.len() + 2);
        payload.put_u8(salt.len() as u8);
        payload.put_slice(salt);
        payload.put_u8(info.len() as u8);
        payload.put_slice(info);

        let cmd = Command::new(cla::VENDOR, ins::DERIVE_HKDF, p1, p2).with_data(payload.freeze());
        self.exchange_status_only(&cmd)?;

        debug!(base = base_label, derived = derived_label, "Derived secret key");
        Ok(())
    }

    /// Probe whether the key slot holds material.
    ///
    /// A success status means present; any error status means absent.
    /// Transport failures still propagate.
    pub fn secret_key_status(&mut self, target_key: u8) -> Result<bool> {
        let cmd = Command::new(cla::VENDOR, ins::KEY_STATUS, target_key, 0x00);
        let response = self.channel.exchange_decoded(&cmd, response_capacity(1))?;
        Ok(response.is_success())
    }

    /// Write secret-key material into the slot selected by `target_key`
    pub fn put_secret_key(&mut self, target_key: u8, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::ArgumentsBad);
        }
        let cmd = Command::new(cla::ISO7816, ins::PUT_KEY, target_key, 0x00)
            .with_data(value.to_vec());
        self.exchange_status_only(&cmd)
    }

    /// Request `len` random bytes from the element
    pub fn get_challenge(&mut self, len: usize) -> Result<Bytes> {
        if len == 0 || len > MAX_RANDOM_LENGTH {
            return Err(Error::ArgumentsBad);
        }

        let cmd = Command::new(cla::ISO7816, ins::GET_CHALLENGE, 0x00, len as u8);
        let response = self.channel.exchange_decoded(&cmd, response_capacity(len))?;
        let challenge = response
            .into_payload()?
            .ok_or(Error::UnexpectedResponseLength)?;
        if challenge.len() != len {
            return Err(Error::UnexpectedResponseLength);
        }
        Ok(challenge)
    }
}
