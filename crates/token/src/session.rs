//! Token session state machine
//!
//! [`Token`] owns the channel and the object directory and dispatches the
//! module-level command surface. Exactly one session exists at a time
//! (single-slot, single-session model); exclusivity is enforced by ownership,
//! every operation taking `&mut self`.
//!
//! The sign/encrypt/decrypt pairs follow an init→operate shape. The active
//! state is taken from the session unconditionally when the single-shot
//! operation runs, so a failed attempt can never leave the session wedged in
//! the active state.

use bytes::Bytes;
use tracing::{debug, info};
use zeroize::Zeroizing;

use hexlink_apdu::{ApduChannel, SecureElementTransport};

use crate::constants::{CERT_HEADER_LEN, DIGEST_LENGTH, SECRET_KEY_LENGTH, SLOT_ID, fid};
use crate::directory::ObjectDirectory;
use crate::error::{Error, Result};
use crate::file_access::{FileAccessEngine, certificate_total_length};
use crate::key_ops::KeyOperationEngine;
use crate::labels;
use crate::types::{
    AttributeType, AttributeValue, Handle, HkdfParams, MECHANISMS, MODULE_INFO, Mechanism,
    MechanismInfo, ModuleInfo, ObjectClass, ObjectTemplate, SLOT_INFO, SessionFlags, SlotInfo,
    TOKEN_INFO, TokenInfo,
};

/// An in-progress init→operate pair
#[derive(Debug, Clone, Copy)]
struct ActiveOperation {
    mechanism: Mechanism,
    target_key: u8,
}

/// Cursor state for the single-shot find peek
#[derive(Debug)]
struct FindState {
    result: Option<Handle>,
    consumed: bool,
}

/// State of the one open session
#[derive(Debug)]
struct SessionState {
    flags: SessionFlags,
    sign: Option<ActiveOperation>,
    encrypt: Option<ActiveOperation>,
    decrypt: Option<ActiveOperation>,
    find: Option<FindState>,
}

impl SessionState {
    const fn new(flags: SessionFlags) -> Self {
        Self {
            flags,
            sign: None,
            encrypt: None,
            decrypt: None,
            find: None,
        }
    }
}

/// The token middleware: one secure element, one session
#[derive(Debug)]
pub struct Token<T: SecureElementTransport> {
    channel: ApduChannel<T>,
    directory: ObjectDirectory,
    initialized: bool,
    session: Option<SessionState>,
}

impl<T: SecureElementTransport> Token<T> {
    /// Create an uninitialized token over the given transport
    pub const fn new(transport: T) -> Self {
        Self {
            channel: ApduChannel::new(transport),
            directory: ObjectDirectory::new(),
            initialized: false,
            session: None,
        }
    }

    /// The object directory, as enumerated at initialization
    pub const fn directory(&self) -> &ObjectDirectory {
        &self.directory
    }

    /// Low-level file-system access on the element
    pub fn file_engine(&mut self) -> FileAccessEngine<'_, T> {
        FileAccessEngine::new(&mut self.channel)
    }

    /// Low-level key operations on the element
    pub fn key_engine(&mut self) -> KeyOperationEngine<'_, T> {
        KeyOperationEngine::new(&mut self.channel)
    }

    /// Open the transport and enumerate the element's resources.
    ///
    /// Must complete before any other call; not callable twice.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }

        self.channel.open()?;
        FileAccessEngine::new(&mut self.channel).select_by_path(&[])?;
        self.directory.load_token_objects(&mut self.channel)?;
        self.initialized = true;

        info!("Token middleware initialized");
        Ok(())
    }

    /// Tear down.
    ///
    /// Tolerates being called repeatedly; the link close is attempted in
    /// every case.
    pub fn finalize(&mut self) -> Result<()> {
        self.session = None;
        self.directory.remove_session_objects();
        self.initialized = false;
        self.channel.close()?;

        debug!("Token middleware finalized");
        Ok(())
    }

    /// Open the single session.
    ///
    /// The checks run in a fixed order: slot identifier, module
    /// initialization, existing session, then the mandatory serial flag —
    /// each later check assumes the earlier ones passed.
    pub fn open_session(&mut self, slot_id: u64, flags: SessionFlags) -> Result<()> {
        if slot_id != SLOT_ID {
            return Err(Error::SlotIdInvalid);
        }
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.session.is_some() {
            return Err(Error::SessionExists);
        }
        if !flags.contains(SessionFlags::SERIAL_SESSION) {
            return Err(Error::SessionParallelNotSupported);
        }

        self.session = Some(SessionState::new(flags));
        debug!(flags = flags.bits(), "Session opened");
        Ok(())
    }

    /// Close the session, dropping session-scoped objects
    pub fn close_session(&mut self) -> Result<()> {
        self.session.take().ok_or(Error::SessionClosed)?;
        self.directory.remove_session_objects();
        debug!("Session closed");
        Ok(())
    }

    /// Flags the session was opened with
    pub fn session_flags(&self) -> Result<SessionFlags> {
        Ok(self.require_session()?.flags)
    }

    fn require_session(&self) -> Result<&SessionState> {
        self.session.as_ref().ok_or(Error::SessionClosed)
    }

    fn require_session_mut(&mut self) -> Result<&mut SessionState> {
        self.session.as_mut().ok_or(Error::SessionClosed)
    }

    /// Create an object on the element.
    ///
    /// The handle is allocated only after the backing write succeeded; a
    /// failed write leaves the directory untouched.
    pub fn create_object(&mut self, template: &ObjectTemplate) -> Result<Handle> {
        self.require_session()?;

        match template.class {
            ObjectClass::Certificate => {
                template.label.as_ref().ok_or(Error::TemplateIncomplete)?;
                let value = template.value.as_ref().ok_or(Error::TemplateIncomplete)?;

                let mut file = FileAccessEngine::new(&mut self.channel);
                file.select_by_fid(fid::CERTIFICATE)?;
                file.update_binary(value, 0)?;
                self.directory
                    .update_handle(labels::MAIN_CERTIFICATE, template)
            }
            ObjectClass::SecretKey => {
                let label = template.label.as_ref().ok_or(Error::TemplateIncomplete)?;
                if label.as_str() != labels::PSK {
                    return Err(Error::AttributeValueInvalid);
                }
                let value = template.value.as_ref().ok_or(Error::TemplateIncomplete)?;
                if value.len() != SECRET_KEY_LENGTH {
                    return Err(Error::AttributeValueInvalid);
                }

                let slot = labels::key_slot(labels::PSK).ok_or(Error::FunctionFailed)?;
                KeyOperationEngine::new(&mut self.channel).put_secret_key(slot, value)?;
                self.directory.update_handle(labels::PSK, template)
            }
            ObjectClass::Data => {
                let label = template.label.as_ref().ok_or(Error::TemplateIncomplete)?;
                if label.as_str() != labels::DATA_OBJECT {
                    return Err(Error::AttributeValueInvalid);
                }
                let value = template.value.as_ref().ok_or(Error::TemplateIncomplete)?;

                let mut file = FileAccessEngine::new(&mut self.channel);
                file.select_by_fid(fid::DATA_OBJECT)?;
                file.update_binary(value, 0)?;
                self.directory.update_handle(labels::DATA_OBJECT, template)
            }
            ObjectClass::PrivateKey | ObjectClass::PublicKey => Err(Error::AttributeValueInvalid),
        }
    }

    /// Read one attribute of an object.
    ///
    /// Values of certificates and data objects are read back from the
    /// element; secret-key values never leave it.
    pub fn get_attribute_value(
        &mut self,
        handle: Handle,
        attribute: AttributeType,
    ) -> Result<AttributeValue> {
        self.require_session()?;
        let object = self
            .directory
            .find_by_handle(handle)
            .ok_or(Error::ObjectHandleInvalid)?;
        let (class, label, token) = (object.class, object.label.clone(), object.token);

        match attribute {
            AttributeType::Class => Ok(AttributeValue::Class(class)),
            AttributeType::Label => Ok(AttributeValue::Label(label)),
            AttributeType::Token => Ok(AttributeValue::Token(token)),
            AttributeType::Value => match class {
                ObjectClass::Certificate => {
                    let mut file = FileAccessEngine::new(&mut self.channel);
                    file.select_by_fid(fid::CERTIFICATE)?;
                    let header = file.read_binary(0, CERT_HEADER_LEN)?;
                    let total = certificate_total_length(&header);
                    if total <= CERT_HEADER_LEN {
                        return Err(Error::FunctionFailed);
                    }
                    Ok(AttributeValue::Value(file.read_binary(0, total)?))
                }
                ObjectClass::Data => {
                    let mut file = FileAccessEngine::new(&mut self.channel);
                    let len = file.select_by_fid(fid::DATA_OBJECT)?.unwrap_or(0) as usize;
                    if len == 0 {
                        return Err(Error::FunctionFailed);
                    }
                    Ok(AttributeValue::Value(file.read_binary(0, len)?))
                }
                _ => Err(Error::AttributeSensitive),
            },
        }
    }

    /// Start a find for the given label.
    ///
    /// The token supports a single-shot peek: at most one match, consumable
    /// exactly once until the next init.
    pub fn find_objects_init(&mut self, label: &str) -> Result<()> {
        if self.require_session()?.find.is_some() {
            return Err(Error::OperationActive);
        }

        let result = self
            .directory
            .find_by_label(label)
            .and_then(|object| object.handle);
        self.require_session_mut()?.find = Some(FindState {
            result,
            consumed: false,
        });
        Ok(())
    }

    /// Return the match, if any and not yet consumed
    pub fn find_objects(&mut self, max_count: usize) -> Result<Vec<Handle>> {
        let session = self.require_session_mut()?;
        let find = session.find.as_mut().ok_or(Error::OperationNotInitialized)?;

        if max_count == 0 || find.consumed {
            return Ok(Vec::new());
        }
        find.consumed = true;
        Ok(find.result.take().into_iter().collect())
    }

    /// Finish the find
    pub fn find_objects_final(&mut self) -> Result<()> {
        self.require_session_mut()?
            .find
            .take()
            .ok_or(Error::OperationNotInitialized)?;
        Ok(())
    }

    /// Initialize a signing operation with the given key.
    ///
    /// A null mechanism selects the token default.
    pub fn sign_init(&mut self, mechanism: Option<Mechanism>, key: Handle) -> Result<()> {
        if self.require_session()?.sign.is_some() {
            return Err(Error::OperationActive);
        }

        let object = self
            .directory
            .find_by_handle(key)
            .ok_or(Error::KeyHandleInvalid)?;
        if object.class != ObjectClass::SecretKey {
            return Err(Error::KeyTypeInconsistent);
        }
        let target_key = labels::routing_byte(&object.label)?;
        let mechanism = match mechanism {
            None | Some(Mechanism::AesMac) => Mechanism::AesMac,
            Some(_) => return Err(Error::MechanismInvalid),
        };

        self.require_session_mut()?.sign = Some(ActiveOperation {
            mechanism,
            target_key,
        });
        debug!(key = %key, "Sign initialized");
        Ok(())
    }

    /// Sign a digest with the key selected at init.
    ///
    /// The active state is taken before any check so the operation is closed
    /// whether this attempt succeeds or fails.
    pub fn sign(&mut self, digest: &[u8]) -> Result<Bytes> {
        let session = self.require_session_mut()?;
        let operation = session.sign.take().ok_or(Error::OperationNotInitialized)?;

        if digest.len() != DIGEST_LENGTH {
            return Err(Error::DataLenRange);
        }
        debug!(mechanism = ?operation.mechanism, "Signing digest");
        KeyOperationEngine::new(&mut self.channel).compute_signature(operation.target_key, digest)
    }

    /// Initialize an encryption operation; null mechanism selects the default
    pub fn encrypt_init(&mut self, mechanism: Option<Mechanism>, key: Handle) -> Result<()> {
        if self.require_session()?.encrypt.is_some() {
            return Err(Error::OperationActive);
        }
        let operation = self.cipher_operation(mechanism, key)?;
        self.require_session_mut()?.encrypt = Some(operation);
        Ok(())
    }

    /// Encrypt with the key selected at init; state is reset either way
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        let session = self.require_session_mut()?;
        let operation = session
            .encrypt
            .take()
            .ok_or(Error::OperationNotInitialized)?;
        debug!(mechanism = ?operation.mechanism, "Encrypting");
        KeyOperationEngine::new(&mut self.channel).encrypt(operation.target_key, plaintext)
    }

    /// Initialize a decryption operation; null mechanism selects the default
    pub fn decrypt_init(&mut self, mechanism: Option<Mechanism>, key: Handle) -> Result<()> {
        if self.require_session()?.decrypt.is_some() {
            return Err(Error::OperationActive);
        }
        let operation = self.cipher_operation(mechanism, key)?;
        self.require_session_mut()?.decrypt = Some(operation);
        Ok(())
    }

    /// Decrypt with the key selected at init; state is reset either way
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Bytes> {
        let session = self.require_session_mut()?;
        let operation = session
            .decrypt
            .take()
            .ok_or(Error::OperationNotInitialized)?;
        debug!(mechanism = ?operation.mechanism, "Decrypting");
        KeyOperationEngine::new(&mut self.channel).decrypt(operation.target_key, ciphertext)
    }

    fn cipher_operation(
        &self,
        mechanism: Option<Mechanism>,
        key: Handle,
    ) -> Result<ActiveOperation> {
        let object = self
            .directory
            .find_by_handle(key)
            .ok_or(Error::KeyHandleInvalid)?;
        if object.class != ObjectClass::SecretKey {
            return Err(Error::KeyTypeInconsistent);
        }
        let target_key = labels::routing_byte(&object.label)?;
        let mechanism = match mechanism {
            None | Some(Mechanism::AesCbc) => Mechanism::AesCbc,
            Some(_) => return Err(Error::MechanismInvalid),
        };
        Ok(ActiveOperation {
            mechanism,
            target_key,
        })
    }

    /// Verify a signature on the element
    pub fn verify(&mut self, data: &[u8], signature: &[u8]) -> Result<()> {
        self.require_session()?;
        KeyOperationEngine::new(&mut self.channel).verify_signature(data, signature)
    }

    /// Derive a new secret key from `base`.
    ///
    /// Only HKDF derivation is accepted, and only along the fixed tree:
    /// `PSK` derives exactly `MSK`; everything else follows the routing
    /// rules of the derived-key labels.
    pub fn derive_key(
        &mut self,
        mechanism: Mechanism,
        params: &HkdfParams<'_>,
        base: Handle,
        template: &ObjectTemplate,
    ) -> Result<Handle> {
        self.require_session()?;
        if mechanism != Mechanism::HkdfDerive {
            return Err(Error::MechanismInvalid);
        }

        let object = self
            .directory
            .find_by_handle(base)
            .ok_or(Error::KeyHandleInvalid)?;
        if object.class != ObjectClass::SecretKey || !object.derive {
            return Err(Error::KeyTypeInconsistent);
        }
        let base_label = object.label.clone();

        let derived_label = template
            .label
            .as_ref()
            .ok_or(Error::TemplateIncomplete)?
            .clone();
        if derived_label == base_label {
            return Err(Error::AttributeValueInvalid);
        }
        if base_label == labels::PSK && derived_label != labels::MSK {
            return Err(Error::AttributeValueInvalid);
        }

        KeyOperationEngine::new(&mut self.channel).derive_secret_hkdf(
            &base_label,
            &derived_label,
            params.salt,
            params.info,
        )?;
        self.directory.update_handle(&derived_label, template)
    }

    /// Derive a shared secret from a peer public key via ECDH on the element
    pub fn ecdh_shared_secret(&mut self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.require_session()?;
        KeyOperationEngine::new(&mut self.channel).derive_secret_ecdh(peer_public_key)
    }

    /// Generate a key pair on the element
    pub fn generate_key_pair(
        &mut self,
        mechanism: Mechanism,
        bso_id: u8,
        public_key_fid: u16,
    ) -> Result<()> {
        self.require_session()?;
        if mechanism != Mechanism::EcKeyPairGen {
            return Err(Error::MechanismInvalid);
        }
        KeyOperationEngine::new(&mut self.channel).generate_key_pair(bso_id, public_key_fid)
    }

    /// Generate `len` random bytes on the element
    pub fn generate_random(&mut self, len: usize) -> Result<Bytes> {
        self.require_session()?;
        KeyOperationEngine::new(&mut self.channel).get_challenge(len)
    }

    /// Module-level information
    pub const fn module_info(&self) -> ModuleInfo {
        MODULE_INFO
    }

    /// Identifiers of the available slots
    pub fn slot_list(&self) -> Vec<u64> {
        vec![SLOT_ID]
    }

    /// Information about a slot
    pub fn slot_info(&self, slot_id: u64) -> Result<SlotInfo> {
        (slot_id == SLOT_ID)
            .then_some(SLOT_INFO)
            .ok_or(Error::SlotIdInvalid)
    }

    /// Information about the token in a slot
    pub fn token_info(&self, slot_id: u64) -> Result<TokenInfo> {
        (slot_id == SLOT_ID)
            .then_some(TOKEN_INFO)
            .ok_or(Error::SlotIdInvalid)
    }

    /// Mechanisms the token supports
    pub fn mechanism_list(&self, slot_id: u64) -> Result<Vec<Mechanism>> {
        if slot_id != SLOT_ID {
            return Err(Error::SlotIdInvalid);
        }
        Ok(MECHANISMS.to_vec())
    }

    /// Information about one mechanism
    pub fn mechanism_info(&self, slot_id: u64, mechanism: Mechanism) -> Result<MechanismInfo> {
        if slot_id != SLOT_ID {
            return Err(Error::SlotIdInvalid);
        }
        MechanismInfo::for_mechanism(mechanism).ok_or(Error::MechanismInvalid)
    }
}
