//! In-memory object directory
//!
//! Maps labels to handles for the element-resident objects. Handles are
//! random and ephemeral: they are regenerated whenever the backing resource
//! is rewritten, and only objects whose backing resource actually exists
//! carry one. The table is enumerated once at module initialization by
//! probing the element.

use rand::Rng;
use tracing::debug;

use hexlink_apdu::{ApduChannel, SecureElementTransport};

use crate::constants::{CERT_HEADER_LEN, MAX_LABEL_LENGTH, fid};
use crate::error::{Error, Result};
use crate::file_access::{FileAccessEngine, certificate_total_length};
use crate::key_ops::KeyOperationEngine;
use crate::labels;
use crate::types::{Handle, ObjectClass, ObjectTemplate};

/// One entry of the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenObject {
    /// Live handle, absent while the backing resource is empty
    pub handle: Option<Handle>,
    /// Stable lookup key
    pub label: String,
    /// Object class
    pub class: ObjectClass,
    /// True if the object persists on the element across sessions
    pub token: bool,
    /// Key can sign
    pub sign: bool,
    /// Key can verify
    pub verify: bool,
    /// Key can derive
    pub derive: bool,
}

/// Directory of element-resident objects
#[derive(Debug, Default)]
pub struct ObjectDirectory {
    objects: Vec<TokenObject>,
}

impl ObjectDirectory {
    /// Create an empty directory
    pub const fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    /// All entries, in enumeration order
    pub fn objects(&self) -> &[TokenObject] {
        &self.objects
    }

    /// Enumerate the element's resources and (re)build the table.
    ///
    /// Each well-known secret key is probed for presence; the certificate
    /// length is learned from its four-byte header before the content is ever
    /// read; the data object's length comes from the selection option. An
    /// entry is created for every well-known label, but only present
    /// resources get a handle.
    pub fn load_token_objects<T: SecureElementTransport>(
        &mut self,
        channel: &mut ApduChannel<T>,
    ) -> Result<()> {
        self.objects.clear();

        for label in labels::WELL_KNOWN_KEYS {
            let slot = labels::key_slot(label).ok_or(Error::FunctionFailed)?;
            let present = KeyOperationEngine::new(&mut *channel).secret_key_status(slot)?;
            let handle = if present { Some(self.fresh_handle()) } else { None };
            self.objects.push(TokenObject {
                handle,
                label: label.to_string(),
                class: ObjectClass::SecretKey,
                token: true,
                sign: true,
                verify: false,
                derive: true,
            });
        }

        let certificate_len = probe_certificate(channel)?;
        let handle = (certificate_len > CERT_HEADER_LEN).then(|| self.fresh_handle());
        self.objects.push(TokenObject {
            handle,
            label: labels::MAIN_CERTIFICATE.to_string(),
            class: ObjectClass::Certificate,
            token: true,
            sign: false,
            verify: false,
            derive: false,
        });

        let data_len = probe_data_object(channel)?;
        let handle = (data_len > 0).then(|| self.fresh_handle());
        self.objects.push(TokenObject {
            handle,
            label: labels::DATA_OBJECT.to_string(),
            class: ObjectClass::Data,
            token: true,
            sign: false,
            verify: false,
            derive: false,
        });

        debug!(
            total = self.objects.len(),
            live = self.objects.iter().filter(|o| o.handle.is_some()).count(),
            "Enumerated token objects"
        );
        Ok(())
    }

    /// Look up an object by label
    pub fn find_by_label(&self, label: &str) -> Option<&TokenObject> {
        self.objects.iter().find(|object| object.label == label)
    }

    /// Look up a live object by handle
    pub fn find_by_handle(&self, handle: Handle) -> Option<&TokenObject> {
        self.objects
            .iter()
            .find(|object| object.handle == Some(handle))
    }

    /// Assign a fresh handle to the object with the given label, applying the
    /// template's class and capability flags.
    ///
    /// Called after a create/derive operation's backing write succeeded; the
    /// entry is created if the label is not yet listed.
    pub fn update_handle(&mut self, label: &str, template: &ObjectTemplate) -> Result<Handle> {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(Error::AttributeValueInvalid);
        }

        let handle = self.fresh_handle();
        match self.objects.iter_mut().find(|object| object.label == label) {
            Some(object) => {
                object.handle = Some(handle);
                object.class = template.class;
                object.token = template.token;
                object.sign = template.sign;
                object.verify = template.verify;
                object.derive = template.derive;
            }
            None => self.objects.push(TokenObject {
                handle: Some(handle),
                label: label.to_string(),
                class: template.class,
                token: template.token,
                sign: template.sign,
                verify: template.verify,
                derive: template.derive,
            }),
        }

        Ok(handle)
    }

    /// Drop every session-scoped (non-token) entry; called on session close
    pub fn remove_session_objects(&mut self) {
        self.objects.retain(|object| object.token);
    }

    /// Random non-zero handle, unique among the live entries
    fn fresh_handle(&self) -> Handle {
        let mut rng = rand::rng();
        loop {
            let value = rng.random::<u32>();
            let Some(handle) = Handle::new(value) else {
                continue;
            };
            if self.find_by_handle(handle).is_none() {
                return handle;
            }
        }
    }
}

/// Total certificate length, or 0 when the file is absent or unreadable
fn probe_certificate<T: SecureElementTransport>(channel: &mut ApduChannel<T>) -> Result<usize> {
    let mut file = FileAccessEngine::new(channel);
    match file.select_by_fid(fid::CERTIFICATE) {
        Ok(_) => {}
        Err(Error::Card(_)) => return Ok(0),
        Err(err) => return Err(err),
    }
    match file.read_binary(0, CERT_HEADER_LEN) {
        Ok(header) => Ok(certificate_total_length(&header)),
        Err(Error::Card(_)) => Ok(0),
        Err(err) => Err(err),
    }
}

/// Data-object length from the selection option, or 0 when absent
fn probe_data_object<T: SecureElementTransport>(channel: &mut ApduChannel<T>) -> Result<usize> {
    let mut file = FileAccessEngine::new(channel);
    match file.select_by_fid(fid::DATA_OBJECT) {
        Ok(option) => Ok(option.unwrap_or(0) as usize),
        Err(Error::Card(_)) => Ok(0),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ins;
    use crate::testutil::{ScriptedTransport, ok_wire, sw_wire};
    use hex_literal::hex;
    use std::collections::HashSet;

    /// Element with PSK, MSK and PMK_4 present, a 16-byte certificate and a
    /// 64-byte data object.
    fn populated_element(
        cmd: &hexlink_apdu::Command,
    ) -> bytes::Bytes {
        match cmd.ins {
            ins::KEY_STATUS => match cmd.p1 {
                0x00 | 0x01 => ok_wire(&[]),
                p1 if p1 == b'4' => ok_wire(&[]),
                _ => sw_wire(0x6A88),
            },
            ins::SELECT => {
                let fid = cmd.data.as_deref().unwrap();
                if fid == hex!("0102") {
                    ok_wire(&hex!("85020040"))
                } else {
                    ok_wire(&[])
                }
            }
            // Certificate header: total length 0x000C + 4
            ins::READ_BINARY => ok_wire(&hex!("3082000C")),
            _ => sw_wire(0x6D00),
        }
    }

    #[test]
    fn test_load_token_objects_assigns_handles_to_present_only() {
        let mut channel = ApduChannel::new(ScriptedTransport::new(populated_element));
        let mut directory = ObjectDirectory::new();
        directory.load_token_objects(&mut channel).unwrap();

        assert!(directory.find_by_label("PSK").unwrap().handle.is_some());
        assert!(directory.find_by_label("MSK").unwrap().handle.is_some());
        assert!(directory.find_by_label("PMK_4").unwrap().handle.is_some());
        assert!(directory.find_by_label("PMK_1").unwrap().handle.is_none());
        assert!(directory.find_by_label("EDK").unwrap().handle.is_none());
        assert!(
            directory
                .find_by_label(labels::MAIN_CERTIFICATE)
                .unwrap()
                .handle
                .is_some()
        );
        assert!(
            directory
                .find_by_label(labels::DATA_OBJECT)
                .unwrap()
                .handle
                .is_some()
        );
    }

    #[test]
    fn test_load_token_objects_labels_unique() {
        let mut channel = ApduChannel::new(ScriptedTransport::new(populated_element));
        let mut directory = ObjectDirectory::new();
        directory.load_token_objects(&mut channel).unwrap();

        let labels: HashSet<&str> = directory
            .objects()
            .iter()
            .map(|object| object.label.as_str())
            .collect();
        assert_eq!(labels.len(), directory.objects().len());
    }

    #[test]
    fn test_load_token_objects_empty_certificate_has_no_handle() {
        let transport = ScriptedTransport::new(|cmd| match cmd.ins {
            ins::KEY_STATUS => sw_wire(0x6A88),
            ins::SELECT => ok_wire(&[]),
            // Zero content length
            ins::READ_BINARY => ok_wire(&hex!("30820000")),
            _ => sw_wire(0x6D00),
        });
        let mut channel = ApduChannel::new(transport);
        let mut directory = ObjectDirectory::new();
        directory.load_token_objects(&mut channel).unwrap();

        assert!(
            directory
                .find_by_label(labels::MAIN_CERTIFICATE)
                .unwrap()
                .handle
                .is_none()
        );
        assert!(
            directory
                .find_by_label(labels::DATA_OBJECT)
                .unwrap()
                .handle
                .is_none()
        );
    }

    #[test]
    fn test_update_handle_regenerates() {
        let mut channel = ApduChannel::new(ScriptedTransport::new(populated_element));
        let mut directory = ObjectDirectory::new();
        directory.load_token_objects(&mut channel).unwrap();

        let before = directory.find_by_label("PSK").unwrap().handle.unwrap();
        let template = ObjectTemplate::new(ObjectClass::SecretKey)
            .with_token(true)
            .with_sign(true)
            .with_derive(true);
        let after = directory.update_handle("PSK", &template).unwrap();
        assert_ne!(before, after);
        assert_eq!(directory.find_by_label("PSK").unwrap().handle, Some(after));
        assert!(directory.find_by_handle(before).is_none());
    }

    #[test]
    fn test_update_handle_rejects_oversize_label() {
        let mut directory = ObjectDirectory::new();
        let template = ObjectTemplate::new(ObjectClass::Data);
        let err = directory
            .update_handle("a label well beyond twenty bytes", &template)
            .unwrap_err();
        assert_eq!(err, Error::AttributeValueInvalid);
    }

    #[test]
    fn test_remove_session_objects_keeps_token_entries() {
        let mut directory = ObjectDirectory::new();
        let token = ObjectTemplate::new(ObjectClass::Certificate).with_token(true);
        let session = ObjectTemplate::new(ObjectClass::SecretKey).with_token(false);
        directory.update_handle("kept", &token).unwrap();
        directory.update_handle("dropped", &session).unwrap();

        directory.remove_session_objects();
        assert!(directory.find_by_label("kept").is_some());
        assert!(directory.find_by_label("dropped").is_none());
    }
}
