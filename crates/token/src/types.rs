//! Object, mechanism and info types for the token surface

use std::fmt;

use bytes::Bytes;

use crate::constants::SLOT_ID;

/// Opaque object handle.
///
/// Handles are random, non-zero while an object is live, and regenerated
/// whenever the backing resource is rewritten. Absence is modelled as
/// `Option<Handle>`, not as a zero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Wrap a raw non-zero handle value
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Raw handle value
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Object classes stored on or addressed through the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    /// Symmetric secret key
    SecretKey,
    /// X.509 certificate
    Certificate,
    /// Opaque data object
    Data,
    /// Asymmetric private key
    PrivateKey,
    /// Asymmetric public key
    PublicKey,
}

/// Attribute template for create/derive operations
#[derive(Debug, Clone)]
pub struct ObjectTemplate {
    /// Object class
    pub class: ObjectClass,
    /// Object label
    pub label: Option<String>,
    /// Object value
    pub value: Option<Bytes>,
    /// True if the object persists on the element across sessions
    pub token: bool,
    /// Key can sign
    pub sign: bool,
    /// Key can verify
    pub verify: bool,
    /// Key can derive
    pub derive: bool,
}

impl ObjectTemplate {
    /// Create an empty template for the given class
    pub const fn new(class: ObjectClass) -> Self {
        Self {
            class,
            label: None,
            value: None,
            token: false,
            sign: false,
            verify: false,
            derive: false,
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the value
    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Mark the object token-resident (persists across sessions)
    pub const fn with_token(mut self, token: bool) -> Self {
        self.token = token;
        self
    }

    /// Set the sign capability
    pub const fn with_sign(mut self, sign: bool) -> Self {
        self.sign = sign;
        self
    }

    /// Set the verify capability
    pub const fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Set the derive capability
    pub const fn with_derive(mut self, derive: bool) -> Self {
        self.derive = derive;
        self
    }
}

/// Mechanisms the token reports or accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// EC key-pair generation
    EcKeyPairGen,
    /// ECDSA signing
    Ecdsa,
    /// ECDH1 secret derivation
    Ecdh1Derive,
    /// ECDH1 cofactor secret derivation
    Ecdh1CofactorDerive,
    /// HKDF secret derivation
    HkdfDerive,
    /// AES MAC (default sign mechanism)
    AesMac,
    /// AES CBC (default encrypt/decrypt mechanism)
    AesCbc,
}

/// The mechanisms advertised through the mechanism list
pub const MECHANISMS: [Mechanism; 5] = [
    Mechanism::EcKeyPairGen,
    Mechanism::Ecdsa,
    Mechanism::Ecdh1Derive,
    Mechanism::HkdfDerive,
    Mechanism::Ecdh1CofactorDerive,
];

/// Parameters for an HKDF derivation step
#[derive(Debug, Clone, Copy)]
pub struct HkdfParams<'a> {
    /// Salt input
    pub salt: &'a [u8],
    /// Info / context input
    pub info: &'a [u8],
}

/// Session open flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionFlags(u32);

impl SessionFlags {
    /// Mandatory for every session on this token
    pub const SERIAL_SESSION: Self = Self(0x0000_0004);
    /// Read-write session
    pub const RW_SESSION: Self = Self(0x0000_0002);

    /// True if all bits of `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw flag bits
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for SessionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Attribute selectors for `get_attribute_value`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// Object class
    Class,
    /// Object label
    Label,
    /// Token residency
    Token,
    /// Object value (certificate or data objects only)
    Value,
}

/// Attribute values returned by `get_attribute_value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Object class
    Class(ObjectClass),
    /// Object label
    Label(String),
    /// Token residency
    Token(bool),
    /// Object value
    Value(Bytes),
}

/// Module-level information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Manufacturer of this middleware
    pub manufacturer: &'static str,
    /// Module description
    pub description: &'static str,
    /// Module version (major, minor)
    pub version: (u8, u8),
}

/// Slot information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// Slot identifier
    pub id: u64,
    /// Slot description
    pub description: &'static str,
    /// True if the token is a hardware device
    pub hardware: bool,
    /// True if the token can be removed
    pub removable: bool,
}

/// Token information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// Token label
    pub label: &'static str,
    /// Token manufacturer
    pub manufacturer: &'static str,
    /// Token model
    pub model: &'static str,
    /// Serial number
    pub serial_number: &'static str,
}

/// Per-mechanism information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MechanismInfo {
    /// Minimum key size in bits
    pub min_key_bits: u32,
    /// Maximum key size in bits
    pub max_key_bits: u32,
    /// Mechanism can generate key pairs
    pub generate: bool,
    /// Mechanism can sign
    pub sign: bool,
    /// Mechanism can derive
    pub derive: bool,
}

impl MechanismInfo {
    /// Info for one of the advertised mechanisms
    pub const fn for_mechanism(mechanism: Mechanism) -> Option<Self> {
        match mechanism {
            Mechanism::EcKeyPairGen => Some(Self {
                min_key_bits: 256,
                max_key_bits: 256,
                generate: true,
                sign: false,
                derive: false,
            }),
            Mechanism::Ecdsa => Some(Self {
                min_key_bits: 256,
                max_key_bits: 256,
                generate: false,
                sign: true,
                derive: false,
            }),
            Mechanism::Ecdh1Derive | Mechanism::Ecdh1CofactorDerive => Some(Self {
                min_key_bits: 256,
                max_key_bits: 256,
                generate: false,
                sign: false,
                derive: true,
            }),
            Mechanism::HkdfDerive => Some(Self {
                min_key_bits: 256,
                max_key_bits: 256,
                generate: false,
                sign: false,
                derive: true,
            }),
            Mechanism::AesMac | Mechanism::AesCbc => None,
        }
    }
}

/// Static module information for this middleware
pub const MODULE_INFO: ModuleInfo = ModuleInfo {
    manufacturer: "Hexlink",
    description: "Secure element token middleware",
    version: (0, 1),
};

/// Static information for the single slot
pub const SLOT_INFO: SlotInfo = SlotInfo {
    id: SLOT_ID,
    description: "Secure element (ASCII-hex APDU link)",
    hardware: true,
    removable: false,
};

/// Static information for the single token
pub const TOKEN_INFO: TokenInfo = TokenInfo {
    label: "Secure element token",
    manufacturer: "Hexlink",
    model: "SE-A1",
    serial_number: "0000000000000001",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_rejects_zero() {
        assert!(Handle::new(0).is_none());
        assert_eq!(Handle::new(0x1234).unwrap().value(), 0x1234);
    }

    #[test]
    fn test_session_flags() {
        let flags = SessionFlags::SERIAL_SESSION | SessionFlags::RW_SESSION;
        assert!(flags.contains(SessionFlags::SERIAL_SESSION));
        assert!(flags.contains(SessionFlags::RW_SESSION));
        assert!(!SessionFlags::RW_SESSION.contains(SessionFlags::SERIAL_SESSION));
    }

    #[test]
    fn test_mechanism_info_only_for_advertised() {
        for mechanism in MECHANISMS {
            assert!(MechanismInfo::for_mechanism(mechanism).is_some());
        }
        assert!(MechanismInfo::for_mechanism(Mechanism::AesMac).is_none());
    }
}
