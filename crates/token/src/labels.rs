//! Well-known object labels and routing-byte mapping
//!
//! Object labels are a persisted-state contract shared with the element's
//! provisioning tooling; they must match exactly. Derived-key labels carry
//! their key-slot routing byte as the character after the `PMK_` prefix, and
//! that character travels verbatim as a P1/P2 byte on the wire.

use crate::error::{Error, Result};

/// Primary pre-shared key
pub const PSK: &str = "PSK";

/// Master session key, the only key derivable directly from `PSK`
pub const MSK: &str = "MSK";

/// Extended derivation key
pub const EDK: &str = "EDK";

/// Pairwise master keys, derivable from `MSK`
pub const PMK_LABELS: [&str; 7] = [
    "PMK_1", "PMK_2", "PMK_3", "PMK_4", "PMK_5", "PMK_6", "PMK_7",
];

/// Identity certificate object
pub const MAIN_CERTIFICATE: &str = "Identity Certificate";

/// URL data object
pub const DATA_OBJECT: &str = "MUD file URL";

/// Secret-key labels enumerated at startup, in probe order
pub const WELL_KNOWN_KEYS: [&str; 10] = [
    "PSK", "MSK", "PMK_1", "PMK_2", "PMK_3", "PMK_4", "PMK_5", "PMK_6", "PMK_7", "EDK",
];

const DERIVED_PREFIX: &str = "PMK_";
const SUFFIX_INDEX: usize = 4;

/// Routing byte for a derived-key label.
///
/// Only the `PMK_<n>` labels carry one: the ASCII character at index 4 is the
/// raw P1/P2 byte (`"PMK_4"` routes as `b'4'`). Shorter labels or labels with
/// another prefix are rejected rather than indexed.
pub fn routing_byte(label: &str) -> Result<u8> {
    if label.len() != SUFFIX_INDEX + 1 || !label.starts_with(DERIVED_PREFIX) {
        return Err(Error::AttributeValueInvalid);
    }
    let suffix = label.as_bytes()[SUFFIX_INDEX];
    if !suffix.is_ascii_digit() {
        return Err(Error::AttributeValueInvalid);
    }
    Ok(suffix)
}

/// P1/P2 routing for an HKDF derivation step.
///
/// `PSK` base derives with both bytes zero; an `MSK` base routes the derived
/// label's suffix through P2; any other base contributes its own suffix as
/// P1. The derivation tree itself (what may derive what) is enforced at the
/// session layer.
pub fn hkdf_routing(base_label: &str, derived_label: &str) -> Result<(u8, u8)> {
    match base_label {
        PSK => Ok((0x00, 0x00)),
        MSK => Ok((0x00, routing_byte(derived_label)?)),
        _ => Ok((routing_byte(base_label)?, routing_byte(derived_label)?)),
    }
}

/// Key-slot byte used by the presence probe and PUT KEY.
///
/// The fixed-label keys occupy fixed slots; derived keys reuse their routing
/// byte. Returns `None` for labels that do not name a secret key.
pub fn key_slot(label: &str) -> Option<u8> {
    match label {
        PSK => Some(0x00),
        MSK => Some(0x01),
        EDK => Some(0x02),
        _ => routing_byte(label).ok(),
    }
}
