//! PKCS#11-style cryptographic token middleware for a secure element
//!
//! The element is reached through an ASCII-hex APDU link (see
//! [`hexlink_apdu`]). This crate layers the token model on top of it:
//!
//! - [`FileAccessEngine`]: SELECT, chunked READ/UPDATE BINARY, READ RECORD
//! - [`KeyOperationEngine`]: key-pair generation, sign/verify, secret
//!   derivation, challenge generation
//! - [`ObjectDirectory`]: label → handle mapping for element-resident
//!   objects, enumerated at startup
//! - [`Token`]: the single-slot, single-session command surface and its
//!   state machine
//!
//! Initialization is not thread-safe and must complete before any other
//! call; the caller owns the one [`Token`] value and the `&mut self` methods
//! make exclusive use compiler-enforced.
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod constants;
mod directory;
mod error;
mod file_access;
mod key_ops;
pub mod labels;
mod session;
#[cfg(test)]
pub(crate) mod testutil;
mod types;

pub use directory::{ObjectDirectory, TokenObject};
pub use error::{Error, Result, VENDOR_ERROR_BASE};
pub use file_access::{FileAccessEngine, certificate_total_length};
pub use key_ops::KeyOperationEngine;
pub use session::Token;
pub use types::{
    AttributeType, AttributeValue, Handle, HkdfParams, MECHANISMS, MODULE_INFO, Mechanism,
    MechanismInfo, ModuleInfo, ObjectClass, ObjectTemplate, SLOT_INFO, SessionFlags, SlotInfo,
    TOKEN_INFO, TokenInfo,
};

pub use hexlink_apdu::{SecureElementTransport, TransportError};
