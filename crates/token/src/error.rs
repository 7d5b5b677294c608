//! Error type for token operations
//!
//! Failures live in two disjoint numeric vendor spaces plus a set of
//! structured kinds. A non-success status word maps to
//! `VENDOR_ERROR_BASE + SW1*256 + SW2`; a transport failure maps to
//! `VENDOR_ERROR_BASE - code` (the link code is always `<= -1`). The two
//! spaces are never merged, and no raw link code escapes the engines
//! untranslated.

use hexlink_apdu::channel::ChannelError;
use hexlink_apdu::{StatusWord, TransportError};

/// Result type for token operations
pub type Result<T> = std::result::Result<T, Error>;

/// Base of the vendor-defined error code space
pub const VENDOR_ERROR_BASE: u32 = 0x8000_0000;

/// Error type for token operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The element answered with a non-success status word
    #[error("card returned error status: {0}")]
    Card(StatusWord),

    /// The link to the element failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A required input was null, empty, or out of range
    #[error("bad arguments")]
    ArgumentsBad,

    /// A mandatory attribute is absent from a template
    #[error("mandatory attribute missing from template")]
    TemplateIncomplete,

    /// An attribute value violates a token rule
    #[error("attribute value invalid")]
    AttributeValueInvalid,

    /// The attribute is sensitive and cannot be read back
    #[error("attribute is sensitive")]
    AttributeSensitive,

    /// The mechanism is not supported for this operation
    #[error("mechanism invalid")]
    MechanismInvalid,

    /// Sign/encrypt/decrypt/find called before its init
    #[error("operation not initialized")]
    OperationNotInitialized,

    /// Init called while an operation of the same kind is outstanding
    #[error("operation already active")]
    OperationActive,

    /// The key handle does not resolve to a live object
    #[error("key handle invalid")]
    KeyHandleInvalid,

    /// The object handle does not resolve to a live object
    #[error("object handle invalid")]
    ObjectHandleInvalid,

    /// The resolved object's class is wrong for the operation
    #[error("key type inconsistent with operation")]
    KeyTypeInconsistent,

    /// The output buffer cannot hold the result
    #[error("buffer too small")]
    BufferTooSmall,

    /// Input data length is outside the accepted range
    #[error("data length out of range")]
    DataLenRange,

    /// The module has not been initialized
    #[error("module not initialized")]
    NotInitialized,

    /// The module is already initialized
    #[error("module already initialized")]
    AlreadyInitialized,

    /// No session is open
    #[error("session closed")]
    SessionClosed,

    /// A session is already open on the single-session token
    #[error("session already exists")]
    SessionExists,

    /// The slot identifier is not the supported slot
    #[error("slot id invalid")]
    SlotIdInvalid,

    /// The mandatory serial-session flag is absent
    #[error("parallel sessions not supported")]
    SessionParallelNotSupported,

    /// The element's response length does not match the command
    #[error("unexpected response length")]
    UnexpectedResponseLength,

    /// Internal conversion or encoding failure
    #[error("function failed")]
    FunctionFailed,
}

impl Error {
    /// Numeric code in the PKCS#11-shaped error space.
    ///
    /// Card statuses and transport failures land in the vendor-defined
    /// range; the structured kinds use their conventional CKR values.
    pub const fn vendor_code(&self) -> u32 {
        match self {
            Self::Card(sw) => VENDOR_ERROR_BASE + sw.to_u16() as u32,
            // code <= -1, so this lands strictly above the base
            Self::Transport(err) => (VENDOR_ERROR_BASE as i64 - err.code as i64) as u32,
            Self::SlotIdInvalid => 0x0000_0003,
            Self::FunctionFailed => 0x0000_0006,
            Self::ArgumentsBad => 0x0000_0007,
            Self::AttributeSensitive => 0x0000_0011,
            Self::AttributeValueInvalid => 0x0000_0013,
            Self::DataLenRange => 0x0000_0021,
            Self::UnexpectedResponseLength => 0x0000_0030,
            Self::KeyHandleInvalid => 0x0000_0060,
            Self::KeyTypeInconsistent => 0x0000_0063,
            Self::MechanismInvalid => 0x0000_0070,
            Self::ObjectHandleInvalid => 0x0000_0082,
            Self::OperationActive => 0x0000_0090,
            Self::OperationNotInitialized => 0x0000_0091,
            Self::SessionClosed => 0x0000_00B0,
            Self::SessionParallelNotSupported => 0x0000_00B4,
            Self::SessionExists => 0x0000_00B6,
            Self::TemplateIncomplete => 0x0000_00D0,
            Self::BufferTooSmall => 0x0000_0150,
            Self::NotInitialized => 0x0000_0190,
            Self::AlreadyInitialized => 0x0000_0191,
        }
    }
}

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Transport(transport) => Self::Transport(transport),
            ChannelError::ShortResponse { .. } => Self::UnexpectedResponseLength,
            ChannelError::Response(_) => Self::FunctionFailed,
        }
    }
}

impl From<StatusWord> for Error {
    fn from(status: StatusWord) -> Self {
        Self::Card(status)
    }
}
