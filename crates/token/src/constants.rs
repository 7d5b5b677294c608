//! Constants for the secure-element command set
//!
//! CLA/INS bytes, parameter values, file identifiers and size limits used by
//! the file-access and key-operation engines.

/// Command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// Vendor command class for key operations
    pub const VENDOR: u8 = 0xB0;
}

/// Instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// READ BINARY command
    pub const READ_BINARY: u8 = 0xB0;
    /// READ RECORD command
    pub const READ_RECORD: u8 = 0xB2;
    /// UPDATE BINARY command
    pub const UPDATE_BINARY: u8 = 0xD6;
    /// GENERATE ASYMMETRIC KEY PAIR command
    pub const GENERATE_KEY_PAIR: u8 = 0x46;
    /// PUT KEY command
    pub const PUT_KEY: u8 = 0xD8;
    /// GET CHALLENGE command
    pub const GET_CHALLENGE: u8 = 0x84;
    /// PERFORM SECURITY OPERATION: verify digital signature
    pub const PSO_VERIFY: u8 = 0x2A;
    /// Vendor compute-signature command
    pub const COMPUTE_SIGNATURE: u8 = 0xF3;
    /// Vendor key-status probe
    pub const KEY_STATUS: u8 = 0xF5;
    /// Vendor HKDF secret derivation
    pub const DERIVE_HKDF: u8 = 0x48;
    /// Vendor ECDH secret derivation
    pub const DERIVE_ECDH: u8 = 0x47;
    /// Vendor encipher command.
    ///
    /// TODO: confirm the cipher opcodes against the final applet release.
    pub const ENCIPHER: u8 = 0xF6;
    /// Vendor decipher command. Same provisional status as [`ENCIPHER`].
    pub const DECIPHER: u8 = 0xF7;
}

/// Parameter values for SELECT (P1)
pub mod select_p1 {
    /// Select by file identifier
    pub const BY_FID: u8 = 0x00;
}

/// Parameter values for PSO verify (P1, P2)
pub mod pso {
    /// P1 for verify: no response data expected
    pub const VERIFY_P1: u8 = 0x00;
    /// P2 for verify: digital signature input template
    pub const VERIFY_P2: u8 = 0xA8;
}

/// Data-element tags inside command payloads
pub mod tags {
    /// FCI proprietary information holding the two-byte selection option
    pub const SELECTION_OPTION: u8 = 0x85;
    /// Data to be verified
    pub const DATA_TO_VERIFY: u8 = 0x9A;
    /// Digital signature
    pub const SIGNATURE: u8 = 0x9E;
}

/// Base Security Object identifiers
pub mod bso {
    /// BSO class byte for asymmetric key slots
    pub const CLASS_KEY: u8 = 0x10;
}

/// ECDH derivation framing
pub mod ecdh {
    /// Algorithm selector for ECDH
    pub const ALG: u8 = 0x41;
    /// Curve identifier for P-256
    pub const CURVE_P256: u8 = 0x12;
    /// Constant header preceding the length-prefixed public key
    pub const PREAMBLE: [u8; 2] = [ALG, CURVE_P256];
    /// Fixed prefix bytes of the decoded response, discarded before the secret
    pub const PREFIX_LEN: usize = 4;
    /// Maximum wire length of a derivation response
    pub const MAX_RESPONSE_WIRE: usize = 76;
    /// Maximum decoded payload: `(MAX_RESPONSE_WIRE - 4) / 2`
    pub const MAX_PAYLOAD: usize = (MAX_RESPONSE_WIRE - 4) / 2;
}

/// File identifiers inside the element's file system
pub mod fid {
    /// Master file (root of the file system)
    pub const MASTER: u16 = 0x3F00;
    /// Identity certificate file
    pub const CERTIFICATE: u16 = 0x0101;
    /// Data-object (URL) file
    pub const DATA_OBJECT: u16 = 0x0102;
    /// Public-key file for key-pair generation
    pub const PUBLIC_KEY: u16 = 0x0103;
}

/// Block size for chunked READ BINARY
pub const READ_BINARY_BLOCK_SIZE: usize = 250;

/// Block size for chunked UPDATE BINARY
pub const UPDATE_BINARY_BLOCK_SIZE: usize = 240;

/// Maximum object label length in bytes
pub const MAX_LABEL_LENGTH: usize = 20;

/// Maximum number of random bytes per GET CHALLENGE
pub const MAX_RANDOM_LENGTH: usize = 128;

/// Expected digest length for signing
pub const DIGEST_LENGTH: usize = 32;

/// Exact secret-key length accepted by PUT KEY
pub const SECRET_KEY_LENGTH: usize = 32;

/// Maximum signature length returned by compute-signature
pub const MAX_SIGNATURE_LENGTH: usize = 72;

/// Provisional output cap for encipher (pending final applet release)
pub const MAX_ENCRYPT_OUTPUT: usize = 64;

/// Provisional output cap for decipher (pending final applet release)
pub const MAX_DECRYPT_OUTPUT: usize = 256;

/// Length of the certificate length-header read during enumeration
pub const CERT_HEADER_LEN: usize = 4;

/// The single slot this token reports
pub const SLOT_ID: u64 = 1;
