//! # Error Definitions
//!
//! Failures of the value codec and of frame parsing.
//!
//! Decoding a *value* never fails (malformed content degrades to `Value::Nil`);
//! these errors come from encoding and from the frame envelope around values.

use flexpack::Error as PackError;

/// Operational failures within the codec and framing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The underlying Flexpack encoder or decoder failed.
    Serialization(PackError),
    /// A map held the same key twice.
    DuplicateKey(String),
    /// An unknown top-level frame type was encountered.
    UnknownVariant(String),
    /// The internal structure of a frame was malformed (e.g., missing sequence header).
    ProtocolViolation(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::DuplicateKey(k) => write!(f, "Duplicate map key: {:?}", k),
            Self::UnknownVariant(v) => write!(f, "Unknown variant: {}", v),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self { Self::Serialization(e) }
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
