//! Error taxonomy for the Crypt4GH container processor.
//!
//! The taxonomy is shallow by design: every fallible operation in this
//! crate raises one of a handful of kinds, each carrying a short
//! machine-readable `code()` alongside a human-readable message. AEAD
//! authentication failure is never surfaced through these types at the
//! packet/block level — "not readable by this key" is represented as
//! `None`, not `Err`. Only structural problems raise.

use std::fmt;

/// Any problem acquiring, decoding, or using a key: bad envelope, missing
/// passphrase, failed KDF, agent protocol violation, HTTP fault, or a
/// private-key operation attempted on a public-only key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyError(pub(crate) String);

impl KeyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn code(&self) -> &'static str {
        "KEY"
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.0)
    }
}

impl std::error::Error for KeyError {}

/// Container magic, version, or packet-count failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderError(pub(crate) String);

impl HeaderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn code(&self) -> &'static str {
        "HEADER"
    }
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.0)
    }
}

impl std::error::Error for HeaderError {}

impl From<HeaderPacketError> for HeaderError {
    fn from(e: HeaderPacketError) -> Self {
        HeaderError::new(e.0)
    }
}

impl From<KeyError> for HeaderError {
    fn from(e: KeyError) -> Self {
        HeaderError::new(e.0)
    }
}

/// An individual header packet was malformed, or its fixed-layout fields
/// could not be parsed. A sub-kind of [`HeaderError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPacketError(pub(crate) String);

impl HeaderPacketError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn code(&self) -> &'static str {
        "HEADERPACKET"
    }
}

impl fmt::Display for HeaderPacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.0)
    }
}

impl std::error::Error for HeaderPacketError {}

/// A Data Encryption Key was structurally invalid (wrong length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DekError(pub(crate) String);

impl DekError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn code(&self) -> &'static str {
        "DEK"
    }
}

impl fmt::Display for DekError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.0)
    }
}

impl std::error::Error for DekError {}

/// A single-use stream (e.g. [`crate::container::Container::data_blocks`])
/// was traversed a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedError;

impl ProcessedError {
    pub fn code(&self) -> &'static str {
        "PROCESSED"
    }
}

impl fmt::Display for ProcessedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] stream already processed once", self.code())
    }
}

impl std::error::Error for ProcessedError {}
