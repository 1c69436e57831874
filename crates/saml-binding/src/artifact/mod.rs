//! SAML 2.0 artifacts.
//!
//! An artifact is a short reference sent through the browser in place of a
//! full message. The message itself is stored under the artifact's Base64
//! form until the peer resolves it over the back channel.
//!
//! - [`SamlArtifact`] - artifact value and its fields
//! - [`ArtifactBuilder`] - mints artifacts and stores the referenced message
//! - [`ArtifactStore`] - artifact → message records

mod builder;
mod store;

pub use builder::*;
pub use store::*;

use std::fmt;

use crate::encoding::{base64_decode, base64_encode};
use crate::error::{BindingError, BindingResult};

/// Two-byte artifact type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactTypeCode([u8; 2]);

impl ArtifactTypeCode {
    /// Type 0x0004, the only artifact type defined by SAML 2.0.
    pub const TYPE_0004: Self = Self([0x00, 0x04]);

    /// Creates a type code from its numeric value.
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        Self(code.to_be_bytes())
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    /// Returns the wire bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for ArtifactTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.as_u16())
    }
}

/// Length of a type 0x0004 artifact in bytes.
pub const TYPE_0004_LENGTH: usize = 44;

/// Length of the source ID and message handle of a type 0x0004 artifact.
pub const TYPE_0004_FIELD_LENGTH: usize = 20;

/// A SAML 2.0 artifact.
///
/// Every artifact starts with a 2-byte type code and a 2-byte endpoint
/// index. Type 0x0004 adds a 20-byte source ID (SHA-1 of the issuer's
/// entity ID) and a 20-byte random message handle.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SamlArtifact {
    bytes: Vec<u8>,
}

impl SamlArtifact {
    /// Builds a type 0x0004 artifact.
    #[must_use]
    pub fn type_0004(
        endpoint_index: u16,
        source_id: [u8; TYPE_0004_FIELD_LENGTH],
        message_handle: [u8; TYPE_0004_FIELD_LENGTH],
    ) -> Self {
        let mut bytes = Vec::with_capacity(TYPE_0004_LENGTH);
        bytes.extend_from_slice(&ArtifactTypeCode::TYPE_0004.bytes());
        bytes.extend_from_slice(&endpoint_index.to_be_bytes());
        bytes.extend_from_slice(&source_id);
        bytes.extend_from_slice(&message_handle);
        Self { bytes }
    }

    /// Wraps raw artifact bytes, checking the common header and, for type
    /// 0x0004, the total length.
    pub fn from_bytes(bytes: Vec<u8>) -> BindingResult<Self> {
        if bytes.len() < 4 {
            return Err(BindingError::InvalidArtifact(format!(
                "artifact is {} bytes, expected at least 4",
                bytes.len()
            )));
        }
        let artifact = Self { bytes };
        if artifact.type_code() == ArtifactTypeCode::TYPE_0004
            && artifact.bytes.len() != TYPE_0004_LENGTH
        {
            return Err(BindingError::InvalidArtifact(format!(
                "type 0x0004 artifact is {} bytes, expected {TYPE_0004_LENGTH}",
                artifact.bytes.len()
            )));
        }
        Ok(artifact)
    }

    /// Parses the Base64 form sent in `SAMLart`.
    pub fn parse_base64(encoded: &str) -> BindingResult<Self> {
        let bytes = base64_decode(encoded)
            .map_err(|e| BindingError::InvalidArtifact(format!("not valid Base64: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Returns the type code.
    #[must_use]
    pub fn type_code(&self) -> ArtifactTypeCode {
        ArtifactTypeCode([self.bytes[0], self.bytes[1]])
    }

    /// Returns the endpoint index.
    #[must_use]
    pub fn endpoint_index(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }

    /// Returns the source ID of a type 0x0004 artifact.
    #[must_use]
    pub fn source_id(&self) -> Option<&[u8]> {
        self.type_0004_field(4)
    }

    /// Returns the message handle of a type 0x0004 artifact.
    #[must_use]
    pub fn message_handle(&self) -> Option<&[u8]> {
        self.type_0004_field(4 + TYPE_0004_FIELD_LENGTH)
    }

    fn type_0004_field(&self, offset: usize) -> Option<&[u8]> {
        if self.type_code() != ArtifactTypeCode::TYPE_0004 {
            return None;
        }
        self.bytes.get(offset..offset + TYPE_0004_FIELD_LENGTH)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the Base64 form.
    #[must_use]
    pub fn base64_encode(&self) -> String {
        base64_encode(&self.bytes)
    }
}

impl fmt::Debug for SamlArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamlArtifact")
            .field("type_code", &self.type_code())
            .field("endpoint_index", &self.endpoint_index())
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl fmt::Display for SamlArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base64_encode())
    }
}
