//! Binding error types.
//!
//! Provides the error taxonomy for message encoding, artifact construction,
//! inbound decoding and security-policy evaluation.

use thiserror::Error;

use crate::template::RenderError;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// SAML binding errors.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The message context or transport is not supported by the binding.
    #[error("unsupported context: {0}")]
    UnsupportedContext(String),

    /// The outbound message is neither a request nor a status response.
    #[error("invalid message type: {0}")]
    InvalidMessageType(String),

    /// The message context carries no outbound message.
    #[error("no outbound SAML message contained in message context")]
    MissingMessage,

    /// No endpoint URL could be determined for the relying party.
    #[error("no relying party endpoint: {0}")]
    MissingEndpoint(String),

    /// An artifact could not be built for the outbound message.
    #[error("artifact construction failed: {0}")]
    ArtifactConstruction(String),

    /// The outbound message could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The outbound message could not be signed.
    #[error("signature creation failed: {0}")]
    Signing(String),

    /// Rendering or writing the response body failed.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the failed step.
        message: String,
        /// The renderer failure that caused it.
        #[source]
        source: RenderError,
    },

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Malformed SAML artifact.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Malformed inbound request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Artifact store operation failed.
    #[error("artifact store error: {0}")]
    Storage(String),

    /// A security policy rule rejected the inbound message.
    #[error("security policy violation: {0}")]
    PolicyViolation(String),

    /// Invalid binding configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BindingError {
    /// Wraps a renderer failure as an encoding error.
    pub fn encoding(message: impl Into<String>, source: RenderError) -> Self {
        Self::Encoding {
            message: message.into(),
            source,
        }
    }

    /// Returns true if the error was caused by a collaborator rather than
    /// by the caller's input.
    #[must_use]
    pub const fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::ArtifactConstruction(_)
                | Self::Serialization(_)
                | Self::Signing(_)
                | Self::Encoding { .. }
                | Self::Storage(_)
        )
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::Base64Decode(_)
            | Self::InvalidArtifact(_)
            | Self::XmlParse(_) => 400,
            Self::PolicyViolation(_) => 403,
            _ => 500,
        }
    }
}

impl From<quick_xml::Error> for BindingError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for BindingError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn error_http_status() {
        let err = BindingError::InvalidRequest("test".to_string());
        assert_eq!(err.http_status(), 400);

        let err = BindingError::PolicyViolation("test".to_string());
        assert_eq!(err.http_status(), 403);

        let err = BindingError::UnsupportedContext("test".to_string());
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn encoding_error_keeps_cause() {
        let err = BindingError::encoding(
            "Error creating output document",
            RenderError::UnknownTemplate("missing".to_string()),
        );
        assert!(err.is_collaborator_failure());
        let cause = err.source().expect("cause attached");
        assert!(cause.to_string().contains("missing"));
    }
}
