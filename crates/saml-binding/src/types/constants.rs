//! SAML 2.0 constants and URIs.
//!
//! Namespace URIs, binding URIs and the HTTP parameter names used by the
//! POST and Artifact bindings.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML protocol version written into every message.
pub const SAML_VERSION: &str = "2.0";

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
    /// HTTP Artifact binding.
    HttpArtifact,
    /// SOAP binding.
    Soap,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::HttpPost,
            Self::HttpRedirect,
            Self::HttpArtifact,
            Self::Soap,
        ]
        .into_iter()
        .find(|b| b.uri() == uri)
    }

    /// Returns true if the binding travels through the user agent over HTTP.
    #[must_use]
    pub const fn is_front_channel(&self) -> bool {
        !matches!(self, Self::Soap)
    }
}

// ============================================================================
// HTTP parameter names
// ============================================================================

/// Form and query parameter names defined by the HTTP bindings.
pub mod params {
    /// Base64 request message.
    pub const SAML_REQUEST: &str = "SAMLRequest";

    /// Base64 status response message.
    pub const SAML_RESPONSE: &str = "SAMLResponse";

    /// Base64 artifact.
    pub const SAML_ART: &str = "SAMLart";

    /// Caller-supplied relay state.
    pub const RELAY_STATE: &str = "RelayState";

    /// SimpleSign signature value.
    pub const SIGNATURE: &str = "Signature";

    /// SimpleSign signature algorithm URI.
    pub const SIG_ALG: &str = "SigAlg";
}

/// Template variable names shared by the built-in form templates.
pub mod template_vars {
    /// Escaped form action URL.
    pub const ACTION: &str = "action";

    /// Binding URI.
    pub const BINDING: &str = "binding";

    /// Escaped artifact for the POST artifact form.
    pub const SAML_ART: &str = "SAMLArt";
}

// ============================================================================
// Status Codes
// ============================================================================

/// SAML top-level status codes.
pub mod status_codes {
    /// Request succeeded.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Request could not be performed due to an error on the responder side.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_uri_roundtrip() {
        for binding in [
            SamlBinding::HttpPost,
            SamlBinding::HttpRedirect,
            SamlBinding::HttpArtifact,
            SamlBinding::Soap,
        ] {
            assert_eq!(SamlBinding::from_uri(binding.uri()), Some(binding));
        }
        assert_eq!(SamlBinding::from_uri("urn:unknown"), None);
    }

    #[test]
    fn front_channel_bindings() {
        assert!(SamlBinding::HttpPost.is_front_channel());
        assert!(SamlBinding::HttpArtifact.is_front_channel());
        assert!(!SamlBinding::Soap.is_front_channel());
    }
}
