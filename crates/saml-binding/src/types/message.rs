//! Outbound SAML protocol messages.
//!
//! The encoders only need to know whether a message is a request or a
//! status response, where it is going and how to serialize it. Message
//! bodies (assertions, name IDs, conditions) are carried as opaque XML.

use chrono::{DateTime, Utc};

use super::constants::{params, status_codes, SAML_VERSION};

/// Protocol-level kind of a SAML message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A request (`RequestAbstractType`).
    Request,
    /// A status response (`StatusResponseType`).
    StatusResponse,
    /// Any other SAML object, such as a bare assertion.
    Other,
}

impl MessageKind {
    /// Returns the form parameter carrying this kind of message, if any.
    #[must_use]
    pub const fn form_param(&self) -> Option<&'static str> {
        match self {
            Self::Request => Some(params::SAML_REQUEST),
            Self::StatusResponse => Some(params::SAML_RESPONSE),
            Self::Other => None,
        }
    }
}

/// An outbound SAML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamlMessage {
    /// Request, status response or other.
    pub kind: MessageKind,

    /// Local element name, e.g. `AuthnRequest` or `Response`.
    pub element: String,

    /// Unique identifier.
    pub id: String,

    /// Protocol version (always "2.0").
    pub version: String,

    /// Timestamp when the message was issued.
    pub issue_instant: DateTime<Utc>,

    /// Entity ID of the issuer.
    pub issuer: Option<String>,

    /// URL the message is addressed to.
    pub destination: Option<String>,

    /// ID of the request this message answers.
    pub in_response_to: Option<String>,

    /// Top-level status code (status responses only).
    pub status_code: Option<String>,

    /// Additional child elements as serialized XML.
    pub content: Option<String>,

    /// Whether a signer has processed the message.
    pub signed: bool,
}

impl SamlMessage {
    /// Creates a message of the given kind.
    #[must_use]
    pub fn new(kind: MessageKind, element: impl Into<String>) -> Self {
        Self {
            kind,
            element: element.into(),
            id: format!("_id{}", uuid::Uuid::new_v4()),
            version: SAML_VERSION.to_string(),
            issue_instant: Utc::now(),
            issuer: None,
            destination: None,
            in_response_to: None,
            status_code: match kind {
                MessageKind::StatusResponse => Some(status_codes::SUCCESS.to_string()),
                _ => None,
            },
            content: None,
            signed: false,
        }
    }

    /// Creates an `AuthnRequest`.
    #[must_use]
    pub fn authn_request(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::Request, "AuthnRequest").with_issuer(issuer)
    }

    /// Creates a `LogoutRequest`.
    #[must_use]
    pub fn logout_request(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::Request, "LogoutRequest").with_issuer(issuer)
    }

    /// Creates an `ArtifactResolve` request.
    #[must_use]
    pub fn artifact_resolve(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::Request, "ArtifactResolve").with_issuer(issuer)
    }

    /// Creates a successful `Response`.
    #[must_use]
    pub fn response(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::StatusResponse, "Response").with_issuer(issuer)
    }

    /// Creates a successful `LogoutResponse`.
    #[must_use]
    pub fn logout_response(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::StatusResponse, "LogoutResponse").with_issuer(issuer)
    }

    /// Creates a successful `ArtifactResponse`.
    #[must_use]
    pub fn artifact_response(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::StatusResponse, "ArtifactResponse").with_issuer(issuer)
    }

    /// Creates a bare `Assertion`, which no HTTP binding can carry directly.
    #[must_use]
    pub fn assertion(issuer: impl Into<String>) -> Self {
        Self::new(MessageKind::Other, "Assertion").with_issuer(issuer)
    }

    /// Sets the message ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the request ID this message answers.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the top-level status code.
    #[must_use]
    pub fn with_status(mut self, code: impl Into<String>) -> Self {
        self.status_code = Some(code.into());
        self
    }

    /// Sets the child content XML.
    #[must_use]
    pub fn with_content(mut self, xml: impl Into<String>) -> Self {
        self.content = Some(xml.into());
        self
    }

    /// Overwrites the destination URL.
    pub fn set_destination(&mut self, url: impl Into<String>) {
        self.destination = Some(url.into());
    }

    /// Returns true for request messages.
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    /// Returns true for status response messages.
    #[must_use]
    pub fn is_status_response(&self) -> bool {
        self.kind == MessageKind::StatusResponse
    }
}
