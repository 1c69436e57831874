//! Per-request outbound message context.

use crate::artifact::ArtifactTypeCode;
use crate::error::{BindingError, BindingResult};

use super::constants::SamlBinding;
use super::message::{MessageKind, SamlMessage};

/// A peer endpoint taken from metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Binding the endpoint accepts.
    pub binding: SamlBinding,
    /// URL for requests (and responses when no response location is set).
    pub location: String,
    /// Separate URL for status responses.
    pub response_location: Option<String>,
    /// Index of the endpoint in the peer's metadata.
    pub index: Option<u16>,
}

impl Endpoint {
    /// Creates an endpoint with a single location.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>) -> Self {
        Self {
            binding,
            location: location.into(),
            response_location: None,
            index: None,
        }
    }

    /// Sets the response location.
    #[must_use]
    pub fn with_response_location(mut self, location: impl Into<String>) -> Self {
        self.response_location = Some(location.into());
        self
    }

    /// Sets the metadata index.
    #[must_use]
    pub const fn with_index(mut self, index: u16) -> Self {
        self.index = Some(index);
        self
    }
}

/// Everything an encoder needs to deliver one message.
///
/// Created per request and consumed by a single encode call.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessageContext {
    /// The message to send.
    pub message: Option<SamlMessage>,

    /// The peer endpoint the message is delivered to.
    pub peer_endpoint: Option<Endpoint>,

    /// Opaque relay state echoed back by the peer.
    pub relay_state: Option<String>,

    /// Artifact type to use; set to the resolved type by artifact encoding.
    pub artifact_type: Option<ArtifactTypeCode>,

    /// Entity ID of the local party (issuer).
    pub local_entity_id: Option<String>,

    /// Entity ID of the peer (relying party).
    pub peer_entity_id: Option<String>,
}

impl OutboundMessageContext {
    /// Creates a context for `message`.
    #[must_use]
    pub fn new(message: SamlMessage) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    /// Sets the peer endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.peer_endpoint = Some(endpoint);
        self
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the artifact type.
    #[must_use]
    pub const fn with_artifact_type(mut self, artifact_type: ArtifactTypeCode) -> Self {
        self.artifact_type = Some(artifact_type);
        self
    }

    /// Sets the local and peer entity IDs.
    #[must_use]
    pub fn with_entities(
        mut self,
        local_entity_id: impl Into<String>,
        peer_entity_id: impl Into<String>,
    ) -> Self {
        self.local_entity_id = Some(local_entity_id.into());
        self.peer_entity_id = Some(peer_entity_id.into());
        self
    }

    /// Returns the relay state if it is present and non-empty.
    #[must_use]
    pub fn effective_relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref().filter(|rs| !rs.is_empty())
    }

    /// Returns the outbound message.
    pub fn require_message(&self) -> BindingResult<&SamlMessage> {
        self.message.as_ref().ok_or(BindingError::MissingMessage)
    }

    /// Determines the URL the message is delivered to.
    ///
    /// Status responses go to the endpoint's response location when it has
    /// one; everything else goes to its location.
    pub fn endpoint_url(&self) -> BindingResult<&str> {
        let endpoint = self.peer_endpoint.as_ref().ok_or_else(|| {
            BindingError::MissingEndpoint("message context has no peer endpoint".to_string())
        })?;

        let is_response = self
            .message
            .as_ref()
            .is_some_and(|m| m.kind == MessageKind::StatusResponse);

        let url = match (&endpoint.response_location, is_response) {
            (Some(location), true) if !location.is_empty() => location.as_str(),
            _ => endpoint.location.as_str(),
        };

        if url.is_empty() {
            return Err(BindingError::MissingEndpoint(
                "peer endpoint has an empty location".to_string(),
            ));
        }
        Ok(url)
    }
}
