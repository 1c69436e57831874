//! SAML bindings.
//!
//! This module implements the front-channel SAML 2.0 bindings:
//!
//! - **HTTP-POST Binding** - the message is Base64-encoded into an
//!   auto-submitting HTML form
//! - **HTTP-Artifact Binding** - the message is stored behind an artifact,
//!   which reaches the peer through a redirect or a form
//!
//! Each binding is described by a [`BindingDescriptor`] that pairs an
//! encoder and a decoder with its inbound match rule and security policy.
//! [`BindingRegistry`] selects among them.
//!
//! # Usage
//!
//! ```rust,ignore
//! use saml_binding::bindings::BindingRegistry;
//!
//! let registry = BindingRegistry::from_config(&config, renderer, store);
//! let mut response = HttpResponse::new();
//! registry.encode(&mut context, &mut response)?;
//! ```

mod artifact;
mod policy;
mod post;
mod registry;

pub use artifact::*;
pub use policy::*;
pub use post::*;
pub use registry::*;

use std::sync::Arc;

use crate::artifact::SamlArtifact;
use crate::error::{BindingError, BindingResult};
use crate::template::{RenderContext, TemplateRenderer};
use crate::types::{
    HttpInTransport, HttpOutTransport, InTransport, MessageKind, OutTransport,
    OutboundMessageContext, SamlBinding,
};

/// Maximum relay state length allowed by SAML 2.0 Bindings.
pub const MAX_RELAY_STATE_LENGTH: usize = 80;

/// Encodes outbound messages for one binding.
pub trait MessageEncoder: Send + Sync {
    /// The binding this encoder implements.
    fn binding(&self) -> SamlBinding;

    /// Encodes the message in `context` onto `transport`.
    ///
    /// Fails with [`BindingError::UnsupportedContext`] if `transport` is not
    /// HTTP.
    fn encode(
        &self,
        context: &mut OutboundMessageContext,
        transport: &mut dyn OutTransport,
    ) -> BindingResult<()>;

    /// Whether the binding itself keeps the message confidential.
    fn provides_message_confidentiality(&self, _context: &OutboundMessageContext) -> bool {
        false
    }

    /// Whether the binding itself protects message integrity.
    fn provides_message_integrity(&self, _context: &OutboundMessageContext) -> bool {
        false
    }
}

/// Decodes inbound messages for one binding.
pub trait MessageDecoder: Send + Sync {
    /// The binding this decoder implements.
    fn binding(&self) -> SamlBinding;

    /// Extracts the message from `transport`.
    fn decode(&self, transport: &dyn InTransport) -> BindingResult<InboundMessage>;
}

/// A supported binding: its codec, inbound match rule and security policy.
pub trait BindingDescriptor: Send + Sync {
    /// The binding.
    fn binding(&self) -> SamlBinding;

    /// The binding URI.
    fn binding_uri(&self) -> &'static str {
        self.binding().uri()
    }

    /// Whether an inbound request carries a message for this binding.
    fn supports_inbound(&self, transport: &dyn InTransport) -> bool;

    /// Whether this binding can send over `transport`.
    fn supports_outbound(&self, transport: &dyn OutTransport) -> bool {
        transport.is_http()
    }

    /// The encoder, if this descriptor can send.
    fn encoder(&self) -> Option<Arc<dyn MessageEncoder>>;

    /// The decoder.
    fn decoder(&self) -> Arc<dyn MessageDecoder>;

    /// Security policy rules for inbound messages, in evaluation order.
    fn security_policy(&self, trust: &TrustContext) -> Vec<Arc<dyn PolicyRule>>;
}

/// What an inbound request carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    /// A full protocol message.
    Message {
        /// Decoded XML.
        xml: String,
        /// Request or status response, by form parameter.
        kind: MessageKind,
        /// The parameter value as received.
        encoded: String,
    },
    /// An artifact to be resolved over the back channel.
    Artifact(SamlArtifact),
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Binding the message arrived on.
    pub binding: SamlBinding,
    /// The message or artifact.
    pub payload: InboundPayload,
    /// The RelayState as received. An empty parameter stays `Some("")`, since
    /// SimpleSign covers it.
    pub relay_state: Option<String>,
    /// Detached signature (SimpleSign).
    pub signature: Option<String>,
    /// Detached signature algorithm (SimpleSign).
    pub sig_alg: Option<String>,
}

impl InboundMessage {
    /// Returns the message XML, if the payload is a full message.
    #[must_use]
    pub fn xml(&self) -> Option<&str> {
        match &self.payload {
            InboundPayload::Message { xml, .. } => Some(xml),
            InboundPayload::Artifact(_) => None,
        }
    }

    /// Returns the artifact, if the payload is one.
    #[must_use]
    pub const fn artifact(&self) -> Option<&SamlArtifact> {
        match &self.payload {
            InboundPayload::Artifact(artifact) => Some(artifact),
            InboundPayload::Message { .. } => None,
        }
    }
}

/// Returns the HTTP view of an outbound transport.
pub(crate) fn http_out(transport: &mut dyn OutTransport) -> BindingResult<&mut dyn HttpOutTransport> {
    transport.as_http().ok_or_else(|| {
        tracing::error!("Outbound transport is not HTTP");
        BindingError::UnsupportedContext("transport must be an HTTP transport".to_string())
    })
}

/// Returns the HTTP view of an inbound transport.
pub(crate) fn http_in(transport: &dyn InTransport) -> BindingResult<&dyn HttpInTransport> {
    transport.as_http().ok_or_else(|| {
        BindingError::UnsupportedContext("transport must be an HTTP transport".to_string())
    })
}

/// Reads a parameter, treating an empty value as absent.
pub(crate) fn non_empty_param<'a>(http: &'a dyn HttpInTransport, name: &str) -> Option<&'a str> {
    http.parameter(name).filter(|v| !v.is_empty())
}

/// Logs a relay state exceeding the length limit. The value is still sent.
pub(crate) fn check_relay_state(relay_state: &str) {
    if relay_state.len() > MAX_RELAY_STATE_LENGTH {
        tracing::warn!(
            length = relay_state.len(),
            "RelayState exceeds {MAX_RELAY_STATE_LENGTH} bytes"
        );
    }
}

/// Writes an auto-submitting form page: no-cache headers, `text/html`,
/// then the rendered template.
pub(crate) fn post_form(
    http: &mut dyn HttpOutTransport,
    renderer: &dyn TemplateRenderer,
    template_id: &str,
    variables: &RenderContext,
) -> BindingResult<()> {
    http.set_header("Cache-control", "no-cache, no-store")?;
    http.set_header("Pragma", "no-cache")?;
    http.set_content_type("text/html")?;

    let out = http.outgoing_stream();
    renderer
        .render(template_id, variables, out)
        .map_err(|e| {
            tracing::error!(template = template_id, error = %e, "Error rendering form");
            BindingError::encoding("Error creating output document", e)
        })?;
    out.flush().map_err(|e| {
        tracing::error!(error = %e, "Error flushing output document");
        BindingError::encoding("Error writing output document", e.into())
    })
}
