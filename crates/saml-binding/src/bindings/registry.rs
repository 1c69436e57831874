//! Binding selection.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::artifact::ArtifactStore;
use crate::config::BindingConfig;
use crate::error::{BindingError, BindingResult};
use crate::template::TemplateRenderer;
use crate::types::{InTransport, OutTransport, OutboundMessageContext, SamlBinding};

use super::{
    evaluate_policy, BindingDescriptor, HttpArtifactBinding, HttpArtifactEncoder, HttpPostBinding,
    HttpPostEncoder, InboundMessage, PolicyRule, TrustContext,
};

/// Ordered set of supported bindings.
///
/// Inbound selection returns the first registered binding whose match rule
/// accepts the request.
#[derive(Default)]
pub struct BindingRegistry {
    descriptors: RwLock<Vec<Arc<dyn BindingDescriptor>>>,
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("bindings", &self.binding_uris())
            .finish()
    }
}

impl BindingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the HTTP-POST and HTTP-Artifact bindings, in
    /// that order.
    pub fn from_config(
        config: &BindingConfig,
        renderer: Arc<dyn TemplateRenderer>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(HttpPostBinding::new(HttpPostEncoder::from_config(
            config,
            Arc::clone(&renderer),
        ))));
        registry.register(Arc::new(HttpArtifactBinding::new(
            HttpArtifactEncoder::from_config(config, renderer, store),
        )));
        registry
    }

    /// Appends a binding.
    pub fn register(&self, descriptor: Arc<dyn BindingDescriptor>) {
        tracing::debug!(binding = descriptor.binding_uri(), "Registered SAML binding");
        self.descriptors.write().push(descriptor);
    }

    /// Lists the registered binding URIs in order.
    #[must_use]
    pub fn binding_uris(&self) -> Vec<&'static str> {
        self.descriptors
            .read()
            .iter()
            .map(|d| d.binding_uri())
            .collect()
    }

    /// Finds a binding by URI.
    #[must_use]
    pub fn find_by_uri(&self, uri: &str) -> Option<Arc<dyn BindingDescriptor>> {
        self.descriptors
            .read()
            .iter()
            .find(|d| d.binding_uri() == uri)
            .cloned()
    }

    /// Selects the binding an inbound request arrived on.
    #[must_use]
    pub fn select_inbound(&self, transport: &dyn InTransport) -> Option<Arc<dyn BindingDescriptor>> {
        let selected = self
            .descriptors
            .read()
            .iter()
            .find(|d| d.supports_inbound(transport))
            .cloned();
        match &selected {
            Some(d) => tracing::debug!(binding = d.binding_uri(), "Selected inbound binding"),
            None => tracing::debug!("No binding matches inbound request"),
        }
        selected
    }

    /// Selects the binding for the context's peer endpoint that can send
    /// over `transport`.
    #[must_use]
    pub fn select_outbound(
        &self,
        context: &OutboundMessageContext,
        transport: &dyn OutTransport,
    ) -> Option<Arc<dyn BindingDescriptor>> {
        let binding = context.peer_endpoint.as_ref()?.binding;
        self.descriptors
            .read()
            .iter()
            .find(|d| {
                d.binding() == binding && d.encoder().is_some() && d.supports_outbound(transport)
            })
            .cloned()
    }

    /// Returns the security policy rules of `descriptor`, in order.
    #[must_use]
    pub fn security_policy(
        &self,
        descriptor: &dyn BindingDescriptor,
        trust: &TrustContext,
    ) -> Vec<Arc<dyn PolicyRule>> {
        descriptor.security_policy(trust)
    }

    /// Encodes the context's message with the binding of its peer endpoint.
    pub fn encode(
        &self,
        context: &mut OutboundMessageContext,
        transport: &mut dyn OutTransport,
    ) -> BindingResult<SamlBinding> {
        let endpoint = context.peer_endpoint.as_ref().ok_or_else(|| {
            BindingError::MissingEndpoint("message context has no peer endpoint".to_string())
        })?;
        let binding = endpoint.binding;

        let encoder = self
            .select_outbound(context, transport)
            .and_then(|d| d.encoder())
            .ok_or_else(|| {
                tracing::error!(binding = binding.uri(), "No encoder for outbound binding");
                BindingError::UnsupportedContext(format!(
                    "no encoder registered for {}",
                    binding.uri()
                ))
            })?;

        encoder.encode(context, transport)?;
        Ok(binding)
    }

    /// Selects the binding of an inbound request, decodes the message and
    /// applies the binding's security policy.
    pub fn decode(
        &self,
        transport: &dyn InTransport,
        trust: &TrustContext,
    ) -> BindingResult<InboundMessage> {
        let descriptor = self.select_inbound(transport).ok_or_else(|| {
            BindingError::InvalidRequest("request carries no SAML message".to_string())
        })?;

        let message = descriptor.decoder().decode(transport)?;
        evaluate_policy(&descriptor.security_policy(trust), &message)?;
        Ok(message)
    }
}
