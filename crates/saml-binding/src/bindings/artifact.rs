//! HTTP-Artifact Binding implementation.
//!
//! The message is handed to the [`ArtifactBuilder`] and only the artifact
//! travels through the browser: as a `SAMLart` query parameter on a
//! redirect, or as a hidden field of an auto-submitting form.

use std::sync::Arc;

use crate::artifact::{ArtifactBuilder, ArtifactStore, SamlArtifact};
use crate::config::BindingConfig;
use crate::encoding::{append_query_params, parse_endpoint_url};
use crate::error::{BindingError, BindingResult};
use crate::template::{RenderContext, TemplateRenderer};
use crate::types::{
    params, template_vars, HttpOutTransport, InTransport, OutTransport, OutboundMessageContext,
    SamlBinding,
};

use super::{
    check_relay_state, http_in, http_out, non_empty_param, post_form, BindingDescriptor,
    InboundMessage, InboundPayload, MessageDecoder, MessageEncoder, PolicyRule, TrustContext,
};

/// HTTP-Artifact binding encoder.
#[derive(Clone)]
pub struct HttpArtifactEncoder {
    artifact_builder: ArtifactBuilder,
    renderer: Arc<dyn TemplateRenderer>,
    template_id: String,
    post_encoding: bool,
}

impl std::fmt::Debug for HttpArtifactEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpArtifactEncoder")
            .field("artifact_builder", &self.artifact_builder)
            .field("template_id", &self.template_id)
            .field("post_encoding", &self.post_encoding)
            .finish_non_exhaustive()
    }
}

impl HttpArtifactEncoder {
    /// Creates an encoder in redirect mode.
    pub fn new(
        artifact_builder: ArtifactBuilder,
        renderer: Arc<dyn TemplateRenderer>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            artifact_builder,
            renderer,
            template_id: template_id.into(),
            post_encoding: false,
        }
    }

    /// Creates an encoder from configuration, storing messages in `store`.
    pub fn from_config(
        config: &BindingConfig,
        renderer: Arc<dyn TemplateRenderer>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self::new(
            ArtifactBuilder::from_config(config, store),
            renderer,
            config.artifact_post_template.clone(),
        )
        .with_post_encoding(config.artifact_post_encoding)
    }

    /// Selects form delivery (`true`) or redirect delivery (`false`).
    #[must_use]
    pub const fn with_post_encoding(mut self, post_encoding: bool) -> Self {
        self.post_encoding = post_encoding;
        self
    }

    /// Returns true if artifacts are delivered through a form.
    #[must_use]
    pub const fn post_encoding(&self) -> bool {
        self.post_encoding
    }

    /// Returns the artifact builder.
    #[must_use]
    pub const fn artifact_builder(&self) -> &ArtifactBuilder {
        &self.artifact_builder
    }

    fn build_artifact(&self, context: &mut OutboundMessageContext) -> BindingResult<SamlArtifact> {
        self.artifact_builder.build_artifact(context).inspect_err(|e| {
            tracing::error!(error = %e, "Unable to build artifact");
        })
    }

    fn post_encode(
        &self,
        context: &mut OutboundMessageContext,
        http: &mut dyn HttpOutTransport,
    ) -> BindingResult<()> {
        let endpoint_url = context.endpoint_url()?.to_string();
        let artifact = self.build_artifact(context)?;

        let mut variables = RenderContext::new();
        let action = variables.insert_escaped(template_vars::ACTION, &endpoint_url);
        tracing::debug!(raw = %endpoint_url, escaped = %action, "Setting action parameter");
        variables.insert_trusted(template_vars::BINDING, SamlBinding::HttpArtifact.uri());
        variables.insert_escaped(template_vars::SAML_ART, &artifact.base64_encode());

        if let Some(relay_state) = context.effective_relay_state() {
            check_relay_state(relay_state);
            let escaped = variables.insert_escaped(params::RELAY_STATE, relay_state);
            tracing::debug!(raw = %relay_state, escaped = %escaped, "Setting RelayState parameter");
        }

        post_form(http, self.renderer.as_ref(), &self.template_id, &variables)
    }

    fn get_encode(
        &self,
        context: &mut OutboundMessageContext,
        http: &mut dyn HttpOutTransport,
    ) -> BindingResult<()> {
        let mut url = parse_endpoint_url(context.endpoint_url()?)?;
        let artifact = self.build_artifact(context)?.base64_encode();

        let mut query = vec![(params::SAML_ART, artifact.as_str())];
        // Query parameters are percent-encoded, not HTML-escaped.
        if let Some(relay_state) = context.effective_relay_state() {
            check_relay_state(relay_state);
            query.push((params::RELAY_STATE, relay_state));
        }
        append_query_params(&mut url, query);

        tracing::debug!(location = %url, "Redirecting with SAML artifact");
        http.send_redirect(url.as_str())
    }
}

impl MessageEncoder for HttpArtifactEncoder {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpArtifact
    }

    fn encode(
        &self,
        context: &mut OutboundMessageContext,
        transport: &mut dyn OutTransport,
    ) -> BindingResult<()> {
        let http = http_out(transport)?;
        http.set_character_encoding("UTF-8");

        if self.post_encoding {
            tracing::debug!("Performing HTTP POST SAML 2 artifact encoding");
            self.post_encode(context, http)
        } else {
            tracing::debug!("Performing HTTP GET SAML 2 artifact encoding");
            self.get_encode(context, http)
        }
    }
}

/// HTTP-Artifact binding decoder.
///
/// Extracts the artifact; resolving it is up to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpArtifactDecoder;

impl MessageDecoder for HttpArtifactDecoder {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpArtifact
    }

    fn decode(&self, transport: &dyn InTransport) -> BindingResult<InboundMessage> {
        let http = http_in(transport)?;
        let encoded = non_empty_param(http, params::SAML_ART).ok_or_else(|| {
            BindingError::InvalidRequest("No SAMLart parameter".to_string())
        })?;

        let artifact = SamlArtifact::parse_base64(encoded).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected inbound artifact");
        })?;

        Ok(InboundMessage {
            binding: SamlBinding::HttpArtifact,
            payload: InboundPayload::Artifact(artifact),
            relay_state: http.parameter(params::RELAY_STATE).map(String::from),
            signature: None,
            sig_alg: None,
        })
    }
}

/// HTTP-Artifact binding descriptor.
///
/// Matches any request carrying `SAMLart`, whatever its method.
#[derive(Debug, Clone, Default)]
pub struct HttpArtifactBinding {
    encoder: Option<Arc<HttpArtifactEncoder>>,
}

impl HttpArtifactBinding {
    /// Creates a descriptor that can only decode.
    #[must_use]
    pub fn inbound_only() -> Self {
        Self::default()
    }

    /// Creates a descriptor with an encoder.
    #[must_use]
    pub fn new(encoder: HttpArtifactEncoder) -> Self {
        Self {
            encoder: Some(Arc::new(encoder)),
        }
    }
}

impl BindingDescriptor for HttpArtifactBinding {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpArtifact
    }

    fn supports_inbound(&self, transport: &dyn InTransport) -> bool {
        transport
            .as_http()
            .is_some_and(|http| http.parameter(params::SAML_ART).is_some())
    }

    fn encoder(&self) -> Option<Arc<dyn MessageEncoder>> {
        self.encoder
            .as_ref()
            .map(|e| Arc::clone(e) as Arc<dyn MessageEncoder>)
    }

    fn decoder(&self) -> Arc<dyn MessageDecoder> {
        Arc::new(HttpArtifactDecoder)
    }

    fn security_policy(&self, trust: &TrustContext) -> Vec<Arc<dyn PolicyRule>> {
        vec![trust
            .rule_factory()
            .protocol_message_signature_rule(trust.trust_engine())]
    }
}
