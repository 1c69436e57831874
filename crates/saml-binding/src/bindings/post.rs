//! HTTP-POST Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-POST binding for sending SAML messages
//! via an auto-submitting HTML form.

use std::sync::Arc;

use axum::http::Method;

use crate::config::BindingConfig;
use crate::encoding::{base64_decode, base64_encode};
use crate::error::{BindingError, BindingResult};
use crate::serializer::{MessageSerializer, XmlMessageSerializer};
use crate::signature::{MessageSigner, NoopSigner};
use crate::template::{RenderContext, TemplateRenderer};
use crate::types::{
    params, template_vars, InTransport, MessageKind, OutTransport, OutboundMessageContext,
    SamlBinding,
};

use super::{
    check_relay_state, http_in, http_out, non_empty_param, post_form, BindingDescriptor,
    InboundMessage, InboundPayload, MessageDecoder, MessageEncoder, PolicyRule, TrustContext,
};

/// HTTP-POST binding encoder.
#[derive(Clone)]
pub struct HttpPostEncoder {
    renderer: Arc<dyn TemplateRenderer>,
    template_id: String,
    serializer: Arc<dyn MessageSerializer>,
    signer: Arc<dyn MessageSigner>,
}

impl std::fmt::Debug for HttpPostEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPostEncoder")
            .field("template_id", &self.template_id)
            .finish_non_exhaustive()
    }
}

impl HttpPostEncoder {
    /// Creates an encoder rendering `template_id`, with the XML serializer
    /// and no signing.
    pub fn new(renderer: Arc<dyn TemplateRenderer>, template_id: impl Into<String>) -> Self {
        Self {
            renderer,
            template_id: template_id.into(),
            serializer: Arc::new(XmlMessageSerializer::new()),
            signer: Arc::new(NoopSigner),
        }
    }

    /// Creates an encoder using the configured POST template.
    pub fn from_config(config: &BindingConfig, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self::new(renderer, config.post_template.clone())
    }

    /// Replaces the message serializer.
    #[must_use]
    pub fn with_serializer(mut self, serializer: Arc<dyn MessageSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Replaces the message signer.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn MessageSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Returns the template this encoder renders.
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    fn build_form(&self, context: &mut OutboundMessageContext) -> BindingResult<RenderContext> {
        let endpoint_url = context.endpoint_url()?.to_string();

        let message = context.message.as_mut().ok_or(BindingError::MissingMessage)?;
        let param = message.kind.form_param().ok_or_else(|| {
            tracing::error!(element = %message.element, "SAML message is neither a request nor a response");
            BindingError::InvalidMessageType(format!(
                "{} is neither a request nor a status response",
                message.element
            ))
        })?;

        // The signed payload must name its own recipient.
        if message.kind == MessageKind::StatusResponse {
            message.set_destination(endpoint_url.as_str());
        }

        self.signer.sign(context).map_err(|e| match e {
            BindingError::Signing(_) => e,
            other => BindingError::Signing(other.to_string()),
        })?;

        let message = context.require_message()?;
        let serialized = self.serializer.serialize(message).map_err(|e| match e {
            BindingError::Serialization(_) => e,
            other => BindingError::Serialization(other.to_string()),
        })?;

        let mut variables = RenderContext::new();
        let action = variables.insert_escaped(template_vars::ACTION, &endpoint_url);
        tracing::debug!(raw = %endpoint_url, escaped = %action, "Setting action parameter");
        variables.insert_trusted(template_vars::BINDING, SamlBinding::HttpPost.uri());
        variables.insert_trusted(param, base64_encode(serialized));

        if let Some(relay_state) = context.effective_relay_state() {
            check_relay_state(relay_state);
            let escaped = variables.insert_escaped(params::RELAY_STATE, relay_state);
            tracing::debug!(raw = %relay_state, escaped = %escaped, "Setting RelayState parameter");
        }

        Ok(variables)
    }
}

impl MessageEncoder for HttpPostEncoder {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpPost
    }

    fn encode(
        &self,
        context: &mut OutboundMessageContext,
        transport: &mut dyn OutTransport,
    ) -> BindingResult<()> {
        let http = http_out(transport)?;
        http.set_character_encoding("UTF-8");

        let variables = self.build_form(context)?;
        post_form(http, self.renderer.as_ref(), &self.template_id, &variables)?;

        tracing::debug!(
            message_id = context.message.as_ref().map(|m| m.id.as_str()),
            "Encoded SAML message with HTTP-POST binding"
        );
        Ok(())
    }
}

/// HTTP-POST binding decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpPostDecoder;

impl MessageDecoder for HttpPostDecoder {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpPost
    }

    fn decode(&self, transport: &dyn InTransport) -> BindingResult<InboundMessage> {
        let http = http_in(transport)?;
        if !is_post(http.method()) {
            return Err(BindingError::InvalidRequest(format!(
                "HTTP-POST binding requires POST, got {}",
                http.method()
            )));
        }

        let (encoded, kind) = if let Some(req) = non_empty_param(http, params::SAML_REQUEST) {
            (req, MessageKind::Request)
        } else if let Some(resp) = non_empty_param(http, params::SAML_RESPONSE) {
            (resp, MessageKind::StatusResponse)
        } else {
            return Err(BindingError::InvalidRequest(
                "No SAMLRequest or SAMLResponse parameter".to_string(),
            ));
        };

        let decoded = base64_decode(encoded)?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| BindingError::InvalidRequest(format!("Invalid UTF-8 in message: {e}")))?;

        Ok(InboundMessage {
            binding: SamlBinding::HttpPost,
            payload: InboundPayload::Message {
                xml,
                kind,
                encoded: encoded.to_string(),
            },
            relay_state: http.parameter(params::RELAY_STATE).map(String::from),
            signature: non_empty_param(http, params::SIGNATURE).map(String::from),
            sig_alg: non_empty_param(http, params::SIG_ALG).map(String::from),
        })
    }
}

/// Method names are matched case-insensitively, so an extension method
/// spelled `post` counts.
fn is_post(method: &Method) -> bool {
    method.as_str().eq_ignore_ascii_case(Method::POST.as_str())
}

/// HTTP-POST binding descriptor.
///
/// Matches POST requests carrying `SAMLRequest` or `SAMLResponse`.
#[derive(Debug, Clone, Default)]
pub struct HttpPostBinding {
    encoder: Option<Arc<HttpPostEncoder>>,
}

impl HttpPostBinding {
    /// Creates a descriptor that can only decode.
    #[must_use]
    pub fn inbound_only() -> Self {
        Self::default()
    }

    /// Creates a descriptor with an encoder.
    #[must_use]
    pub fn new(encoder: HttpPostEncoder) -> Self {
        Self {
            encoder: Some(Arc::new(encoder)),
        }
    }
}

impl BindingDescriptor for HttpPostBinding {
    fn binding(&self) -> SamlBinding {
        SamlBinding::HttpPost
    }

    fn supports_inbound(&self, transport: &dyn InTransport) -> bool {
        transport.as_http().is_some_and(|http| {
            is_post(http.method())
                && (http.parameter(params::SAML_REQUEST).is_some()
                    || http.parameter(params::SAML_RESPONSE).is_some())
        })
    }

    fn encoder(&self) -> Option<Arc<dyn MessageEncoder>> {
        self.encoder
            .as_ref()
            .map(|e| Arc::clone(e) as Arc<dyn MessageEncoder>)
    }

    fn decoder(&self) -> Arc<dyn MessageDecoder> {
        Arc::new(HttpPostDecoder)
    }

    fn security_policy(&self, trust: &TrustContext) -> Vec<Arc<dyn PolicyRule>> {
        let factory = trust.rule_factory();
        vec![
            factory.simple_sign_rule(trust.trust_engine()),
            factory.protocol_message_signature_rule(trust.trust_engine()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::HandlebarsRenderer;
    use crate::types::{Endpoint, HttpRequest, HttpResponse, SamlMessage};

    fn encoder() -> HttpPostEncoder {
        HttpPostEncoder::from_config(
            &BindingConfig::default(),
            Arc::new(HandlebarsRenderer::new().unwrap()),
        )
    }

    fn response_context() -> OutboundMessageContext {
        OutboundMessageContext::new(
            SamlMessage::response("https://idp.example.com").in_response_to("_req1"),
        )
        .with_endpoint(Endpoint::new(SamlBinding::HttpPost, "https://sp.example.com/acs"))
        .with_relay_state("state123")
    }

    fn extract_value<'a>(html: &'a str, name: &str) -> &'a str {
        let marker = format!(r#"name="{name}" value=""#);
        let start = html.find(&marker).unwrap() + marker.len();
        let end = html[start..].find('"').unwrap();
        &html[start..start + end]
    }

    #[test]
    fn encode_response_form() {
        let mut ctx = response_context();
        let mut response = HttpResponse::new();
        encoder().encode(&mut ctx, &mut response).unwrap();

        let html = response.body_text();
        assert!(html.contains(r#"action="https&#x3a;&#x2f;&#x2f;sp.example.com&#x2f;acs""#));
        assert!(html.contains(SamlBinding::HttpPost.uri()));
        assert_eq!(extract_value(&html, "RelayState"), "state123");
        assert!(!html.contains("SAMLRequest"));

        assert_eq!(response.header("cache-control"), Some("no-cache, no-store"));
        assert_eq!(response.header("pragma"), Some("no-cache"));
        assert_eq!(response.header("content-type"), Some("text/html; charset=UTF-8"));
        assert_eq!(
            ctx.message.unwrap().destination.as_deref(),
            Some("https://sp.example.com/acs")
        );
    }

    #[test]
    fn encode_then_decode() {
        let mut ctx = response_context();
        let mut response = HttpResponse::new();
        encoder().encode(&mut ctx, &mut response).unwrap();
        let html = response.body_text();

        let request = HttpRequest::new(Method::POST)
            .with_parameter("SAMLResponse", extract_value(&html, "SAMLResponse"))
            .with_parameter("RelayState", "state123");
        let decoded = HttpPostDecoder.decode(&request).unwrap();

        assert_eq!(decoded.relay_state.as_deref(), Some("state123"));
        let xml = decoded.xml().unwrap();
        assert!(xml.starts_with("<samlp:Response "));
        assert!(xml.contains(r#"Destination="https://sp.example.com/acs""#));
    }

    #[test]
    fn lowercase_post_method_matches() {
        let method = Method::from_bytes(b"post").unwrap();
        assert_ne!(method, Method::POST);
        let request = HttpRequest::new(method).with_parameter("SAMLResponse", "PHg+");

        assert!(HttpPostBinding::inbound_only().supports_inbound(&request));
        assert!(HttpPostDecoder.decode(&request).is_ok());

        let get = HttpRequest::new(Method::GET).with_parameter("SAMLResponse", "PHg+");
        assert!(!HttpPostBinding::inbound_only().supports_inbound(&get));
    }

    #[test]
    fn decode_keeps_empty_relay_state() {
        let request = HttpRequest::new(Method::POST)
            .with_parameter("SAMLResponse", "PHg+")
            .with_parameter("RelayState", "");
        let decoded = HttpPostDecoder.decode(&request).unwrap();
        assert_eq!(decoded.relay_state.as_deref(), Some(""));

        let request = HttpRequest::new(Method::POST).with_parameter("SAMLResponse", "PHg+");
        assert!(HttpPostDecoder.decode(&request).unwrap().relay_state.is_none());
    }

    #[test]
    fn request_destination_is_not_set() {
        let mut ctx = OutboundMessageContext::new(SamlMessage::authn_request("https://sp.example.com"))
            .with_endpoint(Endpoint::new(SamlBinding::HttpPost, "https://idp.example.com/sso"));
        let mut response = HttpResponse::new();
        encoder().encode(&mut ctx, &mut response).unwrap();

        assert!(response.body_text().contains(r#"name="SAMLRequest""#));
        assert!(!response.body_text().contains("RelayState"));
        assert!(ctx.message.unwrap().destination.is_none());
    }

    #[test]
    fn assertion_is_rejected() {
        let mut ctx = OutboundMessageContext::new(SamlMessage::assertion("https://idp.example.com"))
            .with_endpoint(Endpoint::new(SamlBinding::HttpPost, "https://sp.example.com/acs"));
        let mut response = HttpResponse::new();
        let err = encoder().encode(&mut ctx, &mut response).unwrap_err();

        assert!(matches!(err, BindingError::InvalidMessageType(_)));
        assert!(response.body().is_empty());
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let mut ctx = OutboundMessageContext::new(SamlMessage::response("https://idp.example.com"));
        let err = encoder().encode(&mut ctx, &mut HttpResponse::new()).unwrap_err();
        assert!(matches!(err, BindingError::MissingEndpoint(_)));
    }

    #[test]
    fn decode_requires_post() {
        let request = HttpRequest::new(Method::GET).with_parameter("SAMLResponse", "PHg+");
        let err = HttpPostDecoder.decode(&request).unwrap_err();
        assert!(matches!(err, BindingError::InvalidRequest(_)));
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let request = HttpRequest::new(Method::POST).with_parameter("SAMLRequest", "***");
        let err = HttpPostDecoder.decode(&request).unwrap_err();
        assert!(matches!(err, BindingError::Base64Decode(_)));
    }

    #[test]
    fn supports_inbound() {
        let binding = HttpPostBinding::inbound_only();
        let post = HttpRequest::new(Method::POST).with_parameter("SAMLResponse", "PHg+");
        let get = HttpRequest::new(Method::GET).with_parameter("SAMLResponse", "PHg+");
        let bare = HttpRequest::new(Method::POST).with_parameter("RelayState", "x");

        assert!(binding.supports_inbound(&post));
        assert!(!binding.supports_inbound(&get));
        assert!(!binding.supports_inbound(&bare));
        assert!(binding.encoder().is_none());
    }
}
