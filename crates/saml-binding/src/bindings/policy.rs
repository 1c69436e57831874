//! Inbound security policy.
//!
//! Each binding supplies an ordered list of [`PolicyRule`]s. Rules locate the
//! signature a binding can carry and hand it to the [`TrustEngine`]; the
//! cryptographic checks themselves live behind that trait.

use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::encoding::base64_decode;
use crate::error::{BindingError, BindingResult};
use crate::types::params;

use super::{InboundMessage, InboundPayload};

/// Bytes covered by a detached signature, as sent by the POST-SimpleSign
/// and Redirect bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    /// The signed octet string.
    pub signed_content: Vec<u8>,
    /// The decoded signature value.
    pub signature: Vec<u8>,
    /// Signature algorithm URI.
    pub algorithm: String,
}

/// Validates signatures against the trusted credentials of a peer.
pub trait TrustEngine: Send + Sync {
    /// Validates a detached signature.
    fn validate_detached(&self, signature: &DetachedSignature) -> BindingResult<bool>;

    /// Validates the enveloped XML signature of a protocol message.
    fn validate_enveloped(&self, xml: &str) -> BindingResult<bool>;
}

/// A single inbound security check.
pub trait PolicyRule: Send + Sync {
    /// Rule name, for logging.
    fn name(&self) -> &'static str;

    /// Evaluates the rule, failing with [`BindingError::PolicyViolation`] if
    /// the message is rejected.
    fn evaluate(&self, message: &InboundMessage) -> BindingResult<()>;
}

/// Supplies policy rules bound to a trust engine.
pub trait PolicyRuleFactory: Send + Sync {
    /// Rule checking a POST-SimpleSign signature over the form fields.
    fn simple_sign_rule(&self, engine: Arc<dyn TrustEngine>) -> Arc<dyn PolicyRule>;

    /// Rule checking the enveloped signature of the protocol message.
    fn protocol_message_signature_rule(&self, engine: Arc<dyn TrustEngine>)
        -> Arc<dyn PolicyRule>;
}

/// Factory producing the built-in rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicyRuleFactory;

impl PolicyRuleFactory for DefaultPolicyRuleFactory {
    fn simple_sign_rule(&self, engine: Arc<dyn TrustEngine>) -> Arc<dyn PolicyRule> {
        Arc::new(SimpleSignRule::new(engine))
    }

    fn protocol_message_signature_rule(
        &self,
        engine: Arc<dyn TrustEngine>,
    ) -> Arc<dyn PolicyRule> {
        Arc::new(ProtocolMessageSignatureRule::new(engine))
    }
}

/// Trust engine and rule factory used to build a binding's security policy.
#[derive(Clone)]
pub struct TrustContext {
    trust_engine: Arc<dyn TrustEngine>,
    rule_factory: Arc<dyn PolicyRuleFactory>,
}

impl std::fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustContext").finish_non_exhaustive()
    }
}

impl TrustContext {
    /// Creates a trust context using the built-in rules.
    pub fn new(trust_engine: Arc<dyn TrustEngine>) -> Self {
        Self {
            trust_engine,
            rule_factory: Arc::new(DefaultPolicyRuleFactory),
        }
    }

    /// Replaces the rule factory.
    #[must_use]
    pub fn with_rule_factory(mut self, rule_factory: Arc<dyn PolicyRuleFactory>) -> Self {
        self.rule_factory = rule_factory;
        self
    }

    /// Returns the trust engine.
    #[must_use]
    pub fn trust_engine(&self) -> Arc<dyn TrustEngine> {
        Arc::clone(&self.trust_engine)
    }

    /// Returns the rule factory.
    #[must_use]
    pub fn rule_factory(&self) -> &dyn PolicyRuleFactory {
        self.rule_factory.as_ref()
    }
}

/// Evaluates rules in order, stopping at the first failure.
pub fn evaluate_policy(rules: &[Arc<dyn PolicyRule>], message: &InboundMessage) -> BindingResult<()> {
    for rule in rules {
        if let Err(e) = rule.evaluate(message) {
            tracing::error!(rule = rule.name(), error = %e, "Security policy rule failed");
            return Err(e);
        }
        tracing::debug!(rule = rule.name(), "Security policy rule passed");
    }
    Ok(())
}

/// Checks the SimpleSign signature of an HTTP-POST message.
///
/// Applies only when the form carries `Signature` and `SigAlg`. The signed
/// content is `SAMLRequest=...&RelayState=...&SigAlg=...` built from the
/// form values as received.
pub struct SimpleSignRule {
    engine: Arc<dyn TrustEngine>,
}

impl SimpleSignRule {
    /// Creates the rule.
    pub fn new(engine: Arc<dyn TrustEngine>) -> Self {
        Self { engine }
    }

    /// Builds the octet string covered by a SimpleSign signature.
    #[must_use]
    pub fn signed_content(
        param: &str,
        encoded_message: &str,
        relay_state: Option<&str>,
        sig_alg: &str,
    ) -> Vec<u8> {
        let mut content = format!("{param}={encoded_message}");
        if let Some(relay_state) = relay_state {
            content.push_str(&format!("&{}={relay_state}", params::RELAY_STATE));
        }
        content.push_str(&format!("&{}={sig_alg}", params::SIG_ALG));
        content.into_bytes()
    }
}

impl PolicyRule for SimpleSignRule {
    fn name(&self) -> &'static str {
        "simple-sign"
    }

    fn evaluate(&self, message: &InboundMessage) -> BindingResult<()> {
        let (Some(signature), Some(sig_alg)) = (&message.signature, &message.sig_alg) else {
            return Ok(());
        };
        let InboundPayload::Message { kind, encoded, .. } = &message.payload else {
            return Ok(());
        };
        let param = kind.form_param().ok_or_else(|| {
            BindingError::PolicyViolation("signed message is neither a request nor a response".to_string())
        })?;

        let detached = DetachedSignature {
            signed_content: Self::signed_content(
                param,
                encoded,
                message.relay_state.as_deref(),
                sig_alg,
            ),
            signature: base64_decode(signature)?,
            algorithm: sig_alg.clone(),
        };

        if self.engine.validate_detached(&detached)? {
            Ok(())
        } else {
            Err(BindingError::PolicyViolation(
                "SimpleSign signature was not valid".to_string(),
            ))
        }
    }
}

/// Checks the enveloped XML signature of a protocol message.
///
/// Applies only when the root element has a `Signature` child.
pub struct ProtocolMessageSignatureRule {
    engine: Arc<dyn TrustEngine>,
}

impl ProtocolMessageSignatureRule {
    /// Creates the rule.
    pub fn new(engine: Arc<dyn TrustEngine>) -> Self {
        Self { engine }
    }

    /// Returns true if the root element of `xml` has a `Signature` child.
    pub fn has_enveloped_signature(xml: &str) -> BindingResult<bool> {
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if depth == 1 && e.local_name().as_ref() == b"Signature" {
                        return Ok(true);
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 1 && e.local_name().as_ref() == b"Signature" {
                        return Ok(true);
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(false);
                    }
                }
                Event::Eof => return Ok(false),
                _ => {}
            }
        }
    }
}

impl PolicyRule for ProtocolMessageSignatureRule {
    fn name(&self) -> &'static str {
        "protocol-message-signature"
    }

    fn evaluate(&self, message: &InboundMessage) -> BindingResult<()> {
        let InboundPayload::Message { xml, .. } = &message.payload else {
            return Ok(());
        };
        if !Self::has_enveloped_signature(xml)? {
            return Ok(());
        }

        if self.engine.validate_enveloped(xml)? {
            Ok(())
        } else {
            Err(BindingError::PolicyViolation(
                "protocol message signature was not valid".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::{MessageKind, SamlBinding};

    #[derive(Default)]
    struct RecordingEngine {
        accept: bool,
        calls: AtomicUsize,
        last_content: parking_lot::Mutex<Vec<u8>>,
    }

    impl TrustEngine for RecordingEngine {
        fn validate_detached(&self, signature: &DetachedSignature) -> BindingResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_content.lock() = signature.signed_content.clone();
            Ok(self.accept)
        }

        fn validate_enveloped(&self, _xml: &str) -> BindingResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accept)
        }
    }

    fn inbound(xml: &str) -> InboundMessage {
        InboundMessage {
            binding: SamlBinding::HttpPost,
            payload: InboundPayload::Message {
                xml: xml.to_string(),
                kind: MessageKind::StatusResponse,
                encoded: "PHg+".to_string(),
            },
            relay_state: Some("rs".to_string()),
            signature: None,
            sig_alg: None,
        }
    }

    #[test]
    fn detects_enveloped_signature() {
        let signed = r#"<samlp:Response><saml:Issuer>x</saml:Issuer><ds:Signature/></samlp:Response>"#;
        let nested = r#"<samlp:Response><saml:Assertion><ds:Signature></ds:Signature></saml:Assertion></samlp:Response>"#;
        assert!(ProtocolMessageSignatureRule::has_enveloped_signature(signed).unwrap());
        assert!(!ProtocolMessageSignatureRule::has_enveloped_signature(nested).unwrap());
    }

    #[test]
    fn unsigned_message_skips_engine() {
        let engine = Arc::new(RecordingEngine::default());
        let rule = ProtocolMessageSignatureRule::new(engine.clone());
        rule.evaluate(&inbound("<samlp:Response/>")).unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejected_signature_is_a_violation() {
        let engine = Arc::new(RecordingEngine::default());
        let rule = ProtocolMessageSignatureRule::new(engine);
        let err = rule
            .evaluate(&inbound("<samlp:Response><ds:Signature/></samlp:Response>"))
            .unwrap_err();
        assert!(matches!(err, BindingError::PolicyViolation(_)));
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn simple_sign_content() {
        let engine = Arc::new(RecordingEngine {
            accept: true,
            ..RecordingEngine::default()
        });
        let rule = SimpleSignRule::new(engine.clone());
        let mut message = inbound("<samlp:Response/>");
        message.signature = Some("c2ln".to_string());
        message.sig_alg = Some("rsa-sha256".to_string());

        rule.evaluate(&message).unwrap();
        assert_eq!(
            engine.last_content.lock().as_slice(),
            b"SAMLResponse=PHg+&RelayState=rs&SigAlg=rsa-sha256"
        );
    }

    #[test]
    fn simple_sign_content_keeps_empty_relay_state() {
        let engine = Arc::new(RecordingEngine {
            accept: true,
            ..RecordingEngine::default()
        });
        let mut message = inbound("<samlp:Response/>");
        message.relay_state = Some(String::new());
        message.signature = Some("c2ln".to_string());
        message.sig_alg = Some("rsa-sha256".to_string());

        SimpleSignRule::new(engine.clone()).evaluate(&message).unwrap();
        assert_eq!(
            engine.last_content.lock().as_slice(),
            b"SAMLResponse=PHg+&RelayState=&SigAlg=rsa-sha256"
        );

        message.relay_state = None;
        SimpleSignRule::new(engine.clone()).evaluate(&message).unwrap();
        assert_eq!(
            engine.last_content.lock().as_slice(),
            b"SAMLResponse=PHg+&SigAlg=rsa-sha256"
        );
    }

    #[test]
    fn simple_sign_without_signature_does_not_apply() {
        let engine = Arc::new(RecordingEngine::default());
        SimpleSignRule::new(engine.clone())
            .evaluate(&inbound("<samlp:Response/>"))
            .unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn evaluate_policy_stops_at_first_failure() {
        let engine = Arc::new(RecordingEngine::default());
        let rules: Vec<Arc<dyn PolicyRule>> = vec![
            Arc::new(ProtocolMessageSignatureRule::new(engine.clone())),
            Arc::new(ProtocolMessageSignatureRule::new(engine.clone())),
        ];
        let message = inbound("<samlp:Response><ds:Signature/></samlp:Response>");
        assert!(evaluate_policy(&rules, &message).is_err());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }
}
