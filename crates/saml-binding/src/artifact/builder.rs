//! Artifact construction.

use std::sync::Arc;

use aws_lc_rs::digest;
use dashmap::DashMap;
use rand::Rng;

use crate::config::BindingConfig;
use crate::error::{BindingError, BindingResult};
use crate::serializer::{MessageSerializer, XmlMessageSerializer};
use crate::types::OutboundMessageContext;

use super::store::ArtifactStore;
use super::{ArtifactTypeCode, SamlArtifact, TYPE_0004_FIELD_LENGTH};

/// Builds artifacts of one type.
pub trait ArtifactTypeBuilder: Send + Sync {
    /// The type code this builder produces.
    fn type_code(&self) -> ArtifactTypeCode;

    /// Builds a fresh artifact for the message in `context`.
    fn build(&self, context: &OutboundMessageContext) -> BindingResult<SamlArtifact>;
}

/// Builds type 0x0004 artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Type0004ArtifactBuilder {
    endpoint_index: u16,
}

impl Type0004ArtifactBuilder {
    /// Creates a builder writing `endpoint_index` into every artifact.
    #[must_use]
    pub const fn new(endpoint_index: u16) -> Self {
        Self { endpoint_index }
    }

    /// Computes the source ID for an entity: the SHA-1 of its entity ID.
    #[must_use]
    pub fn source_id(entity_id: &str) -> [u8; TYPE_0004_FIELD_LENGTH] {
        let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, entity_id.as_bytes());
        let mut source_id = [0u8; TYPE_0004_FIELD_LENGTH];
        source_id.copy_from_slice(hash.as_ref());
        source_id
    }
}

impl ArtifactTypeBuilder for Type0004ArtifactBuilder {
    fn type_code(&self) -> ArtifactTypeCode {
        ArtifactTypeCode::TYPE_0004
    }

    fn build(&self, context: &OutboundMessageContext) -> BindingResult<SamlArtifact> {
        let issuer = context
            .local_entity_id
            .as_deref()
            .or_else(|| context.message.as_ref().and_then(|m| m.issuer.as_deref()))
            .filter(|issuer| !issuer.is_empty())
            .ok_or_else(|| {
                BindingError::ArtifactConstruction(
                    "no local entity ID to derive the artifact source ID from".to_string(),
                )
            })?;

        let mut handle = [0u8; TYPE_0004_FIELD_LENGTH];
        rand::rng().fill(&mut handle[..]);

        Ok(SamlArtifact::type_0004(
            self.endpoint_index,
            Self::source_id(issuer),
            handle,
        ))
    }
}

/// Artifact type builders keyed by type code.
#[derive(Default)]
pub struct ArtifactBuilderRegistry {
    builders: DashMap<ArtifactTypeCode, Arc<dyn ArtifactTypeBuilder>>,
}

impl std::fmt::Debug for ArtifactBuilderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBuilderRegistry")
            .field("type_codes", &self.type_codes())
            .finish()
    }
}

impl ArtifactBuilderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the type 0x0004 builder.
    #[must_use]
    pub fn with_defaults(endpoint_index: u16) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(Type0004ArtifactBuilder::new(endpoint_index)));
        registry
    }

    /// Registers a builder, returning the one it replaced.
    pub fn register(
        &self,
        builder: Arc<dyn ArtifactTypeBuilder>,
    ) -> Option<Arc<dyn ArtifactTypeBuilder>> {
        self.builders.insert(builder.type_code(), builder)
    }

    /// Gets the builder for a type code.
    #[must_use]
    pub fn get(&self, type_code: ArtifactTypeCode) -> Option<Arc<dyn ArtifactTypeBuilder>> {
        self.builders.get(&type_code).map(|b| Arc::clone(b.value()))
    }

    /// Lists the registered type codes in ascending order.
    #[must_use]
    pub fn type_codes(&self) -> Vec<ArtifactTypeCode> {
        let mut codes: Vec<_> = self.builders.iter().map(|e| *e.key()).collect();
        codes.sort();
        codes
    }
}

/// Mints artifacts for outbound messages and hands the messages to the
/// artifact store.
#[derive(Clone)]
pub struct ArtifactBuilder {
    registry: Arc<ArtifactBuilderRegistry>,
    serializer: Arc<dyn MessageSerializer>,
    store: Arc<dyn ArtifactStore>,
    default_type: ArtifactTypeCode,
}

impl std::fmt::Debug for ArtifactBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBuilder")
            .field("registry", &self.registry)
            .field("default_type", &self.default_type)
            .finish_non_exhaustive()
    }
}

impl ArtifactBuilder {
    /// Creates an artifact builder.
    pub fn new(
        registry: Arc<ArtifactBuilderRegistry>,
        serializer: Arc<dyn MessageSerializer>,
        store: Arc<dyn ArtifactStore>,
        default_type: ArtifactTypeCode,
    ) -> Self {
        Self {
            registry,
            serializer,
            store,
            default_type,
        }
    }

    /// Creates an artifact builder with the default registry and XML
    /// serializer.
    pub fn from_config(config: &BindingConfig, store: Arc<dyn ArtifactStore>) -> Self {
        Self::new(
            Arc::new(ArtifactBuilderRegistry::with_defaults(
                config.artifact_endpoint_index,
            )),
            Arc::new(XmlMessageSerializer::new()),
            store,
            config.default_artifact_type_code(),
        )
    }

    /// Returns the artifact type used when the context does not select one.
    #[must_use]
    pub const fn default_type(&self) -> ArtifactTypeCode {
        self.default_type
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Builds an artifact for the message in `context` and stores the
    /// serialized message under it.
    ///
    /// The resolved artifact type is written back to the context. The store
    /// is only written once the artifact and the serialized message both
    /// exist.
    pub fn build_artifact(&self, context: &mut OutboundMessageContext) -> BindingResult<SamlArtifact> {
        let type_code = context.artifact_type.unwrap_or(self.default_type);
        context.artifact_type = Some(type_code);

        let builder = self.registry.get(type_code).ok_or_else(|| {
            tracing::error!(type_code = %type_code, "No artifact builder registered for type");
            BindingError::ArtifactConstruction(format!(
                "no artifact builder registered for type {type_code}"
            ))
        })?;

        let artifact = builder.build(context).map_err(|e| {
            tracing::error!(type_code = %type_code, error = %e, "Artifact construction failed");
            match e {
                BindingError::ArtifactConstruction(_) => e,
                other => BindingError::ArtifactConstruction(other.to_string()),
            }
        })?;

        let message = context.require_message()?;
        let serialized = self.serializer.serialize(message).map_err(|e| {
            tracing::error!(error = %e, "Unable to serialize message for artifact");
            match e {
                BindingError::Serialization(_) => e,
                other => BindingError::Serialization(other.to_string()),
            }
        })?;

        let key = artifact.base64_encode();
        let issuer = context
            .local_entity_id
            .as_deref()
            .or(message.issuer.as_deref());
        self.store
            .put(&key, issuer, context.peer_entity_id.as_deref(), serialized)?;

        tracing::debug!(
            type_code = %type_code,
            message_id = %message.id,
            "Artifact built and message stored"
        );

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::InMemoryArtifactStore;
    use crate::types::SamlMessage;

    struct FailingSerializer;

    impl MessageSerializer for FailingSerializer {
        fn serialize(&self, _message: &crate::types::SamlMessage) -> BindingResult<Vec<u8>> {
            Err(BindingError::Serialization("boom".to_string()))
        }
    }

    fn context() -> OutboundMessageContext {
        OutboundMessageContext::new(SamlMessage::response("https://idp.example.com"))
            .with_entities("https://idp.example.com", "https://sp.example.com")
    }

    fn builder(store: Arc<InMemoryArtifactStore>) -> ArtifactBuilder {
        ArtifactBuilder::from_config(&BindingConfig::default(), store)
    }

    #[test]
    fn source_id_is_sha1_of_entity_id() {
        // SHA-1("abc")
        let expected = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
            0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        assert_eq!(Type0004ArtifactBuilder::source_id("abc"), expected);
    }

    #[test]
    fn type_0004_handles_are_random() {
        let builder = Type0004ArtifactBuilder::new(3);
        let ctx = context();
        let a = builder.build(&ctx).unwrap();
        let b = builder.build(&ctx).unwrap();
        assert_eq!(a.endpoint_index(), 3);
        assert_eq!(a.source_id(), b.source_id());
        assert_ne!(a.message_handle(), b.message_handle());
    }

    #[test]
    fn type_0004_requires_an_issuer() {
        let ctx = OutboundMessageContext::new(SamlMessage::new(
            crate::types::MessageKind::StatusResponse,
            "Response",
        ));
        let err = Type0004ArtifactBuilder::default().build(&ctx).unwrap_err();
        assert!(matches!(err, BindingError::ArtifactConstruction(_)));
    }

    #[test]
    fn registry_defaults() {
        let registry = ArtifactBuilderRegistry::with_defaults(0);
        assert_eq!(registry.type_codes(), vec![ArtifactTypeCode::TYPE_0004]);
        assert!(registry.get(ArtifactTypeCode::from_u16(5)).is_none());
    }

    #[test]
    fn build_artifact_stores_message() {
        let store = Arc::new(InMemoryArtifactStore::default());
        let mut ctx = context();
        let artifact = builder(store.clone()).build_artifact(&mut ctx).unwrap();

        assert_eq!(ctx.artifact_type, Some(ArtifactTypeCode::TYPE_0004));
        let record = store.get(&artifact.base64_encode()).unwrap().unwrap();
        assert_eq!(record.issuer.as_deref(), Some("https://idp.example.com"));
        assert_eq!(record.relying_party.as_deref(), Some("https://sp.example.com"));
        assert!(String::from_utf8_lossy(&record.message).starts_with("<samlp:Response "));
    }

    #[test]
    fn unknown_type_fails_before_store() {
        let store = Arc::new(InMemoryArtifactStore::default());
        let mut ctx = context().with_artifact_type(ArtifactTypeCode::from_u16(0x0009));
        let err = builder(store.clone()).build_artifact(&mut ctx).unwrap_err();

        assert!(matches!(err, BindingError::ArtifactConstruction(_)));
        assert_eq!(ctx.artifact_type, Some(ArtifactTypeCode::from_u16(0x0009)));
        assert!(store.is_empty());
    }

    #[test]
    fn serializer_failure_fails_before_store() {
        let store = Arc::new(InMemoryArtifactStore::default());
        let builder = ArtifactBuilder::new(
            Arc::new(ArtifactBuilderRegistry::with_defaults(0)),
            Arc::new(FailingSerializer),
            store.clone(),
            ArtifactTypeCode::TYPE_0004,
        );
        let err = builder.build_artifact(&mut context()).unwrap_err();

        assert!(matches!(err, BindingError::Serialization(_)));
        assert!(store.is_empty());
    }
}
