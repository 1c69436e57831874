//! SAML 2.0 HTTP-POST and HTTP-Artifact bindings.
//!
//! This crate turns outbound SAML messages into HTTP responses and picks
//! apart inbound ones:
//!
//! - **HTTP-POST encoding** - auto-submitting HTML forms rendered from
//!   templates, with every untrusted value escaped for its attribute
//! - **HTTP-Artifact encoding** - artifacts delivered by redirect or form,
//!   with the referenced message handed to an artifact store
//! - **Binding selection** - inbound requests matched to a binding and its
//!   security policy rules
//!
//! # Architecture
//!
//! - [`types`] - messages, message context and HTTP transports
//! - [`encoding`] - HTML attribute escaping, Base64 and URL helpers
//! - [`template`] - template renderer boundary (Handlebars)
//! - [`artifact`] - artifact values, builders and the artifact store
//! - [`bindings`] - encoders, decoders, security policy and the registry
//! - [`serializer`] / [`signature`] - message serialization and signing
//! - [`config`] - configuration from the environment
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use saml_binding::{BindingConfig, BindingRegistry, HandlebarsRenderer, InMemoryArtifactStore};
//!
//! let config = BindingConfig::from_env()?;
//! let renderer = Arc::new(HandlebarsRenderer::from_config(&config)?);
//! let store = Arc::new(InMemoryArtifactStore::from_config(&config));
//! let registry = BindingRegistry::from_config(&config, renderer, store);
//!
//! let mut response = HttpResponse::new();
//! registry.encode(&mut context, &mut response)?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod artifact;
pub mod bindings;
pub mod config;
pub mod encoding;
pub mod error;
pub mod serializer;
pub mod signature;
pub mod template;
pub mod types;

pub use artifact::{
    ArtifactBuilder, ArtifactBuilderRegistry, ArtifactRecord, ArtifactStore, ArtifactTypeCode,
    InMemoryArtifactStore, SamlArtifact,
};
pub use bindings::{
    BindingDescriptor, BindingRegistry, HttpArtifactBinding, HttpArtifactEncoder, HttpPostBinding,
    HttpPostEncoder, InboundMessage, MessageDecoder, MessageEncoder, TrustContext,
};
pub use config::BindingConfig;
pub use error::{BindingError, BindingResult};
pub use template::{HandlebarsRenderer, RenderContext, RenderError, TemplateRenderer};
pub use types::*;
