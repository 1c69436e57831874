//! Common test utilities and fixtures.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use saml_binding::bindings::{DetachedSignature, TrustEngine};
use saml_binding::{
    BindingConfig, BindingRegistry, BindingResult, Endpoint, HandlebarsRenderer, HttpOutTransport,
    InMemoryArtifactStore, OutTransport, OutboundMessageContext, RenderContext, RenderError,
    SamlBinding, SamlMessage, TemplateRenderer,
};

pub const IDP_ENTITY_ID: &str = "https://idp.example.com";
pub const SP_ENTITY_ID: &str = "https://sp.example.com";

/// Test environment wiring a registry to an in-memory store.
pub struct TestEnv {
    /// Configuration the registry was built from.
    pub config: BindingConfig,
    /// Artifact store shared with the artifact encoder.
    pub store: Arc<InMemoryArtifactStore>,
    /// Registry with the POST and Artifact bindings.
    pub registry: BindingRegistry,
}

impl TestEnv {
    /// Creates an environment from the default configuration.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(BindingConfig::default())
    }

    /// Creates an environment from `config`.
    pub fn with_config(config: BindingConfig) -> anyhow::Result<Self> {
        init_tracing();
        let renderer = Arc::new(HandlebarsRenderer::from_config(&config)?);
        let store = Arc::new(InMemoryArtifactStore::from_config(&config));
        let registry = BindingRegistry::from_config(&config, renderer, store.clone());
        Ok(Self {
            config,
            store,
            registry,
        })
    }
}

/// Initializes tracing output for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("saml_binding=debug")
        .with_test_writer()
        .try_init();
}

/// Runs `f` with a subscriber that records formatted log lines, returning
/// its result and the captured output.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = LogBuffer(Arc::clone(&buffer));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("saml_binding=debug")
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.lock()).into_owned();
    (result, logs)
}

#[derive(Clone)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A successful Response from the IdP to the SP, addressed via `binding`.
pub fn response_context(binding: SamlBinding, location: &str) -> OutboundMessageContext {
    OutboundMessageContext::new(SamlMessage::response(IDP_ENTITY_ID).in_response_to("_req1"))
        .with_endpoint(Endpoint::new(binding, location))
        .with_entities(IDP_ENTITY_ID, SP_ENTITY_ID)
}

/// Transport that is not HTTP.
#[derive(Debug, Default)]
pub struct SoapTransport;

impl OutTransport for SoapTransport {
    fn as_http(&mut self) -> Option<&mut dyn HttpOutTransport> {
        None
    }

    fn is_http(&self) -> bool {
        false
    }
}

/// Renderer that records the variables it was given and writes nothing.
#[derive(Debug, Default)]
pub struct CapturingRenderer {
    pub calls: Mutex<Vec<(String, RenderContext)>>,
}

impl CapturingRenderer {
    /// Returns the variables of the last render call.
    pub fn last(&self) -> Option<(String, RenderContext)> {
        self.calls.lock().last().cloned()
    }
}

impl TemplateRenderer for CapturingRenderer {
    fn render(
        &self,
        template_id: &str,
        variables: &RenderContext,
        _out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        self.calls
            .lock()
            .push((template_id.to_string(), variables.clone()));
        Ok(())
    }
}

/// Renderer that always fails.
#[derive(Debug, Default)]
pub struct FailingRenderer;

impl TemplateRenderer for FailingRenderer {
    fn render(
        &self,
        _template_id: &str,
        _variables: &RenderContext,
        _out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        Err(RenderError::Render("template exploded".to_string()))
    }
}

/// Trust engine with a fixed verdict.
#[derive(Debug)]
pub struct StaticTrustEngine {
    pub accept: bool,
}

impl TrustEngine for StaticTrustEngine {
    fn validate_detached(&self, _signature: &DetachedSignature) -> BindingResult<bool> {
        Ok(self.accept)
    }

    fn validate_enveloped(&self, _xml: &str) -> BindingResult<bool> {
        Ok(self.accept)
    }
}
