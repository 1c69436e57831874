//! Template rendering for HTML-form bindings.
//!
//! The encoders hand a [`RenderContext`] to a [`TemplateRenderer`], which
//! writes the rendered page to the response stream. Values placed in the
//! context are escaped when they are inserted, so renderers must not escape
//! them a second time.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use handlebars::Handlebars;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::config::BindingConfig;
use crate::encoding::escape_for_html_attribute;

/// Template ID of the built-in HTTP-POST form.
pub const POST_BINDING_TEMPLATE: &str = "saml2-post-binding";

/// Template ID of the built-in HTTP-Artifact POST form.
pub const POST_ARTIFACT_BINDING_TEMPLATE: &str = "saml2-post-artifact-binding";

const POST_BINDING_SOURCE: &str = include_str!("../templates/saml2-post-binding.hbs");
const POST_ARTIFACT_BINDING_SOURCE: &str =
    include_str!("../templates/saml2-post-artifact-binding.hbs");

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No template is registered under the requested ID.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// The template source could not be compiled.
    #[error("template error: {0}")]
    Template(String),

    /// The template failed while rendering.
    #[error("render error: {0}")]
    Render(String),

    /// Writing to the output stream failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Variables passed to a template.
///
/// Untrusted values go through [`RenderContext::insert_escaped`]; only values
/// built from internal data (binding URIs, Base64 payloads) may use
/// [`RenderContext::insert_trusted`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderContext {
    variables: BTreeMap<String, String>,
}

impl RenderContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value after HTML-attribute escaping it.
    ///
    /// Returns the escaped form.
    pub fn insert_escaped(&mut self, name: impl Into<String>, raw: &str) -> &str {
        let name = name.into();
        self.variables
            .insert(name.clone(), escape_for_html_attribute(raw));
        self.variables.get(&name).map_or("", String::as_str)
    }

    /// Inserts a value verbatim.
    pub fn insert_trusted(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Gets a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Returns true if the variable is set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns true if no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterates over the variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Renders a named template to an output stream.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template_id` with `variables` into `out`.
    fn render(
        &self,
        template_id: &str,
        variables: &RenderContext,
        out: &mut dyn Write,
    ) -> Result<(), RenderError>;
}

/// Handlebars-backed renderer.
///
/// HTML escaping is switched off: every value in a [`RenderContext`] is
/// already escaped for its attribute context.
pub struct HandlebarsRenderer {
    registry: RwLock<Handlebars<'static>>,
}

impl HandlebarsRenderer {
    /// Creates a renderer with the built-in binding templates registered.
    pub fn new() -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(POST_BINDING_TEMPLATE, POST_BINDING_SOURCE)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        registry
            .register_template_string(POST_ARTIFACT_BINDING_TEMPLATE, POST_ARTIFACT_BINDING_SOURCE)
            .map_err(|e| RenderError::Template(e.to_string()))?;

        Ok(Self {
            registry: RwLock::new(registry),
        })
    }

    /// Creates a renderer and loads overrides from the configured template
    /// directory, if any.
    pub fn from_config(config: &BindingConfig) -> Result<Self, RenderError> {
        let renderer = Self::new()?;
        if let Some(dir) = &config.template_dir {
            let loaded = renderer.register_templates_dir(dir)?;
            tracing::debug!("Loaded {} template(s) from {}", loaded, dir.display());
        }
        Ok(renderer)
    }

    /// Registers (or replaces) a template from source.
    pub fn register_template(&self, template_id: &str, source: &str) -> Result<(), RenderError> {
        self.registry
            .write()
            .register_template_string(template_id, source)
            .map_err(|e| RenderError::Template(format!("{template_id}: {e}")))
    }

    /// Registers (or replaces) a template from a file.
    pub fn register_template_file(
        &self,
        template_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), RenderError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        self.register_template(template_id, &source)
    }

    /// Registers every `*.hbs` file in a directory, keyed by file stem.
    ///
    /// Returns the number of templates loaded.
    pub fn register_templates_dir(&self, dir: impl AsRef<Path>) -> Result<usize, RenderError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("hbs") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            self.register_template_file(stem, &path)?;
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Returns true if a template is registered under `template_id`.
    #[must_use]
    pub fn has_template(&self, template_id: &str) -> bool {
        self.registry.read().has_template(template_id)
    }
}

impl std::fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        let mut names: Vec<_> = registry.get_templates().keys().cloned().collect();
        names.sort();
        f.debug_struct("HandlebarsRenderer")
            .field("templates", &names)
            .finish()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(
        &self,
        template_id: &str,
        variables: &RenderContext,
        out: &mut dyn Write,
    ) -> Result<(), RenderError> {
        let page = {
            let registry = self.registry.read();
            if !registry.has_template(template_id) {
                return Err(RenderError::UnknownTemplate(template_id.to_string()));
            }
            registry
                .render(template_id, variables)
                .map_err(|e| RenderError::Render(e.to_string()))?
        };
        // The registry lock is released before touching the caller's sink.
        out.write_all(page.as_bytes())?;
        Ok(())
    }
}
