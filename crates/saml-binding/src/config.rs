//! Binding configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactTypeCode;
use crate::error::{BindingError, BindingResult};
use crate::template::{POST_ARTIFACT_BINDING_TEMPLATE, POST_BINDING_TEMPLATE};

/// Configuration for the POST and Artifact binding encoders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Template used by the HTTP-POST encoder.
    pub post_template: String,

    /// Template used by the HTTP-Artifact encoder in POST mode.
    pub artifact_post_template: String,

    /// Deliver artifacts through an auto-submitting form instead of a redirect.
    pub artifact_post_encoding: bool,

    /// Artifact type code used when the message context does not select one.
    pub default_artifact_type: u16,

    /// Endpoint index written into type 0x0004 artifacts.
    pub artifact_endpoint_index: u16,

    /// Lifetime of stored artifact records in seconds.
    pub artifact_lifetime_secs: u64,

    /// Directory of `*.hbs` files overriding or adding templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            post_template: POST_BINDING_TEMPLATE.to_string(),
            artifact_post_template: POST_ARTIFACT_BINDING_TEMPLATE.to_string(),
            artifact_post_encoding: false,
            default_artifact_type: 0x0004,
            artifact_endpoint_index: 0,
            artifact_lifetime_secs: 300, // 5 minutes
            template_dir: None,
        }
    }
}

impl BindingConfig {
    /// Loads configuration from `SAML_BINDING_*` environment variables.
    ///
    /// A `.env` file is read first if present. Unset variables keep their
    /// defaults; malformed values are rejected.
    pub fn from_env() -> BindingResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BindingResult<Self> {
        let defaults = Self::default();

        let post_template = lookup("SAML_BINDING_POST_TEMPLATE").unwrap_or(defaults.post_template);

        let artifact_post_template = lookup("SAML_BINDING_ARTIFACT_POST_TEMPLATE")
            .unwrap_or(defaults.artifact_post_template);

        let artifact_post_encoding = match lookup("SAML_BINDING_ARTIFACT_POST_ENCODING") {
            Some(v) => parse_bool("SAML_BINDING_ARTIFACT_POST_ENCODING", &v)?,
            None => defaults.artifact_post_encoding,
        };

        let default_artifact_type = match lookup("SAML_BINDING_DEFAULT_ARTIFACT_TYPE") {
            Some(v) => parse_type_code(&v)?,
            None => defaults.default_artifact_type,
        };

        let artifact_endpoint_index = match lookup("SAML_BINDING_ARTIFACT_ENDPOINT_INDEX") {
            Some(v) => parse_number("SAML_BINDING_ARTIFACT_ENDPOINT_INDEX", &v)?,
            None => defaults.artifact_endpoint_index,
        };

        let artifact_lifetime_secs = match lookup("SAML_BINDING_ARTIFACT_LIFETIME") {
            Some(v) => parse_number("SAML_BINDING_ARTIFACT_LIFETIME", &v)?,
            None => defaults.artifact_lifetime_secs,
        };

        let template_dir = lookup("SAML_BINDING_TEMPLATE_DIR").map(PathBuf::from);

        Ok(Self {
            post_template,
            artifact_post_template,
            artifact_post_encoding,
            default_artifact_type,
            artifact_endpoint_index,
            artifact_lifetime_secs,
            template_dir,
        })
    }

    /// Returns the default artifact type code.
    #[must_use]
    pub const fn default_artifact_type_code(&self) -> ArtifactTypeCode {
        ArtifactTypeCode::from_u16(self.default_artifact_type)
    }

    /// Returns the artifact record lifetime.
    #[must_use]
    pub const fn artifact_lifetime(&self) -> Duration {
        Duration::from_secs(self.artifact_lifetime_secs)
    }
}

fn parse_bool(key: &str, value: &str) -> BindingResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(BindingError::Configuration(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> BindingResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BindingError::Configuration(format!("{key}: expected a number, got '{value}'")))
}

/// Accepts `4`, `0004` or `0x0004`.
fn parse_type_code(value: &str) -> BindingResult<u16> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => u16::from_str_radix(trimmed, 16),
    };
    parsed.map_err(|_| {
        BindingError::Configuration(format!(
            "SAML_BINDING_DEFAULT_ARTIFACT_TYPE: invalid type code '{value}'"
        ))
    })
}
