//! Message serialization.
//!
//! Turns an outbound [`SamlMessage`] into the UTF-8 XML bytes that are
//! Base64-encoded into a form or stored behind an artifact.

use chrono::SecondsFormat;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{BindingError, BindingResult};
use crate::types::{MessageKind, SamlMessage, SAMLP_NS, SAML_NS};

/// Serializes messages to their transport form.
pub trait MessageSerializer: Send + Sync {
    /// Serializes `message` to bytes.
    fn serialize(&self, message: &SamlMessage) -> BindingResult<Vec<u8>>;
}

/// Serializes messages as SAML 2.0 XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMessageSerializer;

impl XmlMessageSerializer {
    /// Creates a serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serializes `message` and returns it as a string.
    pub fn to_xml(&self, message: &SamlMessage) -> BindingResult<String> {
        let bytes = self.serialize(message)?;
        String::from_utf8(bytes).map_err(|e| BindingError::Serialization(e.to_string()))
    }
}

fn xml_error(err: impl std::fmt::Display) -> BindingError {
    BindingError::Serialization(err.to_string())
}

impl MessageSerializer for XmlMessageSerializer {
    fn serialize(&self, message: &SamlMessage) -> BindingResult<Vec<u8>> {
        if message.element.is_empty() || message.id.is_empty() {
            return Err(BindingError::Serialization(
                "message element name and ID are required".to_string(),
            ));
        }

        let prefix = match message.kind {
            MessageKind::Other => "saml",
            MessageKind::Request | MessageKind::StatusResponse => "samlp",
        };
        let root_name = format!("{prefix}:{}", message.element);
        let issue_instant = message
            .issue_instant
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut root = BytesStart::new(root_name.as_str());
        if prefix == "samlp" {
            root.push_attribute(("xmlns:samlp", SAMLP_NS));
        }
        root.push_attribute(("xmlns:saml", SAML_NS));
        root.push_attribute(("ID", message.id.as_str()));
        root.push_attribute(("Version", message.version.as_str()));
        root.push_attribute(("IssueInstant", issue_instant.as_str()));
        if let Some(destination) = &message.destination {
            root.push_attribute(("Destination", destination.as_str()));
        }
        if let Some(in_response_to) = &message.in_response_to {
            root.push_attribute(("InResponseTo", in_response_to.as_str()));
        }

        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Start(root)).map_err(xml_error)?;

        if let Some(issuer) = &message.issuer {
            writer
                .write_event(Event::Start(BytesStart::new("saml:Issuer")))
                .map_err(xml_error)?;
            writer
                .write_event(Event::Text(BytesText::new(issuer)))
                .map_err(xml_error)?;
            writer
                .write_event(Event::End(BytesEnd::new("saml:Issuer")))
                .map_err(xml_error)?;
        }

        if message.kind == MessageKind::StatusResponse {
            if let Some(code) = &message.status_code {
                writer
                    .write_event(Event::Start(BytesStart::new("samlp:Status")))
                    .map_err(xml_error)?;
                let mut status_code = BytesStart::new("samlp:StatusCode");
                status_code.push_attribute(("Value", code.as_str()));
                writer
                    .write_event(Event::Empty(status_code))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new("samlp:Status")))
                    .map_err(xml_error)?;
            }
        }

        if let Some(content) = &message.content {
            writer
                .write_event(Event::Text(BytesText::from_escaped(content.as_str())))
                .map_err(xml_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(root_name.as_str())))
            .map_err(xml_error)?;

        Ok(writer.into_inner())
    }
}
