//! HTTP transport abstractions.
//!
//! Encoders write to an [`OutTransport`] and decoders read from an
//! [`InTransport`]. Only HTTP transports are supported by the front-channel
//! bindings; anything else is rejected as an unsupported context.

use std::collections::HashMap;
use std::io::Write;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{BindingError, BindingResult};

// ============================================================================
// Outbound
// ============================================================================

/// Outbound message transport.
pub trait OutTransport: Send {
    /// Returns the HTTP view of this transport, if it is one.
    fn as_http(&mut self) -> Option<&mut dyn HttpOutTransport>;

    /// Returns true if this is an HTTP transport.
    fn is_http(&self) -> bool;
}

/// Outbound HTTP response under construction.
pub trait HttpOutTransport: Send {
    /// Sets the character encoding of the body.
    fn set_character_encoding(&mut self, encoding: &str);

    /// Returns the character encoding of the body.
    fn character_encoding(&self) -> Option<&str>;

    /// Sets a response header, replacing any previous value.
    fn set_header(&mut self, name: &str, value: &str) -> BindingResult<()>;

    /// Sets the content type, adding the character encoding if one is set.
    fn set_content_type(&mut self, content_type: &str) -> BindingResult<()> {
        let value = match self.character_encoding() {
            Some(charset) => format!("{content_type}; charset={charset}"),
            None => content_type.to_string(),
        };
        self.set_header(header::CONTENT_TYPE.as_str(), &value)
    }

    /// Turns the response into a redirect to `location`.
    fn send_redirect(&mut self, location: &str) -> BindingResult<()>;

    /// Returns the body stream.
    fn outgoing_stream(&mut self) -> &mut dyn Write;
}

/// Buffered HTTP response.
///
/// Collects status, headers and body so a web framework can send them;
/// converts into an axum [`Response`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    character_encoding: Option<String>,
    body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    /// Creates an empty `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            character_encoding: None,
            body: Vec::new(),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the redirect target, if this is a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        if self.status.is_redirection() {
            self.header(header::LOCATION.as_str())
        } else {
            None
        }
    }

    /// Returns the body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl OutTransport for HttpResponse {
    fn as_http(&mut self) -> Option<&mut dyn HttpOutTransport> {
        Some(self)
    }

    fn is_http(&self) -> bool {
        true
    }
}

impl HttpOutTransport for HttpResponse {
    fn set_character_encoding(&mut self, encoding: &str) {
        self.character_encoding = Some(encoding.to_string());
    }

    fn character_encoding(&self) -> Option<&str> {
        self.character_encoding.as_deref()
    }

    fn set_header(&mut self, name: &str, value: &str) -> BindingResult<()> {
        let name = HeaderName::try_from(name)
            .map_err(|e| BindingError::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BindingError::InvalidRequest(format!("invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn send_redirect(&mut self, location: &str) -> BindingResult<()> {
        self.set_header(header::LOCATION.as_str(), location)?;
        self.status = StatusCode::FOUND;
        self.body.clear();
        Ok(())
    }

    fn outgoing_stream(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Inbound message transport.
pub trait InTransport: Send + Sync {
    /// Returns the HTTP view of this transport, if it is one.
    fn as_http(&self) -> Option<&dyn HttpInTransport>;
}

/// Inbound HTTP request.
pub trait HttpInTransport: Send + Sync {
    /// Returns the request method.
    fn method(&self) -> &Method;

    /// Returns the first value of a query or form parameter.
    fn parameter(&self, name: &str) -> Option<&str>;
}

/// Parsed inbound HTTP request: method plus query and form parameters.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    parameters: HashMap<String, String>,
}

impl HttpRequest {
    /// Creates a request with no parameters.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            parameters: HashMap::new(),
        }
    }

    /// Adds a parameter. The first value for a name wins.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Builds a request from a raw query string and an optional
    /// `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn from_parts(method: Method, query: Option<&str>, form_body: Option<&[u8]>) -> Self {
        let mut request = Self::new(method);
        let query_pairs = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()))
            .into_iter()
            .flatten();
        let form_pairs = form_body
            .map(url::form_urlencoded::parse)
            .into_iter()
            .flatten();
        for (name, value) in query_pairs.chain(form_pairs) {
            request
                .parameters
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        request
    }
}

impl InTransport for HttpRequest {
    fn as_http(&self) -> Option<&dyn HttpInTransport> {
        Some(self)
    }
}

impl HttpInTransport for HttpRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}
