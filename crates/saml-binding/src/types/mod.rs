//! SAML message, context and transport types.
//!
//! This module contains the types the binding encoders and decoders operate
//! on: outbound messages, the per-request message context, and the HTTP
//! transport abstractions.

mod constants;
mod context;
mod message;
mod transport;

pub use constants::*;
pub use context::*;
pub use message::*;
pub use transport::*;
