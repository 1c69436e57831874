//! Outbound message signing.
//!
//! Signing itself lives outside this crate; encoders call a
//! [`MessageSigner`] between setting the destination and serializing, so
//! whatever the signer does is covered by the serialized payload.

use crate::error::BindingResult;
use crate::types::OutboundMessageContext;

/// Signs the outbound message of a context in place.
pub trait MessageSigner: Send + Sync {
    /// Signs `context.message`, or leaves it untouched if no signature is
    /// required for this exchange.
    fn sign(&self, context: &mut OutboundMessageContext) -> BindingResult<()>;
}

/// Signer that never signs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl MessageSigner for NoopSigner {
    fn sign(&self, _context: &mut OutboundMessageContext) -> BindingResult<()> {
        Ok(())
    }
}
