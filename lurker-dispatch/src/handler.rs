//! Protocol handler trait

use lurker_core::Result;
use lurker_packet::DecodedFrame;

use crate::action::SpoofAction;
use crate::context::DispatchContext;

/// What a handler wants done after seeing a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResult {
    /// Nothing to inject
    Continue,
    /// Inject the described frame
    EmitSpoof(SpoofAction),
}

/// A protocol handler run for every captured frame
///
/// Handlers run in registration order on the dispatch thread. Each one
/// decides for itself whether a frame concerns it; an error or a panic is
/// confined to that handler and that frame. Cross-frame state belongs in
/// [`DispatchContext`] or behind the handler's own interior mutability.
pub trait Handler: Send {
    /// Unique name used for registration and logging
    fn name(&self) -> &'static str;

    fn handle(&self, frame: &DecodedFrame<'_>, ctx: &mut DispatchContext) -> Result<HandlerResult>;

    /// Called once when the dispatch loop exits
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
