//! Provider-agnostic request/response types.

mod completion;
mod message;
mod tier;
mod tool;

pub use completion::{CompletionRequest, CompletionResponse, FinishReason, Usage};
pub use message::{Message, Role};
pub use tier::ProviderTier;
pub use tool::{ToolInvocation, ToolSpec};
