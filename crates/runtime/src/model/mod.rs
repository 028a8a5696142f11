//! Conversation types and the inference backend trait.

pub mod errors;
mod stream;
pub mod types;

pub use errors::ModelError;
pub use stream::StreamAccumulator;
pub use types::{
    Backend, Conversation, Fragment, FragmentStream, Message, ModelRequest, Role, ToolCall,
    ToolDescriptor,
};
