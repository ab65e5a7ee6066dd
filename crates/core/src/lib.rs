//! # memloop Core
//!
//! Domain types, traits, and error definitions for the memloop agent runtime.
//! This crate has **no framework dependencies**: it defines the model that
//! every other crate implements against.
//!
//! The two external collaborators of the agent loop live here as traits:
//! [`Provider`] (the inference service) and [`CapabilityProvider`] (the
//! session that lists and invokes tools).

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ContentBlock, Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDescriptor, Usage};
pub use tool::{CapabilityProvider, Tool, ToolOutput, ToolRegistry};
