//! BotBrawl LLM - Completion provider abstraction
//!
//! Agents, judges and recap writers all talk to models through the
//! [`CompletionProvider`] trait:
//!
//! - [`OpenAiCompatProvider`]: any OpenAI-compatible chat completions endpoint
//! - [`ScriptedProvider`]: deterministic substring-driven replies for tests
//!   and offline runs
//!
//! Model output is never trusted: callers parse and validate it, and fall
//! back to neutral results when it is unusable.

pub mod providers;
pub mod types;

pub use providers::*;
pub use types::*;
