//! Concrete provider clients.
//!
//! `openai_compat` speaks the OpenAI chat-completions wire format used by
//! both cloud providers; `local` speaks the local chat API (`/api/chat`).
//! `common` holds the shared pooled HTTP client and the wire helpers both
//! implementations build on.

pub mod common;
pub mod local;
pub mod openai_compat;

pub use local::LocalChatClient;
pub use openai_compat::OpenAiCompatClient;
