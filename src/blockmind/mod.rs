//! Blockmind: the companion-agent core.
//!
//! The crate composes three tightly coupled subsystems:
//!
//! - An **LLM dispatch layer** ([`dispatcher`]) that drives a multi-provider
//!   fallback chain, a tool-call agent loop with a deduplication breaker, and
//!   the continuation plumbing that bridges long-running world tasks back into
//!   the conversation.
//! - A **task engine** ([`task_engine`], [`tasks`]) that runs one tick-driven
//!   state machine at a time per companion, with arrival gating, chunk
//!   keep-alive, and deterministic continuation firing.
//! - A **recipe resolver and crafting planner** ([`recipes`]) that turns any
//!   target item into raw-material leaves plus ordered gather/smelt/craft
//!   steps.
//!
//! Everything that touches the voxel engine goes through the abstract
//! [`world::WorldAdapter`] capability surface, so the core stays engine
//! agnostic and fully mockable in tests.

pub mod chat;
pub mod clients;
pub mod companion;
pub mod config;
pub mod continuation;
pub mod dispatcher;
pub mod persistence;
pub mod provider;
pub mod recipes;
pub mod server;
pub mod task_engine;
pub mod tasks;
pub mod tool_protocol;
pub mod tools;
pub mod world;
