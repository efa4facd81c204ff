// src/lib.rs

// Import the top-level `blockmind` module.
pub mod blockmind;

// Re-export the submodules at the crate root so downstream code (and the
// integration tests) can write `blockmind::world::BlockPos` instead of
// navigating the whole hierarchy.
pub use blockmind::{
    chat, clients, companion, config, continuation, dispatcher, persistence, provider, recipes,
    server, task_engine, tasks, tool_protocol, tools, world,
};

// And the most commonly used items one level higher still.
pub use blockmind::companion::{BehaviorMode, Companion, HomeArea, OwnerId, TagRole, TaggedBlock};
pub use blockmind::config::Configuration;
pub use blockmind::dispatcher::Dispatcher;
pub use blockmind::recipes::resolver::RecipeResolver;
pub use blockmind::recipes::RecipeIndex;
pub use blockmind::server::{ServerBridge, ServerState};
pub use blockmind::task_engine::{Task, TaskEngine, TaskStatus};
pub use blockmind::world::{BlockPos, BlockState, ItemId, ItemStack, WorldAdapter};
