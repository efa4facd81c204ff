//! The registered tool set.
//!
//! `register_default_tools` installs the minimum set the crafting planner
//! needs end-to-end; embedders may register more.  Tools live in four groups:
//! crafting (the planner surface), gathering (world tasks), logistics
//! (container routing), and info (read-only plus memory/emote).

pub mod crafting;
pub mod gathering;
pub mod info;
pub mod logistics;

use std::sync::Arc;

use crate::blockmind::tool_protocol::ToolRegistry;

/// Build a registry with every built-in tool installed.
pub fn register_default_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(crafting::CraftItemTool));
    registry.register(Arc::new(crafting::SmeltItemsTool));
    registry.register(Arc::new(crafting::GetRecipeTool));
    registry.register(Arc::new(gathering::ChopTreesTool));
    registry.register(Arc::new(gathering::MineOresTool));
    registry.register(Arc::new(gathering::StripMineTool));
    registry.register(Arc::new(gathering::GatherBlocksTool));
    registry.register(Arc::new(gathering::FarmAreaTool));
    registry.register(Arc::new(logistics::TransferItemsTool));
    registry.register(Arc::new(logistics::InteractContainerTool));
    registry.register(Arc::new(logistics::FindAndFetchItemTool));
    registry.register(Arc::new(info::GetInventoryTool));
    registry.register(Arc::new(info::ScanSurroundingsTool));
    registry.register(Arc::new(info::TaskStatusTool));
    registry.register(Arc::new(info::MemoryTool));
    registry.register(Arc::new(info::EmoteTool));
    registry
}
