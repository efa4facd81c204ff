//! Container logistics tools: moving items between the companion and its
//! tagged containers.

use serde_json::Value;

use crate::blockmind::continuation::ASYNC_TASK;
use crate::blockmind::recipes::materials::{gather_source, is_raw_material, GatherSource};
use crate::blockmind::task_engine::Task;
use crate::blockmind::tasks::{
    ChopTreesTask, GatherBlocksTask, MineOresTask, TransferMode, TransferTask,
};
use crate::blockmind::tool_protocol::{
    arg_count, arg_i32, arg_str, opt_arg_str, CompanionTool, ToolInvocation, ToolMetadata,
    ToolParameter, ToolParameterType,
};
use crate::blockmind::world::{BlockPos, ItemId, ItemStack};

pub struct TransferItemsTool;

impl CompanionTool for TransferItemsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "transfer_items",
            "Deposit inventory into STORAGE containers, or withdraw an item from them.",
        )
        .with_parameter(
            ToolParameter::new("direction", ToolParameterType::String)
                .with_enum(&["deposit", "withdraw"])
                .required(),
        )
        .with_parameter(
            ToolParameter::new("item", ToolParameterType::String)
                .with_description("Item id; required for withdraw, narrows deposit."),
        )
        .with_parameter(
            ToolParameter::new("count", ToolParameterType::Integer)
                .with_description("How many to withdraw (default 1)."),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let direction = match arg_str(args, "direction") {
            Ok(direction) => direction,
            Err(e) => return format!("Error: {}", e),
        };
        let mode = match direction {
            "deposit" => TransferMode::Deposit {
                item: opt_arg_str(args, "item").map(ItemId::new),
            },
            "withdraw" => {
                let item = match arg_str(args, "item") {
                    Ok(item) => ItemId::new(item),
                    Err(e) => return format!("Error: {}", e),
                };
                let count = match arg_count(args, "count", 1) {
                    Ok(count) => count,
                    Err(e) => return format!("Error: {}", e),
                };
                TransferMode::Fetch { item, count }
            }
            other => return format!("Error: direction must be deposit or withdraw, not '{}'.", other),
        };
        let task = TransferTask::new(mode, inv.config.ranges.reach_distance);
        let description = task.description();
        inv.companion.interacting_with_owner = false;
        inv.engine.queue_task(Box::new(task), None);
        format!("{} Queued: {}", ASYNC_TASK, description)
    }
}

pub struct InteractContainerTool;

impl CompanionTool for InteractContainerTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "interact_container",
            "Take items from or put items into a specific container block.",
        )
        .with_parameter(ToolParameter::new("x", ToolParameterType::Integer).required())
        .with_parameter(ToolParameter::new("y", ToolParameterType::Integer).required())
        .with_parameter(ToolParameter::new("z", ToolParameterType::Integer).required())
        .with_parameter(
            ToolParameter::new("action", ToolParameterType::String)
                .with_enum(&["take", "put"])
                .required(),
        )
        .with_parameter(
            ToolParameter::new("item", ToolParameterType::String)
                .with_description("Item id to move.")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("count", ToolParameterType::Integer)
                .with_description("How many to move (default 1)."),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let (x, y, z) = match (
            arg_i32(args, "x", 0),
            arg_i32(args, "y", 0),
            arg_i32(args, "z", 0),
        ) {
            (Ok(x), Ok(y), Ok(z)) => (x, y, z),
            _ => return "Error: container position must be integer x/y/z.".to_string(),
        };
        let pos = BlockPos::new(x, y, z);
        let action = match arg_str(args, "action") {
            Ok(action) => action,
            Err(e) => return format!("Error: {}", e),
        };
        let item = match arg_str(args, "item") {
            Ok(item) => ItemId::new(item),
            Err(e) => return format!("Error: {}", e),
        };
        let count = match arg_count(args, "count", 1) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };

        let reach = inv.config.ranges.reach_distance;
        if !inv.world.is_in_reach(inv.companion.id, pos, reach) {
            // Too far to reach this tick; walk there as a task instead.
            let mode = match action {
                "take" => TransferMode::Fetch {
                    item: item.clone(),
                    count,
                },
                "put" => TransferMode::Deposit { item: Some(item.clone()) },
                other => return format!("Error: action must be take or put, not '{}'.", other),
            };
            let task = TransferTask::new(mode, reach).with_target(pos);
            let description = task.description();
            inv.companion.interacting_with_owner = false;
            inv.engine.queue_task(Box::new(task), None);
            return format!("{} Queued: {}", ASYNC_TASK, description);
        }

        match action {
            "take" => {
                let wanted = item.clone();
                let pulled = inv
                    .world
                    .extract_from_container(pos, &|id| id == &wanted, count);
                let got: u32 = pulled.iter().map(|s| s.count).sum();
                for stack in pulled {
                    let _ = inv.companion.inventory.insert(stack);
                }
                if got == 0 {
                    format!("No {} in that container.", item.path())
                } else {
                    format!("Took {} x{} from {}.", item.path(), got, pos)
                }
            }
            "put" => {
                let have = inv.companion.inventory.count_of(&item);
                let moving = have.min(count);
                if moving == 0 {
                    return format!("I'm not carrying any {}.", item.path());
                }
                inv.companion.inventory.remove(&item, moving);
                let remainder = inv
                    .world
                    .insert_into_container(pos, ItemStack::new(item.clone(), moving));
                let stored = moving - remainder.as_ref().map(|r| r.count).unwrap_or(0);
                if let Some(rest) = remainder {
                    let _ = inv.companion.inventory.insert(rest);
                }
                format!("Put {} x{} into {}.", item.path(), stored, pos)
            }
            other => format!("Error: action must be take or put, not '{}'.", other),
        }
    }
}

pub struct FindAndFetchItemTool;

impl CompanionTool for FindAndFetchItemTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "find_and_fetch_item",
            "Get hold of an item: checks the inventory, then tagged containers, then gathers it.",
        )
        .with_parameter(
            ToolParameter::new("item", ToolParameterType::String)
                .with_description("Item id to obtain.")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("count", ToolParameterType::Integer)
                .with_description("How many are needed (default 1)."),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let item = match arg_str(args, "item") {
            Ok(item) => ItemId::new(item),
            Err(e) => return format!("Error: {}", e),
        };
        let count = match arg_count(args, "count", 1) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };

        let have = inv.companion.inventory.count_of(&item);
        if have >= count {
            return format!("I already have {} x{}.", item.path(), have);
        }
        let missing = count - have;
        let reach = inv.config.ranges.reach_distance;
        let radius = inv.config.ranges.scan_radius;

        let has_containers = !inv.companion.tagged_blocks.is_empty();
        if has_containers {
            let task = TransferTask::new(
                TransferMode::Fetch {
                    item: item.clone(),
                    count: missing,
                },
                reach,
            );
            let description = task.description();
            inv.companion.interacting_with_owner = false;
            inv.engine.queue_task(Box::new(task), None);
            return format!("{} Queued: {}", ASYNC_TASK, description);
        }

        // No tagged containers at all: go gather it, when that makes sense.
        if is_raw_material(&item) {
            let task: Box<dyn crate::blockmind::task_engine::Task> = match gather_source(&item) {
                GatherSource::ChopTrees => Box::new(ChopTreesTask::new(
                    missing,
                    inv.config.ranges.chop_radius,
                    reach,
                )),
                GatherSource::MineOres | GatherSource::StripMine => {
                    Box::new(MineOresTask::new(&item, missing, radius, reach))
                }
                _ => Box::new(GatherBlocksTask::new(item.clone(), missing, radius, reach)),
            };
            let description = task.description();
            inv.companion.interacting_with_owner = false;
            inv.engine.queue_task(task, None);
            return format!("{} Queued: {}", ASYNC_TASK, description);
        }

        format!(
            "I don't have {} and no storage is tagged; try craft_item for it instead.",
            item.path()
        )
    }
}
