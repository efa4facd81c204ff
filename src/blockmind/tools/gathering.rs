//! World-task tools: each validates its arguments, queues one task on the
//! companion's engine, and returns an `[ASYNC_TASK]` status line.
//!
//! All five accept optional `plan` and `next` arguments so the model (or the
//! failure-continuation strategy text) can chain them into a larger plan:
//! `plan` becomes the continuation's context, `next` its next-steps string.

use serde_json::Value;

use crate::blockmind::continuation::{Continuation, ASYNC_TASK};
use crate::blockmind::task_engine::Task;
use crate::blockmind::tasks::{
    ChopTreesTask, FarmTask, GatherBlocksTask, MineOresTask, StripMineTask,
};
use crate::blockmind::tool_protocol::{
    arg_count, arg_i32, arg_str, opt_arg_str, CompanionTool, ToolInvocation, ToolMetadata,
    ToolParameter, ToolParameterType,
};
use crate::blockmind::world::{Direction, ItemId};

/// Continuation assembled from the optional `plan`/`next` arguments.
fn chained_continuation(args: &Value, inv: &ToolInvocation<'_>) -> Option<Continuation> {
    let plan = opt_arg_str(args, "plan")?;
    let next = opt_arg_str(args, "next").unwrap_or("Report what happened and what you'll do next.");
    Some(Continuation::new(inv.owner, plan, next))
}

fn queue(
    inv: &mut ToolInvocation<'_>,
    task: Box<dyn Task>,
    continuation: Option<Continuation>,
) -> String {
    let description = task.description();
    inv.companion.interacting_with_owner = false;
    inv.engine.queue_task(task, continuation);
    format!("{} Queued: {}", ASYNC_TASK, description)
}

pub struct ChopTreesTool;

impl CompanionTool for ChopTreesTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("chop_trees", "Chop nearby trees for logs.")
            .with_parameter(
                ToolParameter::new("count", ToolParameterType::Integer)
                    .with_description("How many logs to collect (default 8)."),
            )
            .with_parameter(ToolParameter::new("plan", ToolParameterType::String))
            .with_parameter(ToolParameter::new("next", ToolParameterType::String))
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let count = match arg_count(args, "count", 8) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };
        let continuation = chained_continuation(args, inv);
        let task = ChopTreesTask::new(
            count,
            inv.config.ranges.chop_radius,
            inv.config.ranges.reach_distance,
        );
        queue(inv, Box::new(task), continuation)
    }
}

pub struct MineOresTool;

impl CompanionTool for MineOresTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("mine_ores", "Mine exposed ore blocks of one kind nearby.")
            .with_parameter(
                ToolParameter::new("ore", ToolParameterType::String)
                    .with_description("Ore kind, e.g. 'iron', 'iron_ore' or 'raw_iron'.")
                    .required(),
            )
            .with_parameter(
                ToolParameter::new("count", ToolParameterType::Integer)
                    .with_description("How many ore blocks to mine (default 8)."),
            )
            .with_parameter(ToolParameter::new("plan", ToolParameterType::String))
            .with_parameter(ToolParameter::new("next", ToolParameterType::String))
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let ore = match arg_str(args, "ore") {
            Ok(ore) => ItemId::new(ore),
            Err(e) => return format!("Error: {}", e),
        };
        let count = match arg_count(args, "count", 8) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };
        let continuation = chained_continuation(args, inv);
        let task = MineOresTask::new(
            &ore,
            count,
            inv.config.ranges.scan_radius,
            inv.config.ranges.reach_distance,
        );
        queue(inv, Box::new(task), continuation)
    }
}

pub struct StripMineTool;

impl CompanionTool for StripMineTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "strip_mine",
            "Dig a straight two-high tunnel at a target depth to expose ores.",
        )
        .with_parameter(
            ToolParameter::new("ore", ToolParameterType::String)
                .with_description("Ore being hunted; names the mine."),
        )
        .with_parameter(
            ToolParameter::new("target_y", ToolParameterType::Integer)
                .with_description("Tunnel depth (default 12)."),
        )
        .with_parameter(
            ToolParameter::new("direction", ToolParameterType::String)
                .with_enum(&["north", "south", "east", "west"]),
        )
        .with_parameter(
            ToolParameter::new("length", ToolParameterType::Integer)
                .with_description("Tunnel length in blocks."),
        )
        .with_parameter(ToolParameter::new("plan", ToolParameterType::String))
        .with_parameter(ToolParameter::new("next", ToolParameterType::String))
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let ore = opt_arg_str(args, "ore").unwrap_or("stone");
        let target_y = match arg_i32(args, "target_y", 12) {
            Ok(y) => y,
            Err(e) => return format!("Error: {}", e),
        };
        let direction = match opt_arg_str(args, "direction") {
            Some(s) => match Direction::parse(s) {
                Some(d) => d,
                None => return format!("Error: unknown direction '{}'.", s),
            },
            None => Direction::North,
        };
        let length = match arg_count(args, "length", inv.config.ranges.strip_mine_length) {
            Ok(length) => length,
            Err(e) => return format!("Error: {}", e),
        };
        let continuation = chained_continuation(args, inv);
        let mine_name = format!("{} mine #{}", ore, inv.companion.mines.len() + 1);
        let task = StripMineTask::new(
            mine_name,
            target_y,
            direction,
            length,
            inv.config.ranges.reach_distance,
        );
        queue(inv, Box::new(task), continuation)
    }
}

pub struct GatherBlocksTool;

impl CompanionTool for GatherBlocksTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("gather_blocks", "Collect a number of one block kind nearby.")
            .with_parameter(
                ToolParameter::new("block", ToolParameterType::String)
                    .with_description("Block id to collect, e.g. 'cobblestone'.")
                    .required(),
            )
            .with_parameter(
                ToolParameter::new("count", ToolParameterType::Integer)
                    .with_description("How many to collect (default 16)."),
            )
            .with_parameter(ToolParameter::new("plan", ToolParameterType::String))
            .with_parameter(ToolParameter::new("next", ToolParameterType::String))
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let block = match arg_str(args, "block") {
            Ok(block) => ItemId::new(block),
            Err(e) => return format!("Error: {}", e),
        };
        let count = match arg_count(args, "count", 16) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };
        let continuation = chained_continuation(args, inv);
        let task = GatherBlocksTask::new(
            block,
            count,
            inv.config.ranges.scan_radius,
            inv.config.ranges.reach_distance,
        );
        queue(inv, Box::new(task), continuation)
    }
}

pub struct FarmAreaTool;

impl CompanionTool for FarmAreaTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("farm_area", "Harvest and replant crops around the companion.")
            .with_parameter(
                ToolParameter::new("crop", ToolParameterType::String)
                    .with_description("Crop block id, e.g. 'wheat'.")
                    .required(),
            )
            .with_parameter(
                ToolParameter::new("count", ToolParameterType::Integer)
                    .with_description("How many to harvest (default 16)."),
            )
            .with_parameter(ToolParameter::new("plan", ToolParameterType::String))
            .with_parameter(ToolParameter::new("next", ToolParameterType::String))
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let crop = match arg_str(args, "crop") {
            Ok(crop) => ItemId::new(crop),
            Err(e) => return format!("Error: {}", e),
        };
        let count = match arg_count(args, "count", 16) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };
        let continuation = chained_continuation(args, inv);
        let task = FarmTask::new(
            crop,
            count,
            inv.config.ranges.scan_radius,
            inv.config.ranges.reach_distance,
        );
        queue(inv, Box::new(task), continuation)
    }
}
