//! Read-only and conversational tools: inventory, surroundings, task status,
//! memory facts, emotes.

use serde_json::Value;

use crate::blockmind::chat::ChatCategory;
use crate::blockmind::tool_protocol::{
    arg_count, arg_str, opt_arg_str, CompanionTool, ToolInvocation, ToolMetadata, ToolParameter,
    ToolParameterType,
};
use crate::blockmind::world::ItemId;

pub struct GetInventoryTool;

impl CompanionTool for GetInventoryTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("get_inventory", "List what the companion is carrying.")
    }

    fn invoke(&self, _args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let contents = inv.companion.inventory.contents();
        if contents.is_empty() {
            return "My inventory is empty.".to_string();
        }
        let mut out = String::from("Carrying:");
        for stack in contents {
            out.push_str(&format!("\n- {} x{}", stack.item.path(), stack.count));
        }
        if let Some(main) = &inv.companion.equipment.main_hand {
            out.push_str(&format!("\nMain hand: {}", main.item.path()));
        }
        out
    }
}

/// Block kinds worth reporting in a surroundings scan.
const NOTABLE_BLOCKS: &[&str] = &[
    "coal_ore",
    "iron_ore",
    "copper_ore",
    "gold_ore",
    "diamond_ore",
    "oak_log",
    "spruce_log",
    "birch_log",
    "chest",
    "furnace",
    "crafting_table",
    "water",
    "lava",
];

pub struct ScanSurroundingsTool;

impl CompanionTool for ScanSurroundingsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "scan_surroundings",
            "Report notable blocks (ores, trees, containers) near the companion.",
        )
        .with_parameter(
            ToolParameter::new("radius", ToolParameterType::Integer)
                .with_description("Scan radius in blocks (default from config)."),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let radius = match arg_count(args, "radius", inv.config.ranges.scan_radius as u32) {
            Ok(radius) => radius as i32,
            Err(e) => return format!("Error: {}", e),
        };
        let center = inv.companion.position;
        let mut out = format!("Around {} (radius {}):", center, radius);
        let mut found_any = false;
        for block in NOTABLE_BLOCKS {
            let targets = [ItemId::new(*block)];
            let hits = inv.world.scan_for_blocks(center, &targets, radius, 8);
            if hits.is_empty() {
                continue;
            }
            found_any = true;
            let nearest = hits[0];
            out.push_str(&format!(
                "\n- {} x{} (nearest at {})",
                block,
                hits.len(),
                nearest
            ));
        }
        if !found_any {
            out.push_str("\n- nothing notable");
        }
        out
    }
}

pub struct TaskStatusTool;

impl CompanionTool for TaskStatusTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("task_status", "Report the current task, progress, and queue.")
    }

    fn invoke(&self, _args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        inv.engine.status_summary()
    }
}

pub struct MemoryTool;

impl CompanionTool for MemoryTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "memory",
            "Remember, recall or forget a fact for this companion.",
        )
        .with_parameter(
            ToolParameter::new("action", ToolParameterType::String)
                .with_enum(&["remember", "recall", "forget"])
                .required(),
        )
        .with_parameter(
            ToolParameter::new("key", ToolParameterType::String)
                .with_description("Fact name, e.g. 'home_base'."),
        )
        .with_parameter(
            ToolParameter::new("value", ToolParameterType::String)
                .with_description("Fact content (remember only)."),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let action = match arg_str(args, "action") {
            Ok(action) => action,
            Err(e) => return format!("Error: {}", e),
        };
        match action {
            "remember" => {
                let (key, value) = match (arg_str(args, "key"), arg_str(args, "value")) {
                    (Ok(k), Ok(v)) => (k, v),
                    _ => return "Error: remember needs both 'key' and 'value'.".to_string(),
                };
                inv.companion
                    .memory
                    .insert(key.to_string(), value.to_string());
                format!("Remembered {}.", key)
            }
            "recall" => match opt_arg_str(args, "key") {
                Some(key) => match inv.companion.memory.get(key) {
                    Some(value) => format!("{}: {}", key, value),
                    None => format!("I don't remember anything about '{}'.", key),
                },
                None => {
                    if inv.companion.memory.is_empty() {
                        "I don't remember anything yet.".to_string()
                    } else {
                        let mut out = String::from("I remember:");
                        for (key, value) in &inv.companion.memory {
                            out.push_str(&format!("\n- {}: {}", key, value));
                        }
                        out
                    }
                }
            },
            "forget" => match opt_arg_str(args, "key") {
                Some(key) => {
                    if inv.companion.memory.remove(key).is_some() {
                        format!("Forgot {}.", key)
                    } else {
                        format!("I had nothing stored under '{}'.", key)
                    }
                }
                None => "Error: forget needs a 'key'.".to_string(),
            },
            other => format!("Error: unknown memory action '{}'.", other),
        }
    }
}

pub struct EmoteTool;

impl CompanionTool for EmoteTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("emote", "Express a gesture (wave, cheer, nod, shrug).")
            .with_parameter(
                ToolParameter::new("gesture", ToolParameterType::String)
                    .with_enum(&["wave", "cheer", "nod", "shrug", "dance"])
                    .required(),
            )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let gesture = match arg_str(args, "gesture") {
            Ok(gesture) => gesture,
            Err(e) => return format!("Error: {}", e),
        };
        let line = format!("*{} {}s*", inv.companion.name, gesture);
        inv.companion
            .chat
            .say(ChatCategory::Celebration, inv.now_tick, line.clone());
        line
    }
}
