//! The crafting planner surface: `craft_item`, `smelt_items`, `get_recipe`.
//!
//! `craft_item` is the planner's entry point.  It resolves the target through
//! the recipe index, plans the step list, diffs it against the inventory, and
//! queues exactly one next task — a gather, a smelt, or the final craft batch
//! — with a continuation that re-invokes `craft_item` when the task finishes.
//! A process-wide reentrancy guard keyed on `(owner, item)` keeps the model
//! from re-entering the planner while a plan is in flight; the deterministic
//! continuation executor is exempt.

use lazy_static::lazy_static;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::blockmind::companion::OwnerId;
use crate::blockmind::continuation::{Continuation, ASYNC_TASK, CANNOT_CRAFT};
use crate::blockmind::recipes::materials::GatherSource;
use crate::blockmind::recipes::plan::{flatten, missing_report, CraftingPlan, PlanStep};
use crate::blockmind::recipes::resolver::{RecipeResolver, ResolveError};
use crate::blockmind::recipes::{Ingredient, RecipeIndex, RecipeVariant};
use crate::blockmind::task_engine::Task;
use crate::blockmind::tasks::{
    ChopTreesTask, CraftOp, CraftTask, FarmTask, GatherBlocksTask, MineOresTask, SmeltTask,
};
use crate::blockmind::tool_protocol::{
    arg_count, arg_str, CompanionTool, ToolInvocation, ToolMetadata, ToolParameter,
    ToolParameterType,
};
use crate::blockmind::world::ItemId;

/// Ticks an `(owner, item)` pair stays guarded after a planner entry.
const CRAFT_GUARD_COOLDOWN_TICKS: u64 = 60;

lazy_static! {
    /// Process-wide reentrancy guard: `(owner, target item) -> expiry tick`.
    static ref CRAFT_GUARD: Mutex<HashMap<(OwnerId, String), u64>> = Mutex::new(HashMap::new());
}

/// Check and arm the reentrancy guard.  Returns false when the pair is still
/// inside its cooldown window.
fn enter_craft_guard(owner: OwnerId, item: &str, now_tick: u64) -> bool {
    let mut guard = CRAFT_GUARD.lock().expect("craft guard poisoned");
    guard.retain(|_, expiry| *expiry > now_tick);
    let key = (owner, item.to_string());
    if guard.contains_key(&key) {
        return false;
    }
    guard.insert(key, now_tick + CRAFT_GUARD_COOLDOWN_TICKS);
    true
}

/// The next thing the plan needs, diffed against the current inventory.
#[derive(Debug)]
enum PlanAction {
    Gather {
        item: ItemId,
        missing: u32,
        source: GatherSource,
    },
    Smelt {
        input: ItemId,
        output: ItemId,
        count: u32,
        cook_time: u32,
    },
    Craft(Vec<CraftOp>),
    Nothing,
}

/// Walk the plan against the inventory and pick the first pending step.
///
/// Action steps already satisfied by existing intermediates are skipped, and
/// the inputs they would have consumed are waived from the gather demands —
/// three spare ingots mean three fewer raw iron to mine.
fn next_action(plan: &CraftingPlan, counts: &BTreeMap<ItemId, u32>, index: &RecipeIndex) -> PlanAction {
    let mut virtual_counts = counts.clone();
    let mut waived: BTreeMap<ItemId, u32> = BTreeMap::new();
    let mut pending_smelt: Option<(ItemId, ItemId, u32, u32)> = None;
    let mut craft_ops: Vec<CraftOp> = Vec::new();

    for step in &plan.steps {
        match step {
            PlanStep::Gather { .. } => {}
            PlanStep::Smelt {
                input,
                output,
                count,
                ..
            } => {
                let have = virtual_counts.get(output).copied().unwrap_or(0);
                if have >= *count {
                    *waived.entry(input.clone()).or_insert(0) += count;
                    continue;
                }
                let needed = count - have;
                if pending_smelt.is_none() {
                    let cook = index
                        .smelt_output_for(input)
                        .map(|(_, t)| t)
                        .unwrap_or(200);
                    pending_smelt = Some((input.clone(), output.clone(), needed, cook));
                }
                sub(&mut virtual_counts, input, needed);
                *virtual_counts.entry(output.clone()).or_insert(0) += needed;
            }
            PlanStep::Craft {
                result,
                result_count,
                variant,
                ..
            } => {
                let have = virtual_counts.get(result).copied().unwrap_or(0);
                let inputs = concrete_inputs(variant, index);
                if have >= *result_count {
                    for (item, count) in &inputs {
                        *waived.entry(item.clone()).or_insert(0) += count;
                    }
                    continue;
                }
                let per_craft = variant.result_count().max(1);
                let applications = (*result_count / per_craft).max(1);
                let total_inputs: Vec<(ItemId, u32)> = inputs
                    .iter()
                    .map(|(item, per)| (item.clone(), per * applications))
                    .collect();
                for (item, count) in &total_inputs {
                    sub(&mut virtual_counts, item, *count);
                }
                *virtual_counts.entry(result.clone()).or_insert(0) += result_count;
                // The 2x2 pocket grid fits four single slots; anything bigger
                // per craft application needs the table.
                let needs_bench = inputs.iter().map(|(_, c)| c).sum::<u32>() > 4;
                craft_ops.push(CraftOp {
                    result: result.clone(),
                    count: *result_count,
                    inputs: total_inputs,
                    needs_bench,
                });
            }
        }
    }

    // Gathers lead the plan; the first one the inventory cannot cover wins.
    for step in &plan.steps {
        if let PlanStep::Gather {
            item,
            count,
            source,
            ..
        } = step
        {
            let waived_count = waived.get(item).copied().unwrap_or(0);
            let effective = count.saturating_sub(waived_count);
            let have = counts.get(item).copied().unwrap_or(0);
            if have < effective {
                return PlanAction::Gather {
                    item: item.clone(),
                    missing: effective - have,
                    source: *source,
                };
            }
        }
    }

    if let Some((input, output, count, cook)) = pending_smelt {
        return PlanAction::Smelt {
            input,
            output,
            count,
            cook_time: cook,
        };
    }
    if !craft_ops.is_empty() {
        return PlanAction::Craft(craft_ops);
    }
    PlanAction::Nothing
}

fn sub(counts: &mut BTreeMap<ItemId, u32>, item: &ItemId, amount: u32) {
    let entry = counts.entry(item.clone()).or_insert(0);
    *entry = entry.saturating_sub(amount);
}

/// Resolve a variant's ingredient slots to concrete items (tags picked
/// deterministically), counts per single craft application.
fn concrete_inputs(variant: &RecipeVariant, index: &RecipeIndex) -> Vec<(ItemId, u32)> {
    variant
        .inputs()
        .into_iter()
        .filter_map(|input| {
            let item = match input.ingredient {
                Ingredient::Item(item) => item,
                Ingredient::Tag(ref tag) => index.pick_best_variant(tag)?,
            };
            Some((item, input.count))
        })
        .collect()
}

/// Resolve, plan, and queue the next step towards crafting a target item.
pub struct CraftItemTool;

impl CompanionTool for CraftItemTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "craft_item",
            "Craft an item from scratch: plans gathering, smelting and crafting, then works the plan step by step.",
        )
        .with_parameter(
            ToolParameter::new("item", ToolParameterType::String)
                .with_description("Target item id, e.g. 'iron_pickaxe'.")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("count", ToolParameterType::Integer)
                .with_description("How many to craft (default 1)."),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let item = match arg_str(args, "item") {
            Ok(item) => item,
            Err(e) => return format!("Error: {}", e),
        };
        let count = match arg_count(args, "count", 1) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };
        let target = ItemId::new(item);

        if !inv.via_continuation && !enter_craft_guard(inv.owner, target.as_str(), inv.now_tick) {
            return format!(
                "{} Already working on {}; not planning it twice.",
                CANNOT_CRAFT,
                target.path()
            );
        }

        let resolver =
            RecipeResolver::new(inv.recipes).extend_overrides(inv.config.recipe_overrides());
        let tree = match resolver.resolve(&target, count) {
            Ok(tree) => tree,
            Err(ResolveError::Unknown { item, advice }) => {
                return missing_report(&target, &[(item, advice)]);
            }
        };
        let plan = flatten(&tree);
        if plan.difficulty() == crate::blockmind::recipes::plan::Difficulty::Impossible {
            return missing_report(
                &target,
                &[(
                    target.clone(),
                    "That item cannot be obtained in survival.".to_string(),
                )],
            );
        }

        let counts: BTreeMap<ItemId, u32> = inv
            .companion
            .inventory
            .contents()
            .into_iter()
            .map(|s| (s.item, s.count))
            .collect();

        let reach = inv.config.ranges.reach_distance;
        let continuation = Continuation::new(
            inv.owner,
            plan.render_context(),
            format!(
                "Call craft_item({{\"item\":\"{}\",\"count\":{}}})",
                target.path(),
                count
            ),
        );

        match next_action(&plan, &counts, inv.recipes) {
            PlanAction::Gather {
                item,
                missing,
                source,
            } => {
                let radius = inv.config.ranges.scan_radius;
                let task: Box<dyn crate::blockmind::task_engine::Task> = match source {
                    GatherSource::ChopTrees => {
                        Box::new(ChopTreesTask::new(missing, inv.config.ranges.chop_radius, reach))
                    }
                    GatherSource::MineOres | GatherSource::StripMine => {
                        Box::new(MineOresTask::new(&item, missing, radius, reach))
                    }
                    GatherSource::Farm => {
                        Box::new(FarmTask::new(item.clone(), missing, radius, reach))
                    }
                    GatherSource::GatherBlocks => {
                        Box::new(GatherBlocksTask::new(item.clone(), missing, radius, reach))
                    }
                    GatherSource::HuntMob | GatherSource::Fish => {
                        return format!(
                            "I can't hunt or fish for {} yet — bring me {} x{} and ask again.",
                            item.path(),
                            item.path(),
                            missing
                        );
                    }
                };
                let description = task.description();
                inv.companion.interacting_with_owner = false;
                inv.engine.queue_task(task, Some(continuation));
                format!("{} Queued: {}", ASYNC_TASK, description)
            }
            PlanAction::Smelt {
                input,
                output,
                count,
                cook_time,
            } => {
                let task = SmeltTask::new(input.clone(), output, count, cook_time, reach);
                let description = task.description();
                inv.companion.interacting_with_owner = false;
                inv.engine.queue_task(Box::new(task), Some(continuation));
                format!("{} Queued: {}", ASYNC_TASK, description)
            }
            PlanAction::Craft(ops) => {
                let task = CraftTask::new(ops, reach);
                let description = task.description();
                inv.companion.interacting_with_owner = false;
                inv.engine.queue_task(Box::new(task), None);
                format!("{} Queued: {}", ASYNC_TASK, description)
            }
            PlanAction::Nothing => format!(
                "I already have {} x{} — nothing to craft.",
                target.path(),
                count
            ),
        }
    }
}

/// Queue a furnace batch for an input the index knows how to smelt.
pub struct SmeltItemsTool;

impl CompanionTool for SmeltItemsTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new("smelt_items", "Smelt items in a nearby furnace.")
            .with_parameter(
                ToolParameter::new("input", ToolParameterType::String)
                    .with_description("Item to smelt, e.g. 'raw_iron'.")
                    .required(),
            )
            .with_parameter(
                ToolParameter::new("count", ToolParameterType::Integer)
                    .with_description("How many to smelt (default all carried)."),
            )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let input = match arg_str(args, "input") {
            Ok(input) => ItemId::new(input),
            Err(e) => return format!("Error: {}", e),
        };
        let carried = inv.companion.inventory.count_of(&input);
        let count = match arg_count(args, "count", carried.max(1)) {
            Ok(count) => count,
            Err(e) => return format!("Error: {}", e),
        };
        let Some((output, cook_time)) = inv.recipes.smelt_output_for(&input) else {
            return format!("Error: I don't know a smelting recipe for {}.", input.path());
        };
        let task = SmeltTask::new(
            input,
            output,
            count,
            cook_time,
            inv.config.ranges.reach_distance,
        );
        let description = task.description();
        inv.companion.interacting_with_owner = false;
        inv.engine.queue_task(Box::new(task), None);
        format!("{} Queued: {}", ASYNC_TASK, description)
    }
}

/// Explain how an item would be obtained, without doing anything.
pub struct GetRecipeTool;

impl CompanionTool for GetRecipeTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            "get_recipe",
            "Describe the full gather/smelt/craft plan for an item without starting it.",
        )
        .with_parameter(
            ToolParameter::new("item", ToolParameterType::String)
                .with_description("Item id to look up.")
                .required(),
        )
    }

    fn invoke(&self, args: &Value, inv: &mut ToolInvocation<'_>) -> String {
        let item = match arg_str(args, "item") {
            Ok(item) => ItemId::new(item),
            Err(e) => return format!("Error: {}", e),
        };
        let resolver =
            RecipeResolver::new(inv.recipes).extend_overrides(inv.config.recipe_overrides());
        match resolver.resolve(&item, 1) {
            Ok(tree) => flatten(&tree).render_context(),
            Err(ResolveError::Unknown { item, advice }) => {
                format!("No crafting path for {}: {}", item.path(), advice)
            }
        }
    }
}
