//! Crafting plan emission.
//!
//! `flatten` walks a [`ResolvedTree`] in topological post-order and emits the
//! executable step list: coalesced gather steps for every raw leaf first, then
//! smelt/craft steps leaves-first so each step's inputs exist by the time it
//! runs.  Every step carries a difficulty derived from item metadata, and the
//! planner renders the `[CANNOT_CRAFT]` missing report the dispatcher hands to
//! the model when materials are truly unreachable.

use std::collections::BTreeMap;
use std::fmt;

use crate::blockmind::continuation::CANNOT_CRAFT;
use crate::blockmind::recipes::materials::{
    self, GatherSource, MobDifficulty,
};
use crate::blockmind::recipes::resolver::{ResolvedNode, ResolvedTree};
use crate::blockmind::recipes::RecipeVariant;
use crate::blockmind::world::{ItemId, ItemStack, ToolTier};

/// How hard one plan step is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Difficulty {
    Trivial,
    Easy,
    Moderate,
    Hard,
    Dangerous,
    Impossible,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Trivial => "trivial",
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
            Difficulty::Dangerous => "dangerous",
            Difficulty::Impossible => "impossible",
        };
        write!(f, "{}", s)
    }
}

/// One executable unit of a crafting plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Gather {
        item: ItemId,
        count: u32,
        source: GatherSource,
        tool_tier: Option<ToolTier>,
        difficulty: Difficulty,
    },
    Smelt {
        input: ItemId,
        output: ItemId,
        count: u32,
        difficulty: Difficulty,
    },
    Craft {
        result: ItemId,
        result_count: u32,
        variant: RecipeVariant,
        difficulty: Difficulty,
    },
}

impl PlanStep {
    pub fn difficulty(&self) -> Difficulty {
        match self {
            PlanStep::Gather { difficulty, .. }
            | PlanStep::Smelt { difficulty, .. }
            | PlanStep::Craft { difficulty, .. } => *difficulty,
        }
    }

    /// One-line rendering for plan context strings and chat.
    pub fn describe(&self) -> String {
        match self {
            PlanStep::Gather {
                item,
                count,
                source,
                ..
            } => format!("gather {} x{} ({})", item.path(), count, source.label()),
            PlanStep::Smelt {
                input,
                output,
                count,
                ..
            } => format!("smelt {} x{} into {}", input.path(), count, output.path()),
            PlanStep::Craft {
                result,
                result_count,
                ..
            } => format!("craft {} x{}", result.path(), result_count),
        }
    }
}

/// An ordered, executable plan for one target stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CraftingPlan {
    pub target: ItemStack,
    pub steps: Vec<PlanStep>,
}

impl CraftingPlan {
    /// Highest difficulty across all steps.
    pub fn difficulty(&self) -> Difficulty {
        self.steps
            .iter()
            .map(PlanStep::difficulty)
            .max()
            .unwrap_or(Difficulty::Trivial)
    }

    /// Render the plan as a numbered context string for continuations.
    pub fn render_context(&self) -> String {
        let mut out = format!(
            "Plan for {} x{}:",
            self.target.item.path(),
            self.target.count
        );
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, step.describe()));
        }
        out
    }
}

/// Difficulty of gathering one raw item.
fn gather_difficulty(item: &ItemId, source: GatherSource, tier: Option<ToolTier>) -> Difficulty {
    if materials::is_impossible(item) {
        return Difficulty::Impossible;
    }
    match source {
        GatherSource::HuntMob => match materials::mob_drop(item) {
            Some((_, MobDifficulty::Passive)) => Difficulty::Easy,
            Some((_, MobDifficulty::Hostile)) => Difficulty::Hard,
            Some((_, MobDifficulty::Dangerous)) => Difficulty::Dangerous,
            None => Difficulty::Hard,
        },
        GatherSource::MineOres | GatherSource::StripMine => match tier {
            Some(ToolTier::Diamond) | Some(ToolTier::Netherite) => Difficulty::Dangerous,
            Some(ToolTier::Iron) => Difficulty::Hard,
            _ => Difficulty::Moderate,
        },
        GatherSource::ChopTrees | GatherSource::GatherBlocks => Difficulty::Easy,
        GatherSource::Farm | GatherSource::Fish => Difficulty::Moderate,
    }
}

/// Flatten a resolved tree into the ordered step list.
pub fn flatten(tree: &ResolvedTree) -> CraftingPlan {
    // Coalesce raw leaves by item, keeping the strongest tool-tier hint.
    let mut gathers: BTreeMap<ItemId, (u32, Option<ToolTier>)> = BTreeMap::new();
    let mut actions: Vec<PlanStep> = Vec::new();
    collect(&tree.root, &mut gathers, &mut actions);

    let mut steps: Vec<PlanStep> = gathers
        .into_iter()
        .map(|(item, (count, tier))| {
            let mut source = materials::gather_source(&item);
            // Mined gems and minerals promote plain gathering to ore mining.
            if materials::mined_mineral_tier(&item).is_some() {
                source = GatherSource::MineOres;
            }
            let difficulty = gather_difficulty(&item, source, tier);
            PlanStep::Gather {
                item,
                count,
                source,
                tool_tier: tier,
                difficulty,
            }
        })
        .collect();
    steps.extend(actions);

    let target = match &tree.root {
        ResolvedNode::Leaf { stack, .. } => stack.clone(),
        ResolvedNode::Step { result, .. } => result.clone(),
    };
    CraftingPlan { target, steps }
}

fn collect(
    node: &ResolvedNode,
    gathers: &mut BTreeMap<ItemId, (u32, Option<ToolTier>)>,
    actions: &mut Vec<PlanStep>,
) {
    match node {
        ResolvedNode::Leaf { stack, tool_tier } => {
            let entry = gathers
                .entry(stack.item.clone())
                .or_insert((0, *tool_tier));
            entry.0 += stack.count;
            entry.1 = entry.1.max(*tool_tier);
        }
        ResolvedNode::Step {
            result,
            variant,
            children,
        } => {
            for child in children {
                collect(child, gathers, actions);
            }
            match variant {
                RecipeVariant::Smelt { input, .. } => actions.push(PlanStep::Smelt {
                    input: input.clone(),
                    output: result.item.clone(),
                    count: result.count,
                    difficulty: Difficulty::Easy,
                }),
                other => actions.push(PlanStep::Craft {
                    result: result.item.clone(),
                    result_count: result.count,
                    variant: other.clone(),
                    difficulty: Difficulty::Trivial,
                }),
            }
        }
    }
}

/// Render the terminal planner report for unreachable materials.  The prefix
/// and the re-invocation ban are part of the contract with the model.
pub fn missing_report(target: &ItemId, missing: &[(ItemId, String)]) -> String {
    let mut out = format!(
        "{} I cannot craft {}. Do not call the crafting tool again for this item.",
        CANNOT_CRAFT,
        target.path()
    );
    for (item, advice) in missing {
        out.push_str(&format!("\n- {}: {}", item.path(), advice));
    }
    out
}
