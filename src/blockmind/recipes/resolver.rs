//! Recursive recipe resolution.
//!
//! `resolve(target, count)` walks the recipe index depth-first and produces a
//! [`ResolvedTree`] whose leaves are raw-material stacks and whose internal
//! nodes are craft/smelt steps.  Cycles are detected with a visited set and
//! handled by backtracking to the next recipe variant; structurally circular
//! recipes (netherite gear, dyed shulker boxes, dyed carpets) are broken by a
//! manual override table consulted before the index.  The only error a caller
//! ever sees is [`ResolveError::Unknown`] with human advice attached.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::blockmind::recipes::materials::{
    is_raw_material, mined_mineral_tier, unknown_item_advice,
};
use crate::blockmind::recipes::{Ingredient, RecipeIndex, RecipeInput, RecipeVariant};
use crate::blockmind::world::{ItemId, ItemStack, ToolTier};

/// Hard recursion cap; deeper trees are treated as unresolvable.
pub const MAX_RESOLVE_DEPTH: usize = 16;

/// Resolution failure surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No resolution exists; `advice` is always non-empty.
    Unknown { item: ItemId, advice: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unknown { item, advice } => {
                write!(f, "cannot resolve {}: {}", item, advice)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Internal branch failures; never escape [`RecipeResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Branch {
    Cycle(ItemId),
    DepthExceeded,
    Unknown(ItemId),
}

/// One node of a resolved tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedNode {
    /// A terminal raw-material requirement, optionally tagged with the
    /// minimum pickaxe tier needed to mine it (a hint, not a constraint).
    Leaf {
        stack: ItemStack,
        tool_tier: Option<ToolTier>,
    },
    /// An intermediate craft/smelt/smith step over resolved children.
    Step {
        result: ItemStack,
        variant: RecipeVariant,
        children: Vec<ResolvedNode>,
    },
}

impl ResolvedNode {
    fn leaf(item: ItemId, count: u32) -> Self {
        let tool_tier = mined_mineral_tier(&item);
        ResolvedNode::Leaf {
            stack: ItemStack { item, count },
            tool_tier,
        }
    }

    /// Whether any node in this subtree is for one of the given items.
    fn mentions_any(&self, items: &HashSet<ItemId>) -> bool {
        match self {
            ResolvedNode::Leaf { stack, .. } => items.contains(&stack.item),
            ResolvedNode::Step {
                result, children, ..
            } => {
                items.contains(&result.item) || children.iter().any(|c| c.mentions_any(items))
            }
        }
    }

    /// Append all raw-material leaves of this subtree to `out`.
    pub fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ResolvedNode>) {
        match self {
            ResolvedNode::Leaf { .. } => out.push(self),
            ResolvedNode::Step { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

/// A fully resolved recipe tree for one target stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTree {
    pub root: ResolvedNode,
}

impl ResolvedTree {
    /// All raw-material leaves, in depth-first order.
    pub fn leaves(&self) -> Vec<&ResolvedNode> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }
}

/// One part of a manual override decomposition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OverridePart {
    pub item: ItemId,
    pub count: u32,
    /// Terminal parts become leaves even when not in the raw-material table
    /// (loot-only pieces like smithing templates).
    #[serde(default)]
    pub terminal: bool,
}

/// A canonical non-circular decomposition consulted before recipe lookup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecipeOverride {
    #[serde(default = "default_result_count")]
    pub result_count: u32,
    pub parts: Vec<OverridePart>,
}

fn default_result_count() -> u32 {
    1
}

const DYE_COLORS: &[&str] = &[
    "white",
    "orange",
    "magenta",
    "light_blue",
    "yellow",
    "lime",
    "pink",
    "gray",
    "light_gray",
    "cyan",
    "purple",
    "blue",
    "brown",
    "green",
    "red",
    "black",
];

const NETHERITE_GEAR: &[&str] = &[
    "sword",
    "pickaxe",
    "axe",
    "shovel",
    "hoe",
    "helmet",
    "chestplate",
    "leggings",
    "boots",
];

/// The built-in override table.  Config may extend or replace entries; the
/// table stays data, not code.
pub fn default_overrides() -> HashMap<ItemId, RecipeOverride> {
    let mut table = HashMap::new();

    // Netherite gear is a smithing transform, structurally circular for the
    // index; decompose into diamond equivalent + ingot + loot-only template.
    for gear in NETHERITE_GEAR {
        table.insert(
            ItemId::new(format!("netherite_{}", gear)),
            RecipeOverride {
                result_count: 1,
                parts: vec![
                    OverridePart {
                        item: ItemId::new(format!("diamond_{}", gear)),
                        count: 1,
                        terminal: false,
                    },
                    OverridePart {
                        item: ItemId::new("netherite_ingot"),
                        count: 1,
                        terminal: false,
                    },
                    OverridePart {
                        item: ItemId::new("netherite_upgrade_smithing_template"),
                        count: 1,
                        terminal: true,
                    },
                ],
            },
        );
    }

    for colour in DYE_COLORS {
        // Dyed shulker boxes index as transmutes circular on the box.
        table.insert(
            ItemId::new(format!("{}_shulker_box", colour)),
            RecipeOverride {
                result_count: 1,
                parts: vec![
                    OverridePart {
                        item: ItemId::new("shulker_box"),
                        count: 1,
                        terminal: false,
                    },
                    OverridePart {
                        item: ItemId::new(format!("{}_dye", colour)),
                        count: 1,
                        terminal: false,
                    },
                ],
            },
        );
        // Carpets pick up a dye-transmute cycle from foreign mods; bypass
        // straight to wool.
        table.insert(
            ItemId::new(format!("{}_carpet", colour)),
            RecipeOverride {
                result_count: 3,
                parts: vec![OverridePart {
                    item: ItemId::new(format!("{}_wool", colour)),
                    count: 2,
                    terminal: false,
                }],
            },
        );
    }

    table
}

/// Per-call resolution state: the cycle-detection set plus success and
/// failure memos keyed on `(item, remaining need)` and item respectively.
struct ResolveCtx {
    visited: HashSet<ItemId>,
    memo: HashMap<(ItemId, u32), ResolvedNode>,
    failed: HashSet<ItemId>,
}

/// Depth-first recipe resolver over one [`RecipeIndex`] snapshot.
pub struct RecipeResolver<'a> {
    index: &'a RecipeIndex,
    overrides: HashMap<ItemId, RecipeOverride>,
}

impl<'a> RecipeResolver<'a> {
    pub fn new(index: &'a RecipeIndex) -> Self {
        Self {
            index,
            overrides: default_overrides(),
        }
    }

    /// Replace the built-in override table (config-driven entries win whole).
    pub fn with_overrides(mut self, overrides: HashMap<ItemId, RecipeOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Merge extra override entries on top of the built-in table.
    pub fn extend_overrides(
        mut self,
        entries: impl IntoIterator<Item = (ItemId, RecipeOverride)>,
    ) -> Self {
        self.overrides.extend(entries);
        self
    }

    /// Resolve a target stack into a tree of raw-material leaves.
    pub fn resolve(&self, target: &ItemId, count: u32) -> Result<ResolvedTree, ResolveError> {
        let mut ctx = ResolveCtx {
            visited: HashSet::new(),
            memo: HashMap::new(),
            failed: HashSet::new(),
        };
        match self.resolve_need(target, count.max(1), &mut ctx, 0) {
            Ok(root) => Ok(ResolvedTree { root }),
            Err(branch) => {
                if log::log_enabled!(log::Level::Debug) {
                    log::debug!("resolve({}) failed: {:?}", target, branch);
                }
                Err(ResolveError::Unknown {
                    item: target.clone(),
                    advice: unknown_item_advice(target),
                })
            }
        }
    }

    fn resolve_need(
        &self,
        item: &ItemId,
        count: u32,
        ctx: &mut ResolveCtx,
        depth: usize,
    ) -> Result<ResolvedNode, Branch> {
        if depth > MAX_RESOLVE_DEPTH {
            return Err(Branch::DepthExceeded);
        }
        if is_raw_material(item) {
            return Ok(ResolvedNode::leaf(item.clone(), count));
        }
        if ctx.failed.contains(item) {
            return Err(Branch::Unknown(item.clone()));
        }
        if ctx.visited.contains(item) {
            return Err(Branch::Cycle(item.clone()));
        }
        // A memoised subtree is only reusable when it does not mention any
        // item currently on the path, or it would fake a cycle into the tree.
        if let Some(node) = ctx.memo.get(&(item.clone(), count)) {
            if !node.mentions_any(&ctx.visited) {
                return Ok(node.clone());
            }
        }

        ctx.visited.insert(item.clone());
        let result = self.resolve_uncached(item, count, ctx, depth);
        ctx.visited.remove(item);

        match &result {
            Ok(node) => {
                ctx.memo.insert((item.clone(), count), node.clone());
            }
            Err(Branch::Unknown(_)) | Err(Branch::DepthExceeded) => {
                ctx.failed.insert(item.clone());
            }
            Err(Branch::Cycle(_)) => {}
        }
        result
    }

    fn resolve_uncached(
        &self,
        item: &ItemId,
        count: u32,
        ctx: &mut ResolveCtx,
        depth: usize,
    ) -> Result<ResolvedNode, Branch> {
        if let Some(override_recipe) = self.overrides.get(item) {
            return self.resolve_override(item, count, override_recipe.clone(), ctx, depth);
        }

        let variants = self.index.variants_for(item);
        if variants.is_empty() {
            return Err(Branch::Unknown(item.clone()));
        }

        let mut last_failure = Branch::Unknown(item.clone());
        for variant in variants {
            match self.resolve_variant(item, count, variant, ctx, depth) {
                Ok(node) => return Ok(node),
                Err(branch) => last_failure = branch,
            }
        }
        // Depth overflow and cycles degrade to Unknown at the failing branch's
        // emitter; the caller above may still succeed with another variant.
        match last_failure {
            Branch::Cycle(_) | Branch::DepthExceeded => Err(Branch::Unknown(item.clone())),
            unknown => Err(unknown),
        }
    }

    fn resolve_variant(
        &self,
        item: &ItemId,
        count: u32,
        variant: &RecipeVariant,
        ctx: &mut ResolveCtx,
        depth: usize,
    ) -> Result<ResolvedNode, Branch> {
        let result_count = variant.result_count().max(1);
        let crafts = count.div_ceil(result_count);

        let mut children = Vec::new();
        for input in variant.inputs() {
            let ingredient_item = self.pick_ingredient(&input)?;
            let need = input.count * crafts;
            let child = self.resolve_need(&ingredient_item, need, ctx, depth + 1)?;
            children.push(child);
        }

        Ok(ResolvedNode::Step {
            result: ItemStack {
                item: item.clone(),
                count: crafts * result_count,
            },
            variant: variant.clone(),
            children,
        })
    }

    fn resolve_override(
        &self,
        item: &ItemId,
        count: u32,
        override_recipe: RecipeOverride,
        ctx: &mut ResolveCtx,
        depth: usize,
    ) -> Result<ResolvedNode, Branch> {
        let result_count = override_recipe.result_count.max(1);
        let crafts = count.div_ceil(result_count);

        let mut children = Vec::new();
        let mut inputs = Vec::new();
        for part in &override_recipe.parts {
            let need = part.count * crafts;
            inputs.push(RecipeInput::item(part.item.clone(), part.count));
            if part.terminal {
                children.push(ResolvedNode::leaf(part.item.clone(), need));
            } else {
                children.push(self.resolve_need(&part.item, need, ctx, depth + 1)?);
            }
        }

        Ok(ResolvedNode::Step {
            result: ItemStack {
                item: item.clone(),
                count: crafts * result_count,
            },
            variant: RecipeVariant::Craft {
                shaped: false,
                inputs,
                result_count,
            },
            children,
        })
    }

    /// Resolve a tag slot to its deterministic representative item.
    fn pick_ingredient(&self, input: &RecipeInput) -> Result<ItemId, Branch> {
        match &input.ingredient {
            Ingredient::Item(item) => Ok(item.clone()),
            Ingredient::Tag(tag) => self
                .index
                .pick_best_variant(tag)
                .ok_or_else(|| Branch::Unknown(ItemId::new(tag.as_str()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockmind::recipes::RecipeInput;

    fn small_index() -> RecipeIndex {
        let mut index = RecipeIndex::new();
        index.register_tag(
            "logs",
            vec![ItemId::new("oak_log"), ItemId::new("birch_log")],
        );
        index.add(
            "oak_planks",
            RecipeVariant::Craft {
                shaped: false,
                inputs: vec![RecipeInput::tag("logs", 1)],
                result_count: 4,
            },
        );
        index.add(
            "stick",
            RecipeVariant::Craft {
                shaped: true,
                inputs: vec![RecipeInput::item("oak_planks", 2)],
                result_count: 4,
            },
        );
        index.add(
            "crafting_table",
            RecipeVariant::Craft {
                shaped: true,
                inputs: vec![RecipeInput::item("oak_planks", 4)],
                result_count: 1,
            },
        );
        index
    }

    #[test]
    fn resolves_through_tags_to_raw_leaves() {
        let index = small_index();
        let resolver = RecipeResolver::new(&index);
        let tree = resolver
            .resolve(&ItemId::new("crafting_table"), 1)
            .expect("resolvable");
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1);
        match leaves[0] {
            ResolvedNode::Leaf { stack, .. } => {
                assert_eq!(stack.item, ItemId::new("oak_log"));
                assert_eq!(stack.count, 1);
            }
            other => panic!("expected leaf, got {:?}", other),
        }
    }

    #[test]
    fn counts_scale_by_ceiling_of_result_count() {
        let index = small_index();
        let resolver = RecipeResolver::new(&index);
        // 6 sticks: ceil(6/4) = 2 crafts, 4 planks, ceil(4/4) = 1 log.
        let tree = resolver.resolve(&ItemId::new("stick"), 6).expect("ok");
        match &tree.root {
            ResolvedNode::Step { result, children, .. } => {
                assert_eq!(result.count, 8);
                match &children[0] {
                    ResolvedNode::Step { result, .. } => assert_eq!(result.count, 4),
                    other => panic!("expected planks step, got {:?}", other),
                }
            }
            other => panic!("expected step, got {:?}", other),
        }
    }

    #[test]
    fn cycles_backtrack_to_next_variant() {
        let mut index = small_index();
        // First variant is circular (block <-> ingot); second resolves.
        index.add(
            "iron_ingot",
            RecipeVariant::Craft {
                shaped: true,
                inputs: vec![RecipeInput::item("iron_block", 1)],
                result_count: 9,
            },
        );
        index.add(
            "iron_ingot",
            RecipeVariant::Smelt {
                input: ItemId::new("raw_iron"),
                cook_time_ticks: 200,
            },
        );
        index.add(
            "iron_block",
            RecipeVariant::Craft {
                shaped: true,
                inputs: vec![RecipeInput::item("iron_ingot", 9)],
                result_count: 1,
            },
        );
        let resolver = RecipeResolver::new(&index);
        let tree = resolver.resolve(&ItemId::new("iron_ingot"), 1).expect("ok");
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1);
        match leaves[0] {
            ResolvedNode::Leaf { stack, tool_tier } => {
                assert_eq!(stack.item, ItemId::new("raw_iron"));
                assert_eq!(*tool_tier, Some(ToolTier::Stone));
            }
            other => panic!("expected raw_iron leaf, got {:?}", other),
        }
    }

    #[test]
    fn netherite_override_breaks_the_smithing_knot() {
        let mut index = small_index();
        index.add(
            "diamond_pickaxe",
            RecipeVariant::Craft {
                shaped: true,
                inputs: vec![
                    RecipeInput::item("diamond", 3),
                    RecipeInput::item("stick", 2),
                ],
                result_count: 1,
            },
        );
        index.add(
            "netherite_ingot",
            RecipeVariant::Craft {
                shaped: false,
                inputs: vec![
                    RecipeInput::item("netherite_scrap", 4),
                    RecipeInput::item("gold_ingot", 4),
                ],
                result_count: 1,
            },
        );
        index.add(
            "netherite_scrap",
            RecipeVariant::Smelt {
                input: ItemId::new("ancient_debris"),
                cook_time_ticks: 200,
            },
        );
        index.add(
            "gold_ingot",
            RecipeVariant::Smelt {
                input: ItemId::new("raw_gold"),
                cook_time_ticks: 200,
            },
        );
        let resolver = RecipeResolver::new(&index);
        let tree = resolver
            .resolve(&ItemId::new("netherite_pickaxe"), 1)
            .expect("override should resolve");
        let leaf_items: Vec<_> = tree
            .leaves()
            .iter()
            .map(|n| match n {
                ResolvedNode::Leaf { stack, .. } => stack.item.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert!(leaf_items.contains(&ItemId::new("netherite_upgrade_smithing_template")));
        assert!(leaf_items.contains(&ItemId::new("ancient_debris")));
        assert!(leaf_items.contains(&ItemId::new("diamond")));
    }

    #[test]
    fn unknown_items_carry_advice() {
        let index = small_index();
        let resolver = RecipeResolver::new(&index);
        let err = resolver
            .resolve(&ItemId::new("elytra"), 1)
            .expect_err("no recipe");
        let ResolveError::Unknown { item, advice } = err;
        assert_eq!(item, ItemId::new("elytra"));
        assert!(advice.contains("end ships"));
    }

    #[test]
    fn depth_overflow_degrades_to_unknown() {
        let mut index = RecipeIndex::new();
        // A chain of 20 intermediates, deeper than the cap.
        for i in 0..20 {
            index.add(
                format!("chain_{}", i).as_str(),
                RecipeVariant::Craft {
                    shaped: false,
                    inputs: vec![RecipeInput::item(format!("chain_{}", i + 1).as_str(), 1)],
                    result_count: 1,
                },
            );
        }
        let resolver = RecipeResolver::new(&index);
        assert!(resolver.resolve(&ItemId::new("chain_0"), 1).is_err());
    }
}
