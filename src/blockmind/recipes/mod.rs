//! Recipe index: an immutable mapping from result item to recipe variants.
//!
//! The index is snapshotted once from engine data (including resolved tag
//! memberships) and shared read-only between the resolver, the planner, and
//! the crafting tools.  Variant lookup is phase-ordered: shaped crafts first,
//! then shapeless, then smelting, then smithing transforms, with transmutes
//! last since they are circular on their base item by construction.

pub mod materials;
pub mod plan;
pub mod resolver;

use std::collections::HashMap;

use crate::blockmind::world::{ItemId, TagKey};

/// One ingredient slot: either a concrete item or a dynamic tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingredient {
    Item(ItemId),
    Tag(TagKey),
}

/// An ingredient with the count of it one craft consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeInput {
    pub ingredient: Ingredient,
    pub count: u32,
}

impl RecipeInput {
    pub fn item(item: impl Into<ItemId>, count: u32) -> Self {
        Self {
            ingredient: Ingredient::Item(item.into()),
            count,
        }
    }

    pub fn tag(tag: impl Into<String>, count: u32) -> Self {
        Self {
            ingredient: Ingredient::Tag(TagKey::new(tag)),
            count,
        }
    }
}

/// One way to obtain a result item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeVariant {
    /// Grid craft.  Shaped and shapeless differ only in lookup priority; both
    /// reduce to an ingredient multiset for planning purposes.
    Craft {
        shaped: bool,
        inputs: Vec<RecipeInput>,
        result_count: u32,
    },
    /// Furnace smelt.  Cook time is carried as metadata only.
    Smelt { input: ItemId, cook_time_ticks: u32 },
    /// Smithing-table transform: base + addition + template.
    Smithing {
        base: ItemId,
        addition: ItemId,
        template: ItemId,
    },
    /// Base + reagent -> result, circular on the base (e.g. dyeing).
    Transmute { base: ItemId, reagent: ItemId },
}

impl RecipeVariant {
    /// Items produced per application of this variant.
    pub fn result_count(&self) -> u32 {
        match self {
            RecipeVariant::Craft { result_count, .. } => *result_count,
            _ => 1,
        }
    }

    /// Lookup phase rank; lower resolves first.
    fn phase(&self) -> u8 {
        match self {
            RecipeVariant::Craft { shaped: true, .. } => 0,
            RecipeVariant::Craft { shaped: false, .. } => 1,
            RecipeVariant::Smelt { .. } => 2,
            RecipeVariant::Smithing { .. } => 3,
            RecipeVariant::Transmute { .. } => 4,
        }
    }

    /// A short human label for plans and chat ("craft", "smelt", ...).
    pub fn kind_label(&self) -> &'static str {
        match self {
            RecipeVariant::Craft { .. } => "craft",
            RecipeVariant::Smelt { .. } => "smelt",
            RecipeVariant::Smithing { .. } => "smith",
            RecipeVariant::Transmute { .. } => "transmute",
        }
    }

    /// The ingredient multiset one application consumes, tags unresolved.
    pub fn inputs(&self) -> Vec<RecipeInput> {
        match self {
            RecipeVariant::Craft { inputs, .. } => inputs.clone(),
            RecipeVariant::Smelt { input, .. } => vec![RecipeInput::item(input.clone(), 1)],
            RecipeVariant::Smithing {
                base,
                addition,
                template,
            } => vec![
                RecipeInput::item(base.clone(), 1),
                RecipeInput::item(addition.clone(), 1),
                RecipeInput::item(template.clone(), 1),
            ],
            RecipeVariant::Transmute { base, reagent } => vec![
                RecipeInput::item(base.clone(), 1),
                RecipeInput::item(reagent.clone(), 1),
            ],
        }
    }
}

/// Immutable result-item -> variants mapping plus a tag-membership snapshot.
#[derive(Debug, Default, Clone)]
pub struct RecipeIndex {
    recipes: HashMap<ItemId, Vec<RecipeVariant>>,
    tags: HashMap<TagKey, Vec<ItemId>>,
}

impl RecipeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipe variant for `result`.
    pub fn add(&mut self, result: impl Into<ItemId>, variant: RecipeVariant) {
        let entry = self.recipes.entry(result.into()).or_default();
        entry.push(variant);
        entry.sort_by_key(|v| v.phase());
    }

    /// Register a tag's member items (a snapshot of the engine's dynamic set).
    pub fn register_tag(&mut self, tag: impl Into<String>, members: Vec<ItemId>) {
        self.tags.insert(TagKey::new(tag), members);
    }

    /// All variants producing `result`, in phase priority order.
    pub fn variants_for(&self, result: &ItemId) -> &[RecipeVariant] {
        self.recipes.get(result).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, result: &ItemId) -> bool {
        self.recipes.contains_key(result)
    }

    pub fn tag_members(&self, tag: &TagKey) -> &[ItemId] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Deterministically pick the representative item of a tag: the shortest
    /// id wins, ties broken lexicographically.  This is what makes the
    /// resolver choose `shulker_box` over `blue_shulker_box`.
    pub fn pick_best_variant(&self, tag: &TagKey) -> Option<ItemId> {
        self.tag_members(tag)
            .iter()
            .min_by_key(|id| (id.as_str().len(), id.as_str().to_owned()))
            .cloned()
    }

    /// Number of result items with at least one variant.
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Iterate over all result items in the index.
    pub fn result_items(&self) -> impl Iterator<Item = &ItemId> {
        self.recipes.keys()
    }

    /// Reverse smelting lookup: what does `input` cook into, and how long per
    /// item?
    pub fn smelt_output_for(&self, input: &ItemId) -> Option<(ItemId, u32)> {
        for (result, variants) in &self.recipes {
            for variant in variants {
                if let RecipeVariant::Smelt {
                    input: smelt_input,
                    cook_time_ticks,
                } = variant
                {
                    if smelt_input == input {
                        return Some((result.clone(), *cook_time_ticks));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_are_phase_ordered() {
        let mut index = RecipeIndex::new();
        index.add(
            "iron_ingot",
            RecipeVariant::Smelt {
                input: ItemId::new("raw_iron"),
                cook_time_ticks: 200,
            },
        );
        index.add(
            "iron_ingot",
            RecipeVariant::Craft {
                shaped: false,
                inputs: vec![RecipeInput::item("iron_block", 1)],
                result_count: 9,
            },
        );
        let variants = index.variants_for(&ItemId::new("iron_ingot"));
        assert!(matches!(variants[0], RecipeVariant::Craft { .. }));
        assert!(matches!(variants[1], RecipeVariant::Smelt { .. }));
    }

    #[test]
    fn best_tag_variant_prefers_shortest_then_lexical() {
        let mut index = RecipeIndex::new();
        index.register_tag(
            "shulker_boxes",
            vec![
                ItemId::new("blue_shulker_box"),
                ItemId::new("shulker_box"),
                ItemId::new("red_shulker_box"),
            ],
        );
        assert_eq!(
            index.pick_best_variant(&TagKey::new("shulker_boxes")),
            Some(ItemId::new("shulker_box"))
        );

        index.register_tag(
            "planks",
            vec![ItemId::new("oak_planks"), ItemId::new("ash_planks")],
        );
        // Same length: lexicographic tie-break.
        assert_eq!(
            index.pick_best_variant(&TagKey::new("planks")),
            Some(ItemId::new("ash_planks"))
        );
    }
}
