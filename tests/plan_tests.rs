//! Planner integration: plan shapes for the headline scenarios.

mod common;

use blockmind::recipes::materials::GatherSource;
use blockmind::recipes::plan::{flatten, PlanStep};
use blockmind::recipes::resolver::RecipeResolver;
use blockmind::world::{ItemId, ToolTier};
use common::vanilla_index;

#[test]
fn crafting_table_plan_is_gather_then_two_crafts() {
    let index = vanilla_index();
    let resolver = RecipeResolver::new(&index);
    let tree = resolver.resolve(&ItemId::new("crafting_table"), 1).unwrap();
    let plan = flatten(&tree);

    assert_eq!(plan.steps.len(), 3);
    match &plan.steps[0] {
        PlanStep::Gather {
            item,
            count,
            source,
            ..
        } => {
            assert_eq!(item, &ItemId::new("oak_log"));
            assert_eq!(*count, 1);
            assert_eq!(*source, GatherSource::ChopTrees);
        }
        other => panic!("expected log gather first, got {:?}", other),
    }
    match &plan.steps[1] {
        PlanStep::Craft { result, result_count, .. } => {
            assert_eq!(result, &ItemId::new("oak_planks"));
            assert_eq!(*result_count, 4);
        }
        other => panic!("expected planks craft, got {:?}", other),
    }
    match &plan.steps[2] {
        PlanStep::Craft { result, .. } => {
            assert_eq!(result, &ItemId::new("crafting_table"));
        }
        other => panic!("expected table craft last, got {:?}", other),
    }
}

#[test]
fn iron_pickaxe_plan_promotes_iron_to_ore_mining_with_tier_hint() {
    let index = vanilla_index();
    let resolver = RecipeResolver::new(&index);
    let tree = resolver.resolve(&ItemId::new("iron_pickaxe"), 1).unwrap();
    let plan = flatten(&tree);

    let iron = plan
        .steps
        .iter()
        .find_map(|s| match s {
            PlanStep::Gather {
                item,
                count,
                source,
                tool_tier,
                ..
            } if item == &ItemId::new("raw_iron") => Some((*count, *source, *tool_tier)),
            _ => None,
        })
        .expect("plan gathers raw iron");
    assert_eq!(iron.0, 3);
    assert_eq!(iron.1, GatherSource::MineOres);
    assert_eq!(iron.2, Some(ToolTier::Stone));

    // The smelt sits between gathers and the final craft.
    let smelt_idx = plan
        .steps
        .iter()
        .position(|s| matches!(s, PlanStep::Smelt { .. }))
        .expect("plan smelts ingots");
    let craft_idx = plan
        .steps
        .iter()
        .position(
            |s| matches!(s, PlanStep::Craft { result, .. } if result == &ItemId::new("iron_pickaxe")),
        )
        .expect("plan crafts the pickaxe");
    assert!(smelt_idx < craft_idx);

    let context = plan.render_context();
    assert!(context.starts_with("Plan for iron_pickaxe x1:"));
    assert!(context.contains("mine ores"));
}
