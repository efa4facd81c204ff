//! Item classification tables backing the resolver and planner.
//!
//! Raw materials are the terminal leaves of every recipe tree: things that can
//! only be gathered, mined, farmed, hunted, or looted rather than crafted.
//! The tables here also classify how a raw item is obtained (its gather
//! source), which pickaxe tier an ore needs, which mobs drop what, and which
//! items are outright unobtainable in survival.

use crate::blockmind::world::{ItemId, ToolTier};

/// How a raw material is obtained in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatherSource {
    ChopTrees,
    MineOres,
    StripMine,
    GatherBlocks,
    Farm,
    HuntMob,
    Fish,
}

impl GatherSource {
    pub fn label(self) -> &'static str {
        match self {
            GatherSource::ChopTrees => "chop trees",
            GatherSource::MineOres => "mine ores",
            GatherSource::StripMine => "strip mine",
            GatherSource::GatherBlocks => "gather blocks",
            GatherSource::Farm => "farm",
            GatherSource::HuntMob => "hunt mobs",
            GatherSource::Fish => "fish",
        }
    }
}

/// Danger class of the mob that drops an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MobDifficulty {
    Passive,
    Hostile,
    Dangerous,
}

/// Items that terminate resolution: nothing crafts them, the world provides
/// them.  Pattern rules below extend this list for families of items.
const RAW_MATERIALS: &[&str] = &[
    // Overworld wood and plant matter
    "oak_log",
    "spruce_log",
    "birch_log",
    "jungle_log",
    "acacia_log",
    "dark_oak_log",
    "mangrove_log",
    "cherry_log",
    "bamboo",
    "vine",
    "lily_pad",
    "sugar_cane",
    "cactus",
    "pumpkin",
    "melon_slice",
    "sweet_berries",
    "glow_berries",
    "wheat",
    "carrot",
    "potato",
    "beetroot",
    "nether_wart",
    "cocoa_beans",
    "kelp",
    "sea_pickle",
    // Stone, soil, sand
    "cobblestone",
    "stone",
    "deepslate",
    "cobbled_deepslate",
    "dirt",
    "grass_block",
    "sand",
    "red_sand",
    "gravel",
    "clay_ball",
    "flint",
    "obsidian",
    "crying_obsidian",
    "ice",
    "packed_ice",
    "blue_ice",
    "snowball",
    // Ores, gems and minerals (raw forms)
    "coal",
    "raw_iron",
    "raw_copper",
    "raw_gold",
    "diamond",
    "emerald",
    "lapis_lazuli",
    "redstone",
    "quartz",
    "amethyst_shard",
    "ancient_debris",
    // Amethyst buds and clusters drop as blocks
    "small_amethyst_bud",
    "medium_amethyst_bud",
    "large_amethyst_bud",
    "amethyst_cluster",
    // Nether flora and fungi
    "crimson_stem",
    "warped_stem",
    "crimson_fungus",
    "warped_fungus",
    "weeping_vines",
    "twisting_vines",
    "shroomlight",
    "glowstone_dust",
    "soul_sand",
    "soul_soil",
    "netherrack",
    "basalt",
    "blackstone",
    // Froglights
    "ochre_froglight",
    "verdant_froglight",
    "pearlescent_froglight",
    // Sculk family
    "sculk",
    "sculk_vein",
    "sculk_sensor",
    "sculk_shrieker",
    "sculk_catalyst",
    "echo_shard",
    // Mob drops
    "string",
    "spider_eye",
    "bone",
    "rotten_flesh",
    "gunpowder",
    "ender_pearl",
    "blaze_rod",
    "ghast_tear",
    "slime_ball",
    "leather",
    "feather",
    "egg",
    "ink_sac",
    "glow_ink_sac",
    "phantom_membrane",
    "shulker_shell",
    "magma_cream",
    "prismarine_shard",
    "prismarine_crystals",
    "nautilus_shell",
    "honeycomb",
    "porkchop",
    "beef",
    "chicken",
    "mutton",
    "rabbit",
    "rabbit_hide",
    "cod",
    "salmon",
    "tropical_fish",
    "pufferfish",
    "turtle_scute",
    "wool",
    "white_wool",
    // Loot-only pieces that still terminate resolution (the smithing
    // template must stay a leaf for the netherite override).
    "netherite_upgrade_smithing_template",
    "wither_skeleton_skull",
    "skeleton_skull",
    "zombie_head",
    "creeper_head",
    "mushroom_stem",
    "red_mushroom",
    "brown_mushroom",
    "apple",
    "chorus_fruit",
    "shulker_box",
];

/// Mob bucket suffix families (axolotl bucket, cod bucket, ...).
const MOB_BUCKET_PREFIXES: &[&str] = &[
    "axolotl", "cod", "salmon", "pufferfish", "tropical_fish", "tadpole",
];

/// Whether the item classifies as a terminal raw material.
pub fn is_raw_material(item: &ItemId) -> bool {
    let path = item.path();
    if RAW_MATERIALS.contains(&path) {
        return true;
    }
    // Concrete powder hardens in water; every colour is gathered, not crafted,
    // once placed. Treat hardened concrete as raw by pattern.
    if path.ends_with("_concrete") {
        return true;
    }
    // Oxidised copper families only come from waiting on placed copper.
    if path.contains("oxidized_") || path.contains("weathered_") || path.contains("exposed_") {
        return true;
    }
    // Mob-in-a-bucket items.
    if let Some(prefix) = path.strip_suffix("_bucket") {
        if MOB_BUCKET_PREFIXES.contains(&prefix) {
            return true;
        }
    }
    // Music discs are chest loot or creeper kills.
    if path.starts_with("music_disc_") {
        return true;
    }
    false
}

/// Mined gems and minerals: items a gather step should promote from plain
/// block gathering to ore mining, with the pickaxe tier the ore needs.
pub fn mined_mineral_tier(item: &ItemId) -> Option<ToolTier> {
    match item.path() {
        "coal" => Some(ToolTier::Wood),
        "raw_copper" | "raw_iron" | "lapis_lazuli" => Some(ToolTier::Stone),
        "raw_gold" | "diamond" | "emerald" | "redstone" => Some(ToolTier::Iron),
        "obsidian" | "crying_obsidian" | "ancient_debris" => Some(ToolTier::Diamond),
        "quartz" | "amethyst_shard" | "small_amethyst_bud" | "medium_amethyst_bud"
        | "large_amethyst_bud" | "amethyst_cluster" => Some(ToolTier::Wood),
        _ => None,
    }
}

/// Pickaxe tier required to break an ore block id, if it is one.
pub fn ore_block_tier(block: &ItemId) -> Option<ToolTier> {
    let path = block.path();
    let stripped = path.strip_prefix("deepslate_").unwrap_or(path);
    match stripped {
        "coal_ore" | "nether_quartz_ore" | "nether_gold_ore" => Some(ToolTier::Wood),
        "iron_ore" | "copper_ore" | "lapis_ore" => Some(ToolTier::Stone),
        "gold_ore" | "diamond_ore" | "emerald_ore" | "redstone_ore" => Some(ToolTier::Iron),
        "obsidian" | "ancient_debris" => Some(ToolTier::Diamond),
        _ => None,
    }
}

/// Which mob drops the item, with a danger classification for the planner.
pub fn mob_drop(item: &ItemId) -> Option<(&'static str, MobDifficulty)> {
    match item.path() {
        "string" | "spider_eye" => Some(("spider", MobDifficulty::Hostile)),
        "bone" | "skeleton_skull" => Some(("skeleton", MobDifficulty::Hostile)),
        "rotten_flesh" | "zombie_head" => Some(("zombie", MobDifficulty::Hostile)),
        "gunpowder" | "creeper_head" => Some(("creeper", MobDifficulty::Hostile)),
        "ender_pearl" => Some(("enderman", MobDifficulty::Dangerous)),
        "blaze_rod" => Some(("blaze", MobDifficulty::Dangerous)),
        "ghast_tear" => Some(("ghast", MobDifficulty::Dangerous)),
        "magma_cream" => Some(("magma cube", MobDifficulty::Hostile)),
        "slime_ball" => Some(("slime", MobDifficulty::Hostile)),
        "shulker_shell" => Some(("shulker", MobDifficulty::Dangerous)),
        "phantom_membrane" => Some(("phantom", MobDifficulty::Hostile)),
        "wither_skeleton_skull" => Some(("wither skeleton", MobDifficulty::Dangerous)),
        "nether_star" => Some(("wither", MobDifficulty::Dangerous)),
        "leather" | "beef" => Some(("cow", MobDifficulty::Passive)),
        "porkchop" => Some(("pig", MobDifficulty::Passive)),
        "chicken" | "feather" | "egg" => Some(("chicken", MobDifficulty::Passive)),
        "mutton" | "wool" | "white_wool" => Some(("sheep", MobDifficulty::Passive)),
        "rabbit" | "rabbit_hide" => Some(("rabbit", MobDifficulty::Passive)),
        "ink_sac" => Some(("squid", MobDifficulty::Passive)),
        "glow_ink_sac" => Some(("glow squid", MobDifficulty::Passive)),
        "prismarine_shard" | "prismarine_crystals" => Some(("guardian", MobDifficulty::Dangerous)),
        _ => None,
    }
}

/// Items no survival companion can obtain at all.
pub fn is_impossible(item: &ItemId) -> bool {
    matches!(
        item.path(),
        "command_block"
            | "chain_command_block"
            | "repeating_command_block"
            | "command_block_minecart"
            | "structure_block"
            | "structure_void"
            | "jigsaw"
            | "barrier"
            | "light"
            | "bedrock"
            | "end_portal_frame"
            | "spawner"
            | "reinforced_deepslate"
            | "debug_stick"
            | "knowledge_book"
            | "petrified_oak_slab"
            | "player_head"
    )
}

/// Advice shown to the user when an item resolves to Unknown.  Always returns
/// non-empty text; the table covers the notable loot-only cases and the
/// fallback names the item.
pub fn unknown_item_advice(item: &ItemId) -> String {
    let table: Option<&'static str> = match item.path() {
        "netherite_upgrade_smithing_template" => {
            Some("Loot-only from bastion remnants; I cannot craft the upgrade template.")
        }
        "heart_of_the_sea" => Some("Found only in buried treasure chests."),
        "totem_of_undying" => Some("Dropped by evokers during raids or in woodland mansions."),
        "trident" => Some("Dropped rarely by drowned; not craftable."),
        "elytra" => Some("Found only in end ships."),
        "dragon_egg" => Some("Spawns once, atop the exit portal after the dragon falls."),
        "nether_star" => Some("Dropped by the wither; a boss fight, not a recipe."),
        "sponge" | "wet_sponge" => Some("Dropped by elder guardians or found in ocean monuments."),
        "enchanted_golden_apple" => Some("Chest loot only; the crafting recipe was removed."),
        _ => None,
    };
    match table {
        Some(advice) => advice.to_string(),
        None => format!(
            "No recipe or gathering strategy known for {}; it may be loot-only or from another mod.",
            item
        ),
    }
}

/// Classify how a raw material is gathered.
pub fn gather_source(item: &ItemId) -> GatherSource {
    let path = item.path();
    if path.ends_with("_log") || path.ends_with("_stem") && !path.contains("mushroom") {
        return GatherSource::ChopTrees;
    }
    if mined_mineral_tier(item).is_some() {
        return GatherSource::MineOres;
    }
    if mob_drop(item).is_some() {
        return GatherSource::HuntMob;
    }
    if matches!(
        path,
        "cod" | "salmon" | "tropical_fish" | "pufferfish" | "nautilus_shell"
    ) {
        return GatherSource::Fish;
    }
    if matches!(
        path,
        "wheat"
            | "carrot"
            | "potato"
            | "beetroot"
            | "nether_wart"
            | "sugar_cane"
            | "pumpkin"
            | "melon_slice"
            | "sweet_berries"
            | "glow_berries"
            | "cocoa_beans"
            | "bamboo"
            | "cactus"
            | "kelp"
    ) {
        return GatherSource::Farm;
    }
    GatherSource::GatherBlocks
}

/// Nutrition points restored by eating the item, if edible.
pub fn food_value(item: &ItemId) -> Option<u32> {
    match item.path() {
        "apple" | "melon_slice" | "sweet_berries" | "glow_berries" => Some(2),
        "bread" | "cooked_cod" | "carrot" => Some(5),
        "baked_potato" | "cooked_chicken" | "cooked_mutton" => Some(6),
        "cooked_porkchop" | "cooked_beef" | "golden_carrot" => Some(8),
        "potato" | "beetroot" => Some(1),
        "porkchop" | "beef" | "chicken" | "mutton" | "rabbit" | "cod" | "salmon" => Some(2),
        "rotten_flesh" => Some(1),
        "golden_apple" | "enchanted_golden_apple" => Some(4),
        _ => None,
    }
}

/// Blocks affected by gravity; breaking below them drops the column.
pub fn is_gravity_block(block: &ItemId) -> bool {
    let path = block.path();
    matches!(path, "sand" | "red_sand" | "gravel" | "anvil" | "pointed_dripstone")
        || path.ends_with("_concrete_powder")
}

/// The block id an ore drop is mined from, for scan targeting
/// (`raw_iron` -> `iron_ore` + `deepslate_iron_ore`).
pub fn ore_blocks_for_drop(item: &ItemId) -> Vec<ItemId> {
    let bases: &[&str] = match item.path() {
        "coal" => &["coal_ore"],
        "raw_iron" => &["iron_ore"],
        "raw_copper" => &["copper_ore"],
        "raw_gold" => &["gold_ore"],
        "diamond" => &["diamond_ore"],
        "emerald" => &["emerald_ore"],
        "lapis_lazuli" => &["lapis_ore"],
        "redstone" => &["redstone_ore"],
        "quartz" => &["nether_quartz_ore"],
        "ancient_debris" => &["ancient_debris"],
        _ => return Vec::new(),
    };
    let mut blocks = Vec::with_capacity(bases.len() * 2);
    for base in bases {
        blocks.push(ItemId::new(*base));
        if *base != "nether_quartz_ore" && *base != "ancient_debris" {
            blocks.push(ItemId::new(format!("deepslate_{}", base)));
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_required_families() {
        for id in [
            "diamond",
            "small_amethyst_bud",
            "oxidized_copper",
            "red_concrete",
            "crimson_fungus",
            "verdant_froglight",
            "axolotl_bucket",
            "sculk_shrieker",
            "music_disc_cat",
        ] {
            assert!(is_raw_material(&ItemId::new(id)), "{} should be raw", id);
        }
        assert!(!is_raw_material(&ItemId::new("iron_pickaxe")));
        assert!(!is_raw_material(&ItemId::new("water_bucket")));
    }

    #[test]
    fn raw_table_is_large_enough() {
        assert!(RAW_MATERIALS.len() >= 60);
    }

    #[test]
    fn advice_is_never_empty() {
        assert!(!unknown_item_advice(&ItemId::new("elytra")).is_empty());
        assert!(!unknown_item_advice(&ItemId::new("modded:widget")).is_empty());
    }

    #[test]
    fn gather_sources_classify() {
        assert_eq!(
            gather_source(&ItemId::new("oak_log")),
            GatherSource::ChopTrees
        );
        assert_eq!(
            gather_source(&ItemId::new("raw_iron")),
            GatherSource::MineOres
        );
        assert_eq!(gather_source(&ItemId::new("wheat")), GatherSource::Farm);
        assert_eq!(
            gather_source(&ItemId::new("blaze_rod")),
            GatherSource::HuntMob
        );
        assert_eq!(
            gather_source(&ItemId::new("cobblestone")),
            GatherSource::GatherBlocks
        );
    }

    #[test]
    fn ore_blocks_include_deepslate_forms() {
        let blocks = ore_blocks_for_drop(&ItemId::new("raw_iron"));
        assert!(blocks.contains(&ItemId::new("iron_ore")));
        assert!(blocks.contains(&ItemId::new("deepslate_iron_ore")));
    }
}
