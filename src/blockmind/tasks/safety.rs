//! Shared safety layer for world-mutating tasks.
//!
//! Invariants enforced here, for every task that breaks blocks:
//! tagged blocks and the home area are untouchable, nothing gets broken next
//! to lava (the pocket is walled off with cobblestone when the inventory has
//! some), falling columns above a broken position are taken down (bounded),
//! a usable pickaxe is kept available (auto-crafting down the tier ladder,
//! pulling materials from STORAGE), and the companion eats before it starves.

use crate::blockmind::chat::ChatCategory;
use crate::blockmind::companion::TagRole;
use crate::blockmind::recipes::materials::{food_value, is_gravity_block};
use crate::blockmind::task_engine::TaskContext;
use crate::blockmind::world::{BlockPos, BlockState, ItemId, ItemStack, ToolTier};

/// Ticks a task waits on one waypoint before declaring navigation stuck.
pub const STUCK_TIMEOUT_TICKS: u32 = 60;

/// Ticks between pickaxe checks.
pub const TOOL_CHECK_INTERVAL: u64 = 100;

/// Maximum height of a falling column handled above a broken block.
pub const FALLING_COLUMN_LIMIT: usize = 10;

/// Navigation requests are re-issued this often while en route.
const NAV_REISSUE_INTERVAL: u64 = 5;

/// Health fraction below which the companion tries to eat.
const EAT_THRESHOLD: f32 = 0.5;

/// Health fraction below which a missing-food warning fires.
const WARN_THRESHOLD: f32 = 0.3;

/// Outcome of one arrival-gate poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approach {
    Arrived,
    Moving,
    Stuck,
}

/// Gates task phase advancement on physical arrival at a waypoint.
///
/// Navigation is fire-and-forget on the adapter, so the gate re-issues the
/// request every few ticks and gives up after [`STUCK_TIMEOUT_TICKS`].
/// Without this, a task would advance while the companion stands still.
#[derive(Default)]
pub struct ArrivalGate {
    target: Option<BlockPos>,
    waiting_ticks: u32,
    last_nav_tick: Option<u64>,
}

impl ArrivalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll progress towards `pos`; call once per tick while approaching.
    pub fn approach(&mut self, ctx: &mut TaskContext<'_>, pos: BlockPos, radius: f64) -> Approach {
        if self.target != Some(pos) {
            self.target = Some(pos);
            self.waiting_ticks = 0;
            self.last_nav_tick = None;
        }
        if ctx.world.is_in_reach(ctx.companion.id, pos, radius) {
            self.waiting_ticks = 0;
            return Approach::Arrived;
        }
        let due = match self.last_nav_tick {
            None => true,
            Some(last) => ctx.now_tick.saturating_sub(last) >= NAV_REISSUE_INTERVAL,
        };
        if due {
            ctx.world.navigate(ctx.companion.id, pos, 1.0);
            self.last_nav_tick = Some(ctx.now_tick);
        }
        self.waiting_ticks += 1;
        if self.waiting_ticks > STUCK_TIMEOUT_TICKS {
            Approach::Stuck
        } else {
            Approach::Moving
        }
    }

    /// Forget the current waypoint (e.g. after arriving or abandoning it).
    pub fn reset(&mut self) {
        self.target = None;
        self.waiting_ticks = 0;
        self.last_nav_tick = None;
    }
}

/// Why a guarded break refused to touch a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakDenied {
    Tagged,
    HomeArea,
    Lava,
}

impl BreakDenied {
    pub fn describe(&self, pos: BlockPos) -> String {
        match self {
            BreakDenied::Tagged => format!("block at {} is tagged; leaving it alone", pos),
            BreakDenied::HomeArea => format!("{} is inside the home area; not digging there", pos),
            BreakDenied::Lava => format!("lava next to {}; not digging through", pos),
        }
    }
}

/// Check whether the companion is allowed to break the block at `pos`.
pub fn can_break(ctx: &TaskContext<'_>, pos: BlockPos) -> Result<(), BreakDenied> {
    if ctx.companion.is_tagged(pos) {
        return Err(BreakDenied::Tagged);
    }
    if let Some(home) = &ctx.companion.home_area {
        if home.contains(pos) {
            return Err(BreakDenied::HomeArea);
        }
    }
    if ctx.world.adjacent_fluid_is_lava(pos) {
        return Err(BreakDenied::Lava);
    }
    Ok(())
}

/// Wall off lava faces around `pos` with cobblestone from the inventory.
/// Returns how many faces were sealed; stops when the cobblestone runs out.
/// A fully sealed position passes [`can_break`] on the next attempt.
pub fn seal_lava_faces(ctx: &mut TaskContext<'_>, pos: BlockPos) -> u32 {
    let cobble = ItemId::new("cobblestone");
    let mut sealed = 0;
    for neighbour in pos.neighbours() {
        let id = ctx.world.get_block(neighbour).id;
        if id.path() != "lava" && id.path() != "flowing_lava" {
            continue;
        }
        if ctx.companion.inventory.remove(&cobble, 1) == 0 {
            break;
        }
        ctx.world.set_block(neighbour, BlockState::new(cobble.clone()));
        sealed += 1;
    }
    sealed
}

/// Break one block with all safety checks, equipping the best tool first and
/// clearing any falling column above.  Drops land in the companion inventory;
/// what does not fit is discarded with a log line.
///
/// A lava-adjacent position is refused, but the pocket gets walled off with
/// cobblestone where the inventory allows; once every lava face is sealed the
/// same position breaks cleanly on the next call.
pub fn break_block_guarded(
    ctx: &mut TaskContext<'_>,
    pos: BlockPos,
) -> Result<Vec<ItemStack>, BreakDenied> {
    if let Err(denied) = can_break(ctx, pos) {
        if denied == BreakDenied::Lava {
            let sealed = seal_lava_faces(ctx, pos);
            if sealed > 0 {
                log::debug!("sealed {} lava face(s) next to {}", sealed, pos);
            }
        }
        return Err(denied);
    }

    let state = ctx.world.get_block(pos);
    if state.is_air() {
        return Ok(Vec::new());
    }
    ctx.world.equip_best_tool_for_block(ctx.companion.id, &state);
    let mut drops = ctx.world.destroy_block(pos, true);

    // Sand and gravel above the hole come down; take the column with it.
    let mut above = pos.up();
    for _ in 0..FALLING_COLUMN_LIMIT {
        let above_state = ctx.world.get_block(above);
        if !is_gravity_block(&above_state.id) {
            break;
        }
        drops.extend(ctx.world.destroy_block(above, true));
        above = above.up();
    }

    for stack in &drops {
        if let Some(remainder) = ctx.companion.inventory.insert(stack.clone()) {
            log::debug!("inventory full; discarding {}", remainder);
        }
    }
    Ok(drops)
}

/// Materials consumed by one pickaxe craft at each tier, head material first.
/// Stick demand is constant.
const PICKAXE_LADDER: &[(ToolTier, &str, &str)] = &[
    (ToolTier::Diamond, "minecraft:diamond", "diamond"),
    (ToolTier::Iron, "minecraft:iron_ingot", "iron"),
    (ToolTier::Stone, "minecraft:cobblestone", "stone"),
    (ToolTier::Wood, "minecraft:oak_planks", "wooden"),
];

/// Periodic pickaxe upkeep: verifies a usable pickaxe exists, auto-crafting
/// one down the Diamond -> Iron -> Stone -> Wood ladder when missing, pulling
/// head materials from STORAGE containers as needed.
#[derive(Default)]
pub struct ToolUpkeep {
    next_check_tick: u64,
}

impl ToolUpkeep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a pickaxe is available; errors are user-facing failure reasons.
    pub fn ensure_pickaxe(&mut self, ctx: &mut TaskContext<'_>) -> Result<(), String> {
        if ctx.now_tick < self.next_check_tick {
            return Ok(());
        }
        self.next_check_tick = ctx.now_tick + TOOL_CHECK_INTERVAL;

        if ctx.companion.inventory.best_pickaxe_tier().is_some() {
            return Ok(());
        }

        for (_, head_item, label) in PICKAXE_LADDER {
            let head = ItemId::new(*head_item);
            if !self.ensure_material(ctx, &head, 3) {
                continue;
            }
            if !self.ensure_sticks(ctx) {
                continue;
            }
            ctx.companion.inventory.remove(&head, 3);
            ctx.companion.inventory.remove(&ItemId::new("stick"), 2);
            let pickaxe = ItemId::new(format!("{}_pickaxe", label));
            let _ = ctx.companion.inventory.insert(ItemStack::new(pickaxe, 1));
            ctx.companion.chat.say(
                ChatCategory::Progress,
                ctx.now_tick,
                format!("Crafted a {} pickaxe to keep going.", label),
            );
            return Ok(());
        }

        Err("I have no pickaxe and no materials to craft one.".to_string())
    }

    /// Have `count` of `item`, pulling the shortfall from STORAGE containers.
    fn ensure_material(&self, ctx: &mut TaskContext<'_>, item: &ItemId, count: u32) -> bool {
        let have = ctx.companion.inventory.count_of(item);
        if have >= count {
            return true;
        }
        let mut missing = count - have;
        for pos in ctx.companion.tagged_positions(TagRole::Storage) {
            if missing == 0 {
                break;
            }
            let wanted = item.clone();
            let pulled = ctx
                .world
                .extract_from_container(pos, &|id| id == &wanted, missing);
            for stack in pulled {
                missing = missing.saturating_sub(stack.count);
                let _ = ctx.companion.inventory.insert(stack);
            }
        }
        ctx.companion.inventory.count_of(item) >= count
    }

    fn ensure_sticks(&self, ctx: &mut TaskContext<'_>) -> bool {
        let stick = ItemId::new("stick");
        if self.ensure_material(ctx, &stick, 2) {
            return true;
        }
        // Two planks craft four sticks.
        let planks = ctx
            .companion
            .inventory
            .contents()
            .into_iter()
            .find(|s| s.item.path().ends_with("_planks") && s.count >= 2);
        if let Some(planks) = planks {
            ctx.companion.inventory.remove(&planks.item, 2);
            let _ = ctx.companion.inventory.insert(ItemStack::new("stick", 4));
            return true;
        }
        false
    }
}

/// Periodic health upkeep: below half health the companion eats from its
/// inventory, then from STORAGE; below 30% with no food it warns once.
#[derive(Default)]
pub struct HealthUpkeep {
    warned: bool,
}

impl HealthUpkeep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, ctx: &mut TaskContext<'_>) {
        let fraction = ctx.companion.health_fraction();
        if fraction >= EAT_THRESHOLD {
            return;
        }
        if self.eat_from_inventory(ctx) || self.eat_from_storage(ctx) {
            return;
        }
        if fraction < WARN_THRESHOLD && !self.warned {
            self.warned = true;
            ctx.companion.chat.warn(
                ctx.now_tick,
                "I'm hurt and out of food — I could use something to eat.",
            );
        }
    }

    fn eat_from_inventory(&self, ctx: &mut TaskContext<'_>) -> bool {
        let food = ctx
            .companion
            .inventory
            .contents()
            .into_iter()
            .find_map(|s| food_value(&s.item).map(|v| (s.item, v)));
        match food {
            Some((item, value)) => {
                ctx.companion.inventory.remove(&item, 1);
                heal(ctx, value);
                true
            }
            None => false,
        }
    }

    fn eat_from_storage(&self, ctx: &mut TaskContext<'_>) -> bool {
        for pos in ctx.companion.tagged_positions(TagRole::Storage) {
            let pulled = ctx
                .world
                .extract_from_container(pos, &|id| food_value(id).is_some(), 1);
            if let Some(stack) = pulled.into_iter().next() {
                let value = food_value(&stack.item).unwrap_or(1);
                heal(ctx, value);
                return true;
            }
        }
        false
    }
}

fn heal(ctx: &mut TaskContext<'_>, food: u32) {
    let companion = &mut *ctx.companion;
    companion.health = (companion.health + food as f32).min(companion.max_health);
}
