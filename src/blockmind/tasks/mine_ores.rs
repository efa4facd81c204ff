//! Ore mining: scan for exposed ore blocks, visit them nearest-first, dig.
//!
//! The task respects harvest tiers: ores the carried pickaxe cannot break are
//! skipped rather than wasted time on, and the tool upkeep ladder keeps a
//! pickaxe in the inventory for as long as materials allow.

use crate::blockmind::recipes::materials::{ore_block_tier, ore_blocks_for_drop};
use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{
    break_block_guarded, Approach, ArrivalGate, HealthUpkeep, ToolUpkeep,
};
use crate::blockmind::world::{BlockPos, ItemId, ToolTier};

enum Phase {
    Scan,
    Approach,
    Mine,
}

/// Mine a number of ore blocks of one kind.
pub struct MineOresTask {
    ore_blocks: Vec<ItemId>,
    label: String,
    target: u32,
    radius: i32,
    reach: f64,
    mined: u32,
    phase: Phase,
    candidates: Vec<BlockPos>,
    current: Option<BlockPos>,
    denied: Vec<BlockPos>,
    gate: ArrivalGate,
    tools: ToolUpkeep,
    health: HealthUpkeep,
}

impl MineOresTask {
    /// `ore` may be a drop item (`raw_iron`), an ore block (`iron_ore`), or a
    /// bare metal name (`iron`).
    pub fn new(ore: &ItemId, target: u32, radius: i32, reach: f64) -> Self {
        let ore_blocks = Self::ore_blocks(ore);
        Self {
            ore_blocks,
            label: ore.path().to_string(),
            target: target.max(1),
            radius,
            reach,
            mined: 0,
            phase: Phase::Scan,
            candidates: Vec::new(),
            current: None,
            denied: Vec::new(),
            gate: ArrivalGate::new(),
            tools: ToolUpkeep::new(),
            health: HealthUpkeep::new(),
        }
    }

    fn ore_blocks(ore: &ItemId) -> Vec<ItemId> {
        let from_drop = ore_blocks_for_drop(ore);
        if !from_drop.is_empty() {
            return from_drop;
        }
        let path = ore.path();
        if path.ends_with("_ore") || path == "ancient_debris" {
            let mut blocks = vec![ore.clone()];
            if !path.starts_with("deepslate_") && !path.starts_with("nether_") {
                blocks.push(ItemId::new(format!("deepslate_{}", path)));
            }
            return blocks;
        }
        // Bare metal name: "iron" -> iron_ore + deepslate_iron_ore.
        vec![
            ItemId::new(format!("{}_ore", path)),
            ItemId::new(format!("deepslate_{}_ore", path)),
        ]
    }

    /// Whether the carried pickaxe can harvest the ore at `pos`.
    fn tier_allows(&self, ctx: &TaskContext<'_>, pos: BlockPos) -> bool {
        let block = ctx.world.get_block(pos);
        let required = ore_block_tier(&block.id).unwrap_or(ToolTier::Wood);
        match ctx.companion.inventory.best_pickaxe_tier() {
            Some(tier) => tier >= required,
            None => false,
        }
    }

    fn next_candidate(&mut self) -> Option<BlockPos> {
        if self.candidates.is_empty() {
            return None;
        }
        let pos = self.candidates.remove(0);
        Some(pos)
    }

    fn finish(&self) -> TaskTick {
        if self.mined > 0 {
            TaskTick::Complete(format!("Mined {} {} blocks", self.mined, self.label))
        } else {
            TaskTick::Fail("Could not reach any ore blocks".to_string())
        }
    }
}

impl Task for MineOresTask {
    fn name(&self) -> &'static str {
        "mine_ores"
    }

    fn description(&self) -> String {
        format!("Mine {} x{}", self.label, self.target)
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        self.health.tick(ctx);
        if let Err(reason) = self.tools.ensure_pickaxe(ctx) {
            return TaskTick::Fail(reason);
        }
        if self.mined >= self.target {
            return TaskTick::Complete(format!("Mined {} {} blocks", self.mined, self.label));
        }
        match self.phase {
            Phase::Scan => {
                let center = ctx.companion.position;
                self.candidates = ctx
                    .world
                    .scan_for_blocks(center, &self.ore_blocks, self.radius, 24)
                    .into_iter()
                    .filter(|pos| {
                        !ctx.companion.is_tagged(*pos)
                            && !self.denied.contains(pos)
                            && self.tier_allows(ctx, *pos)
                    })
                    .collect();
                match self.next_candidate() {
                    Some(pos) => {
                        self.current = Some(pos);
                        self.gate.reset();
                        self.phase = Phase::Approach;
                        TaskTick::Continue
                    }
                    None => self.finish(),
                }
            }
            Phase::Approach => {
                let Some(target) = self.current else {
                    self.phase = Phase::Scan;
                    return TaskTick::Continue;
                };
                match self.gate.approach(ctx, target, self.reach) {
                    Approach::Arrived => {
                        self.phase = Phase::Mine;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => {
                        log::debug!("mine_ores: stuck approaching {}", target);
                        self.denied.push(target);
                        match self.next_candidate() {
                            Some(next) => {
                                self.current = Some(next);
                                self.gate.reset();
                                TaskTick::Continue
                            }
                            None => self.finish(),
                        }
                    }
                }
            }
            Phase::Mine => {
                let Some(target) = self.current.take() else {
                    self.phase = Phase::Scan;
                    return TaskTick::Continue;
                };
                match break_block_guarded(ctx, target) {
                    Ok(_) => {
                        self.mined += 1;
                    }
                    Err(denied) => {
                        log::debug!("mine_ores: {}", denied.describe(target));
                        self.denied.push(target);
                    }
                }
                self.phase = match self.next_candidate() {
                    Some(next) => {
                        self.current = Some(next);
                        self.gate.reset();
                        Phase::Approach
                    }
                    None => Phase::Scan,
                };
                TaskTick::Continue
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        (self.mined * 100 / self.target.max(1)).min(100) as i32
    }
}
