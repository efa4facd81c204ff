//! Crop farming: harvest mature crops in an area and replant from seeds.

use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{
    break_block_guarded, Approach, ArrivalGate, HealthUpkeep,
};
use crate::blockmind::world::{BlockPos, BlockState, ItemId};

enum Phase {
    Scan,
    Approach,
    Harvest,
}

/// Harvest (and replant) one crop kind around the companion.
pub struct FarmTask {
    crop: ItemId,
    target: u32,
    radius: i32,
    reach: f64,
    harvested: u32,
    phase: Phase,
    candidates: Vec<BlockPos>,
    current: Option<BlockPos>,
    gate: ArrivalGate,
    health: HealthUpkeep,
}

impl FarmTask {
    pub fn new(crop: ItemId, target: u32, radius: i32, reach: f64) -> Self {
        Self {
            crop,
            target: target.max(1),
            radius,
            reach,
            harvested: 0,
            phase: Phase::Scan,
            candidates: Vec::new(),
            current: None,
            gate: ArrivalGate::new(),
            health: HealthUpkeep::new(),
        }
    }

    /// Seed item that replants this crop, when one exists.
    fn seed_item(&self) -> Option<ItemId> {
        match self.crop.path() {
            "wheat" => Some(ItemId::new("wheat_seeds")),
            "beetroots" | "beetroot" => Some(ItemId::new("beetroot_seeds")),
            "carrots" | "carrot" => Some(ItemId::new("carrot")),
            "potatoes" | "potato" => Some(ItemId::new("potato")),
            "nether_wart" => Some(ItemId::new("nether_wart")),
            _ => None,
        }
    }

    fn finish(&self) -> TaskTick {
        if self.harvested > 0 {
            TaskTick::Complete(format!(
                "Harvested {} {}",
                self.harvested,
                self.crop.path()
            ))
        } else {
            TaskTick::Fail(format!("No {} crops nearby", self.crop.path()))
        }
    }
}

impl Task for FarmTask {
    fn name(&self) -> &'static str {
        "farm_area"
    }

    fn description(&self) -> String {
        format!("Farm {} x{}", self.crop.path(), self.target)
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        self.health.tick(ctx);
        if self.harvested >= self.target {
            return TaskTick::Complete(format!(
                "Harvested {} {}",
                self.harvested,
                self.crop.path()
            ));
        }
        match self.phase {
            Phase::Scan => {
                let targets = [self.crop.clone()];
                self.candidates = ctx
                    .world
                    .scan_for_blocks(ctx.companion.position, &targets, self.radius, 24)
                    .into_iter()
                    .filter(|pos| !ctx.companion.is_tagged(*pos))
                    .collect();
                match self.candidates.first().copied() {
                    Some(pos) => {
                        self.candidates.remove(0);
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
                        self.phase = Phase::Harvest;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => {
                        self.current = None;
                        self.phase = Phase::Scan;
                        TaskTick::Continue
                    }
                }
            }
            Phase::Harvest => {
                let Some(target) = self.current.take() else {
                    self.phase = Phase::Scan;
                    return TaskTick::Continue;
                };
                match break_block_guarded(ctx, target) {
                    Ok(drops) => {
                        self.harvested += drops
                            .iter()
                            .filter(|d| d.item == self.crop || food_like(&d.item, &self.crop))
                            .map(|d| d.count)
                            .sum::<u32>()
                            .max(1);
                        if let Some(seed) = self.seed_item() {
                            if ctx.companion.inventory.remove(&seed, 1) == 1 {
                                ctx.world.set_block(target, BlockState::new(self.crop.clone()));
                            }
                        }
                    }
                    Err(denied) => {
                        log::debug!("farm_area: {}", denied.describe(target));
                    }
                }
                self.phase = Phase::Scan;
                TaskTick::Continue
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        (self.harvested * 100 / self.target.max(1)).min(100) as i32
    }
}

/// Crop block ids and their drop items differ slightly (`wheat` the block
/// drops `wheat` the item plus seeds); accept the obvious pairs.
fn food_like(drop: &ItemId, crop: &ItemId) -> bool {
    drop.path().trim_end_matches('s') == crop.path().trim_end_matches('s')
}
