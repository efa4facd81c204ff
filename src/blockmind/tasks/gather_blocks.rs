//! Generic surface-block gathering (dirt, sand, cobblestone, flowers, ...).

use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{
    break_block_guarded, Approach, ArrivalGate, HealthUpkeep,
};
use crate::blockmind::world::{BlockPos, ItemId};

enum Phase {
    Scan,
    Approach,
    Break,
}

/// Collect a number of one block kind from the surroundings.
pub struct GatherBlocksTask {
    block: ItemId,
    target: u32,
    radius: i32,
    reach: f64,
    gathered: u32,
    phase: Phase,
    candidates: Vec<BlockPos>,
    current: Option<BlockPos>,
    denied: Vec<BlockPos>,
    gate: ArrivalGate,
    health: HealthUpkeep,
}

impl GatherBlocksTask {
    pub fn new(block: ItemId, target: u32, radius: i32, reach: f64) -> Self {
        Self {
            block,
            target: target.max(1),
            radius,
            reach,
            gathered: 0,
            phase: Phase::Scan,
            candidates: Vec::new(),
            current: None,
            denied: Vec::new(),
            gate: ArrivalGate::new(),
            health: HealthUpkeep::new(),
        }
    }

    fn finish(&self) -> TaskTick {
        if self.gathered > 0 {
            TaskTick::Complete(format!(
                "Gathered {} {}",
                self.gathered,
                self.block.path()
            ))
        } else {
            TaskTick::Fail(format!("No {} found nearby", self.block.path()))
        }
    }
}

impl Task for GatherBlocksTask {
    fn name(&self) -> &'static str {
        "gather_blocks"
    }

    fn description(&self) -> String {
        format!("Gather {} x{}", self.block.path(), self.target)
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        self.health.tick(ctx);
        if self.gathered >= self.target {
            return TaskTick::Complete(format!(
                "Gathered {} {}",
                self.gathered,
                self.block.path()
            ));
        }
        match self.phase {
            Phase::Scan => {
                let center = ctx.companion.position;
                let targets = [self.block.clone()];
                self.candidates = ctx
                    .world
                    .scan_for_blocks(center, &targets, self.radius, 24)
                    .into_iter()
                    .filter(|pos| !ctx.companion.is_tagged(*pos) && !self.denied.contains(pos))
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
                        self.phase = Phase::Break;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => {
                        self.denied.push(target);
                        self.current = None;
                        self.phase = Phase::Scan;
                        TaskTick::Continue
                    }
                }
            }
            Phase::Break => {
                let Some(target) = self.current.take() else {
                    self.phase = Phase::Scan;
                    return TaskTick::Continue;
                };
                match break_block_guarded(ctx, target) {
                    Ok(drops) => {
                        let matching: u32 = drops
                            .iter()
                            .filter(|d| d.item == self.block)
                            .map(|d| d.count)
                            .sum();
                        // Blocks that drop something else (stone -> cobble)
                        // still count as one gathered block.
                        self.gathered += matching.max(1);
                    }
                    Err(denied) => {
                        log::debug!("gather_blocks: {}", denied.describe(target));
                        self.denied.push(target);
                    }
                }
                self.phase = Phase::Scan;
                TaskTick::Continue
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        (self.gathered * 100 / self.target.max(1)).min(100) as i32
    }
}
