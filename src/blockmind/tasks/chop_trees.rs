//! Tree chopping: scan for log blocks, walk to each trunk, fell it upward.

use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{
    break_block_guarded, Approach, ArrivalGate, HealthUpkeep,
};
use crate::blockmind::world::{BlockPos, ItemId, TagKey};

enum Phase {
    Scan,
    Approach,
    Chop,
}

/// Collect logs by felling nearby trees.
pub struct ChopTreesTask {
    target_logs: u32,
    radius: i32,
    reach: f64,
    collected: u32,
    phase: Phase,
    candidates: Vec<BlockPos>,
    current: Option<BlockPos>,
    denied: Vec<BlockPos>,
    gate: ArrivalGate,
    health: HealthUpkeep,
}

impl ChopTreesTask {
    pub fn new(target_logs: u32, radius: i32, reach: f64) -> Self {
        Self {
            target_logs: target_logs.max(1),
            radius,
            reach,
            collected: 0,
            phase: Phase::Scan,
            candidates: Vec::new(),
            current: None,
            denied: Vec::new(),
            gate: ArrivalGate::new(),
            health: HealthUpkeep::new(),
        }
    }

    fn log_targets(ctx: &TaskContext<'_>) -> Vec<ItemId> {
        let tagged = ctx.world.resolve_tag(&TagKey::new("logs"));
        if !tagged.is_empty() {
            return tagged;
        }
        // Worlds without tag data still have the vanilla set.
        [
            "oak_log",
            "spruce_log",
            "birch_log",
            "jungle_log",
            "acacia_log",
            "dark_oak_log",
            "mangrove_log",
            "cherry_log",
        ]
        .into_iter()
        .map(ItemId::new)
        .collect()
    }

    fn is_log(id: &ItemId) -> bool {
        id.path().ends_with("_log")
    }

    fn finish(&self) -> TaskTick {
        if self.collected > 0 {
            TaskTick::Complete(format!("Collected {} logs", self.collected))
        } else {
            TaskTick::Fail("No trees within reach".to_string())
        }
    }
}

impl Task for ChopTreesTask {
    fn name(&self) -> &'static str {
        "chop_trees"
    }

    fn description(&self) -> String {
        format!("Chop trees for {} logs", self.target_logs)
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        self.health.tick(ctx);
        if self.collected >= self.target_logs {
            return TaskTick::Complete(format!("Collected {} logs", self.collected));
        }
        match self.phase {
            Phase::Scan => {
                let targets = Self::log_targets(ctx);
                let center = ctx.companion.position;
                self.candidates = ctx
                    .world
                    .scan_for_blocks(center, &targets, self.radius, 16)
                    .into_iter()
                    .filter(|pos| !ctx.companion.is_tagged(*pos) && !self.denied.contains(pos))
                    .collect();
                match self.candidates.first().copied() {
                    Some(pos) => {
                        self.current = Some(pos);
                        self.candidates.remove(0);
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
                        self.phase = Phase::Chop;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => {
                        // Abandon this trunk, try the next candidate.
                        log::debug!("chop_trees: stuck approaching {}", target);
                        match self.candidates.first().copied() {
                            Some(next) => {
                                self.current = Some(next);
                                self.candidates.remove(0);
                                self.gate.reset();
                                TaskTick::Continue
                            }
                            None => self.finish(),
                        }
                    }
                }
            }
            Phase::Chop => {
                let Some(target) = self.current else {
                    self.phase = Phase::Scan;
                    return TaskTick::Continue;
                };
                match break_block_guarded(ctx, target) {
                    Ok(drops) => {
                        self.collected += drops
                            .iter()
                            .filter(|d| Self::is_log(&d.item))
                            .map(|d| d.count)
                            .sum::<u32>();
                        // Trunks grow up; keep chopping the column while it
                        // stays log, one block per tick.
                        let above = target.up();
                        if Self::is_log(&ctx.world.get_block(above).id) {
                            self.current = Some(above);
                        } else {
                            self.current = None;
                            self.phase = Phase::Scan;
                        }
                        TaskTick::Continue
                    }
                    Err(denied) => {
                        log::debug!("chop_trees: {}", denied.describe(target));
                        self.denied.push(target);
                        self.current = None;
                        self.phase = Phase::Scan;
                        TaskTick::Continue
                    }
                }
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        (self.collected * 100 / self.target_logs.max(1)).min(100) as i32
    }
}
