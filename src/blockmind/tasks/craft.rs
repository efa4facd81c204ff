//! Bench crafting: execute a prepared sequence of craft operations, one per
//! tick, walking to (or placing) a crafting table when any of them needs the
//! full grid.

use std::collections::VecDeque;

use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{Approach, ArrivalGate};
use crate::blockmind::world::{BlockPos, BlockState, ItemId, ItemStack};

/// One concrete craft operation with tags already resolved away.
#[derive(Debug, Clone)]
pub struct CraftOp {
    pub result: ItemId,
    /// Total items produced by this operation.
    pub count: u32,
    /// Total inputs consumed, per item kind.
    pub inputs: Vec<(ItemId, u32)>,
    /// Whether the 3x3 grid (a crafting table) is required.
    pub needs_bench: bool,
}

enum Phase {
    EnsureBench,
    ApproachBench,
    Work,
}

/// Run a prepared list of craft operations against the inventory.
pub struct CraftTask {
    ops: VecDeque<CraftOp>,
    total_ops: usize,
    done_ops: usize,
    reach: f64,
    bench: Option<BlockPos>,
    phase: Phase,
    gate: ArrivalGate,
    last_result: Option<ItemStack>,
}

impl CraftTask {
    pub fn new(ops: Vec<CraftOp>, reach: f64) -> Self {
        let needs_bench = ops.iter().any(|op| op.needs_bench);
        let total_ops = ops.len();
        Self {
            ops: ops.into(),
            total_ops,
            done_ops: 0,
            reach,
            bench: None,
            phase: if needs_bench {
                Phase::EnsureBench
            } else {
                Phase::Work
            },
            gate: ArrivalGate::new(),
            last_result: None,
        }
    }
}

impl Task for CraftTask {
    fn name(&self) -> &'static str {
        "craft_item"
    }

    fn description(&self) -> String {
        match self.ops.back() {
            Some(op) => format!("Craft {} x{}", op.result.path(), op.count),
            None => "Craft items".to_string(),
        }
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        match self.phase {
            Phase::EnsureBench => {
                let targets = [ItemId::new("crafting_table")];
                let found = ctx
                    .world
                    .scan_for_blocks(ctx.companion.position, &targets, 16, 1);
                if let Some(pos) = found.first().copied() {
                    self.bench = Some(pos);
                    self.gate.reset();
                    self.phase = Phase::ApproachBench;
                    return TaskTick::Continue;
                }
                // No table nearby; place one if we carry it.
                let table = ItemId::new("crafting_table");
                if ctx.companion.inventory.has(&table, 1) {
                    let spot = ctx.companion.position.offset(1, 0, 0);
                    ctx.companion.inventory.remove(&table, 1);
                    ctx.world.set_block(spot, BlockState::new(table));
                    self.bench = Some(spot);
                    self.phase = Phase::Work;
                    return TaskTick::Continue;
                }
                TaskTick::Fail("I need a crafting table and don't have one".to_string())
            }
            Phase::ApproachBench => {
                let Some(bench) = self.bench else {
                    self.phase = Phase::EnsureBench;
                    return TaskTick::Continue;
                };
                match self.gate.approach(ctx, bench, self.reach) {
                    Approach::Arrived => {
                        self.phase = Phase::Work;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => TaskTick::Fail("Can't reach the crafting table".to_string()),
                }
            }
            Phase::Work => {
                let Some(op) = self.ops.pop_front() else {
                    return match &self.last_result {
                        Some(stack) => TaskTick::Complete(format!(
                            "Crafted {} x{}",
                            stack.item.path(),
                            stack.count
                        )),
                        None => TaskTick::Complete("Nothing to craft".to_string()),
                    };
                };
                for (item, needed) in &op.inputs {
                    if !ctx.companion.inventory.has(item, *needed) {
                        return TaskTick::Fail(format!(
                            "Missing {} x{} for {}",
                            item.path(),
                            needed,
                            op.result.path()
                        ));
                    }
                }
                for (item, needed) in &op.inputs {
                    ctx.companion.inventory.remove(item, *needed);
                }
                let produced = ItemStack::new(op.result.clone(), op.count);
                let _ = ctx.companion.inventory.insert(produced.clone());
                self.last_result = Some(produced);
                self.done_ops += 1;
                TaskTick::Continue
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        if self.total_ops == 0 {
            return -1;
        }
        (self.done_ops * 100 / self.total_ops).min(100) as i32
    }
}
