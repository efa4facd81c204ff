//! Furnace smelting: find a furnace, walk there, load, wait out the cook.

use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{Approach, ArrivalGate, HealthUpkeep};
use crate::blockmind::world::{BlockPos, ItemId, ItemStack};

/// Items one coal smelts.
const ITEMS_PER_COAL: u32 = 8;

enum Phase {
    FindFurnace,
    Approach,
    Load,
    Cook { remaining_ticks: u32 },
    Collect,
}

/// Smelt a batch of one input item into its output.
pub struct SmeltTask {
    input: ItemId,
    output: ItemId,
    count: u32,
    cook_time_per_item: u32,
    total_cook: u32,
    reach: f64,
    furnace: Option<BlockPos>,
    phase: Phase,
    gate: ArrivalGate,
    health: HealthUpkeep,
}

impl SmeltTask {
    pub fn new(
        input: ItemId,
        output: ItemId,
        count: u32,
        cook_time_per_item: u32,
        reach: f64,
    ) -> Self {
        let count = count.max(1);
        Self {
            input,
            output,
            count,
            cook_time_per_item: cook_time_per_item.max(1),
            total_cook: 0,
            reach,
            furnace: None,
            phase: Phase::FindFurnace,
            gate: ArrivalGate::new(),
            health: HealthUpkeep::new(),
        }
    }

    /// Consume fuel for the batch: coal/charcoal first, planks as a fallback.
    fn consume_fuel(&self, ctx: &mut TaskContext<'_>) -> bool {
        let coal_needed = self.count.div_ceil(ITEMS_PER_COAL);
        for fuel in ["coal", "charcoal"] {
            let fuel = ItemId::new(fuel);
            if ctx.companion.inventory.has(&fuel, coal_needed) {
                ctx.companion.inventory.remove(&fuel, coal_needed);
                return true;
            }
        }
        // Planks burn one item each.
        let planks = ctx
            .companion
            .inventory
            .contents()
            .into_iter()
            .find(|s| s.item.path().ends_with("_planks") && s.count >= self.count);
        if let Some(planks) = planks {
            ctx.companion.inventory.remove(&planks.item, self.count);
            return true;
        }
        false
    }
}

impl Task for SmeltTask {
    fn name(&self) -> &'static str {
        "smelt_items"
    }

    fn description(&self) -> String {
        format!(
            "Smelt {} x{} into {}",
            self.input.path(),
            self.count,
            self.output.path()
        )
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        self.health.tick(ctx);
        match self.phase {
            Phase::FindFurnace => {
                let targets = [ItemId::new("furnace"), ItemId::new("blast_furnace")];
                let found = ctx
                    .world
                    .scan_for_blocks(ctx.companion.position, &targets, 24, 1);
                match found.first().copied() {
                    Some(pos) => {
                        self.furnace = Some(pos);
                        self.gate.reset();
                        self.phase = Phase::Approach;
                        TaskTick::Continue
                    }
                    None => TaskTick::Fail("No furnace nearby to smelt in".to_string()),
                }
            }
            Phase::Approach => {
                let Some(furnace) = self.furnace else {
                    self.phase = Phase::FindFurnace;
                    return TaskTick::Continue;
                };
                match self.gate.approach(ctx, furnace, self.reach) {
                    Approach::Arrived => {
                        self.phase = Phase::Load;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => TaskTick::Fail("Can't reach the furnace".to_string()),
                }
            }
            Phase::Load => {
                if !ctx.companion.inventory.has(&self.input, self.count) {
                    return TaskTick::Fail(format!(
                        "I don't have {} x{} to smelt",
                        self.input.path(),
                        self.count
                    ));
                }
                if !self.consume_fuel(ctx) {
                    return TaskTick::Fail(
                        "I have no fuel (coal or planks) for the furnace".to_string(),
                    );
                }
                ctx.companion.inventory.remove(&self.input, self.count);
                self.total_cook = self.cook_time_per_item * self.count;
                self.phase = Phase::Cook {
                    remaining_ticks: self.total_cook,
                };
                TaskTick::Continue
            }
            Phase::Cook { remaining_ticks } => {
                if remaining_ticks <= 1 {
                    self.phase = Phase::Collect;
                } else {
                    self.phase = Phase::Cook {
                        remaining_ticks: remaining_ticks - 1,
                    };
                }
                TaskTick::Continue
            }
            Phase::Collect => {
                let _ = ctx
                    .companion
                    .inventory
                    .insert(ItemStack::new(self.output.clone(), self.count));
                TaskTick::Complete(format!(
                    "Smelted {} {} into {}",
                    self.count,
                    self.input.path(),
                    self.output.path()
                ))
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        match self.phase {
            Phase::Cook { remaining_ticks } if self.total_cook > 0 => {
                let done = self.total_cook - remaining_ticks;
                (done * 100 / self.total_cook) as i32
            }
            Phase::Collect => 99,
            _ => 0,
        }
    }
}
