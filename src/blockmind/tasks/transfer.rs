//! Container logistics: deposit overflow into STORAGE, fetch items back out
//! of STORAGE/INPUT containers.

use crate::blockmind::companion::TagRole;
use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{Approach, ArrivalGate};
use crate::blockmind::world::{BlockPos, ItemId, ItemStack};

/// What the transfer task is doing.
#[derive(Debug, Clone)]
pub enum TransferMode {
    /// Move inventory stacks into STORAGE containers.  `item` narrows the
    /// transfer to one kind; `None` deposits everything stackable.
    Deposit { item: Option<ItemId> },
    /// Pull `count` of `item` out of STORAGE/INPUT containers.
    Fetch { item: ItemId, count: u32 },
}

enum Phase {
    PickContainer,
    Approach,
    Transfer,
}

/// Walk to tagged containers and move items in or out.
pub struct TransferTask {
    mode: TransferMode,
    reach: f64,
    /// Explicit container target; tagged containers are used when absent.
    explicit_target: Option<BlockPos>,
    targets_initialised: bool,
    remaining_targets: Vec<BlockPos>,
    current: Option<BlockPos>,
    moved: u32,
    phase: Phase,
    gate: ArrivalGate,
}

impl TransferTask {
    pub fn new(mode: TransferMode, reach: f64) -> Self {
        Self {
            mode,
            reach,
            explicit_target: None,
            targets_initialised: false,
            remaining_targets: Vec::new(),
            current: None,
            moved: 0,
            phase: Phase::PickContainer,
            gate: ArrivalGate::new(),
        }
    }

    /// Target one specific container instead of the tagged set.
    pub fn with_target(mut self, pos: BlockPos) -> Self {
        self.explicit_target = Some(pos);
        self
    }

    fn container_roles(&self) -> &'static [TagRole] {
        match self.mode {
            TransferMode::Deposit { .. } => &[TagRole::Storage],
            TransferMode::Fetch { .. } => &[TagRole::Storage, TagRole::Input],
        }
    }

    fn finish(&self) -> TaskTick {
        match &self.mode {
            TransferMode::Deposit { .. } => {
                if self.moved > 0 {
                    TaskTick::Complete(format!("Deposited {} items", self.moved))
                } else {
                    TaskTick::Fail("Nothing to deposit or no storage tagged".to_string())
                }
            }
            TransferMode::Fetch { item, count } => {
                if self.moved >= *count {
                    TaskTick::Complete(format!("Fetched {} x{}", item.path(), self.moved))
                } else if self.moved > 0 {
                    TaskTick::Complete(format!(
                        "Fetched {} x{} (wanted {})",
                        item.path(),
                        self.moved,
                        count
                    ))
                } else {
                    TaskTick::Fail(format!("Couldn't find any {} in storage", item.path()))
                }
            }
        }
    }
}

impl Task for TransferTask {
    fn name(&self) -> &'static str {
        "transfer_items"
    }

    fn description(&self) -> String {
        match &self.mode {
            TransferMode::Deposit { item: Some(item) } => {
                format!("Deposit {} into storage", item.path())
            }
            TransferMode::Deposit { item: None } => "Deposit items into storage".to_string(),
            TransferMode::Fetch { item, count } => {
                format!("Fetch {} x{} from storage", item.path(), count)
            }
        }
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        match self.phase {
            Phase::PickContainer => {
                if !self.targets_initialised {
                    self.targets_initialised = true;
                    self.remaining_targets = match self.explicit_target {
                        Some(pos) => vec![pos],
                        None => {
                            let mut targets = Vec::new();
                            for role in self.container_roles() {
                                targets.extend(ctx.companion.tagged_positions(*role));
                            }
                            let here = ctx.companion.position;
                            targets.sort_by_key(|p| p.distance_sq(here));
                            targets
                        }
                    };
                }
                if self.remaining_targets.is_empty() {
                    return self.finish();
                }
                self.current = Some(self.remaining_targets.remove(0));
                self.gate.reset();
                self.phase = Phase::Approach;
                TaskTick::Continue
            }
            Phase::Approach => {
                let Some(target) = self.current else {
                    self.phase = Phase::PickContainer;
                    return TaskTick::Continue;
                };
                match self.gate.approach(ctx, target, self.reach) {
                    Approach::Arrived => {
                        self.phase = Phase::Transfer;
                        TaskTick::Continue
                    }
                    Approach::Moving => TaskTick::Continue,
                    Approach::Stuck => {
                        log::debug!("transfer_items: stuck approaching {}", target);
                        self.current = None;
                        self.phase = Phase::PickContainer;
                        TaskTick::Continue
                    }
                }
            }
            Phase::Transfer => {
                let Some(target) = self.current else {
                    self.phase = Phase::PickContainer;
                    return TaskTick::Continue;
                };
                match &self.mode {
                    TransferMode::Deposit { item } => {
                        // One stack per tick keeps the tick bounded.
                        let stack = match item {
                            Some(wanted) => {
                                let count = ctx.companion.inventory.count_of(wanted);
                                if count == 0 {
                                    None
                                } else {
                                    ctx.companion.inventory.remove(wanted, count.min(64));
                                    Some(ItemStack::new(wanted.clone(), count.min(64)))
                                }
                            }
                            None => ctx.companion.inventory.take_first(|_| true),
                        };
                        match stack {
                            Some(stack) => {
                                let count = stack.count;
                                match ctx.world.insert_into_container(target, stack) {
                                    None => {
                                        self.moved += count;
                                        TaskTick::Continue
                                    }
                                    Some(remainder) => {
                                        self.moved += count - remainder.count;
                                        // Container full; keep the rest and
                                        // move on to the next container.
                                        let _ = ctx.companion.inventory.insert(remainder);
                                        self.current = None;
                                        self.phase = Phase::PickContainer;
                                        TaskTick::Continue
                                    }
                                }
                            }
                            None => self.finish(),
                        }
                    }
                    TransferMode::Fetch { item, count } => {
                        let still_needed = count.saturating_sub(self.moved);
                        if still_needed == 0 {
                            return self.finish();
                        }
                        let wanted = item.clone();
                        let pulled = ctx.world.extract_from_container(
                            target,
                            &|id| id == &wanted,
                            still_needed,
                        );
                        let got: u32 = pulled.iter().map(|s| s.count).sum();
                        for stack in pulled {
                            let _ = ctx.companion.inventory.insert(stack);
                        }
                        self.moved += got;
                        if self.moved >= *count {
                            self.finish()
                        } else {
                            // This container is dry; try the next one.
                            self.current = None;
                            self.phase = Phase::PickContainer;
                            TaskTick::Continue
                        }
                    }
                }
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        match &self.mode {
            TransferMode::Fetch { count, .. } if *count > 0 => {
                (self.moved * 100 / count).min(100) as i32
            }
            _ => -1,
        }
    }
}
