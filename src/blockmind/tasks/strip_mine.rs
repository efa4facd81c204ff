//! Strip mining: dig a two-high tunnel at a target depth, one face at a time.
//!
//! Every advanced face is a fresh waypoint behind the arrival gate; the task
//! never digs a face the companion has not physically reached, and a face it
//! cannot reach within the stuck timeout fails the task.  Lava pockets along
//! the line get sealed with cobblestone and dug through, or left standing as
//! a wall when the cobblestone runs out; either way the tunnel keeps going.
//! The dug mine is recorded on the companion so later sessions can return to
//! it.

use crate::blockmind::companion::MineRecord;
use crate::blockmind::recipes::materials::ore_block_tier;
use crate::blockmind::task_engine::{Task, TaskContext, TaskTick};
use crate::blockmind::tasks::safety::{
    break_block_guarded, Approach, ArrivalGate, BreakDenied, HealthUpkeep, ToolUpkeep,
};
use crate::blockmind::world::{BlockPos, Direction};

enum Phase {
    ToFace,
    Dig,
}

/// Dig a straight two-high tunnel of a given length at a target depth.
pub struct StripMineTask {
    mine_name: String,
    target_y: i32,
    direction: Direction,
    length: u32,
    reach: f64,
    face: Option<BlockPos>,
    tunnel_progress: u32,
    ores_found: u32,
    faces_walled_off: u32,
    phase: Phase,
    gate: ArrivalGate,
    tools: ToolUpkeep,
    health: HealthUpkeep,
}

impl StripMineTask {
    pub fn new(
        mine_name: impl Into<String>,
        target_y: i32,
        direction: Direction,
        length: u32,
        reach: f64,
    ) -> Self {
        Self {
            mine_name: mine_name.into(),
            target_y,
            direction,
            length: length.max(1),
            reach,
            face: None,
            tunnel_progress: 0,
            ores_found: 0,
            faces_walled_off: 0,
            phase: Phase::ToFace,
            gate: ArrivalGate::new(),
            tools: ToolUpkeep::new(),
            health: HealthUpkeep::new(),
        }
    }

    pub fn tunnel_progress(&self) -> u32 {
        self.tunnel_progress
    }

    fn advance_face(&mut self, from: BlockPos) -> BlockPos {
        let (dx, dz) = self.direction.step();
        BlockPos::new(from.x + dx, from.y, from.z + dz)
    }

    /// Leave the current face standing as a wall and tunnel on past it.
    /// Counts towards tunnel progress so the task still terminates.
    fn wall_off_face(&mut self, face: BlockPos) {
        self.faces_walled_off += 1;
        self.tunnel_progress += 1;
        self.face = Some(self.advance_face(face));
        self.gate.reset();
        self.phase = Phase::ToFace;
    }

    fn completion_message(&self) -> String {
        let mut message = format!(
            "Tunnel '{}' complete: {} blocks dug, {} ore blocks found",
            self.mine_name, self.tunnel_progress, self.ores_found
        );
        if self.faces_walled_off > 0 {
            message.push_str(&format!(
                ", {} faces left walled off",
                self.faces_walled_off
            ));
        }
        message
    }
}

impl Task for StripMineTask {
    fn name(&self) -> &'static str {
        "strip_mine"
    }

    fn description(&self) -> String {
        format!(
            "Strip mine '{}' at y={} heading {}",
            self.mine_name, self.target_y, self.direction
        )
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) {
        let entrance = ctx.companion.position;
        let first_face = BlockPos::new(
            entrance.x + self.direction.step().0,
            self.target_y,
            entrance.z + self.direction.step().1,
        );
        self.face = Some(first_face);
        ctx.companion.mines.push(MineRecord {
            name: self.mine_name.clone(),
            entrance,
            target_y: self.target_y,
            direction: self.direction,
            hub: None,
        });
    }

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick {
        self.health.tick(ctx);
        if let Err(reason) = self.tools.ensure_pickaxe(ctx) {
            return TaskTick::Fail(reason);
        }
        if self.tunnel_progress >= self.length {
            return TaskTick::Complete(self.completion_message());
        }
        let Some(face) = self.face else {
            return TaskTick::Fail("Strip mine has no tunnel face".to_string());
        };
        match self.phase {
            Phase::ToFace => match self.gate.approach(ctx, face, self.reach) {
                Approach::Arrived => {
                    self.phase = Phase::Dig;
                    TaskTick::Continue
                }
                Approach::Moving => TaskTick::Continue,
                Approach::Stuck => TaskTick::Fail("Can't reach tunnel face".to_string()),
            },
            Phase::Dig => {
                // Two-high face: feet block and head block.
                for pos in [face, face.up()] {
                    let block = ctx.world.get_block(pos);
                    let was_ore = ore_block_tier(&block.id).is_some();
                    match break_block_guarded(ctx, pos) {
                        Ok(drops) => {
                            if was_ore && !drops.is_empty() {
                                self.ores_found += 1;
                            }
                        }
                        Err(BreakDenied::Lava) => {
                            // The guard walls the pocket off when cobblestone
                            // is on hand; a sealed face digs clean next tick.
                            ctx.companion.chat.warn(
                                ctx.now_tick,
                                format!("Hit lava at {}; sealing it off.", pos),
                            );
                            if ctx.world.adjacent_fluid_is_lava(pos) {
                                // Out of cobblestone: leave this face as a
                                // wall and tunnel on past it.
                                log::debug!("strip_mine: cannot seal {}; walling off", pos);
                                self.wall_off_face(face);
                            }
                            return TaskTick::Continue;
                        }
                        Err(denied) => {
                            log::debug!("strip_mine: {}", denied.describe(pos));
                            self.wall_off_face(face);
                            return TaskTick::Continue;
                        }
                    }
                }
                self.tunnel_progress += 1;
                self.face = Some(self.advance_face(face));
                self.gate.reset();
                self.phase = Phase::ToFace;
                TaskTick::Continue
            }
        }
    }

    fn progress_percent(&self) -> i32 {
        (self.tunnel_progress * 100 / self.length.max(1)).min(100) as i32
    }
}
