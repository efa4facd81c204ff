//! Per-companion queued scheduler of tick-driven tasks.
//!
//! One engine runs one task at a time, strictly FIFO (with a priority
//! prepend).  The engine owns the task lifecycle: PENDING -> RUNNING happens
//! exactly once when a task is popped, RUNNING ends in exactly one of
//! COMPLETED/FAILED, and `cleanup` runs exactly once after the terminal
//! status.  Completion fires the attached [`Continuation`] — deterministically
//! when the next-steps text parses as a literal tool call, through the LLM
//! otherwise — via the [`ContinuationSink`] seam so the engine never blocks
//! on async work.
//!
//! The engine also keeps the companion's chunk loaded while work is pending
//! (releasing the ticket after an idle grace window) and schedules deferred
//! continuation retries in tick units, so they pause with the game.

use serde_json::Value;
use std::collections::VecDeque;

use crate::blockmind::chat::ChatCategory;
use crate::blockmind::companion::{Companion, TagRole};
use crate::blockmind::continuation::{parse_deterministic_call, Continuation};
use crate::blockmind::world::{BlockPos, WorldAdapter};

/// Ticks of idleness before the chunk keep-alive ticket is released.
pub const IDLE_RELEASE_TICKS: u64 = 1_200;

/// Progress announcements are throttled to once per this many ticks.
const PROGRESS_ANNOUNCE_INTERVAL: u64 = 200;

/// Chunk ticket lifetime; refreshed whenever the companion changes chunk.
const CHUNK_TICKET_TTL: u32 = 2_400;

/// XP awarded per completed task.
const TASK_XP: u64 = 10;

/// Per-item count kept in the inventory during auto-deposit; the excess goes
/// to STORAGE-tagged containers.
const AUTO_DEPOSIT_KEEP: u32 = 32;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Verdict a task returns from one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTick {
    Continue,
    Complete(String),
    Fail(String),
}

/// World access handed to a task for one tick.  Everything here lives on the
/// server tick thread.
pub struct TaskContext<'a> {
    pub world: &'a mut dyn WorldAdapter,
    pub companion: &'a mut Companion,
    pub now_tick: u64,
}

/// A tick-driven state machine encapsulating one physical-world activity.
///
/// `tick` must return promptly: a few block operations and at most one
/// navigation dispatch per call.  Long waits are expressed by returning
/// [`TaskTick::Continue`] until the world catches up.
pub trait Task: Send {
    fn name(&self) -> &'static str;

    fn description(&self) -> String;

    /// Called once, on the tick the task becomes active.
    fn start(&mut self, _ctx: &mut TaskContext<'_>) {}

    fn tick(&mut self, ctx: &mut TaskContext<'_>) -> TaskTick;

    /// Called exactly once after the task reaches a terminal status (or is
    /// cancelled mid-run).
    fn cleanup(&mut self, _ctx: &mut TaskContext<'_>) {}

    /// Percent complete, or -1 when indeterminate.
    fn progress_percent(&self) -> i32 {
        -1
    }
}

/// Deterministic continuation hand-off: a parsed tool call to run without
/// consulting the model.
#[derive(Debug)]
pub struct ToolResume {
    pub continuation: Continuation,
    pub companion_name: String,
    pub tool: String,
    pub args: Value,
    pub task_result: String,
    /// History line recording the automatic chaining.
    pub note: String,
}

/// LLM continuation hand-off: a synthetic message to inject into a fresh
/// agent loop.
#[derive(Debug)]
pub struct LlmResume {
    pub continuation: Continuation,
    pub companion_name: String,
    pub message: String,
}

/// Seam between the tick thread and the async dispatcher.  Implementations
/// must not block; the production sink spawns onto the dispatcher's worker.
pub trait ContinuationSink {
    fn resume_with_tool(&mut self, resume: ToolResume);
    fn resume_with_llm(&mut self, resume: LlmResume);
}

struct QueuedEntry {
    task: Box<dyn Task>,
    continuation: Option<Continuation>,
}

struct ActiveEntry {
    task: Box<dyn Task>,
    continuation: Option<Continuation>,
    ticks_running: u64,
    last_announced_percent: i32,
    last_announce_tick: u64,
    outcome: Option<TaskTick>,
    cancelled: bool,
}

/// A scheduled deferred continuation, counted in ticks so it pauses with the
/// game.
struct PendingRetry {
    continuation: Continuation,
    result: String,
    task_name: String,
    attempt: u32,
    ticks_remaining: u32,
}

/// FIFO task scheduler for one companion.
#[derive(Default)]
pub struct TaskEngine {
    queue: VecDeque<QueuedEntry>,
    active: Option<ActiveEntry>,
    pending_retry: Option<PendingRetry>,
    idle_ticks: u64,
    keepalive: Option<BlockPos>,
}

impl TaskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the queue.  Callers that hold the companion should
    /// also clear its owner-interacting freeze so it can start moving.
    pub fn queue_task(&mut self, task: Box<dyn Task>, continuation: Option<Continuation>) {
        log::info!("queueing task: {}", task.description());
        self.queue.push_back(QueuedEntry { task, continuation });
        self.idle_ticks = 0;
    }

    /// Prepend a priority task.
    pub fn queue_task_first(&mut self, task: Box<dyn Task>, continuation: Option<Continuation>) {
        log::info!("queueing priority task: {}", task.description());
        self.queue.push_front(QueuedEntry { task, continuation });
        self.idle_ticks = 0;
    }

    /// Cancel the active task; it observes cancellation at the next tick
    /// boundary and runs `cleanup` there.
    pub fn cancel_active(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.cancelled = true;
        }
    }

    /// Cancel the active task and drop everything queued behind it.
    pub fn cancel_all(&mut self) {
        self.cancel_active();
        self.queue.clear();
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn has_active_task(&self) -> bool {
        self.active.is_some()
    }

    /// Description of the active task, if any.
    pub fn active_description(&self) -> Option<String> {
        self.active.as_ref().map(|a| a.task.description())
    }

    pub fn active_progress_percent(&self) -> Option<i32> {
        self.active.as_ref().map(|a| a.task.progress_percent())
    }

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// One-line status for the `task_status` tool and chat.
    pub fn status_summary(&self) -> String {
        let mut parts = Vec::new();
        match &self.active {
            Some(active) => {
                let pct = active.task.progress_percent();
                if pct >= 0 {
                    parts.push(format!("working on: {} ({}%)", active.task.description(), pct));
                } else {
                    parts.push(format!("working on: {}", active.task.description()));
                }
            }
            None => parts.push("idle".to_string()),
        }
        if !self.queue.is_empty() {
            parts.push(format!("{} queued", self.queue.len()));
        }
        if let Some(retry) = &self.pending_retry {
            parts.push(format!(
                "retry of {} in {} ticks (attempt {})",
                retry.task_name, retry.ticks_remaining, retry.attempt
            ));
        }
        parts.join("; ")
    }

    /// Schedule a deferred continuation, e.g. to retry a plan step after a
    /// transient failure.  Tick-based, so a paused game pauses the timer too.
    pub fn set_pending_retry(
        &mut self,
        continuation: Continuation,
        result: impl Into<String>,
        task_name: impl Into<String>,
        attempt: u32,
        delay_ticks: u32,
    ) {
        self.pending_retry = Some(PendingRetry {
            continuation,
            result: result.into(),
            task_name: task_name.into(),
            attempt,
            ticks_remaining: delay_ticks,
        });
        self.idle_ticks = 0;
    }

    /// Advance the engine by one server tick.
    pub fn tick(&mut self, ctx: &mut TaskContext<'_>, sink: &mut dyn ContinuationSink) {
        self.finish_terminal_task(ctx, sink);
        self.promote_queued_task(ctx);
        self.tick_active_task(ctx);
        self.tick_pending_retry(sink, ctx);
        self.track_idleness(ctx);
    }

    /// Step 1: if the active task reached a terminal state (or was cancelled),
    /// run its cleanup exactly once, announce, award XP, auto-deposit, and
    /// fire its continuation.
    fn finish_terminal_task(&mut self, ctx: &mut TaskContext<'_>, sink: &mut dyn ContinuationSink) {
        let done = matches!(
            self.active.as_ref(),
            Some(a) if a.outcome.is_some() || a.cancelled
        );
        if !done {
            return;
        }
        let mut active = self.active.take().expect("checked above");
        active.task.cleanup(ctx);
        let description = active.task.description();

        if active.cancelled {
            ctx.companion
                .chat
                .say(ChatCategory::Progress, ctx.now_tick, format!("Stopped: {}", description));
            return;
        }

        match active.outcome.take() {
            Some(TaskTick::Complete(result)) => {
                log::info!("task completed: {} — {}", description, result);
                ctx.companion.chat.say(
                    ChatCategory::Progress,
                    ctx.now_tick,
                    format!("Done: {}", result),
                );
                let levels = ctx.companion.add_xp(TASK_XP);
                if levels > 0 {
                    let level = ctx.companion.level;
                    ctx.companion.chat.say(
                        ChatCategory::Celebration,
                        ctx.now_tick,
                        format!("Level up! Now level {}.", level),
                    );
                }
                match active.continuation {
                    Some(continuation) => {
                        self.fire_success(continuation, &description, &result, ctx, sink)
                    }
                    None => self.auto_deposit(ctx),
                }
            }
            Some(TaskTick::Fail(reason)) => {
                log::warn!("task failed: {} — {}", description, reason);
                ctx.companion.chat.urgent(
                    ChatCategory::Warning,
                    ctx.now_tick,
                    format!("Failed: {} — {}", description, reason),
                );
                if let Some(continuation) = active.continuation {
                    let message = continuation.failure_message(&description, &reason);
                    sink.resume_with_llm(LlmResume {
                        companion_name: ctx.companion.name.clone(),
                        continuation,
                        message,
                    });
                }
            }
            Some(TaskTick::Continue) | None => unreachable!("terminal check guarantees outcome"),
        }
    }

    /// Success continuations execute deterministically when the next-steps
    /// text parses as `Call tool({...})`; the sink falls back to the LLM when
    /// the named tool is unknown.
    fn fire_success(
        &mut self,
        continuation: Continuation,
        description: &str,
        result: &str,
        ctx: &mut TaskContext<'_>,
        sink: &mut dyn ContinuationSink,
    ) {
        match parse_deterministic_call(&continuation.next_steps) {
            Some((tool, args)) => {
                let note = format!(
                    "[Task completed: {} → auto-continuing with {}]",
                    description, tool
                );
                sink.resume_with_tool(ToolResume {
                    companion_name: ctx.companion.name.clone(),
                    continuation,
                    tool,
                    args,
                    task_result: result.to_string(),
                    note,
                });
            }
            None => {
                let message = continuation.success_message(description, result);
                sink.resume_with_llm(LlmResume {
                    companion_name: ctx.companion.name.clone(),
                    continuation,
                    message,
                });
            }
        }
    }

    /// Step 2: pop the next queued task, start it, and pin the chunk.
    fn promote_queued_task(&mut self, ctx: &mut TaskContext<'_>) {
        if self.active.is_some() {
            return;
        }
        let Some(entry) = self.queue.pop_front() else {
            return;
        };
        let mut active = ActiveEntry {
            task: entry.task,
            continuation: entry.continuation,
            ticks_running: 0,
            last_announced_percent: -1,
            last_announce_tick: ctx.now_tick,
            outcome: None,
            cancelled: false,
        };
        log::info!("starting task: {}", active.task.description());
        ctx.companion.chat.say(
            ChatCategory::Progress,
            ctx.now_tick,
            format!("Starting: {}", active.task.description()),
        );
        active.task.start(ctx);
        self.ensure_keepalive(ctx);
        self.active = Some(active);
        self.idle_ticks = 0;
    }

    /// Step 3: tick the running task and throttle progress announcements.
    fn tick_active_task(&mut self, ctx: &mut TaskContext<'_>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.outcome.is_some() || active.cancelled {
            return;
        }
        active.ticks_running += 1;
        match active.task.tick(ctx) {
            TaskTick::Continue => {}
            terminal => {
                active.outcome = Some(terminal);
                return;
            }
        }

        if ctx.now_tick.saturating_sub(active.last_announce_tick) >= PROGRESS_ANNOUNCE_INTERVAL {
            let percent = active.task.progress_percent();
            if percent >= 0 && percent != active.last_announced_percent {
                active.last_announced_percent = percent;
                active.last_announce_tick = ctx.now_tick;
                let description = active.task.description();
                ctx.companion.chat.say(
                    ChatCategory::Progress,
                    ctx.now_tick,
                    format!("{}: {}%", description, percent),
                );
            }
        }
        // Follow the companion across chunk borders.
        if let Some(anchor) = self.keepalive {
            if anchor.chunk() != ctx.companion.position.chunk() {
                ctx.world.remove_chunk_ticket(anchor);
                let pos = ctx.companion.position;
                ctx.world.add_chunk_ticket(pos, CHUNK_TICKET_TTL);
                self.keepalive = Some(pos);
            }
        }
    }

    /// Step 4: count down a scheduled retry and fire it through the LLM path.
    fn tick_pending_retry(&mut self, sink: &mut dyn ContinuationSink, ctx: &mut TaskContext<'_>) {
        let Some(retry) = self.pending_retry.as_mut() else {
            return;
        };
        retry.ticks_remaining = retry.ticks_remaining.saturating_sub(1);
        if retry.ticks_remaining > 0 {
            return;
        }
        let retry = self.pending_retry.take().expect("checked above");
        log::info!(
            "pending retry firing for {} (attempt {})",
            retry.task_name,
            retry.attempt
        );
        let message = retry
            .continuation
            .success_message(&retry.task_name, &retry.result);
        sink.resume_with_llm(LlmResume {
            companion_name: ctx.companion.name.clone(),
            continuation: retry.continuation,
            message,
        });
    }

    /// Step 5: release the chunk ticket after a long idle stretch.
    fn track_idleness(&mut self, ctx: &mut TaskContext<'_>) {
        if self.active.is_some() || !self.queue.is_empty() || self.pending_retry.is_some() {
            self.idle_ticks = 0;
            return;
        }
        self.idle_ticks += 1;
        if self.idle_ticks >= IDLE_RELEASE_TICKS {
            if let Some(anchor) = self.keepalive.take() {
                log::debug!("releasing idle chunk ticket at {}", anchor);
                ctx.world.remove_chunk_ticket(anchor);
            }
        }
    }

    fn ensure_keepalive(&mut self, ctx: &mut TaskContext<'_>) {
        if self.keepalive.is_none() {
            let pos = ctx.companion.position;
            ctx.world.add_chunk_ticket(pos, CHUNK_TICKET_TTL);
            self.keepalive = Some(pos);
        }
    }

    /// Move overflow stacks into STORAGE-tagged containers once a task chain
    /// finishes.  Runs only when no continuation is attached, so mid-plan
    /// materials stay in the inventory.
    fn auto_deposit(&mut self, ctx: &mut TaskContext<'_>) {
        let storage = ctx.companion.tagged_positions(TagRole::Storage);
        if storage.is_empty() {
            return;
        }
        for stack in ctx.companion.inventory.contents() {
            if stack.count <= AUTO_DEPOSIT_KEEP {
                continue;
            }
            let mut excess = stack.count - AUTO_DEPOSIT_KEEP;
            let removed = ctx.companion.inventory.remove(&stack.item, excess);
            excess = removed;
            for pos in &storage {
                if excess == 0 {
                    break;
                }
                let remainder = ctx.world.insert_into_container(
                    *pos,
                    crate::blockmind::world::ItemStack {
                        item: stack.item.clone(),
                        count: excess,
                    },
                );
                excess = remainder.map(|r| r.count).unwrap_or(0);
            }
            if excess > 0 {
                // Storage full: keep the rest in the inventory.
                let _ = ctx.companion.inventory.insert(crate::blockmind::world::ItemStack {
                    item: stack.item.clone(),
                    count: excess,
                });
            }
        }
    }
}
