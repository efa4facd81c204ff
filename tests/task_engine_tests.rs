//! Task engine lifecycle, cancellation, retries, keep-alive, and
//! continuation routing.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use blockmind::chat::ChatCategory;
use blockmind::companion::Companion;
use blockmind::continuation::Continuation;
use blockmind::task_engine::{Task, TaskContext, TaskEngine, TaskTick, IDLE_RELEASE_TICKS};
use blockmind::world::BlockPos;
use common::{MockWorld, RecordingSink};

/// Completes (or fails) after a fixed number of ticks, counting calls.
struct ScriptedTask {
    run_for: usize,
    fail: bool,
    ticks: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

impl ScriptedTask {
    fn new(run_for: usize) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        (
            Self {
                run_for,
                fail: false,
                ticks: ticks.clone(),
                cleanups: cleanups.clone(),
            },
            ticks,
            cleanups,
        )
    }

    fn failing(run_for: usize) -> Self {
        Self {
            run_for,
            fail: true,
            ticks: Arc::new(AtomicUsize::new(0)),
            cleanups: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Task for ScriptedTask {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn description(&self) -> String {
        "Scripted work".to_string()
    }

    fn tick(&mut self, _ctx: &mut TaskContext<'_>) -> TaskTick {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.run_for {
            if self.fail {
                TaskTick::Fail("Could not reach any ore blocks".to_string())
            } else {
                TaskTick::Complete("Scripted work done".to_string())
            }
        } else {
            TaskTick::Continue
        }
    }

    fn cleanup(&mut self, _ctx: &mut TaskContext<'_>) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }

    fn progress_percent(&self) -> i32 {
        let n = self.ticks.load(Ordering::SeqCst);
        ((n * 100) / self.run_for.max(1)).min(100) as i32
    }
}

struct Rig {
    world: MockWorld,
    companion: Companion,
    engine: TaskEngine,
    sink: RecordingSink,
    now: u64,
}

impl Rig {
    fn new() -> Self {
        Self {
            world: MockWorld::new(),
            companion: Companion::new(Uuid::new_v4(), "Scout", BlockPos::new(0, 64, 0)),
            engine: TaskEngine::new(),
            sink: RecordingSink::default(),
            now: 0,
        }
    }

    fn tick(&mut self) {
        self.now += 1;
        let mut ctx = TaskContext {
            world: &mut self.world,
            companion: &mut self.companion,
            now_tick: self.now,
        };
        self.engine.tick(&mut ctx, &mut self.sink);
    }

    fn tick_n(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }
}

#[test]
fn lifecycle_runs_cleanup_exactly_once_and_awards_xp() {
    let mut rig = Rig::new();
    let (task, ticks, cleanups) = ScriptedTask::new(3);
    rig.engine.queue_task(Box::new(task), None);

    rig.tick(); // promoted + first tick
    assert!(rig.engine.has_active_task());
    rig.tick_n(2); // completes on its third tick
    rig.tick(); // terminal processing: cleanup + xp
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(!rig.engine.has_active_task());
    assert!(rig.companion.xp > 0);

    // Nothing further happens to the finished task.
    rig.tick_n(5);
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn cancel_all_stops_the_active_task_within_one_tick() {
    let mut rig = Rig::new();
    let (task, ticks, cleanups) = ScriptedTask::new(1_000);
    let (queued, queued_ticks, _) = ScriptedTask::new(1_000);
    rig.engine.queue_task(Box::new(task), None);
    rig.engine.queue_task(Box::new(queued), None);
    rig.tick_n(5);
    let ticks_before = ticks.load(Ordering::SeqCst);

    rig.engine.cancel_all();
    assert_eq!(rig.engine.queue_size(), 0);
    rig.tick();
    assert_eq!(ticks.load(Ordering::SeqCst), ticks_before);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(!rig.engine.has_active_task());
    // The queued task never started.
    assert_eq!(queued_ticks.load(Ordering::SeqCst), 0);
}

#[test]
fn pending_retry_fires_after_its_tick_delay() {
    let mut rig = Rig::new();
    let continuation = Continuation::new(rig.companion.owner, "Plan: retry", "try again");
    rig.engine
        .set_pending_retry(continuation, "half done", "Mine iron", 2, 5);

    rig.tick_n(4);
    assert!(rig.engine.has_pending_retry());
    assert!(rig.sink.llm_resumes.is_empty());
    rig.tick();
    assert!(!rig.engine.has_pending_retry());
    assert_eq!(rig.sink.llm_resumes.len(), 1);
    assert!(rig.sink.llm_resumes[0].message.contains("half done"));
}

#[test]
fn chunk_ticket_held_while_working_released_after_idle_window() {
    let mut rig = Rig::new();
    let (task, _, _) = ScriptedTask::new(2);
    rig.engine.queue_task(Box::new(task), None);
    rig.tick();
    assert_eq!(rig.world.tickets_added.len(), 1);
    rig.tick_n(3); // finish + terminal processing
    assert!(rig.world.tickets_removed.is_empty());

    rig.tick_n(IDLE_RELEASE_TICKS);
    assert_eq!(rig.world.tickets_removed.len(), 1);
}

#[test]
fn success_continuation_with_parseable_next_steps_skips_the_llm() {
    let mut rig = Rig::new();
    let (task, _, _) = ScriptedTask::new(1);
    let continuation = Continuation::new(
        rig.companion.owner,
        "Plan: craft a crafting_table",
        r#"Call craft_item({"item":"crafting_table"}) once the logs are in"#,
    );
    rig.engine.queue_task(Box::new(task), Some(continuation));
    rig.tick_n(3);

    assert_eq!(rig.sink.llm_resumes.len(), 0, "the LLM must not be consulted");
    assert_eq!(rig.sink.tool_resumes.len(), 1);
    let resume = &rig.sink.tool_resumes[0];
    assert_eq!(resume.tool, "craft_item");
    assert_eq!(resume.args["item"], "crafting_table");
    assert!(resume.note.contains("auto-continuing with craft_item"));
}

#[test]
fn success_continuation_with_prose_next_steps_goes_to_the_llm() {
    let mut rig = Rig::new();
    let (task, _, _) = ScriptedTask::new(1);
    let continuation = Continuation::new(
        rig.companion.owner,
        "Plan: free form",
        "decide what to do next based on the result",
    );
    rig.engine.queue_task(Box::new(task), Some(continuation));
    rig.tick_n(3);

    assert_eq!(rig.sink.tool_resumes.len(), 0);
    assert_eq!(rig.sink.llm_resumes.len(), 1);
    assert!(rig.sink.llm_resumes[0].message.starts_with("[TASK_COMPLETE]"));
}

#[test]
fn failure_continuation_always_takes_the_llm_path() {
    let mut rig = Rig::new();
    let task = ScriptedTask::failing(1);
    let continuation = Continuation::new(
        rig.companion.owner,
        "Plan: 2. mine iron 3. craft iron_pickaxe",
        r#"Call craft_item({"item":"iron_pickaxe"})"#,
    );
    rig.engine.queue_task(Box::new(task), Some(continuation));
    rig.tick_n(3);

    assert_eq!(rig.sink.tool_resumes.len(), 0, "failures never run tools directly");
    assert_eq!(rig.sink.llm_resumes.len(), 1);
    let message = &rig.sink.llm_resumes[0].message;
    assert!(message.starts_with("[TASK_FAILED]"));
    assert!(message.contains("Could not reach any ore blocks"));
    assert!(message.contains("Do not call craft_item again"));
    assert!(message.contains("strip_mine"));
}

#[test]
fn progress_announcements_are_throttled_to_the_interval() {
    let mut rig = Rig::new();
    let (task, _, _) = ScriptedTask::new(10_000);
    rig.engine.queue_task(Box::new(task), None);
    rig.tick_n(450);

    let lines = rig.companion.chat.drain();
    let progress: Vec<_> = lines
        .iter()
        .filter(|l| l.category == ChatCategory::Progress && l.text.contains('%'))
        .collect();
    // 450 ticks with a 200-tick interval: at most two percent announcements.
    assert!(progress.len() <= 2, "got {} progress lines", progress.len());
}

#[test]
fn status_summary_reflects_queue_and_activity() {
    let mut rig = Rig::new();
    assert!(rig.engine.status_summary().contains("idle"));
    let (task, _, _) = ScriptedTask::new(50);
    let (task2, _, _) = ScriptedTask::new(50);
    rig.engine.queue_task(Box::new(task), None);
    rig.engine.queue_task(Box::new(task2), None);
    rig.tick();
    let summary = rig.engine.status_summary();
    assert!(summary.contains("Scripted work"));
    assert!(summary.contains("1 queued"));
}
