//! Server-side state and the tick-thread bridge.
//!
//! The voxel engine owns one [`ServerState`] and calls [`ServerState::tick`]
//! once per server tick (20 Hz).  Everything that mutates the world, an
//! inventory, or a task lives here, on that single thread.  The dispatcher's
//! async workers never touch state directly: they submit closures through the
//! [`ServerBridge`], and the tick loop drains the queue at the top of each
//! tick.  [`ServerBridge::call`] adds a oneshot reply channel on top for
//! request/response work like tool execution.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::blockmind::chat::{ChatCategory, ChatLine};
use crate::blockmind::companion::{Companion, OwnerId};
use crate::blockmind::config::Configuration;
use crate::blockmind::recipes::RecipeIndex;
use crate::blockmind::task_engine::{ContinuationSink, TaskContext, TaskEngine};
use crate::blockmind::tool_protocol::{ToolInvocation, ToolRegistry};
use crate::blockmind::world::{BlockPos, WorldAdapter};

/// A closure executed on the tick thread with full state access.
pub type ServerJob = Box<dyn FnOnce(&mut ServerState) + Send>;

/// Sending half of the tick-thread submission queue.  Cheap to clone; held by
/// the dispatcher and anything else living on worker threads.
#[derive(Clone)]
pub struct ServerBridge {
    tx: mpsc::UnboundedSender<ServerJob>,
}

/// The server-side queue has shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeClosed;

impl std::fmt::Display for BridgeClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "server bridge closed")
    }
}

impl std::error::Error for BridgeClosed {}

impl ServerBridge {
    /// Fire-and-forget submission.  Returns false when the server is gone.
    pub fn run_on_server(&self, job: impl FnOnce(&mut ServerState) + Send + 'static) -> bool {
        self.tx.send(Box::new(job)).is_ok()
    }

    /// Submit a closure and await its return value on the next tick.
    pub async fn call<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut ServerState) -> R + Send + 'static,
    ) -> Result<R, BridgeClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.run_on_server(move |state| {
            let _ = reply_tx.send(f(state));
        });
        if !sent {
            return Err(BridgeClosed);
        }
        reply_rx.await.map_err(|_| BridgeClosed)
    }
}

/// All per-server mutable state, owned by the tick thread.
pub struct ServerState {
    pub world: Box<dyn WorldAdapter>,
    companions: HashMap<OwnerId, Companion>,
    engines: HashMap<OwnerId, TaskEngine>,
    registry: Arc<ToolRegistry>,
    recipes: Arc<RecipeIndex>,
    config: Arc<Configuration>,
    now_tick: u64,
    job_rx: mpsc::UnboundedReceiver<ServerJob>,
}

impl ServerState {
    pub fn new(
        world: Box<dyn WorldAdapter>,
        registry: Arc<ToolRegistry>,
        recipes: Arc<RecipeIndex>,
        config: Arc<Configuration>,
    ) -> (Self, ServerBridge) {
        let (tx, job_rx) = mpsc::unbounded_channel();
        let state = Self {
            world,
            companions: HashMap::new(),
            engines: HashMap::new(),
            registry,
            recipes,
            config,
            now_tick: 0,
            job_rx,
        };
        (state, ServerBridge { tx })
    }

    pub fn now_tick(&self) -> u64 {
        self.now_tick
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Swap in a new immutable config snapshot (hot reload).
    pub fn set_config(&mut self, config: Arc<Configuration>) {
        self.config = config;
    }

    /// Create a companion (with its engine) for an owner.
    pub fn spawn_companion(
        &mut self,
        owner: OwnerId,
        name: impl Into<String>,
        position: BlockPos,
    ) -> &mut Companion {
        self.engines.insert(owner, TaskEngine::new());
        self.companions
            .entry(owner)
            .or_insert_with(|| Companion::new(owner, name, position))
    }

    pub fn companion(&self, owner: &OwnerId) -> Option<&Companion> {
        self.companions.get(owner)
    }

    pub fn companion_mut(&mut self, owner: &OwnerId) -> Option<&mut Companion> {
        self.companions.get_mut(owner)
    }

    pub fn engine(&self, owner: &OwnerId) -> Option<&TaskEngine> {
        self.engines.get(owner)
    }

    pub fn engine_mut(&mut self, owner: &OwnerId) -> Option<&mut TaskEngine> {
        self.engines.get_mut(owner)
    }

    /// Advance one server tick: drain submitted jobs, then tick every
    /// companion's task engine.
    pub fn tick(&mut self, sink: &mut dyn ContinuationSink) {
        self.now_tick += 1;

        loop {
            let job = match self.job_rx.try_recv() {
                Ok(job) => job,
                Err(_) => break,
            };
            job(self);
        }

        let owners: Vec<OwnerId> = self.engines.keys().copied().collect();
        for owner in owners {
            let Some(mut engine) = self.engines.remove(&owner) else {
                continue;
            };
            if let Some(companion) = self.companions.get_mut(&owner) {
                let mut ctx = TaskContext {
                    world: &mut *self.world,
                    companion,
                    now_tick: self.now_tick,
                };
                engine.tick(&mut ctx, sink);
            }
            self.engines.insert(owner, engine);
        }
    }

    /// Execute a registered tool against this state.  Called from bridge jobs
    /// submitted by the dispatcher.
    pub fn invoke_tool(
        &mut self,
        owner: OwnerId,
        name: &str,
        args: &Value,
        via_continuation: bool,
    ) -> String {
        let registry = Arc::clone(&self.registry);
        let recipes = Arc::clone(&self.recipes);
        let config = Arc::clone(&self.config);
        let now_tick = self.now_tick;
        let Some(companion) = self.companions.get_mut(&owner) else {
            return "Error: this player has no companion.".to_string();
        };
        let Some(engine) = self.engines.get_mut(&owner) else {
            return "Error: this companion has no task engine.".to_string();
        };
        let mut invocation = ToolInvocation {
            owner,
            world: &mut *self.world,
            companion,
            engine,
            recipes: &recipes,
            config: &config,
            now_tick,
            via_continuation,
        };
        registry.invoke(name, args, &mut invocation)
    }

    /// Queue an asynchronous assistant reply into the companion's chat.
    /// Direct replies bypass mute and cooldowns.
    pub fn deliver_assistant_reply(&mut self, owner: OwnerId, text: &str) {
        if let Some(companion) = self.companions.get_mut(&owner) {
            companion
                .chat
                .urgent(ChatCategory::Progress, self.now_tick, text);
        }
    }

    /// Drain the companion's pending chat lines for rendering.
    pub fn drain_chat(&mut self, owner: &OwnerId) -> Vec<ChatLine> {
        self.companions
            .get_mut(owner)
            .map(|c| c.chat.drain())
            .unwrap_or_default()
    }
}
