//! Shared test fixtures: an in-memory world, a recording continuation sink,
//! scripted providers, and a small vanilla-ish recipe index.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use blockmind::companion::CompanionId;
use blockmind::provider::{
    ChatMessage, ChatRequest, ChatResponse, NativeToolCall, ProviderClient, ProviderError,
};
use blockmind::recipes::{RecipeIndex, RecipeInput, RecipeVariant};
use blockmind::task_engine::{ContinuationSink, LlmResume, ToolResume};
use blockmind::world::{BlockPos, BlockState, ItemId, ItemStack, TagKey, WorldAdapter};

/// In-memory world: a block map, containers, and switchable reachability.
pub struct MockWorld {
    pub blocks: HashMap<BlockPos, BlockState>,
    pub containers: HashMap<BlockPos, Vec<ItemStack>>,
    pub tags: HashMap<String, Vec<ItemId>>,
    /// When false, `is_in_reach` never holds (navigation "never arrives").
    pub reachable: bool,
    pub nav_requests: Vec<(CompanionId, BlockPos)>,
    pub tickets_added: Vec<BlockPos>,
    pub tickets_removed: Vec<BlockPos>,
    pub destroyed: Vec<BlockPos>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            containers: HashMap::new(),
            tags: HashMap::new(),
            reachable: true,
            nav_requests: Vec::new(),
            tickets_added: Vec::new(),
            tickets_removed: Vec::new(),
            destroyed: Vec::new(),
        }
    }

    pub fn set(&mut self, pos: BlockPos, id: &str) {
        self.blocks.insert(pos, BlockState::new(id));
    }

    /// What breaking a block drops in this mock.
    fn drops_for(id: &ItemId) -> ItemStack {
        let drop = match id.path() {
            "stone" => "cobblestone",
            "iron_ore" | "deepslate_iron_ore" => "raw_iron",
            "copper_ore" | "deepslate_copper_ore" => "raw_copper",
            "gold_ore" | "deepslate_gold_ore" => "raw_gold",
            "coal_ore" | "deepslate_coal_ore" => "coal",
            "diamond_ore" | "deepslate_diamond_ore" => "diamond",
            other => other,
        };
        ItemStack::new(drop, 1)
    }
}

impl WorldAdapter for MockWorld {
    fn get_block(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).cloned().unwrap_or_else(BlockState::air)
    }

    fn set_block(&mut self, pos: BlockPos, state: BlockState) {
        self.blocks.insert(pos, state);
    }

    fn destroy_block(&mut self, pos: BlockPos, drops: bool) -> Vec<ItemStack> {
        self.destroyed.push(pos);
        match self.blocks.remove(&pos) {
            Some(state) if drops && !state.is_air() => vec![Self::drops_for(&state.id)],
            _ => Vec::new(),
        }
    }

    fn adjacent_fluid_is_lava(&self, pos: BlockPos) -> bool {
        pos.neighbours()
            .iter()
            .any(|n| self.get_block(*n).id.path() == "lava")
    }

    fn is_chunk_loaded(&self, _pos: BlockPos) -> bool {
        true
    }

    fn add_chunk_ticket(&mut self, pos: BlockPos, _ttl_ticks: u32) {
        self.tickets_added.push(pos);
    }

    fn remove_chunk_ticket(&mut self, pos: BlockPos) {
        self.tickets_removed.push(pos);
    }

    fn navigate(&mut self, entity: CompanionId, pos: BlockPos, _speed: f64) {
        self.nav_requests.push((entity, pos));
    }

    fn is_in_reach(&self, _entity: CompanionId, _pos: BlockPos, _radius: f64) -> bool {
        self.reachable
    }

    fn equip_best_tool_for_block(&mut self, _entity: CompanionId, _state: &BlockState) {}

    fn scan_for_blocks(
        &self,
        center: BlockPos,
        targets: &[ItemId],
        radius: i32,
        max_results: usize,
    ) -> Vec<BlockPos> {
        let mut hits: Vec<BlockPos> = self
            .blocks
            .iter()
            .filter(|(pos, state)| {
                targets.contains(&state.id)
                    && (pos.x - center.x).abs() <= radius
                    && (pos.y - center.y).abs() <= radius
                    && (pos.z - center.z).abs() <= radius
            })
            .map(|(pos, _)| *pos)
            .collect();
        hits.sort_by_key(|pos| pos.distance_sq(center));
        hits.truncate(max_results);
        hits
    }

    fn insert_into_container(&mut self, pos: BlockPos, stack: ItemStack) -> Option<ItemStack> {
        self.containers.entry(pos).or_default().push(stack);
        None
    }

    fn extract_from_container(
        &mut self,
        pos: BlockPos,
        predicate: &dyn Fn(&ItemId) -> bool,
        max: u32,
    ) -> Vec<ItemStack> {
        let Some(contents) = self.containers.get_mut(&pos) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut remaining = max;
        contents.retain_mut(|stack| {
            if remaining == 0 || !predicate(&stack.item) {
                return true;
            }
            let take = stack.count.min(remaining);
            remaining -= take;
            out.push(ItemStack::new(stack.item.clone(), take));
            stack.count -= take;
            stack.count > 0
        });
        out
    }

    fn resolve_tag(&self, tag: &TagKey) -> Vec<ItemId> {
        self.tags.get(tag.as_str()).cloned().unwrap_or_default()
    }
}

/// Continuation sink that records instead of dispatching.
#[derive(Default)]
pub struct RecordingSink {
    pub tool_resumes: Vec<ToolResume>,
    pub llm_resumes: Vec<LlmResume>,
}

impl ContinuationSink for RecordingSink {
    fn resume_with_tool(&mut self, resume: ToolResume) {
        self.tool_resumes.push(resume);
    }

    fn resume_with_llm(&mut self, resume: LlmResume) {
        self.llm_resumes.push(resume);
    }
}

/// A provider that replays a scripted sequence of results, counting calls.
pub struct ScriptedProvider {
    label: String,
    script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(label: &str, script: Vec<Result<ChatResponse, ProviderError>>) -> Self {
        Self {
            label: label.to_string(),
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn complete(&self, _request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(text_response("...")))
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Assistant text response.
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        message: ChatMessage::assistant(text),
    }
}

/// Assistant response that calls one tool.
pub fn tool_call_response(id: &str, name: &str, args: serde_json::Value) -> ChatResponse {
    let mut message = ChatMessage::assistant("");
    message.tool_calls = vec![NativeToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args,
    }];
    ChatResponse { message }
}

/// A compact vanilla-flavoured recipe index covering the test scenarios.
pub fn vanilla_index() -> RecipeIndex {
    let mut index = RecipeIndex::new();
    index.register_tag("logs", vec![ItemId::new("oak_log"), ItemId::new("birch_log")]);
    index.register_tag("planks", vec![ItemId::new("oak_planks")]);
    index.add(
        "oak_planks",
        RecipeVariant::Craft {
            shaped: false,
            inputs: vec![RecipeInput::tag("logs", 1)],
            result_count: 4,
        },
    );
    index.add(
        "stick",
        RecipeVariant::Craft {
            shaped: true,
            inputs: vec![RecipeInput::item("oak_planks", 2)],
            result_count: 4,
        },
    );
    index.add(
        "crafting_table",
        RecipeVariant::Craft {
            shaped: true,
            inputs: vec![RecipeInput::item("oak_planks", 4)],
            result_count: 1,
        },
    );
    index.add(
        "iron_ingot",
        RecipeVariant::Smelt {
            input: ItemId::new("raw_iron"),
            cook_time_ticks: 10,
        },
    );
    index.add(
        "iron_pickaxe",
        RecipeVariant::Craft {
            shaped: true,
            inputs: vec![
                RecipeInput::item("iron_ingot", 3),
                RecipeInput::item("stick", 2),
            ],
            result_count: 1,
        },
    );
    index.add(
        "furnace",
        RecipeVariant::Craft {
            shaped: true,
            inputs: vec![RecipeInput::item("cobblestone", 8)],
            result_count: 1,
        },
    );
    index
}
