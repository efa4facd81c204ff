//! LLM dispatch: the provider fallback chain and the tool-call agent loop.
//!
//! One [`Dispatcher`] serves every companion.  A player message enters
//! [`Dispatcher::handle_player_message`], which runs the agent loop: request a
//! completion with the tool registry exposed, execute any tool calls through
//! the server bridge (tools run on the tick thread, never here), append the
//! results, and go around again — up to `max_tool_iterations` times, with a
//! dedup breaker that shuts down retry storms after three identical calls.
//!
//! Task continuations re-enter here: deterministically parsed next steps go
//! through [`Dispatcher::execute_tool_deterministic`] without consulting the
//! model at all; everything else goes through
//! [`Dispatcher::continue_after_task`], which injects the continuation's
//! synthetic message into a fresh loop.
//!
//! Providers are tried strictly in order primary -> fallback -> local.  Rate
//! limits, timeouts, and transport failures move down the chain; other errors
//! short-circuit.  The local provider has no rate limit and is always
//! attempted before failure is surfaced.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::blockmind::clients::{LocalChatClient, OpenAiCompatClient};
use crate::blockmind::companion::OwnerId;
use crate::blockmind::config::Configuration;
use crate::blockmind::continuation::ASYNC_TASK;
use crate::blockmind::provider::{
    ChatMessage, ChatRequest, ChatResponse, ProviderClient, ProviderError, ToolDefinition,
};
use crate::blockmind::server::ServerBridge;
use crate::blockmind::task_engine::{ContinuationSink, LlmResume, ToolResume};
use crate::blockmind::tool_protocol::ToolRegistry;

/// Identical tool-call signatures tolerated before the breaker trips.
const DEDUP_LIMIT: u32 = 3;

/// Conversation entries kept per owner.
const HISTORY_LIMIT: usize = 40;

/// Reply used when the loop hits its iteration cap without final text.
const ITERATION_CAP_TEXT: &str =
    "I got a bit lost in my own planning — tell me what you'd like me to do next.";

/// Reply used when every provider failed.
const ALL_PROVIDERS_DOWN_TEXT: &str =
    "I can't reach my thoughts right now — every chat provider is unavailable. Try again in a moment.";

/// System directive injected when the dedup breaker trips.
const DEDUP_STOP_DIRECTIVE: &str = "You have made the same tool call three times. Stop calling \
     tools now and give the player one final, helpful answer in plain text.";

/// Strict-order provider chain.
pub struct ProviderChain {
    providers: Vec<Arc<dyn ProviderClient>>,
}

impl ProviderChain {
    /// Build the chain from configuration: primary and fallback cloud rungs
    /// when configured, the local provider always last.
    pub fn from_config(config: &Configuration) -> Self {
        let timeout = Duration::from_millis(config.ai.connection.timeout_ms);
        let mut providers: Vec<Arc<dyn ProviderClient>> = Vec::new();
        if config.ai.cloud.is_configured() {
            providers.push(Arc::new(OpenAiCompatClient::new(
                "primary",
                &config.ai.cloud.url,
                &config.ai.cloud.key,
                &config.ai.cloud.model,
                timeout,
            )));
        }
        if config.ai.cloud_fallback.is_configured() {
            providers.push(Arc::new(OpenAiCompatClient::new(
                "fallback",
                &config.ai.cloud_fallback.url,
                &config.ai.cloud_fallback.key,
                &config.ai.cloud_fallback.model,
                timeout,
            )));
        }
        providers.push(Arc::new(LocalChatClient::new(
            &config.ai.connection.local_url,
            &config.ai.connection.local_model,
            timeout,
        )));
        Self { providers }
    }

    /// Chain with explicit providers, in fallback order.  Used by tests.
    pub fn from_providers(providers: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self { providers }
    }

    /// Try each provider in order.  Retriable failures (429, timeout,
    /// transport) move to the next rung; anything else short-circuits.
    pub async fn complete(
        &self,
        request: &ChatRequest<'_>,
    ) -> Result<ChatResponse, ProviderError> {
        let mut last_error = ProviderError::Transport("no providers configured".to_string());
        for provider in &self.providers {
            match provider.complete(request).await {
                Ok(response) => {
                    log::debug!(
                        "completion served by {} ({})",
                        provider.label(),
                        provider.model_name()
                    );
                    return Ok(response);
                }
                Err(err) if err.is_retriable() => {
                    log::warn!(
                        "{} provider failed ({}); trying next in chain",
                        provider.label(),
                        err
                    );
                    last_error = err;
                }
                Err(err) => {
                    log::error!("{} provider rejected request: {}", provider.label(), err);
                    return Err(err);
                }
            }
        }
        Err(last_error)
    }
}

/// Immutable dispatcher state swapped whole on reload.
pub struct DispatcherSnapshot {
    pub chain: ProviderChain,
    pub tools: Vec<ToolDefinition>,
    pub enabled: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_iterations: u32,
}

impl DispatcherSnapshot {
    pub fn build(config: &Configuration, registry: &ToolRegistry) -> Self {
        Self {
            chain: ProviderChain::from_config(config),
            tools: registry.definitions(config),
            enabled: config.ai.enabled,
            temperature: config.ai.temperature,
            max_tokens: config.ai.max_tokens,
            max_tool_iterations: config.ai.max_tool_iterations,
        }
    }
}

/// The companion persona prompt, instantiated per companion name.
pub fn companion_system_prompt(companion_name: &str) -> String {
    format!(
        "You are {name}, a loyal companion in a block world. You act through the \
         provided tools and speak to your owner in short, friendly messages.\n\
         Rules:\n\
         - Use tools for any world action; never pretend an action happened.\n\
         - A tool result starting with {async_tag} means the work is queued; \
         acknowledge it briefly and stop calling tools.\n\
         - When a result starts with [CANNOT_CRAFT], accept it and do not call \
         the crafting tool again for that item.\n\
         - Keep answers to one or two sentences unless asked for detail.",
        name = companion_name,
        async_tag = ASYNC_TASK,
    )
}

/// Multi-companion LLM dispatcher.
pub struct Dispatcher {
    snapshot: RwLock<Arc<DispatcherSnapshot>>,
    histories: Mutex<HashMap<OwnerId, Vec<ChatMessage>>>,
    bridge: ServerBridge,
}

impl Dispatcher {
    pub fn new(config: &Configuration, registry: &ToolRegistry, bridge: ServerBridge) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(DispatcherSnapshot::build(config, registry))),
            histories: Mutex::new(HashMap::new()),
            bridge,
        }
    }

    /// Build a dispatcher around an explicit snapshot.  Lets tests wire in
    /// scripted providers instead of real HTTP clients.
    pub fn from_snapshot(snapshot: DispatcherSnapshot, bridge: ServerBridge) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            histories: Mutex::new(HashMap::new()),
            bridge,
        }
    }

    /// Swap in a fresh config/registry snapshot (hot reload).
    pub async fn reload(&self, config: &Configuration, registry: &ToolRegistry) {
        let snapshot = Arc::new(DispatcherSnapshot::build(config, registry));
        *self.snapshot.write().await = snapshot;
        log::info!("dispatcher snapshot reloaded");
    }

    async fn current_snapshot(&self) -> Arc<DispatcherSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Entry point for a player chat message; returns the assistant reply.
    pub async fn handle_player_message(
        &self,
        owner: OwnerId,
        companion_name: &str,
        text: &str,
    ) -> String {
        self.agent_loop(owner, companion_name, ChatMessage::user(text))
            .await
    }

    /// Continuation entry: injects the synthetic message built by the
    /// continuation (task success with unparseable next steps, task failure,
    /// or a fired pending retry) into a fresh agent loop.
    pub async fn continue_after_task(&self, resume: LlmResume) -> String {
        let owner = resume.continuation.owner;
        let reply = self
            .agent_loop(
                owner,
                &resume.companion_name,
                ChatMessage::user(&resume.message),
            )
            .await;
        self.deliver(owner, reply.clone());
        reply
    }

    /// Deterministic continuation entry: run one parsed tool call directly,
    /// bypassing the model.  Falls back to the LLM path when the tool does
    /// not exist in the registry.
    pub async fn execute_tool_deterministic(&self, resume: ToolResume) -> String {
        let snapshot = self.current_snapshot().await;
        let known = snapshot.tools.iter().any(|t| t.name == resume.tool);
        if !known {
            log::warn!(
                "deterministic continuation names unknown tool '{}'; falling back to LLM",
                resume.tool
            );
            let message = resume
                .continuation
                .success_message(&resume.tool, &resume.task_result);
            return self
                .continue_after_task(LlmResume {
                    continuation: resume.continuation,
                    companion_name: resume.companion_name,
                    message,
                })
                .await;
        }

        let owner = resume.continuation.owner;
        {
            let mut histories = self.histories.lock().await;
            let history = histories.entry(owner).or_default();
            history.push(ChatMessage::system(&resume.note));
            trim_history(history);
        }

        let result = self
            .run_tool(owner, resume.tool.clone(), resume.args.clone(), true)
            .await;
        let reply = strip_async_sentinel(&result);
        {
            let mut histories = self.histories.lock().await;
            let history = histories.entry(owner).or_default();
            history.push(ChatMessage::assistant(&reply));
            trim_history(history);
        }
        self.deliver(owner, reply.clone());
        reply
    }

    /// The tool-call agent loop.
    async fn agent_loop(
        &self,
        owner: OwnerId,
        companion_name: &str,
        user_message: ChatMessage,
    ) -> String {
        let snapshot = self.current_snapshot().await;
        if !snapshot.enabled {
            return "My chat brain is switched off right now.".to_string();
        }

        let mut messages = vec![ChatMessage::system(companion_system_prompt(companion_name))];
        {
            let histories = self.histories.lock().await;
            if let Some(history) = histories.get(&owner) {
                messages.extend(history.iter().cloned());
            }
        }
        messages.push(user_message.clone());
        let mut new_entries = vec![user_message];
        let mut signatures: HashMap<String, u32> = HashMap::new();

        for iteration in 1..=snapshot.max_tool_iterations {
            let request = ChatRequest {
                messages: &messages,
                tools: &snapshot.tools,
                temperature: snapshot.temperature,
                max_tokens: snapshot.max_tokens,
            };
            let response = match snapshot.chain.complete(&request).await {
                Ok(response) => response,
                Err(err) => {
                    self.append_history(owner, new_entries).await;
                    return provider_failure_text(&err);
                }
            };
            let assistant = response.message;

            if assistant.tool_calls.is_empty() {
                let text = assistant.content.trim().to_string();
                new_entries.push(assistant);
                self.append_history(owner, new_entries).await;
                return if text.is_empty() {
                    ITERATION_CAP_TEXT.to_string()
                } else {
                    text
                };
            }

            log::debug!(
                "iteration {}: {} tool call(s)",
                iteration,
                assistant.tool_calls.len()
            );
            let mut breaker_tripped = false;
            for call in &assistant.tool_calls {
                let signature = format!("{}|{}", call.name, call.arguments);
                let count = signatures.entry(signature).or_insert(0);
                *count += 1;
                if *count >= DEDUP_LIMIT {
                    breaker_tripped = true;
                }
            }

            messages.push(assistant.clone());
            new_entries.push(assistant.clone());

            let mut async_status: Option<String> = None;
            for call in &assistant.tool_calls {
                let result = self
                    .run_tool(owner, call.name.clone(), call.arguments.clone(), false)
                    .await;
                if result.starts_with(ASYNC_TASK) && async_status.is_none() {
                    async_status = Some(strip_async_sentinel(&result));
                }
                let tool_message = ChatMessage::tool_result(call.id.clone(), &result);
                messages.push(tool_message.clone());
                new_entries.push(tool_message);
            }

            // A queued task ends the turn; the continuation picks it back up.
            if let Some(status) = async_status {
                self.append_history(owner, new_entries).await;
                return status;
            }

            if breaker_tripped {
                log::warn!("dedup breaker tripped for owner {}", owner);
                let directive = ChatMessage::system(DEDUP_STOP_DIRECTIVE);
                messages.push(directive.clone());
                new_entries.push(directive);
                let final_request = ChatRequest {
                    messages: &messages,
                    tools: &[],
                    temperature: snapshot.temperature,
                    max_tokens: snapshot.max_tokens,
                };
                let text = match snapshot.chain.complete(&final_request).await {
                    Ok(response) => {
                        let text = response.message.content.trim().to_string();
                        new_entries.push(response.message);
                        if text.is_empty() {
                            ITERATION_CAP_TEXT.to_string()
                        } else {
                            text
                        }
                    }
                    Err(err) => provider_failure_text(&err),
                };
                self.append_history(owner, new_entries).await;
                return text;
            }
        }

        self.append_history(owner, new_entries).await;
        ITERATION_CAP_TEXT.to_string()
    }

    /// Execute one tool on the tick thread via the server bridge.
    async fn run_tool(
        &self,
        owner: OwnerId,
        name: String,
        args: Value,
        via_continuation: bool,
    ) -> String {
        let result = self
            .bridge
            .call(move |state| state.invoke_tool(owner, &name, &args, via_continuation))
            .await;
        result.unwrap_or_else(|_| "Error: the server is shutting down.".to_string())
    }

    async fn append_history(&self, owner: OwnerId, entries: Vec<ChatMessage>) {
        let mut histories = self.histories.lock().await;
        let history = histories.entry(owner).or_default();
        history.extend(entries);
        trim_history(history);
    }

    /// Conversation entries currently stored for an owner.
    pub async fn history_len(&self, owner: OwnerId) -> usize {
        self.histories
            .lock()
            .await
            .get(&owner)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Most recent history entries, cloned, newest last.
    pub async fn history_tail(&self, owner: OwnerId, n: usize) -> Vec<ChatMessage> {
        let histories = self.histories.lock().await;
        match histories.get(&owner) {
            Some(history) => history.iter().rev().take(n).rev().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Push an asynchronous assistant reply to the companion's chat outbox.
    fn deliver(&self, owner: OwnerId, text: String) {
        let delivered = self.bridge.run_on_server(move |state| {
            state.deliver_assistant_reply(owner, &text);
        });
        if !delivered {
            log::warn!("could not deliver reply to {}: bridge closed", owner);
        }
    }
}

fn trim_history(history: &mut Vec<ChatMessage>) {
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
}

fn strip_async_sentinel(result: &str) -> String {
    let stripped = result.strip_prefix(ASYNC_TASK).unwrap_or(result).trim();
    if stripped.is_empty() {
        "On it — I've queued that up.".to_string()
    } else {
        stripped.to_string()
    }
}

fn provider_failure_text(err: &ProviderError) -> String {
    match err {
        ProviderError::BadRequest(msg) => {
            format!("My chat provider rejected that request ({}).", msg)
        }
        ProviderError::Parse(_) => {
            "I got a garbled answer from my chat provider; try that again.".to_string()
        }
        _ => ALL_PROVIDERS_DOWN_TEXT.to_string(),
    }
}

/// Production [`ContinuationSink`]: fires engine continuations onto the
/// dispatcher's async workers without blocking the tick thread.
pub struct DispatcherSink {
    dispatcher: Arc<Dispatcher>,
    handle: tokio::runtime::Handle,
}

impl DispatcherSink {
    pub fn new(dispatcher: Arc<Dispatcher>, handle: tokio::runtime::Handle) -> Self {
        Self { dispatcher, handle }
    }
}

impl ContinuationSink for DispatcherSink {
    fn resume_with_tool(&mut self, resume: ToolResume) {
        let dispatcher = self.dispatcher.clone();
        self.handle.spawn(async move {
            dispatcher.execute_tool_deterministic(resume).await;
        });
    }

    fn resume_with_llm(&mut self, resume: LlmResume) {
        let dispatcher = self.dispatcher.clone();
        self.handle.spawn(async move {
            dispatcher.continue_after_task(resume).await;
        });
    }
}
