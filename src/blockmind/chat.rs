//! Proactive companion speech with per-category cooldowns and a mute switch.
//!
//! Tasks and the engine announce progress through here rather than talking to
//! the chat overlay directly; the embedding layer drains the outbox each tick
//! and renders the lines however it likes.  `say` and `warn` respect the mute
//! flag and category cooldowns, `urgent` bypasses both.

use std::collections::HashMap;

/// Category of a proactive chat line, each with its own cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatCategory {
    Progress,
    Warning,
    Celebration,
    Idle,
}

impl ChatCategory {
    /// Minimum ticks between two lines of the same category.
    fn cooldown_ticks(self) -> u64 {
        match self {
            ChatCategory::Progress => 100,
            ChatCategory::Warning => 200,
            ChatCategory::Celebration => 100,
            ChatCategory::Idle => 1_200,
        }
    }
}

/// A chat line waiting to be delivered to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub category: ChatCategory,
    pub urgent: bool,
    pub text: String,
}

/// Cooldown table plus mute state for one companion.
pub struct CompanionChat {
    muted: bool,
    last_spoke: HashMap<ChatCategory, u64>,
    outbox: Vec<ChatLine>,
}

impl CompanionChat {
    pub fn new() -> Self {
        Self {
            muted: false,
            last_spoke: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Queue a normal line if unmuted and the category is off cooldown.
    /// Returns whether the line was queued.
    pub fn say(&mut self, category: ChatCategory, now_tick: u64, text: impl Into<String>) -> bool {
        if self.muted || !self.off_cooldown(category, now_tick) {
            return false;
        }
        self.last_spoke.insert(category, now_tick);
        self.outbox.push(ChatLine {
            category,
            urgent: false,
            text: text.into(),
        });
        true
    }

    /// Queue a warning line (same rules as [`CompanionChat::say`], warning
    /// cooldown).
    pub fn warn(&mut self, now_tick: u64, text: impl Into<String>) -> bool {
        self.say(ChatCategory::Warning, now_tick, text)
    }

    /// Queue a line that ignores both mute and cooldowns.
    pub fn urgent(&mut self, category: ChatCategory, now_tick: u64, text: impl Into<String>) {
        self.last_spoke.insert(category, now_tick);
        self.outbox.push(ChatLine {
            category,
            urgent: true,
            text: text.into(),
        });
    }

    fn off_cooldown(&self, category: ChatCategory, now_tick: u64) -> bool {
        match self.last_spoke.get(&category) {
            Some(last) => now_tick.saturating_sub(*last) >= category.cooldown_ticks(),
            None => true,
        }
    }

    /// Take all queued lines, oldest first.
    pub fn drain(&mut self) -> Vec<ChatLine> {
        std::mem::take(&mut self.outbox)
    }
}

impl Default for CompanionChat {
    fn default() -> Self {
        Self::new()
    }
}
