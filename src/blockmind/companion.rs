//! Companion entity state: identity, inventory, equipment, behaviour, and the
//! owner-tagged logistics blocks the task layer routes items through.
//!
//! A [`Companion`] owns everything that persists for one companion except its
//! task queue; the matching [`TaskEngine`](crate::blockmind::task_engine::TaskEngine)
//! is held alongside it by [`ServerState`](crate::blockmind::server::ServerState)
//! and keyed by the same owner.  All mutation happens on the server tick thread.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::blockmind::chat::CompanionChat;
use crate::blockmind::world::{BlockPos, ItemId, ItemStack, ToolTier, MAX_STACK};

/// Player id owning a companion.
pub type OwnerId = Uuid;

/// Entity id of a companion.
pub type CompanionId = Uuid;

/// High-level behaviour mode selected by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorMode {
    Follow,
    Stay,
    Auto,
    Guard,
}

impl Default for BehaviorMode {
    fn default() -> Self {
        BehaviorMode::Follow
    }
}

/// Role a player assigned to a tagged block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagRole {
    Input,
    Output,
    Storage,
}

impl TagRole {
    /// Stable ordinal used by the persistence blob.
    pub fn ordinal(self) -> u8 {
        match self {
            TagRole::Input => 0,
            TagRole::Output => 1,
            TagRole::Storage => 2,
        }
    }

    pub fn from_ordinal(ord: u8) -> Option<Self> {
        match ord {
            0 => Some(TagRole::Input),
            1 => Some(TagRole::Output),
            2 => Some(TagRole::Storage),
            _ => None,
        }
    }
}

/// A block position flagged by the owning player for logistics routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedBlock {
    pub pos: BlockPos,
    pub role: TagRole,
}

/// Axis-aligned box in which all block breaking by the companion is forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeArea {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl HomeArea {
    /// Normalise two corners into a well-ordered box.
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }
}

/// Bounded ordered inventory of item stacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    pub const DEFAULT_SLOTS: usize = 27;

    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![None; slots],
        }
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Total count of one item across all slots.
    pub fn count_of(&self, item: &ItemId) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| &s.item == item)
            .map(|s| s.count)
            .sum()
    }

    pub fn has(&self, item: &ItemId, count: u32) -> bool {
        self.count_of(item) >= count
    }

    /// Insert a stack, topping up existing stacks before opening new slots.
    /// Returns the remainder that did not fit.
    pub fn insert(&mut self, stack: ItemStack) -> Option<ItemStack> {
        let mut remaining = stack.count;
        if remaining == 0 {
            return None;
        }
        for slot in self.slots.iter_mut().flatten() {
            if slot.item == stack.item && slot.count < MAX_STACK {
                let space = MAX_STACK - slot.count;
                let moved = space.min(remaining);
                slot.count += moved;
                remaining -= moved;
                if remaining == 0 {
                    return None;
                }
            }
        }
        for slot in self.slots.iter_mut() {
            if slot.is_none() {
                let moved = MAX_STACK.min(remaining);
                *slot = Some(ItemStack {
                    item: stack.item.clone(),
                    count: moved,
                });
                remaining -= moved;
                if remaining == 0 {
                    return None;
                }
            }
        }
        Some(ItemStack {
            item: stack.item,
            count: remaining,
        })
    }

    /// Remove up to `count` of an item, returning how many were removed.
    pub fn remove(&mut self, item: &ItemId, count: u32) -> u32 {
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            if removed == count {
                break;
            }
            if let Some(stack) = slot {
                if &stack.item == item {
                    let take = stack.count.min(count - removed);
                    stack.count -= take;
                    removed += take;
                    if stack.count == 0 {
                        *slot = None;
                    }
                }
            }
        }
        removed
    }

    /// Remove the first stack matching the predicate, whole.
    pub fn take_first(&mut self, predicate: impl Fn(&ItemId) -> bool) -> Option<ItemStack> {
        for slot in self.slots.iter_mut() {
            if let Some(stack) = slot {
                if predicate(&stack.item) {
                    return slot.take();
                }
            }
        }
        None
    }

    /// Distinct items with their total counts, in slot order.
    pub fn contents(&self) -> Vec<ItemStack> {
        let mut totals: BTreeMap<ItemId, u32> = BTreeMap::new();
        for stack in self.slots.iter().flatten() {
            *totals.entry(stack.item.clone()).or_insert(0) += stack.count;
        }
        totals
            .into_iter()
            .map(|(item, count)| ItemStack { item, count })
            .collect()
    }

    /// Best pickaxe tier present, if any pickaxe is carried.
    pub fn best_pickaxe_tier(&self) -> Option<ToolTier> {
        self.slots
            .iter()
            .flatten()
            .filter_map(|s| ToolTier::of_pickaxe(&s.item))
            .max()
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLOTS)
    }
}

/// Equipped main/off-hand and armor slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Equipment {
    pub main_hand: Option<ItemStack>,
    pub off_hand: Option<ItemStack>,
    /// Helmet, chestplate, leggings, boots.
    pub armor: [Option<ItemStack>; 4],
}

/// XP needed to advance from `level` to `level + 1`.
fn xp_to_next_level(level: u32) -> u64 {
    50 + 25 * level as u64
}

/// One companion bound to a single owner.
pub struct Companion {
    pub id: CompanionId,
    pub owner: OwnerId,
    pub name: String,
    pub position: BlockPos,
    pub health: f32,
    pub max_health: f32,
    pub mode: BehaviorMode,
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub tagged_blocks: Vec<TaggedBlock>,
    pub home_area: Option<HomeArea>,
    pub chat: CompanionChat,
    /// Free-form facts the owner asked the companion to remember.
    pub memory: BTreeMap<String, String>,
    /// Strip mines dug by this companion, persisted across sessions.
    pub mines: Vec<MineRecord>,
    pub xp: u64,
    pub level: u32,
    /// Set while the owner has an interaction screen open; queueing a task
    /// clears it so the companion can move again.
    pub interacting_with_owner: bool,
}

impl Companion {
    pub fn new(owner: OwnerId, name: impl Into<String>, position: BlockPos) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            position,
            health: 20.0,
            max_health: 20.0,
            mode: BehaviorMode::default(),
            inventory: Inventory::default(),
            equipment: Equipment::default(),
            tagged_blocks: Vec::new(),
            home_area: None,
            chat: CompanionChat::new(),
            memory: BTreeMap::new(),
            mines: Vec::new(),
            xp: 0,
            level: 0,
            interacting_with_owner: false,
        }
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            0.0
        } else {
            self.health / self.max_health
        }
    }

    /// Positions tagged with the given role.
    pub fn tagged_positions(&self, role: TagRole) -> Vec<BlockPos> {
        self.tagged_blocks
            .iter()
            .filter(|t| t.role == role)
            .map(|t| t.pos)
            .collect()
    }

    pub fn tag_block(&mut self, pos: BlockPos, role: TagRole) {
        self.tagged_blocks.retain(|t| t.pos != pos);
        self.tagged_blocks.push(TaggedBlock { pos, role });
    }

    /// Drop the tag at `pos` (the underlying block was broken or cleared).
    pub fn untag_block(&mut self, pos: BlockPos) {
        self.tagged_blocks.retain(|t| t.pos != pos);
    }

    pub fn is_tagged(&self, pos: BlockPos) -> bool {
        self.tagged_blocks.iter().any(|t| t.pos == pos)
    }

    /// Award XP, levelling up across as many thresholds as the award covers.
    /// Returns the number of levels gained.
    pub fn add_xp(&mut self, amount: u64) -> u32 {
        self.xp += amount;
        let mut gained = 0;
        while self.xp >= xp_to_next_level(self.level) {
            self.xp -= xp_to_next_level(self.level);
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

/// A recorded strip mine.  `hub` arrived in the v2 layout; v1 records load
/// with it absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineRecord {
    pub name: String,
    pub entrance: BlockPos,
    pub target_y: i32,
    pub direction: crate::blockmind::world::Direction,
    #[serde(default)]
    pub hub: Option<BlockPos>,
}
