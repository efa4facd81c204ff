//! World abstraction consumed by the task engine and tools.
//!
//! The core never talks to a concrete voxel engine.  Every block read, block
//! write, navigation dispatch, and container interaction goes through the
//! [`WorldAdapter`] trait, which the embedding engine implements once and
//! tests implement with an in-memory mock.  All adapter calls happen on the
//! server tick thread; the trait is deliberately synchronous.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blockmind::companion::CompanionId;

/// An integer block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The position directly above this one.
    pub fn up(self) -> Self {
        Self { y: self.y + 1, ..self }
    }

    /// The position directly below this one.
    pub fn down(self) -> Self {
        Self { y: self.y - 1, ..self }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Squared euclidean distance, useful for nearest-first ordering without
    /// paying for a square root per candidate.
    pub fn distance_sq(self, other: BlockPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }

    /// The six face-adjacent neighbours.
    pub fn neighbours(self) -> [BlockPos; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.up(),
            self.down(),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    /// The chunk column containing this position (16x16 columns).
    pub fn chunk(self) -> (i32, i32) {
        (self.x >> 4, self.z >> 4)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A horizontal cardinal direction, used by tunnel mining and mine records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Unit step along this direction.
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "north" => Some(Direction::North),
            "south" => Some(Direction::South),
            "east" => Some(Direction::East),
            "west" => Some(Direction::West),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        write!(f, "{}", s)
    }
}

/// An opaque namespaced item (or block) identifier, e.g. `minecraft:iron_ingot`.
///
/// Identifiers without an explicit namespace are normalised to the `minecraft`
/// namespace so that table lookups and comparisons behave uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.contains(':') {
            Self(id)
        } else {
            Self(format!("minecraft:{}", id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the namespace separator (`iron_ingot` for
    /// `minecraft:iron_ingot`).
    pub fn path(&self) -> &str {
        match self.0.split_once(':') {
            Some((_, path)) => path,
            None => &self.0,
        }
    }

    pub fn namespace(&self) -> &str {
        match self.0.split_once(':') {
            Some((ns, _)) => ns,
            None => "minecraft",
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::new(s)
    }
}

/// A namespaced tag key denoting a dynamic set of items or blocks, resolved by
/// the [`WorldAdapter`], e.g. `minecraft:logs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagKey(String);

impl TagKey {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.contains(':') {
            Self(key)
        } else {
            Self(format!("minecraft:{}", key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maximum count a single inventory slot can hold.
pub const MAX_STACK: u32 = 64;

/// A stack of one item kind with a count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemId,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<ItemId>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.item, self.count)
    }
}

/// Harvest tier of a digging tool.  Ordering follows mining capability, so
/// `ToolTier::Stone >= required` answers "can this pickaxe break that ore".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolTier {
    Wood,
    Stone,
    Iron,
    Diamond,
    Netherite,
}

impl ToolTier {
    /// Tier of a pickaxe item id, if it is one.
    pub fn of_pickaxe(item: &ItemId) -> Option<ToolTier> {
        match item.path() {
            "wooden_pickaxe" | "golden_pickaxe" => Some(ToolTier::Wood),
            "stone_pickaxe" => Some(ToolTier::Stone),
            "iron_pickaxe" => Some(ToolTier::Iron),
            "diamond_pickaxe" => Some(ToolTier::Diamond),
            "netherite_pickaxe" => Some(ToolTier::Netherite),
            _ => None,
        }
    }
}

impl fmt::Display for ToolTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolTier::Wood => "wood",
            ToolTier::Stone => "stone",
            ToolTier::Iron => "iron",
            ToolTier::Diamond => "diamond",
            ToolTier::Netherite => "netherite",
        };
        write!(f, "{}", s)
    }
}

/// The state of one block position.  The core only ever inspects the block id;
/// engine-specific state (rotation, waterlogging, ...) stays opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub id: ItemId,
}

impl BlockState {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self { id: id.into() }
    }

    pub fn air() -> Self {
        Self::new("minecraft:air")
    }

    pub fn is_air(&self) -> bool {
        self.id.path() == "air" || self.id.path() == "cave_air"
    }
}

/// Capability surface the core consumes from the embedding voxel engine.
///
/// Implementations run on the server tick thread; no method may block on IO.
/// Navigation is asynchronous on the engine side: [`WorldAdapter::navigate`]
/// only dispatches a path request, and callers poll
/// [`WorldAdapter::is_in_reach`] on subsequent ticks to observe arrival.
pub trait WorldAdapter: Send {
    fn get_block(&self, pos: BlockPos) -> BlockState;

    fn set_block(&mut self, pos: BlockPos, state: BlockState);

    /// Break the block at `pos`, returning the dropped stacks when `drops` is
    /// requested.  Breaking air returns no drops.
    fn destroy_block(&mut self, pos: BlockPos, drops: bool) -> Vec<ItemStack>;

    /// Whether any of the six faces adjacent to `pos` holds a lava fluid.
    fn adjacent_fluid_is_lava(&self, pos: BlockPos) -> bool;

    fn is_chunk_loaded(&self, pos: BlockPos) -> bool;

    /// Pin the chunk containing `pos` as loaded for `ttl_ticks`.
    fn add_chunk_ticket(&mut self, pos: BlockPos, ttl_ticks: u32);

    fn remove_chunk_ticket(&mut self, pos: BlockPos);

    /// Dispatch an asynchronous path-navigation request for the entity.
    fn navigate(&mut self, entity: CompanionId, pos: BlockPos, speed: f64);

    /// Whether the entity currently stands within `radius` blocks of `pos`.
    fn is_in_reach(&self, entity: CompanionId, pos: BlockPos, radius: f64) -> bool;

    /// Swap the entity's main hand to the best tool in its inventory for the
    /// given block, if any.
    fn equip_best_tool_for_block(&mut self, entity: CompanionId, state: &BlockState);

    /// Find positions of any of the target blocks within `radius` of `center`,
    /// sorted nearest first, capped at `max_results`.
    fn scan_for_blocks(
        &self,
        center: BlockPos,
        targets: &[ItemId],
        radius: i32,
        max_results: usize,
    ) -> Vec<BlockPos>;

    /// Insert a stack into the container at `pos`.  Returns the remainder that
    /// did not fit, or `None` when the whole stack was accepted.
    fn insert_into_container(&mut self, pos: BlockPos, stack: ItemStack) -> Option<ItemStack>;

    /// Extract up to `max` items matching the predicate from the container at
    /// `pos`.
    fn extract_from_container(
        &mut self,
        pos: BlockPos,
        predicate: &dyn Fn(&ItemId) -> bool,
        max: u32,
    ) -> Vec<ItemStack>;

    /// Resolve a dynamic item/block tag into its member ids.
    fn resolve_tag(&self, tag: &TagKey) -> Vec<ItemId>;
}
