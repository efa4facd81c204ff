//! Per-companion persistent state.
//!
//! [`CompanionData`] is the save blob the embedding engine serialises into its
//! own storage (NBT, a database row, a file — the core only deals in
//! `serde_json::Value`).  The blob is versioned: v1 predates mine-record hub
//! centres, and loading a v1 blob fills `hub: None`; re-saving writes v2.
//! Tagged-block roles are stored as their stable ordinals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::blockmind::companion::{
    BehaviorMode, Companion, Equipment, HomeArea, Inventory, MineRecord, TagRole,
};
use crate::blockmind::world::{BlockPos, ItemStack};

/// Current blob layout version.
pub const DATA_VERSION: u32 = 2;

/// Serialised tagged block (role as ordinal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedBlockData {
    pub pos: BlockPos,
    pub role: u8,
}

/// The saved state of one companion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionData {
    #[serde(default = "default_version")]
    pub version: u32,
    pub name: String,
    pub mode: BehaviorMode,
    pub inventory: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default)]
    pub home_corners: Option<(BlockPos, BlockPos)>,
    #[serde(default)]
    pub tagged_blocks: Vec<TaggedBlockData>,
    #[serde(default)]
    pub memory: BTreeMap<String, String>,
    #[serde(default)]
    pub mines: Vec<MineRecord>,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    1
}

impl CompanionData {
    /// Capture a companion's persistent fields.
    pub fn capture(companion: &Companion) -> Self {
        Self {
            version: DATA_VERSION,
            name: companion.name.clone(),
            mode: companion.mode,
            inventory: companion.inventory.slots().to_vec(),
            equipment: companion.equipment.clone(),
            home_corners: companion.home_area.map(|h| (h.min, h.max)),
            tagged_blocks: companion
                .tagged_blocks
                .iter()
                .map(|t| TaggedBlockData {
                    pos: t.pos,
                    role: t.role.ordinal(),
                })
                .collect(),
            memory: companion.memory.clone(),
            mines: companion.mines.clone(),
            xp: companion.xp,
            level: companion.level,
            saved_at: Some(Utc::now()),
        }
    }

    /// Apply saved fields onto a live companion.  Unknown role ordinals are
    /// dropped with a warning rather than corrupting the tag set.
    pub fn apply_to(&self, companion: &mut Companion) {
        companion.name = self.name.clone();
        companion.mode = self.mode;
        let mut inventory = Inventory::new(self.inventory.len().max(Inventory::DEFAULT_SLOTS));
        for stack in self.inventory.iter().flatten() {
            let _ = inventory.insert(stack.clone());
        }
        companion.inventory = inventory;
        companion.equipment = self.equipment.clone();
        companion.home_area = self
            .home_corners
            .map(|(a, b)| HomeArea::from_corners(a, b));
        companion.tagged_blocks.clear();
        for tagged in &self.tagged_blocks {
            match TagRole::from_ordinal(tagged.role) {
                Some(role) => companion.tag_block(tagged.pos, role),
                None => log::warn!(
                    "dropping tagged block at {} with unknown role ordinal {}",
                    tagged.pos,
                    tagged.role
                ),
            }
        }
        companion.memory = self.memory.clone();
        companion.mines = self.mines.clone();
        companion.xp = self.xp;
        companion.level = self.level;
    }

    /// Serialise to a JSON value blob.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Deserialise a blob of any supported version.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut data: CompanionData = serde_json::from_value(value)?;
        if data.version < DATA_VERSION {
            log::info!(
                "migrating companion '{}' save data v{} -> v{}",
                data.name,
                data.version,
                DATA_VERSION
            );
            data.version = DATA_VERSION;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockmind::world::{Direction, ItemId};
    use uuid::Uuid;

    fn sample_companion() -> Companion {
        let mut companion = Companion::new(Uuid::new_v4(), "Scout", BlockPos::new(4, 64, 4));
        let _ = companion.inventory.insert(ItemStack::new("oak_log", 12));
        companion.tag_block(BlockPos::new(0, 64, 0), TagRole::Storage);
        companion.home_area = Some(HomeArea::from_corners(
            BlockPos::new(-8, 60, -8),
            BlockPos::new(8, 70, 8),
        ));
        companion
            .memory
            .insert("base".to_string(), "under the hill".to_string());
        companion.mines.push(MineRecord {
            name: "iron mine #1".to_string(),
            entrance: BlockPos::new(10, 64, 10),
            target_y: 12,
            direction: Direction::North,
            hub: Some(BlockPos::new(10, 12, 0)),
        });
        companion
    }

    #[test]
    fn round_trips_through_json_value() {
        let companion = sample_companion();
        let blob = CompanionData::capture(&companion).to_value().unwrap();
        let restored = CompanionData::from_value(blob).unwrap();

        let mut fresh = Companion::new(Uuid::new_v4(), "temp", BlockPos::new(0, 0, 0));
        restored.apply_to(&mut fresh);
        assert_eq!(fresh.name, "Scout");
        assert_eq!(fresh.inventory.count_of(&ItemId::new("oak_log")), 12);
        assert_eq!(fresh.tagged_blocks.len(), 1);
        assert_eq!(fresh.tagged_blocks[0].role, TagRole::Storage);
        assert_eq!(fresh.mines[0].hub, Some(BlockPos::new(10, 12, 0)));
        assert!(fresh.home_area.is_some());
    }

    #[test]
    fn v1_blob_without_hub_or_version_migrates() {
        let blob = serde_json::json!({
            "name": "Oldtimer",
            "mode": "follow",
            "inventory": [],
            "mines": [{
                "name": "old shaft",
                "entrance": {"x": 1, "y": 64, "z": 1},
                "target_y": 11,
                "direction": "east"
            }]
        });
        let data = CompanionData::from_value(blob).unwrap();
        assert_eq!(data.version, DATA_VERSION);
        assert_eq!(data.mines[0].hub, None);
        assert_eq!(data.mines[0].direction, Direction::East);
    }

    #[test]
    fn unknown_role_ordinal_is_dropped_not_fatal() {
        let mut data = CompanionData::capture(&sample_companion());
        data.tagged_blocks.push(TaggedBlockData {
            pos: BlockPos::new(9, 9, 9),
            role: 77,
        });
        let mut fresh = Companion::new(Uuid::new_v4(), "temp", BlockPos::new(0, 0, 0));
        data.apply_to(&mut fresh);
        assert_eq!(fresh.tagged_blocks.len(), 1);
    }
}
