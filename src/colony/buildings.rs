//! Colony buildings keyed by anchor position

use std::collections::BTreeMap;

use crate::colony::ColonyId;
use crate::net::protocol::{BuildingViewMessage, ServerMessage};
use crate::net::sink::{MessageSink, SendError};
use crate::persist::{TagCompound, TagError};
use crate::sync::dirty::{SyncChannel, SyncPass, SyncSubsystem};
use crate::util::vec3::BlockPos;

const TAG_BUILDINGS: &str = "buildings";
const TAG_POSITION: &str = "position";
const TAG_KIND: &str = "kind";
const TAG_LEVEL: &str = "level";

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingData {
    position: BlockPos,
    kind: String,
    level: i32,
    dirty: bool,
}

impl BuildingData {
    pub fn position(&self) -> BlockPos {
        self.position
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    fn read_from_tag(tag: &TagCompound) -> Result<Self, TagError> {
        Ok(Self {
            position: tag.try_get_block_pos(TAG_POSITION)?,
            kind: tag.try_get_string(TAG_KIND)?.to_string(),
            level: tag.try_get_int(TAG_LEVEL)?,
            dirty: false,
        })
    }
}

#[derive(Debug, Default)]
pub struct BuildingManager {
    buildings: BTreeMap<BlockPos, BuildingData>,
    removed: Vec<BlockPos>,
    dirty: bool,
}

impl BuildingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a level-0 building; returns false if the spot is taken
    pub fn add_building(&mut self, position: BlockPos, kind: impl Into<String>) -> bool {
        if self.buildings.contains_key(&position) {
            return false;
        }
        self.buildings.insert(
            position,
            BuildingData {
                position,
                kind: kind.into(),
                level: 0,
                dirty: true,
            },
        );
        self.removed.retain(|pos| *pos != position);
        self.dirty = true;
        true
    }

    /// Raise a building's level; returns the new level
    pub fn upgrade(&mut self, position: BlockPos) -> Option<i32> {
        let building = self.buildings.get_mut(&position)?;
        building.level += 1;
        building.dirty = true;
        self.dirty = true;
        Some(building.level)
    }

    pub fn remove_building(&mut self, position: BlockPos) -> Option<BuildingData> {
        let removed = self.buildings.remove(&position)?;
        self.removed.push(position);
        self.dirty = true;
        Some(removed)
    }

    pub fn contains(&self, position: BlockPos) -> bool {
        self.buildings.contains_key(&position)
    }

    pub fn get(&self, position: BlockPos) -> Option<&BuildingData> {
        self.buildings.get(&position)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingData> {
        self.buildings.values()
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    fn view_of(colony_id: ColonyId, building: &BuildingData) -> ServerMessage {
        ServerMessage::BuildingView(BuildingViewMessage {
            colony_id,
            position: building.position,
            kind: building.kind.clone(),
            level: building.level,
        })
    }

    pub fn write_to_tag(&self, tag: &mut TagCompound) {
        let list = self
            .buildings
            .values()
            .map(|building| {
                let mut entry = TagCompound::new();
                entry.set_block_pos(TAG_POSITION, building.position);
                entry.set_string(TAG_KIND, building.kind.as_str());
                entry.set_int(TAG_LEVEL, building.level);
                entry
            })
            .collect();
        tag.set_list(TAG_BUILDINGS, list);
    }

    /// Restore buildings; malformed entries are skipped with a warning
    pub fn read_from_tag(tag: &TagCompound) -> Self {
        let mut manager = Self::new();
        for entry in tag.get_list(TAG_BUILDINGS) {
            match BuildingData::read_from_tag(entry) {
                Ok(building) => {
                    manager.buildings.insert(building.position, building);
                }
                Err(e) => tracing::warn!("Skipping malformed building record: {}", e),
            }
        }
        manager
    }
}

impl SyncSubsystem for BuildingManager {
    fn channel(&self) -> SyncChannel {
        SyncChannel::Buildings
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn send_packets(&self, pass: &SyncPass<'_>, sink: &mut dyn MessageSink) -> Result<usize, SendError> {
        let mut sent = 0;
        for client in pass.recipients(self.dirty) {
            let is_new = pass.is_new(&client);
            for building in self.buildings.values() {
                if is_new || building.dirty {
                    sink.send_to(client, Self::view_of(pass.colony_id, building))?;
                    sent += 1;
                }
            }
            if !is_new {
                for position in &self.removed {
                    sink.send_to(
                        client,
                        ServerMessage::BuildingRemoved {
                            colony_id: pass.colony_id,
                            position: *position,
                        },
                    )?;
                    sent += 1;
                }
            }
        }
        Ok(sent)
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
        self.removed.clear();
        for building in self.buildings.values_mut() {
            building.dirty = false;
        }
    }
}
