//! Work order kinds shipped with the server

use std::any::Any;

use super::order::{WorkOrderKind, WorkOrderType};
use crate::colony::ColonyContext;
use crate::persist::{TagCompound, TagError};
use crate::util::vec3::BlockPos;

const TAG_BUILDING: &str = "building";
const TAG_UPGRADE: &str = "upgrade";
const TAG_LEVEL: &str = "level";
const TAG_STRUCTURE: &str = "structure";
const TAG_POSITION: &str = "position";

/// Construct or upgrade a colony building
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOrder {
    building: BlockPos,
    upgrade_name: String,
    upgrade_level: i32,
}

impl BuildOrder {
    pub fn new(building: BlockPos, upgrade_name: impl Into<String>, upgrade_level: i32) -> Self {
        Self {
            building,
            upgrade_name: upgrade_name.into(),
            upgrade_level,
        }
    }

    pub fn building(&self) -> BlockPos {
        self.building
    }

    pub fn upgrade_name(&self) -> &str {
        &self.upgrade_name
    }

    pub fn upgrade_level(&self) -> i32 {
        self.upgrade_level
    }
}

impl WorkOrderKind for BuildOrder {
    fn order_type(&self) -> WorkOrderType {
        if self.upgrade_level <= 1 {
            WorkOrderType::Build
        } else {
            WorkOrderType::Upgrade
        }
    }

    fn value(&self) -> String {
        format!("{}:{}", self.upgrade_name, self.upgrade_level)
    }

    fn write_fields(&self, tag: &mut TagCompound) {
        tag.set_block_pos(TAG_BUILDING, self.building);
        tag.set_string(TAG_UPGRADE, self.upgrade_name.as_str());
        tag.set_int(TAG_LEVEL, self.upgrade_level);
    }

    fn read_fields(&mut self, tag: &TagCompound) -> Result<(), TagError> {
        self.building = tag.try_get_block_pos(TAG_BUILDING)?;
        self.upgrade_name = tag.try_get_string(TAG_UPGRADE)?.to_string();
        self.upgrade_level = tag.try_get_int(TAG_LEVEL)?;
        Ok(())
    }

    /// The target building must still stand
    fn is_valid(&self, colony: &ColonyContext<'_>) -> bool {
        colony.has_building(self.building)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Place a decorative structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecorationOrder {
    structure: String,
    position: BlockPos,
}

impl DecorationOrder {
    pub fn new(structure: impl Into<String>, position: BlockPos) -> Self {
        Self {
            structure: structure.into(),
            position,
        }
    }

    pub fn structure(&self) -> &str {
        &self.structure
    }

    pub fn position(&self) -> BlockPos {
        self.position
    }
}

impl WorkOrderKind for DecorationOrder {
    fn order_type(&self) -> WorkOrderType {
        WorkOrderType::Decoration
    }

    fn value(&self) -> String {
        format!("{}:0", self.structure)
    }

    fn write_fields(&self, tag: &mut TagCompound) {
        tag.set_string(TAG_STRUCTURE, self.structure.as_str());
        tag.set_block_pos(TAG_POSITION, self.position);
    }

    fn read_fields(&mut self, tag: &TagCompound) -> Result<(), TagError> {
        self.structure = tag.try_get_string(TAG_STRUCTURE)?.to_string();
        self.position = tag.try_get_block_pos(TAG_POSITION)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::buildings::BuildingManager;

    #[test]
    fn test_build_order_type_by_level() {
        let pos = BlockPos::new(1, 2, 3);
        assert_eq!(BuildOrder::new(pos, "townhall", 1).order_type(), WorkOrderType::Build);
        assert_eq!(BuildOrder::new(pos, "townhall", 3).order_type(), WorkOrderType::Upgrade);
        assert_eq!(BuildOrder::new(pos, "townhall", 3).value(), "townhall:3");
    }

    #[test]
    fn test_build_order_fields() {
        let order = BuildOrder::new(BlockPos::new(7, 65, 7), "bakery", 2);
        let mut tag = TagCompound::new();
        order.write_fields(&mut tag);

        let mut restored = BuildOrder::default();
        restored.read_fields(&tag).unwrap();
        assert_eq!(restored, order);
    }

    #[test]
    fn test_build_order_validity_follows_building() {
        let pos = BlockPos::new(10, 64, 10);
        let mut buildings = BuildingManager::new();
        let order = BuildOrder::new(pos, "bakery", 1);

        let ctx = ColonyContext::new(1, &buildings);
        assert!(!order.is_valid(&ctx));

        buildings.add_building(pos, "bakery");
        let ctx = ColonyContext::new(1, &buildings);
        assert!(order.is_valid(&ctx));
    }

    #[test]
    fn test_decoration_order() {
        let order = DecorationOrder::new("fountain", BlockPos::new(0, 64, 5));
        assert_eq!(order.order_type(), WorkOrderType::Decoration);
        assert_eq!(order.value(), "fountain:0");

        let mut tag = TagCompound::new();
        order.write_fields(&mut tag);
        let mut restored = DecorationOrder::default();
        restored.read_fields(&tag).unwrap();
        assert_eq!(restored, order);

        let buildings = BuildingManager::new();
        assert!(order.is_valid(&ColonyContext::new(1, &buildings)));
    }

    #[test]
    fn test_decoration_missing_structure_is_error() {
        let mut restored = DecorationOrder::default();
        assert_eq!(
            restored.read_fields(&TagCompound::new()),
            Err(TagError::MissingKey("structure".to_string()))
        );
    }
}
