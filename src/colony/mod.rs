//! Colony aggregate and its synchronized subsystems

pub mod buildings;
pub mod citizens;
pub mod constants;
pub mod permissions;
pub mod schematics;
pub mod work_order;

use std::sync::Arc;

use tracing::info;

use crate::persist::{TagCompound, TagError};
use crate::sync::dirty::SyncSubsystem;
use crate::util::vec3::BlockPos;

use buildings::BuildingManager;
use citizens::CitizenManager;
use permissions::Permissions;
use schematics::SchematicCatalog;
use work_order::{LoadSummary, WorkManager, WorkOrderError, WorkOrderRegistry};

pub type ColonyId = u32;
pub type CitizenId = i32;

const TAG_ID: &str = "id";
const TAG_NAME: &str = "name";
const TAG_DIMENSION: &str = "dimension";
const TAG_CENTER: &str = "center";
const TAG_LAST_CONTACT: &str = "lastContactInHours";
const TAG_PERMISSIONS: &str = "permissions";
const TAG_CITIZENS: &str = "citizens";
const TAG_BUILDINGS: &str = "buildings";
const TAG_WORK_MANAGER: &str = "workManager";

/// Read-only view of the colony handed to work order validity checks
#[derive(Debug, Clone, Copy)]
pub struct ColonyContext<'a> {
    pub colony_id: ColonyId,
    buildings: &'a BuildingManager,
}

impl<'a> ColonyContext<'a> {
    pub fn new(colony_id: ColonyId, buildings: &'a BuildingManager) -> Self {
        Self { colony_id, buildings }
    }

    pub fn has_building(&self, position: BlockPos) -> bool {
        self.buildings.contains(position)
    }
}

#[derive(Debug)]
pub struct Colony {
    id: ColonyId,
    name: String,
    dimension: i32,
    center: BlockPos,
    last_contact_hours: u32,
    summary_dirty: bool,
    permissions: Permissions,
    work_manager: WorkManager,
    citizens: CitizenManager,
    buildings: BuildingManager,
    schematics: SchematicCatalog,
}

impl Colony {
    pub fn new(
        id: ColonyId,
        name: impl Into<String>,
        dimension: i32,
        center: BlockPos,
        registry: Arc<WorkOrderRegistry>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            dimension,
            center,
            last_contact_hours: 0,
            summary_dirty: false,
            permissions: Permissions::new(),
            work_manager: WorkManager::new(registry),
            citizens: CitizenManager::new(),
            buildings: BuildingManager::new(),
            schematics: SchematicCatalog::new(),
        }
    }

    pub fn id(&self) -> ColonyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.summary_dirty = true;
    }

    pub fn dimension(&self) -> i32 {
        self.dimension
    }

    pub fn center(&self) -> BlockPos {
        self.center
    }

    /// Hours elapsed with no member online
    pub fn last_contact_hours(&self) -> u32 {
        self.last_contact_hours
    }

    pub fn record_contact_hour(&mut self) {
        self.last_contact_hours += 1;
        self.summary_dirty = true;
        info!(
            "Colony {} has had no members online for {} hour(s)",
            self.id, self.last_contact_hours
        );
    }

    /// Reset the inactivity counter; returns false if it was already zero
    pub fn reset_contact(&mut self) -> bool {
        if self.last_contact_hours == 0 {
            return false;
        }
        info!(
            "Colony {} back in contact after {} hour(s)",
            self.id, self.last_contact_hours
        );
        self.last_contact_hours = 0;
        self.summary_dirty = true;
        true
    }

    /// The colony summary changed since the last sync pass: name, contact
    /// hours or the number of citizens
    pub fn is_summary_dirty(&self) -> bool {
        self.summary_dirty || self.citizens.roster_changed()
    }

    /// Consumed once per pass by the coordinator. The roster half is reset
    /// with the citizen subsystem's own flags at the end of that pass.
    pub fn take_summary_dirty(&mut self) -> bool {
        let dirty = self.is_summary_dirty();
        self.summary_dirty = false;
        dirty
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    pub fn permissions_mut(&mut self) -> &mut Permissions {
        &mut self.permissions
    }

    pub fn work_manager(&self) -> &WorkManager {
        &self.work_manager
    }

    pub fn work_manager_mut(&mut self) -> &mut WorkManager {
        &mut self.work_manager
    }

    pub fn citizens(&self) -> &CitizenManager {
        &self.citizens
    }

    pub fn citizens_mut(&mut self) -> &mut CitizenManager {
        &mut self.citizens
    }

    pub fn buildings(&self) -> &BuildingManager {
        &self.buildings
    }

    pub fn buildings_mut(&mut self) -> &mut BuildingManager {
        &mut self.buildings
    }

    pub fn schematics(&self) -> &SchematicCatalog {
        &self.schematics
    }

    pub fn schematics_mut(&mut self) -> &mut SchematicCatalog {
        &mut self.schematics
    }

    pub fn context(&self) -> ColonyContext<'_> {
        ColonyContext::new(self.id, &self.buildings)
    }

    /// Drop work orders that are no longer valid
    pub fn sweep_work_orders(&mut self) -> usize {
        let ctx = ColonyContext::new(self.id, &self.buildings);
        self.work_manager.sweep_invalid(&ctx)
    }

    /// Subsystems after the colony view, in dispatch order
    pub fn subsystems(&self) -> [&dyn SyncSubsystem; 5] {
        [
            &self.permissions,
            &self.work_manager,
            &self.citizens,
            &self.buildings,
            &self.schematics,
        ]
    }

    pub fn subsystems_mut(&mut self) -> [&mut dyn SyncSubsystem; 5] {
        [
            &mut self.permissions,
            &mut self.work_manager,
            &mut self.citizens,
            &mut self.buildings,
            &mut self.schematics,
        ]
    }

    pub fn write_to_tag(&self, tag: &mut TagCompound) -> Result<(), WorkOrderError> {
        tag.set_int(TAG_ID, self.id as i32);
        tag.set_string(TAG_NAME, self.name.as_str());
        tag.set_int(TAG_DIMENSION, self.dimension);
        tag.set_block_pos(TAG_CENTER, self.center);
        tag.set_int(TAG_LAST_CONTACT, self.last_contact_hours as i32);

        let mut permissions = TagCompound::new();
        self.permissions.write_to_tag(&mut permissions);
        tag.set_compound(TAG_PERMISSIONS, permissions);

        let mut citizens = TagCompound::new();
        self.citizens.write_to_tag(&mut citizens);
        tag.set_compound(TAG_CITIZENS, citizens);

        let mut buildings = TagCompound::new();
        self.buildings.write_to_tag(&mut buildings);
        tag.set_compound(TAG_BUILDINGS, buildings);

        let mut work = TagCompound::new();
        self.work_manager.write_to_tag(&mut work)?;
        tag.set_compound(TAG_WORK_MANAGER, work);
        Ok(())
    }

    /// Restore a colony. Identity fields are required; bad work orders are
    /// dropped and reported in the summary.
    pub fn read_from_tag(
        tag: &TagCompound,
        registry: Arc<WorkOrderRegistry>,
    ) -> Result<(Colony, LoadSummary), TagError> {
        let mut colony = Colony::new(
            tag.try_get_int(TAG_ID)? as ColonyId,
            tag.try_get_string(TAG_NAME)?,
            tag.get_int(TAG_DIMENSION),
            tag.try_get_block_pos(TAG_CENTER)?,
            registry,
        );
        colony.last_contact_hours = tag.get_int(TAG_LAST_CONTACT).max(0) as u32;

        let empty = TagCompound::new();
        let section = |key: &str| tag.try_get_compound(key).unwrap_or(&empty);

        colony.permissions = Permissions::read_from_tag(section(TAG_PERMISSIONS));
        colony.citizens = CitizenManager::read_from_tag(section(TAG_CITIZENS));
        colony.buildings = BuildingManager::read_from_tag(section(TAG_BUILDINGS));
        let summary = colony.work_manager.read_from_tag(section(TAG_WORK_MANAGER));
        Ok((colony, summary))
    }
}
