//! Client-side cache of one colony, fed by server messages

use std::collections::BTreeMap;

use tracing::debug;

use crate::colony::permissions::Rank;
use crate::colony::work_order::{WorkOrderId, WorkOrderView};
use crate::colony::{CitizenId, ColonyId};
use crate::net::protocol::{decode, BuildingViewMessage, CitizenViewMessage, ColonyViewMessage, DecodeError, ServerMessage};
use crate::util::vec3::BlockPos;

#[derive(Debug, Default)]
pub struct ClientColonyView {
    colony_id: ColonyId,
    summary: Option<ColonyViewMessage>,
    rank: Option<Rank>,
    work_orders: BTreeMap<WorkOrderId, WorkOrderView>,
    citizens: BTreeMap<CitizenId, CitizenViewMessage>,
    buildings: BTreeMap<BlockPos, BuildingViewMessage>,
    schematic_refreshes: u32,
    dropped_views: u32,
}

impl ClientColonyView {
    pub fn new(colony_id: ColonyId) -> Self {
        Self {
            colony_id,
            ..Self::default()
        }
    }

    /// Decode and apply one encoded message
    pub fn apply_bytes(&mut self, data: &[u8]) -> Result<bool, DecodeError> {
        let message: ServerMessage = decode(data)?;
        Ok(self.apply(&message))
    }

    /// Apply a message; returns false if it belongs to another colony
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::ColonyView(view) => {
                if view.colony_id != self.colony_id {
                    return false;
                }
                // A fresh subscription is followed by full snapshots
                if view.is_new_subscriber {
                    self.work_orders.clear();
                    self.citizens.clear();
                    self.buildings.clear();
                }
                self.summary = Some(view.clone());
            }
            ServerMessage::PermissionsView(view) => {
                if view.colony_id != self.colony_id {
                    return false;
                }
                self.rank = Some(view.rank);
            }
            ServerMessage::WorkOrderView(message) => {
                if message.colony_id != self.colony_id {
                    return false;
                }
                match message.view() {
                    Some(view) => {
                        self.work_orders.insert(view.id(), view);
                    }
                    None => self.dropped_views += 1,
                }
            }
            ServerMessage::WorkOrderRemoved { colony_id, work_order_id } => {
                if *colony_id != self.colony_id {
                    return false;
                }
                self.work_orders.remove(work_order_id);
            }
            ServerMessage::CitizenView(view) => {
                if view.colony_id != self.colony_id {
                    return false;
                }
                self.citizens.insert(view.citizen_id, view.clone());
            }
            ServerMessage::CitizenRemoved { colony_id, citizen_id } => {
                if *colony_id != self.colony_id {
                    return false;
                }
                self.citizens.remove(citizen_id);
            }
            ServerMessage::BuildingView(view) => {
                if view.colony_id != self.colony_id {
                    return false;
                }
                self.buildings.insert(view.position, view.clone());
            }
            ServerMessage::BuildingRemoved { colony_id, position } => {
                if *colony_id != self.colony_id {
                    return false;
                }
                self.buildings.remove(position);
            }
            ServerMessage::Schematics(_) => {
                self.schematic_refreshes += 1;
                debug!("Refreshing schematic catalog for colony {}", self.colony_id);
            }
        }
        true
    }

    pub fn colony_id(&self) -> ColonyId {
        self.colony_id
    }

    pub fn summary(&self) -> Option<&ColonyViewMessage> {
        self.summary.as_ref()
    }

    pub fn rank(&self) -> Option<Rank> {
        self.rank
    }

    pub fn work_order(&self, id: WorkOrderId) -> Option<&WorkOrderView> {
        self.work_orders.get(&id)
    }

    /// Work orders, highest priority first
    pub fn work_orders_by_priority(&self) -> Vec<&WorkOrderView> {
        let mut orders: Vec<&WorkOrderView> = self.work_orders.values().collect();
        orders.sort_by(|a, b| b.priority().cmp(&a.priority()).then(a.id().cmp(&b.id())));
        orders
    }

    pub fn work_order_count(&self) -> usize {
        self.work_orders.len()
    }

    pub fn citizens(&self) -> impl Iterator<Item = &CitizenViewMessage> {
        self.citizens.values()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &BuildingViewMessage> {
        self.buildings.values()
    }

    pub fn schematic_refreshes(&self) -> u32 {
        self.schematic_refreshes
    }

    /// Work order payloads that could not be read
    pub fn dropped_views(&self) -> u32 {
        self.dropped_views
    }
}
