use serde::{Deserialize, Serialize};

use crate::colony::permissions::Rank;
use crate::colony::work_order::{create_work_order_view, WorkOrder, WorkOrderId, WorkOrderView};
use crate::colony::{CitizenId, Colony, ColonyId};
use crate::net::wire::WireWriter;
use crate::sync::dirty::SyncChannel;
use crate::util::vec3::BlockPos;

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Colony summary
    ColonyView(ColonyViewMessage),
    /// The recipient's own rank in the colony
    PermissionsView(PermissionsViewMessage),
    /// One work order projection
    WorkOrderView(WorkOrderViewMessage),
    /// A work order was removed
    WorkOrderRemoved {
        colony_id: ColonyId,
        work_order_id: WorkOrderId,
    },
    /// One citizen
    CitizenView(CitizenViewMessage),
    /// A citizen left the colony
    CitizenRemoved {
        colony_id: ColonyId,
        citizen_id: CitizenId,
    },
    /// One building
    BuildingView(BuildingViewMessage),
    /// A building was torn down
    BuildingRemoved {
        colony_id: ColonyId,
        position: BlockPos,
    },
    /// Schematic styles changed; clients refresh their catalog
    Schematics(SchematicsMessage),
}

impl ServerMessage {
    /// Sync channel this message is dispatched on
    pub fn channel(&self) -> SyncChannel {
        match self {
            ServerMessage::ColonyView(_) => SyncChannel::ColonyView,
            ServerMessage::PermissionsView(_) => SyncChannel::Permissions,
            ServerMessage::WorkOrderView(_) | ServerMessage::WorkOrderRemoved { .. } => {
                SyncChannel::WorkOrders
            }
            ServerMessage::CitizenView(_) | ServerMessage::CitizenRemoved { .. } => {
                SyncChannel::Citizens
            }
            ServerMessage::BuildingView(_) | ServerMessage::BuildingRemoved { .. } => {
                SyncChannel::Buildings
            }
            ServerMessage::Schematics(_) => SyncChannel::Schematics,
        }
    }
}

/// Colony summary sent to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyViewMessage {
    pub colony_id: ColonyId,
    pub is_new_subscriber: bool,
    pub name: String,
    pub dimension: i32,
    pub center: BlockPos,
    pub last_contact_hours: u32,
    pub citizen_count: u32,
}

impl ColonyViewMessage {
    pub fn from_colony(colony: &Colony, is_new_subscriber: bool) -> Self {
        Self {
            colony_id: colony.id(),
            is_new_subscriber,
            name: colony.name().to_string(),
            dimension: colony.dimension(),
            center: colony.center(),
            last_contact_hours: colony.last_contact_hours(),
            citizen_count: colony.citizens().len() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionsViewMessage {
    pub colony_id: ColonyId,
    pub rank: Rank,
}

/// Work order projection; `payload` uses the fixed view layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderViewMessage {
    pub colony_id: ColonyId,
    pub payload: Vec<u8>,
}

impl WorkOrderViewMessage {
    pub fn new(colony_id: ColonyId, order: &WorkOrder) -> Self {
        let mut writer = WireWriter::new();
        order.serialize_view_network_data(&mut writer);
        Self {
            colony_id,
            payload: writer.into_bytes(),
        }
    }

    /// Rebuild the view on the receiving side
    pub fn view(&self) -> Option<WorkOrderView> {
        create_work_order_view(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenViewMessage {
    pub colony_id: ColonyId,
    pub citizen_id: CitizenId,
    pub name: String,
    pub job: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingViewMessage {
    pub colony_id: ColonyId,
    pub position: BlockPos,
    pub kind: String,
    pub level: i32,
}

/// Trigger only, no payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchematicsMessage;

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
