//! Work order entity: claim state, persistence, network projection

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::registry::WorkOrderRegistry;
use crate::colony::constants::work_orders::{DEFAULT_PRIORITY, UNCLAIMED};
use crate::colony::{CitizenId, ColonyContext};
use crate::net::wire::{WireError, WireWriter};
use crate::persist::{TagCompound, TagError};

pub type WorkOrderId = i32;

const TAG_TYPE: &str = "type";
const TAG_ID: &str = "id";
const TAG_CLAIMED_BY: &str = "claimedBy";

/// Category shown to clients; sent as its ordinal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkOrderType {
    #[default]
    Build,
    Upgrade,
    Decoration,
}

impl WorkOrderType {
    pub fn ordinal(self) -> i32 {
        match self {
            WorkOrderType::Build => 0,
            WorkOrderType::Upgrade => 1,
            WorkOrderType::Decoration => 2,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Result<Self, WireError> {
        match ordinal {
            0 => Ok(WorkOrderType::Build),
            1 => Ok(WorkOrderType::Upgrade),
            2 => Ok(WorkOrderType::Decoration),
            other => Err(WireError::UnknownOrdinal(other)),
        }
    }
}

/// Behaviour supplied by each concrete work order kind
pub trait WorkOrderKind: Any + fmt::Debug + Send {
    /// Category reported in the network view
    fn order_type(&self) -> WorkOrderType;

    /// Short description for the network view, e.g. "tavern:2"
    fn value(&self) -> String;

    /// Write kind-specific fields next to the common ones
    fn write_fields(&self, tag: &mut TagCompound);

    /// Read kind-specific fields; any error drops the record
    fn read_fields(&mut self, tag: &TagCompound) -> Result<(), TagError>;

    /// Whether the order should survive the next validity sweep
    fn is_valid(&self, _colony: &ColonyContext<'_>) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn kind_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Errors while saving a work order
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkOrderError {
    #[error("{kind} is missing a registry mapping")]
    MissingMapping { kind: &'static str },
}

/// Per-record load failures; the record is dropped and loading continues
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Unknown work order type '{0}'")]
    UnknownType(String),
    #[error("Work order {type_name} ({kind}) #{id} could not be restored: {source}")]
    Corrupt {
        type_name: String,
        kind: &'static str,
        id: WorkOrderId,
        source: TagError,
    },
}

/// Log a dropped record at the level its failure deserves
pub(crate) fn log_load_failure(err: &LoadError) {
    match err {
        LoadError::UnknownType(_) => warn!("{}, dropping record", err),
        LoadError::Corrupt { .. } => error!("{}, dropping record", err),
    }
}

/// A persisted, claimable unit of deferred work
#[derive(Debug)]
pub struct WorkOrder {
    id: WorkOrderId,
    claimed_by: CitizenId,
    priority: i32,
    dirty: bool,
    kind: Box<dyn WorkOrderKind>,
}

impl WorkOrder {
    /// Fresh order with default fields; the id is assigned by the work manager
    pub fn new(kind: impl WorkOrderKind) -> Self {
        Self::from_kind(Box::new(kind))
    }

    pub fn from_kind(kind: Box<dyn WorkOrderKind>) -> Self {
        Self {
            id: 0,
            claimed_by: UNCLAIMED,
            priority: DEFAULT_PRIORITY,
            dirty: false,
            kind,
        }
    }

    pub fn id(&self) -> WorkOrderId {
        self.id
    }

    pub fn set_id(&mut self, id: WorkOrderId) {
        self.id = id;
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Change the priority, marking the order dirty when it actually changes
    pub fn set_priority(&mut self, priority: i32) {
        if self.priority != priority {
            self.priority = priority;
            self.dirty = true;
        }
    }

    pub fn claimed_by(&self) -> CitizenId {
        self.claimed_by
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by != UNCLAIMED
    }

    pub fn is_claimed_by(&self, citizen: CitizenId) -> bool {
        self.is_claimed() && self.claimed_by == citizen
    }

    /// Claim for `citizen`
    ///
    /// An existing claim is overwritten without complaint; callers that need
    /// exclusivity check [`is_claimed`](Self::is_claimed) first.
    pub fn claim(&mut self, citizen: CitizenId) {
        self.claimed_by = citizen;
        self.dirty = true;
    }

    /// Drop any claim. Always marks the order dirty, even when unclaimed.
    pub fn clear_claim(&mut self) {
        self.claimed_by = UNCLAIMED;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn is_valid(&self, colony: &ColonyContext<'_>) -> bool {
        self.kind.is_valid(colony)
    }

    pub fn order_type(&self) -> WorkOrderType {
        self.kind.order_type()
    }

    pub fn value(&self) -> String {
        self.kind.value()
    }

    pub fn kind(&self) -> &dyn WorkOrderKind {
        self.kind.as_ref()
    }

    /// Downcast to a concrete kind
    pub fn kind_as<K: WorkOrderKind>(&self) -> Option<&K> {
        self.kind.as_any().downcast_ref::<K>()
    }

    pub fn kind_as_mut<K: WorkOrderKind>(&mut self) -> Option<&mut K> {
        self.kind.as_any_mut().downcast_mut::<K>()
    }

    /// Save into `tag`; `claimedBy` is omitted while unclaimed
    pub fn write_to_tag(&self, registry: &WorkOrderRegistry, tag: &mut TagCompound) -> Result<(), WorkOrderError> {
        let name = registry.name_of(self.kind.as_ref())?;

        tag.set_string(TAG_TYPE, name);
        tag.set_int(TAG_ID, self.id);
        if self.claimed_by != UNCLAIMED {
            tag.set_int(TAG_CLAIMED_BY, self.claimed_by);
        }
        self.kind.write_fields(tag);
        Ok(())
    }

    /// Restore an order saved by [`write_to_tag`](Self::write_to_tag)
    pub fn read_from_tag(registry: &WorkOrderRegistry, tag: &TagCompound) -> Result<WorkOrder, LoadError> {
        let type_name = tag.get_string(TAG_TYPE);
        let factory = registry
            .resolve(type_name)
            .ok_or_else(|| LoadError::UnknownType(type_name.to_string()))?;

        let mut order = WorkOrder::from_kind(factory());
        order.id = tag.get_int(TAG_ID);
        order.claimed_by = tag.get_int(TAG_CLAIMED_BY);

        if let Err(source) = order.kind.read_fields(tag) {
            return Err(LoadError::Corrupt {
                type_name: type_name.to_string(),
                kind: order.kind.kind_name(),
                id: order.id,
                source,
            });
        }

        Ok(order)
    }

    /// Restore an order, logging and returning `None` for a bad record
    pub fn create_from_tag(registry: &WorkOrderRegistry, tag: &TagCompound) -> Option<WorkOrder> {
        match Self::read_from_tag(registry, tag) {
            Ok(order) => Some(order),
            Err(err) => {
                log_load_failure(&err);
                None
            }
        }
    }

    /// Write the client view: id, priority, claimedBy, type ordinal, value
    pub fn serialize_view_network_data(&self, writer: &mut WireWriter) {
        writer
            .write_i32(self.id)
            .write_i32(self.priority)
            .write_i32(self.claimed_by)
            .write_i32(self.order_type().ordinal())
            .write_utf8(&self.value());
    }
}
