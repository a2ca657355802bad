//! Per-colony work order book

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::order::{log_load_failure, LoadError, WorkOrder, WorkOrderError, WorkOrderId, WorkOrderKind};
use super::registry::WorkOrderRegistry;
use crate::colony::{CitizenId, ColonyContext};
use crate::net::protocol::{ServerMessage, WorkOrderViewMessage};
use crate::net::sink::{MessageSink, SendError};
use crate::persist::TagCompound;
use crate::sync::dirty::{SyncChannel, SyncPass, SyncSubsystem};

const TAG_WORK_ORDERS: &str = "workOrders";
const TAG_TOP_ID: &str = "topWorkOrderId";

/// Outcome of restoring a work order list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub unknown: usize,
    pub corrupt: usize,
    /// Records whose id was already taken by an earlier record
    pub duplicate: usize,
}

impl LoadSummary {
    pub fn dropped(&self) -> usize {
        self.unknown + self.corrupt + self.duplicate
    }
}

#[derive(Debug)]
pub struct WorkManager {
    registry: Arc<WorkOrderRegistry>,
    orders: BTreeMap<WorkOrderId, WorkOrder>,
    removed: Vec<WorkOrderId>,
    top_id: WorkOrderId,
    dirty: bool,
}

impl WorkManager {
    pub fn new(registry: Arc<WorkOrderRegistry>) -> Self {
        Self {
            registry,
            orders: BTreeMap::new(),
            removed: Vec::new(),
            top_id: 0,
            dirty: false,
        }
    }

    pub fn registry(&self) -> &WorkOrderRegistry {
        &self.registry
    }

    /// Take ownership of `order`, giving it the next id
    pub fn add_work_order(&mut self, mut order: WorkOrder) -> WorkOrderId {
        self.top_id += 1;
        let id = self.top_id;
        order.set_id(id);
        debug!("Work order #{} added ({})", id, order.value());
        self.orders.insert(id, order);
        self.dirty = true;
        id
    }

    pub fn remove_work_order(&mut self, id: WorkOrderId) -> Option<WorkOrder> {
        let order = self.orders.remove(&id)?;
        self.removed.push(id);
        self.dirty = true;
        Some(order)
    }

    pub fn get(&self, id: WorkOrderId) -> Option<&WorkOrder> {
        self.orders.get(&id)
    }

    pub fn get_mut(&mut self, id: WorkOrderId) -> Option<&mut WorkOrder> {
        self.orders.get_mut(&id)
    }

    pub fn work_orders(&self) -> impl Iterator<Item = &WorkOrder> {
        self.orders.values()
    }

    /// Orders whose kind is `K`
    pub fn orders_of_kind<K: WorkOrderKind>(&self) -> impl Iterator<Item = (&WorkOrder, &K)> {
        self.orders
            .values()
            .filter_map(|order| order.kind_as::<K>().map(|kind| (order, kind)))
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Highest-priority unclaimed order; equal priorities go to the oldest
    pub fn unassigned_work_order(&self) -> Option<&WorkOrder> {
        self.orders
            .values()
            .filter(|order| !order.is_claimed())
            .fold(None, |best: Option<&WorkOrder>, order| match best {
                Some(b) if b.priority() >= order.priority() => Some(b),
                _ => Some(order),
            })
    }

    /// Claim order `id` for `citizen`; false if there is no such order
    pub fn claim(&mut self, id: WorkOrderId, citizen: CitizenId) -> bool {
        match self.orders.get_mut(&id) {
            Some(order) => {
                order.claim(citizen);
                true
            }
            None => false,
        }
    }

    /// Release every order held by `citizen`; returns how many were released
    pub fn clear_claims_of(&mut self, citizen: CitizenId) -> usize {
        let mut released = 0;
        for order in self.orders.values_mut() {
            if order.is_claimed_by(citizen) {
                order.clear_claim();
                released += 1;
            }
        }
        released
    }

    /// Remove orders whose kind reports them invalid
    pub fn sweep_invalid(&mut self, colony: &ColonyContext<'_>) -> usize {
        let invalid: Vec<WorkOrderId> = self
            .orders
            .values()
            .filter(|order| !order.is_valid(colony))
            .map(WorkOrder::id)
            .collect();
        for id in &invalid {
            debug!("Work order #{} in colony {} no longer valid", id, colony.colony_id);
            self.remove_work_order(*id);
        }
        invalid.len()
    }

    pub fn write_to_tag(&self, tag: &mut TagCompound) -> Result<(), WorkOrderError> {
        let mut list = Vec::with_capacity(self.orders.len());
        for order in self.orders.values() {
            let mut entry = TagCompound::new();
            order.write_to_tag(&self.registry, &mut entry)?;
            list.push(entry);
        }
        tag.set_list(TAG_WORK_ORDERS, list);
        tag.set_int(TAG_TOP_ID, self.top_id);
        Ok(())
    }

    /// Replace the book with the orders saved in `tag`. Bad records are
    /// logged and dropped.
    pub fn read_from_tag(&mut self, tag: &TagCompound) -> LoadSummary {
        let mut summary = LoadSummary::default();
        self.orders.clear();
        self.removed.clear();
        self.top_id = tag.get_int(TAG_TOP_ID);

        for entry in tag.get_list(TAG_WORK_ORDERS) {
            match WorkOrder::read_from_tag(&self.registry, entry) {
                Ok(order) if self.orders.contains_key(&order.id()) => {
                    warn!("Duplicate work order #{}, dropping record", order.id());
                    summary.duplicate += 1;
                }
                Ok(order) => {
                    self.top_id = self.top_id.max(order.id());
                    self.orders.insert(order.id(), order);
                    summary.loaded += 1;
                }
                Err(err) => {
                    log_load_failure(&err);
                    match err {
                        LoadError::UnknownType(_) => summary.unknown += 1,
                        LoadError::Corrupt { .. } => summary.corrupt += 1,
                    }
                }
            }
        }
        self.dirty = false;
        summary
    }
}

impl SyncSubsystem for WorkManager {
    fn channel(&self) -> SyncChannel {
        SyncChannel::WorkOrders
    }

    fn is_dirty(&self) -> bool {
        self.dirty || self.orders.values().any(WorkOrder::is_dirty)
    }

    /// Every recipient gets the whole book
    fn send_packets(&self, pass: &SyncPass<'_>, sink: &mut dyn MessageSink) -> Result<usize, SendError> {
        let recipients = pass.recipients(self.is_dirty());
        if recipients.is_empty() {
            return Ok(0);
        }

        let views: Vec<WorkOrderViewMessage> = self
            .orders
            .values()
            .map(|order| WorkOrderViewMessage::new(pass.colony_id, order))
            .collect();

        let mut sent = 0;
        for client in &recipients {
            for view in &views {
                sink.send_to(*client, ServerMessage::WorkOrderView(view.clone()))?;
                sent += 1;
            }
            if !pass.is_new(client) {
                for id in &self.removed {
                    sink.send_to(
                        *client,
                        ServerMessage::WorkOrderRemoved {
                            colony_id: pass.colony_id,
                            work_order_id: *id,
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
        for order in self.orders.values_mut() {
            order.reset_dirty();
        }
    }
}
