//! Client-side projection of a work order
//!
//! Views are rebuilt from every received payload and never patched in place.

use tracing::error;

use super::order::{WorkOrderId, WorkOrderType};
use crate::colony::constants::work_orders::UNCLAIMED;
use crate::colony::CitizenId;
use crate::net::wire::{WireError, WireReader};

/// Read-only work order state as seen by a client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkOrderView {
    id: WorkOrderId,
    priority: i32,
    claimed_by: CitizenId,
    order_type: WorkOrderType,
    value: String,
}

impl WorkOrderView {
    /// Fill fields in wire order so a failure still leaves the id readable
    fn deserialize(&mut self, reader: &mut WireReader<'_>) -> Result<(), WireError> {
        self.id = reader.read_i32()?;
        self.priority = reader.read_i32()?;
        self.claimed_by = reader.read_i32()?;
        self.order_type = WorkOrderType::from_ordinal(reader.read_i32()?)?;
        self.value = reader.read_utf8()?;
        Ok(())
    }

    pub fn id(&self) -> WorkOrderId {
        self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn claimed_by(&self) -> CitizenId {
        self.claimed_by
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by != UNCLAIMED
    }

    pub fn order_type(&self) -> WorkOrderType {
        self.order_type
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Rebuild a view from a payload, or `None` if it cannot be read
pub fn create_work_order_view(payload: &[u8]) -> Option<WorkOrderView> {
    let mut view = WorkOrderView::default();
    let mut reader = WireReader::new(payload);

    match view.deserialize(&mut reader) {
        Ok(()) => Some(view),
        Err(e) => {
            error!(
                "Work order view #{} could not be restored, skipping: {}",
                view.id, e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::work_order::kinds::DecorationOrder;
    use crate::colony::work_order::order::WorkOrder;
    use crate::net::wire::WireWriter;
    use crate::util::vec3::BlockPos;

    #[test]
    fn test_view_from_order() {
        let mut order = WorkOrder::new(DecorationOrder::new("well", BlockPos::new(3, 64, 3)));
        order.set_id(5);
        order.set_priority(2);

        let mut writer = WireWriter::new();
        order.serialize_view_network_data(&mut writer);

        let view = create_work_order_view(&writer.into_bytes()).unwrap();
        assert_eq!(view.id(), 5);
        assert_eq!(view.priority(), 2);
        assert!(!view.is_claimed());
        assert_eq!(view.order_type(), WorkOrderType::Decoration);
        assert_eq!(view.value(), "well:0");
    }

    #[test]
    fn test_truncated_payload_yields_none() {
        let mut writer = WireWriter::new();
        writer.write_i32(12).write_i32(1);
        assert!(create_work_order_view(&writer.into_bytes()).is_none());
    }

    #[test]
    fn test_unknown_type_ordinal_yields_none() {
        let mut writer = WireWriter::new();
        writer
            .write_i32(12)
            .write_i32(1)
            .write_i32(0)
            .write_i32(99)
            .write_utf8("x");
        assert!(create_work_order_view(&writer.into_bytes()).is_none());
    }

    #[test]
    fn test_partial_read_keeps_id() {
        let mut writer = WireWriter::new();
        writer.write_i32(31);
        let bytes = writer.into_bytes();

        let mut view = WorkOrderView::default();
        let result = view.deserialize(&mut WireReader::new(&bytes));
        assert!(result.is_err());
        assert_eq!(view.id(), 31);
    }
}
