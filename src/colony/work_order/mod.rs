//! Work orders: claimable units of deferred colony work
//!
//! Concrete kinds are registered by name in a [`WorkOrderRegistry`]; the
//! name is what gets persisted, so a kind can be restored from a save without
//! the loader knowing every kind up front.

pub mod kinds;
pub mod manager;
pub mod order;
pub mod registry;
pub mod view;

pub use kinds::{BuildOrder, DecorationOrder};
pub use manager::{LoadSummary, WorkManager};
pub use order::{LoadError, WorkOrder, WorkOrderError, WorkOrderId, WorkOrderKind, WorkOrderType};
pub use registry::{ConfigurationError, WorkOrderFactory, WorkOrderRegistry};
pub use view::{create_work_order_view, WorkOrderView};
