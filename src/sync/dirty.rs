//! Dirty-flag gating for per-subsystem dispatch
//!
//! Changed data goes to every subscriber; unchanged data only to clients that
//! were not subscribed last pass, so every subscriber ends up current.

use smallvec::SmallVec;

use crate::colony::ColonyId;
use crate::net::sink::{MessageSink, SendError};
use crate::net::ClientId;
use crate::sync::subscribers::SubscriberSet;

/// Synchronized subsystem channels, in dispatch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncChannel {
    ColonyView,
    Permissions,
    WorkOrders,
    Citizens,
    Buildings,
    Schematics,
}

impl SyncChannel {
    pub const ALL: [SyncChannel; 6] = [
        SyncChannel::ColonyView,
        SyncChannel::Permissions,
        SyncChannel::WorkOrders,
        SyncChannel::Citizens,
        SyncChannel::Buildings,
        SyncChannel::Schematics,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SyncChannel::ColonyView => "colony_view",
            SyncChannel::Permissions => "permissions",
            SyncChannel::WorkOrders => "work_orders",
            SyncChannel::Citizens => "citizens",
            SyncChannel::Buildings => "buildings",
            SyncChannel::Schematics => "schematics",
        }
    }
}

/// Subscriber state shared by every subsystem during one pass
pub struct SyncPass<'a> {
    pub colony_id: ColonyId,
    pub old_subscribers: &'a SubscriberSet,
    pub subscribers: &'a SubscriberSet,
    pub has_new_subscribers: bool,
}

impl<'a> SyncPass<'a> {
    /// Channel-level gate
    #[inline]
    pub fn should_send(&self, dirty: bool) -> bool {
        dirty || self.has_new_subscribers
    }

    #[inline]
    pub fn is_new(&self, client: &ClientId) -> bool {
        !self.old_subscribers.contains(client)
    }

    /// Clients that receive a channel with the given dirty state
    pub fn recipients(&self, dirty: bool) -> SmallVec<[ClientId; 16]> {
        if !self.should_send(dirty) {
            return SmallVec::new();
        }
        self.subscribers
            .iter()
            .filter(|client| dirty || self.is_new(client))
            .copied()
            .collect()
    }
}

/// Contract for anything plugged into the dispatcher
pub trait SyncSubsystem {
    fn channel(&self) -> SyncChannel;

    fn is_dirty(&self) -> bool;

    /// Send this pass's updates; returns the number of messages sent
    fn send_packets(&self, pass: &SyncPass<'_>, sink: &mut dyn MessageSink) -> Result<usize, SendError>;

    /// Called once per pass after dispatch
    fn clear_dirty(&mut self);
}
