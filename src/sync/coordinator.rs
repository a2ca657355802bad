//! Per-tick synchronization pass for one colony
//!
//! Recompute subscribers, update the inactivity counter, dispatch every
//! subsystem, then clear dirty flags once.

use smallvec::SmallVec;
use tracing::{debug, error};

use crate::colony::constants::time::TICKS_PER_HOUR;
use crate::colony::Colony;
use crate::net::protocol::{ColonyViewMessage, ServerMessage};
use crate::net::sink::{MessageSink, SendError};
use crate::sync::dirty::{SyncChannel, SyncPass};
use crate::sync::subscribers::{
    add_nearby, collect_members, has_new_subscribers, InterestArea, InterestRadii, SubscriberSet,
};
use crate::sync::world::WorldSnapshot;

/// What happened during one pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Hosting world unavailable; nothing changed
    Skipped,
    Completed(PassReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub subscribers: usize,
    pub has_new_subscribers: bool,
    /// Messages sent, indexed by [`SyncChannel::index`]
    pub sent: [usize; 6],
    pub failed: SmallVec<[SyncChannel; 2]>,
}

impl PassReport {
    pub fn total_sent(&self) -> usize {
        self.sent.iter().sum()
    }

    pub fn sent_on(&self, channel: SyncChannel) -> usize {
        self.sent[channel.index()]
    }
}

pub struct SyncCoordinator {
    radii: InterestRadii,
    ticks_per_hour: u32,
    subscribers: SubscriberSet,
    ticks_without_contact: u32,
    colony_view_dirty: bool,
}

impl SyncCoordinator {
    pub fn new(radii: InterestRadii, ticks_per_hour: u32) -> Self {
        Self {
            radii,
            ticks_per_hour: ticks_per_hour.max(1),
            subscribers: SubscriberSet::default(),
            ticks_without_contact: 0,
            colony_view_dirty: false,
        }
    }

    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    pub fn is_colony_view_dirty(&self) -> bool {
        self.colony_view_dirty
    }

    /// Request a colony summary broadcast on the next pass
    pub fn mark_colony_view_dirty(&mut self) {
        self.colony_view_dirty = true;
    }

    /// Run one pass. `world` is `None` while the hosting server is not ready.
    pub fn update_subscribers(
        &mut self,
        colony: &mut Colony,
        world: Option<&WorldSnapshot>,
        sink: &mut dyn MessageSink,
    ) -> PassOutcome {
        let Some(world) = world else {
            return PassOutcome::Skipped;
        };
        if !world.is_dimension_loaded(colony.dimension()) {
            return PassOutcome::Skipped;
        }

        let old = std::mem::take(&mut self.subscribers);
        let mut subscribers = collect_members(world, |id| colony.permissions().is_subscriber(id));

        self.track_contact(colony, subscribers.is_empty());
        if colony.take_summary_dirty() {
            self.colony_view_dirty = true;
        }

        let area = InterestArea::new(colony.dimension(), colony.center(), self.radii);
        add_nearby(world, &area, &old, &mut subscribers);

        let has_new = has_new_subscribers(&old, &subscribers);
        if has_new || old.len() != subscribers.len() {
            debug!(
                "Colony {}: {} subscriber(s), {} joined, {} left",
                colony.id(),
                subscribers.len(),
                subscribers.iter().filter(|c| !old.contains(c)).count(),
                old.iter().filter(|c| !subscribers.contains(c)).count()
            );
        }

        let mut report = PassReport {
            subscribers: subscribers.len(),
            has_new_subscribers: has_new,
            ..PassReport::default()
        };

        if !subscribers.is_empty() {
            let pass = SyncPass {
                colony_id: colony.id(),
                old_subscribers: &old,
                subscribers: &subscribers,
                has_new_subscribers: has_new,
            };
            self.dispatch(colony, &pass, sink, &mut report);
        }

        self.colony_view_dirty = false;
        for subsystem in colony.subsystems_mut() {
            subsystem.clear_dirty();
        }

        self.subscribers = subscribers;
        PassOutcome::Completed(report)
    }

    /// Inactivity bookkeeping; runs before dispatch so its dirtying is seen
    /// by this pass
    fn track_contact(&mut self, colony: &mut Colony, no_members_online: bool) {
        if no_members_online {
            self.ticks_without_contact += 1;
            if self.ticks_without_contact >= self.ticks_per_hour {
                self.ticks_without_contact = 0;
                colony.record_contact_hour();
                self.colony_view_dirty = true;
            }
        } else if colony.last_contact_hours() != 0 {
            self.ticks_without_contact = 0;
            colony.reset_contact();
            self.colony_view_dirty = true;
        }
    }

    fn dispatch(&self, colony: &Colony, pass: &SyncPass<'_>, sink: &mut dyn MessageSink, report: &mut PassReport) {
        let result = send_colony_view(colony, self.colony_view_dirty, pass, sink);
        record(SyncChannel::ColonyView, result, colony, report);

        for subsystem in colony.subsystems() {
            let result = subsystem.send_packets(pass, sink);
            record(subsystem.channel(), result, colony, report);
        }

        debug!("Colony {} pass sent {} message(s)", colony.id(), report.total_sent());
    }
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new(InterestRadii::default(), TICKS_PER_HOUR)
    }
}

fn send_colony_view(
    colony: &Colony,
    dirty: bool,
    pass: &SyncPass<'_>,
    sink: &mut dyn MessageSink,
) -> Result<usize, SendError> {
    let recipients = pass.recipients(dirty);
    for client in &recipients {
        let message = ColonyViewMessage::from_colony(colony, pass.is_new(client));
        sink.send_to(*client, ServerMessage::ColonyView(message))?;
    }
    Ok(recipients.len())
}

fn record(channel: SyncChannel, result: Result<usize, SendError>, colony: &Colony, report: &mut PassReport) {
    match result {
        Ok(sent) => report.sent[channel.index()] += sent,
        Err(e) => {
            error!("Colony {}: {} dispatch failed: {}", colony.id(), channel.name(), e);
            report.failed.push(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::permissions::Rank;
    use crate::colony::work_order::{BuildOrder, WorkOrder, WorkOrderRegistry};
    use crate::net::sink::RecordingSink;
    use crate::net::ClientId;
    use crate::sync::dirty::SyncSubsystem;
    use crate::sync::world::ConnectedClient;
    use crate::util::vec3::{BlockPos, Vec3};
    use std::sync::Arc;
    use uuid::Uuid;

    const CENTER: BlockPos = BlockPos { x: 0, y: 64, z: 0 };

    fn colony() -> Colony {
        let registry = Arc::new(WorkOrderRegistry::with_builtin_kinds().unwrap());
        Colony::new(1, "Testville", 0, CENTER, registry)
    }

    fn coordinator(ticks_per_hour: u32) -> SyncCoordinator {
        SyncCoordinator::new(InterestRadii { join: 100.0, retain: 200.0 }, ticks_per_hour)
    }

    fn client_at(id: ClientId, x: f64) -> ConnectedClient {
        ConnectedClient::new(id, "c", 0, Vec3::new(x, 64.0, 0.0))
    }

    fn world(clients: Vec<ConnectedClient>) -> WorldSnapshot {
        WorldSnapshot::new(clients, [0])
    }

    fn completed(outcome: PassOutcome) -> PassReport {
        match outcome {
            PassOutcome::Completed(report) => report,
            PassOutcome::Skipped => panic!("pass unexpectedly skipped"),
        }
    }

    /// Sink that fails every message on one channel
    struct FailingSink {
        fail_on: SyncChannel,
        inner: RecordingSink,
    }

    impl MessageSink for FailingSink {
        fn send_to(&mut self, client: ClientId, message: ServerMessage) -> Result<(), SendError> {
            if message.channel() == self.fail_on {
                return Err(SendError::ChannelClosed);
            }
            self.inner.send_to(client, message)
        }
    }

    #[test]
    fn test_skipped_without_world() {
        let mut colony = colony();
        let mut coordinator = coordinator(10);
        let mut sink = RecordingSink::new();
        assert_eq!(coordinator.update_subscribers(&mut colony, None, &mut sink), PassOutcome::Skipped);

        let unloaded = WorldSnapshot::new(vec![client_at(Uuid::new_v4(), 1.0)], [-1]);
        assert_eq!(
            coordinator.update_subscribers(&mut colony, Some(&unloaded), &mut sink),
            PassOutcome::Skipped
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_new_subscriber_gets_snapshot_then_silence() {
        let mut colony = colony();
        colony.schematics_mut().mark_dirty();
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();
        let visitor = Uuid::new_v4();
        let w = world(vec![client_at(visitor, 10.0)]);

        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert!(report.has_new_subscribers);
        assert_eq!(report.sent_on(SyncChannel::ColonyView), 1);
        assert_eq!(report.sent_on(SyncChannel::Permissions), 1);
        assert_eq!(report.sent_on(SyncChannel::Schematics), 1);
        match sink.messages_for(visitor)[0] {
            ServerMessage::ColonyView(view) => assert!(view.is_new_subscriber),
            other => panic!("unexpected first message {:?}", other),
        }

        sink.clear();
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert!(!report.has_new_subscribers);
        assert_eq!(report.total_sent(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_hysteresis_across_passes() {
        let mut colony = colony();
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();
        let a = Uuid::new_v4();
        let c = Uuid::new_v4();

        coordinator.update_subscribers(&mut colony, Some(&world(vec![client_at(a, 50.0)])), &mut sink);
        assert!(coordinator.subscribers().contains(&a));

        let w = world(vec![client_at(a, 150.0), client_at(c, 150.0)]);
        coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);
        assert!(coordinator.subscribers().contains(&a));
        assert!(!coordinator.subscribers().contains(&c));

        let w = world(vec![client_at(a, 250.0)]);
        coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);
        assert!(coordinator.subscribers().is_empty());
    }

    #[test]
    fn test_members_subscribe_from_anywhere() {
        let mut colony = colony();
        let friend = Uuid::new_v4();
        let foe = Uuid::new_v4();
        colony.permissions_mut().set_rank(friend, "friend", Rank::Friend);
        colony.permissions_mut().set_rank(foe, "foe", Rank::Hostile);
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();

        let w = world(vec![client_at(friend, 50_000.0), client_at(foe, 50_000.0)]);
        coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);
        assert!(coordinator.subscribers().contains(&friend));
        assert!(!coordinator.subscribers().contains(&foe));

        match sink.messages_for(friend)[1] {
            ServerMessage::PermissionsView(view) => assert_eq!(view.rank, Rank::Friend),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_work_order_change_reaches_every_subscriber() {
        let mut colony = colony();
        for x in 0..3 {
            colony
                .work_manager_mut()
                .add_work_order(WorkOrder::new(BuildOrder::new(BlockPos::new(x, 64, 0), "hut", 1)));
        }
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();
        let a = Uuid::new_v4();
        let w = world(vec![client_at(a, 10.0)]);
        coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);

        let b = Uuid::new_v4();
        colony.work_manager_mut().claim(1, 5);
        sink.clear();
        let w = world(vec![client_at(a, 10.0), client_at(b, 20.0)]);
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));

        assert_eq!(report.sent_on(SyncChannel::WorkOrders), 6);
        for client in [a, b] {
            let views = sink
                .messages_for(client)
                .into_iter()
                .filter(|m| matches!(m, ServerMessage::WorkOrderView(_)))
                .count();
            assert_eq!(views, 3);
        }
        assert!(!colony.work_manager().is_dirty());
    }

    #[test]
    fn test_inactivity_hour_on_threshold_pass() {
        let mut colony = colony();
        let mut coordinator = coordinator(5);
        let mut sink = RecordingSink::new();
        // A visitor is not a member, so the colony still counts as unattended
        let w = world(vec![client_at(Uuid::new_v4(), 10.0)]);

        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert_eq!(report.sent_on(SyncChannel::ColonyView), 1);
        for _ in 0..3 {
            let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
            assert_eq!(colony.last_contact_hours(), 0);
            assert_eq!(report.sent_on(SyncChannel::ColonyView), 0);
        }
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert_eq!(colony.last_contact_hours(), 1);
        assert_eq!(report.sent_on(SyncChannel::ColonyView), 1);
        assert!(!colony.is_summary_dirty());

        for _ in 0..5 {
            coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);
        }
        assert_eq!(colony.last_contact_hours(), 2);
    }

    #[test]
    fn test_contact_resumption_broadcasts_summary() {
        let mut colony = colony();
        let owner = Uuid::new_v4();
        let visitor = Uuid::new_v4();
        colony.permissions_mut().set_rank(owner, "owner", Rank::Owner);
        let mut coordinator = coordinator(2);
        let mut sink = RecordingSink::new();

        let nearby_only = world(vec![client_at(visitor, 10.0)]);
        coordinator.update_subscribers(&mut colony, Some(&nearby_only), &mut sink);
        coordinator.update_subscribers(&mut colony, Some(&nearby_only), &mut sink);
        assert_eq!(colony.last_contact_hours(), 1);

        sink.clear();
        let with_owner = world(vec![client_at(visitor, 10.0), client_at(owner, 9_000.0)]);
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&with_owner), &mut sink));

        assert_eq!(colony.last_contact_hours(), 0);
        assert!(!colony.is_summary_dirty());
        // Dirty summary goes to the continuing visitor as well as the owner
        assert_eq!(report.sent_on(SyncChannel::ColonyView), 2);
        match sink.messages_for(visitor)[0] {
            ServerMessage::ColonyView(view) => {
                assert!(!view.is_new_subscriber);
                assert_eq!(view.last_contact_hours, 0);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_rename_reaches_continuing_subscriber_once() {
        let mut colony = colony();
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();
        let a = Uuid::new_v4();
        let w = world(vec![client_at(a, 10.0)]);
        coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);

        colony.set_name("New Haven");
        colony.citizens_mut().spawn_citizen("bob");
        sink.clear();
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));

        assert_eq!(report.sent_on(SyncChannel::ColonyView), 1);
        assert_eq!(report.sent_on(SyncChannel::Citizens), 1);
        match sink.messages_for(a)[0] {
            ServerMessage::ColonyView(view) => {
                assert!(!view.is_new_subscriber);
                assert_eq!(view.name, "New Haven");
                assert_eq!(view.citizen_count, 1);
            }
            other => panic!("unexpected message {:?}", other),
        }

        sink.clear();
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert_eq!(report.total_sent(), 0);
    }

    #[test]
    fn test_summary_change_survives_skipped_pass() {
        let mut colony = colony();
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();
        let a = Uuid::new_v4();
        let w = world(vec![client_at(a, 10.0)]);
        coordinator.update_subscribers(&mut colony, Some(&w), &mut sink);

        colony.set_name("Renamed");
        assert_eq!(coordinator.update_subscribers(&mut colony, None, &mut sink), PassOutcome::Skipped);
        sink.clear();
        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert_eq!(report.sent_on(SyncChannel::ColonyView), 1);
    }

    #[test]
    fn test_failed_channel_does_not_stop_others() {
        let mut colony = colony();
        colony.citizens_mut().spawn_citizen("ada");
        colony.schematics_mut().mark_dirty();
        let mut coordinator = coordinator(1000);
        let mut sink = FailingSink {
            fail_on: SyncChannel::Permissions,
            inner: RecordingSink::new(),
        };
        let w = world(vec![client_at(Uuid::new_v4(), 10.0)]);

        let report = completed(coordinator.update_subscribers(&mut colony, Some(&w), &mut sink));
        assert_eq!(report.failed.as_slice(), &[SyncChannel::Permissions]);
        assert_eq!(report.sent_on(SyncChannel::Citizens), 1);
        assert_eq!(report.sent_on(SyncChannel::Schematics), 1);
        assert!(colony.subsystems().iter().all(|s| !s.is_dirty()));
    }

    #[test]
    fn test_flags_cleared_without_subscribers() {
        let mut colony = colony();
        colony.citizens_mut().spawn_citizen("ada");
        let mut coordinator = coordinator(1000);
        let mut sink = RecordingSink::new();

        let report = completed(coordinator.update_subscribers(&mut colony, Some(&world(Vec::new())), &mut sink));
        assert_eq!(report.subscribers, 0);
        assert!(sink.is_empty());
        assert!(!colony.citizens().is_dirty());
    }
}
