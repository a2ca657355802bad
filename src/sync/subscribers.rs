//! Subscriber interest management
//!
//! Subscribers = colony members with a subscribing rank + clients near the
//! colony centre. Nearness uses two radii: clients join inside the join
//! radius and, once subscribed, stay until they leave the larger retain
//! radius. The set is recomputed from scratch every pass; the previous set is
//! only consulted for the retain test and to tell new subscribers apart.

use rustc_hash::FxHashSet;

use crate::colony::constants::subscription;
use crate::net::ClientId;
use crate::sync::world::{ConnectedClient, WorldSnapshot};
use crate::util::vec3::BlockPos;

/// Current subscribers of one colony
pub type SubscriberSet = FxHashSet<ClientId>;

/// True iff some member of `current` was not in `old`
pub fn has_new_subscribers(old: &SubscriberSet, current: &SubscriberSet) -> bool {
    current.iter().any(|client| !old.contains(client))
}

/// Join/retain radii in blocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestRadii {
    pub join: f64,
    pub retain: f64,
}

impl InterestRadii {
    pub fn from_working_range(working_range: u32) -> Self {
        Self {
            join: subscription::join_radius(working_range),
            retain: subscription::retain_radius(working_range),
        }
    }
}

impl Default for InterestRadii {
    fn default() -> Self {
        Self::from_working_range(subscription::DEFAULT_WORKING_RANGE)
    }
}

/// Proximity test around one colony
#[derive(Debug, Clone, Copy)]
pub struct InterestArea {
    dimension: i32,
    center: BlockPos,
    // Pre-computed squares keep sqrt out of the per-client test
    join_radius_sq: f64,
    retain_radius_sq: f64,
}

impl InterestArea {
    pub fn new(dimension: i32, center: BlockPos, radii: InterestRadii) -> Self {
        Self {
            dimension,
            center,
            join_radius_sq: radii.join * radii.join,
            retain_radius_sq: radii.retain * radii.retain,
        }
    }

    /// Whether `client` is close enough to be subscribed this pass
    #[inline]
    pub fn admits(&self, client: &ConnectedClient, was_subscribed: bool) -> bool {
        if client.dimension != self.dimension {
            return false;
        }
        let distance_sq = self.center.distance_sq_to(client.position);
        distance_sq < self.join_radius_sq || (was_subscribed && distance_sq < self.retain_radius_sq)
    }
}

/// Connected clients the membership predicate accepts, wherever they are
pub fn collect_members<F>(world: &WorldSnapshot, is_member: F) -> SubscriberSet
where
    F: Fn(&ClientId) -> bool,
{
    world
        .clients
        .iter()
        .map(|client| client.id)
        .filter(|id| is_member(id))
        .collect()
}

/// Add clients inside the interest area; returns how many were added
pub fn add_nearby(
    world: &WorldSnapshot,
    area: &InterestArea,
    old: &SubscriberSet,
    subscribers: &mut SubscriberSet,
) -> usize {
    let mut added = 0;
    for client in world.clients_in(area.dimension) {
        if subscribers.contains(&client.id) {
            continue;
        }
        if area.admits(client, old.contains(&client.id)) && subscribers.insert(client.id) {
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec3::Vec3;
    use uuid::Uuid;

    const CENTER: BlockPos = BlockPos { x: 0, y: 64, z: 0 };

    fn radii() -> InterestRadii {
        InterestRadii { join: 100.0, retain: 200.0 }
    }

    fn client_at(x: f64) -> ConnectedClient {
        ConnectedClient::new(Uuid::new_v4(), "c", 0, Vec3::new(x, 64.0, 0.0))
    }

    #[test]
    fn test_default_radii() {
        let r = InterestRadii::default();
        assert_eq!(r.join, 216.0);
        assert_eq!(r.retain, 400.0);
    }

    #[test]
    fn test_has_new_subscribers() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let old: SubscriberSet = [a, b].into_iter().collect();
        let same: SubscriberSet = [a].into_iter().collect();
        let grown: SubscriberSet = [a, Uuid::new_v4()].into_iter().collect();

        assert!(!has_new_subscribers(&old, &same));
        assert!(!has_new_subscribers(&old, &SubscriberSet::default()));
        assert!(has_new_subscribers(&old, &grown));
        assert!(has_new_subscribers(&SubscriberSet::default(), &same));
    }

    #[test]
    fn test_join_radius_is_exclusive() {
        let area = InterestArea::new(0, CENTER, radii());
        assert!(area.admits(&client_at(99.9), false));
        assert!(!area.admits(&client_at(100.0), false));
    }

    #[test]
    fn test_hysteresis_keeps_previous_subscriber() {
        let area = InterestArea::new(0, CENTER, radii());
        let a = client_at(150.0);
        let c = client_at(150.0);
        let b = client_at(10.0);
        let world = WorldSnapshot::new(vec![a.clone(), b.clone(), c.clone()], [0]);

        let old: SubscriberSet = [a.id, b.id].into_iter().collect();
        let mut current = SubscriberSet::default();
        let added = add_nearby(&world, &area, &old, &mut current);

        assert_eq!(added, 2);
        assert!(current.contains(&a.id));
        assert!(current.contains(&b.id));
        assert!(!current.contains(&c.id));
    }

    #[test]
    fn test_previous_subscriber_dropped_outside_retain() {
        let area = InterestArea::new(0, CENTER, radii());
        let a = client_at(250.0);
        let world = WorldSnapshot::new(vec![a.clone()], [0]);
        let old: SubscriberSet = [a.id].into_iter().collect();
        let mut current = SubscriberSet::default();

        add_nearby(&world, &area, &old, &mut current);
        assert!(current.is_empty());
    }

    #[test]
    fn test_other_dimension_ignored() {
        let area = InterestArea::new(0, CENTER, radii());
        let mut nether = client_at(1.0);
        nether.dimension = -1;
        assert!(!area.admits(&nether, true));
    }

    #[test]
    fn test_members_collected_regardless_of_distance() {
        let far = client_at(100_000.0);
        let near = client_at(1.0);
        let world = WorldSnapshot::new(vec![far.clone(), near.clone()], [0]);
        let members = collect_members(&world, |id| *id == far.id);
        assert_eq!(members.len(), 1);
        assert!(members.contains(&far.id));
    }

    #[test]
    fn test_add_nearby_skips_existing_members() {
        let area = InterestArea::new(0, CENTER, radii());
        let member = client_at(1.0);
        let world = WorldSnapshot::new(vec![member.clone()], [0]);
        let mut current: SubscriberSet = [member.id].into_iter().collect();
        let added = add_nearby(&world, &area, &SubscriberSet::default(), &mut current);
        assert_eq!(added, 0);
        assert_eq!(current.len(), 1);
    }
}
