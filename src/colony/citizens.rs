//! Citizen roster
//!
//! New subscribers receive every citizen; continuing subscribers only the
//! citizens that changed and the ids of citizens that left.

use std::collections::BTreeMap;

use tracing::warn;

use crate::colony::{CitizenId, ColonyId};
use crate::net::protocol::{CitizenViewMessage, ServerMessage};
use crate::net::sink::{MessageSink, SendError};
use crate::persist::{TagCompound, TagError};
use crate::sync::dirty::{SyncChannel, SyncPass, SyncSubsystem};

const TAG_CITIZENS: &str = "citizens";
const TAG_TOP_ID: &str = "topCitizenId";
const TAG_ID: &str = "id";
const TAG_NAME: &str = "name";
const TAG_JOB: &str = "job";

#[derive(Debug, Clone, PartialEq)]
pub struct CitizenData {
    id: CitizenId,
    name: String,
    job: Option<String>,
    dirty: bool,
}

impl CitizenData {
    pub fn id(&self) -> CitizenId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn job(&self) -> Option<&str> {
        self.job.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn read_from_tag(tag: &TagCompound) -> Result<Self, TagError> {
        let job = Some(tag.get_string(TAG_JOB))
            .filter(|job| !job.is_empty())
            .map(str::to_string);
        Ok(Self {
            id: tag.try_get_int(TAG_ID)?,
            name: tag.try_get_string(TAG_NAME)?.to_string(),
            job,
            dirty: false,
        })
    }
}

#[derive(Debug, Default)]
pub struct CitizenManager {
    citizens: BTreeMap<CitizenId, CitizenData>,
    removed: Vec<CitizenId>,
    top_id: CitizenId,
    dirty: bool,
    roster_changed: bool,
}

impl CitizenManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a citizen; ids start at 1 so they never collide with "unclaimed"
    pub fn spawn_citizen(&mut self, name: impl Into<String>) -> CitizenId {
        self.top_id += 1;
        let id = self.top_id;
        self.citizens.insert(
            id,
            CitizenData {
                id,
                name: name.into(),
                job: None,
                dirty: true,
            },
        );
        self.dirty = true;
        self.roster_changed = true;
        id
    }

    pub fn remove_citizen(&mut self, id: CitizenId) -> Option<CitizenData> {
        let removed = self.citizens.remove(&id)?;
        self.removed.push(id);
        self.dirty = true;
        self.roster_changed = true;
        Some(removed)
    }

    /// Assign or clear a job; returns false for an unknown citizen
    pub fn set_job(&mut self, id: CitizenId, job: Option<String>) -> bool {
        match self.citizens.get_mut(&id) {
            Some(citizen) => {
                citizen.job = job;
                citizen.dirty = true;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// A citizen joined or left since the last pass
    pub fn roster_changed(&self) -> bool {
        self.roster_changed
    }

    pub fn get(&self, id: CitizenId) -> Option<&CitizenData> {
        self.citizens.get(&id)
    }

    pub fn citizens(&self) -> impl Iterator<Item = &CitizenData> {
        self.citizens.values()
    }

    pub fn len(&self) -> usize {
        self.citizens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citizens.is_empty()
    }

    fn view_of(colony_id: ColonyId, citizen: &CitizenData) -> ServerMessage {
        ServerMessage::CitizenView(CitizenViewMessage {
            colony_id,
            citizen_id: citizen.id,
            name: citizen.name.clone(),
            job: citizen.job.clone(),
        })
    }

    pub fn write_to_tag(&self, tag: &mut TagCompound) {
        let list = self
            .citizens
            .values()
            .map(|citizen| {
                let mut entry = TagCompound::new();
                entry.set_int(TAG_ID, citizen.id);
                entry.set_string(TAG_NAME, citizen.name.as_str());
                if let Some(job) = &citizen.job {
                    entry.set_string(TAG_JOB, job.as_str());
                }
                entry
            })
            .collect();
        tag.set_list(TAG_CITIZENS, list);
        tag.set_int(TAG_TOP_ID, self.top_id);
    }

    /// Restore the roster. Records without a usable id or name are skipped.
    pub fn read_from_tag(tag: &TagCompound) -> Self {
        let mut manager = Self::new();
        for entry in tag.get_list(TAG_CITIZENS) {
            let citizen = match CitizenData::read_from_tag(entry) {
                Ok(citizen) => citizen,
                Err(e) => {
                    warn!("Skipping malformed citizen record: {}", e);
                    continue;
                }
            };
            // 0 marks an unclaimed work order
            if citizen.id <= 0 {
                warn!("Skipping citizen record with invalid id {}", citizen.id);
                continue;
            }
            if manager.citizens.contains_key(&citizen.id) {
                warn!("Skipping duplicate citizen record {}", citizen.id);
                continue;
            }
            manager.top_id = manager.top_id.max(citizen.id);
            manager.citizens.insert(citizen.id, citizen);
        }
        manager.top_id = manager.top_id.max(tag.get_int(TAG_TOP_ID));
        manager
    }
}

impl SyncSubsystem for CitizenManager {
    fn channel(&self) -> SyncChannel {
        SyncChannel::Citizens
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn send_packets(&self, pass: &SyncPass<'_>, sink: &mut dyn MessageSink) -> Result<usize, SendError> {
        let mut sent = 0;
        for client in pass.recipients(self.dirty) {
            let is_new = pass.is_new(&client);
            for citizen in self.citizens.values() {
                if is_new || citizen.dirty {
                    sink.send_to(client, Self::view_of(pass.colony_id, citizen))?;
                    sent += 1;
                }
            }
            if !is_new {
                for id in &self.removed {
                    sink.send_to(
                        client,
                        ServerMessage::CitizenRemoved {
                            colony_id: pass.colony_id,
                            citizen_id: *id,
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
        self.roster_changed = false;
        self.removed.clear();
        for citizen in self.citizens.values_mut() {
            citizen.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::sink::RecordingSink;
    use crate::sync::subscribers::SubscriberSet;
    use uuid::Uuid;

    #[test]
    fn test_spawn_assigns_increasing_ids() {
        let mut manager = CitizenManager::new();
        assert_eq!(manager.spawn_citizen("ada"), 1);
        assert_eq!(manager.spawn_citizen("bob"), 2);
        assert!(manager.is_dirty());
    }

    #[test]
    fn test_new_subscriber_gets_everyone_continuing_gets_changes() {
        let mut manager = CitizenManager::new();
        let ada = manager.spawn_citizen("ada");
        manager.spawn_citizen("bob");
        manager.clear_dirty();
        manager.set_job(ada, Some("builder".to_string()));

        let old_client = Uuid::new_v4();
        let new_client = Uuid::new_v4();
        let old: SubscriberSet = [old_client].into_iter().collect();
        let current: SubscriberSet = [old_client, new_client].into_iter().collect();
        let pass = SyncPass {
            colony_id: 1,
            old_subscribers: &old,
            subscribers: &current,
            has_new_subscribers: true,
        };

        let mut sink = RecordingSink::new();
        let sent = manager.send_packets(&pass, &mut sink).unwrap();
        assert_eq!(sent, 3);
        assert_eq!(sink.messages_for(old_client).len(), 1);
        assert_eq!(sink.messages_for(new_client).len(), 2);
    }

    #[test]
    fn test_removal_sent_to_continuing_subscribers() {
        let mut manager = CitizenManager::new();
        let ada = manager.spawn_citizen("ada");
        manager.clear_dirty();
        manager.remove_citizen(ada);

        let client = Uuid::new_v4();
        let subs: SubscriberSet = [client].into_iter().collect();
        let pass = SyncPass {
            colony_id: 1,
            old_subscribers: &subs,
            subscribers: &subs,
            has_new_subscribers: false,
        };
        let mut sink = RecordingSink::new();
        manager.send_packets(&pass, &mut sink).unwrap();
        assert_eq!(
            sink.messages_for(client),
            vec![&ServerMessage::CitizenRemoved { colony_id: 1, citizen_id: ada }]
        );

        manager.clear_dirty();
        sink.clear();
        manager.send_packets(&pass, &mut sink).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_persistence() {
        let mut manager = CitizenManager::new();
        let ada = manager.spawn_citizen("ada");
        manager.spawn_citizen("bob");
        manager.set_job(ada, Some("farmer".to_string()));
        manager.remove_citizen(2);

        let mut tag = TagCompound::new();
        manager.write_to_tag(&mut tag);
        let mut restored = CitizenManager::read_from_tag(&tag);

        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get(ada).unwrap().job(), Some("farmer"));
        assert!(!restored.is_dirty());
        assert_eq!(restored.spawn_citizen("cy"), 3);
    }

    #[test]
    fn test_bad_citizen_records_skipped() {
        let record = |id: Option<i32>, name: &str| {
            let mut entry = TagCompound::new();
            if let Some(id) = id {
                entry.set_int(TAG_ID, id);
            }
            entry.set_string(TAG_NAME, name);
            entry
        };
        let mut wrong_type = TagCompound::new();
        wrong_type.set_string(TAG_ID, "seven");
        wrong_type.set_string(TAG_NAME, "ghost");

        let mut tag = TagCompound::new();
        tag.set_list(
            TAG_CITIZENS,
            vec![
                record(Some(4), "ada"),
                record(None, "x"),
                wrong_type,
                record(Some(0), "zero"),
                record(Some(-2), "negative"),
                record(Some(4), "impostor"),
            ],
        );

        let restored = CitizenManager::read_from_tag(&tag);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get(4).unwrap().name(), "ada");
        assert!(restored.get(0).is_none());
        assert!(restored.citizens().all(|c| c.id() > 0));
    }
}
