//! Colony membership and ranks

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::net::protocol::{PermissionsViewMessage, ServerMessage};
use crate::net::sink::{MessageSink, SendError};
use crate::net::ClientId;
use crate::persist::TagCompound;
use crate::sync::dirty::{SyncChannel, SyncPass, SyncSubsystem};

const TAG_MEMBERS: &str = "members";
const TAG_UUID: &str = "uuid";
const TAG_NAME: &str = "name";
const TAG_RANK: &str = "rank";

/// Member rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Owner,
    Officer,
    Friend,
    Neutral,
    Hostile,
}

impl Rank {
    /// Ranks that follow the colony's update stream from anywhere
    pub fn is_subscriber(self) -> bool {
        matches!(self, Rank::Owner | Rank::Officer | Rank::Friend)
    }

    pub fn ordinal(self) -> i32 {
        match self {
            Rank::Owner => 0,
            Rank::Officer => 1,
            Rank::Friend => 2,
            Rank::Neutral => 3,
            Rank::Hostile => 4,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(Rank::Owner),
            1 => Some(Rank::Officer),
            2 => Some(Rank::Friend),
            3 => Some(Rank::Neutral),
            4 => Some(Rank::Hostile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub rank: Rank,
}

/// Ranks of known clients; strangers are `Neutral`
#[derive(Debug, Default)]
pub struct Permissions {
    members: HashMap<ClientId, Member>,
    dirty: bool,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a member; returns true when something changed
    pub fn set_rank(&mut self, id: ClientId, name: impl Into<String>, rank: Rank) -> bool {
        let name = name.into();
        if let Some(member) = self.members.get(&id) {
            if member.rank == rank && member.name == name {
                return false;
            }
        }
        // A colony has a single owner
        if rank == Rank::Owner {
            for member in self.members.values_mut() {
                if member.rank == Rank::Owner {
                    member.rank = Rank::Officer;
                }
            }
        }
        self.members.insert(id, Member { name, rank });
        self.dirty = true;
        true
    }

    pub fn remove_member(&mut self, id: &ClientId) -> Option<Member> {
        let removed = self.members.remove(id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn rank_of(&self, id: &ClientId) -> Rank {
        self.members
            .get(id)
            .map(|member| member.rank)
            .unwrap_or(Rank::Neutral)
    }

    /// Membership predicate used when collecting subscribers
    pub fn is_subscriber(&self, id: &ClientId) -> bool {
        self.rank_of(id).is_subscriber()
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.members
            .iter()
            .find(|(_, member)| member.rank == Rank::Owner)
            .map(|(id, _)| *id)
    }

    pub fn members(&self) -> impl Iterator<Item = (&ClientId, &Member)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn write_to_tag(&self, tag: &mut TagCompound) {
        let mut members: Vec<(&ClientId, &Member)> = self.members.iter().collect();
        members.sort_by_key(|(id, _)| **id);
        let list = members
            .into_iter()
            .map(|(id, member)| {
                let mut entry = TagCompound::new();
                entry.set_string(TAG_UUID, id.to_string());
                entry.set_string(TAG_NAME, member.name.as_str());
                entry.set_int(TAG_RANK, member.rank.ordinal());
                entry
            })
            .collect();
        tag.set_list(TAG_MEMBERS, list);
    }

    /// Restore members, skipping entries with a bad id or rank
    pub fn read_from_tag(tag: &TagCompound) -> Self {
        let mut permissions = Self::new();
        for entry in tag.get_list(TAG_MEMBERS) {
            let id = match Uuid::parse_str(entry.get_string(TAG_UUID)) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping colony member with invalid id: {}", e);
                    continue;
                }
            };
            let Some(rank) = Rank::from_ordinal(entry.get_int(TAG_RANK)) else {
                warn!("Skipping colony member {} with unknown rank", id);
                continue;
            };
            permissions.members.insert(
                id,
                Member {
                    name: entry.get_string(TAG_NAME).to_string(),
                    rank,
                },
            );
        }
        permissions
    }
}

impl SyncSubsystem for Permissions {
    fn channel(&self) -> SyncChannel {
        SyncChannel::Permissions
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Each recipient is told its own rank
    fn send_packets(&self, pass: &SyncPass<'_>, sink: &mut dyn MessageSink) -> Result<usize, SendError> {
        let recipients = pass.recipients(self.dirty);
        for client in &recipients {
            let message = PermissionsViewMessage {
                colony_id: pass.colony_id,
                rank: self.rank_of(client),
            };
            sink.send_to(*client, ServerMessage::PermissionsView(message))?;
        }
        Ok(recipients.len())
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
