//! Per-room collection of NPC groups, indexed by group id and by captor.
//!
//! The id map is authoritative. The captor index only points at groups a
//! player is *holding* (captor set, not in flight) and is updated by the same
//! call that writes the id map, so the two can never disagree.

use crate::{NpcGroup, NpcGroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<NpcGroup>", into = "Vec<NpcGroup>")]
pub struct NpcGroupsBiMap {
    groups: BTreeMap<NpcGroupId, NpcGroup>,
    held_by: HashMap<UserId, NpcGroupId>,
}

impl NpcGroupsBiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a group. A group with no figures is deleted instead.
    pub fn set(&mut self, group: NpcGroup) {
        if group.is_deleted() {
            self.delete(group.id);
            return;
        }

        self.unindex(group.id);
        if group.is_held() {
            if let Some(captor_id) = group.captor_id {
                self.held_by.insert(captor_id, group.id);
            }
        }
        self.groups.insert(group.id, group);
    }

    pub fn delete(&mut self, id: NpcGroupId) -> Option<NpcGroup> {
        self.unindex(id);
        self.groups.remove(&id)
    }

    pub fn delete_by_user_id(&mut self, user_id: UserId) -> Option<NpcGroup> {
        let id = *self.held_by.get(&user_id)?;
        self.delete(id)
    }

    pub fn get_by_npc_group_id(&self, id: NpcGroupId) -> Option<&NpcGroup> {
        self.groups.get(&id)
    }

    /// The group `user_id` is currently holding.
    pub fn get_by_user_id(&self, user_id: UserId) -> Option<&NpcGroup> {
        self.held_by
            .get(&user_id)
            .and_then(|id| self.groups.get(id))
    }

    /// Groups in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &NpcGroup> {
        self.groups.values()
    }

    pub fn ids(&self) -> Vec<NpcGroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Figures currently owned by players, held or in flight.
    pub fn captured_figure_count(&self) -> usize {
        self.groups
            .values()
            .filter(|group| group.captor_id.is_some())
            .map(NpcGroup::size)
            .sum()
    }

    fn unindex(&mut self, id: NpcGroupId) {
        if let Some(captor_id) = self.groups.get(&id).and_then(|g| g.captor_id) {
            if self.held_by.get(&captor_id) == Some(&id) {
                self.held_by.remove(&captor_id);
            }
        }
    }
}

impl From<Vec<NpcGroup>> for NpcGroupsBiMap {
    fn from(groups: Vec<NpcGroup>) -> Self {
        let mut map = NpcGroupsBiMap::new();
        for group in groups {
            map.set(group);
        }
        map
    }
}

impl From<NpcGroupsBiMap> for Vec<NpcGroup> {
    fn from(map: NpcGroupsBiMap) -> Self {
        map.groups.into_values().collect()
    }
}
