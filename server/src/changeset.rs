//! Unit of work for one room.
//!
//! Service operations never touch the stores directly. They describe their
//! effect as a [`Changeset`] which is committed in a single call: users, then
//! NPC groups, then paths, then the broadcast. An operation that fails before
//! producing its changeset therefore leaves nothing behind.

use crate::broadcast::Broadcaster;
use crate::world::RoomState;
use arena_shared::{NpcGroup, NpcGroupId, Packet, PathData, UserId, UserInfo};

#[derive(Debug, Default, Clone)]
pub struct Changeset {
    users: Vec<UserInfo>,
    removed_users: Vec<UserId>,
    groups: Vec<NpcGroup>,
    paths: Vec<PathData>,
    cleared_paths: Vec<NpcGroupId>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_user(&mut self, user: UserInfo) {
        self.removed_users.retain(|id| *id != user.id);
        match self.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => self.users.push(user),
        }
    }

    pub fn remove_user(&mut self, user_id: UserId) {
        self.users.retain(|u| u.id != user_id);
        if !self.removed_users.contains(&user_id) {
            self.removed_users.push(user_id);
        }
    }

    /// Writes a group. Later writes to the same id replace earlier ones.
    pub fn upsert_group(&mut self, group: NpcGroup) {
        match self.groups.iter_mut().find(|g| g.id == group.id) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
    }

    /// Marks `group` deleted and drops its path.
    pub fn delete_group(&mut self, group: &NpcGroup) {
        self.upsert_group(group.deleted());
        self.clear_path(group.id);
    }

    pub fn set_path(&mut self, path: PathData) {
        self.cleared_paths.retain(|id| *id != path.npc_group_id);
        match self
            .paths
            .iter_mut()
            .find(|p| p.npc_group_id == path.npc_group_id)
        {
            Some(existing) => *existing = path,
            None => self.paths.push(path),
        }
    }

    pub fn clear_path(&mut self, npc_group_id: NpcGroupId) {
        self.paths.retain(|p| p.npc_group_id != npc_group_id);
        if !self.cleared_paths.contains(&npc_group_id) {
            self.cleared_paths.push(npc_group_id);
        }
    }

    /// Pending version of a group, if this changeset writes it.
    pub fn group(&self, id: NpcGroupId) -> Option<&NpcGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn groups(&self) -> &[NpcGroup] {
        &self.groups
    }

    pub fn paths(&self) -> &[PathData] {
        &self.paths
    }

    pub fn cleared_paths(&self) -> &[NpcGroupId] {
        &self.cleared_paths
    }

    pub fn users(&self) -> &[UserInfo] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.removed_users.is_empty()
            && self.groups.is_empty()
            && self.paths.is_empty()
            && self.cleared_paths.is_empty()
    }

    /// Folds `other` in as if its writes happened after ours.
    pub fn extend(&mut self, other: Changeset) {
        for user in other.users {
            self.upsert_user(user);
        }
        for user_id in other.removed_users {
            self.remove_user(user_id);
        }
        for group in other.groups {
            self.upsert_group(group);
        }
        for npc_group_id in other.cleared_paths {
            self.clear_path(npc_group_id);
        }
        for path in other.paths {
            self.set_path(path);
        }
    }

    pub fn commit(self, room: &mut RoomState, broadcaster: &dyn Broadcaster) {
        for user in &self.users {
            room.users.add(user.clone());
        }
        for user_id in &self.removed_users {
            room.users.remove(*user_id);
        }

        for group in &self.groups {
            if group.is_deleted() {
                room.paths.delete(group.id);
            }
            room.npc_groups.set(group.clone());
        }

        for npc_group_id in &self.cleared_paths {
            room.paths.delete(*npc_group_id);
        }
        let paths: Vec<PathData> = self
            .paths
            .into_iter()
            .filter(|path| {
                room.npc_groups
                    .get_by_npc_group_id(path.npc_group_id)
                    .is_some()
            })
            .collect();
        for path in &paths {
            room.paths.set(path.clone());
        }

        if !self.users.is_empty() {
            broadcaster.emit_to_room(&room.name, &Packet::UsersUpdated { users: self.users });
        }
        for user_id in self.removed_users {
            broadcaster.emit_to_room(&room.name, &Packet::UserLeft { user_id });
        }
        if !self.groups.is_empty() {
            broadcaster.emit_to_room(
                &room.name,
                &Packet::NpcGroupsUpdated {
                    groups: self.groups,
                },
            );
        }
        if !paths.is_empty() {
            broadcaster.emit_to_room(&room.name, &Packet::PathsUpdated { paths });
        }
    }
}
