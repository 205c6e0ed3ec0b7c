//! Every room's simulation state, plus the entry points request handlers use.
//!
//! A [`RoomState`] owns all per-room stores. Nothing in one room refers to
//! another, so the [`World`] is just a directory and a map of rooms.

use crate::bots::BotRoster;
use crate::broadcast::Broadcaster;
use crate::changeset::Changeset;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::npc_service;
use crate::paths::PathStore;
use crate::room_directory::RoomDirectory;
use crate::terrain::get_terrain_config;
use crate::users::UserRegistry;
use arena_shared::{
    Animal, NpcGroup, NpcGroupId, NpcGroupsBiMap, Packet, PathData, PathId, PathPhase,
    TerrainConfig, UserId, UserInfo, Vector2, NPC_HEIGHT, NPC_WIDTH,
};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

pub struct RoomState {
    pub name: String,
    pub terrain: TerrainConfig,
    pub users: UserRegistry,
    pub npc_groups: NpcGroupsBiMap,
    pub paths: PathStore,
    pub bots: BotRoster,
    pub rng: StdRng,
    next_npc_group_id: NpcGroupId,
    next_path_id: PathId,
}

impl RoomState {
    pub fn new(name: &str, now: u64) -> Self {
        let terrain = get_terrain_config(name);
        Self {
            name: name.to_string(),
            terrain,
            users: UserRegistry::new(),
            npc_groups: NpcGroupsBiMap::new(),
            paths: PathStore::new(),
            bots: BotRoster::new(now),
            rng: StdRng::seed_from_u64(terrain.seed),
            next_npc_group_id: 1,
            next_path_id: 1,
        }
    }

    pub fn allocate_npc_group_id(&mut self) -> NpcGroupId {
        let id = self.next_npc_group_id;
        self.next_npc_group_id += 1;
        id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_path(
        &mut self,
        npc_group_id: NpcGroupId,
        start_position: Vector2,
        direction: Vector2,
        velocity: f32,
        path_duration: u64,
        now: u64,
        path_phase: PathPhase,
    ) -> PathData {
        let id = self.next_path_id;
        self.next_path_id += 1;
        PathData {
            id,
            room: self.name.clone(),
            npc_group_id,
            start_position,
            direction: direction.normalize(),
            velocity,
            path_duration,
            timestamp: now,
            path_phase,
        }
    }

    /// Where a group is at `now`: on its path if it has one, else where it was left.
    pub fn current_position(&self, group: &NpcGroup, now: u64) -> Vector2 {
        self.paths
            .get(group.id)
            .map(|path| path.position_at(now))
            .unwrap_or(group.position)
    }

    /// Random point inside the boundaries, kept one NPC box away from the edge.
    pub fn random_position(&mut self) -> Vector2 {
        let b = self.terrain.boundaries;
        Vector2::new(
            self.rng
                .gen_range(b.min_x + NPC_WIDTH..=b.max_x - NPC_WIDTH),
            self.rng
                .gen_range(b.min_y + NPC_HEIGHT..=b.max_y - NPC_HEIGHT),
        )
    }

    pub fn snapshot(&self) -> Packet {
        Packet::RoomSnapshot {
            users: self.users.values().cloned().collect(),
            npc_groups: self.npc_groups.clone(),
            paths: self.paths.values().cloned().collect(),
        }
    }

    /// Commits the outcome of an operation, or logs and drops it.
    pub fn apply(
        &mut self,
        operation: &str,
        result: GameResult<Changeset>,
        broadcaster: &dyn Broadcaster,
    ) -> bool {
        match result {
            Ok(changes) => {
                if !changes.is_empty() {
                    changes.commit(self, broadcaster);
                }
                true
            }
            Err(e) => {
                warn!("{} in room {} dropped: {}", operation, self.name, e);
                false
            }
        }
    }
}

/// Hands out user ids shared by players and bots across all rooms.
#[derive(Debug)]
pub struct UserIdAllocator {
    next: UserId,
}

impl UserIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> UserId {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for UserIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

pub struct World {
    pub config: GameConfig,
    pub directory: RoomDirectory,
    pub(crate) rooms: HashMap<String, RoomState>,
    pub(crate) user_ids: UserIdAllocator,
}

impl World {
    pub fn new(config: GameConfig) -> Self {
        let directory = RoomDirectory::new(config.max_room_users, config.join_window_ms);
        Self {
            config,
            directory,
            rooms: HashMap::new(),
            user_ids: UserIdAllocator::new(),
        }
    }

    pub fn allocate_user_id(&mut self) -> UserId {
        self.user_ids.next_id()
    }

    pub fn room(&self, name: &str) -> Option<&RoomState> {
        self.rooms.get(name)
    }

    pub fn room_mut(&mut self, name: &str) -> Option<&mut RoomState> {
        self.rooms.get_mut(name)
    }

    /// Names of live rooms, oldest first.
    pub fn room_names(&self) -> Vec<String> {
        self.directory
            .all_rooms()
            .into_iter()
            .map(|room| room.name.clone())
            .collect()
    }

    /// Matchmakes `user_id` into a room and announces them.
    pub fn join(
        &mut self,
        user_id: UserId,
        room_hint: Option<&str>,
        animal: Animal,
        nickname: &str,
        broadcaster: &dyn Broadcaster,
        now: u64,
    ) -> GameResult<UserInfo> {
        let outcome = self
            .directory
            .join(room_hint, now)
            .ok_or_else(|| GameError::RoomFull(room_hint.unwrap_or_default().to_string()))?;

        let room = self
            .rooms
            .entry(outcome.room.clone())
            .or_insert_with(|| RoomState::new(&outcome.room, now));

        let position = room.random_position();
        let user = UserInfo::new(user_id, animal, &room.name, nickname, position);

        broadcaster.emit_to_user(
            &room.name,
            user_id,
            &Packet::Joined {
                user_id,
                room: room.name.clone(),
                terrain: room.terrain,
            },
        );

        let mut changes = Changeset::new();
        changes.upsert_user(user.clone());
        room.apply("join", Ok(changes), broadcaster);
        broadcaster.emit_to_user(&room.name, user_id, &room.snapshot());

        info!(
            "User {} ({}, {:?}) joined room {}",
            user_id, nickname, animal, room.name
        );
        Ok(user)
    }

    /// Removes a user. Returns true when that destroyed the room.
    pub fn leave(
        &mut self,
        room_name: &str,
        user_id: UserId,
        broadcaster: &dyn Broadcaster,
        now: u64,
    ) -> bool {
        if let Some(room) = self.rooms.get_mut(room_name) {
            let result = npc_service::release_user(room, user_id);
            room.apply("leave", result, broadcaster);
            info!("User {} left room {}", user_id, room_name);
        }

        let destroyed = self.directory.leave(room_name, now);
        if destroyed {
            self.rooms.remove(room_name);
        }
        destroyed
    }

    pub fn update_user(
        &mut self,
        room_name: &str,
        user_id: UserId,
        position: Vector2,
        direction: Vector2,
        broadcaster: &dyn Broadcaster,
        now: u64,
    ) -> bool {
        self.directory.touch(room_name, now);
        self.with_room(room_name, "update_user", broadcaster, |room| {
            npc_service::update_user(room, user_id, position, direction)
        })
    }

    pub fn capture(
        &mut self,
        room_name: &str,
        user_id: UserId,
        npc_group_id: NpcGroupId,
        broadcaster: &dyn Broadcaster,
        now: u64,
    ) -> bool {
        self.directory.touch(room_name, now);
        self.with_room(room_name, "capture", broadcaster, |room| {
            npc_service::capture(room, npc_group_id, user_id)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn throw(
        &mut self,
        room_name: &str,
        user_id: UserId,
        direction: Vector2,
        velocity: f32,
        amount: Option<u32>,
        broadcaster: &dyn Broadcaster,
        now: u64,
    ) -> bool {
        self.directory.touch(room_name, now);
        self.with_room(room_name, "throw", broadcaster, |room| {
            npc_service::throw(room, user_id, direction, velocity, amount, now)
        })
    }

    fn with_room<F>(
        &mut self,
        room_name: &str,
        operation: &str,
        broadcaster: &dyn Broadcaster,
        op: F,
    ) -> bool
    where
        F: FnOnce(&mut RoomState) -> GameResult<Changeset>,
    {
        match self.rooms.get_mut(room_name) {
            Some(room) => {
                let result = op(room);
                room.apply(operation, result, broadcaster)
            }
            None => {
                warn!(
                    "{} dropped: {}",
                    operation,
                    GameError::RoomNotFound(room_name.to_string())
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Emission, RecordingBroadcaster};

    fn quiet_config() -> GameConfig {
        GameConfig {
            bots_enabled: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_join_announces_user_and_sends_snapshot() {
        let mut world = World::new(quiet_config());
        let broadcaster = RecordingBroadcaster::new();
        let id = world.allocate_user_id();

        let user = world
            .join(id, None, Animal::Penguin, "pip", &broadcaster, 1_000)
            .unwrap();

        assert_eq!(user.room, "room-1");
        let room = world.room("room-1").unwrap();
        assert!(room.users.contains(id));
        assert!(room.terrain.boundaries.contains(&user.position));

        let emitted = broadcaster.emitted();
        assert!(matches!(
            emitted.first(),
            Some(Emission::User {
                packet: Packet::Joined { .. },
                ..
            })
        ));
        assert!(matches!(
            emitted.last(),
            Some(Emission::User {
                packet: Packet::RoomSnapshot { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_last_leave_removes_room_state() {
        let mut world = World::new(quiet_config());
        let broadcaster = RecordingBroadcaster::new();
        let a = world.allocate_user_id();
        let b = world.allocate_user_id();
        world.join(a, None, Animal::Bee, "a", &broadcaster, 0).unwrap();
        world.join(b, None, Animal::Bee, "b", &broadcaster, 1).unwrap();

        assert!(!world.leave("room-1", a, &broadcaster, 2));
        assert!(world.room("room-1").is_some());
        assert!(world.leave("room-1", b, &broadcaster, 3));
        assert!(world.room("room-1").is_none());
        assert!(world.room_names().is_empty());
    }

    #[test]
    fn test_operations_on_missing_room_are_noops() {
        let mut world = World::new(quiet_config());
        let broadcaster = RecordingBroadcaster::new();

        assert!(!world.capture("nowhere", 1, 1, &broadcaster, 0));
        assert!(broadcaster.emitted().is_empty());
    }

    #[test]
    fn test_room_rng_is_seeded_from_terrain() {
        let mut a = RoomState::new("meadow", 0);
        let mut b = RoomState::new("meadow", 0);
        assert_eq!(a.random_position(), b.random_position());
    }
}
