//! Fixed-rate room simulation.
//!
//! Per room and in this order: one collision scan, completion of every
//! finished path, stray despawn, flee, bots, spawn maintenance. Each step
//! commits its own changeset, so later steps see earlier results.

use crate::bots;
use crate::broadcast::Broadcaster;
use crate::collision;
use crate::config::GameConfig;
use crate::npc_service;
use crate::world::{RoomState, UserIdAllocator, World};
use log::trace;

/// What one tick did, summed over all rooms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub rooms: usize,
    pub collisions: usize,
    pub completed_paths: usize,
    pub despawned: usize,
    pub spawned: usize,
    pub failures: usize,
}

pub fn run_tick(world: &mut World, broadcaster: &dyn Broadcaster, now: u64) -> TickReport {
    let World {
        config,
        directory,
        rooms,
        user_ids,
    } = world;

    let names: Vec<String> = directory
        .all_rooms()
        .into_iter()
        .map(|room| room.name.clone())
        .collect();

    let mut report = TickReport::default();
    for name in names {
        let Some(room) = rooms.get_mut(&name) else {
            continue;
        };
        report.rooms += 1;
        tick_room(room, config, user_ids, broadcaster, now, &mut report);
        directory.set_bot_count(&name, room.users.bot_count());
    }
    report
}

fn tick_room(
    room: &mut RoomState,
    config: &GameConfig,
    user_ids: &mut UserIdAllocator,
    broadcaster: &dyn Broadcaster,
    now: u64,
    report: &mut TickReport,
) {
    if let Some(changes) = collision::scan(room, now) {
        report.collisions += 1;
        room.apply("collision", Ok(changes), broadcaster);
    }

    for npc_group_id in room.paths.completed(now) {
        let result = npc_service::complete_path(room, npc_group_id, now);
        if room.apply("complete path", result, broadcaster) {
            report.completed_paths += 1;
        } else {
            report.failures += 1;
        }
    }

    let strays = npc_service::despawn_strays(room, now);
    report.despawned += strays.groups().len();
    room.apply("despawn", Ok(strays), broadcaster);

    let fleeing = npc_service::flee(room, now);
    room.apply("flee", Ok(fleeing), broadcaster);

    bots::run(room, user_ids, config, broadcaster, now);

    let spawned = npc_service::spawn_maintenance(room, config);
    report.spawned += spawned.groups().len();
    room.apply("spawn", Ok(spawned), broadcaster);

    trace!(
        "Room {} ticked: {} users, {} groups, {} paths",
        room.name,
        room.users.len(),
        room.npc_groups.len(),
        room.paths.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::error::GameError;
    use arena_shared::{Animal, NpcGroup, NpcGroupPhase, PathPhase, Vector2};

    fn quiet_world() -> World {
        World::new(GameConfig {
            bots_enabled: false,
            max_npc_groups: 0,
            ..Default::default()
        })
    }

    #[test]
    fn test_tick_visits_only_live_rooms() {
        let mut world = quiet_world();
        let broadcaster = RecordingBroadcaster::new();
        let a = world.allocate_user_id();
        world
            .join(a, Some("alpha"), Animal::Wolf, "a", &broadcaster, 0)
            .unwrap();
        let b = world.allocate_user_id();
        world
            .join(b, Some("beta"), Animal::Wolf, "b", &broadcaster, 0)
            .unwrap();
        world.leave("beta", b, &broadcaster, 10);

        let report = run_tick(&mut world, &broadcaster, 100);
        assert_eq!(report.rooms, 1);
    }

    #[test]
    fn test_tick_spawns_up_to_cap() {
        let mut world = World::new(GameConfig {
            bots_enabled: false,
            max_npc_groups: 5,
            ..Default::default()
        });
        let broadcaster = RecordingBroadcaster::new();
        let id = world.allocate_user_id();
        world
            .join(id, None, Animal::Bee, "b", &broadcaster, 0)
            .unwrap();

        let report = run_tick(&mut world, &broadcaster, 100);
        assert_eq!(report.spawned, 5);
        assert_eq!(world.room("room-1").unwrap().npc_groups.len(), 5);

        let report = run_tick(&mut world, &broadcaster, 200);
        assert_eq!(report.spawned, 0);
    }

    #[test]
    fn test_finished_path_settles_during_tick() {
        let mut world = quiet_world();
        let broadcaster = RecordingBroadcaster::new();
        let id = world.allocate_user_id();
        world
            .join(id, Some("alpha"), Animal::Wolf, "a", &broadcaster, 0)
            .unwrap();

        let room = world.room_mut("alpha").unwrap();
        room.users.update(id, Vector2::new(-35.0, -35.0), Vector2::ZERO);
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(77, vec!["fig".to_string()], Vector2::ZERO)
        });
        let path = room.new_path(
            77,
            Vector2::ZERO,
            Vector2::new(0.0, 1.0),
            2.0,
            500,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        let report = run_tick(&mut world, &broadcaster, 600);
        assert_eq!(report.completed_paths, 1);

        let room = world.room("alpha").unwrap();
        let group = room.npc_groups.get_by_npc_group_id(77).unwrap();
        assert!(group.is_free_idle());
        assert_eq!(group.position, Vector2::new(0.0, 1.0));
        assert!(room.paths.is_empty());
    }

    #[test]
    fn test_bots_count_against_room_capacity() {
        let mut world = World::new(GameConfig {
            max_room_users: 4,
            max_npc_groups: 0,
            bot_spawn_delay_ms: 0,
            bot_spawn_interval_ms: 0,
            ..Default::default()
        });
        let broadcaster = RecordingBroadcaster::new();
        let first = world.allocate_user_id();
        world
            .join(first, Some("alpha"), Animal::Wolf, "a", &broadcaster, 0)
            .unwrap();

        for tick in 1..=4 {
            run_tick(&mut world, &broadcaster, tick * 100);
        }
        assert_eq!(world.room("alpha").unwrap().users.bot_count(), 3);
        assert_eq!(world.directory.get("alpha").unwrap().occupancy(), 4);

        for _ in 0..3 {
            let id = world.allocate_user_id();
            let result = world.join(id, Some("alpha"), Animal::Bee, "late", &broadcaster, 500);
            assert!(matches!(result, Err(GameError::RoomFull(_))));
        }
        assert_eq!(world.room("alpha").unwrap().users.len(), 4);
    }
}
