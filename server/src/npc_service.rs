//! NPC-group state transitions.
//!
//! A group is IDLE (free, or dropped where a captor stands), CAPTURED (held by
//! a player) or PATH (travelling along its [`PathData`]). Every operation here
//! reads the room and returns a [`Changeset`]; nothing is written until the
//! caller commits it, so a failed operation leaves the room untouched.
//!
//! Collision handling lives in [`crate::collision`].

use crate::changeset::Changeset;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::world::RoomState;
use arena_shared::{
    check_collision, flee_speed, throw_profile, NpcGroup, NpcGroupId, NpcGroupPhase, PathData,
    PathPhase, UserId, UserInfo, Vector2, DEFAULT_THROW_VELOCITY, FIGURE_CATALOG, FLEE_BLEND_OLD,
    FLEE_DURATION_MS, FLEE_DWELL_MS, LANDING_EXTENSION_MS, MAX_LANDING_RETRIES,
    RETURN_DURATION_MS, DESPAWN_MARGIN,
};
use log::debug;
use rand::Rng;

const SPAWN_PLACEMENT_ATTEMPTS: usize = 8;

/// `captor_id` takes `npc_group_id`, stacking it onto whatever they already hold.
pub fn capture(
    room: &RoomState,
    npc_group_id: NpcGroupId,
    captor_id: UserId,
) -> GameResult<Changeset> {
    let captor = room
        .users
        .get(captor_id)
        .ok_or(GameError::UserNotFound(captor_id))?;
    let group = room
        .npc_groups
        .get_by_npc_group_id(npc_group_id)
        .ok_or(GameError::NpcGroupNotFound(npc_group_id))?;

    if group.is_held() {
        return Err(GameError::IllegalPhase {
            id: group.id,
            phase: group.phase,
        });
    }

    let mut changes = Changeset::new();
    match room.npc_groups.get_by_user_id(captor_id) {
        Some(held) => {
            let mut held = held.clone();
            held.file_names.extend(group.file_names.iter().cloned());
            held.position = captor.position;
            held.direction = captor.direction;
            changes.upsert_group(held);
            changes.delete_group(group);
        }
        None => {
            changes.upsert_group(NpcGroup {
                captor_id: Some(captor_id),
                phase: NpcGroupPhase::Captured,
                position: captor.position,
                direction: captor.direction,
                ..group.clone()
            });
            changes.clear_path(npc_group_id);
        }
    }

    debug!(
        "User {} captured group {} in room {}",
        captor_id, npc_group_id, room.name
    );
    Ok(changes)
}

/// Launches the top `amount` figures (all when `None`) of the captor's stack
/// as a new group.
pub fn throw(
    room: &mut RoomState,
    captor_id: UserId,
    direction: Vector2,
    velocity: f32,
    amount: Option<u32>,
    now: u64,
) -> GameResult<Changeset> {
    let captor = room
        .users
        .get(captor_id)
        .cloned()
        .ok_or(GameError::UserNotFound(captor_id))?;
    let held = room
        .npc_groups
        .get_by_user_id(captor_id)
        .cloned()
        .ok_or(GameError::NothingHeld(captor_id))?;

    let count = amount
        .map(|a| (a as usize).clamp(1, held.size()))
        .unwrap_or(held.size());
    let mut remaining = held.clone();
    let thrown_names = remaining.file_names.split_off(held.size() - count);

    let direction = throw_direction(direction, captor.direction);
    let base_velocity = if velocity.is_finite() && velocity > 0.0 {
        velocity
    } else {
        DEFAULT_THROW_VELOCITY
    };
    let (velocity, duration) = throw_profile(count, base_velocity);

    let id = room.allocate_npc_group_id();
    let path = room.new_path(
        id,
        captor.position,
        direction,
        velocity,
        duration,
        now,
        PathPhase::Thrown,
    );

    let mut changes = Changeset::new();
    if remaining.is_deleted() {
        changes.delete_group(&held);
    } else {
        changes.upsert_group(remaining);
    }
    changes.upsert_group(NpcGroup {
        id,
        file_names: thrown_names,
        captor_id: Some(captor_id),
        position: captor.position,
        direction,
        phase: NpcGroupPhase::Path,
    });
    changes.set_path(path);

    debug!(
        "User {} threw {} figures as group {} in room {}",
        captor_id, count, id, room.name
    );
    Ok(changes)
}

fn throw_direction(requested: Vector2, facing: Vector2) -> Vector2 {
    [requested, facing]
        .iter()
        .map(Vector2::normalize)
        .find(|d| !d.is_zero() && d.x.is_finite() && d.y.is_finite())
        .unwrap_or(Vector2::new(1.0, 0.0))
}

/// Resolves a path that has run its full duration.
///
/// Owned throws and bounces boomerang back to a captor who is still in the
/// room; a finished return hands the group back to them. Everything else
/// lands where the path ends.
pub fn complete_path(
    room: &mut RoomState,
    npc_group_id: NpcGroupId,
    now: u64,
) -> GameResult<Changeset> {
    let path = room
        .paths
        .get(npc_group_id)
        .cloned()
        .ok_or(GameError::PathNotFound(npc_group_id))?;
    if !path.is_complete(now) {
        return Ok(Changeset::new());
    }
    let group = room
        .npc_groups
        .get_by_npc_group_id(npc_group_id)
        .cloned()
        .ok_or(GameError::NpcGroupNotFound(npc_group_id))?;
    let captor = group
        .captor_id
        .and_then(|id| room.users.get(id))
        .cloned();

    match (path.path_phase, captor) {
        (PathPhase::Thrown | PathPhase::Bouncing, Some(captor)) => {
            Ok(start_return(room, &group, &path, &captor, now))
        }
        (PathPhase::Returning, Some(captor)) => capture(room, npc_group_id, captor.id),
        _ => Ok(land(room, &group, &path)),
    }
}

fn start_return(
    room: &mut RoomState,
    group: &NpcGroup,
    path: &PathData,
    captor: &UserInfo,
    now: u64,
) -> Changeset {
    let start = path.end_position();
    let offset = captor.position.sub(&start);
    let velocity = offset.magnitude() / (RETURN_DURATION_MS as f32 / 1000.0);
    let returning = room.new_path(
        group.id,
        start,
        offset,
        velocity,
        RETURN_DURATION_MS,
        now,
        PathPhase::Returning,
    );

    let mut changes = Changeset::new();
    changes.upsert_group(NpcGroup {
        position: start,
        direction: returning.direction,
        ..group.clone()
    });
    changes.set_path(returning);
    changes
}

/// Settles a group at the end of its path as a free IDLE group, sliding it
/// further along the path while the landing spot is taken.
fn land(room: &RoomState, group: &NpcGroup, path: &PathData) -> Changeset {
    let mut terminal = path.end_position();
    let mut retries = 0;
    while landing_blocked(room, group.id, &terminal) {
        if retries == MAX_LANDING_RETRIES {
            debug!(
                "Group {} landing retries exhausted in room {}, settling at ({:.1}, {:.1})",
                group.id, room.name, terminal.x, terminal.y
            );
            break;
        }
        retries += 1;
        terminal = path.position_after(path.path_duration + retries as u64 * LANDING_EXTENSION_MS);
    }

    let mut changes = Changeset::new();
    changes.upsert_group(NpcGroup {
        captor_id: None,
        phase: NpcGroupPhase::Idle,
        position: terminal,
        ..group.clone()
    });
    changes.clear_path(group.id);
    changes
}

fn landing_blocked(room: &RoomState, npc_group_id: NpcGroupId, at: &Vector2) -> bool {
    room.npc_groups
        .values()
        .any(|other| other.id != npc_group_id && other.is_free_idle() && check_collision(at, &other.position))
}

/// Records a movement update and drags the user's held group along.
pub fn update_user(
    room: &RoomState,
    user_id: UserId,
    position: Vector2,
    direction: Vector2,
) -> GameResult<Changeset> {
    let mut user = room
        .users
        .get(user_id)
        .cloned()
        .ok_or(GameError::UserNotFound(user_id))?;

    if position.x.is_finite() && position.y.is_finite() {
        user.position = room.terrain.boundaries.clamp(&position);
    }
    let direction = direction.normalize();
    if !direction.is_zero() && direction.x.is_finite() && direction.y.is_finite() {
        user.direction = direction;
    }

    let mut changes = Changeset::new();
    if let Some(held) = room.npc_groups.get_by_user_id(user_id) {
        changes.upsert_group(NpcGroup {
            position: user.position,
            direction: user.direction,
            ..held.clone()
        });
    }
    changes.upsert_user(user);
    Ok(changes)
}

/// Removes a user. Their held group is dropped where they stood and their
/// groups still in flight lose their owner, so those land instead of returning.
pub fn release_user(room: &RoomState, user_id: UserId) -> GameResult<Changeset> {
    if !room.users.contains(user_id) {
        return Err(GameError::UserNotFound(user_id));
    }

    let mut changes = Changeset::new();
    for group in room
        .npc_groups
        .values()
        .filter(|group| group.captor_id == Some(user_id))
    {
        let phase = match group.phase {
            NpcGroupPhase::Path => NpcGroupPhase::Path,
            _ => NpcGroupPhase::Idle,
        };
        changes.upsert_group(NpcGroup {
            captor_id: None,
            phase,
            ..group.clone()
        });
    }
    changes.remove_user(user_id);
    Ok(changes)
}

/// Direction a group at `position` should run from `users`.
///
/// None when nobody is close enough to scare it, and also when anyone is
/// close enough to catch it: capture always wins over fleeing.
pub fn flee_direction<'a>(
    users: impl Iterator<Item = &'a UserInfo>,
    position: &Vector2,
) -> Option<Vector2> {
    let mut repulsion = Vector2::ZERO;
    for user in users {
        let distance = position.distance(&user.position);
        if distance < user.animal.capture_radius() {
            return None;
        }
        if distance < user.animal.flee_radius() {
            let away = position.sub(&user.position).normalize();
            repulsion = repulsion.add(&away.scale(1.0 / (distance * distance)));
        }
    }

    let direction = repulsion.normalize();
    if direction.is_zero() {
        None
    } else {
        Some(direction)
    }
}

/// Starts or steers flight for every free group with players nearby.
pub fn flee(room: &mut RoomState, now: u64) -> Changeset {
    let mut plans = Vec::new();
    for group in room.npc_groups.values() {
        if group.captor_id.is_some() {
            continue;
        }
        let fleeing = match (group.phase, room.paths.get(group.id)) {
            (NpcGroupPhase::Idle, None) => None,
            (NpcGroupPhase::Path, Some(path)) if path.path_phase == PathPhase::Fleeing => {
                Some(path)
            }
            _ => continue,
        };

        let position = room.current_position(group, now);
        let Some(away) = flee_direction(room.users.values(), &position) else {
            continue;
        };

        let direction = match fleeing {
            Some(path) => {
                if now.saturating_sub(path.timestamp) < FLEE_DWELL_MS {
                    continue;
                }
                let blended = path
                    .direction
                    .scale(FLEE_BLEND_OLD)
                    .add(&away.scale(1.0 - FLEE_BLEND_OLD))
                    .normalize();
                if blended.is_zero() {
                    away
                } else {
                    blended
                }
            }
            None => away,
        };
        plans.push((group.clone(), position, direction));
    }

    let mut changes = Changeset::new();
    for (group, position, direction) in plans {
        let path = room.new_path(
            group.id,
            position,
            direction,
            flee_speed(group.size()),
            FLEE_DURATION_MS,
            now,
            PathPhase::Fleeing,
        );
        changes.upsert_group(NpcGroup {
            position,
            direction: path.direction,
            phase: NpcGroupPhase::Path,
            ..group
        });
        changes.set_path(path);
    }
    changes
}

/// Deletes fleeing groups that have run well past the room's edge.
pub fn despawn_strays(room: &RoomState, now: u64) -> Changeset {
    let mut changes = Changeset::new();
    for path in room.paths.with_phase(PathPhase::Fleeing) {
        let position = path.position_at(now);
        if !room
            .terrain
            .boundaries
            .is_beyond(&position, DESPAWN_MARGIN)
        {
            continue;
        }

        match room.npc_groups.get_by_npc_group_id(path.npc_group_id) {
            Some(group) => changes.delete_group(group),
            None => changes.clear_path(path.npc_group_id),
        }
        debug!(
            "Group {} fled out of room {} at ({:.1}, {:.1})",
            path.npc_group_id, room.name, position.x, position.y
        );
    }
    changes
}

/// Tops the room up with single-figure groups.
pub fn spawn_maintenance(room: &mut RoomState, config: &GameConfig) -> Changeset {
    let mut changes = Changeset::new();
    if room.npc_groups.captured_figure_count() >= config.max_captured_figures {
        return changes;
    }

    let mut count = room.npc_groups.len();
    while count < config.max_npc_groups {
        let position = spawn_position(room, &changes);
        let figure = FIGURE_CATALOG[room.rng.gen_range(0..FIGURE_CATALOG.len())];
        let id = room.allocate_npc_group_id();
        changes.upsert_group(NpcGroup::new(id, vec![figure.to_string()], position));
        count += 1;
    }
    changes
}

fn spawn_position(room: &mut RoomState, pending: &Changeset) -> Vector2 {
    let mut position = room.random_position();
    for _ in 1..SPAWN_PLACEMENT_ATTEMPTS {
        let taken = room
            .npc_groups
            .values()
            .chain(pending.groups().iter())
            .any(|other| check_collision(&position, &other.position));
        if !taken {
            break;
        }
        position = room.random_position();
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use arena_shared::{Animal, PathPhase};
    use assert_approx_eq::assert_approx_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn room_with_user(position: Vector2) -> RoomState {
        let mut room = RoomState::new("test-room", 0);
        room.users
            .add(UserInfo::new(1, Animal::Turtle, "test-room", "t", position));
        room
    }

    fn commit(room: &mut RoomState, result: GameResult<Changeset>) {
        let broadcaster = RecordingBroadcaster::new();
        assert!(room.apply("test", result, &broadcaster));
    }

    fn hold(room: &mut RoomState, user_id: UserId, id: NpcGroupId, figures: &[&str]) {
        let position = room.users.get(user_id).unwrap().position;
        room.npc_groups.set(NpcGroup {
            captor_id: Some(user_id),
            phase: NpcGroupPhase::Captured,
            ..NpcGroup::new(id, names(figures), position)
        });
    }

    #[test]
    fn test_capture_idle_group() {
        let mut room = room_with_user(Vector2::new(3.0, 3.0));
        room.npc_groups
            .set(NpcGroup::new(10, names(&["a"]), Vector2::new(4.0, 3.0)));

        let result = capture(&room, 10, 1);
        commit(&mut room, result);

        let held = room.npc_groups.get_by_user_id(1).unwrap();
        assert_eq!(held.id, 10);
        assert_eq!(held.phase, NpcGroupPhase::Captured);
        assert_eq!(held.position, Vector2::new(3.0, 3.0));
    }

    #[test]
    fn test_capture_merges_into_held_group() {
        let mut room = room_with_user(Vector2::ZERO);
        hold(&mut room, 1, 5, &["a", "b"]);
        room.npc_groups
            .set(NpcGroup::new(6, names(&["c"]), Vector2::new(1.0, 0.0)));

        let result = capture(&room, 6, 1);
        let changes = result.as_ref().unwrap();
        assert!(changes.group(6).unwrap().is_deleted());
        commit(&mut room, result);

        let held = room.npc_groups.get_by_user_id(1).unwrap();
        assert_eq!(held.id, 5);
        assert_eq!(held.file_names, names(&["a", "b", "c"]));
        assert!(room.npc_groups.get_by_npc_group_id(6).is_none());
    }

    #[test]
    fn test_capture_mid_flight_clears_path() {
        let mut room = room_with_user(Vector2::ZERO);
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(6, names(&["c"]), Vector2::ZERO)
        });
        let path = room.new_path(
            6,
            Vector2::ZERO,
            Vector2::new(0.0, 1.0),
            5.0,
            1000,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        let result = capture(&room, 6, 1);
        commit(&mut room, result);

        assert!(room.paths.get(6).is_none());
        assert_eq!(
            room.npc_groups.get_by_npc_group_id(6).unwrap().phase,
            NpcGroupPhase::Captured
        );
    }

    #[test]
    fn test_capture_of_held_group_is_rejected() {
        let mut room = room_with_user(Vector2::ZERO);
        room.users
            .add(UserInfo::new(2, Animal::Bee, "test-room", "b", Vector2::ZERO));
        hold(&mut room, 2, 5, &["a"]);

        assert!(matches!(
            capture(&room, 5, 1),
            Err(GameError::IllegalPhase { id: 5, .. })
        ));
    }

    #[test]
    fn test_capture_missing_entities() {
        let room = room_with_user(Vector2::ZERO);
        assert!(matches!(
            capture(&room, 99, 1),
            Err(GameError::NpcGroupNotFound(99))
        ));
        assert!(matches!(
            capture(&room, 99, 42),
            Err(GameError::UserNotFound(42))
        ));
    }

    #[test]
    fn test_throw_all_creates_new_group_and_deletes_held() {
        let mut room = room_with_user(Vector2::new(1.0, 2.0));
        hold(&mut room, 1, 5, &["a", "b"]);

        let result = throw(&mut room, 1, Vector2::new(0.0, 3.0), 10.0, None, 500);
        commit(&mut room, result);

        assert!(room.npc_groups.get_by_npc_group_id(5).is_none());
        assert!(room.npc_groups.get_by_user_id(1).is_none());

        let path = room.paths.values().next().unwrap().clone();
        let thrown = room.npc_groups.get_by_npc_group_id(path.npc_group_id).unwrap();
        assert_ne!(thrown.id, 5);
        assert_eq!(thrown.file_names, names(&["a", "b"]));
        assert_eq!(thrown.captor_id, Some(1));
        assert_eq!(thrown.phase, NpcGroupPhase::Path);

        let (velocity, duration) = throw_profile(2, 10.0);
        assert_eq!(path.path_phase, PathPhase::Thrown);
        assert_eq!(path.start_position, Vector2::new(1.0, 2.0));
        assert_eq!(path.direction, Vector2::new(0.0, 1.0));
        assert_approx_eq!(path.velocity, velocity, 1e-6);
        assert_eq!(path.path_duration, duration);
        assert_eq!(path.timestamp, 500);
    }

    #[test]
    fn test_throw_partial_keeps_bottom_of_stack() {
        let mut room = room_with_user(Vector2::ZERO);
        hold(&mut room, 1, 5, &["a", "b", "c"]);

        let result = throw(&mut room, 1, Vector2::new(1.0, 0.0), 10.0, Some(1), 0);
        commit(&mut room, result);

        let held = room.npc_groups.get_by_user_id(1).unwrap();
        assert_eq!(held.file_names, names(&["a", "b"]));
        let thrown_id = room.paths.values().next().unwrap().npc_group_id;
        assert_eq!(
            room.npc_groups
                .get_by_npc_group_id(thrown_id)
                .unwrap()
                .file_names,
            names(&["c"])
        );
    }

    #[test]
    fn test_throw_with_zero_direction_uses_facing() {
        let mut room = room_with_user(Vector2::ZERO);
        room.users
            .update(1, Vector2::ZERO, Vector2::new(0.0, -1.0));
        hold(&mut room, 1, 5, &["a"]);

        let result = throw(&mut room, 1, Vector2::ZERO, f32::NAN, None, 0);
        commit(&mut room, result);

        let path = room.paths.values().next().unwrap();
        assert_eq!(path.direction, Vector2::new(0.0, -1.0));
        assert_approx_eq!(path.velocity, DEFAULT_THROW_VELOCITY, 1e-6);
    }

    #[test]
    fn test_throw_without_held_group_fails() {
        let mut room = room_with_user(Vector2::ZERO);
        assert!(matches!(
            throw(&mut room, 1, Vector2::new(1.0, 0.0), 10.0, None, 0),
            Err(GameError::NothingHeld(1))
        ));
    }

    #[test]
    fn test_thrown_group_with_captor_returns_instead_of_landing() {
        let mut room = room_with_user(Vector2::ZERO);
        hold(&mut room, 1, 5, &["a"]);
        let result = throw(&mut room, 1, Vector2::new(1.0, 0.0), 10.0, None, 0);
        commit(&mut room, result);
        let path = room.paths.values().next().unwrap().clone();
        let end = path.timestamp + path.path_duration;

        let result = complete_path(&mut room, path.npc_group_id, end);
        commit(&mut room, result);

        let group = room
            .npc_groups
            .get_by_npc_group_id(path.npc_group_id)
            .unwrap();
        assert_eq!(group.phase, NpcGroupPhase::Path);
        let returning = room.paths.get(path.npc_group_id).unwrap();
        assert_eq!(returning.path_phase, PathPhase::Returning);
        assert_eq!(returning.path_duration, RETURN_DURATION_MS);
        let arrival = returning.end_position();
        assert_approx_eq!(arrival.x, 0.0, 1e-3);
        assert_approx_eq!(arrival.y, 0.0, 1e-3);

        let done = returning.timestamp + RETURN_DURATION_MS;
        let result = complete_path(&mut room, path.npc_group_id, done);
        commit(&mut room, result);

        let held = room.npc_groups.get_by_user_id(1).unwrap();
        assert_eq!(held.phase, NpcGroupPhase::Captured);
        assert!(room.paths.is_empty());
    }

    #[test]
    fn test_returning_group_merges_into_new_held_stack() {
        let mut room = room_with_user(Vector2::ZERO);
        room.npc_groups.set(NpcGroup {
            captor_id: Some(1),
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(7, names(&["x"]), Vector2::ZERO)
        });
        let path = room.new_path(
            7,
            Vector2::new(5.0, 0.0),
            Vector2::new(-1.0, 0.0),
            10.0,
            RETURN_DURATION_MS,
            0,
            PathPhase::Returning,
        );
        room.paths.set(path);
        hold(&mut room, 1, 8, &["y"]);

        let result = complete_path(&mut room, 7, RETURN_DURATION_MS);
        commit(&mut room, result);

        let held = room.npc_groups.get_by_user_id(1).unwrap();
        assert_eq!(held.id, 8);
        assert_eq!(held.file_names, names(&["y", "x"]));
        assert!(room.npc_groups.get_by_npc_group_id(7).is_none());
    }

    #[test]
    fn test_ownerless_throw_lands_idle() {
        let mut room = room_with_user(Vector2::ZERO);
        room.npc_groups.set(NpcGroup {
            captor_id: Some(77),
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(7, names(&["x"]), Vector2::ZERO)
        });
        let path = room.new_path(
            7,
            Vector2::ZERO,
            Vector2::new(1.0, 0.0),
            10.0,
            1000,
            0,
            PathPhase::Thrown,
        );
        room.paths.set(path);

        let result = complete_path(&mut room, 7, 1000);
        commit(&mut room, result);

        let group = room.npc_groups.get_by_npc_group_id(7).unwrap();
        assert_eq!(group.phase, NpcGroupPhase::Idle);
        assert_eq!(group.captor_id, None);
        assert_approx_eq!(group.position.x, 10.0, 1e-4);
        assert!(room.paths.is_empty());
    }

    #[test]
    fn test_landing_slides_past_occupied_spot() {
        let mut room = room_with_user(Vector2::new(-30.0, -30.0));
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(7, names(&["x"]), Vector2::ZERO)
        });
        room.npc_groups
            .set(NpcGroup::new(8, names(&["y"]), Vector2::new(10.0, 0.0)));
        let path = room.new_path(
            7,
            Vector2::ZERO,
            Vector2::new(1.0, 0.0),
            10.0,
            1000,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        let result = complete_path(&mut room, 7, 1000);
        commit(&mut room, result);

        let landed = room.npc_groups.get_by_npc_group_id(7).unwrap();
        assert!(!check_collision(&landed.position, &Vector2::new(10.0, 0.0)));
        // 1 unit per extension: four extensions clear a 4-unit box.
        assert_approx_eq!(landed.position.x, 14.0, 1e-3);
    }

    #[test]
    fn test_landing_gives_up_after_retry_budget() {
        let mut room = room_with_user(Vector2::new(-30.0, -30.0));
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(7, names(&["x"]), Vector2::ZERO)
        });
        room.npc_groups
            .set(NpcGroup::new(8, names(&["y"]), Vector2::new(0.0, 0.0)));
        let path = room.new_path(
            7,
            Vector2::ZERO,
            Vector2::new(1.0, 0.0),
            0.0,
            1000,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        let result = complete_path(&mut room, 7, 1000);
        commit(&mut room, result);

        let landed = room.npc_groups.get_by_npc_group_id(7).unwrap();
        assert_eq!(landed.phase, NpcGroupPhase::Idle);
        assert_eq!(landed.position, Vector2::ZERO);
    }

    #[test]
    fn test_complete_path_before_duration_is_noop() {
        let mut room = room_with_user(Vector2::ZERO);
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(7, names(&["x"]), Vector2::ZERO)
        });
        let path = room.new_path(
            7,
            Vector2::ZERO,
            Vector2::new(1.0, 0.0),
            1.0,
            1000,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        assert!(complete_path(&mut room, 7, 999).unwrap().is_empty());
        assert!(matches!(
            complete_path(&mut room, 8, 999),
            Err(GameError::PathNotFound(8))
        ));
    }

    #[test]
    fn test_update_user_drags_held_group_and_clamps() {
        let mut room = room_with_user(Vector2::ZERO);
        hold(&mut room, 1, 5, &["a"]);

        let result = update_user(&room, 1, Vector2::new(1_000.0, 2.0), Vector2::new(0.0, 2.0));
        commit(&mut room, result);

        let max_x = room.terrain.boundaries.max_x;
        let user = room.users.get(1).unwrap();
        assert_eq!(user.position, Vector2::new(max_x, 2.0));
        assert_eq!(user.direction, Vector2::new(0.0, 1.0));
        assert_eq!(
            room.npc_groups.get_by_user_id(1).unwrap().position,
            Vector2::new(max_x, 2.0)
        );
    }

    #[test]
    fn test_release_user_drops_held_and_orphans_thrown() {
        let mut room = room_with_user(Vector2::new(2.0, 2.0));
        hold(&mut room, 1, 5, &["a"]);
        room.npc_groups.set(NpcGroup {
            captor_id: Some(1),
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(6, names(&["b"]), Vector2::ZERO)
        });

        let result = release_user(&room, 1);
        commit(&mut room, result);

        assert!(!room.users.contains(1));
        let dropped = room.npc_groups.get_by_npc_group_id(5).unwrap();
        assert!(dropped.is_free_idle());
        assert_eq!(dropped.position, Vector2::new(2.0, 2.0));
        let orphan = room.npc_groups.get_by_npc_group_id(6).unwrap();
        assert_eq!(orphan.captor_id, None);
        assert_eq!(orphan.phase, NpcGroupPhase::Path);
    }

    #[test]
    fn test_flee_direction_points_away_and_weights_closer_players() {
        let near = UserInfo::new(1, Animal::Turtle, "r", "n", Vector2::new(-8.0, 0.0));
        let far = UserInfo::new(2, Animal::Turtle, "r", "f", Vector2::new(0.0, 12.0));
        let users = [near, far];

        let direction = flee_direction(users.iter(), &Vector2::ZERO).unwrap();
        assert!(direction.x > 0.0);
        assert!(direction.y < 0.0);
        assert!(direction.x > direction.y.abs());
    }

    #[test]
    fn test_capture_radius_suppresses_fleeing() {
        let scary = UserInfo::new(1, Animal::Turtle, "r", "s", Vector2::new(10.0, 0.0));
        let catcher = UserInfo::new(2, Animal::Turtle, "r", "c", Vector2::new(0.0, 4.0));
        let users = [scary, catcher];

        assert!(flee_direction(users.iter(), &Vector2::ZERO).is_none());
    }

    #[test]
    fn test_flee_starts_path_for_idle_group() {
        let mut room = room_with_user(Vector2::new(-8.0, 0.0));
        room.npc_groups
            .set(NpcGroup::new(3, names(&["a", "b", "c", "d"]), Vector2::ZERO));

        let changes = flee(&mut room, 100);
        commit(&mut room, Ok(changes));

        let path = room.paths.get(3).unwrap();
        assert_eq!(path.path_phase, PathPhase::Fleeing);
        assert_eq!(path.direction, Vector2::new(1.0, 0.0));
        assert_approx_eq!(path.velocity, flee_speed(4), 1e-6);
        assert_eq!(
            room.npc_groups.get_by_npc_group_id(3).unwrap().phase,
            NpcGroupPhase::Path
        );
    }

    #[test]
    fn test_fleeing_group_waits_dwell_then_blends() {
        let mut room = room_with_user(Vector2::new(0.0, -8.0));
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(3, names(&["a"]), Vector2::ZERO)
        });
        let path = room.new_path(
            3,
            Vector2::ZERO,
            Vector2::new(1.0, 0.0),
            0.0,
            FLEE_DURATION_MS,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        assert!(flee(&mut room, FLEE_DWELL_MS - 1).is_empty());

        let changes = flee(&mut room, FLEE_DWELL_MS);
        commit(&mut room, Ok(changes));
        let steered = room.paths.get(3).unwrap();
        let expected = Vector2::new(0.4, 0.6).normalize();
        assert_approx_eq!(steered.direction.x, expected.x, 1e-5);
        assert_approx_eq!(steered.direction.y, expected.y, 1e-5);
    }

    #[test]
    fn test_despawn_strays_deletes_groups_past_margin() {
        let mut room = room_with_user(Vector2::ZERO);
        let edge = room.terrain.boundaries.max_x;
        room.npc_groups.set(NpcGroup {
            phase: NpcGroupPhase::Path,
            ..NpcGroup::new(3, names(&["a"]), Vector2::new(edge, 0.0))
        });
        let path = room.new_path(
            3,
            Vector2::new(edge, 0.0),
            Vector2::new(1.0, 0.0),
            20.0,
            1000,
            0,
            PathPhase::Fleeing,
        );
        room.paths.set(path);

        assert!(despawn_strays(&room, 400).is_empty());
        let changes = despawn_strays(&room, 600);
        commit(&mut room, Ok(changes));
        assert!(room.npc_groups.is_empty());
        assert!(room.paths.is_empty());
    }

    #[test]
    fn test_spawn_maintenance_fills_to_cap() {
        let mut room = room_with_user(Vector2::ZERO);
        let config = GameConfig {
            max_npc_groups: 12,
            ..Default::default()
        };

        let changes = spawn_maintenance(&mut room, &config);
        commit(&mut room, Ok(changes));

        assert_eq!(room.npc_groups.len(), 12);
        for group in room.npc_groups.values() {
            assert_eq!(group.size(), 1);
            assert!(group.is_free_idle());
            assert!(room.terrain.boundaries.contains(&group.position));
            assert!(FIGURE_CATALOG.contains(&group.file_names[0].as_str()));
        }
        assert!(spawn_maintenance(&mut room, &config).is_empty());
    }

    #[test]
    fn test_spawn_maintenance_stops_at_captured_cap() {
        let mut room = room_with_user(Vector2::ZERO);
        hold(&mut room, 1, 5, &["a", "b", "c"]);
        let config = GameConfig {
            max_captured_figures: 3,
            ..Default::default()
        };

        assert!(spawn_maintenance(&mut room, &config).is_empty());
    }
}
