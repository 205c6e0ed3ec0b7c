//! Collision arbitration between NPC groups.
//!
//! Boxes are `NPC_WIDTH x NPC_HEIGHT`, centred on each group's position at
//! `now`. A scan resolves at most one collision: passes run in priority order
//! and bodies are visited in id order, so the first overlap found wins and the
//! outcome is reproducible. Returning and bouncing groups are never scanned.

use crate::changeset::Changeset;
use crate::world::RoomState;
use arena_shared::{
    check_collision, NpcGroup, PathData, PathPhase, Vector2, BOUNCE_DURATION_MS, BOUNCE_SPREAD,
    BOUNCE_VELOCITY, EMISSION_RADIUS, NPC_WIDTH,
};
use log::debug;
use rand::Rng;
use std::f32::consts::{PI, SQRT_2, TAU};

/// Centre distance between neighbouring emitted figures. Boxes this far apart
/// cannot overlap on both axes, whatever the angle between them.
const EMISSION_SPACING: f32 = NPC_WIDTH * SQRT_2 * 1.1;

#[derive(Debug, Clone)]
struct Body {
    group: NpcGroup,
    position: Vector2,
    path: Option<PathData>,
}

impl Body {
    fn path_phase(&self) -> Option<PathPhase> {
        self.path.as_ref().map(|path| path.path_phase)
    }

    fn hits(&self, other: &Body) -> bool {
        self.group.id != other.group.id && check_collision(&self.position, &other.position)
    }
}

/// Finds and resolves the highest-priority collision in the room.
pub fn scan(room: &mut RoomState, now: u64) -> Option<Changeset> {
    let bodies: Vec<Body> = room
        .npc_groups
        .values()
        .map(|group| Body {
            group: group.clone(),
            position: room.current_position(group, now),
            path: room.paths.get(group.id).cloned(),
        })
        .collect();

    let thrown: Vec<&Body> = bodies
        .iter()
        .filter(|b| b.path_phase() == Some(PathPhase::Thrown))
        .collect();
    let fleeing: Vec<&Body> = bodies
        .iter()
        .filter(|b| b.path_phase() == Some(PathPhase::Fleeing))
        .collect();
    let resting: Vec<&Body> = bodies.iter().filter(|b| b.path.is_none()).collect();
    let free_idle: Vec<&Body> = resting
        .iter()
        .copied()
        .filter(|b| b.group.is_free_idle())
        .collect();

    // Thrown against anything standing still.
    for t in &thrown {
        for r in &resting {
            if !t.hits(r) {
                continue;
            }
            match r.group.captor_id {
                None => return Some(merge(room, t, r, t.position)),
                Some(owner) if t.group.captor_id == Some(owner) => continue,
                Some(_) => return Some(emission(room, t, r)),
            }
        }
    }

    for (i, a) in thrown.iter().enumerate() {
        for b in &thrown[i + 1..] {
            if !a.hits(b) {
                continue;
            }
            if a.group.captor_id != b.group.captor_id && a.group.size() == b.group.size() {
                return Some(bounce(room, [*a, *b], now));
            }
            let (winner, loser) = larger(a, b);
            return Some(merge(room, winner, loser, winner.position));
        }
    }

    for t in &thrown {
        for f in &fleeing {
            if t.hits(f) {
                return Some(merge(room, t, f, t.position));
            }
        }
    }

    for f in &fleeing {
        for idle in &free_idle {
            if !f.hits(idle) {
                continue;
            }
            let (winner, loser) = if idle.group.size() > f.group.size() {
                (*idle, *f)
            } else {
                (*f, *idle)
            };
            return Some(merge(room, winner, loser, winner.position));
        }
    }

    for (i, a) in fleeing.iter().enumerate() {
        for b in &fleeing[i + 1..] {
            if a.hits(b) {
                let (winner, loser) = larger(a, b);
                return Some(merge(room, winner, loser, winner.position));
            }
        }
    }

    for (i, a) in free_idle.iter().enumerate() {
        for b in &free_idle[i + 1..] {
            if a.hits(b) {
                let (winner, loser) = larger(a, b);
                return Some(merge(room, winner, loser, a.position.midpoint(&b.position)));
            }
        }
    }

    None
}

/// Larger group first. Ties go to the lower id, which is `a` since bodies
/// are visited in id order.
fn larger<'a>(a: &'a Body, b: &'a Body) -> (&'a Body, &'a Body) {
    if b.group.size() > a.group.size() {
        (b, a)
    } else {
        (a, b)
    }
}

/// `winner` takes every figure of `loser` and keeps its own path, if any.
fn merge(room: &RoomState, winner: &Body, loser: &Body, position: Vector2) -> Changeset {
    let mut merged = winner.group.clone();
    merged
        .file_names
        .extend(loser.group.file_names.iter().cloned());
    merged.position = position;

    debug!(
        "Group {} absorbed group {} in room {} (size {})",
        winner.group.id,
        loser.group.id,
        room.name,
        merged.size()
    );

    let mut changes = Changeset::new();
    changes.upsert_group(merged);
    changes.delete_group(&loser.group);
    changes
}

/// Both groups shatter into single figures scattered around the struck group.
fn emission(room: &mut RoomState, thrown: &Body, struck: &Body) -> Changeset {
    let figures: Vec<String> = thrown
        .group
        .file_names
        .iter()
        .chain(struck.group.file_names.iter())
        .cloned()
        .collect();
    let step = TAU / figures.len().max(1) as f32;
    let radius = emission_radius(figures.len());

    let mut changes = Changeset::new();
    changes.delete_group(&thrown.group);
    changes.delete_group(&struck.group);

    for (i, figure) in figures.into_iter().enumerate() {
        let offset = Vector2::from_angle(step * i as f32).scale(radius);
        let position = room
            .terrain
            .boundaries
            .clamp(&struck.position.add(&offset));
        let id = room.allocate_npc_group_id();
        changes.upsert_group(NpcGroup::new(id, vec![figure], position));
    }

    debug!(
        "Group {} hit held group {} in room {}, emitted {} figures",
        thrown.group.id,
        struck.group.id,
        room.name,
        thrown.group.size() + struck.group.size()
    );
    changes
}

/// Ring radius that keeps `count` evenly spaced figures apart.
fn emission_radius(count: usize) -> f32 {
    if count < 2 {
        return EMISSION_RADIUS;
    }
    let chord_factor = 2.0 * (PI / count as f32).sin();
    EMISSION_RADIUS.max(EMISSION_SPACING / chord_factor)
}

/// Sends both groups back roughly the way they came.
fn bounce(room: &mut RoomState, bodies: [&Body; 2], now: u64) -> Changeset {
    let mut changes = Changeset::new();
    for body in bodies {
        let Some(path) = &body.path else {
            continue;
        };
        let spread = room.rng.gen_range(-BOUNCE_SPREAD..=BOUNCE_SPREAD);
        let direction = path.direction.scale(-1.0).rotate(spread);
        let bounced = room.new_path(
            body.group.id,
            body.position,
            direction,
            BOUNCE_VELOCITY,
            BOUNCE_DURATION_MS,
            now,
            PathPhase::Bouncing,
        );
        changes.upsert_group(NpcGroup {
            position: body.position,
            direction: bounced.direction,
            ..body.group.clone()
        });
        changes.set_path(bounced);
    }

    debug!(
        "Groups {} and {} bounced in room {}",
        bodies[0].group.id, bodies[1].group.id, room.name
    );
    changes
}
