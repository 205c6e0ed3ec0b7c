//! Types and formulas shared by the arena server and its clients.
//!
//! Clients predict NPC-group motion from the same [`PathData`] the server
//! simulates, so everything that feeds that prediction (the kinematic path
//! model, throw scaling, collision boxes) lives here rather than in the server.

pub mod npc_groups;
pub mod protocol;
pub mod vector;

use serde::{Deserialize, Serialize};

pub use npc_groups::NpcGroupsBiMap;
pub use protocol::{decode_packet, encode_packet, Packet, WireFrame, PROTOCOL_VERSION};
pub use vector::Vector2;

pub type UserId = u32;
pub type NpcGroupId = u64;
pub type PathId = u64;

/// Collision box of a single NPC group, centred on its position.
pub const NPC_WIDTH: f32 = 4.0;
pub const NPC_HEIGHT: f32 = 4.0;

pub const BASE_CAPTURE_RADIUS: f32 = 5.0;
pub const BASE_FLEE_RADIUS: f32 = 15.0;

pub const PLAYER_SPEED: f32 = 12.0;
pub const DEFAULT_THROW_VELOCITY: f32 = 20.0;
pub const THROW_BASE_DURATION_MS: u64 = 1000;
/// Base distance at which a thrower of scale 1.0 can reach a target of scale 1.0.
pub const THROW_RANGE_BASE: f32 = 18.0;

pub const RETURN_DURATION_MS: u64 = 500;
pub const BOUNCE_DURATION_MS: u64 = 400;
pub const BOUNCE_VELOCITY: f32 = 15.0;
pub const BOUNCE_SPREAD: f32 = std::f32::consts::PI / 6.0;

pub const LANDING_EXTENSION_MS: u64 = 100;
pub const MAX_LANDING_RETRIES: u32 = 5;

pub const EMISSION_RADIUS: f32 = 6.0;

pub const FLEE_DURATION_MS: u64 = 1000;
pub const FLEE_DWELL_MS: u64 = 500;
pub const FLEE_BASE_SPEED: f32 = 6.0;
pub const FLEE_SIZE_SPEED: f32 = 1.5;
pub const FLEE_BLEND_OLD: f32 = 0.4;

pub const DESPAWN_MARGIN: f32 = 10.0;

/// Sprite names a spawned figure is drawn from.
pub const FIGURE_CATALOG: &[&str] = &[
    "fig_acorn.png",
    "fig_beetle.png",
    "fig_cactus.png",
    "fig_duckling.png",
    "fig_ember.png",
    "fig_frog.png",
    "fig_gnome.png",
    "fig_hedgehog.png",
    "fig_iris.png",
    "fig_jellyfish.png",
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Animal {
    Bee,
    Penguin,
    Snake,
    Turtle,
    Wolf,
    Dolphin,
    Bear,
}

impl Animal {
    pub const ALL: [Animal; 7] = [
        Animal::Bee,
        Animal::Penguin,
        Animal::Snake,
        Animal::Turtle,
        Animal::Wolf,
        Animal::Dolphin,
        Animal::Bear,
    ];

    /// Body scale relative to a turtle.
    pub fn scale(&self) -> f32 {
        match self {
            Animal::Bee => 0.6,
            Animal::Penguin => 0.8,
            Animal::Snake => 0.9,
            Animal::Turtle => 1.0,
            Animal::Wolf => 1.2,
            Animal::Dolphin => 1.3,
            Animal::Bear => 1.5,
        }
    }

    pub fn capture_radius(&self) -> f32 {
        BASE_CAPTURE_RADIUS * self.scale()
    }

    pub fn flee_radius(&self) -> f32 {
        BASE_FLEE_RADIUS * self.scale()
    }

    /// How far this animal can throw at `target`.
    pub fn throw_range(&self, target: Animal) -> f32 {
        THROW_RANGE_BASE * (self.scale() + target.scale()) / 2.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserInfo {
    pub id: UserId,
    pub animal: Animal,
    pub room: String,
    pub position: Vector2,
    pub direction: Vector2,
    pub nickname: String,
    pub is_bot: bool,
}

impl UserInfo {
    pub fn new(id: UserId, animal: Animal, room: &str, nickname: &str, position: Vector2) -> Self {
        Self {
            id,
            animal,
            room: room.to_string(),
            position,
            direction: Vector2::new(1.0, 0.0),
            nickname: nickname.to_string(),
            is_bot: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum NpcGroupPhase {
    Idle,
    Captured,
    Path,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NpcGroup {
    pub id: NpcGroupId,
    /// Stack order, bottom first. Empty means the group is deleted.
    pub file_names: Vec<String>,
    pub captor_id: Option<UserId>,
    pub position: Vector2,
    pub direction: Vector2,
    pub phase: NpcGroupPhase,
}

impl NpcGroup {
    pub fn new(id: NpcGroupId, file_names: Vec<String>, position: Vector2) -> Self {
        Self {
            id,
            file_names,
            captor_id: None,
            position,
            direction: Vector2::ZERO,
            phase: NpcGroupPhase::Idle,
        }
    }

    pub fn size(&self) -> usize {
        self.file_names.len()
    }

    pub fn is_deleted(&self) -> bool {
        self.file_names.is_empty()
    }

    /// Sprite shown on top of the stack.
    pub fn face_file_name(&self) -> Option<&str> {
        self.file_names.last().map(String::as_str)
    }

    /// Held by a captor and not in flight.
    pub fn is_held(&self) -> bool {
        self.captor_id.is_some() && self.phase != NpcGroupPhase::Path
    }

    /// Unowned and not in flight.
    pub fn is_free_idle(&self) -> bool {
        self.captor_id.is_none() && self.phase == NpcGroupPhase::Idle
    }

    /// Returns a copy marked as deleted, the form a deletion is broadcast in.
    pub fn deleted(&self) -> NpcGroup {
        NpcGroup {
            file_names: Vec::new(),
            ..self.clone()
        }
    }

    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        bounds_at(&self.position)
    }
}

/// Collision box `(min_x, min_y, max_x, max_y)` of an NPC group centred at `position`.
pub fn bounds_at(position: &Vector2) -> (f32, f32, f32, f32) {
    (
        position.x - NPC_WIDTH / 2.0,
        position.y - NPC_HEIGHT / 2.0,
        position.x + NPC_WIDTH / 2.0,
        position.y + NPC_HEIGHT / 2.0,
    )
}

pub fn check_collision(a: &Vector2, b: &Vector2) -> bool {
    let (x1, y1, x2, y2) = bounds_at(a);
    let (x3, y3, x4, y4) = bounds_at(b);

    !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PathPhase {
    Thrown,
    Fleeing,
    Bouncing,
    Returning,
}

/// A closed-form linear segment an NPC group travels along.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PathData {
    pub id: PathId,
    pub room: String,
    pub npc_group_id: NpcGroupId,
    pub start_position: Vector2,
    /// Unit vector.
    pub direction: Vector2,
    /// Units per second.
    pub velocity: f32,
    pub path_duration: u64,
    /// Start time in milliseconds.
    pub timestamp: u64,
    pub path_phase: PathPhase,
}

impl PathData {
    /// Position at time `now`, clamped to the segment.
    pub fn position_at(&self, now: u64) -> Vector2 {
        let elapsed = now.saturating_sub(self.timestamp).min(self.path_duration);
        self.position_after(elapsed)
    }

    /// Position after `elapsed_ms`, not clamped to the path duration.
    pub fn position_after(&self, elapsed_ms: u64) -> Vector2 {
        let distance = self.velocity * (elapsed_ms as f32 / 1000.0);
        self.start_position.add(&self.direction.scale(distance))
    }

    pub fn end_position(&self) -> Vector2 {
        self.position_after(self.path_duration)
    }

    pub fn is_complete(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) >= self.path_duration
    }
}

/// Velocity and duration of a throw of `count` figures.
///
/// Larger stacks fly slightly faster and noticeably longer. Clients run the
/// same function to predict a throw before the server's path arrives.
pub fn throw_profile(count: usize, base_velocity: f32) -> (f32, u64) {
    let count = count.max(1) as f32;
    let velocity = base_velocity * (1.0 + 0.1 * count.ln());
    let duration = THROW_BASE_DURATION_MS as f32 * (1.0 + 0.15 * (count.sqrt() - 1.0));
    (velocity, duration.round() as u64)
}

pub fn flee_speed(size: usize) -> f32 {
    FLEE_BASE_SPEED + (size as f32).sqrt() * FLEE_SIZE_SPEED
}

/// Axis-aligned playable area of a room.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Boundaries {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Boundaries {
    pub fn contains(&self, position: &Vector2) -> bool {
        position.x >= self.min_x
            && position.x <= self.max_x
            && position.y >= self.min_y
            && position.y <= self.max_y
    }

    /// True when `position` lies more than `margin` outside on either axis.
    pub fn is_beyond(&self, position: &Vector2, margin: f32) -> bool {
        position.x < self.min_x - margin
            || position.x > self.max_x + margin
            || position.y < self.min_y - margin
            || position.y > self.max_y + margin
    }

    pub fn clamp(&self, position: &Vector2) -> Vector2 {
        Vector2 {
            x: position.x.clamp(self.min_x, self.max_x),
            y: position.y.clamp(self.min_y, self.max_y),
        }
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct TerrainConfig {
    pub boundaries: Boundaries,
    pub seed: u64,
}
