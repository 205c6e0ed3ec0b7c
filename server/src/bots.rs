//! Synthetic players.
//!
//! Each room keeps its own [`BotRoster`]. Bots are ordinary users with
//! `is_bot` set and act only through the same `capture`, `throw` and
//! `update_user` operations a client would trigger.

use crate::broadcast::Broadcaster;
use crate::changeset::Changeset;
use crate::config::GameConfig;
use crate::npc_service;
use crate::utils::wrap_angle;
use crate::world::{RoomState, UserIdAllocator};
use arena_shared::{
    Animal, NpcGroupId, UserId, UserInfo, Vector2, DEFAULT_THROW_VELOCITY, PLAYER_SPEED,
};
use log::info;
use rand::Rng;
use std::collections::BTreeMap;
use std::f32::consts::PI;

/// Max heading change per tick, in radians.
pub const BOT_TURN_RATE: f32 = 0.35;
pub const BOT_AIM_TOLERANCE: f32 = 0.15;
pub const BOT_THROW_COOLDOWN_MS: u64 = 2_000;
pub const BOT_COAST_TICKS: u32 = 5;
pub const BOT_SPEED: f32 = PLAYER_SPEED * 0.8;

const WANDER_MIN_MS: u64 = 1_500;
const WANDER_MAX_MS: u64 = 4_000;
const LOCK_MIN_MS: u64 = 1_000;
const LOCK_MAX_MS: u64 = 2_000;
/// Wandering bots closer than this to the edge turn back toward the centre.
const EDGE_MARGIN: f32 = 6.0;

const BOT_NICKNAMES: &[&str] = &[
    "Bramble", "Pebble", "Thistle", "Juniper", "Marble", "Sorrel", "Nettle", "Clover",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Holds a random heading until `until`.
    Wandering { until: u64, heading: f32 },
    Hunting { target: NpcGroupId, locked_until: u64 },
    Attacking { target: UserId, locked_until: u64 },
    Coasting { ticks_left: u32 },
}

#[derive(Debug, Clone)]
pub struct BotBrain {
    pub intent: Intent,
    /// Radians, same convention as `Vector2::angle`.
    pub heading: f32,
    pub last_throw_at: Option<u64>,
}

impl BotBrain {
    pub fn new(heading: f32) -> Self {
        Self {
            intent: Intent::Wandering { until: 0, heading },
            heading,
            last_throw_at: None,
        }
    }

    fn can_throw(&self, now: u64) -> bool {
        self.last_throw_at
            .map_or(true, |at| now.saturating_sub(at) >= BOT_THROW_COOLDOWN_MS)
    }
}

/// Spawn schedule and brains for one room's bots.
#[derive(Debug)]
pub struct BotRoster {
    created_at: u64,
    last_spawn_at: Option<u64>,
    brains: BTreeMap<UserId, BotBrain>,
}

impl BotRoster {
    pub fn new(now: u64) -> Self {
        Self {
            created_at: now,
            last_spawn_at: None,
            brains: BTreeMap::new(),
        }
    }

    pub fn brain(&self, bot_id: UserId) -> Option<&BotBrain> {
        self.brains.get(&bot_id)
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }

    pub fn should_spawn(&self, config: &GameConfig, occupancy: usize, now: u64) -> bool {
        if !config.bots_enabled
            || self.brains.len() >= config.max_bots
            || occupancy >= config.max_room_users
        {
            return false;
        }

        let age = now.saturating_sub(self.created_at);
        if age < config.bot_spawn_delay_ms || age > config.bot_spawn_window_ms {
            return false;
        }

        match self.last_spawn_at {
            None => true,
            Some(at) => now.saturating_sub(at) >= config.bot_spawn_interval_ms,
        }
    }
}

/// Spawns a bot when one is due, then lets every bot act once.
pub fn run(
    room: &mut RoomState,
    user_ids: &mut UserIdAllocator,
    config: &GameConfig,
    broadcaster: &dyn Broadcaster,
    now: u64,
) {
    if room.bots.should_spawn(config, room.users.len(), now) {
        spawn_bot(room, user_ids.next_id(), broadcaster, now);
    }

    let tick_ms = config.tick_ms();
    let bot_ids: Vec<UserId> = room.bots.brains.keys().copied().collect();
    for bot_id in bot_ids {
        let Some(mut brain) = room.bots.brains.remove(&bot_id) else {
            continue;
        };
        if step(room, bot_id, &mut brain, tick_ms, broadcaster, now) {
            room.bots.brains.insert(bot_id, brain);
        }
    }
}

pub fn spawn_bot(room: &mut RoomState, bot_id: UserId, broadcaster: &dyn Broadcaster, now: u64) {
    let animal = Animal::ALL[room.rng.gen_range(0..Animal::ALL.len())];
    let nickname = BOT_NICKNAMES[room.rng.gen_range(0..BOT_NICKNAMES.len())];
    let position = room.random_position();
    let heading = room.rng.gen_range(-PI..PI);

    let mut bot = UserInfo::new(bot_id, animal, &room.name, nickname, position);
    bot.is_bot = true;
    bot.direction = Vector2::from_angle(heading);

    let mut changes = Changeset::new();
    changes.upsert_user(bot);
    room.apply("spawn bot", Ok(changes), broadcaster);
    room.bots.brains.insert(bot_id, BotBrain::new(heading));
    room.bots.last_spawn_at = Some(now);

    info!(
        "Bot {} ({}, {:?}) joined room {}",
        bot_id, nickname, animal, room.name
    );
}

/// One tick of one bot. Returns false once the bot is gone from the room.
fn step(
    room: &mut RoomState,
    bot_id: UserId,
    brain: &mut BotBrain,
    tick_ms: u64,
    broadcaster: &dyn Broadcaster,
    now: u64,
) -> bool {
    let Some(bot) = room.users.get(bot_id).cloned() else {
        return false;
    };

    brain.intent = decide(room, &bot, brain, now);

    let mut advance = true;
    let desired = match brain.intent {
        Intent::Wandering { heading, .. } => {
            let inner = room.terrain.boundaries;
            let near_edge = bot.position.x < inner.min_x + EDGE_MARGIN
                || bot.position.x > inner.max_x - EDGE_MARGIN
                || bot.position.y < inner.min_y + EDGE_MARGIN
                || bot.position.y > inner.max_y - EDGE_MARGIN;
            if near_edge {
                inner.center().sub(&bot.position).angle()
            } else {
                heading
            }
        }
        Intent::Hunting { target, .. } => match room.npc_groups.get_by_npc_group_id(target) {
            Some(group) => {
                let position = room.current_position(group, now);
                if position.distance(&bot.position) < bot.animal.capture_radius() {
                    let result = npc_service::capture(room, target, bot_id);
                    room.apply("bot capture", result, broadcaster);
                    brain.intent = Intent::Wandering {
                        until: now,
                        heading: brain.heading,
                    };
                }
                position.sub(&bot.position).angle()
            }
            None => brain.heading,
        },
        Intent::Attacking { target, .. } => match room.users.get(target) {
            Some(victim) => {
                let desired = victim.position.sub(&bot.position).angle();
                let off = wrap_angle(desired - brain.heading).abs();
                if off > BOT_AIM_TOLERANCE {
                    advance = false;
                } else if brain.can_throw(now) {
                    let result = npc_service::throw(
                        room,
                        bot_id,
                        Vector2::from_angle(brain.heading),
                        DEFAULT_THROW_VELOCITY,
                        None,
                        now,
                    );
                    if room.apply("bot throw", result, broadcaster) {
                        brain.last_throw_at = Some(now);
                        brain.intent = Intent::Coasting {
                            ticks_left: BOT_COAST_TICKS,
                        };
                    }
                }
                desired
            }
            None => brain.heading,
        },
        Intent::Coasting { ticks_left } => {
            brain.intent = Intent::Coasting {
                ticks_left: ticks_left.saturating_sub(1),
            };
            brain.heading
        }
    };

    brain.heading = turn_toward(brain.heading, desired);
    let direction = Vector2::from_angle(brain.heading);
    let position = if advance {
        bot.position
            .add(&direction.scale(BOT_SPEED * tick_ms as f32 / 1000.0))
    } else {
        bot.position
    };
    let result = npc_service::update_user(room, bot_id, position, direction);
    room.apply("bot move", result, broadcaster);
    true
}

/// Keeps the current intent while it is still valid, otherwise picks a new
/// one: attack when holding and a holder is in range, hunt when a free group
/// exists, wander otherwise.
fn decide(room: &mut RoomState, bot: &UserInfo, brain: &BotBrain, now: u64) -> Intent {
    let holding = room.npc_groups.get_by_user_id(bot.id).is_some();

    match brain.intent {
        Intent::Coasting { ticks_left } if ticks_left > 0 => return brain.intent,
        Intent::Attacking {
            target,
            locked_until,
        } if holding && now < locked_until && is_attackable(room, target) => {
            return brain.intent
        }
        Intent::Hunting {
            target,
            locked_until,
        } if !holding && now < locked_until && is_huntable(room, target) => return brain.intent,
        _ => {}
    }

    if holding {
        if let Some(target) = nearest_target(room, bot) {
            return Intent::Attacking {
                target,
                locked_until: now + room.rng.gen_range(LOCK_MIN_MS..=LOCK_MAX_MS),
            };
        }
    } else if let Some(target) = nearest_free_group(room, bot, now) {
        return Intent::Hunting {
            target,
            locked_until: now + room.rng.gen_range(LOCK_MIN_MS..=LOCK_MAX_MS),
        };
    }

    match brain.intent {
        Intent::Wandering { until, .. } if now < until => brain.intent,
        _ => Intent::Wandering {
            until: now + room.rng.gen_range(WANDER_MIN_MS..=WANDER_MAX_MS),
            heading: room.rng.gen_range(-PI..PI),
        },
    }
}

fn is_attackable(room: &RoomState, target: UserId) -> bool {
    room.users.contains(target) && room.npc_groups.get_by_user_id(target).is_some()
}

fn is_huntable(room: &RoomState, target: NpcGroupId) -> bool {
    room.npc_groups
        .get_by_npc_group_id(target)
        .is_some_and(|group| group.captor_id.is_none())
}

/// Closest other player holding a group and within throw range.
fn nearest_target(room: &RoomState, bot: &UserInfo) -> Option<UserId> {
    room.users
        .values()
        .filter(|other| other.id != bot.id)
        .filter(|other| room.npc_groups.get_by_user_id(other.id).is_some())
        .map(|other| (other.id, other.position.distance(&bot.position), other.animal))
        .filter(|(_, distance, animal)| *distance <= bot.animal.throw_range(*animal))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _, _)| id)
}

fn nearest_free_group(room: &RoomState, bot: &UserInfo, now: u64) -> Option<NpcGroupId> {
    room.npc_groups
        .values()
        .filter(|group| group.captor_id.is_none())
        .map(|group| {
            (
                group.id,
                room.current_position(group, now).distance(&bot.position),
            )
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Rotates `heading` toward `desired` by at most [`BOT_TURN_RATE`].
pub fn turn_toward(heading: f32, desired: f32) -> f32 {
    let delta = wrap_angle(desired - heading).clamp(-BOT_TURN_RATE, BOT_TURN_RATE);
    wrap_angle(heading + delta)
}
