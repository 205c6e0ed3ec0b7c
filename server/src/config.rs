//! Runtime tuning for the arena server.
//!
//! Gameplay constants that clients must agree on live in `arena_shared`;
//! this holds the knobs only the server cares about.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Concurrent UDP clients across all rooms.
    pub max_clients: usize,
    /// Players plus bots allowed in one room.
    pub max_room_users: usize,
    /// How long after creation a room still accepts matchmade players.
    pub join_window_ms: u64,
    pub max_npc_groups: usize,
    pub max_captured_figures: usize,
    pub bots_enabled: bool,
    pub max_bots: usize,
    pub bot_spawn_delay_ms: u64,
    pub bot_spawn_interval_ms: u64,
    /// Bots stop joining a room this long after it was created.
    pub bot_spawn_window_ms: u64,
    pub client_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            max_clients: 64,
            max_room_users: 8,
            join_window_ms: 5 * 60 * 1000,
            max_npc_groups: 30,
            max_captured_figures: 60,
            bots_enabled: true,
            max_bots: 4,
            bot_spawn_delay_ms: 3_000,
            bot_spawn_interval_ms: 5_000,
            bot_spawn_window_ms: 120_000,
            client_timeout: Duration::from_secs(5),
        }
    }
}

impl GameConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate.max(1) as f32)
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_duration().as_millis() as u64
    }
}
