use crate::utils::fnv1a;
use arena_shared::{Boundaries, TerrainConfig};

const MIN_HALF_EXTENT: f32 = 40.0;
const HALF_EXTENT_VARIATION: u64 = 21;

/// Deterministic terrain for a room: the same id always yields the same
/// boundaries and seed, so every process agrees without coordination.
pub fn get_terrain_config(room_id: &str) -> TerrainConfig {
    let seed = fnv1a(room_id.as_bytes());
    let half_width = MIN_HALF_EXTENT + (seed % HALF_EXTENT_VARIATION) as f32;
    let half_height = MIN_HALF_EXTENT + ((seed >> 16) % HALF_EXTENT_VARIATION) as f32;

    TerrainConfig {
        boundaries: Boundaries {
            min_x: -half_width,
            max_x: half_width,
            min_y: -half_height,
            max_y: half_height,
        },
        seed,
    }
}
