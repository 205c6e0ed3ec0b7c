//! Wire protocol between arena clients and the server.
//!
//! Every datagram is one bincode-encoded [`WireFrame`]. The frame carries the
//! protocol version so a stale client is rejected instead of misreading a
//! packet whose layout changed.

use crate::{
    Animal, NpcGroup, NpcGroupId, NpcGroupsBiMap, PathData, TerrainConfig, UserId, UserInfo,
    Vector2,
};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Join {
        room_hint: Option<String>,
        animal: Animal,
        nickname: String,
    },
    UpdateUser {
        position: Vector2,
        direction: Vector2,
    },
    Capture {
        npc_group_id: NpcGroupId,
    },
    Throw {
        direction: Vector2,
        velocity: f32,
        /// Figures to throw off the top of the held stack; `None` throws all.
        amount: Option<u32>,
    },
    Heartbeat,
    Leave,

    // Server -> client
    Joined {
        user_id: UserId,
        room: String,
        terrain: TerrainConfig,
    },
    RoomSnapshot {
        users: Vec<UserInfo>,
        npc_groups: NpcGroupsBiMap,
        paths: Vec<PathData>,
    },
    UsersUpdated {
        users: Vec<UserInfo>,
    },
    UserLeft {
        user_id: UserId,
    },
    /// Changed groups; a group with no file names has been deleted.
    NpcGroupsUpdated {
        groups: Vec<NpcGroup>,
    },
    PathsUpdated {
        paths: Vec<PathData>,
    },
    Rejected {
        reason: String,
    },
}

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Join { .. } => "join",
            Packet::UpdateUser { .. } => "update_user",
            Packet::Capture { .. } => "capture",
            Packet::Throw { .. } => "throw",
            Packet::Heartbeat => "heartbeat",
            Packet::Leave => "leave",
            Packet::Joined { .. } => "joined",
            Packet::RoomSnapshot { .. } => "room_snapshot",
            Packet::UsersUpdated { .. } => "users_updated",
            Packet::UserLeft { .. } => "user_left",
            Packet::NpcGroupsUpdated { .. } => "npc_groups_updated",
            Packet::PathsUpdated { .. } => "paths_updated",
            Packet::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WireFrame {
    pub version: u16,
    pub packet: Packet,
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(&WireFrame {
        version: PROTOCOL_VERSION,
        packet: packet.clone(),
    })
}

/// Decodes a frame, rejecting any protocol version other than ours.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, bincode::Error> {
    let frame: WireFrame = bincode::deserialize(bytes)?;
    if frame.version != PROTOCOL_VERSION {
        return Err(Box::new(bincode::ErrorKind::Custom(format!(
            "unsupported protocol version {} (expected {})",
            frame.version, PROTOCOL_VERSION
        ))));
    }
    Ok(frame.packet)
}
