//! Outbound event fan-out.
//!
//! The simulation only ever talks to a [`Broadcaster`]; whether packets end
//! up on a UDP socket or in a test log is decided by whoever owns the world.

use arena_shared::{Packet, UserId};
use std::sync::Mutex;

pub trait Broadcaster {
    /// Sends to every client in `room`.
    fn emit_to_room(&self, room: &str, packet: &Packet);
    /// Sends to one user in `room`.
    fn emit_to_user(&self, room: &str, user_id: UserId, packet: &Packet);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Room {
        room: String,
        packet: Packet,
    },
    User {
        room: String,
        user_id: UserId,
        packet: Packet,
    },
}

impl Emission {
    pub fn packet(&self) -> &Packet {
        match self {
            Emission::Room { packet, .. } | Emission::User { packet, .. } => packet,
        }
    }
}

/// Keeps every emission in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    emitted: Mutex<Vec<Emission>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> Vec<Emission> {
        self.emitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<Emission> {
        std::mem::take(
            &mut *self
                .emitted
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// Packets sent to the whole of `room`.
    pub fn room_packets(&self, room: &str) -> Vec<Packet> {
        self.emitted()
            .into_iter()
            .filter_map(|emission| match emission {
                Emission::Room { room: r, packet } if r == room => Some(packet),
                _ => None,
            })
            .collect()
    }

    fn record(&self, emission: Emission) {
        self.emitted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(emission);
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn emit_to_room(&self, room: &str, packet: &Packet) {
        self.record(Emission::Room {
            room: room.to_string(),
            packet: packet.clone(),
        });
    }

    fn emit_to_user(&self, room: &str, user_id: UserId, packet: &Packet) {
        self.record(Emission::User {
            room: room.to_string(),
            user_id,
            packet: packet.clone(),
        });
    }
}
