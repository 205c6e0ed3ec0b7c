//! Room metadata and matchmaking.
//!
//! The directory counts the human players and bots in each room. Both take
//! up seats, but only humans keep a room alive. The simulation state of a room lives in [`crate::world::RoomState`] and is
//! created and dropped alongside the directory entry.

use log::info;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub name: String,
    pub num_users: usize,
    pub num_bots: usize,
    /// Accepting matchmade players.
    pub is_active: bool,
    pub last_active: u64,
    pub created_at: u64,
}

impl Room {
    fn new(name: String, now: u64) -> Self {
        Self {
            name,
            num_users: 0,
            num_bots: 0,
            is_active: true,
            last_active: now,
            created_at: now,
        }
    }

    /// Seats taken by players and bots.
    pub fn occupancy(&self) -> usize {
        self.num_users + self.num_bots
    }

    fn within_join_window(&self, now: u64, join_window_ms: u64) -> bool {
        now.saturating_sub(self.created_at) < join_window_ms
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub room: String,
    pub created: bool,
}

pub struct RoomDirectory {
    rooms: HashMap<String, Room>,
    next_room_number: u32,
    max_room_users: usize,
    join_window_ms: u64,
}

impl RoomDirectory {
    pub fn new(max_room_users: usize, join_window_ms: u64) -> Self {
        Self {
            rooms: HashMap::new(),
            next_room_number: 1,
            max_room_users,
            join_window_ms,
        }
    }

    /// Places a player in a room.
    ///
    /// With a hint the player goes to that room, creating it if needed.
    /// Otherwise the oldest active room still inside its join window is used,
    /// or a new room is created. Returns None only when the hinted room is full.
    pub fn join(&mut self, room_hint: Option<&str>, now: u64) -> Option<JoinOutcome> {
        let (name, created) = match room_hint {
            Some(hint) if self.rooms.contains_key(hint) => (hint.to_string(), false),
            Some(hint) => (self.create_room(hint.to_string(), now), true),
            None => match self.find_open_room(now) {
                Some(name) => (name, false),
                None => {
                    let name = self.next_room_name();
                    (self.create_room(name, now), true)
                }
            },
        };

        let max_room_users = self.max_room_users;
        let room = self.rooms.get_mut(&name)?;
        if room.occupancy() >= max_room_users {
            return None;
        }

        room.num_users += 1;
        room.last_active = now;
        room.is_active = room.occupancy() < max_room_users;

        Some(JoinOutcome { room: name, created })
    }

    /// Removes a player. Returns true when this emptied and destroyed the room.
    pub fn leave(&mut self, name: &str, now: u64) -> bool {
        let Some(room) = self.rooms.get_mut(name) else {
            return false;
        };

        room.num_users = room.num_users.saturating_sub(1);
        room.last_active = now;
        room.is_active = room.occupancy() < self.max_room_users;

        if room.num_users == 0 {
            self.rooms.remove(name);
            info!("Room {} destroyed", name);
            true
        } else {
            false
        }
    }

    /// Records how many bots currently sit in `name`.
    pub fn set_bot_count(&mut self, name: &str, num_bots: usize) {
        if let Some(room) = self.rooms.get_mut(name) {
            room.num_bots = num_bots;
            room.is_active = room.occupancy() < self.max_room_users;
        }
    }

    pub fn touch(&mut self, name: &str, now: u64) {
        if let Some(room) = self.rooms.get_mut(name) {
            room.last_active = now;
        }
    }

    pub fn get(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Live rooms, oldest first.
    pub fn all_rooms(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn find_open_room(&self, now: u64) -> Option<String> {
        self.all_rooms()
            .into_iter()
            .find(|room| {
                room.is_active
                    && room.occupancy() < self.max_room_users
                    && room.within_join_window(now, self.join_window_ms)
            })
            .map(|room| room.name.clone())
    }

    fn next_room_name(&mut self) -> String {
        loop {
            let name = format!("room-{}", self.next_room_number);
            self.next_room_number += 1;
            if !self.rooms.contains_key(&name) {
                return name;
            }
        }
    }

    fn create_room(&mut self, name: String, now: u64) -> String {
        info!("Room {} created", name);
        self.rooms.insert(name.clone(), Room::new(name.clone(), now));
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 60_000;

    #[test]
    fn test_first_join_creates_room() {
        let mut directory = RoomDirectory::new(4, WINDOW);
        let outcome = directory.join(None, 1_000).unwrap();

        assert_eq!(outcome.room, "room-1");
        assert!(outcome.created);
        assert_eq!(directory.get("room-1").unwrap().num_users, 1);
    }

    #[test]
    fn test_matchmaking_reuses_open_room() {
        let mut directory = RoomDirectory::new(4, WINDOW);
        directory.join(None, 1_000);
        let second = directory.join(None, 2_000).unwrap();

        assert_eq!(second.room, "room-1");
        assert!(!second.created);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_matchmaking_skips_rooms_past_join_window() {
        let mut directory = RoomDirectory::new(4, WINDOW);
        directory.join(None, 1_000);
        let late = directory.join(None, 1_000 + WINDOW).unwrap();

        assert_eq!(late.room, "room-2");
        assert!(late.created);
    }

    #[test]
    fn test_matchmaking_skips_full_rooms() {
        let mut directory = RoomDirectory::new(2, WINDOW);
        directory.join(None, 1_000);
        directory.join(None, 1_001);
        assert!(!directory.get("room-1").unwrap().is_active);

        let third = directory.join(None, 1_002).unwrap();
        assert_eq!(third.room, "room-2");
    }

    #[test]
    fn test_hinted_room_is_created_and_full_hint_rejected() {
        let mut directory = RoomDirectory::new(1, WINDOW);
        let outcome = directory.join(Some("meadow"), 1_000).unwrap();
        assert_eq!(outcome.room, "meadow");
        assert!(outcome.created);

        assert!(directory.join(Some("meadow"), 1_001).is_none());
    }

    #[test]
    fn test_bots_take_seats_but_do_not_keep_room_alive() {
        let mut directory = RoomDirectory::new(4, WINDOW);
        directory.join(Some("meadow"), 1_000);
        directory.set_bot_count("meadow", 3);

        let room = directory.get("meadow").unwrap();
        assert_eq!(room.occupancy(), 4);
        assert!(!room.is_active);
        assert!(directory.join(Some("meadow"), 1_001).is_none());
        assert_eq!(directory.join(None, 1_002).unwrap().room, "room-1");

        assert!(directory.leave("meadow", 2_000));
        assert!(directory.get("meadow").is_none());
    }

    #[test]
    fn test_last_leave_destroys_room() {
        let mut directory = RoomDirectory::new(4, WINDOW);
        directory.join(None, 1_000);
        directory.join(None, 1_001);

        assert!(!directory.leave("room-1", 2_000));
        assert!(directory.leave("room-1", 2_001));
        assert!(directory.all_rooms().is_empty());
        assert!(!directory.leave("room-1", 2_002));
    }
}
