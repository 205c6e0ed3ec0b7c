use arena_shared::{UserId, UserInfo, Vector2};
use std::collections::BTreeMap;

/// Players and bots connected to one room.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: BTreeMap<UserId, UserInfo>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, user: UserInfo) {
        self.users.insert(user.id, user);
    }

    pub fn remove(&mut self, id: UserId) -> Option<UserInfo> {
        self.users.remove(&id)
    }

    pub fn get(&self, id: UserId) -> Option<&UserInfo> {
        self.users.get(&id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Records a movement update. Returns false for unknown users. Live
    /// traffic goes through `Changeset::upsert_user` instead.
    #[cfg(test)]
    pub(crate) fn update(&mut self, id: UserId, position: Vector2, direction: Vector2) -> bool {
        match self.users.get_mut(&id) {
            Some(user) => {
                user.position = position;
                if !direction.is_zero() {
                    user.direction = direction.normalize();
                }
                true
            }
            None => false,
        }
    }

    /// Users in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &UserInfo> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn bot_count(&self) -> usize {
        self.users.values().filter(|u| u.is_bot).count()
    }
}
