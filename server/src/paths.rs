use arena_shared::{NpcGroupId, PathData, PathPhase};
use std::collections::BTreeMap;

/// Active path per NPC group in one room. Setting a path for a group that
/// already has one replaces it.
#[derive(Debug, Default)]
pub struct PathStore {
    paths: BTreeMap<NpcGroupId, PathData>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: PathData) -> Option<PathData> {
        self.paths.insert(path.npc_group_id, path)
    }

    pub fn get(&self, npc_group_id: NpcGroupId) -> Option<&PathData> {
        self.paths.get(&npc_group_id)
    }

    pub fn delete(&mut self, npc_group_id: NpcGroupId) -> Option<PathData> {
        self.paths.remove(&npc_group_id)
    }

    /// Paths in ascending group id order.
    pub fn values(&self) -> impl Iterator<Item = &PathData> {
        self.paths.values()
    }

    pub fn with_phase(&self, phase: PathPhase) -> Vec<&PathData> {
        self.paths
            .values()
            .filter(|path| path.path_phase == phase)
            .collect()
    }

    /// Groups whose path has run its full duration at `now`.
    pub fn completed(&self, now: u64) -> Vec<NpcGroupId> {
        self.paths
            .values()
            .filter(|path| path.is_complete(now))
            .map(|path| path.npc_group_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
