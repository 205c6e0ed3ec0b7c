use arena_shared::{NpcGroupId, NpcGroupPhase, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("room {0:?} is full")]
    RoomFull(String),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("npc group {0} not found")]
    NpcGroupNotFound(NpcGroupId),

    #[error("npc group {0} has no active path")]
    PathNotFound(NpcGroupId),

    #[error("npc group {id} cannot do that while {phase:?}")]
    IllegalPhase { id: NpcGroupId, phase: NpcGroupPhase },

    #[error("user {0} is not holding anything")]
    NothingHeld(UserId),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GameResult<T> = Result<T, GameError>;
