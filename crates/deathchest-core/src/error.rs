//! Engine error types.

use thiserror::Error;

use deathchest_world::{BlockPos, WorldError};

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ChestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("owner name must not be empty")]
    InvalidOwner,

    #[error("a death chest is already tracked at {0}")]
    AlreadyTracked(BlockPos),

    #[error("engine is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    World(#[from] WorldError),
}
