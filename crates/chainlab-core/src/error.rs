use thiserror::Error;

use crate::constants::HASH_HEX_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error(
        "invalid configuration: difficulty {difficulty} exceeds hash length {}",
        HASH_HEX_SIZE
    )]
    InvalidDifficulty { difficulty: u32 },

    #[error("mining interrupted after {attempts} attempts")]
    Interrupted { attempts: u64 },

    #[error("nonce space exhausted after {attempts} attempts")]
    NonceExhausted { attempts: u64 },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Pow(#[from] PowError),

    #[error("invalid configuration: mining reward must be non-negative, got {0}")]
    NegativeReward(i64),

    #[error("block index {index} is out of range for a chain of {len} blocks")]
    BlockOutOfRange { index: usize, len: usize },

    #[error("chain is sealed: stored blocks can only change through append")]
    Sealed,

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
