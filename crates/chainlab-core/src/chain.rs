use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, GENESIS_PREVIOUS_HASH};
use crate::error::ChainError;
use crate::pow;
use crate::{now_millis, Amount, Block, Payload};

/// Who may mutate blocks already stored in a chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Stored blocks change only through `append`.
    #[default]
    Sealed,
    /// `Chain::block_mut` hands out stored blocks for tampering demonstrations.
    Open,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub difficulty: u32,
    pub mining_reward: Amount,
    /// Recorded only; nothing here talks to peers.
    pub p2p: bool,
    pub access: Access,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            p2p: false,
            access: Access::Sealed,
        }
    }
}

impl ChainConfig {
    pub fn new(difficulty: u32, mining_reward: Amount) -> Self {
        Self {
            difficulty,
            mining_reward,
            ..Self::default()
        }
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_mining_reward(mut self, mining_reward: Amount) -> Self {
        self.mining_reward = mining_reward;
        self
    }

    pub fn with_p2p(mut self, p2p: bool) -> Self {
        self.p2p = p2p;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        pow::check_difficulty(self.difficulty)?;
        if self.mining_reward < 0 {
            return Err(ChainError::NegativeReward(self.mining_reward));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Only `previous_hash` links are compared.
    LinkageOnly,
    /// Links, plus re-hashing every block, the proof-of-work prefix and index continuity.
    #[default]
    Full,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    ContentMismatch,
    InsufficientWork { difficulty: u32 },
    BrokenLink,
    IndexGap { expected: u64, found: u64 },
    /// First block lacks index 0 or the empty previous-hash sentinel.
    BadGenesis,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::ContentMismatch => write!(f, "stored hash does not match its contents"),
            Failure::InsufficientWork { difficulty } => {
                write!(f, "hash does not meet difficulty {difficulty}")
            }
            Failure::BrokenLink => write!(f, "previous hash does not match the preceding block"),
            Failure::IndexGap { expected, found } => {
                write!(f, "index is {found}, expected {expected}")
            }
            Failure::BadGenesis => {
                write!(f, "is not a genesis block: index must be 0 with an empty previous hash")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    failure: Option<(usize, Failure)>,
    message: String,
}

impl ValidationReport {
    fn valid() -> Self {
        Self {
            failure: None,
            message: "Valid chain".to_string(),
        }
    }

    fn failed(position: usize, failure: Failure) -> Self {
        let message = format!("Tampered chain: block {position} {failure}");
        Self {
            failure: Some((position, failure)),
            message,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Position in the chain of the first failing block.
    pub fn failed_at(&self) -> Option<usize> {
        self.failure.as_ref().map(|(position, _)| *position)
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref().map(|(_, failure)| failure)
    }
}

/// Walk `blocks` and report the first inconsistency.
pub fn validate_blocks(blocks: &[Block], difficulty: u32, mode: ValidationMode) -> ValidationReport {
    if mode == ValidationMode::Full {
        if let Some(genesis) = blocks.first() {
            if genesis.index() != 0 || genesis.previous_hash() != GENESIS_PREVIOUS_HASH {
                return ValidationReport::failed(0, Failure::BadGenesis);
            }
            if let Some(failure) = check_contents(genesis, difficulty) {
                return ValidationReport::failed(0, failure);
            }
        }
    }

    for (offset, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let position = offset + 1;

        if mode == ValidationMode::Full {
            if let Some(failure) = check_contents(current, difficulty) {
                return ValidationReport::failed(position, failure);
            }
        }
        if previous.hash() != Some(current.previous_hash()) {
            return ValidationReport::failed(position, Failure::BrokenLink);
        }
        if mode == ValidationMode::Full && current.index() != previous.index() + 1 {
            return ValidationReport::failed(
                position,
                Failure::IndexGap {
                    expected: previous.index() + 1,
                    found: current.index(),
                },
            );
        }
    }
    ValidationReport::valid()
}

fn check_contents(block: &Block, difficulty: u32) -> Option<Failure> {
    match block.hash() {
        Some(hash) if block.hash_matches_contents() => {
            (!pow::meets_difficulty(hash, difficulty))
                .then_some(Failure::InsufficientWork { difficulty })
        }
        _ => Some(Failure::ContentMismatch),
    }
}

/// An in-memory, append-only sequence of mined blocks. Never empty.
#[derive(Clone, Debug, Serialize)]
pub struct Chain {
    difficulty: u32,
    p2p: bool,
    #[serde(skip)]
    access: Access,
    blocks: Vec<Block>,
}

impl Chain {
    /// Build a chain and mine its genesis block.
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        config.validate()?;
        let mut genesis = Block::new(now_millis(), GENESIS_PREVIOUS_HASH, Payload::default());
        pow::mine(&mut genesis, config.difficulty)?;
        debug!(difficulty = config.difficulty, p2p = config.p2p, "genesis block mined");
        Ok(Self {
            difficulty: config.difficulty,
            p2p: config.p2p,
            access: config.access,
            blocks: vec![genesis],
        })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_p2p(&self) -> bool {
        self.p2p
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn block(&self, index: usize) -> Result<&Block, ChainError> {
        self.blocks.get(index).ok_or(ChainError::BlockOutOfRange {
            index,
            len: self.blocks.len(),
        })
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn latest(&self) -> &Block {
        // `new` pushes genesis and nothing removes blocks.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Wrap `payload` in a fresh block and append it.
    pub fn append(&mut self, payload: impl Into<Payload>) -> Result<&Block, ChainError> {
        self.append_block(Block::unlinked(payload))
    }

    /// Link `block` to the current tail, mine it at the chain's difficulty and store it.
    ///
    /// Whatever index, previous hash, nonce or hash the block carried is replaced.
    pub fn append_block(&mut self, mut block: Block) -> Result<&Block, ChainError> {
        let tail = self.latest();
        let index = tail.index() + 1;
        let previous_hash = tail.hash().unwrap_or_default().to_owned();
        block.link(index, previous_hash);
        let stats = pow::mine(&mut block, self.difficulty)?;
        debug!(
            index,
            nonce = stats.nonce,
            attempts = stats.attempts,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "appended block"
        );
        self.blocks.push(block);
        Ok(self.latest())
    }

    /// Mutable access to a stored block. Only `Access::Open` chains allow it.
    pub fn block_mut(&mut self, index: usize) -> Result<&mut Block, ChainError> {
        if self.access == Access::Sealed {
            return Err(ChainError::Sealed);
        }
        let len = self.blocks.len();
        self.blocks
            .get_mut(index)
            .ok_or(ChainError::BlockOutOfRange { index, len })
    }

    pub fn validate(&self, mode: ValidationMode) -> ValidationReport {
        let report = validate_blocks(&self.blocks, self.difficulty, mode);
        if !report.is_valid() {
            warn!(?mode, "{}", report.message());
        }
        report
    }

    pub fn is_valid(&self) -> bool {
        self.validate(ValidationMode::Full).is_valid()
    }
}
