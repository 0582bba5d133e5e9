//! Brute-force proof-of-work search.
//!
//! Mining walks nonces upward from 0, recomputing the full block hash each time,
//! until the hex digest starts with `difficulty` copies of [`LEADING_CHAR`].
//! Expected work is about 16^difficulty hashes and there is no shortcut.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use crate::constants::{HASH_HEX_SIZE, LEADING_CHAR, STOP_POLL_INTERVAL};
use crate::error::PowError;
use crate::Block;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiningStats {
    pub nonce: u64,
    pub attempts: u64,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiningOutcome {
    Mined(MiningStats),
    Interrupted { attempts: u64 },
}

pub fn check_difficulty(difficulty: u32) -> Result<(), PowError> {
    if difficulty as usize > HASH_HEX_SIZE {
        return Err(PowError::InvalidDifficulty { difficulty });
    }
    Ok(())
}

pub fn leading_zero_chars(hash: &str) -> usize {
    hash.chars().take_while(|c| *c == LEADING_CHAR).count()
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zero_chars(hash) >= difficulty as usize
}

/// Mine `block` in place. Blocks the calling thread until a nonce is found.
///
/// Difficulty 0 accepts the first hash, so the block ends up with nonce 0 after a single pass.
pub fn mine(block: &mut Block, difficulty: u32) -> Result<MiningStats, PowError> {
    match search(block, difficulty, |_| false)? {
        MiningOutcome::Mined(stats) => Ok(stats),
        MiningOutcome::Interrupted { attempts } => Err(PowError::Interrupted { attempts }),
    }
}

/// Like [`mine`], but gives up once `stop` is observed set.
///
/// The flag is polled every [`STOP_POLL_INTERVAL`] attempts. An interrupted block keeps no hash.
pub fn mine_cancellable(
    block: &mut Block,
    difficulty: u32,
    stop: &AtomicBool,
) -> Result<MiningOutcome, PowError> {
    search(block, difficulty, |attempts| {
        attempts % STOP_POLL_INTERVAL == 0 && stop.load(Ordering::Relaxed)
    })
}

pub fn mine_with_deadline(
    block: &mut Block,
    difficulty: u32,
    deadline: Instant,
) -> Result<MiningOutcome, PowError> {
    search(block, difficulty, |attempts| {
        attempts % STOP_POLL_INTERVAL == 0 && Instant::now() >= deadline
    })
}

fn search(
    block: &mut Block,
    difficulty: u32,
    mut should_stop: impl FnMut(u64) -> bool,
) -> Result<MiningOutcome, PowError> {
    check_difficulty(difficulty)?;
    block.unseal();
    let started = Instant::now();
    let mut nonce = 0u64;
    let mut attempts = 0u64;
    loop {
        block.set_nonce(nonce);
        let hash = block.recompute_hash();
        attempts += 1;

        if meets_difficulty(&hash, difficulty) {
            info!(
                "Mined block {} with nonce {} after {} attempts, hash {}",
                block.index(),
                nonce,
                attempts,
                hash
            );
            block.seal(nonce, hash);
            return Ok(MiningOutcome::Mined(MiningStats {
                nonce,
                attempts,
                elapsed: started.elapsed(),
            }));
        }
        if should_stop(attempts) {
            return Ok(MiningOutcome::Interrupted { attempts });
        }
        nonce = nonce
            .checked_add(1)
            .ok_or(PowError::NonceExhausted { attempts })?;
    }
}
