use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::chain::{Chain, ChainConfig, ValidationMode, ValidationReport};
use crate::error::ChainError;
use crate::{now_millis, Amount, Block, Transaction};

/// Pending-transaction pool and miner rewards on top of a [`Chain`].
///
/// Transactions are trusted as given: there is no signature or balance check,
/// so balances may go negative.
#[derive(Clone, Debug, Serialize)]
pub struct Ledger {
    mining_reward: Amount,
    pending_transactions: Vec<Transaction>,
    chain: Chain,
}

impl Ledger {
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        let chain = Chain::new(config)?;
        Ok(Self {
            mining_reward: config.mining_reward,
            pending_transactions: Vec::new(),
            chain,
        })
    }

    pub fn mining_reward(&self) -> Amount {
        self.mining_reward
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Mutable access to a stored block, for tampering demonstrations.
    ///
    /// Appending goes through [`Ledger::process_pending_transactions`] only, so
    /// the chain itself is never handed out mutably. Fails with
    /// [`ChainError::Sealed`] unless the ledger was built with `Access::Open`.
    pub fn block_mut(&mut self, index: usize) -> Result<&mut Block, ChainError> {
        self.chain.block_mut(index)
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn add_pending_transaction(&mut self, transaction: Transaction) {
        debug!(%transaction, pending = self.pending_transactions.len() + 1, "transaction queued");
        self.pending_transactions.push(transaction);
    }

    /// Mine every pending transaction, plus a reward for `miner_address`, into a new block.
    ///
    /// The pool is emptied only once the block is on the chain.
    pub fn process_pending_transactions(&mut self, miner_address: &str) -> Result<String, ChainError> {
        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::reward(
            now_millis(),
            miner_address,
            self.mining_reward,
        ));
        let count = transactions.len();
        let block = self.chain.append(transactions)?;
        let message = format!(
            "Block {} with HASH={} successfully mined.",
            block.index(),
            block.hash().unwrap_or_default()
        );
        info!(miner = miner_address, transactions = count, "{message}");
        self.pending_transactions.clear();
        Ok(message)
    }

    /// Replay every transaction on the chain for `address`.
    pub fn balance(&self, address: &str) -> Amount {
        let mut balance: Amount = 0;
        for tx in self.chain.blocks().iter().flat_map(|b| b.transactions()) {
            if tx.from_address() == Some(address) {
                balance -= tx.amount();
            }
            if tx.to_address() == address {
                balance += tx.amount();
            }
        }
        balance
    }

    /// Every address that appears on the chain with its replayed balance.
    pub fn balances(&self) -> BTreeMap<String, Amount> {
        let mut balances = BTreeMap::new();
        for tx in self.chain.blocks().iter().flat_map(|b| b.transactions()) {
            if let Some(from) = tx.from_address() {
                *balances.entry(from.to_owned()).or_insert(0) -= tx.amount();
            }
            *balances.entry(tx.to_address().to_owned()).or_insert(0) += tx.amount();
        }
        balances
    }

    pub fn validate(&self, mode: ValidationMode) -> ValidationReport {
        self.chain.validate(mode)
    }

    pub fn is_valid(&self) -> bool {
        self.chain.is_valid()
    }
}
