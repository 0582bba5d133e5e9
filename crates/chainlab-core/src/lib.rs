use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod constants;
pub mod error;
pub mod export;
pub mod ledger;
pub mod pow;

pub use chain::{Access, Chain, ChainConfig, Failure, ValidationMode, ValidationReport};
pub use error::{ChainError, PowError};
pub use export::ExportOptions;
pub use ledger::Ledger;

use constants::GENESIS_PREVIOUS_HASH;

pub type Amount = i64;

/// Milliseconds since the unix epoch. A clock set before 1970 reads as 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn put_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u64).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    timestamp: u64,
    from_address: Option<String>,
    to_address: String,
    amount: Amount,
}

impl Transaction {
    pub fn new(
        timestamp: u64,
        from_address: Option<String>,
        to_address: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            timestamp,
            from_address,
            to_address: to_address.into(),
            amount,
        }
    }

    /// A transfer between two addresses, stamped now.
    pub fn transfer(from: impl Into<String>, to: impl Into<String>, amount: Amount) -> Self {
        Self::new(now_millis(), Some(from.into()), to, amount)
    }

    /// A mint with no sender, used for miner rewards.
    pub fn reward(timestamp: u64, to: impl Into<String>, amount: Amount) -> Self {
        Self::new(timestamp, None, to, amount)
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn from_address(&self) -> Option<&str> {
        self.from_address.as_deref()
    }

    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    fn put_canonical(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        match &self.from_address {
            Some(from) => {
                bytes.push(1);
                put_str(bytes, from);
            }
            None => bytes.push(0),
        }
        put_str(bytes, &self.to_address);
        bytes.extend_from_slice(&self.amount.to_le_bytes());
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "From {} To {}: Amount={}",
            self.from_address().unwrap_or("<reward>"),
            self.to_address,
            self.amount
        )
    }
}

/// Block contents: an opaque string or an ordered list of transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Data(String),
    Transactions(Vec<Transaction>),
}

impl Payload {
    /// Transactions carried by this payload; opaque data carries none.
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            Payload::Data(_) => &[],
            Payload::Transactions(txs) => txs,
        }
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Payload::Data(data) => {
                bytes.push(0);
                put_str(&mut bytes, data);
            }
            Payload::Transactions(txs) => {
                bytes.push(1);
                bytes.extend_from_slice(&(txs.len() as u64).to_le_bytes());
                for tx in txs {
                    tx.put_canonical(&mut bytes);
                }
            }
        }
        bytes
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Transactions(Vec::new())
    }
}

impl From<String> for Payload {
    fn from(data: String) -> Self {
        Payload::Data(data)
    }
}

impl From<&str> for Payload {
    fn from(data: &str) -> Self {
        Payload::Data(data.to_owned())
    }
}

impl From<Vec<Transaction>> for Payload {
    fn from(txs: Vec<Transaction>) -> Self {
        Payload::Transactions(txs)
    }
}

/// Bytes fed to SHA-256 for a block. The index is not part of it.
pub fn hash_bytes(timestamp: u64, previous_hash: &str, payload: &Payload, nonce: u64) -> Vec<u8> {
    let payload = payload.canonical_bytes();
    let mut bytes = Vec::with_capacity(8 + 8 + previous_hash.len() + payload.len() + 8);
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    put_str(&mut bytes, previous_hash);
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(&nonce.to_le_bytes());
    bytes
}

/// Lowercase hex SHA-256 of the block fields.
pub fn hash_fields(timestamp: u64, previous_hash: &str, payload: &Payload, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hash_bytes(timestamp, previous_hash, payload, nonce));
    hex::encode(hasher.finalize())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: u64,
    previous_hash: String,
    hash: Option<String>,
    nonce: u64,
    payload: Payload,
}

impl Block {
    /// An unmined block: index 0, nonce 0, no hash.
    pub fn new(timestamp: u64, previous_hash: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            index: 0,
            timestamp,
            previous_hash: previous_hash.into(),
            hash: None,
            nonce: 0,
            payload: payload.into(),
        }
    }

    /// An unmined block stamped now, not yet linked to anything.
    pub fn unlinked(payload: impl Into<Payload>) -> Self {
        Self::new(now_millis(), GENESIS_PREVIOUS_HASH, payload)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// `None` until mining completes.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.payload.transactions()
    }

    pub fn is_mined(&self) -> bool {
        self.hash.is_some()
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        hash_bytes(self.timestamp, &self.previous_hash, &self.payload, self.nonce)
    }

    /// Hash of the current field values. Never touches the stored hash or nonce.
    pub fn recompute_hash(&self) -> String {
        hash_fields(self.timestamp, &self.previous_hash, &self.payload, self.nonce)
    }

    /// True when the stored hash is present and reproducible from the stored fields.
    pub fn hash_matches_contents(&self) -> bool {
        self.hash.as_deref() == Some(self.recompute_hash().as_str())
    }

    /// Position the block after its predecessor. Any previous mining result is discarded.
    pub(crate) fn link(&mut self, index: u64, previous_hash: String) {
        self.index = index;
        self.previous_hash = previous_hash;
        self.nonce = 0;
        self.hash = None;
    }

    pub(crate) fn unseal(&mut self) {
        self.hash = None;
    }

    pub(crate) fn seal(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = Some(hash);
    }

    // Direct mutators. Stored blocks are only reachable through these in
    // `Access::Open` chains; they exist for tampering walkthroughs.

    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = payload.into();
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn set_previous_hash(&mut self, previous_hash: impl Into<String>) {
        self.previous_hash = previous_hash.into();
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn set_hash(&mut self, hash: impl Into<String>) {
        self.hash = Some(hash.into());
    }

    /// Overwrite the stored hash with one recomputed from the current fields, without mining.
    pub fn rehash(&mut self) {
        self.hash = Some(self.recompute_hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::new(1_600_000_000_000, Some("Alice".into()), "Bob", 10),
            Transaction::new(1_600_000_100_000, Some("Bob".into()), "Charlie", 5),
        ]
    }

    fn sample_block() -> Block {
        Block::new(1_600_000_200_000, "abc", sample_txs())
    }

    #[test]
    fn block_new_example() {
        let block = sample_block();
        assert_eq!(block.index(), 0);
        assert_eq!(block.nonce(), 0);
        assert_eq!(block.previous_hash(), "abc");
        assert!(block.hash().is_none());
        assert!(!block.is_mined());
        assert_eq!(block.transactions().len(), 2);
    }

    #[test]
    fn block_hash_consistency() {
        let block = sample_block();
        let hash1 = block.recompute_hash();
        let hash2 = block.recompute_hash();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), HASH_HEX_SIZE);
        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_fields_matches_block_hash() {
        let block = sample_block();
        let direct = hash_fields(1_600_000_200_000, "abc", &Payload::from(sample_txs()), 0);
        assert_eq!(block.recompute_hash(), direct);
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let mut block = sample_block();
        let hash1 = block.recompute_hash();
        block.set_nonce(1);
        assert_ne!(hash1, block.recompute_hash());
    }

    #[test]
    fn block_hash_changes_with_each_field() {
        let base = sample_block().recompute_hash();

        let mut block = sample_block();
        block.set_timestamp(1);
        assert_ne!(base, block.recompute_hash());

        let mut block = sample_block();
        block.set_previous_hash("abd");
        assert_ne!(base, block.recompute_hash());

        let mut block = sample_block();
        block.set_payload(vec![Transaction::new(
            1_600_000_000_000,
            Some("Alice".into()),
            "Bob",
            1000,
        )]);
        assert_ne!(base, block.recompute_hash());
    }

    #[test]
    fn hash_ignores_index() {
        let mut block = sample_block();
        let before = block.recompute_hash();
        block.link(7, "abc".into());
        assert_eq!(before, block.recompute_hash());
    }

    #[test]
    fn reward_and_transfer_with_same_fields_hash_differently() {
        let reward = Payload::from(vec![Transaction::reward(5, "Bob", 10)]);
        let transfer = Payload::from(vec![Transaction::new(5, Some(String::new()), "Bob", 10)]);
        assert_ne!(hash_fields(0, "", &reward, 0), hash_fields(0, "", &transfer, 0));
    }

    #[test]
    fn data_and_transactions_payloads_hash_differently() {
        let empty_data = Payload::from("");
        let empty_txs = Payload::default();
        assert_ne!(empty_data.canonical_bytes(), empty_txs.canonical_bytes());
    }

    #[test]
    fn block_hash_bytes_example() {
        let block = Block::new(42, "ab", "xyz");
        let bytes = block.hash_bytes();
        assert_eq!(bytes.len(), 8 + 8 + 2 + 1 + 8 + 3 + 8);
        assert_eq!(&bytes[0..8], &42u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
        assert_eq!(&bytes[16..18], b"ab");
        assert_eq!(bytes[18], 0);
        assert_eq!(&bytes[19..27], &3u64.to_le_bytes());
        assert_eq!(&bytes[27..30], b"xyz");
        assert_eq!(&bytes[30..38], &0u64.to_le_bytes());
    }

    #[test]
    fn rehash_and_consistency_check() {
        let mut block = sample_block();
        assert!(!block.hash_matches_contents());
        block.rehash();
        assert!(block.hash_matches_contents());
        block.set_payload("tampered");
        assert!(!block.hash_matches_contents());
    }

    #[test]
    fn transaction_accessors_example() {
        let tx = Transaction::transfer("Alice", "Bob", 50);
        assert_eq!(tx.from_address(), Some("Alice"));
        assert_eq!(tx.to_address(), "Bob");
        assert_eq!(tx.amount(), 50);
        assert!(!tx.is_reward());
        assert!(tx.timestamp() > 0);

        let reward = Transaction::reward(1, "Miner", 10);
        assert!(reward.is_reward());
        assert_eq!(reward.from_address(), None);
    }

    #[test]
    fn transaction_display_example() {
        let tx = Transaction::new(0, Some("Joe".into()), "Bob", 100);
        assert_eq!(tx.to_string(), "From Joe To Bob: Amount=100");
        let reward = Transaction::reward(0, "Balin", 12);
        assert_eq!(reward.to_string(), "From <reward> To Balin: Amount=12");
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new(1_600_000_000, Some("Alice".into()), "Bob", 10);
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json =
            r#"{"timestamp":1600000000,"from_address":"Alice","to_address":"Bob","amount":10}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn block_serialization_field_order() {
        let block = Block::new(7, "", "hello");
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(
            json,
            r#"{"index":0,"timestamp":7,"previous_hash":"","hash":null,"nonce":0,"payload":{"data":"hello"}}"#
        );
    }

    #[test]
    fn payload_transactions_example() {
        assert!(Payload::from("opaque").transactions().is_empty());
        assert_eq!(Payload::from(sample_txs()).transactions().len(), 2);
        assert_eq!(Payload::default(), Payload::Transactions(vec![]));
    }
}
