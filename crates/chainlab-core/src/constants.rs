pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const LEADING_CHAR: char = '0';
pub const GENESIS_PREVIOUS_HASH: &str = "";
pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const DEFAULT_MINING_REWARD: i64 = 10;
/// How many nonces the cancellable search tries between stop-flag polls.
pub const STOP_POLL_INTERVAL: u64 = 1024;
