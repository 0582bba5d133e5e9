//! JSON export of chains, blocks and ledgers.
//!
//! The `*_to_text` variants never fail: an error is rendered as its message,
//! which is what a console caller prints in place of the document.

use serde::Serialize;

use crate::chain::Chain;
use crate::error::ChainError;
use crate::ledger::Ledger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl ExportOptions {
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T, options: ExportOptions) -> Result<String, ChainError> {
    let json = if options.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

pub fn chain_to_json(chain: &Chain, options: ExportOptions) -> Result<String, ChainError> {
    to_json(chain, options)
}

pub fn block_to_json(chain: &Chain, index: usize, options: ExportOptions) -> Result<String, ChainError> {
    to_json(chain.block(index)?, options)
}

pub fn ledger_to_json(ledger: &Ledger, options: ExportOptions) -> Result<String, ChainError> {
    to_json(ledger, options)
}

fn or_message(result: Result<String, ChainError>) -> String {
    result.unwrap_or_else(|err| err.to_string())
}

pub fn chain_to_text(chain: &Chain, options: ExportOptions) -> String {
    or_message(chain_to_json(chain, options))
}

pub fn block_to_text(chain: &Chain, index: usize, options: ExportOptions) -> String {
    or_message(block_to_json(chain, index, options))
}

pub fn ledger_to_text(ledger: &Ledger, options: ExportOptions) -> String {
    or_message(ledger_to_json(ledger, options))
}
