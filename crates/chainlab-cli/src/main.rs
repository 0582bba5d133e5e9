use anyhow::Result;
use chainlab_core::constants::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use chainlab_core::export::{self, ExportOptions};
use chainlab_core::{
    pow, Access, Amount, Block, Chain, ChainConfig, Ledger, Transaction, ValidationMode,
};
use clap::{Parser, Subcommand};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "chainlab")]
#[command(about = "Walk through hash chaining, proof of work and tampering on a single node")]
struct Cli {
    /// Print JSON on one line instead of indented
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pending pool, miner rewards and balances with two miners
    Ledger {
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        #[arg(long, default_value_t = DEFAULT_MINING_REWARD)]
        reward: Amount,
    },
    /// Tamper with a stored block and watch validation react
    Tamper {
        #[arg(long, default_value_t = 0)]
        difficulty: u32,
    },
    /// Time appending blocks with and without proof of work
    Timing {
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
        #[arg(long, default_value_t = 3)]
        blocks: usize,
    },
    /// Print one block of a small demo chain
    Block {
        #[arg(long)]
        index: usize,
        #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
        difficulty: u32,
    },
}

const DEMO_DATA: [&str; 3] = [
    "{sender:Jeff,receiver:Walter,amount:10}",
    "{sender:Walter,receiver:Jeff,amount:5}",
    "{sender:Walter,receiver:Jeff,amount:5}",
];

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = if cli.compact {
        ExportOptions::compact()
    } else {
        ExportOptions::default()
    };
    match cli.cmd {
        Command::Ledger { difficulty, reward } => run_ledger(difficulty, reward, options),
        Command::Tamper { difficulty } => run_tamper(difficulty, options),
        Command::Timing { difficulty, blocks } => run_timing(difficulty, blocks),
        Command::Block { index, difficulty } => {
            let chain = demo_chain(ChainConfig::default().with_difficulty(difficulty))?;
            println!("{}", export::block_to_text(&chain, index, options));
            Ok(())
        }
    }
}

fn demo_chain(config: ChainConfig) -> Result<Chain> {
    let mut chain = Chain::new(config)?;
    for data in DEMO_DATA {
        chain.append(data)?;
    }
    Ok(chain)
}

fn print_balances(ledger: &Ledger, addresses: &[&str]) {
    for address in addresses {
        println!("{address}'s balance is: {}", ledger.balance(address));
    }
    println!();
}

fn run_ledger(difficulty: u32, reward: Amount, options: ExportOptions) -> Result<()> {
    let pool: Vec<Transaction> = [
        ("Joe", "Bob", 100),
        ("Joe", "Mike", 200),
        ("Jim", "Joe", 300),
        ("Bob", "Nick", 100),
        ("Balin", "Dualin", 2),
        ("Jack", "Bob", 400),
        ("Mary", "Jack", 200),
    ]
    .into_iter()
    .map(|(from, to, amount)| Transaction::transfer(from, to, amount))
    .collect();
    let miners = ["Balin", "Dualin"];

    let mut ledger = Ledger::new(ChainConfig::new(difficulty, reward))?;
    println!("{}", export::chain_to_text(ledger.chain(), options));
    print_balances(&ledger, &miners);

    for tx in &pool[..2] {
        ledger.add_pending_transaction(tx.clone());
    }
    println!("Mining block...");
    println!("{}", ledger.process_pending_transactions("Balin")?);
    for tx in &pool[2..] {
        ledger.add_pending_transaction(tx.clone());
    }
    println!("{}", export::ledger_to_text(&ledger, options));
    println!("{}", ledger.validate(ValidationMode::Full).message());
    print_balances(&ledger, &miners);

    println!("Mining block...");
    println!("{}", ledger.process_pending_transactions("Dualin")?);
    println!("{}", export::chain_to_text(ledger.chain(), options));
    println!("{}", ledger.validate(ValidationMode::Full).message());
    print_balances(&ledger, &miners);

    for (address, balance) in ledger.balances() {
        println!("{address:>8}: {balance}");
    }
    Ok(())
}

fn report(chain: &Chain) {
    for mode in [ValidationMode::LinkageOnly, ValidationMode::Full] {
        println!("  {mode:?}: {}", chain.validate(mode).message());
    }
    println!();
}

fn run_tamper(difficulty: u32, options: ExportOptions) -> Result<()> {
    let mut chain = demo_chain(
        ChainConfig::default()
            .with_difficulty(difficulty)
            .with_access(Access::Open),
    )?;
    println!("No tampering.");
    report(&chain);

    println!("Attacker picks block.");
    println!("{}", export::block_to_text(&chain, 1, options));
    println!("Attacker tampers data of a block.");
    chain
        .block_mut(1)?
        .set_payload("{sender:Jeff,receiver:Wallter,amount:1000}");
    println!("{}", export::block_to_text(&chain, 1, options));
    report(&chain);

    println!("Attacker recalculates hash of the block.");
    reseal(chain.block_mut(1)?, difficulty)?;
    println!("{}", export::block_to_text(&chain, 1, options));
    report(&chain);

    println!("Attacker updates entire chain.");
    for index in 2..chain.len() {
        let previous = chain.blocks()[index - 1]
            .hash()
            .unwrap_or_default()
            .to_owned();
        let block = chain.block_mut(index)?;
        block.set_previous_hash(previous);
        reseal(block, difficulty)?;
    }
    println!("{}", export::chain_to_text(&chain, options));
    report(&chain);

    println!("This only passes on one node. Rewriting every copy held by other nodes is what proof of work makes expensive.");
    Ok(())
}

/// Recompute a tampered block's hash, re-mining when the chain demands work.
fn reseal(block: &mut Block, difficulty: u32) -> Result<()> {
    if difficulty == 0 {
        block.rehash();
    } else {
        let stats = pow::mine(block, difficulty)?;
        info!(nonce = stats.nonce, attempts = stats.attempts, "block re-mined");
    }
    Ok(())
}

fn run_timing(difficulty: u32, blocks: usize) -> Result<()> {
    for difficulty in [0, difficulty] {
        let started = Instant::now();
        let mut chain = Chain::new(ChainConfig::default().with_difficulty(difficulty))?;
        for data in DEMO_DATA.iter().cycle().take(blocks) {
            chain.append(*data)?;
        }
        println!(
            "difficulty {difficulty}: {} blocks in {:?} ({})",
            chain.len(),
            started.elapsed(),
            chain.validate(ValidationMode::Full).message()
        );
    }
    Ok(())
}
