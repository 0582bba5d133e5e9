use chainlab_core::{
    pow, Access, Block, Chain, ChainConfig, ChainError, Failure, Payload, ValidationMode,
};

fn demo_chain(difficulty: u32) -> anyhow::Result<Chain> {
    let mut chain = Chain::new(
        ChainConfig::default()
            .with_difficulty(difficulty)
            .with_access(Access::Open),
    )?;
    chain.append("{sender:Jeff,receiver:Walter,amount:10}")?;
    chain.append("{sender:Walter,receiver:Jeff,amount:5}")?;
    chain.append("{sender:Walter,receiver:Jeff,amount:5}")?;
    Ok(chain)
}

fn hash_of(chain: &Chain, index: usize) -> String {
    chain.blocks()[index].hash().unwrap_or_default().to_owned()
}

#[test]
fn tamper_walkthrough_without_work() -> anyhow::Result<()> {
    let mut chain = demo_chain(0)?;
    assert!(chain.validate(ValidationMode::Full).is_valid());

    // attacker edits the data of block 1
    chain
        .block_mut(1)?
        .set_payload("{sender:Jeff,receiver:Wallter,amount:1000}");
    let report = chain.validate(ValidationMode::Full);
    assert_eq!(report.failed_at(), Some(1));
    assert_eq!(report.failure(), Some(&Failure::ContentMismatch));
    // linkage alone is blind to it
    assert!(chain.validate(ValidationMode::LinkageOnly).is_valid());

    // attacker recomputes block 1's hash only
    chain.block_mut(1)?.rehash();
    for mode in [ValidationMode::Full, ValidationMode::LinkageOnly] {
        let report = chain.validate(mode);
        assert_eq!(report.failed_at(), Some(2));
        assert_eq!(report.failure(), Some(&Failure::BrokenLink));
    }

    // attacker propagates through the rest of the chain
    for index in 2..chain.len() {
        let previous = hash_of(&chain, index - 1);
        let block = chain.block_mut(index)?;
        block.set_previous_hash(previous);
        block.rehash();
    }
    let report = chain.validate(ValidationMode::Full);
    assert!(report.is_valid(), "{}", report.message());
    assert_eq!(
        chain.blocks()[1].payload(),
        &Payload::from("{sender:Jeff,receiver:Wallter,amount:1000}")
    );
    Ok(())
}

#[test]
fn tamper_walkthrough_with_work_needs_remining() -> anyhow::Result<()> {
    let difficulty = 2;
    let mut chain = demo_chain(difficulty)?;
    chain.block_mut(1)?.set_payload("forged");

    // re-mining block 1 repairs its own contents but not the link after it
    pow::mine(chain.block_mut(1)?, difficulty)?;
    let report = chain.validate(ValidationMode::Full);
    assert_eq!(report.failed_at(), Some(2));
    assert_eq!(report.failure(), Some(&Failure::BrokenLink));

    for index in 2..chain.len() {
        let previous = hash_of(&chain, index - 1);
        let block = chain.block_mut(index)?;
        block.set_previous_hash(previous);
        pow::mine(block, difficulty)?;
    }
    assert!(chain.validate(ValidationMode::Full).is_valid());
    assert!(chain
        .blocks()
        .iter()
        .all(|b| pow::meets_difficulty(b.hash().unwrap_or_default(), difficulty)));
    Ok(())
}

#[test]
fn sealed_chain_has_no_tamper_path() -> anyhow::Result<()> {
    let mut chain = Chain::new(ChainConfig::default().with_difficulty(1))?;
    chain.append("data")?;
    for index in 0..chain.len() {
        assert!(matches!(chain.block_mut(index), Err(ChainError::Sealed)));
    }
    // a copy can be edited freely, the stored block is untouched
    let mut copy = chain.blocks()[1].clone();
    copy.set_payload("forged");
    assert!(chain.is_valid());
    assert_ne!(&copy, &chain.blocks()[1]);
    Ok(())
}

#[test]
fn every_field_edit_is_caught_by_full_validation() -> anyhow::Result<()> {
    let edits: [(&str, fn(&mut Block)); 3] = [
        ("payload", |b| b.set_payload("{sender:Jeff,receiver:Eve,amount:1000}")),
        ("timestamp", |b| {
            let timestamp = b.timestamp();
            b.set_timestamp(timestamp.wrapping_sub(1))
        }),
        ("nonce", |b| {
            let nonce = b.nonce();
            b.set_nonce(nonce.wrapping_add(1))
        }),
    ];
    for (field, edit) in edits {
        let mut chain = demo_chain(1)?;
        edit(chain.block_mut(2)?);
        let report = chain.validate(ValidationMode::Full);
        assert_eq!(report.failed_at(), Some(2), "{field}");
        assert_eq!(report.failure(), Some(&Failure::ContentMismatch), "{field}");
        assert!(chain.validate(ValidationMode::LinkageOnly).is_valid(), "{field}");
    }
    Ok(())
}

#[test]
fn relinked_genesis_fails_full_validation() -> anyhow::Result<()> {
    let mut chain = demo_chain(0)?;
    chain.block_mut(0)?.set_previous_hash("deadbeef");
    chain.block_mut(0)?.rehash();
    for index in 1..chain.len() {
        let previous = hash_of(&chain, index - 1);
        let block = chain.block_mut(index)?;
        block.set_previous_hash(previous);
        block.rehash();
    }
    assert!(chain.validate(ValidationMode::LinkageOnly).is_valid());
    let report = chain.validate(ValidationMode::Full);
    assert_eq!(report.failed_at(), Some(0));
    assert_eq!(report.failure(), Some(&Failure::BadGenesis));
    Ok(())
}
