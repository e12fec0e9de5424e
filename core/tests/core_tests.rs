//! End-to-end integration tests exercising the full propose/validate/vote/
//! finalize/persist pipeline across the ledger, consensus engine, and
//! durable store working together.

use std::sync::Arc;

use ed25519_dalek::{Keypair as DalekKeypair, Signer};
use parking_lot::RwLock;

use obscura_core::{
    block::{compute_tx_root, Block, BlockHeader},
    config::Config,
    consensus::{quorum_threshold, ConsensusEngine, StakingTx},
    keys, ring,
    store::Store,
    tx::{Transaction, TxInput, TxOutput},
    Address, Error, Hash, KeyPair, Ledger, PublicKey, Signature,
};

struct Validator {
    keypair: KeyPair,
    stake: u64,
}

fn fresh_validator(stake: u64) -> Validator {
    // Reuse the wallet key generator for a throwaway Ed25519 identity rather
    // than going through `ed25519_dalek::Keypair::generate` directly, which
    // pins an older `rand_core` than the rest of this crate uses.
    let wallet = keys::generate_wallet_keys();
    Validator {
        keypair: wallet.spend,
        stake,
    }
}

fn dalek_keypair_of(kp: &KeyPair) -> DalekKeypair {
    DalekKeypair {
        secret: keys::as_dalek_secret(&kp.private).unwrap(),
        public: keys::as_dalek_public(&kp.public).unwrap(),
    }
}

fn bond_signature(kp: &KeyPair, amount: u64) -> Signature {
    let mut message = b"bond".to_vec();
    message.extend_from_slice(kp.public.as_ref());
    message.extend_from_slice(&amount.to_be_bytes());
    Signature(dalek_keypair_of(kp).sign(&message).to_bytes())
}

fn unbond_signature(kp: &KeyPair) -> Signature {
    let mut message = b"unbond".to_vec();
    message.extend_from_slice(kp.public.as_ref());
    Signature(dalek_keypair_of(kp).sign(&message).to_bytes())
}

fn genesis_block() -> Block {
    Block {
        header: BlockHeader {
            height: 0,
            timestamp: 0,
            prev_block_hash: Hash([0u8; 32]),
            tx_root: compute_tx_root(&[]),
            state_root: Hash([0u8; 32]),
            proposer: PublicKey([0u8; 32]),
            round: 0,
        },
        transactions: vec![],
        validators: vec![],
    }
}

fn signed_transfer(from_key_image: PublicKey, recipient: &Address, amount: u64) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        inputs: vec![TxInput {
            key_image: from_key_image,
            amount,
        }],
        outputs: vec![TxOutput {
            amount,
            stealth_addr: *recipient,
            tx_public_key: PublicKey([77u8; 32]),
        }],
        fee: 0,
        ring_signature: None,
        range_proofs: vec![],
    };
    let sig = ring::sign(
        &[5u8; 32],
        &PublicKey([1u8; 32]),
        &[PublicKey([2u8; 32]), PublicKey([3u8; 32])],
        b"integration-test-transfer",
    )
    .unwrap();
    tx.ring_signature = Some(sig);
    tx
}

/// Three bonded validators with 50/30/20 stake, proposer selection succeeds
/// deterministically for the chosen proposer, and the block reaches quorum
/// once two of the three vote.
#[test]
fn three_validators_propose_vote_and_finalize() {
    let ledger = Arc::new(RwLock::new(Ledger::new()));
    let v1 = fresh_validator(50);
    let v2 = fresh_validator(30);
    let v3 = fresh_validator(20);
    for v in [&v1, &v2, &v3] {
        ledger.write().add_validator(v.keypair.public, v.stake, 0).unwrap();
    }
    assert_eq!(ledger.read().total_active_stake(), 100);
    assert_eq!(quorum_threshold(ledger.read().total_active_stake()), 67);

    let proposer_engine = ConsensusEngine::new(Config::default(), ledger.clone(), Some(v1.keypair));
    let prev = genesis_block();

    let block = proposer_engine.propose_block(vec![], &prev).unwrap();
    assert_eq!(block.header.height, 1);
    proposer_engine.validate_block(&block, &prev).unwrap();

    let block_hash = block.header.hash();
    let vote1 = proposer_engine.vote_for_block(&block).unwrap();
    proposer_engine.collect_vote(vote1, block_hash).unwrap();
    assert!(!proposer_engine.has_quorum(&block_hash), "50/100 stake is not yet quorum");

    let v2_engine = ConsensusEngine::new(Config::default(), ledger.clone(), Some(v2.keypair));
    let vote2 = v2_engine.vote_for_block(&block).unwrap();
    proposer_engine.collect_vote(vote2, block_hash).unwrap();
    assert!(proposer_engine.has_quorum(&block_hash), "50+30=80 stake clears the 67 threshold");

    let finalized = proposer_engine.finalize_block(block).unwrap();
    assert_eq!(finalized.validators.len(), 2);

    ledger.write().apply_block(&finalized).unwrap();
    assert_eq!(ledger.read().height, 1);
}

/// A validator who signs two different blocks at the same round is slashed
/// and loses its vote; the penalty compounds across repeated offenses until
/// the validator is deactivated.
#[test]
fn equivocating_validator_is_slashed_and_eventually_deactivated() {
    let ledger = Arc::new(RwLock::new(Ledger::new()));
    let culprit = fresh_validator(100);
    ledger.write().add_validator(culprit.keypair.public, 100, 0).unwrap();

    let cfg = Config {
        slash_fraction_pct: 50,
        max_slashes: 2,
        ..Config::default()
    };
    let engine = ConsensusEngine::new(cfg, ledger.clone(), Some(culprit.keypair));
    let prev = genesis_block();

    let block_a = engine.propose_block(vec![], &prev).unwrap();
    let mut block_b = block_a.clone();
    block_b.header.state_root = Hash([9u8; 32]); // distinct header, same round

    let vote_a = engine.vote_for_block(&block_a).unwrap();
    engine.collect_vote(vote_a, block_a.header.hash()).unwrap();

    let vote_b = engine.vote_for_block(&block_b).unwrap();
    let err = engine.collect_vote(vote_b, block_b.header.hash()).unwrap_err();
    assert_eq!(err, Error::DuplicateVote);

    let v = ledger.read().get_validator(&culprit.keypair.public).unwrap().clone();
    assert_eq!(v.staked_amount, 50);
    assert_eq!(v.slash_count, 1);
    assert!(v.active);

    // a second offense pushes slash_count to the configured threshold
    engine.slash(culprit.keypair.public, "double-vote").unwrap();
    let v = ledger.read().get_validator(&culprit.keypair.public).unwrap().clone();
    assert_eq!(v.slash_count, 2);
    assert!(!v.active, "validator deactivates once max_slashes is reached");
}

/// `Bond` registers a new validator only once its signature has been
/// authenticated, and `Unbond` marks it inactive with an unbonding deadline.
#[test]
fn staking_tx_bond_then_unbond() {
    let ledger = Arc::new(RwLock::new(Ledger::new()));
    let engine = ConsensusEngine::new(Config::default(), ledger.clone(), None);
    let newcomer = fresh_validator(10);

    let bond = StakingTx::Bond {
        validator: newcomer.keypair.public,
        amount: 10,
        signature: bond_signature(&newcomer.keypair, 10),
    };
    engine.apply_staking_tx(bond, 5).unwrap();
    assert_eq!(ledger.read().get_validator(&newcomer.keypair.public).unwrap().staked_amount, 10);

    let unbond = StakingTx::Unbond {
        validator: newcomer.keypair.public,
        signature: unbond_signature(&newcomer.keypair),
    };
    engine.apply_staking_tx(unbond, 50).unwrap();
    let v = ledger.read().get_validator(&newcomer.keypair.public).unwrap().clone();
    assert!(!v.active);
    assert_eq!(v.unbonding_until, 50 + Config::default().unbonding_period);
}

/// A double-spend attempt within the same block rolls back the whole block;
/// the ledger's height and UTXO set are left exactly as before.
#[test]
fn double_spend_within_block_rolls_back_entirely() {
    let mut ledger = Ledger::new();
    let recipient = Address {
        view_key: PublicKey([10u8; 32]),
        spend_key: PublicKey([11u8; 32]),
    };
    let key_image = PublicKey([1u8; 32]);
    let tx1 = signed_transfer(key_image, &recipient, 10);
    let tx2 = signed_transfer(key_image, &recipient, 10);

    let block = Block {
        header: BlockHeader {
            height: 1,
            timestamp: 0,
            prev_block_hash: Hash([0u8; 32]),
            tx_root: compute_tx_root(&[tx1.clone(), tx2.clone()]),
            state_root: Hash([0u8; 32]),
            proposer: PublicKey([0u8; 32]),
            round: 0,
        },
        transactions: vec![tx1, tx2],
        validators: vec![],
    };

    let err = ledger.apply_block(&block).unwrap_err();
    assert_eq!(err, Error::DoubleSpend);
    assert_eq!(ledger.height, 0);
    assert!(ledger.utxos.is_empty());
}

/// Persisted blocks and the latest-height marker survive a fresh `Store`
/// handle reopening the same backing database (simulating a process
/// restart and recovery).
#[test]
fn recovery_reopens_store_and_recovers_tip() {
    let dir = tempfile::tempdir().unwrap();
    let genesis = genesis_block();

    {
        let store = Store::open(dir.path()).unwrap();
        store.save_block(&genesis).unwrap();
        store.set_latest_height(0).unwrap();

        let mut header = genesis.header.clone();
        header.height = 1;
        header.prev_block_hash = genesis.header.hash();
        let block1 = Block {
            header,
            transactions: vec![],
            validators: vec![],
        };
        store.save_block(&block1).unwrap();
        store.set_latest_height(1).unwrap();
    }

    // Reopen as a fresh handle, as a restarted process would.
    let reopened = Store::open(dir.path()).unwrap();
    assert_eq!(reopened.latest_height().unwrap(), 1);
    assert_eq!(reopened.get_block(0).unwrap(), genesis);
    assert_eq!(reopened.get_block(1).unwrap().header.height, 1);
}

/// Wallet keys can recognize an output addressed to them and recover its
/// spend key, but a different wallet's keys cannot.
#[test]
fn stealth_output_scanning_is_wallet_specific() {
    let wallet = keys::generate_wallet_keys();
    let bystander = keys::generate_wallet_keys();
    let (output, _ephemeral) = keys::generate_stealth_output(&wallet.address());

    let (owns_it, _) = keys::scan_output(&wallet, &output);
    assert!(owns_it);
    assert!(keys::derive_spend_key(&wallet, &output).is_ok());

    let (bystander_owns_it, _) = keys::scan_output(&bystander, &output);
    assert!(!bystander_owns_it);
    assert!(keys::derive_spend_key(&bystander, &output).is_err());
}
