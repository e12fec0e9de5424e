//! Stake-weighted BFT consensus engine: deterministic proposer selection,
//! block proposal/validation, vote collection, two-thirds-by-stake quorum
//! finality, and equivocation slashing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Keypair as DalekKeypair, Signer};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use crate::block::{compute_tx_root, Block, BlockHeader, ValidatorSignature};
use crate::config::Config;
use crate::keys;
use crate::ledger::{Ledger, ValidatorState};
use crate::ring;
use crate::tx::Transaction;
use crate::{Error, Hash, KeyPair, PublicKey, Result, Signature};

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

/// Deterministic, pure proposer selection for `(height, round)` over
/// `active_validators`, which **must** already be in canonical ascending
/// public-key order.
pub fn select_proposer(active_validators: &[ValidatorState], height: u64, round: u32) -> Result<PublicKey> {
    let total_stake: u64 = active_validators.iter().map(|v| v.staked_amount).sum();
    if total_stake == 0 || active_validators.is_empty() {
        return Err(Error::NoValidators);
    }

    let mut seed_input = Vec::with_capacity(12);
    seed_input.extend_from_slice(&height.to_be_bytes());
    seed_input.extend_from_slice(&round.to_be_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&seed_input);
    let seed = hasher.finalize();

    let mut selection_bytes = [0u8; 8];
    selection_bytes.copy_from_slice(&seed[0..8]);
    let selection = u64::from_be_bytes(selection_bytes) % total_stake;

    let mut cumulative: u64 = 0;
    for validator in active_validators {
        cumulative += validator.staked_amount;
        if cumulative > selection {
            return Ok(validator.public_key);
        }
    }
    // Unreachable because cumulative == total_stake > selection by construction,
    // but avoid panicking on a logic error in production.
    Err(Error::NoValidators)
}

/// Cumulative stake required for finality: `ceil(2 * total_stake / 3)`.
pub fn quorum_threshold(total_stake: u64) -> u64 {
    (2 * total_stake + 2) / 3
}

#[derive(Debug, Clone, Default)]
struct PendingVotes {
    /// votes collected so far, keyed by the block header hash they attest to
    by_block: HashMap<Hash, HashMap<PublicKey, ValidatorSignature>>,
    /// most recent (round, block_hash) a validator has voted for, to detect
    /// equivocation within the same round
    last_vote: HashMap<PublicKey, (u32, Hash)>,
}

struct EngineState {
    round: u32,
    votes: PendingVotes,
}

/// Authenticated staking operations. Both variants must be signed by the
/// validator's long-term spend key.
pub enum StakingTx {
    Bond {
        validator: PublicKey,
        amount: u64,
        signature: Signature,
    },
    Unbond {
        validator: PublicKey,
        signature: Signature,
    },
}

impl StakingTx {
    fn message(&self) -> Vec<u8> {
        match self {
            StakingTx::Bond { validator, amount, .. } => {
                let mut m = b"bond".to_vec();
                m.extend_from_slice(validator.as_ref());
                m.extend_from_slice(&amount.to_be_bytes());
                m
            }
            StakingTx::Unbond { validator, .. } => {
                let mut m = b"unbond".to_vec();
                m.extend_from_slice(validator.as_ref());
                m
            }
        }
    }

    fn validator(&self) -> PublicKey {
        match self {
            StakingTx::Bond { validator, .. } => *validator,
            StakingTx::Unbond { validator, .. } => *validator,
        }
    }

    fn signature(&self) -> &Signature {
        match self {
            StakingTx::Bond { signature, .. } => signature,
            StakingTx::Unbond { signature, .. } => signature,
        }
    }
}

/// The stake-weighted BFT consensus engine. Holds the tunable [`Config`], a
/// shared handle to the ledger it reads validator state from and writes
/// slashing/staking effects to, and its own lock guarding the pending vote
/// map and round counter.
pub struct ConsensusEngine {
    config: Config,
    ledger: Arc<RwLock<Ledger>>,
    local_keypair: Option<KeyPair>,
    state: Mutex<EngineState>,
}

impl ConsensusEngine {
    pub fn new(config: Config, ledger: Arc<RwLock<Ledger>>, local_keypair: Option<KeyPair>) -> Self {
        Self {
            config,
            ledger,
            local_keypair,
            state: Mutex::new(EngineState {
                round: 0,
                votes: PendingVotes::default(),
            }),
        }
    }

    pub fn current_round(&self) -> u32 {
        self.state.lock().round
    }

    /// Builds a candidate block extending `prev_block` with `txs`. Does not
    /// validate or apply `txs`; that happens at validation/apply time.
    pub fn propose_block(&self, txs: Vec<Transaction>, prev_block: &Block) -> Result<Block> {
        let local_pub = self
            .local_keypair
            .as_ref()
            .ok_or(Error::Other("node has no local keypair to propose with"))?
            .public;

        let tx_root = compute_tx_root(&txs);
        let state_root = self.ledger.read().compute_state_root();
        let round = self.state.lock().round;

        let header = BlockHeader {
            height: prev_block.header.height + 1,
            timestamp: now_ts(),
            prev_block_hash: prev_block.header.hash(),
            tx_root,
            state_root,
            proposer: local_pub,
            round,
        };
        Ok(Block {
            header,
            transactions: txs,
            validators: vec![],
        })
    }

    /// Validates `block` as a candidate extending `prev_block`: height,
    /// linkage, timestamp drift, proposer correctness, and every
    /// transaction's ledger-level validity. Does not verify ring-signature
    /// arithmetic beyond the structural [`ring::verify`] check.
    pub fn validate_block(&self, block: &Block, prev_block: &Block) -> Result<()> {
        let expected_height = prev_block.header.height + 1;
        if block.header.height != expected_height {
            return Err(Error::InvalidHeight {
                expected: expected_height,
                got: block.header.height,
            });
        }
        if block.header.prev_block_hash != prev_block.header.hash() {
            return Err(Error::PrevHashMismatch);
        }
        if block.header.timestamp > now_ts() + self.config.max_future_drift_secs {
            return Err(Error::FutureTimestamp);
        }

        let ledger = self.ledger.read();
        let active = ledger.get_active_validators();
        let expected_proposer = select_proposer(&active, block.header.height, block.header.round)?;
        if block.header.proposer != expected_proposer {
            return Err(Error::InvalidProposer {
                expected: expected_proposer,
                got: block.header.proposer,
            });
        }

        for tx in &block.transactions {
            ledger.validate_transaction(tx)?;
            let signature = tx.ring_signature.as_ref().ok_or(Error::MissingRingSignature)?;
            let message = tx.hash();
            if !ring::verify(signature, message.as_ref()) {
                return Err(Error::InvalidRingSignature);
            }
        }
        Ok(())
    }

    /// Signs `block.header.hash()` with the local validator key.
    pub fn vote_for_block(&self, block: &Block) -> Result<ValidatorSignature> {
        let keypair = self
            .local_keypair
            .as_ref()
            .ok_or(Error::Other("node has no local keypair to vote with"))?;
        let secret = keys::as_dalek_secret(&keypair.private)?;
        let public = keys::as_dalek_public(&keypair.public)?;
        let dalek_keypair = DalekKeypair { secret, public };

        let block_hash = block.header.hash();
        let signature = dalek_keypair.sign(block_hash.as_ref());
        let round = self.state.lock().round;
        Ok(ValidatorSignature {
            validator: keypair.public,
            signature: Signature(signature.to_bytes()),
            round,
        })
    }

    /// Records `vote` as attesting to `block_hash`, rejecting unknown or
    /// inactive validators and slashing on equivocation.
    pub fn collect_vote(&self, vote: ValidatorSignature, block_hash: Hash) -> Result<()> {
        {
            let ledger = self.ledger.read();
            let validator = ledger.get_validator(&vote.validator).ok_or(Error::UnknownValidator)?;
            if !validator.active {
                return Err(Error::InactiveValidator);
            }
        }

        let dalek_pub = keys::as_dalek_public(&vote.validator)?;
        let dalek_sig = ed25519_dalek::Signature::from_bytes(&vote.signature.0)
            .map_err(|_| Error::Other("malformed vote signature"))?;
        dalek_pub
            .verify_strict(block_hash.as_ref(), &dalek_sig)
            .map_err(|_| Error::Other("vote signature does not verify"))?;

        let mut state = self.state.lock();
        if let Some((last_round, last_hash)) = state.votes.last_vote.get(&vote.validator).copied() {
            if last_round == vote.round && last_hash != block_hash {
                drop(state);
                self.slash(vote.validator, "double-vote")?;
                return Err(Error::DuplicateVote);
            }
        }

        state.votes.last_vote.insert(vote.validator, (vote.round, block_hash));
        state
            .votes
            .by_block
            .entry(block_hash)
            .or_default()
            .insert(vote.validator, vote);
        Ok(())
    }

    /// Cumulative stake of validators who have voted for `block_hash`.
    pub fn collected_stake(&self, block_hash: &Hash) -> u64 {
        let ledger = self.ledger.read();
        let state = self.state.lock();
        match state.votes.by_block.get(block_hash) {
            None => 0,
            Some(votes) => votes
                .keys()
                .filter_map(|pk| ledger.get_validator(pk))
                .filter(|v| v.active)
                .map(|v| v.staked_amount)
                .sum(),
        }
    }

    /// `true` once collected stake for `block_hash` reaches the two-thirds
    /// quorum of total active stake.
    pub fn has_quorum(&self, block_hash: &Hash) -> bool {
        let total = self.ledger.read().total_active_stake();
        self.collected_stake(block_hash) >= quorum_threshold(total)
    }

    /// Appends collected votes to `block`, verifying quorum, then clears
    /// the pending vote map and advances the round counter.
    pub fn finalize_block(&self, mut block: Block) -> Result<Block> {
        let block_hash = block.header.hash();
        if !self.has_quorum(&block_hash) {
            return Err(Error::QuorumNotReached);
        }

        let mut state = self.state.lock();
        if let Some(votes) = state.votes.by_block.remove(&block_hash) {
            block.validators = votes.into_values().collect();
        }
        state.votes.by_block.clear();
        state.votes.last_vote.clear();
        state.round += 1;
        Ok(block)
    }

    /// Reduces a validator's stake by the configured slash fraction,
    /// increments its slash counter, and deactivates it once the
    /// configured slash threshold is reached.
    pub fn slash(&self, validator: PublicKey, _reason: &'static str) -> Result<()> {
        let pct = self.config.slash_fraction_pct;
        let max_slashes = self.config.max_slashes;
        self.ledger.write().update_validator(&validator, |v| {
            let penalty = v.staked_amount.saturating_mul(pct) / 100;
            v.staked_amount = v.staked_amount.saturating_sub(penalty);
            v.slash_count += 1;
            if v.slash_count >= max_slashes {
                v.active = false;
            }
        })
    }

    /// Authenticates and applies a [`StakingTx`]: `Bond` registers a new
    /// validator, `Unbond` marks one inactive with an unbonding deadline.
    pub fn apply_staking_tx(&self, tx: StakingTx, current_height: u64) -> Result<()> {
        let validator = tx.validator();
        let dalek_pub = keys::as_dalek_public(&validator)?;
        let dalek_sig = ed25519_dalek::Signature::from_bytes(&tx.signature().0)
            .map_err(|_| Error::Other("malformed staking signature"))?;
        dalek_pub
            .verify_strict(&tx.message(), &dalek_sig)
            .map_err(|_| Error::Other("staking transaction signature does not verify"))?;

        match tx {
            StakingTx::Bond { validator, amount, .. } => {
                self.ledger.write().add_validator(validator, amount, current_height)
            }
            StakingTx::Unbond { validator, .. } => {
                let unbonding_period = self.config.unbonding_period;
                self.ledger.write().update_validator(&validator, |v| {
                    v.active = false;
                    v.unbonding_until = current_height + unbonding_period;
                })
            }
        }
    }
}
