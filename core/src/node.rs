//! Node orchestrator: wires the ledger, consensus engine, and persistence
//! store together, dispatches inbound gossip messages, and runs the
//! proposer ticker.
//!
//! Networking, peer discovery, and argument parsing are out of scope for
//! this crate; the gossip overlay is consumed purely through the
//! [`GossipOracle`] trait, which `obscura-network` is expected to implement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::block::{Block, ValidatorSignature};
use crate::consensus::ConsensusEngine;
use crate::ledger::Ledger;
use crate::store::Store;
use crate::tx::Transaction;
use crate::{Error, Hash, Result};

/// The three gossip topics the core consumes/produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Block,
    Transaction,
    Vote,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Block => "block",
            Topic::Transaction => "transaction",
            Topic::Vote => "vote",
        }
    }
}

/// The outbound half of the consumed gossip interface: the core hands
/// encoded payloads to a `GossipOracle` for broadcast and trusts it to
/// deliver them at-least-once to honest connected peers.
pub trait GossipOracle: Send + Sync {
    fn broadcast(&self, topic: Topic, payload: Vec<u8>);
}

/// A vote payload as carried over the wire: a validator's signature plus
/// the header hash it attests to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteMessage {
    pub vote: ValidatorSignature,
    pub block_hash: Hash,
}

/// The decoded form of the wire envelope `{ "type": ..., "data": ... }`.
#[derive(Debug, Clone)]
pub enum WireMessage {
    Block(Block),
    Transaction(Transaction),
    Vote(VoteMessage),
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let (kind, data) = match self {
            WireMessage::Block(block) => ("block", serde_json::to_value(block)?),
            WireMessage::Transaction(tx) => ("transaction", serde_json::to_value(tx)?),
            WireMessage::Vote(vote) => ("vote", serde_json::to_value(vote)?),
        };
        let envelope = serde_json::json!({ "type": kind, "data": data });
        Ok(serde_json::to_vec(&envelope)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Serialization("envelope missing 'type'".into()))?;
        let data = value
            .get("data")
            .cloned()
            .ok_or_else(|| Error::Serialization("envelope missing 'data'".into()))?;
        match kind {
            "block" => Ok(WireMessage::Block(serde_json::from_value(data)?)),
            "transaction" => Ok(WireMessage::Transaction(serde_json::from_value(data)?)),
            "vote" => Ok(WireMessage::Vote(serde_json::from_value(data)?)),
            other => Err(Error::Serialization(format!("unknown envelope type '{other}'"))),
        }
    }
}

/// Owns the ledger, consensus engine, persistence store, and pending
/// transaction pool, and dispatches inbound gossip into them.
///
/// The pending pool is guarded by its own mutex, independent of the
/// ledger's lock, so a slow proposer tick never blocks inbound gossip
/// handling or vice versa.
pub struct Node {
    ledger: Arc<RwLock<Ledger>>,
    consensus: Arc<ConsensusEngine>,
    store: Arc<Store>,
    oracle: Arc<dyn GossipOracle>,
    pending_txs: Mutex<Vec<Transaction>>,
    chain_head: Mutex<Block>,
    shutdown: Arc<AtomicBool>,
    block_time: Duration,
}

impl Node {
    pub fn new(
        ledger: Arc<RwLock<Ledger>>,
        consensus: Arc<ConsensusEngine>,
        store: Arc<Store>,
        oracle: Arc<dyn GossipOracle>,
        genesis_block: Block,
        block_time: Duration,
    ) -> Self {
        Self {
            ledger,
            consensus,
            store,
            oracle,
            pending_txs: Mutex::new(Vec::new()),
            chain_head: Mutex::new(genesis_block),
            shutdown: Arc::new(AtomicBool::new(false)),
            block_time,
        }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn chain_head(&self) -> Block {
        self.chain_head.lock().clone()
    }

    /// Validates `tx` against current ledger state and, if valid, adds it
    /// to the pending pool and broadcasts it. Does not apply it — only a
    /// finalized block does that.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.ledger.read().validate_transaction(&tx)?;
        let encoded = WireMessage::Transaction(tx.clone()).encode()?;
        self.pending_txs.lock().push(tx);
        self.oracle.broadcast(Topic::Transaction, encoded);
        Ok(())
    }

    /// Entry point for every inbound gossip message. Validation/consensus
    /// errors are logged and the message is dropped; persistence write
    /// errors propagate, since the caller must refuse to advance the chain
    /// tip on a disk failure.
    pub fn handle_message(&self, topic: Topic, payload: &[u8]) -> Result<()> {
        let message = match WireMessage::decode(payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(topic = topic.as_str(), error = %e, "dropping malformed gossip payload");
                return Ok(());
            }
        };

        let outcome = match message {
            WireMessage::Block(block) => self.handle_inbound_block(block),
            WireMessage::Transaction(tx) => match self.ledger.read().validate_transaction(&tx) {
                Ok(()) => {
                    self.pending_txs.lock().push(tx);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            WireMessage::Vote(vote_msg) => self.handle_inbound_vote(vote_msg),
        };

        if let Err(e) = &outcome {
            if matches!(e, Error::PersistenceWrite(_)) {
                return outcome;
            }
            tracing::warn!(topic = topic.as_str(), error = %e, "dropping gossip message");
        }
        Ok(())
    }

    fn handle_inbound_block(&self, block: Block) -> Result<()> {
        let prev = self.chain_head();
        self.consensus.validate_block(&block, &prev)?;

        let block_hash = block.header.hash();
        let vote = self.consensus.vote_for_block(&block)?;
        self.consensus.collect_vote(vote.clone(), block_hash)?;

        let encoded = WireMessage::Vote(VoteMessage {
            vote,
            block_hash,
        })
        .encode()?;
        self.oracle.broadcast(Topic::Vote, encoded);

        if self.consensus.has_quorum(&block_hash) {
            self.finalize_and_apply(block)?;
        }
        Ok(())
    }

    fn handle_inbound_vote(&self, msg: VoteMessage) -> Result<()> {
        self.consensus.collect_vote(msg.vote, msg.block_hash)?;
        Ok(())
    }

    fn finalize_and_apply(&self, block: Block) -> Result<()> {
        let finalized = self.consensus.finalize_block(block)?;
        self.apply_and_persist_block(finalized)
    }

    /// Applies a finalized block to the ledger, then persists it. A
    /// persistence write failure is fatal to this operation: the ledger
    /// has already advanced in memory but the tip metadata on disk is not
    /// updated, so the node must halt rather than broadcast further blocks.
    fn apply_and_persist_block(&self, block: Block) -> Result<()> {
        {
            let mut ledger = self.ledger.write();
            ledger.apply_block(&block)?;
        }
        self.store.save_block(&block)?;
        self.store.set_latest_height(block.header.height)?;
        *self.chain_head.lock() = block.clone();
        tracing::info!(height = block.header.height, "applied and persisted block");
        Ok(())
    }

    /// Proposes, broadcasts, and self-votes for a new block if the local
    /// node is the selected proposer for the next (height, round). Spawned
    /// on its own thread by [`Node::spawn_proposer_ticker`].
    fn tick_proposer(&self) {
        let prev = self.chain_head();
        let candidate_txs: Vec<Transaction> = {
            let mut pool = self.pending_txs.lock();
            std::mem::take(&mut *pool)
        };

        let block = match self.consensus.propose_block(candidate_txs.clone(), &prev) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(error = %e, "not proposing this round");
                self.requeue_still_valid(candidate_txs);
                return;
            }
        };

        match self.handle_inbound_block(block.clone()) {
            Ok(()) => match WireMessage::Block(block).encode() {
                Ok(payload) => self.oracle.broadcast(Topic::Block, payload),
                Err(e) => tracing::error!(error = %e, "failed to encode proposed block"),
            },
            Err(e) => {
                tracing::warn!(error = %e, "locally proposed block failed validation");
                self.requeue_still_valid(candidate_txs);
            }
        }
    }

    /// Re-queues only the transactions that still validate against current
    /// ledger state, so a single invalid transaction can't wedge block
    /// production by being re-proposed forever.
    fn requeue_still_valid(&self, candidate_txs: Vec<Transaction>) {
        let ledger = self.ledger.read();
        let mut still_valid = Vec::with_capacity(candidate_txs.len());
        for tx in candidate_txs {
            if ledger.validate_transaction(&tx).is_ok() {
                still_valid.push(tx);
            } else {
                tracing::warn!("dropping pooled transaction that no longer validates");
            }
        }
        drop(ledger);
        self.pending_txs.lock().extend(still_valid);
    }

    /// Runs the block-time proposer ticker until the shutdown flag is set.
    /// Intended to be spawned on its own thread by the out-of-scope process
    /// entry point.
    pub fn run_proposer_ticker(self: &Arc<Self>) {
        while !self.shutdown.load(Ordering::SeqCst) {
            thread::sleep(self.block_time);
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.tick_proposer();
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn pending_tx_count(&self) -> usize {
        self.pending_txs.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{compute_tx_root, BlockHeader};
    use crate::config::Config;
    use crate::PublicKey;
    use std::sync::Mutex as StdMutex;

    struct RecordingOracle {
        sent: StdMutex<Vec<(Topic, Vec<u8>)>>,
    }

    impl GossipOracle for RecordingOracle {
        fn broadcast(&self, topic: Topic, payload: Vec<u8>) {
            self.sent.lock().unwrap().push((topic, payload));
        }
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

    #[test]
    fn wire_message_round_trips() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            fee: 0,
            ring_signature: None,
            range_proofs: vec![],
        };
        let encoded = WireMessage::Transaction(tx.clone()).encode().unwrap();
        let decoded = WireMessage::decode(&encoded).unwrap();
        match decoded {
            WireMessage::Transaction(back) => assert_eq!(back, tx),
            _ => panic!("expected transaction variant"),
        }
    }

    #[test]
    fn malformed_payload_is_dropped_not_propagated() {
        let ledger = Arc::new(RwLock::new(Ledger::new()));
        let consensus = Arc::new(ConsensusEngine::new(Config::default(), ledger.clone(), None));
        let store = Arc::new(Store::open_temporary().unwrap());
        let oracle = Arc::new(RecordingOracle { sent: StdMutex::new(vec![]) });
        let node = Node::new(ledger, consensus, store, oracle, genesis_block(), Duration::from_secs(2));

        let result = node.handle_message(Topic::Transaction, b"not json");
        assert!(result.is_ok());
    }

    /// A gossiped transaction that fails ledger validation must be dropped,
    /// not pooled — otherwise it poisons every subsequent proposal attempt.
    #[test]
    fn invalid_gossiped_transaction_is_not_pooled() {
        let ledger = Arc::new(RwLock::new(Ledger::new()));
        let consensus = Arc::new(ConsensusEngine::new(Config::default(), ledger.clone(), None));
        let store = Arc::new(Store::open_temporary().unwrap());
        let oracle = Arc::new(RecordingOracle { sent: StdMutex::new(vec![]) });
        let node = Node::new(ledger, consensus, store, oracle, genesis_block(), Duration::from_secs(2));

        let unsigned_tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            fee: 0,
            ring_signature: None, // fails validate_transaction: MissingRingSignature
            range_proofs: vec![],
        };
        let encoded = WireMessage::Transaction(unsigned_tx).encode().unwrap();

        let result = node.handle_message(Topic::Transaction, &encoded);
        assert!(result.is_ok(), "invalid tx is dropped, not propagated as an error");
        assert_eq!(node.pending_tx_count(), 0, "invalid tx must not enter the pending pool");
    }
}
