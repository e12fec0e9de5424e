//! Transaction model: inputs, outputs, and the top-level [`Transaction`]
//! record plus its deterministic hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ring::RingSignature;
use crate::{Address, Hash, PublicKey};

/// Base64 (de)serialization for the opaque byte-string fields the wire
/// format requires to be base64-encoded rather than a raw JSON number
/// array.
mod base64_bytes_seq {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(values: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: Vec<String> = values.iter().map(|v| STANDARD.encode(v)).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// A reference to a consumed output, named by key image rather than by
/// `(tx_hash, output_index)` so the real output stays hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub key_image: PublicKey,
    pub amount: u64,
}

/// A newly created spendable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub stealth_addr: Address,
    pub tx_public_key: PublicKey,
}

/// A transfer of value: destroys the outputs named by `inputs`' key images
/// and creates `outputs`. `range_proofs` is reserved for a future amount
/// confidentiality phase and is otherwise unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    pub ring_signature: Option<RingSignature>,
    #[serde(default, with = "base64_bytes_seq")]
    pub range_proofs: Vec<Vec<u8>>,
}

impl Transaction {
    /// SHA-256 over every input's key image followed by every output's
    /// `(view_key ∥ spend_key)`, in order. Depends only on that ordered
    /// sequence — reordering outputs changes the hash.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        for input in &self.inputs {
            hasher.update(input.key_image.as_ref());
        }
        for output in &self.outputs {
            hasher.update(output.stealth_addr.view_key.as_ref());
            hasher.update(output.stealth_addr.spend_key.as_ref());
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Hash(out)
    }

    /// Sum of this transaction's input amounts.
    pub fn input_total(&self) -> u64 {
        self.inputs.iter().map(|i| i.amount).sum()
    }

    /// Sum of this transaction's output amounts.
    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(view: u8, spend: u8, amount: u64) -> TxOutput {
        TxOutput {
            amount,
            stealth_addr: Address {
                view_key: PublicKey([view; 32]),
                spend_key: PublicKey([spend; 32]),
            },
            tx_public_key: PublicKey([9u8; 32]),
        }
    }

    fn base_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                key_image: PublicKey([1u8; 32]),
                amount: 10,
            }],
            outputs: vec![out(2, 3, 10)],
            fee: 0,
            ring_signature: None,
            range_proofs: vec![],
        }
    }

    #[test]
    fn hash_changes_when_outputs_reordered() {
        let mut tx = base_tx();
        tx.outputs.push(out(4, 5, 0));
        let h1 = tx.hash();
        tx.outputs.swap(0, 1);
        let h2 = tx.hash();
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_is_stable_for_same_inputs() {
        let tx = base_tx();
        assert_eq!(tx.hash(), tx.hash());
    }

    #[test]
    fn range_proofs_serialize_as_base64_strings() {
        let mut tx = base_tx();
        tx.range_proofs = vec![vec![1, 2, 3], vec![4, 5]];
        let json = serde_json::to_value(&tx).unwrap();
        let proofs = json["range_proofs"].as_array().unwrap();
        assert_eq!(proofs[0], "AQID");
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back.range_proofs, tx.range_proofs);
    }

    #[test]
    fn hash_ignores_amount_and_fee() {
        let mut tx = base_tx();
        let h1 = tx.hash();
        tx.fee = 999;
        tx.outputs[0].amount = 1;
        let h2 = tx.hash();
        assert_eq!(h1, h2, "hash depends only on key images and view/spend keys");
    }
}
