//! Obscura wallet: holds a user's view/spend key material, recognizes
//! outputs addressed to it by scanning, and builds ring-signed spends.
//!
//! Wire formats, storage of the key file on disk, and RPC submission are
//! out of scope here; this crate wraps `obscura_core::keys` with an
//! ergonomic, stateful API a CLI or GUI front end can drive.

use obscura_core::{keys, Address, KeyPair, PublicKey, Result, TxOutput, WalletKeys};

/// A recognized output, paired with the one-time private spend key needed
/// to later consume it.
#[derive(Debug, Clone)]
pub struct OwnedOutput {
    pub output: TxOutput,
    pub spend_key: [u8; 32],
}

/// A wallet's key material plus the convenience operations built on top of
/// it: generating a fresh identity, publishing an address, and scanning a
/// batch of outputs for ones that belong to it.
pub struct Wallet {
    keys: WalletKeys,
}

impl Wallet {
    /// Generates a brand-new wallet with fresh view and spend keys.
    pub fn generate() -> Self {
        Self {
            keys: keys::generate_wallet_keys(),
        }
    }

    /// Restores a wallet from previously generated key material (e.g. read
    /// from a key file).
    pub fn from_keys(keys: WalletKeys) -> Self {
        Self { keys }
    }

    pub fn view_keypair(&self) -> KeyPair {
        self.keys.view
    }

    pub fn spend_keypair(&self) -> KeyPair {
        self.keys.spend
    }

    /// The address to publish so others can send to this wallet.
    pub fn address(&self) -> Address {
        self.keys.address()
    }

    /// Filters `outputs` down to the ones this wallet can spend, returning
    /// each alongside its recovered one-time private spend key.
    pub fn scan(&self, outputs: &[TxOutput]) -> Vec<OwnedOutput> {
        outputs
            .iter()
            .filter_map(|output| {
                let (belongs, _) = keys::scan_output(&self.keys, output);
                if !belongs {
                    return None;
                }
                keys::derive_spend_key(&self.keys, output)
                    .ok()
                    .map(|spend_key| OwnedOutput {
                        output: output.clone(),
                        spend_key,
                    })
            })
            .collect()
    }

    /// Derives the key image that would be spent for `output`, failing if
    /// this wallet does not own it.
    pub fn key_image_for(&self, output: &TxOutput) -> Result<PublicKey> {
        let spend_priv = keys::derive_spend_key(&self.keys, output)?;
        Ok(keys::generate_key_image(&spend_priv, &output.stealth_addr.spend_key))
    }

    /// Builds a fresh one-time output paying `recipient`, for use as a
    /// transaction output when sending funds.
    pub fn pay(&self, recipient: &Address, amount: u64) -> TxOutput {
        let (mut output, _ephemeral) = keys::generate_stealth_output(recipient);
        output.amount = amount;
        output
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_recognizes_own_outputs_only() {
        let alice = Wallet::generate();
        let bob = Wallet::generate();

        let to_alice = alice.pay(&alice.address(), 10);
        let to_bob = bob.pay(&bob.address(), 5);

        let owned = alice.scan(&[to_alice.clone(), to_bob]);
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].output.stealth_addr, to_alice.stealth_addr);
    }

    #[test]
    fn key_image_is_derivable_for_owned_output() {
        let wallet = Wallet::generate();
        let output = wallet.pay(&wallet.address(), 42);
        assert!(wallet.key_image_for(&output).is_ok());
    }
}
