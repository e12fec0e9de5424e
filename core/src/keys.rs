//! Stealth addressing and key derivation.
//!
//! These operations use **hash-based surrogates** for what a production
//! scheme would implement with `edwards25519` scalar multiplication and
//! point addition. The formulas below are preserved bit-exactly: given the
//! same inputs, any conformant implementation must produce the same
//! outputs, because the chain's data model and the test suite depend on
//! it. A future phase is expected to replace every `h(..)` call here with
//! real curve arithmetic while keeping every signature in this module
//! unchanged — that is why these surrogates are isolated in their own
//! module rather than inlined at call sites.

use ed25519_dalek::{PublicKey as DalekPublicKey, SecretKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{Address, Error, KeyPair, PublicKey, Result, TxOutput, WalletKeys};

/// `H(x) = SHA-256(x)`, truncated to nothing since SHA-256 already yields 32
/// bytes. The one hash function every surrogate below is built from.
fn h(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Generates a fresh Ed25519 key pair without going through
/// `ed25519_dalek::Keypair::generate`, which pins an older `rand_core`
/// major version than the rest of this crate uses.
fn random_ed25519_keypair() -> KeyPair {
    let mut secret_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret_bytes);
    let secret = SecretKey::from_bytes(&secret_bytes).expect("32 random bytes is valid secret key material");
    let public = DalekPublicKey::from(&secret);
    KeyPair {
        private: secret_bytes,
        public: PublicKey(public.to_bytes()),
    }
}

/// Generates two independent Ed25519 key pairs: a view pair (for
/// recognizing incoming outputs) and a spend pair (the long-term spend
/// identity).
pub fn generate_wallet_keys() -> WalletKeys {
    WalletKeys {
        view: random_ed25519_keypair(),
        spend: random_ed25519_keypair(),
    }
}

/// Generates a fresh one-time output destined for `recipient`.
///
/// Returns the constructed [`TxOutput`] (with `amount` left at `0` — the
/// caller fills it in) and the ephemeral key pair `(r, R)` used to derive
/// it; `R` is also embedded in the output as `tx_public_key` so the
/// recipient can recompute the shared secret.
pub fn generate_stealth_output(recipient: &Address) -> (TxOutput, KeyPair) {
    let ephemeral = random_ed25519_keypair();
    let shared_secret = h(&[&ephemeral.private, recipient.view_key.as_ref()]);
    let one_time_spend_key = h(&[&shared_secret, recipient.spend_key.as_ref()]);

    let output = TxOutput {
        amount: 0,
        stealth_addr: Address {
            view_key: recipient.view_key,
            spend_key: PublicKey(one_time_spend_key),
        },
        tx_public_key: ephemeral.public,
    };
    (output, ephemeral)
}

fn recompute_one_time_key(wallet: &WalletKeys, output: &TxOutput) -> PublicKey {
    let shared_secret = h(&[&wallet.view.private, output.tx_public_key.as_ref()]);
    PublicKey(h(&[&shared_secret, wallet.spend.public.as_ref()]))
}

/// Checks whether `output` was generated for `wallet`, returning the
/// recomputed one-time spend key either way.
pub fn scan_output(wallet: &WalletKeys, output: &TxOutput) -> (bool, PublicKey) {
    let recomputed = recompute_one_time_key(wallet, output);
    (recomputed == output.stealth_addr.spend_key, recomputed)
}

/// Recovers the one-time private spend key for `output`, failing if the
/// output does not belong to `wallet`.
pub fn derive_spend_key(wallet: &WalletKeys, output: &TxOutput) -> Result<[u8; 32]> {
    let (belongs, _) = scan_output(wallet, output);
    if !belongs {
        return Err(Error::NotWalletOutput);
    }
    let shared_secret = h(&[&wallet.view.private, output.tx_public_key.as_ref()]);
    Ok(h(&[&shared_secret, &wallet.spend.private]))
}

/// Derives the key image for an output's one-time private key, used as the
/// transaction input's double-spend identifier.
pub fn generate_key_image(private_key: &[u8; 32], output_public_key: &PublicKey) -> PublicKey {
    PublicKey(h(&[private_key, output_public_key.as_ref()]))
}

/// Wraps raw key bytes as an Ed25519 public key, validating curve
/// membership. Used where a `PublicKey` newtype must be checked before
/// being handed to `ed25519_dalek` for signature verification.
pub fn as_dalek_public(pk: &PublicKey) -> Result<DalekPublicKey> {
    DalekPublicKey::from_bytes(pk.as_bytes()).map_err(|_| Error::Other("invalid public key"))
}

/// Wraps raw key bytes as an Ed25519 secret key.
pub fn as_dalek_secret(bytes: &[u8; 32]) -> Result<SecretKey> {
    SecretKey::from_bytes(bytes).map_err(|_| Error::Other("invalid secret key"))
}
