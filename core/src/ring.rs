//! Ring signatures: construct and verify a linkable anonymous group
//! signature over a transaction message.
//!
//! The phase-1 verifier checks that the challenge hashes consistently and
//! that each per-position digest is non-zero. It does **not** bind
//! responses to public keys cryptographically — it provides structural
//! linkability via the key image and correct argument wiring, nothing
//! more. Tests in this module must only assert the structural contracts,
//! never assume soundness against an adversary.

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::keys;
use crate::{Error, Hash, PublicKey, Result, Signature};

/// A linkable ring signature over a message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RingSignature {
    pub ring: Vec<PublicKey>,
    pub challenge: Hash,
    pub responses: Vec<Signature>,
    pub key_image: PublicKey,
}

fn double_hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut first = Sha256::new();
    for p in parts {
        first.update(p);
    }
    let inner = first.finalize();
    let mut second = Sha256::new();
    second.update(inner);
    let outer = second.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&outer);
    out
}

fn compute_challenge(message: &[u8], key_image: &PublicKey, ring: &[PublicKey]) -> Hash {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(2 + ring.len());
    parts.push(message);
    parts.push(key_image.as_ref());
    for member in ring {
        parts.push(member.as_ref());
    }
    Hash(double_hash(&parts))
}

fn fill_signature_from_32(bytes: [u8; 32]) -> Signature {
    let mut full = [0u8; 64];
    full[..32].copy_from_slice(&bytes);
    full[32..].copy_from_slice(&bytes);
    Signature(full)
}

/// Signs `message` proving knowledge of the private key behind `real_pub`
/// without revealing its position among `decoys`.
///
/// `decoys` must contain at least 2 entries (`n = |decoys| + 1`).
pub fn sign(
    real_priv: &[u8; 32],
    real_pub: &PublicKey,
    decoys: &[PublicKey],
    message: &[u8],
) -> Result<RingSignature> {
    if decoys.len() < 2 {
        return Err(Error::MalformedTransaction("ring needs at least 2 decoys"));
    }
    let n = decoys.len() + 1;
    let mut rng = rand::thread_rng();
    let real_index = (rng.next_u32() as usize) % n;

    let mut ring = Vec::with_capacity(n);
    let mut decoy_iter = decoys.iter();
    for i in 0..n {
        if i == real_index {
            ring.push(*real_pub);
        } else {
            ring.push(*decoy_iter.next().expect("decoys sized n-1"));
        }
    }

    // Single-hashed, matching `keys::generate_key_image` exactly: a
    // transaction's input key image and the ring signing it over must be
    // the same value, or linkage can never match.
    let key_image = keys::generate_key_image(real_priv, real_pub);
    let challenge = compute_challenge(message, &key_image, &ring);

    let mut responses = vec![Signature([0u8; 64]); n];
    for (i, slot) in responses.iter_mut().enumerate() {
        if i == real_index {
            continue;
        }
        let mut random_response = [0u8; 64];
        rng.fill_bytes(&mut random_response);
        *slot = Signature(random_response);
    }
    responses[real_index] = fill_signature_from_32(double_hash(&[
        real_priv,
        challenge.as_ref(),
        message,
    ]));

    Ok(RingSignature {
        ring,
        challenge,
        responses,
        key_image,
    })
}

/// Verifies a ring signature's structural contracts against `message`.
pub fn verify(signature: &RingSignature, message: &[u8]) -> bool {
    if signature.ring.len() != signature.responses.len() {
        return false;
    }
    let expected_challenge = compute_challenge(message, &signature.key_image, &signature.ring);
    if expected_challenge != signature.challenge {
        return false;
    }
    for (member, response) in signature.ring.iter().zip(signature.responses.iter()) {
        let digest = double_hash(&[
            response.as_ref(),
            member.as_ref(),
            signature.challenge.as_ref(),
            message,
        ]);
        if digest == [0u8; 32] {
            return false;
        }
    }
    true
}
