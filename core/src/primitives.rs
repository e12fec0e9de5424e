//! Fixed-width value types shared across the core crate.
//!
//! `Hash`, `PublicKey` and `Signature` are thin newtypes over byte arrays.
//! They all (de)serialize to lowercase hex strings in JSON so the on-disk
//! and wire formats match the wallet's key files (see [`crate::store`]).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! fixed_bytes {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn zero() -> Self {
                Self([0u8; $len])
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let arr: [u8; $len] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(b: [u8; $len]) -> Self {
                Self(b)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(DeError::custom)
            }
        }
    };
}

fixed_bytes!(Hash, 32);
fixed_bytes!(PublicKey, 32);
fixed_bytes!(Signature, 64);

/// A recipient's published address: a view key (for output scanning) and a
/// long-term spend key (for deriving one-time spend keys).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub view_key: PublicKey,
    pub spend_key: PublicKey,
}

/// A private/public Ed25519-shaped key pair. `private` is opaque key
/// material; nothing outside `crate::keys` should rely on its internal
/// structure.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub private: [u8; 32],
    pub public: PublicKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair {{ public: {}, private: <redacted> }}", self.public)
    }
}

/// A wallet's full key material: view pair (recognizing outputs) and spend
/// pair (spending them). Owned solely by the wallet; never seen by the node.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletKeys {
    pub view: KeyPair,
    pub spend: KeyPair,
}

impl fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKeys")
            .field("view_pub", &self.view.public)
            .field("spend_pub", &self.spend.public)
            .finish()
    }
}

impl WalletKeys {
    /// The publishable address derived from this wallet's key material.
    pub fn address(&self) -> Address {
        Address {
            view_key: self.view.public,
            spend_key: self.spend.public,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_round_trip() {
        let h = Hash([7u8; 32]);
        let s = h.to_hex();
        assert_eq!(s.len(), 64);
        assert_eq!(Hash::from_hex(&s).unwrap(), h);
    }

    #[test]
    fn public_key_json_round_trip() {
        let pk = PublicKey([9u8; 32]);
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", "09".repeat(32)));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn rejects_wrong_length_hex() {
        assert!(Hash::from_hex("abcd").is_err());
    }
}
