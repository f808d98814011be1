//! Ed25519 identities used to sign requests.

use crate::{Address, LedgerError, Result};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::RngCore;

/// A payee's signing key together with its derived address.
#[derive(Clone)]
pub struct SigningIdentity {
    key: SigningKey,
}

impl SigningIdentity {
    /// Generate a fresh identity from OS randomness.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self::from_secret_bytes(&secret)
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| LedgerError::invalid_input("secret key", e.to_string()))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::invalid_input("secret key", "expected 32 bytes"))?;
        Ok(Self::from_secret_bytes(&secret))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; 64] {
        self.key.sign(digest).to_bytes()
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hex_round_trip() {
        let identity = SigningIdentity::generate();
        let restored = SigningIdentity::from_secret_hex(&identity.secret_hex()).unwrap();
        assert_eq!(restored.address(), identity.address());
        assert!(SigningIdentity::from_secret_hex("abcd").is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = SigningIdentity::from_secret_bytes(&[7; 32]);
        let debug = format!("{identity:?}");
        assert!(!debug.contains(&identity.secret_hex()));
    }
}
