//! In-memory X25519 keys.

use rand_core::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use super::{derive_session_key, Key};
use crate::error::KeyError;

/// A private (or public-only) X25519 key held directly in memory.
///
/// This is the leaf of every composition: a [`super::envelope`]-decoded
/// key file, an ephemeral writer key, and a test fixture are all just a
/// `SoftwareKey` underneath.
pub struct SoftwareKey {
    secret: Option<StaticSecret>,
    public: [u8; 32],
}

impl Clone for SoftwareKey {
    fn clone(&self) -> Self {
        Self {
            secret: self.secret.as_ref().map(|s| StaticSecret::from(s.to_bytes())),
            public: self.public,
        }
    }
}

impl Drop for SoftwareKey {
    fn drop(&mut self) {
        // `StaticSecret` already zeroizes on drop; this guards the copy
        // `to_bytes()` would otherwise leave lying around in `clone`.
        self.public.zeroize();
    }
}

impl SoftwareKey {
    /// Generates a fresh key pair (used for ephemeral writer keys).
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            secret: Some(secret),
            public: public.to_bytes(),
        }
    }

    /// Builds a private key from a raw 32-byte scalar.
    pub fn from_private_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self {
            secret: Some(secret),
            public: public.to_bytes(),
        }
    }

    /// Builds a public-only key (no symmetric derivation possible).
    pub fn from_public_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: None,
            public: bytes,
        }
    }

    pub fn has_private(&self) -> bool {
        self.secret.is_some()
    }

    #[cfg(test)]
    pub(crate) fn clone_private_for_test(&self) -> Self {
        self.clone()
    }
}

impl Key for SoftwareKey {
    fn public_key(&self) -> [u8; 32] {
        self.public
    }

    fn can_derive_symmetric(&self) -> bool {
        self.secret.is_some()
    }

    fn compute_write_symmetric(&self, reader_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        let shared = self.compute_ecdh(reader_pub)?;
        Ok(derive_session_key(&shared, reader_pub, &self.public))
    }

    fn compute_read_symmetric(&self, writer_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        let shared = self.compute_ecdh(writer_pub)?;
        Ok(derive_session_key(&shared, &self.public, writer_pub))
    }

    fn compute_ecdh(&self, peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| KeyError::new("no private key material available"))?;
        let shared = secret.diffie_hellman(&PublicKey::from(*peer_point));
        Ok(shared.to_bytes())
    }
}
