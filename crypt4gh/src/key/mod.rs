//! Asymmetric key capability abstraction.
//!
//! `Key` is the single interface every backend implements: in-memory
//! software keys, Crypt4GH-native key files (which are just a loader on
//! top of a software key), an external agent reached over a UNIX socket,
//! and an HTTP client delegating to a remote oracle. Rather than a class
//! hierarchy of backend-specific subclasses, every concrete backend here
//! is a thin adapter composed around either [`software::SoftwareKey`] or
//! [`ExternalKey`], which just wraps a public key plus a closure that
//! performs the raw ECDH multiply.

pub mod agent;
pub mod collection;
pub mod envelope;
pub mod http;
pub mod kdf;
mod sexp;
pub mod software;

pub use collection::KeyCollection;
pub use software::SoftwareKey;

use crate::error::KeyError;

/// A capability for X25519 ECDH and Crypt4GH symmetric-key derivation.
///
/// Implementors may or may not hold a private half; `can_derive_symmetric`
/// reports which. All derivation methods fail with [`KeyError`] when the
/// private half (or, for external backends, the oracle) is unavailable.
pub trait Key: Send + Sync {
    /// The 32-byte public key.
    fn public_key(&self) -> [u8; 32];

    /// Whether this key can perform the symmetric-key derivations below.
    fn can_derive_symmetric(&self) -> bool;

    /// Writer-side symmetric key derivation: this key acts as the
    /// data producer, `reader_pub` is the intended recipient.
    fn compute_write_symmetric(&self, reader_pub: &[u8; 32]) -> Result<[u8; 32], KeyError>;

    /// Reader-side symmetric key derivation: this key acts as the
    /// data consumer, `writer_pub` is the packet's writer public key.
    fn compute_read_symmetric(&self, writer_pub: &[u8; 32]) -> Result<[u8; 32], KeyError>;

    /// Raw X25519 scalar multiplication against `peer_point`, if this
    /// backend exposes it (external/agent/HTTP backends do; plain
    /// in-memory software keys need not).
    fn compute_ecdh(&self, _peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        Err(KeyError::new("this key does not expose raw ECDH"))
    }
}

impl<T: Key + ?Sized> Key for std::sync::Arc<T> {
    fn public_key(&self) -> [u8; 32] {
        (**self).public_key()
    }

    fn can_derive_symmetric(&self) -> bool {
        (**self).can_derive_symmetric()
    }

    fn compute_write_symmetric(&self, reader_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        (**self).compute_write_symmetric(reader_pub)
    }

    fn compute_read_symmetric(&self, writer_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        (**self).compute_read_symmetric(writer_pub)
    }

    fn compute_ecdh(&self, peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        (**self).compute_ecdh(peer_point)
    }
}

/// Derives the Crypt4GH session key shared between a writer and a reader
/// from a completed X25519 exchange.
///
/// `reader_pub` and `writer_pub` are the packet's fixed identities, not
/// "self" and "peer" — both the writer computing
/// [`Key::compute_write_symmetric`] and the reader computing
/// [`Key::compute_read_symmetric`] call this with the *same* two public
/// keys in the *same* order, so (given X25519's Diffie-Hellman symmetry,
/// `shared` is identical on both sides) they hash to the identical
/// 64-byte digest and take the same half of it — the transmit half,
/// the last 32 bytes. This is what makes
/// `A.compute_write_symmetric(B.pub) == B.compute_read_symmetric(A.pub)`
/// hold: the writer's transmit key and the reader's receive key name
/// different roles but must be the same 32 bytes for the reader to be
/// able to open what the writer sealed.
pub(crate) fn derive_session_key(
    shared_point: &[u8; 32],
    reader_pub: &[u8; 32],
    writer_pub: &[u8; 32],
) -> [u8; 32] {
    use blake2::{Blake2b512, Digest};

    let mut hasher = Blake2b512::new();
    hasher.update(shared_point);
    hasher.update(reader_pub);
    hasher.update(writer_pub);
    let digest = hasher.finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&digest[32..64]);
    key
}

/// An external key delegates the raw ECDH multiply to an oracle function
/// (an agent socket round-trip, an HTTP request, ...) and reuses
/// [`derive_session_key`] for everything above that. Corresponds to the
/// Python `ExternalKey` base class; `GPGAgentKey` and `HTTPKey` are both
/// just an `ExternalKey` with a different oracle.
pub struct ExternalKey<F> {
    public_key: [u8; 32],
    oracle: F,
}

impl<F> ExternalKey<F>
where
    F: Fn(&[u8; 32]) -> Result<[u8; 32], KeyError> + Send + Sync,
{
    pub fn new(public_key: [u8; 32], oracle: F) -> Self {
        Self { public_key, oracle }
    }
}

impl<F> Key for ExternalKey<F>
where
    F: Fn(&[u8; 32]) -> Result<[u8; 32], KeyError> + Send + Sync,
{
    fn public_key(&self) -> [u8; 32] {
        self.public_key
    }

    fn can_derive_symmetric(&self) -> bool {
        true
    }

    fn compute_write_symmetric(&self, reader_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        let shared = self.compute_ecdh(reader_pub)?;
        Ok(derive_session_key(&shared, reader_pub, &self.public_key))
    }

    fn compute_read_symmetric(&self, writer_pub: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        let shared = self.compute_ecdh(writer_pub)?;
        Ok(derive_session_key(&shared, &self.public_key, writer_pub))
    }

    fn compute_ecdh(&self, peer_point: &[u8; 32]) -> Result<[u8; 32], KeyError> {
        (self.oracle)(peer_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use software::SoftwareKey;

    #[test]
    fn ecdh_roundtrip_both_directions() {
        let alice = SoftwareKey::generate();
        let bob = SoftwareKey::generate();

        let k1 = alice.compute_write_symmetric(&bob.public_key()).unwrap();
        let k2 = bob.compute_read_symmetric(&alice.public_key()).unwrap();
        assert_eq!(k1, k2);

        let k3 = bob.compute_write_symmetric(&alice.public_key()).unwrap();
        let k4 = alice.compute_read_symmetric(&bob.public_key()).unwrap();
        assert_eq!(k3, k4);
    }

    #[test]
    fn external_key_matches_software_key_given_same_oracle() {
        let alice = SoftwareKey::generate();
        let bob = SoftwareKey::generate();

        let bob_pub = bob.public_key();
        let external_alice = ExternalKey::new(alice.public_key(), {
            let alice = alice.clone_private_for_test();
            move |point: &[u8; 32]| alice.compute_ecdh(point)
        });

        let direct = alice.compute_write_symmetric(&bob_pub).unwrap();
        let via_external = external_alice.compute_write_symmetric(&bob_pub).unwrap();
        assert_eq!(direct, via_external);
    }
}
