//! Cursor-based key collection.

use std::sync::Arc;

use super::Key;
use crate::error::KeyError;

/// A non-empty set of candidate keys, tried in most-recently-successful-
/// first order.
///
/// Header packets are sealed for an unknown subset of recipients; rather
/// than try every key against every packet in a fixed order forever, the
/// collection remembers which key last worked and starts there next
/// time. The cursor only advances when the caller reports success via
/// [`KeyCollection::report_success`] — a failed trial leaves it in place
/// so the next packet restarts from the same point and wraps around at
/// most once.
pub struct KeyCollection {
    keys: Vec<Arc<dyn Key>>,
    cursor: usize,
}

impl KeyCollection {
    /// Builds a collection from keys that are all capable of symmetric
    /// derivation. Returns [`KeyError`] if `keys` is empty or any one of
    /// them is public-only: [`Self::iter_from_cursor`] silently skips
    /// public-only keys, so a mixed collection would quietly trial fewer
    /// keys than the caller handed it.
    pub fn new(keys: Vec<Arc<dyn Key>>) -> Result<Self, KeyError> {
        if keys.is_empty() {
            return Err(KeyError::new("key collection must not be empty"));
        }
        if !keys.iter().all(|k| k.can_derive_symmetric()) {
            return Err(KeyError::new(
                "key collection contains a key unable to derive a symmetric key",
            ));
        }
        Ok(Self { keys, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates candidate keys starting from the cursor and wrapping
    /// around exactly once, skipping keys that cannot derive a symmetric
    /// key at all.
    pub fn iter_from_cursor(&self) -> impl Iterator<Item = (usize, &Arc<dyn Key>)> + '_ {
        let n = self.keys.len();
        (0..n)
            .map(move |i| (self.cursor + i) % n)
            .filter(|&i| self.keys[i].can_derive_symmetric())
            .map(move |i| (i, &self.keys[i]))
    }

    /// Moves the cursor to `index`, to be called after a trial decryption
    /// at `index` succeeds so the next packet starts there.
    pub fn report_success(&mut self, index: usize) {
        self.cursor = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::software::SoftwareKey;

    #[test]
    fn rejects_empty_collection() {
        assert!(KeyCollection::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_all_public_only() {
        let pub_only: Arc<dyn Key> =
            Arc::new(SoftwareKey::from_public_bytes(SoftwareKey::generate().public_key()));
        assert!(KeyCollection::new(vec![pub_only]).is_err());
    }

    #[test]
    fn rejects_a_mix_of_private_and_public_only() {
        let private: Arc<dyn Key> = Arc::new(SoftwareKey::generate());
        let pub_only: Arc<dyn Key> =
            Arc::new(SoftwareKey::from_public_bytes(SoftwareKey::generate().public_key()));
        assert!(KeyCollection::new(vec![private, pub_only]).is_err());
    }

    #[test]
    fn cursor_restarts_from_last_success() {
        let keys: Vec<Arc<dyn Key>> = (0..4)
            .map(|_| Arc::new(SoftwareKey::generate()) as Arc<dyn Key>)
            .collect();
        let mut collection = KeyCollection::new(keys).unwrap();

        let order: Vec<usize> = collection.iter_from_cursor().map(|(i, _)| i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        collection.report_success(2);
        let order: Vec<usize> = collection.iter_from_cursor().map(|(i, _)| i).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
    }
}
