use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::{Mutex, MutexGuard};

use larder_types::RecordType;

/// A fixed array of bootstrap locks, one chosen per record type by hash.
///
/// Types on different stripes bootstrap in parallel. Two types on the same
/// stripe bootstrap one after the other but still get separate collections.
///
/// Stripes are not reentrant: a thread holding a stripe that asks for it
/// again blocks forever.
pub struct StripedLock {
    stripes: Box<[Mutex<()>]>,
}

impl StripedLock {
    /// Create `stripes` locks (at least one).
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The stripe guarding `record_type`. Stable for the lifetime of the process.
    pub fn stripe_of(&self, record_type: &RecordType) -> usize {
        let mut hasher = DefaultHasher::new();
        record_type.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    pub fn lock(&self, record_type: &RecordType) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(record_type)].lock()
    }
}

impl std::fmt::Debug for StripedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedLock")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn at_least_one_stripe() {
        assert_eq!(StripedLock::new(0).len(), 1);
        assert_eq!(StripedLock::new(16).len(), 16);
    }

    #[test]
    fn stripe_is_stable_and_in_range() {
        let locks = StripedLock::new(7);
        let a = RecordType::of::<A>();
        let first = locks.stripe_of(&a);
        assert!(first < 7);
        for _ in 0..10 {
            assert_eq!(locks.stripe_of(&a), first);
        }
    }

    #[test]
    fn single_stripe_is_shared() {
        let locks = StripedLock::new(1);
        assert_eq!(
            locks.stripe_of(&RecordType::of::<A>()),
            locks.stripe_of(&RecordType::of::<B>())
        );
        let guard = locks.lock(&RecordType::of::<A>());
        assert!(locks.stripes[0].try_lock().is_none());
        drop(guard);
        assert!(locks.stripes[0].try_lock().is_some());
    }
}
