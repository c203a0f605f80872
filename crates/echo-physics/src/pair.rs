// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use core::fmt;

use crate::body::ObjectId;
use crate::narrow::CollisionAlgorithm;
use crate::pool::{Handle, Pool};

/// Order-independent identity of a body pair: `min << 32 | max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(u64);

impl PairKey {
    /// Key of the pair `{a, b}`; `new(a, b) == new(b, a)`.
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self((u64::from(lo.get()) << 32) | u64::from(hi.get()))
    }

    /// Raw 64-bit key.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The two ids, smaller first.
    pub fn ids(self) -> (ObjectId, ObjectId) {
        let lo = u32::try_from(self.0 >> 32).unwrap_or(u32::MAX);
        let hi = u32::try_from(self.0 & u64::from(u32::MAX)).unwrap_or(u32::MAX);
        (ObjectId::new(lo), ObjectId::new(hi))
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.ids();
        write!(f, "{a}-{b}")
    }
}

/// Two bodies whose fat bounds overlap, plus the cached narrow-phase
/// algorithm (created on first use).
#[derive(Debug)]
pub struct OverlappingPair {
    key: PairKey,
    algorithm: Option<Handle<CollisionAlgorithm>>,
}

impl OverlappingPair {
    /// Pair without an algorithm yet.
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        Self {
            key: PairKey::new(a, b),
            algorithm: None,
        }
    }

    /// Pair key.
    pub fn key(&self) -> PairKey {
        self.key
    }

    /// Smaller body id.
    pub fn body1(&self) -> ObjectId {
        self.key.ids().0
    }

    /// Larger body id.
    pub fn body2(&self) -> ObjectId {
        self.key.ids().1
    }

    /// Cached algorithm, if the narrow phase processed this pair before.
    pub fn algorithm(&self) -> Option<Handle<CollisionAlgorithm>> {
        self.algorithm
    }

    pub(crate) fn set_algorithm(&mut self, handle: Handle<CollisionAlgorithm>) {
        self.algorithm = Some(handle);
    }

    /// Returns the cached algorithm to its pool.
    pub(crate) fn release(&mut self, pool: &mut Pool<CollisionAlgorithm>) {
        if let Some(handle) = self.algorithm.take() {
            pool.free(handle);
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_is_symmetric() {
        let (a, b) = (ObjectId::new(7), ObjectId::new(3));
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert_eq!(PairKey::new(a, b).get(), (3_u64 << 32) | 7);
        assert_eq!(PairKey::new(a, b).ids(), (b, a));
    }

    #[test]
    fn pair_orders_bodies() {
        let pair = OverlappingPair::new(ObjectId::new(9), ObjectId::new(2));
        assert_eq!(pair.body1(), ObjectId::new(2));
        assert_eq!(pair.body2(), ObjectId::new(9));
        assert!(pair.algorithm().is_none());
    }
}
