//! Persistent, structurally shared maps and sets.
//!
//! Lattice elements are copied at every CFG node on every solver iteration,
//! so the per-iteration cost has to stay proportional to the size of the
//! *change*, not the whole function. [`PMap`] and [`PSet`] wrap the `im`
//! crate's HAMT containers and expose the operations the lattice needs:
//! insert/remove that return new versions sharing untouched substructure,
//! and a [`PMap::reconcile`] merge that short-circuits to an unchanged
//! input when the combination is a no-op. The short-circuit keeps the
//! solver's convergence check cheap: unchanged maps compare equal through
//! pointer identity before any structural walk.
//!
//! Keys are small integer handles ([`crate::ast::AstId`],
//! [`crate::scope::VarId`]), so hashing keys is well defined. The lattice
//! elements built on top of these containers are never hashed themselves.

use std::hash::Hash;

/// Immutable map with structural sharing.
#[derive(Debug, Clone)]
pub struct PMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    inner: im::HashMap<K, V>,
}

impl<K, V> Default for PMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self {
            inner: im::HashMap::new(),
        }
    }
}

impl<K, V> PMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Insert or overwrite, returning the new version. Returns a version
    /// sharing all structure with `self` when the value is unchanged.
    pub fn plus(&self, key: K, value: V) -> Self {
        if self.inner.get(&key) == Some(&value) {
            return self.clone();
        }
        Self {
            inner: self.inner.update(key, value),
        }
    }

    /// Remove a key, returning the new version.
    pub fn minus(&self, key: &K) -> Self {
        if !self.inner.contains_key(key) {
            return self.clone();
        }
        Self {
            inner: self.inner.without(key),
        }
    }

    /// Keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    /// Entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    /// Whether two maps share their root (constant-time equality witness).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Merge two maps by walking the union of their keys.
    ///
    /// `combine` is called once per key with this map's value and the other
    /// map's value (either may be absent); returning `None` drops the key.
    /// When the result is indistinguishable from `self` or `other`, that
    /// map is returned unchanged so downstream equality checks stay cheap.
    pub fn reconcile<F>(&self, other: &Self, mut combine: F) -> Self
    where
        F: FnMut(&K, Option<&V>, Option<&V>) -> Option<V>,
    {
        if self.ptr_eq(other) {
            return self.clone();
        }
        let mut same_as_self = true;
        let mut same_as_other = true;
        let mut result = im::HashMap::new();

        for (key, ours) in self.inner.iter() {
            let theirs = other.inner.get(key);
            match combine(key, Some(ours), theirs) {
                Some(merged) => {
                    if &merged != ours {
                        same_as_self = false;
                    }
                    if theirs != Some(&merged) {
                        same_as_other = false;
                    }
                    result.insert(key.clone(), merged);
                }
                None => {
                    same_as_self = false;
                    if theirs.is_some() {
                        same_as_other = false;
                    }
                }
            }
        }
        for (key, theirs) in other.inner.iter() {
            if self.inner.contains_key(key) {
                continue;
            }
            match combine(key, None, Some(theirs)) {
                Some(merged) => {
                    same_as_self = false;
                    if &merged != theirs {
                        same_as_other = false;
                    }
                    result.insert(key.clone(), merged);
                }
                None => {
                    same_as_other = false;
                }
            }
        }

        if same_as_self {
            return self.clone();
        }
        if same_as_other {
            return other.clone();
        }
        Self { inner: result }
    }
}

impl<K, V> PartialEq for PMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner == other.inner
    }
}

impl<K, V> Eq for PMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + Eq,
{
}

/// Immutable set with structural sharing.
#[derive(Debug, Clone)]
pub struct PSet<T>
where
    T: Hash + Eq + Clone,
{
    inner: im::HashSet<T>,
}

impl<T> Default for PSet<T>
where
    T: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self {
            inner: im::HashSet::new(),
        }
    }
}

impl<T> PSet<T>
where
    T: Hash + Eq + Clone,
{
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership test.
    pub fn contains(&self, value: &T) -> bool {
        self.inner.contains(value)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Insert, returning the new version; unchanged input is returned as-is
    /// when the element is already present.
    pub fn plus(&self, value: T) -> Self {
        if self.inner.contains(&value) {
            return self.clone();
        }
        Self {
            inner: self.inner.update(value),
        }
    }

    /// Remove, returning the new version.
    pub fn minus(&self, value: &T) -> Self {
        if !self.inner.contains(value) {
            return self.clone();
        }
        Self {
            inner: self.inner.without(value),
        }
    }

    /// Elements, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.inner.iter()
    }

    /// Whether two sets share their root.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    /// Set union, preserving `self` unchanged when `other` adds nothing.
    pub fn union(&self, other: &Self) -> Self {
        if self.ptr_eq(other) || other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let merged = self.inner.clone().union(other.inner.clone());
        if merged.len() == self.inner.len() {
            // other was a subset; keep the original root for cheap equality
            return self.clone();
        }
        Self { inner: merged }
    }
}

impl<T> PartialEq for PSet<T>
where
    T: Hash + Eq + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner == other.inner
    }
}

impl<T> Eq for PSet<T> where T: Hash + Eq + Clone {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_shares_when_unchanged() {
        let m: PMap<u32, u32> = PMap::new().plus(1, 10).plus(2, 20);
        let same = m.plus(1, 10);
        assert!(m.ptr_eq(&same));
        let changed = m.plus(1, 11);
        assert!(!m.ptr_eq(&changed));
        assert_eq!(changed.get(&1), Some(&11));
        assert_eq!(m.get(&1), Some(&10), "original version untouched");
    }

    #[test]
    fn minus_removes() {
        let m: PMap<u32, u32> = PMap::new().plus(1, 10);
        let removed = m.minus(&1);
        assert!(removed.is_empty());
        assert_eq!(m.len(), 1);
        assert!(m.minus(&99).ptr_eq(&m), "removing an absent key is a no-op");
    }

    #[test]
    fn reconcile_union() {
        let a: PMap<u32, u32> = PMap::new().plus(1, 10).plus(2, 20);
        let b: PMap<u32, u32> = PMap::new().plus(2, 20).plus(3, 30);
        let merged = a.reconcile(&b, |_, ours, theirs| ours.or(theirs).cloned());
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(&1), Some(&10));
        assert_eq!(merged.get(&3), Some(&30));
    }

    #[test]
    fn reconcile_short_circuits_to_self() {
        let a: PMap<u32, u32> = PMap::new().plus(1, 10).plus(2, 20);
        let b: PMap<u32, u32> = PMap::new().plus(1, 10);
        let merged = a.reconcile(&b, |_, ours, theirs| ours.or(theirs).cloned());
        assert!(merged.ptr_eq(&a), "no-op reconcile must return self");
    }

    #[test]
    fn reconcile_short_circuits_to_other() {
        let a: PMap<u32, u32> = PMap::new().plus(1, 10);
        let b: PMap<u32, u32> = PMap::new().plus(1, 10).plus(2, 20);
        let merged = a.reconcile(&b, |_, ours, theirs| theirs.or(ours).cloned());
        assert!(merged.ptr_eq(&b));
    }

    #[test]
    fn reconcile_can_drop_keys() {
        let a: PMap<u32, u32> = PMap::new().plus(1, 10).plus(2, 20);
        let b: PMap<u32, u32> = PMap::new().plus(2, 21);
        let merged = a.reconcile(&b, |key, ours, _| {
            if *key == 1 {
                None
            } else {
                ours.cloned()
            }
        });
        assert_eq!(merged.get(&1), None);
        assert_eq!(merged.get(&2), Some(&20));
    }

    #[test]
    fn set_union_shares_subsets() {
        let a: PSet<u32> = PSet::new().plus(1).plus(2);
        let b: PSet<u32> = PSet::new().plus(2);
        assert!(a.union(&b).ptr_eq(&a));
        assert!(b.union(&a) == a);
        let c: PSet<u32> = PSet::new().plus(3);
        let merged = a.union(&c);
        assert_eq!(merged.len(), 3);
    }
}
