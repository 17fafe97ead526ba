use crate::keys::Keys;
use crate::EntityRef;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A mapping `K -> V` for keys allocated elsewhere (usually a `PrimaryMap`).
///
/// Unlike `PrimaryMap`, a `SecondaryMap` can't allocate keys. It grows lazily to accommodate
/// whatever key is indexed, and untouched entries read as the default value. This is the shape
/// used for per-slot coloring state, per-instruction live-range bookkeeping, and similar data
/// that is computed *after* the owning `PrimaryMap` already exists.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V>
where
    V: Clone,
{
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V: Clone> SecondaryMap<K, V> {
    pub fn new() -> Self
    where
        V: Default,
    {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }

    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    pub fn keys(&self) -> Keys<K> {
        Keys::with_len(self.elems.len())
    }

    #[inline]
    pub fn resize(&mut self, n: usize) {
        self.elems.resize(n, self.default.clone());
    }
}

impl<K: EntityRef, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V: Clone> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.get(k).unwrap_or(&self.default)
    }
}

impl<K: EntityRef, V: Clone> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        let i = k.index();
        if i >= self.elems.len() {
            self.resize(i + 1);
        }
        &mut self.elems[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity_ref!(struct E);

    #[test]
    fn grows_on_write_and_reads_default() {
        let mut m: SecondaryMap<E, i32> = SecondaryMap::new();
        let e0 = E::new(0);
        let e2 = E::new(2);
        assert_eq!(m[e0], 0);
        m[e2] = 7;
        assert_eq!(m[e2], 7);
        assert_eq!(m[e0], 0);
        assert_eq!(m.len(), 3);
    }
}
