//! Arena-based storage with typed handles.
//!
//! Every IR entity (type, value, instruction, block, function) lives in an
//! arena owned by the [`Module`](crate::Module). Cross references between
//! entities are [`Handle`]s, so rewriting an operand or renaming a value can
//! never leave a dangling reference behind.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A typed index into an [`Arena`] or [`UniqueArena`].
pub struct Handle<T> {
    index: u32,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.index)
    }
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            _phantom: PhantomData,
        }
    }

    /// Builds a handle from a raw index.
    ///
    /// The handle is not checked against any arena; the validator reports
    /// handles that point past the end of their arena.
    pub fn from_usize(index: usize) -> Self {
        let index = u32::try_from(index)
            .unwrap_or_else(|_| panic!("handle index {index} exceeds u32::MAX"));
        Self::new(index)
    }

    /// Returns the zero-based index of this handle.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

fn checked_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("arena overflow: {len} items exceeds u32::MAX"))
}

/// An append-only arena.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the handle the next appended value will receive.
    pub fn next_handle(&self) -> Handle<T> {
        Handle::new(checked_index(self.data.len()))
    }

    /// Appends a value and returns its handle.
    pub fn append(&mut self, value: T) -> Handle<T> {
        let handle = self.next_handle();
        self.data.push(value);
        handle
    }

    /// Returns `true` if `handle` points at a value of this arena.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        handle.index() < self.data.len()
    }

    /// Iterates over handles in allocation order.
    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + use<T> {
        (0..checked_index(self.data.len())).map(Handle::new)
    }

    /// Iterates over `(handle, &value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }

    /// Iterates over `(handle, &mut value)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }
}

impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        &mut self.data[handle.index()]
    }
}

/// A deduplicating arena: inserting an equal value yields the same handle.
///
/// Values can be rewritten in place with [`UniqueArena::replace`]; the
/// handle keeps pointing at the rewritten value.
#[derive(Clone, Debug)]
pub struct UniqueArena<T> {
    data: Vec<T>,
    map: HashMap<T, u32>,
}

impl<T: Hash + Eq> Default for UniqueArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> UniqueArena<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            map: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Inserts a value, returning the existing handle if an equal value is present.
    pub fn insert(&mut self, value: T) -> Handle<T>
    where
        T: Clone,
    {
        if let Some(&index) = self.map.get(&value) {
            return Handle::new(index);
        }
        let index = checked_index(self.data.len());
        self.map.insert(value.clone(), index);
        self.data.push(value);
        Handle::new(index)
    }

    /// Returns the handle of a value equal to `value`, if one was inserted.
    pub fn get(&self, value: &T) -> Option<Handle<T>> {
        self.map.get(value).map(|&index| Handle::new(index))
    }

    /// Rewrites the value behind `handle`.
    ///
    /// If the new value equals another entry, later `insert`s of that value
    /// resolve to `handle`; existing handles to the other entry stay valid.
    pub fn replace(&mut self, handle: Handle<T>, value: T)
    where
        T: Clone,
    {
        let old = std::mem::replace(&mut self.data[handle.index()], value.clone());
        if self.map.get(&old) == Some(&handle.index) {
            self.map.remove(&old);
        }
        self.map.insert(value, handle.index);
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        handle.index() < self.data.len()
    }

    /// Iterates over `(handle, &value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32), v))
    }
}

impl<T> Index<Handle<T>> for UniqueArena<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        &self.data[handle.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_append_and_access() {
        let mut arena = Arena::new();
        let h0 = arena.append("entry");
        let h1 = arena.append("helper");
        assert_eq!(arena[h0], "entry");
        assert_eq!(arena[h1], "helper");
        assert_eq!(arena.len(), 2);
        assert!(arena.contains(h1));
        assert!(!arena.contains(Handle::new(2)));
    }

    #[test]
    fn arena_handles_follow_allocation_order() {
        let mut arena = Arena::new();
        arena.append(10);
        arena.append(20);
        let handles: Vec<_> = arena.handles().map(Handle::index).collect();
        assert_eq!(handles, vec![0, 1]);
        assert_eq!(arena.next_handle().index(), 2);
    }

    #[test]
    fn unique_arena_dedup() {
        let mut arena = UniqueArena::new();
        let h0 = arena.insert(42);
        let h1 = arena.insert(99);
        let h2 = arena.insert(42);
        assert_eq!(h0, h2);
        assert_ne!(h0, h1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(&99), Some(h1));
    }

    #[test]
    fn unique_arena_replace_keeps_handle() {
        let mut arena = UniqueArena::new();
        let h0 = arena.insert(String::from("Light"));
        arena.replace(h0, String::from("Light_1"));
        assert_eq!(arena[h0], "Light_1");
        assert_eq!(arena.get(&String::from("Light")), None);
        assert_eq!(arena.insert(String::from("Light_1")), h0);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn handle_ordering() {
        let h0: Handle<u32> = Handle::new(0);
        let h1: Handle<u32> = Handle::from_usize(1);
        assert!(h0 < h1);
        assert_eq!(format!("{h1:?}"), "[1]");
    }
}
