//! Slot arena with generational keys
//!
//! Keys stay valid only as long as the value they were returned for: once it is
//! removed its slot may be reused, but with a new generation, so a stale key
//! looks up nothing instead of another value.

use std::{fmt, hash::Hash, marker::PhantomData};

/// Key of a value in an [`Arena`]
pub struct Key<T> {
    slot: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation, _marker: PhantomData }
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}v{})", self.slot, self.generation)
    }
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Values addressed by generational [`Key`]s
#[derive(Debug)]
pub(crate) struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new(), free_head: None, len: 0 }
    }

    /// Insert a value built from its own key
    pub(crate) fn insert_with(&mut self, f: impl FnOnce(Key<T>) -> T) -> Key<T> {
        self.len += 1;
        match self.free_head {
            Some(slot) => {
                let entry = &mut self.entries[slot as usize];
                let (generation, next_free) = match *entry {
                    Entry::Vacant { generation, next_free } => (generation, next_free),
                    Entry::Occupied { .. } => unreachable!("free list points to an occupied slot"),
                };
                let key = Key::new(slot, generation);
                *entry = Entry::Occupied { generation, value: f(key) };
                self.free_head = next_free;
                key
            }
            None => {
                let slot = self.entries.len() as u32;
                let key = Key::new(slot, 0);
                self.entries.push(Entry::Occupied { generation: 0, value: f(key) });
                key
            }
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> Key<T> {
        self.insert_with(|_| value)
    }

    pub(crate) fn get(&self, key: Key<T>) -> Option<&T> {
        match self.entries.get(key.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, key: Key<T>) -> Option<&mut T> {
        match self.entries.get_mut(key.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn contains(&self, key: Key<T>) -> bool {
        self.get(key).is_some()
    }

    /// Remove a value, bumping the generation of its slot
    pub(crate) fn remove(&mut self, key: Key<T>) -> Option<T> {
        let entry = self.entries.get_mut(key.slot as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == key.generation => {}
            _ => return None,
        }
        let vacant = Entry::Vacant {
            generation: key.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let Entry::Occupied { value, .. } = std::mem::replace(entry, vacant) else {
            unreachable!()
        };
        self.free_head = Some(key.slot);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Key<T>, &T)> {
        self.entries.iter().enumerate().filter_map(|(slot, entry)| match entry {
            Entry::Occupied { generation, value } => Some((Key::new(slot as u32, *generation), value)),
            Entry::Vacant { .. } => None,
        })
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (Key<T>, &mut T)> {
        self.entries.iter_mut().enumerate().filter_map(|(slot, entry)| match entry {
            Entry::Occupied { generation, value } => {
                Some((Key::new(slot as u32, *generation), value))
            }
            Entry::Vacant { .. } => None,
        })
    }

    /// Keys of the values matching `filter`, collected so the arena can be mutated afterwards
    pub(crate) fn keys_where(&self, mut filter: impl FnMut(&T) -> bool) -> Vec<Key<T>> {
        self.iter().filter(|(_, value)| filter(value)).map(|(key, _)| key).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_key_finds_nothing() {
        let mut arena = Arena::new();
        let first = arena.insert("first");
        assert_eq!(arena.remove(first), Some("first"));
        let second = arena.insert("second");
        // same slot, new generation
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&"second"));
        assert_ne!(first, second);
        assert_eq!(arena.remove(first), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn insert_with_sees_its_key() {
        let mut arena = Arena::new();
        let key = arena.insert_with(|key| key);
        assert_eq!(arena.get(key), Some(&key));
    }

    #[test]
    fn free_slots_are_reused() {
        let mut arena = Arena::new();
        let keys: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.remove(keys[1]);
        arena.remove(keys[3]);
        assert_eq!(arena.len(), 2);
        arena.insert(10);
        arena.insert(11);
        arena.insert(12);
        let mut values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        values.sort();
        assert_eq!(values, vec![0, 2, 10, 11, 12]);
        assert_eq!(arena.keys_where(|v| *v >= 10).len(), 3);
    }
}
