use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::marker::PhantomData;

/// Unique identifier with generation tracking to prevent stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Typed handle stored in an [`Arena`].
pub trait ArenaHandle: Copy + Eq {
    fn from_id(id: GenerationalId) -> Self;
    fn id(&self) -> GenerationalId;

    fn index(&self) -> usize {
        self.id().index
    }

    fn generation(&self) -> u32 {
        self.id().generation
    }
}

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub GenerationalId);

        impl $name {
            pub fn new(index: usize, generation: u32) -> Self {
                Self(GenerationalId::new(index, generation))
            }

            pub fn index(&self) -> usize {
                self.0.index
            }

            pub fn generation(&self) -> u32 {
                self.0.generation
            }
        }

        impl ArenaHandle for $name {
            fn from_id(id: GenerationalId) -> Self {
                Self(id)
            }

            fn id(&self) -> GenerationalId {
                self.0
            }
        }
    };
}

arena_handle!(
    /// Handle to a rigid body owned by the world.
    BodyHandle
);
arena_handle!(
    /// Handle to a collider attached to a body.
    ColliderHandle
);
arena_handle!(
    /// Handle to a joint between one or two bodies.
    JointHandle
);
arena_handle!(
    /// Handle to a persistent contact between two colliders.
    ContactHandle
);

/// Generational arena that hands out stable IDs while preventing use-after-free.
#[derive(Debug, Clone)]
pub struct Arena<H, T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    len: usize,
    _handle: PhantomData<H>,
}

impl<H: ArenaHandle, T> Default for Arena<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ArenaHandle, T> Arena<H, T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            len: 0,
            _handle: PhantomData,
        }
    }

    pub fn insert(&mut self, item: T) -> H {
        self.insert_with(|_| item)
    }

    /// Inserts a value built from its own handle, so the stored item can carry it.
    pub fn insert_with(&mut self, build: impl FnOnce(H) -> T) -> H {
        self.len += 1;
        if let Some(index) = self.free_list.pop_front() {
            let handle = H::from_id(GenerationalId::new(index, self.generations[index]));
            self.items[index] = Some(build(handle));
            return handle;
        }

        let index = self.items.len();
        let handle = H::from_id(GenerationalId::new(index, 0));
        self.items.push(Some(build(handle)));
        self.generations.push(0);
        handle
    }

    pub fn get(&self, id: H) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: H) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index()).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn get2_mut(&mut self, id_a: H, id_b: H) -> Option<(&mut T, &mut T)> {
        if id_a.index() == id_b.index() {
            return None;
        }

        if !self.is_valid(id_a) || !self.is_valid(id_b) {
            return None;
        }

        let (first, second, flipped) = if id_a.index() < id_b.index() {
            (id_a, id_b, false)
        } else {
            (id_b, id_a, true)
        };

        let (left, right) = self.items.split_at_mut(second.index());
        let first_slot = left.get_mut(first.index()).and_then(|slot| slot.as_mut())?;
        let second_slot = right.get_mut(0).and_then(|slot| slot.as_mut())?;

        if flipped {
            Some((second_slot, first_slot))
        } else {
            Some((first_slot, second_slot))
        }
    }

    pub fn remove(&mut self, id: H) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index())?;
        let item = slot.take()?;
        self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
        self.free_list.push_back(id.index());
        self.len -= 1;
        Some(item)
    }

    pub fn contains(&self, id: H) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.items.iter().enumerate().filter_map(move |(index, slot)| {
            slot.as_ref().map(|item| {
                (
                    H::from_id(GenerationalId::new(index, self.generations[index])),
                    item,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> + '_ {
        let generations = &self.generations;
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(move |(index, slot)| {
                slot.as_mut().map(|item| {
                    (
                        H::from_id(GenerationalId::new(index, generations[index])),
                        item,
                    )
                })
            })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.iter_mut().filter_map(|slot| slot.as_mut())
    }

    /// Handles of all live items in slot order.
    pub fn handles(&self) -> impl Iterator<Item = H> + '_ {
        self.iter().map(|(handle, _)| handle)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_valid(&self, id: H) -> bool {
        self.generations
            .get(id.index())
            .copied()
            .map(|gen| gen == id.generation())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stale_handles_are_rejected_after_reuse() {
        let mut arena: Arena<BodyHandle, &str> = Arena::new();
        let first = arena.insert("a");
        assert_eq!(arena.remove(first), Some("a"));

        let second = arena.insert("b");
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second), Some(&"b"));
        assert!(arena.remove(first).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get2_mut_preserves_argument_order() {
        let mut arena: Arena<BodyHandle, i32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        let (second, first) = arena.get2_mut(b, a).expect("distinct live handles");
        *second += 10;
        *first += 100;
        assert_eq!(arena.get(a), Some(&101));
        assert_eq!(arena.get(b), Some(&12));
        assert!(arena.get2_mut(a, a).is_none());
    }

    #[test]
    fn insert_with_sees_its_own_handle() {
        let mut arena: Arena<JointHandle, JointHandle> = Arena::new();
        let handle = arena.insert_with(|h| h);
        assert_eq!(arena.get(handle), Some(&handle));
    }

    proptest! {
        #[test]
        fn live_handles_never_alias(ops in prop::collection::vec(any::<bool>(), 1..64)) {
            let mut arena: Arena<ColliderHandle, u32> = Arena::new();
            let mut live: Vec<ColliderHandle> = Vec::new();
            for (step, insert) in ops.into_iter().enumerate() {
                if insert || live.is_empty() {
                    live.push(arena.insert(step as u32));
                } else {
                    let handle = live.remove(step % live.len());
                    prop_assert!(arena.remove(handle).is_some());
                }
            }
            let mut seen = std::collections::HashSet::new();
            for handle in &live {
                prop_assert!(seen.insert(handle.index()));
                prop_assert!(arena.contains(*handle));
            }
            prop_assert_eq!(arena.len(), live.len());
        }
    }
}
