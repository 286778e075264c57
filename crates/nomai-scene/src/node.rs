//! Node handles and the arena that stores live nodes.
//!
//! Despawning a node retires its [`NodeId`]: the slot is reused for later
//! spawns, but under a new generation, so a handle kept across a despawn
//! reports the node as gone instead of resolving to its successor.

use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Handle to a node in a [`SceneWorld`](crate::world::SceneWorld).
///
/// Valid until the node is despawned. Displays as `slot@generation`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Arena slot the node lives in. Shared by every node that ever
    /// occupied the slot.
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// How many earlier nodes occupied the same slot.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({self})")
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slot, self.generation)
    }
}

// ---------------------------------------------------------------------------
// NodeArena
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by [`NodeId`].
///
/// Free slots are recycled in FIFO order so generations are spread across
/// slots rather than concentrated on one hot index.
#[derive(Debug)]
pub struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free: VecDeque<u32>,
    len: usize,
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            len: 0,
        }
    }

    /// Store `value` and return its handle.
    pub fn insert(&mut self, value: T) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop_front() {
            // Generation was already bumped on removal.
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            NodeId::new(index, 0)
        }
    }

    /// Remove the value behind `id`, invalidating every copy of the handle.
    ///
    /// Returns `None` if the handle was already stale.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.slot() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(id.slot());
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.slot() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_returns_unique_indices() {
        let mut arena = NodeArena::new();
        let ids: Vec<NodeId> = (0..100).map(|i| arena.insert(i)).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.slot()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 100);
        assert_eq!(arena.len(), 100);
    }

    #[test]
    fn generation_increments_on_recycle() {
        let mut arena = NodeArena::new();
        let a = arena.insert("a");
        assert_eq!(arena.remove(a), Some("a"));
        let b = arena.insert("b");
        assert_eq!(b.slot(), a.slot());
        assert_eq!(b.generation(), 1);
    }

    #[test]
    fn stale_handle_resolves_dead() {
        let mut arena = NodeArena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let _b = arena.insert(2);
        assert!(!arena.contains(a), "stale handle must not alias the new value");
        assert_eq!(arena.get(a), None);
    }

    #[test]
    fn double_remove_returns_none() {
        let mut arena = NodeArena::new();
        let a = arena.insert(1);
        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn node_id_displays_slot_and_generation() {
        let id = NodeId::new(42, 7);
        assert_eq!(id.slot(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(id.to_string(), "42@7");
        assert_eq!(format!("{id:?}"), "Node(42@7)");
    }
}
