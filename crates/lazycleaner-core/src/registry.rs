//! Registry of live registrations.
//!
//! Design:
//! - Intrusive doubly linked list laid over an arena (`Vec<Slot>`); links are
//!   slot indices, not pointers.
//! - Insert links at the head, removal splices from any position. Both O(1).
//! - Removal vacates the slot and bumps its generation. A `NodeKey` carrying the
//!   old generation is a tombstone: removing it again is a no-op.
//! - Invariant: `count` == number of linked slots, `head` is None iff `count` == 0.
//!
//! The registry itself is not synchronized; `CleanerCore` keeps it behind the
//! same mutex as the worker's running flag.

use crate::domain::NodeKey;

/// Cleanup action stored with a node. The flag is `true` when the owner became
/// unreachable without releasing the resource.
pub type BoxedAction = Box<dyn FnOnce(bool) -> anyhow::Result<()> + Send + 'static>;

struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    action: Option<BoxedAction>,
}

struct Slot {
    generation: u64,
    /// None while vacant (never used, or removed and waiting for reuse).
    link: Option<Link>,
}

pub(crate) struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    count: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            count: 0,
        }
    }

    /// Link a new node at the head of the list.
    pub(crate) fn insert(&mut self, action: Option<BoxedAction>) -> NodeKey {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    link: None,
                });
                self.slots.len() - 1
            }
        };

        let next = self.head;
        if let Some(old_head) = next
            && let Some(link) = self.slots[old_head].link.as_mut()
        {
            link.prev = Some(index);
        }

        let slot = &mut self.slots[index];
        slot.link = Some(Link {
            prev: None,
            next,
            action,
        });
        self.head = Some(index);
        self.count += 1;

        NodeKey::new(index, slot.generation)
    }

    /// Unlink the node behind `key`.
    ///
    /// Returns `None` if the node was already removed, otherwise the action it
    /// carried (which is itself `None` for sentinel nodes). Only the first call
    /// for a given key ever returns `Some`.
    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<Option<BoxedAction>> {
        let slot = self.slots.get_mut(key.index())?;
        if slot.generation != key.generation() {
            return None;
        }
        let link = slot.link.take()?;
        slot.generation += 1;
        self.free.push(key.index());

        match link.prev {
            Some(prev) => {
                if let Some(prev_link) = self.slots[prev].link.as_mut() {
                    prev_link.next = link.next;
                }
            }
            None => self.head = link.next,
        }
        if let Some(next) = link.next
            && let Some(next_link) = self.slots[next].link.as_mut()
        {
            next_link.prev = link.prev;
        }

        self.count -= 1;
        Some(link.action)
    }

    pub(crate) fn contains(&self, key: NodeKey) -> bool {
        self.slots
            .get(key.index())
            .is_some_and(|slot| slot.generation == key.generation() && slot.link.is_some())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Slot indices in list order, head first.
    #[cfg(test)]
    fn walk(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        let mut prev = None;
        while let Some(index) = cursor {
            let link = self.slots[index].link.as_ref().expect("linked slot");
            assert_eq!(link.prev, prev, "prev link of slot {index} is inconsistent");
            out.push(index);
            prev = Some(index);
            cursor = link.next;
        }
        assert_eq!(out.len(), self.count, "count drifted from list length");
        out
    }
}
