//! The instance arena and its garbage collector.
//!
//! User objects live in a slot vector addressed by [`InstanceId`]. Ids are
//! stable: collection drops slots in place and growth extends the vector, so
//! a live handle stays valid and equal-comparable across any number of
//! collections. There is no relocation pass and nothing to rewrite.
//!
//! Allocation scans forward from `next_slot` for a free slot; frees happen
//! only during collection, which resets the scan to zero, so no free slot
//! ever sits behind the scan point. The interpreter collects when the arena
//! is full, and the arena doubles when survivors still occupy more than 75%
//! of capacity afterwards.

use ahash::AHashMap;

use crate::{intern::StringId, value::Value};

/// Stable handle to an object slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct InstanceId(u32);

impl InstanceId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A user object: its class and its fields.
#[derive(Debug)]
pub(crate) struct Instance {
    pub class: StringId,
    pub fields: AHashMap<StringId, Value>,
}

/// Point-in-time arena counters, exposed for tests and embedders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of live objects.
    pub live_objects: usize,
    /// Arena capacity in slots.
    pub total_slots: usize,
    /// Number of collection cycles run so far.
    pub collections: u64,
}

/// Capacity of a fresh arena.
const INITIAL_SLOTS: usize = 16;

#[derive(Debug)]
pub(crate) struct Heap {
    slots: Vec<Option<Instance>>,
    /// Allocation scan start; every slot before it is occupied.
    next_slot: usize,
    live: usize,
    collections: u64,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(INITIAL_SLOTS).collect(),
            next_slot: 0,
            live: 0,
            collections: 0,
        }
    }

    /// Whether every slot is occupied; the caller must collect before
    /// allocating again.
    pub fn is_full(&self) -> bool {
        self.live == self.slots.len()
    }

    /// Places a fresh, fieldless instance of `class` into the first free
    /// slot.
    ///
    /// # Panics
    /// Panics if the arena is full; callers check [`Self::is_full`] and
    /// collect first.
    pub fn allocate(&mut self, class: StringId) -> InstanceId {
        for index in self.next_slot..self.slots.len() {
            if self.slots[index].is_none() {
                self.slots[index] = Some(Instance {
                    class,
                    fields: AHashMap::new(),
                });
                self.live += 1;
                self.next_slot = index + 1;
                return InstanceId(index as u32);
            }
        }
        panic!("arena allocation with no free slot; collect first");
    }

    /// Returns the object behind a live handle.
    ///
    /// # Panics
    /// Panics on a dead or out-of-range handle; the interpreter only holds
    /// handles the collector has proven reachable, so this indicates a root
    /// enumeration bug.
    pub fn get(&self, id: InstanceId) -> &Instance {
        self.slots[id.index()].as_ref().expect("stale instance handle")
    }

    pub fn get_mut(&mut self, id: InstanceId) -> &mut Instance {
        self.slots[id.index()].as_mut().expect("stale instance handle")
    }

    /// Mark-and-sweep collection from the given roots, growing the arena
    /// afterwards when survivors still crowd it.
    ///
    /// Marking is a worklist walk over the `Instance`- and `Func`-typed
    /// values of reachable objects' fields; the mark bits live in a side
    /// vector so values never carry collection state.
    pub fn collect(&mut self, roots: Vec<InstanceId>) {
        let mut marked = vec![false; self.slots.len()];
        let mut work_list = roots;

        while let Some(id) = work_list.pop() {
            let index = id.index();
            if marked[index] {
                continue;
            }
            marked[index] = true;
            let instance = self.slots[index]
                .as_ref()
                .expect("reachable handle points at a free slot");
            work_list.extend(instance.fields.values().filter_map(Value::root_id));
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !marked[index] && slot.take().is_some() {
                freed += 1;
            }
        }
        self.live -= freed;

        self.next_slot = 0;
        self.collections += 1;

        // Growth threshold: more than 75% of capacity still live.
        if self.live * 4 > self.slots.len() * 3 {
            let doubled = self.slots.len() * 2;
            self.slots.resize_with(doubled, || None);
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_objects: self.live,
            total_slots: self.slots.len(),
            collections: self.collections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interns;

    fn field_id() -> StringId {
        Interns::CTOR
    }

    #[test]
    fn allocates_into_successive_slots() {
        let mut heap = Heap::new();
        let a = heap.allocate(field_id());
        let b = heap.allocate(field_id());
        assert_ne!(a, b);
        assert_eq!(heap.stats().live_objects, 2);
    }

    #[test]
    fn collect_drops_unreachable_and_reuses_slots() {
        let mut heap = Heap::new();
        let keep = heap.allocate(field_id());
        for _ in 1..INITIAL_SLOTS {
            heap.allocate(field_id());
        }
        assert!(heap.is_full());

        heap.collect(vec![keep]);
        let stats = heap.stats();
        assert_eq!(stats.live_objects, 1);
        assert_eq!(stats.total_slots, INITIAL_SLOTS);
        assert_eq!(stats.collections, 1);

        // The kept handle still resolves after reallocation fills the holes.
        heap.get_mut(keep).fields.insert(field_id(), Value::Num(7.0));
        for _ in 0..INITIAL_SLOTS - 1 {
            heap.allocate(field_id());
        }
        assert_eq!(heap.get(keep).fields[&field_id()], Value::Num(7.0));
    }

    #[test]
    fn marking_follows_fields() {
        let mut heap = Heap::new();
        let root = heap.allocate(field_id());
        let child = heap.allocate(field_id());
        heap.get_mut(root)
            .fields
            .insert(field_id(), Value::Instance(child));

        heap.collect(vec![root]);
        assert_eq!(heap.stats().live_objects, 2);
        assert_eq!(heap.get(child).class, field_id());
    }

    #[test]
    fn grows_when_survivors_crowd_the_arena() {
        let mut heap = Heap::new();
        let ids: Vec<_> = (0..INITIAL_SLOTS).map(|_| heap.allocate(field_id())).collect();
        heap.collect(ids.clone());
        let stats = heap.stats();
        assert_eq!(stats.live_objects, INITIAL_SLOTS);
        assert_eq!(stats.total_slots, INITIAL_SLOTS * 2);
        // Every pre-growth handle still resolves.
        for id in ids {
            assert_eq!(heap.get(id).class, field_id());
        }
    }
}
