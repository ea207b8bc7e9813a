//! Arena for the two heap-allocated runtime shapes, arrays and structs
//! (§11). Grounded directly on the teacher's simpler, pre-generational
//! `Heap` (`src/heap.rs`): a `Vec<Option<HeapObject>>` with refcounting and
//! no slot reuse within a run, just `clear()` between runs.

use ahash::AHashMap;

use crate::runtime::value::Value;

/// Unique identifier for an object stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// What actually lives behind a [`HeapId`].
#[derive(Debug, Clone)]
pub enum HeapData {
    Array(Vec<Value>),
    Struct { type_name: String, fields: AHashMap<String, Value> },
}

#[derive(Debug, Clone)]
struct HeapObject {
    refcount: usize,
    data: HeapData,
}

/// A point-in-time copy of the whole heap arena, taken by
/// [`Heap::snapshot`] and reapplied by [`Heap::restore`] when a top-level
/// call attempt is discarded and replayed (§4.3.4).
#[derive(Debug, Clone)]
pub struct HeapSnapshot {
    objects: Vec<Option<HeapObject>>,
}

/// Reference-counted arena backing [`Value::Array`](crate::runtime::value::Value::Array)
/// and [`Value::Struct`](crate::runtime::value::Value::Struct). IDs are never
/// reused within a single interpreter run; `clear()` resets the arena between runs.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Option<HeapObject>>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = u32::try_from(self.objects.len()).expect("heap exceeds u32 object count");
        self.objects.push(Some(HeapObject { refcount: 1, data }));
        HeapId(id)
    }

    /// # Panics
    /// Panics if `id` is invalid or already freed.
    pub fn inc_ref(&mut self, id: HeapId) {
        self.slot_mut(id).refcount += 1;
    }

    /// Decrements the reference count, freeing the object (and recursively
    /// any array elements/struct fields it alone kept alive) once it hits
    /// zero.
    ///
    /// # Panics
    /// Panics if `id` is invalid or already freed.
    pub fn dec_ref(&mut self, id: HeapId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = self
                .objects
                .get_mut(current.0 as usize)
                .expect("Heap::dec_ref: slot missing");
            let entry = slot.as_mut().expect("Heap::dec_ref: object already freed");
            if entry.refcount > 1 {
                entry.refcount -= 1;
                continue;
            }
            if let Some(object) = slot.take() {
                enqueue_children(&object.data, &mut stack);
            }
        }
    }

    /// # Panics
    /// Panics if `id` is invalid or already freed.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.slot(id).data
    }

    /// # Panics
    /// Panics if `id` is invalid or already freed.
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slot_mut(id).data
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Copies every slot (including freed ones) so array/struct mutations
    /// made after this point can be undone wholesale by [`Heap::restore`].
    #[must_use]
    pub fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot {
            objects: self.objects.clone(),
        }
    }

    /// Overwrites the arena with `snapshot`, undoing any allocation or
    /// in-place mutation performed since it was taken.
    pub fn restore(&mut self, snapshot: &HeapSnapshot) {
        self.objects.clone_from(&snapshot.objects);
    }

    fn slot(&self, id: HeapId) -> &HeapObject {
        self.objects
            .get(id.0 as usize)
            .expect("Heap: slot missing")
            .as_ref()
            .expect("Heap: object already freed")
    }

    fn slot_mut(&mut self, id: HeapId) -> &mut HeapObject {
        self.objects
            .get_mut(id.0 as usize)
            .expect("Heap: slot missing")
            .as_mut()
            .expect("Heap: object already freed")
    }
}

fn enqueue_children(data: &HeapData, stack: &mut Vec<HeapId>) {
    let values: Box<dyn Iterator<Item = &Value> + '_> = match data {
        HeapData::Array(elements) => Box::new(elements.iter()),
        HeapData::Struct { fields, .. } => Box::new(fields.values()),
    };
    for value in values {
        match value {
            Value::Array(id) | Value::Struct(id) => stack.push(*id),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_get_round_trips() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapData::Array(vec![Value::Int32(1), Value::Int32(2)]));
        match heap.get(id) {
            HeapData::Array(elements) => assert_eq!(elements.len(), 2),
            HeapData::Struct { .. } => panic!("expected array"),
        }
    }

    #[test]
    fn dec_ref_frees_at_zero() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapData::Array(vec![]));
        heap.inc_ref(id);
        heap.dec_ref(id);
        // still alive, one ref remaining
        let _ = heap.get(id);
        heap.dec_ref(id);
    }

    #[test]
    fn restore_undoes_mutations_made_after_the_snapshot() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapData::Array(vec![Value::Int32(0)]));
        let snapshot = heap.snapshot();

        match heap.get_mut(id) {
            HeapData::Array(elements) => elements[0] = Value::Int32(1),
            HeapData::Struct { .. } => unreachable!(),
        }
        let other = heap.allocate(HeapData::Array(vec![]));

        heap.restore(&snapshot);
        match heap.get(id) {
            HeapData::Array(elements) => assert_eq!(elements[0].as_i64(), Some(0)),
            HeapData::Struct { .. } => panic!("expected array"),
        }
        // the slot allocated after the snapshot is reclaimed: the next
        // allocation reuses its index rather than growing past it.
        let reused = heap.allocate(HeapData::Array(vec![]));
        assert_eq!(reused, other);
    }
}
