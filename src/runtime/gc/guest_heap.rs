use std::{collections::HashMap, rc::Rc};

use serde::Serialize;

#[cfg(feature = "gc-telemetry")]
use crate::runtime::gc::telemetry::{GcTelemetry, RootCounts};
use crate::{
    config::Config,
    runtime::{
        form::Form,
        gc::{
            cell_ref::CellRef,
            guest_object::GuestObject,
            heap_entry::{HeapEntry, Slot},
        },
    },
};

pub(crate) const DEFAULT_GC_THRESHOLD: usize = 10_000;
const MIN_GC_THRESHOLD: usize = 1024;
const MAX_GC_THRESHOLD: usize = 1_000_000;

/// Point-in-time counters of the guest heap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub live: usize,
    pub capacity: usize,
    pub free: usize,
    /// Depth of the protect stack.
    pub protected: usize,
    /// Sum of precious counts (automatic links not yet released).
    pub precious: usize,
    pub symbols: usize,
    pub total_allocations: usize,
    pub total_collections: usize,
    pub gc_threshold: usize,
}

/// The guest heap and its stop-the-world mark-and-sweep collector.
///
/// Roots are the permanent cells (`NULL`, `NA_STRING`, environments the
/// session registers), the protect stack used by regions, the precious
/// multiset used by automatic links, and the symbol table. Interned `Char`
/// cells are held weakly: the cache drops entries whose cell was swept.
///
/// Collection runs before an allocation once the allocation count reaches the
/// threshold, or before every allocation in torture mode.
pub struct GuestHeap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    protect_stack: Vec<CellRef>,
    precious: HashMap<CellRef, usize>,
    permanent: Vec<CellRef>,
    symbols: HashMap<Rc<str>, CellRef>,
    chars: HashMap<Rc<str>, CellRef>,
    na_string: CellRef,
    allocation_count: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    gc_torture: bool,
    total_collections: usize,
    total_allocations: usize,
    #[cfg(feature = "gc-telemetry")]
    telemetry: GcTelemetry,
}

impl Default for GuestHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestHeap {
    /// Creates a heap with default collection settings.
    ///
    /// Defaults:
    /// - threshold: `10_000` allocations
    /// - GC enabled: `true`
    /// - torture: `false`
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_GC_THRESHOLD)
    }

    /// Creates a heap with a custom allocation threshold.
    ///
    /// Unlike [`Self::set_threshold`], this does not clamp to `MIN_GC_THRESHOLD`.
    pub fn with_threshold(threshold: usize) -> Self {
        let mut heap = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            protect_stack: Vec::new(),
            precious: HashMap::new(),
            permanent: Vec::new(),
            symbols: HashMap::new(),
            chars: HashMap::new(),
            na_string: CellRef::NIL,
            allocation_count: 0,
            gc_threshold: threshold,
            gc_enabled: true,
            gc_torture: false,
            total_collections: 0,
            total_allocations: 0,
            #[cfg(feature = "gc-telemetry")]
            telemetry: GcTelemetry::new(),
        };

        let nil = heap.place(GuestObject::Nil);
        debug_assert_eq!(nil, CellRef::NIL);
        heap.permanent.push(nil);

        // NA_STRING is deliberately not in the Char cache: the string "NA"
        // and the missing string are different values.
        let na = heap.place(GuestObject::Char(Rc::from("NA")));
        heap.permanent.push(na);
        heap.na_string = na;

        heap
    }

    pub fn from_config(config: &Config) -> Self {
        let mut heap = Self::with_threshold(config.gc_threshold);
        heap.gc_enabled = config.gc_enabled;
        heap.gc_torture = config.gc_torture;
        heap
    }

    /// Enables or disables threshold-triggered collection.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled
    }

    /// Sets the allocation threshold that triggers collection.
    ///
    /// Values below `MIN_GC_THRESHOLD` are clamped upward.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold.max(MIN_GC_THRESHOLD)
    }

    /// Forces a full collection before every allocation.
    pub fn set_torture(&mut self, torture: bool) {
        self.gc_torture = torture
    }

    pub fn should_collect(&self) -> bool {
        self.gc_torture || (self.gc_enabled && self.allocation_count >= self.gc_threshold)
    }

    /// Allocates a cell, collecting first when due.
    ///
    /// Every cell referenced by `object` must already be reachable from a
    /// root, since a collection may run before the new cell exists.
    pub fn alloc(&mut self, object: GuestObject) -> CellRef {
        if self.should_collect() {
            self.collect();
        }
        self.allocation_count += 1;
        self.total_allocations += 1;

        #[cfg(feature = "gc-telemetry")]
        self.telemetry
            .record_alloc(object.form(), object.shallow_size_bytes());

        self.place(object)
    }

    fn place(&mut self, object: GuestObject) -> CellRef {
        let entry = HeapEntry {
            object,
            attrib: CellRef::NIL,
            marked: false,
        };

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            CellRef {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            CellRef {
                index,
                generation: 0,
            }
        }
    }

    pub fn is_live(&self, cell: CellRef) -> bool {
        self.slots
            .get(cell.index as usize)
            .is_some_and(|slot| slot.holds(cell))
    }

    fn entry(&self, cell: CellRef) -> Option<&HeapEntry> {
        self.slots
            .get(cell.index as usize)
            .filter(|slot| slot.generation == cell.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, cell: CellRef) -> &mut HeapEntry {
        self.slots
            .get_mut(cell.index as usize)
            .filter(|slot| slot.generation == cell.generation)
            .and_then(|slot| slot.entry.as_mut())
            .unwrap_or_else(|| panic!("GuestHeap: stale or free cell {:?}", cell))
    }

    pub fn try_get(&self, cell: CellRef) -> Option<&GuestObject> {
        self.entry(cell).map(|entry| &entry.object)
    }

    /// Returns the payload of a live cell.
    ///
    /// Panics if the cell was reclaimed: reading a reclaimed cell is a
    /// protection bug, and crashing beats reading whatever reused the slot.
    pub fn get(&self, cell: CellRef) -> &GuestObject {
        match self.try_get(cell) {
            Some(object) => object,
            None => panic!("GuestHeap::get: stale or free cell {:?}", cell),
        }
    }

    pub fn get_mut(&mut self, cell: CellRef) -> &mut GuestObject {
        &mut self.entry_mut(cell).object
    }

    pub fn form(&self, cell: CellRef) -> Form {
        self.get(cell).form()
    }

    pub fn attrib(&self, cell: CellRef) -> CellRef {
        self.entry(cell)
            .map(|entry| entry.attrib)
            .unwrap_or_else(|| panic!("GuestHeap::attrib: stale or free cell {:?}", cell))
    }

    pub fn set_attrib(&mut self, cell: CellRef, attrib: CellRef) {
        self.entry_mut(cell).attrib = attrib;
    }

    // -- Protection --

    pub fn protect(&mut self, cell: CellRef) {
        self.protect_stack.push(cell);
    }

    pub fn protect_depth(&self) -> usize {
        self.protect_stack.len()
    }

    /// Pops the protect stack back to `depth`, returning how many entries
    /// were released.
    pub fn unprotect_to(&mut self, depth: usize) -> usize {
        let released = self.protect_stack.len().saturating_sub(depth);
        self.protect_stack.truncate(depth);
        released
    }

    /// Adds one precious reference to `cell`.
    pub fn preserve(&mut self, cell: CellRef) {
        *self.precious.entry(cell).or_insert(0) += 1;
    }

    /// Drops one precious reference. Returns `false` if `cell` held none.
    pub fn release(&mut self, cell: CellRef) -> bool {
        match self.precious.get_mut(&cell) {
            Some(count) => {
                *count -= 1;
                if *count == 0 {
                    self.precious.remove(&cell);
                }
                true
            }
            None => false,
        }
    }

    pub fn precious_count(&self, cell: CellRef) -> usize {
        self.precious.get(&cell).copied().unwrap_or(0)
    }

    /// Registers a cell that lives as long as the heap.
    pub fn add_permanent(&mut self, cell: CellRef) {
        self.permanent.push(cell);
    }

    // -- Strings and symbols --

    pub fn na_string(&self) -> CellRef {
        self.na_string
    }

    /// Returns the shared `Char` cell for `text`, allocating it on first use.
    pub fn intern_char(&mut self, text: &str) -> CellRef {
        if let Some(cell) = self.chars.get(text) {
            return *cell;
        }
        let text: Rc<str> = Rc::from(text);
        let cell = self.alloc(GuestObject::Char(text.clone()));
        self.chars.insert(text, cell);
        cell
    }

    /// Returns the symbol named `name`, creating it on first use.
    pub fn install(&mut self, name: &str) -> CellRef {
        if let Some(cell) = self.symbols.get(name) {
            return *cell;
        }
        let pname = self.intern_char(name);
        self.protect(pname);
        let symbol = self.alloc(GuestObject::Symbol {
            pname,
            value: CellRef::NIL,
            internal: CellRef::NIL,
        });
        self.protect_stack.pop();
        self.symbols.insert(Rc::from(name), symbol);
        symbol
    }

    /// Name of a symbol cell, or `None` if `cell` is not a symbol.
    pub fn symbol_name(&self, cell: CellRef) -> Option<Rc<str>> {
        match self.try_get(cell)? {
            GuestObject::Symbol { pname, .. } => match self.try_get(*pname)? {
                GuestObject::Char(text) => Some(text.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    // -- Collection --

    /// Returns the number of currently live cells.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }

    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live: self.live_count(),
            capacity: self.slots.len(),
            free: self.free_list.len(),
            protected: self.protect_stack.len(),
            precious: self.precious.values().sum(),
            symbols: self.symbols.len(),
            total_allocations: self.total_allocations,
            total_collections: self.total_collections,
            gc_threshold: self.gc_threshold,
        }
    }

    #[cfg(feature = "gc-telemetry")]
    pub fn telemetry(&self) -> &GcTelemetry {
        &self.telemetry
    }

    /// Runs a full stop-the-world mark-and-sweep collection.
    pub fn collect(&mut self) {
        #[cfg(feature = "gc-telemetry")]
        {
            let roots = RootCounts {
                permanent: self.permanent.len(),
                protected: self.protect_stack.len(),
                precious: self.precious.len(),
                symbols: self.symbols.len(),
            };
            self.telemetry.begin_cycle(self.gc_threshold, roots);
        }

        let live_before = self.live_count();
        self.mark_roots();
        self.sweep();
        let live_after = self.live_count();
        let collected = live_before.saturating_sub(live_after);

        self.total_collections += 1;
        self.allocation_count = 0;
        self.adapt_threshold(collected, live_before);

        #[cfg(feature = "gc-telemetry")]
        self.telemetry
            .end_cycle(live_before, live_after, self.gc_threshold);

        log::debug!(
            "guest gc: cycle {} reclaimed {} of {} cells (threshold {})",
            self.total_collections,
            collected,
            live_before,
            self.gc_threshold
        );
    }

    fn mark_roots(&mut self) {
        let mut worklist: Vec<CellRef> = Vec::with_capacity(64);
        worklist.extend(self.permanent.iter().copied());
        worklist.extend(self.protect_stack.iter().copied());
        worklist.extend(self.precious.keys().copied());
        worklist.extend(self.symbols.values().copied());

        while let Some(cell) = worklist.pop() {
            self.mark_cell(cell, &mut worklist);
        }
    }

    fn mark_cell(&mut self, cell: CellRef, worklist: &mut Vec<CellRef>) {
        let Some(slot) = self.slots.get_mut(cell.index as usize) else {
            return;
        };
        if slot.generation != cell.generation {
            return;
        }
        let Some(entry) = slot.entry.as_mut() else {
            return;
        };
        // Mark first so cycles and shared cells are visited once.
        if entry.marked {
            return;
        }
        entry.marked = true;
        worklist.push(entry.attrib);
        entry.object.for_each_child(|child| worklist.push(child));
    }

    fn sweep(&mut self) {
        let mut i = 0;
        let len = self.slots.len();
        while i < len {
            let slot = &mut self.slots[i];
            if let Some(entry) = &mut slot.entry {
                if entry.marked {
                    entry.marked = false;
                } else {
                    slot.entry = None;
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free_list.push(i as u32);
                }
            }
            i += 1;
        }

        let slots = &self.slots;
        self.chars.retain(|_, cell| {
            slots
                .get(cell.index as usize)
                .is_some_and(|slot| slot.holds(*cell))
        });
    }

    fn adapt_threshold(&mut self, collected: usize, total_before: usize) {
        if total_before == 0 || self.gc_torture {
            return;
        }

        let ratio = collected as f64 / total_before as f64;
        if ratio < 0.25 {
            self.gc_threshold = (self.gc_threshold * 2).min(MAX_GC_THRESHOLD);
        } else if ratio > 0.75 {
            self.gc_threshold = (self.gc_threshold / 2).max(MIN_GC_THRESHOLD)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn real(heap: &mut GuestHeap, value: f64) -> CellRef {
        heap.alloc(GuestObject::Real(Rc::new(RefCell::new(vec![value]))))
    }

    fn cons(heap: &mut GuestHeap, car: CellRef, cdr: CellRef) -> CellRef {
        heap.alloc(GuestObject::List {
            car,
            cdr,
            tag: CellRef::NIL,
        })
    }

    #[test]
    fn test_alloc_and_get() {
        let mut heap = GuestHeap::new();
        let cell = real(&mut heap, 1.5);
        match heap.get(cell) {
            GuestObject::Real(data) => assert_eq!(*data.borrow(), vec![1.5]),
            other => panic!("expected Real, got {:?}", other.form()),
        }
        // NULL and NA_STRING are always present.
        assert_eq!(heap.live_count(), 3);
    }

    #[test]
    fn test_collect_frees_unprotected() {
        let mut heap = GuestHeap::new();
        for i in 0..100 {
            real(&mut heap, i as f64);
        }
        assert_eq!(heap.live_count(), 102);

        heap.collect();
        assert_eq!(heap.live_count(), 2);
        assert_eq!(heap.free_list.len(), 100);
    }

    #[test]
    fn test_collect_preserves_protected() {
        let mut heap = GuestHeap::new();
        let kept = real(&mut heap, 42.0);
        heap.protect(kept);
        for i in 0..50 {
            real(&mut heap, i as f64);
        }

        heap.collect();
        assert_eq!(heap.live_count(), 3);
        assert!(heap.is_live(kept));

        heap.unprotect_to(0);
        heap.collect();
        assert!(!heap.is_live(kept));
    }

    #[test]
    fn test_reused_slot_rejects_old_reference() {
        let mut heap = GuestHeap::new();
        let old = real(&mut heap, 1.0);
        heap.collect();
        let new = real(&mut heap, 2.0);

        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(heap.try_get(old).is_none());
        assert!(heap.is_live(new));
    }

    #[test]
    #[should_panic(expected = "stale or free cell")]
    fn test_get_on_reclaimed_cell_panics() {
        let mut heap = GuestHeap::new();
        let cell = real(&mut heap, 1.0);
        heap.collect();
        heap.get(cell);
    }

    #[test]
    fn test_collect_traces_nested_pairlist() {
        let mut heap = GuestHeap::new();
        let a = real(&mut heap, 1.0);
        heap.protect(a);
        let b = real(&mut heap, 2.0);
        heap.protect(b);
        let tail = cons(&mut heap, b, CellRef::NIL);
        heap.protect(tail);
        let head = cons(&mut heap, a, tail);
        heap.unprotect_to(0);
        heap.protect(head);

        for _ in 0..10 {
            real(&mut heap, 99.0);
        }
        heap.collect();

        for cell in [a, b, tail, head] {
            assert!(heap.is_live(cell));
        }
        assert_eq!(heap.live_count(), 6);
    }

    #[test]
    fn test_attributes_are_traced() {
        let mut heap = GuestHeap::new();
        let value = real(&mut heap, 1.0);
        heap.protect(value);
        let names = heap.intern_char("names");
        heap.set_attrib(value, names);

        heap.collect();
        assert!(heap.is_live(names));
        assert_eq!(heap.attrib(value), names);
    }

    #[test]
    fn test_precious_is_a_multiset() {
        let mut heap = GuestHeap::new();
        let cell = real(&mut heap, 1.0);
        heap.preserve(cell);
        heap.preserve(cell);
        assert_eq!(heap.precious_count(cell), 2);

        assert!(heap.release(cell));
        heap.collect();
        assert!(heap.is_live(cell));

        assert!(heap.release(cell));
        assert!(!heap.release(cell));
        heap.collect();
        assert!(!heap.is_live(cell));
    }

    #[test]
    fn test_char_cache_is_weak() {
        let mut heap = GuestHeap::new();
        let first = heap.intern_char("hello");
        assert_eq!(heap.intern_char("hello"), first);

        heap.collect();
        assert!(!heap.is_live(first));
        let second = heap.intern_char("hello");
        assert!(heap.is_live(second));
        assert_ne!(first, second);
    }

    #[test]
    fn test_na_string_differs_from_na_text() {
        let mut heap = GuestHeap::new();
        let text = heap.intern_char("NA");
        assert_ne!(text, heap.na_string());
    }

    #[test]
    fn test_symbols_are_roots() {
        let mut heap = GuestHeap::new();
        let x = heap.install("x");
        heap.collect();
        assert!(heap.is_live(x));
        assert_eq!(heap.install("x"), x);
        assert_eq!(heap.symbol_name(x).as_deref(), Some("x"));
    }

    #[test]
    fn test_should_collect_respects_threshold() {
        let mut heap = GuestHeap::with_threshold(5);
        assert!(!heap.should_collect());
        for _ in 0..5 {
            real(&mut heap, 0.0);
        }
        assert!(heap.should_collect());
    }

    #[test]
    fn test_should_collect_respects_enabled() {
        let mut heap = GuestHeap::with_threshold(2);
        for _ in 0..5 {
            heap.alloc(GuestObject::Nil);
        }
        assert!(heap.should_collect());

        heap.set_enabled(false);
        assert!(!heap.should_collect());
    }

    #[test]
    fn test_torture_collects_before_every_allocation() {
        let mut heap = GuestHeap::new();
        heap.set_torture(true);
        let unprotected = real(&mut heap, 1.0);
        real(&mut heap, 2.0);
        assert!(!heap.is_live(unprotected));
        assert_eq!(heap.total_collections(), 2);
    }

    #[test]
    fn test_adaptive_threshold_doubles_on_low_collection() {
        let mut heap = GuestHeap::with_threshold(MIN_GC_THRESHOLD);
        let initial = heap.gc_threshold;
        for i in 0..10 {
            let cell = real(&mut heap, i as f64);
            heap.protect(cell);
        }

        heap.collect();
        assert_eq!(heap.gc_threshold, initial * 2);
    }

    #[test]
    fn test_adaptive_threshold_halves_on_high_collection() {
        let mut heap = GuestHeap::with_threshold(100_000);
        let initial = heap.gc_threshold;
        for i in 0..100 {
            real(&mut heap, i as f64);
        }

        heap.collect();
        assert_eq!(heap.gc_threshold, initial / 2);
    }

    #[test]
    fn test_stress_100k_allocations() {
        let mut heap = GuestHeap::with_threshold(1024);
        let mut live = real(&mut heap, 0.0);
        heap.protect(live);

        for i in 1..100_000 {
            real(&mut heap, i as f64);

            if i % 10_000 == 0 {
                heap.unprotect_to(0);
                live = real(&mut heap, i as f64);
                heap.protect(live);
            }
        }

        heap.collect();
        assert!(heap.is_live(live));
        assert!(
            heap.live_count() <= 5,
            "Expected <= 5 live cells, got {}",
            heap.live_count()
        );
        assert!(heap.total_collections() > 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut heap = GuestHeap::new();
        let cell = real(&mut heap, 1.0);
        heap.protect(cell);
        heap.preserve(cell);

        let stats = heap.stats();
        assert_eq!(stats.live, 3);
        assert_eq!(stats.protected, 1);
        assert_eq!(stats.precious, 1);
        assert_eq!(stats.total_allocations, 1);
    }

    #[cfg(feature = "gc-telemetry")]
    #[test]
    fn test_telemetry_records_cycles() {
        let mut heap = GuestHeap::new();
        real(&mut heap, 1.0);
        heap.collect();
        assert_eq!(heap.telemetry().cycles().len(), 1);
        assert_eq!(heap.telemetry().allocs(Form::Real).cells, 1);
    }
}
