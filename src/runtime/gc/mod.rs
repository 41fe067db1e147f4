//! The guest heap.
//!
//! Cells live in a slot arena addressed by [`CellRef`]. A reference carries
//! the slot's generation, so reading a reclaimed cell is caught even after
//! its slot has been reused.

pub mod cell_ref;
pub mod guest_heap;
pub mod guest_object;
pub(crate) mod heap_entry;
#[cfg(feature = "gc-telemetry")]
pub mod telemetry;

pub use cell_ref::CellRef;
pub use guest_heap::{GuestHeap, HeapStats};
pub use guest_object::{GuestObject, VectorData};
