use crate::runtime::gc::{cell_ref::CellRef, guest_object::GuestObject};

pub(crate) struct HeapEntry {
    pub(crate) object: GuestObject,
    pub(crate) attrib: CellRef,
    pub(crate) marked: bool,
}

/// One heap slot. The generation survives while the slot is free.
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) entry: Option<HeapEntry>,
}

impl Slot {
    pub(crate) fn holds(&self, cell: CellRef) -> bool {
        self.generation == cell.generation && self.entry.is_some()
    }
}
