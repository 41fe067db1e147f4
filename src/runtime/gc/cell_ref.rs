/// Reference to a cell on the guest heap.
///
/// `generation` tells successive occupants of one slot apart, so a
/// reference to a reclaimed cell stays detectable after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl CellRef {
    /// The permanent `NULL` cell, always slot 0.
    pub const NIL: CellRef = CellRef {
        index: 0,
        generation: 0,
    };

    /// Returns the raw heap slot index backing this reference.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn is_nil(self) -> bool {
        self == CellRef::NIL
    }

    #[cfg(test)]
    pub fn new_for_test(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}
