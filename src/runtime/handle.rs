use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use crate::runtime::{
    form::{FormMarker, forms::Any},
    gc::cell_ref::CellRef,
};

/// Host-side reference to a guest cell.
///
/// `'r` is the lifetime of the region the handle was obtained in. It is
/// invariant and the region body is higher-ranked over it, so a handle can
/// neither be returned out of the region that protects it nor handed to a
/// region of another session. `F` states the cell's form when known.
///
/// ```compile_fail
/// use crossheap::{Config, Session};
///
/// let first = Session::new(Config::default());
/// let second = Session::new(Config::default());
/// first.with_region(|a| {
///     second.with_region(|b| {
///         let values = a.encode(vec![1.0, 2.0]);
///         b.decode::<Vec<f64>, _>(values)
///     })
/// });
/// ```
///
/// A handle owns nothing: it is `Copy`, many handles may alias one cell, and
/// the cell stays alive only because the region protects it. Handles are
/// neither `Send` nor `Sync`; the guest heap is only reachable from the
/// guest worker thread.
pub struct Handle<'r, F: FormMarker = Any> {
    cell: CellRef,
    epoch: u64,
    session: u64,
    _marker: PhantomData<(fn(&'r ()) -> &'r (), *const F)>,
}

impl<'r, F: FormMarker> Handle<'r, F> {
    pub(crate) fn new(cell: CellRef, epoch: u64, session: u64) -> Self {
        Self {
            cell,
            epoch,
            session,
            _marker: PhantomData,
        }
    }

    pub fn cell(self) -> CellRef {
        self.cell
    }

    pub fn is_nil(self) -> bool {
        self.cell.is_nil()
    }

    /// Forgets the static form.
    pub fn erase(self) -> Handle<'r, Any> {
        Handle::new(self.cell, self.epoch, self.session)
    }

    /// Erased, `'static` identity of this handle.
    ///
    /// A raw handle cannot be dereferenced directly; it has to be rebound
    /// with [`Region::rebind`](crate::runtime::region::Region::rebind), which
    /// fails with `UseAfterRegionRelease` once the originating region closed.
    pub fn raw(self) -> RawHandle {
        RawHandle {
            cell: self.cell,
            epoch: self.epoch,
            session: self.session,
        }
    }

    /// Re-tags the handle with form `G` without looking at the cell.
    ///
    /// This is the unchecked counterpart of
    /// [`Region::cast`](crate::runtime::region::Region::cast).
    ///
    /// # Safety
    ///
    /// The cell must actually be of form `G`. Typed accessors that meet a
    /// cell of another form panic, and code holding the handle may act on
    /// the wrong shape before reaching one. Never use this on data that came
    /// from untrusted guest code.
    pub unsafe fn unchecked_cast<G: FormMarker>(self) -> Handle<'r, G> {
        Handle::new(self.cell, self.epoch, self.session)
    }

    pub(crate) fn epoch(self) -> u64 {
        self.epoch
    }

    pub(crate) fn session(self) -> u64 {
        self.session
    }
}

impl<F: FormMarker> Clone for Handle<'_, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: FormMarker> Copy for Handle<'_, F> {}

/// Physical equality: two handles are equal when they refer to the same
/// cell, whatever their static forms.
impl<'r, F: FormMarker, G: FormMarker> PartialEq<Handle<'r, G>> for Handle<'r, F> {
    fn eq(&self, other: &Handle<'r, G>) -> bool {
        self.cell == other.cell
    }
}

impl<F: FormMarker> Eq for Handle<'_, F> {}

impl<F: FormMarker> Hash for Handle<'_, F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cell.hash(state);
    }
}

impl<F: FormMarker> fmt::Debug for Handle<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = F::FORM.map_or("any", |form| form.label());
        write!(
            f,
            "Handle<{}>(#{}.{} @ epoch {})",
            form, self.cell.index, self.cell.generation, self.epoch
        )
    }
}

/// Erased handle identity, safe to move across threads and keep after the
/// region closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle {
    pub(crate) cell: CellRef,
    pub(crate) epoch: u64,
    pub(crate) session: u64,
}

impl RawHandle {
    pub fn cell(self) -> CellRef {
        self.cell
    }

    /// Id of the session that owns the cell.
    pub fn session(self) -> u64 {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::form::forms;

    #[test]
    fn equality_ignores_static_form() {
        let cell = CellRef::new_for_test(7, 0);
        let real: Handle<'_, forms::Real> = Handle::new(cell, 1, 1);
        let any: Handle<'_, Any> = Handle::new(cell, 1, 1);
        assert!(real == any);
        assert_eq!(real.raw(), any.raw());
    }

    #[test]
    fn debug_shows_form_and_cell() {
        let handle: Handle<'_, forms::Int> = Handle::new(CellRef::new_for_test(3, 2), 5, 1);
        assert_eq!(format!("{:?}", handle), "Handle<integer>(#3.2 @ epoch 5)");
    }

    #[test]
    fn unchecked_cast_keeps_identity() {
        let handle: Handle<'_> = Handle::new(CellRef::new_for_test(9, 0), 1, 1);
        let real: Handle<'_, forms::Real> = unsafe { handle.unchecked_cast() };
        assert!(real == handle);
    }
}
