//! Automatic links: guest cells kept alive by host ownership.
//!
//! Creating a link adds one precious reference to the cell. The link is
//! reference counted on the host side; when the last clone is dropped the
//! cell is queued for release. The queue is drained on the guest worker
//! before every job and before every explicit collection, so the guest heap
//! is only ever touched from its own thread even if the last clone dies on
//! another one.

use std::{fmt, marker::PhantomData, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::BridgeError,
    runtime::{
        form::{FormMarker, forms::Any},
        gc::cell_ref::CellRef,
        handle::{Handle, RawHandle},
        leak_detector,
        region::Region,
    },
};

/// Epoch carried by raw handles of automatic links. Region epochs start at 1.
pub(crate) const AUTOMATIC_EPOCH: u64 = 0;

/// Cells whose host owner has gone away, waiting for the guest thread.
#[derive(Default)]
pub(crate) struct FinalizerQueue {
    pending: Mutex<Vec<CellRef>>,
}

impl FinalizerQueue {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, cell: CellRef) {
        self.pending.lock().push(cell);
    }

    pub(crate) fn drain(&self) -> Vec<CellRef> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

struct AutomaticLink {
    cell: CellRef,
    session: u64,
    queue: Arc<FinalizerQueue>,
}

impl Drop for AutomaticLink {
    fn drop(&mut self) {
        self.queue.push(self.cell);
        leak_detector::record_link_finalized();
        log::trace!("automatic link to {:?} finalized", self.cell);
    }
}

/// A guest cell whose lifetime follows host ownership.
///
/// Unlike a [`Handle`], an `Automatic` is not bound to a region: it can be
/// stored, cloned, and moved across threads. To look at the cell, bring it
/// back into a region with [`Region::adopt`].
pub struct Automatic<F: FormMarker = Any> {
    link: Arc<AutomaticLink>,
    _form: PhantomData<fn() -> F>,
}

impl<F: FormMarker> Automatic<F> {
    pub fn cell(&self) -> CellRef {
        self.link.cell
    }

    /// Erased identity. Rebinding it succeeds while any clone of this link
    /// (or another link to the same cell) is alive.
    pub fn raw(&self) -> RawHandle {
        RawHandle {
            cell: self.link.cell,
            epoch: AUTOMATIC_EPOCH,
            session: self.link.session,
        }
    }

    pub fn erase(self) -> Automatic<Any> {
        Automatic {
            link: self.link,
            _form: PhantomData,
        }
    }

    /// Number of host owners sharing this link.
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.link)
    }
}

impl<F: FormMarker> Clone for Automatic<F> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            _form: PhantomData,
        }
    }
}

impl<F: FormMarker, G: FormMarker> PartialEq<Automatic<G>> for Automatic<F> {
    fn eq(&self, other: &Automatic<G>) -> bool {
        self.link.session == other.link.session && self.link.cell == other.link.cell
    }
}

impl<F: FormMarker> Eq for Automatic<F> {}

impl<F: FormMarker> fmt::Debug for Automatic<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = F::FORM.map_or("any", |form| form.label());
        write!(
            f,
            "Automatic<{}>(#{}.{})",
            form,
            self.link.cell.index(),
            self.link.cell.generation()
        )
    }
}

impl<'r> Region<'r> {
    /// Promotes a region handle to an automatic link.
    ///
    /// The cell gains a precious reference that outlives the region and is
    /// dropped once every clone of the returned link is gone and the guest
    /// worker has drained its finalizer queue.
    pub fn automatic<F: FormMarker>(&self, handle: Handle<'r, F>) -> Automatic<F> {
        let session = self.session();
        session.heap_mut().preserve(self.cell_of(handle));
        leak_detector::record_link_created();
        Automatic {
            link: Arc::new(AutomaticLink {
                cell: self.cell_of(handle),
                session: session.id(),
                queue: Arc::clone(session.finalizers()),
            }),
            _form: PhantomData,
        }
    }

    /// Brings an automatic link back into this region.
    ///
    /// Fails with [`BridgeError::UseAfterRegionRelease`] if the link belongs
    /// to another session.
    pub fn adopt<F: FormMarker>(&self, link: &Automatic<F>) -> Result<Handle<'r, F>, BridgeError> {
        if link.link.session != self.session().id() {
            return Err(BridgeError::UseAfterRegionRelease);
        }
        Ok(self.protect(link.cell()))
    }
}
