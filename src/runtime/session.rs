//! The guest session: one heap, one global environment, one evaluator.
//!
//! A session is confined to the thread that created it. In normal use that
//! is the guest worker, and host code reaches the session only through jobs
//! submitted to it.

use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    arith::ArithEvaluator,
    config::Config,
    runtime::{
        automatic::{AUTOMATIC_EPOCH, FinalizerQueue},
        evaluator::Evaluator,
        gc::{
            cell_ref::CellRef,
            guest_heap::{GuestHeap, HeapStats},
            guest_object::GuestObject,
        },
        handle::RawHandle,
        leak_detector,
        region::Region,
    },
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub struct Session {
    id: u64,
    config: Config,
    heap: RefCell<GuestHeap>,
    global_env: CellRef,
    evaluator: Box<dyn Evaluator>,
    finalizers: Arc<FinalizerQueue>,
    region_depth: Cell<usize>,
    region_epoch: Cell<u64>,
    next_epoch: Cell<u64>,
}

impl Session {
    /// Creates a session running the built-in arithmetic evaluator.
    pub fn new(config: Config) -> Self {
        Self::with_evaluator(config, Box::new(ArithEvaluator::new()))
    }

    pub fn with_evaluator(config: Config, evaluator: Box<dyn Evaluator>) -> Self {
        let mut heap = GuestHeap::from_config(&config);
        let global_env = heap.alloc(GuestObject::Env {
            frame: CellRef::NIL,
            enclos: CellRef::NIL,
            hashtab: CellRef::NIL,
        });
        heap.add_permanent(global_env);

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        leak_detector::record_session();
        log::debug!(
            "session {} started (gc threshold {}, torture {})",
            id,
            config.gc_threshold,
            config.gc_torture
        );

        Self {
            id,
            config,
            heap: RefCell::new(heap),
            global_env,
            evaluator,
            finalizers: FinalizerQueue::new(),
            region_depth: Cell::new(0),
            region_epoch: Cell::new(AUTOMATIC_EPOCH),
            next_epoch: Cell::new(AUTOMATIC_EPOCH + 1),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs `body` inside a region.
    ///
    /// Everything allocated or looked up through the region stays protected
    /// until the outermost `with_region` returns or unwinds. Handles cannot
    /// leave `body`; use [`Region::automatic`] or a
    /// [`RawHandle`](crate::runtime::handle::RawHandle) for that.
    pub fn with_region<R>(&self, body: impl FnOnce(&Region<'_>) -> R) -> R {
        let depth = self.region_depth.get();
        if depth > 0 {
            log::trace!("nested region joins region {}", self.region_epoch.get());
            self.region_depth.set(depth + 1);
            let _guard = RegionGuard {
                session: self,
                base: None,
            };
            let region = Region::new(self, self.region_epoch.get());
            return body(&region);
        }

        let epoch = self.next_epoch.get();
        self.next_epoch.set(epoch + 1);
        self.region_epoch.set(epoch);
        self.region_depth.set(1);
        let base = self.heap().protect_depth();
        leak_detector::record_region_open();
        log::debug!("region {} opened at protect depth {}", epoch, base);

        let _guard = RegionGuard {
            session: self,
            base: Some(base),
        };
        let region = Region::new(self, epoch);
        body(&region)
    }

    pub fn in_region(&self) -> bool {
        self.region_depth.get() > 0
    }

    /// Releases finalized automatic links. Returns how many were released.
    pub fn drain_finalizers(&self) -> usize {
        let cells = self.finalizers.drain();
        if cells.is_empty() {
            return 0;
        }
        let mut heap = self.heap_mut();
        let mut released = 0;
        for cell in cells {
            if heap.release(cell) {
                released += 1;
            } else {
                log::warn!("finalized link to {:?} held no precious reference", cell);
            }
        }
        log::trace!("released {} automatic links", released);
        released
    }

    /// Drains finalizers and runs a full collection.
    pub fn collect(&self) {
        self.drain_finalizers();
        self.heap_mut().collect();
    }

    pub fn stats(&self) -> HeapStats {
        self.heap().stats()
    }

    /// Links waiting in the finalizer queue.
    pub fn pending_finalizers(&self) -> usize {
        self.finalizers.len()
    }

    /// Returns whether the cell behind `raw` still exists in this session.
    pub fn is_live(&self, raw: RawHandle) -> bool {
        raw.session == self.id && self.heap().is_live(raw.cell)
    }

    pub(crate) fn heap(&self) -> Ref<'_, GuestHeap> {
        self.heap.borrow()
    }

    pub(crate) fn heap_mut(&self) -> RefMut<'_, GuestHeap> {
        self.heap.borrow_mut()
    }

    pub(crate) fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    pub(crate) fn finalizers(&self) -> &Arc<FinalizerQueue> {
        &self.finalizers
    }

    pub(crate) fn global_env_cell(&self) -> CellRef {
        self.global_env
    }
}

/// Closes a region level on scope exit, including unwinding.
struct RegionGuard<'s> {
    session: &'s Session,
    /// Protect depth to cut back to; `None` for flattened inner levels.
    base: Option<usize>,
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        let depth = self.session.region_depth.get().saturating_sub(1);
        self.session.region_depth.set(depth);
        let Some(base) = self.base else {
            return;
        };
        let epoch = self.session.region_epoch.replace(AUTOMATIC_EPOCH);
        leak_detector::record_region_close();
        match self.session.heap.try_borrow_mut() {
            Ok(mut heap) => {
                let released = heap.unprotect_to(base);
                log::debug!("region {} closed, {} protections released", epoch, released);
            }
            Err(_) => log::warn!("region {} closed while the guest heap was borrowed", epoch),
        }
    }
}
