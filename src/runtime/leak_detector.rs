//! Process-wide counters for region and automatic-link bookkeeping.
//!
//! Counters only grow; compare two snapshots to see what a piece of code
//! opened and closed.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakStats {
    pub sessions: usize,
    pub regions_opened: usize,
    pub regions_closed: usize,
    pub links_created: usize,
    pub links_finalized: usize,
}

impl LeakStats {
    /// Regions opened but not yet closed.
    pub fn open_regions(&self) -> usize {
        self.regions_opened.saturating_sub(self.regions_closed)
    }

    /// Automatic links whose finalizer has not run.
    pub fn live_links(&self) -> usize {
        self.links_created.saturating_sub(self.links_finalized)
    }
}

static SESSIONS: AtomicUsize = AtomicUsize::new(0);
static REGIONS_OPENED: AtomicUsize = AtomicUsize::new(0);
static REGIONS_CLOSED: AtomicUsize = AtomicUsize::new(0);
static LINKS_CREATED: AtomicUsize = AtomicUsize::new(0);
static LINKS_FINALIZED: AtomicUsize = AtomicUsize::new(0);

pub fn record_session() {
    SESSIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_region_open() {
    REGIONS_OPENED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_region_close() {
    REGIONS_CLOSED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_link_created() {
    LINKS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_link_finalized() {
    LINKS_FINALIZED.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> LeakStats {
    LeakStats {
        sessions: SESSIONS.load(Ordering::Relaxed),
        regions_opened: REGIONS_OPENED.load(Ordering::Relaxed),
        regions_closed: REGIONS_CLOSED.load(Ordering::Relaxed),
        links_created: LINKS_CREATED.load(Ordering::Relaxed),
        links_finalized: LINKS_FINALIZED.load(Ordering::Relaxed),
    }
}
