//! Allocation and collection metrics for the guest heap.
//!
//! Only built with the `gc-telemetry` feature; without it the heap carries
//! no telemetry state at all.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::runtime::form::Form;

/// Cells allocated for one form since the heap was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormAllocs {
    pub cells: usize,
    pub bytes: usize,
}

/// Root set sizes seen at the start of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RootCounts {
    pub permanent: usize,
    pub protected: usize,
    pub precious: usize,
    pub symbols: usize,
}

impl RootCounts {
    pub fn total(&self) -> usize {
        self.permanent + self.protected + self.precious + self.symbols
    }
}

#[derive(Debug, Clone)]
pub struct Cycle {
    pub index: usize,
    pub elapsed: Duration,
    pub roots: RootCounts,
    pub live_before: usize,
    pub live_after: usize,
    /// Allocation threshold before and after the collector adapted it.
    pub threshold: (usize, usize),
}

impl Cycle {
    pub fn reclaimed(&self) -> usize {
        self.live_before.saturating_sub(self.live_after)
    }
}

struct OpenCycle {
    started: Instant,
    threshold: usize,
    roots: RootCounts,
}

#[derive(Default)]
pub struct GcTelemetry {
    allocs: HashMap<Form, FormAllocs>,
    cycles: Vec<Cycle>,
    open: Option<OpenCycle>,
}

impl GcTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alloc(&mut self, form: Form, bytes: usize) {
        let entry = self.allocs.entry(form).or_default();
        entry.cells += 1;
        entry.bytes += bytes;
    }

    pub fn begin_cycle(&mut self, threshold: usize, roots: RootCounts) {
        self.open = Some(OpenCycle {
            started: Instant::now(),
            threshold,
            roots,
        });
    }

    /// Closes the cycle opened by [`begin_cycle`](Self::begin_cycle). Does
    /// nothing if none is open.
    pub fn end_cycle(&mut self, live_before: usize, live_after: usize, threshold: usize) {
        let Some(open) = self.open.take() else {
            return;
        };
        self.cycles.push(Cycle {
            index: self.cycles.len(),
            elapsed: open.started.elapsed(),
            roots: open.roots,
            live_before,
            live_after,
            threshold: (open.threshold, threshold),
        });
    }

    pub fn allocs(&self, form: Form) -> FormAllocs {
        self.allocs.get(&form).copied().unwrap_or_default()
    }

    pub fn total_cells(&self) -> usize {
        self.allocs.values().map(|a| a.cells).sum()
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Plain-text table of allocations by form, then one line per cycle.
    pub fn report(&self) -> String {
        let mut forms: Vec<_> = self.allocs.iter().collect();
        forms.sort_by_key(|(form, _)| form.code());

        let mut out = format!("{:<12} {:>9} {:>11}\n", "form", "cells", "bytes");
        for (form, a) in forms {
            out += &format!("{:<12} {:>9} {:>11}\n", form.label(), a.cells, a.bytes);
        }
        out += &format!("{} collections\n", self.cycles.len());
        for cycle in &self.cycles {
            out += &format!(
                "#{} {}us roots={} live {}->{} threshold {}->{}\n",
                cycle.index,
                cycle.elapsed.as_micros(),
                cycle.roots.total(),
                cycle.live_before,
                cycle.live_after,
                cycle.threshold.0,
                cycle.threshold.1,
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_bucketed_by_form() {
        let mut telemetry = GcTelemetry::new();
        telemetry.record_alloc(Form::Real, 64);
        telemetry.record_alloc(Form::Real, 64);
        telemetry.record_alloc(Form::List, 48);

        assert_eq!(telemetry.allocs(Form::Real), FormAllocs { cells: 2, bytes: 128 });
        assert_eq!(telemetry.allocs(Form::Env).cells, 0);
        assert_eq!(telemetry.total_cells(), 3);
    }

    #[test]
    fn cycle_keeps_roots_and_thresholds() {
        let mut telemetry = GcTelemetry::new();
        let roots = RootCounts {
            permanent: 3,
            protected: 4,
            precious: 1,
            symbols: 2,
        };
        telemetry.begin_cycle(1024, roots);
        telemetry.end_cycle(100, 40, 2048);

        let cycle = &telemetry.cycles()[0];
        assert_eq!(cycle.reclaimed(), 60);
        assert_eq!(cycle.roots.total(), 10);
        assert_eq!(cycle.threshold, (1024, 2048));
        assert!(telemetry.report().contains("1 collections"));
    }

    #[test]
    fn unmatched_end_is_ignored() {
        let mut telemetry = GcTelemetry::new();
        telemetry.end_cycle(5, 5, 10);
        assert!(telemetry.cycles().is_empty());
    }
}
