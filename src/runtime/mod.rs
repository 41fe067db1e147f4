//! The bridge between host code and the guest heap.
//!
//! # Lifetimes
//! Every guest cell the host touches is reached through one of two owners:
//!
//! - a [`Region`](region::Region), which protects everything obtained
//!   through it until the outermost region exits. [`Handle`](handle::Handle)s
//!   borrow the region's lifetime and cannot outlive it.
//! - an [`Automatic`](automatic::Automatic) link, which keeps its cell alive
//!   for as long as some host clone of the link exists.
//!
//! The guest collector never frees a cell that is protected, linked, or
//! reachable from a guest root such as the global environment.
//!
//! # Threads
//! The heap is confined to the guest worker thread. Host threads reach it by
//! submitting jobs through [`global`] or a [`Worker`](worker::Worker); jobs run
//! one at a time in submission order.

pub mod automatic;
pub mod evaluator;
pub mod form;
pub mod gc;
pub mod global;
pub mod handle;
pub mod leak_detector;
pub mod literal;
pub mod region;
pub mod session;
pub mod value;
pub mod view;
pub mod worker;
