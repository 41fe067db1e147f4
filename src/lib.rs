//! Host-side access to an embedded guest interpreter's heap.
//!
//! ```no_run
//! use crossheap::{Config, global};
//!
//! global::initialize(Config::default()).unwrap();
//! let sum = global::submit(|session| {
//!     session.with_region(|region| {
//!         region.assign("x", region.encode(1.0));
//!         let value = region.eval("x + 1")?;
//!         region.decode::<f64, _>(value)
//!     })
//! })
//! .unwrap();
//! assert_eq!(sum, Ok(2.0));
//! ```

pub mod arith;
pub mod config;
pub mod error;
pub mod runtime;

pub use config::Config;
pub use error::BridgeError;
pub use runtime::{
    automatic::Automatic,
    evaluator::{Evaluator, GuestError},
    form::{Form, FormMarker, forms},
    global,
    handle::{Handle, RawHandle},
    literal::{Decode, Encode, Literal},
    region::Region,
    session::Session,
    value::{Complex, Logical},
    view::{GuestVector, HandleVector, TaggedView},
    worker::Worker,
};
