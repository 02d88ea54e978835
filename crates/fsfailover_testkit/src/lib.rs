//! # fsfailover testkit
//!
//! Test utilities for fsfailover.
//!
//! This crate provides:
//! - Failover group fixtures over in-memory and on-disk backends, wired to
//!   a queue, a worker and a reconciler
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fsfailover_testkit::prelude::*;
//!
//! #[test]
//! fn replicates_on_write() {
//!     let fixture = MemoryGroup::new(3);
//!     fixture.queued_adapter().write("a.txt", b"data").unwrap();
//!     fixture.drain();
//!     assert_eq!(fixture.contents(2, "a.txt").unwrap(), b"data");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
