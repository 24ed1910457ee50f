//! Lock-free, single-producer overwrite ring of opaque byte records.
//!
//! This is the hot-path storage primitive underneath the log store: one
//! writer per [`Ring`] publishes records without ever blocking, and any
//! number of readers may take a newest-first snapshot at any time.

mod invariants;
mod ring;

pub use ring::{Ring, RingReader};
