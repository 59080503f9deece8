//! Region elision and signature validation for Kestrel.
//!
//! # Architecture
//!
//! - [`ElisionContext`]: hands out fresh region names per item
//! - [`elide`] / [`elide_fn`]: the positional elision rules for signatures
//! - [`elide_fields`]: elided regions in struct and enum field types
//! - [`validate_outputs`]: every output region must trace back to an input
//!
//! Elision runs after the region graph is built and before it is sealed, so
//! the regions it creates are declared in the graph like any other.

mod context;
mod elide;
mod error;

pub use context::ElisionContext;
pub use elide::{
    Elided, elide, elide_fields, elide_fn, elide_signatures, elide_type_defs, validate_outputs,
};
pub use error::{ElisionError, ElisionResult};
