//! Variance engine for Kestrel.
//!
//! Computes, for every user-defined type constructor, the variance of each
//! region and type parameter from the types of its fields, composing
//! through built-in constructors and other user constructors until a
//! fixed point is reached.

mod builtin;
mod engine;
mod error;
mod subtype;
mod variance;

pub use builtin::Builtins;
pub use engine::{
    DEFAULT_ITERATION_CAP, VarianceEngine, VarianceSolution, VarianceTable, Variances,
    compute_variance,
};
pub use error::VarianceError;
pub use subtype::Subtyping;
pub use variance::Variance;
