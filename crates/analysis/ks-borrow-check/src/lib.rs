//! Borrow checking for Kestrel function bodies.
//!
//! # Architecture
//!
//! - [`LoanSet`]: live loans of one body and the per-place [`PlaceState`]
//! - [`places_overlap`]: conservative aliasing between two places
//! - [`DisjointnessProver`] / [`ProverRegistry`]: pluggable proofs that two
//!   places never alias
//! - [`BorrowChecker`]: walks each body's operations, enforcing exclusivity
//!   of mutable loans, checking returns against the signature, and
//!   handling splits and iterators
//! - [`check_one_shot_privacy`]: definition-time encapsulation rule for
//!   one-shot iterator types
//!
//! The checker consumes the elided unit, the sealed region graph and the
//! solved variance table.

mod checker;
mod disjoint;
mod error;
mod loans;
mod privacy;

pub use checker::BorrowChecker;
pub use disjoint::{DisjointnessProof, DisjointnessProver, FieldProver, ProverRegistry, RangeProver};
pub use error::{BorrowError, BorrowResult};
pub use loans::{Access, Loan, LoanId, LoanOrigin, LoanRegion, LoanSet, PlaceState, places_overlap};
pub use privacy::check_one_shot_privacy;
