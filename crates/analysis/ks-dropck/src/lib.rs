//! Drop check for Kestrel type constructors.
//!
//! A destructor may only touch values of type parameters its type owns;
//! otherwise the type can outlive the data its destructor reads.
//! [`OwnershipTable`] derives ownership from field types to a fixed point
//! and [`DropChecker`] compares it against each destructor's accesses.

mod check;
mod error;
mod ownership;

pub use check::DropChecker;
pub use error::DropError;
pub use ownership::OwnershipTable;
