//! Region graph for Kestrel.
//!
//! Every region parameter declared by a type constructor or function
//! signature becomes a node; declared bounds (`'b: 'a`) become edges. The
//! graph answers `outlives` queries for the variance engine, elision and
//! the borrow tracker, and is sealed before borrow checking starts.

mod error;
mod graph;
mod region;

pub use error::{RegionError, RegionResult};
pub use graph::RegionGraph;
pub use region::{RegionData, RegionId, RegionScope};
