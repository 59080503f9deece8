//! Region identifiers and per-region data.

use ks_intern::Symbol;
use ks_span::FileSpan;
use la_arena::Idx;
use smallvec::SmallVec;

/// Handle to a region stored in a [`RegionGraph`](crate::RegionGraph).
pub type RegionId = Idx<RegionData>;

/// The item a region parameter belongs to.
///
/// Two items may both declare `'a`; they are distinct regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionScope {
    /// Unit-wide regions (only `'static`)
    Global,
    /// Region parameters of a type constructor
    Type(Symbol),
    /// Region parameters of a function signature
    Function(Symbol),
}

impl RegionScope {
    /// Name of the owning item, if any.
    #[must_use]
    pub fn item(self) -> Option<Symbol> {
        match self {
            Self::Global => None,
            Self::Type(name) | Self::Function(name) => Some(name),
        }
    }
}

/// A declared region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionData {
    /// Name without the leading quote
    pub name: Symbol,
    /// Defining scope
    pub scope: RegionScope,
    /// Regions this one is declared to outlive
    pub outlives: SmallVec<[RegionId; 2]>,
    /// Where the declaration came from
    pub span: FileSpan,
}
