//! Loan tracking for borrow checking.

use derive_more::Display;
use indexmap::IndexMap;
use ks_intern::Symbol;
use ks_ir::{BorrowKind, Place, PlaceElem};
use ks_region::RegionId;
use ks_span::FileSpan;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Identifier of a loan within one function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("L{_0}")]
pub struct LoanId(pub u32);

/// How long a loan may live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanRegion {
    /// Bounded by the lexical scope (by depth) binding the borrowed local.
    Scope(usize),
    /// Bounded by a region parameter of the function.
    Param(RegionId),
}

/// Operation that created a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoanOrigin {
    /// An explicit borrow of a place
    #[display("borrow")]
    Borrow,
    /// One half of a validated split
    #[display("split")]
    Split {
        /// The loan that was split
        parent: LoanId,
    },
    /// An element yielded by an iterator
    #[display("yield")]
    IterYield {
        /// Iterator name
        iter: Symbol,
        /// Step that produced the element
        index: u64,
    },
}

/// A loan represents an active borrow.
///
/// The loan's kind is its lifetime class: a loan created mutable stays
/// exclusive even when every handle holding it only reads through it.
#[derive(Debug, Clone)]
pub struct Loan {
    /// Identifier
    pub id: LoanId,
    /// The place being borrowed
    pub place: Place,
    /// The kind of borrow
    pub kind: BorrowKind,
    /// How long the loan may live
    pub region: LoanRegion,
    /// Source location where the borrow occurred
    pub span: FileSpan,
    /// What created the loan
    pub origin: LoanOrigin,
    /// Loans this one was carved out of, nearest first
    pub ancestors: SmallVec<[LoanId; 2]>,
    /// Number of handles, iterators and parked values holding the loan
    pub holders: u32,
}

impl Loan {
    /// Creates a new loan held once, by the handle it is bound to.
    #[must_use]
    pub fn new(
        id: LoanId,
        place: Place,
        kind: BorrowKind,
        region: LoanRegion,
        span: FileSpan,
    ) -> Self {
        Self {
            id,
            place,
            kind,
            region,
            span,
            origin: LoanOrigin::Borrow,
            ancestors: SmallVec::new(),
            holders: 1,
        }
    }

    /// Whether the loan was carved out of `other`.
    #[must_use]
    pub fn descends_from(&self, other: LoanId) -> bool {
        self.ancestors.contains(&other)
    }

    fn lineage(&self) -> impl Iterator<Item = LoanId> + '_ {
        std::iter::once(self.id).chain(self.ancestors.iter().copied())
    }
}

/// Borrow state of a place, summarizing the live loans overlapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PlaceState {
    /// No live loan overlaps the place
    #[display("not borrowed")]
    Unborrowed,
    /// Only shared loans overlap the place
    #[display("borrowed as shared")]
    SharedBorrowed(usize),
    /// A mutable loan overlaps the place
    #[display("borrowed as mutable")]
    MutablyBorrowed,
}

/// An access to a place checked against the live loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Conflicts with mutable loans
    Read,
    /// Conflicts with every loan
    Write,
    /// A write through a runtime-checked cell; conflicts with mutable loans
    InteriorWrite,
}

impl Access {
    /// The access a new loan of `kind` performs on its place.
    #[must_use]
    pub fn of_borrow(kind: BorrowKind) -> Self {
        if kind.is_mutable() { Self::Write } else { Self::Read }
    }

    fn conflicts_with(self, kind: BorrowKind) -> bool {
        match self {
            Self::Read | Self::InteriorWrite => kind.is_mutable(),
            Self::Write => true,
        }
    }
}

/// Set of live loans in one function body.
///
/// Loans stay live while something holds them; the set removes a loan once
/// its last holder releases it. Iteration follows creation order.
///
/// Pairs marked disjoint outlive the loans themselves, so loans carved out
/// of two disjoint siblings stay disjoint after the siblings end.
#[derive(Debug, Clone, Default)]
pub struct LoanSet {
    loans: IndexMap<LoanId, Loan>,
    disjoint: FxHashSet<(LoanId, LoanId)>,
    next_id: u32,
}

impl LoanSet {
    /// Creates an empty loan set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ks_borrow_check::LoanSet;
    ///
    /// let loans = LoanSet::new();
    /// assert!(loans.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if a new loan of `kind` on `place` would conflict with a live
    /// loan.
    ///
    /// Returns the first conflicting loan. `proven` reports place pairs
    /// covered by a disjointness proof.
    ///
    /// # Conflict Rules
    ///
    /// - Shared + Shared = OK
    /// - Shared + Mutable = Conflict
    /// - Mutable + Shared = Conflict
    /// - Mutable + Mutable = Conflict
    #[must_use]
    pub fn check_loan(
        &self,
        place: &Place,
        kind: BorrowKind,
        proven: impl Fn(&Place, &Place) -> bool,
    ) -> Option<&Loan> {
        self.check_access(place, Access::of_borrow(kind), proven)
    }

    /// Checks an access to `place` against every live loan.
    #[must_use]
    pub fn check_access(
        &self,
        place: &Place,
        access: Access,
        proven: impl Fn(&Place, &Place) -> bool,
    ) -> Option<&Loan> {
        self.loans.values().find(|loan| {
            places_overlap(&loan.place, place)
                && access.conflicts_with(loan.kind)
                && !proven(&loan.place, place)
        })
    }

    /// Checks a loan carved out by [`LoanSet::add_derived`] against every
    /// other live loan.
    ///
    /// Derived loans skip the conflict check at creation, so an aliasing
    /// pair of exclusive loans is caught here instead. Loans in the same
    /// lineage and loans descending from a disjoint pair never conflict.
    #[must_use]
    pub fn check_derived(
        &self,
        id: LoanId,
        proven: impl Fn(&Place, &Place) -> bool,
    ) -> Option<&Loan> {
        let derived = self.loans.get(&id)?;
        self.loans.values().find(|loan| {
            loan.id != id
                && (loan.kind.is_mutable() || derived.kind.is_mutable())
                && places_overlap(&loan.place, &derived.place)
                && !self.are_exempt(derived, loan)
                && !proven(&loan.place, &derived.place)
        })
    }

    /// Whether two loans may coexist regardless of their places: one was
    /// carved out of the other, or they descend from loans marked disjoint.
    #[must_use]
    pub fn are_exempt(&self, a: &Loan, b: &Loan) -> bool {
        if a.descends_from(b.id) || b.descends_from(a.id) {
            return true;
        }
        a.lineage()
            .any(|x| b.lineage().any(|y| self.disjoint.contains(&ordered(x, y))))
    }

    /// Adds a loan held by one handle and returns its identifier.
    pub fn add_loan(
        &mut self,
        place: Place,
        kind: BorrowKind,
        region: LoanRegion,
        span: FileSpan,
    ) -> LoanId {
        let id = LoanId(self.next_id);
        self.next_id += 1;
        self.loans.insert(id, Loan::new(id, place, kind, region, span));
        id
    }

    /// Carves a new loan on `place` out of `parent`.
    ///
    /// The new loan inherits the parent's kind and region and never
    /// conflicts with it or its ancestors. Returns `None` if `parent` is not
    /// live.
    pub fn add_derived(
        &mut self,
        parent: LoanId,
        place: Place,
        origin: LoanOrigin,
        span: FileSpan,
    ) -> Option<LoanId> {
        let source = self.loans.get(&parent)?;
        let (kind, region) = (source.kind, source.region);
        let mut ancestors = SmallVec::with_capacity(source.ancestors.len() + 1);
        ancestors.push(parent);
        ancestors.extend(source.ancestors.iter().copied());

        let id = self.add_loan(place, kind, region, span);
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.origin = origin;
            loan.ancestors = ancestors;
        }
        Some(id)
    }

    /// Records that two loans do not alias.
    pub fn mark_disjoint(&mut self, a: LoanId, b: LoanId) {
        self.disjoint.insert(ordered(a, b));
    }

    /// Overrides a live loan's region.
    pub fn set_region(&mut self, id: LoanId, region: LoanRegion) {
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.region = region;
        }
    }

    /// Adds a holder to a live loan.
    pub fn hold(&mut self, id: LoanId) {
        if let Some(loan) = self.loans.get_mut(&id) {
            loan.holders += 1;
        }
    }

    /// Drops one holder; returns `true` if this ended the loan.
    pub fn release(&mut self, id: LoanId) -> bool {
        let Some(loan) = self.loans.get_mut(&id) else {
            return false;
        };
        loan.holders = loan.holders.saturating_sub(1);
        if loan.holders == 0 {
            self.loans.shift_remove(&id);
            return true;
        }
        false
    }

    /// Looks up a live loan.
    #[must_use]
    pub fn get(&self, id: LoanId) -> Option<&Loan> {
        self.loans.get(&id)
    }

    /// Whether the loan is still live.
    #[must_use]
    pub fn is_live(&self, id: LoanId) -> bool {
        self.loans.contains_key(&id)
    }

    /// Borrow state of `place`.
    #[must_use]
    pub fn state_of(&self, place: &Place) -> PlaceState {
        let mut shared = 0;
        for loan in self.loans.values() {
            if !places_overlap(&loan.place, place) {
                continue;
            }
            if loan.kind.is_mutable() {
                return PlaceState::MutablyBorrowed;
            }
            shared += 1;
        }
        if shared == 0 {
            PlaceState::Unborrowed
        } else {
            PlaceState::SharedBorrowed(shared)
        }
    }

    /// Returns all live loans in creation order.
    pub fn loans(&self) -> impl Iterator<Item = &Loan> + '_ {
        self.loans.values()
    }

    /// Returns the number of live loans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loans.len()
    }

    /// Returns `true` if there are no live loans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

fn ordered(a: LoanId, b: LoanId) -> (LoanId, LoanId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Checks if two places may overlap in memory.
///
/// Places overlap if they share a base local and neither projection moves
/// away from the other: `x` and `x.field` overlap, `x.a` and `x.b` do not.
/// Indices and ranges are assumed to alias; telling them apart takes a
/// disjointness proof.
#[must_use]
pub fn places_overlap(place1: &Place, place2: &Place) -> bool {
    if place1.base != place2.base {
        return false;
    }

    for (lhs, rhs) in place1.projection.iter().zip(&place2.projection) {
        match (lhs, rhs) {
            (PlaceElem::Field(f1), PlaceElem::Field(f2))
            | (PlaceElem::Downcast(f1), PlaceElem::Downcast(f2)) => {
                if f1 != f2 {
                    return false;
                }
            }
            (
                PlaceElem::Index(_) | PlaceElem::Range { .. },
                PlaceElem::Index(_) | PlaceElem::Range { .. },
            ) => {
                if lhs != rhs {
                    return true;
                }
            }
            (PlaceElem::Deref, PlaceElem::Deref) => {}
            // Different projection kinds at the same level name different
            // parts of the value.
            _ => return false,
        }
    }

    true
}
