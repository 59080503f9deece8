//! Disjointness proofs.
//!
//! A proof licenses two loans on the given places to coexist even when
//! [`places_overlap`](crate::places_overlap) has to assume they alias.
//! Provers are pluggable: field and index-range provers ship built in, and
//! callers may register provers for their own container types.

use ks_ir::{Place, PlaceElem};

/// Evidence that two places never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisjointnessProof {
    /// One place
    pub left: Place,
    /// The other place
    pub right: Place,
    /// Name of the prover that produced the proof
    pub prover: String,
}

impl DisjointnessProof {
    /// Whether the proof covers `a` and `b`: every place under `left` is
    /// disjoint from every place under `right`.
    #[must_use]
    pub fn covers(&self, a: &Place, b: &Place) -> bool {
        (self.left.is_prefix_of(a) && self.right.is_prefix_of(b))
            || (self.left.is_prefix_of(b) && self.right.is_prefix_of(a))
    }
}

/// Capability to prove two places disjoint.
pub trait DisjointnessProver {
    /// Prover name
    fn name(&self) -> &str;

    /// Returns a proof that `left` and `right` do not overlap, if one exists.
    fn prove_disjoint(&self, left: &Place, right: &Place) -> Option<DisjointnessProof>;

    /// Wraps a successful check into a proof attributed to this prover.
    fn proof(&self, left: &Place, right: &Place) -> DisjointnessProof {
        DisjointnessProof {
            left: left.clone(),
            right: right.clone(),
            prover: self.name().to_string(),
        }
    }
}

/// First projection step where two places on the same local part ways.
///
/// `None` when the bases differ or one place is a prefix of the other.
fn divergence<'p>(left: &'p Place, right: &'p Place) -> Option<(&'p PlaceElem, &'p PlaceElem)> {
    if left.base != right.base {
        return None;
    }
    left.projection
        .iter()
        .zip(&right.projection)
        .find(|(lhs, rhs)| lhs != rhs)
}

/// Distinct fields of one aggregate, distinct variants of one enum, and
/// distinct locals are disjoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldProver;

impl DisjointnessProver for FieldProver {
    fn name(&self) -> &str {
        "field"
    }

    fn prove_disjoint(&self, left: &Place, right: &Place) -> Option<DisjointnessProof> {
        if left.base != right.base {
            return Some(self.proof(left, right));
        }
        match divergence(left, right)? {
            (PlaceElem::Field(_), PlaceElem::Field(_))
            | (PlaceElem::Downcast(_), PlaceElem::Downcast(_)) => Some(self.proof(left, right)),
            _ => None,
        }
    }
}

/// Non-overlapping indices and index ranges of one sequential container
/// are disjoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeProver;

/// Half-open interval an element covers; inverted ranges cover nothing
/// provable.
fn interval(elem: &PlaceElem) -> Option<(u64, u64)> {
    match *elem {
        PlaceElem::Index(idx) => Some((idx, idx.saturating_add(1))),
        PlaceElem::Range { start, end } if start <= end => Some((start, end)),
        PlaceElem::Range { .. } => None,
        PlaceElem::Deref | PlaceElem::Field(_) | PlaceElem::Downcast(_) => None,
    }
}

impl DisjointnessProver for RangeProver {
    fn name(&self) -> &str {
        "range"
    }

    fn prove_disjoint(&self, left: &Place, right: &Place) -> Option<DisjointnessProof> {
        let (lhs, rhs) = divergence(left, right)?;
        let (l_start, l_end) = interval(lhs)?;
        let (r_start, r_end) = interval(rhs)?;
        let empty = l_start >= l_end || r_start >= r_end;
        (empty || l_end <= r_start || r_end <= l_start).then(|| self.proof(left, right))
    }
}

/// Ordered collection of provers; the first one to succeed wins.
pub struct ProverRegistry {
    provers: Vec<Box<dyn DisjointnessProver>>,
}

impl ProverRegistry {
    /// Create a registry with the built-in provers
    #[must_use]
    pub fn new() -> Self {
        Self::with_provers(vec![Box::new(FieldProver), Box::new(RangeProver)])
    }

    /// Create a registry with specific provers
    #[must_use]
    pub fn with_provers(provers: Vec<Box<dyn DisjointnessProver>>) -> Self {
        Self { provers }
    }

    /// Add a prover
    pub fn add_prover(&mut self, prover: Box<dyn DisjointnessProver>) {
        self.provers.push(prover);
    }

    /// Asks each prover in turn.
    #[must_use]
    pub fn prove(&self, left: &Place, right: &Place) -> Option<DisjointnessProof> {
        self.provers
            .iter()
            .find_map(|prover| prover.prove_disjoint(left, right))
    }

    /// Names of the registered provers.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.provers.iter().map(|prover| prover.name())
    }
}

impl Default for ProverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
