//! The variance lattice.
//!
//! ```text
//!        Bivariant
//!       /         \
//!  Covariant   Contravariant
//!       \         /
//!        Invariant
//! ```
//!
//! Inference starts every parameter at the top and only moves down, so the
//! fixed point is reached after at most two changes per parameter.

use derive_more::Display;

/// How subtyping of a parameter propagates through a type constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Variance {
    /// `T <: U` implies `C<T> <: C<U>`
    #[display("covariant")]
    Covariant,
    /// `T <: U` implies `C<U> <: C<T>`
    #[display("contravariant")]
    Contravariant,
    /// No subtyping relation through `C`
    #[display("invariant")]
    Invariant,
    /// Parameter unused; any relation holds
    #[display("bivariant")]
    Bivariant,
}

impl Variance {
    /// Variance of a use nested at `inner` inside a position of variance
    /// `self`.
    #[must_use]
    pub fn xform(self, inner: Self) -> Self {
        match (self, inner) {
            (Self::Covariant, inner) => inner,

            (Self::Contravariant, Self::Covariant) => Self::Contravariant,
            (Self::Contravariant, Self::Contravariant) => Self::Covariant,
            (Self::Contravariant, Self::Invariant) => Self::Invariant,
            (Self::Contravariant, Self::Bivariant) => Self::Bivariant,

            (Self::Invariant, _) => Self::Invariant,

            (Self::Bivariant, _) => Self::Bivariant,
        }
    }

    /// Greatest lower bound; combines two uses of the same parameter.
    #[must_use]
    pub fn glb(self, other: Self) -> Self {
        match (self, other) {
            (Self::Invariant, _)
            | (_, Self::Invariant)
            | (Self::Covariant, Self::Contravariant)
            | (Self::Contravariant, Self::Covariant) => Self::Invariant,
            (Self::Covariant, Self::Covariant) => Self::Covariant,
            (Self::Contravariant, Self::Contravariant) => Self::Contravariant,
            (x, Self::Bivariant) | (Self::Bivariant, x) => x,
        }
    }

    /// Whether the parameter is never used.
    #[must_use]
    pub fn is_bivariant(self) -> bool {
        matches!(self, Self::Bivariant)
    }
}

#[cfg(test)]
mod tests {
    use super::Variance::{Bivariant, Contravariant, Covariant, Invariant};

    #[test]
    fn test_xform_double_negation() {
        assert_eq!(Contravariant.xform(Contravariant), Covariant);
        assert_eq!(Covariant.xform(Contravariant), Contravariant);
        assert_eq!(Contravariant.xform(Invariant), Invariant);
        assert_eq!(Invariant.xform(Covariant), Invariant);
    }

    #[test]
    fn test_glb_invariance_wins() {
        for v in [Covariant, Contravariant, Invariant, Bivariant] {
            assert_eq!(v.glb(Invariant), Invariant);
            assert_eq!(v.glb(Bivariant), v);
        }
        assert_eq!(Covariant.glb(Contravariant), Invariant);
    }
}
