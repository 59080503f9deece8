//! Places: a local plus a projection path.

use ks_intern::{Interner, Symbol};
use std::fmt;

/// Place where a value is stored and can be borrowed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Place {
    /// Base local variable
    pub base: Symbol,
    /// Projection (field access, deref, indexing, ...)
    pub projection: Vec<PlaceElem>,
}

/// Place projection element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceElem {
    /// Dereference (`place.*`)
    Deref,
    /// Named field (`place.field`); tuple fields use their index as name
    Field(Symbol),
    /// Single element of a sequential container (`place[3]`)
    Index(u64),
    /// Half-open index range of a sequential container (`place[2..5]`)
    Range {
        /// First index (inclusive)
        start: u64,
        /// Last index (exclusive)
        end: u64,
    },
    /// Payload of an enum variant (`place@Some`)
    Downcast(Symbol),
}

impl Place {
    /// Creates a simple place from a local
    #[must_use]
    pub fn from_local(base: Symbol) -> Self {
        Self {
            base,
            projection: Vec::new(),
        }
    }

    /// Returns this place extended by one projection element.
    #[must_use]
    pub fn project(&self, elem: PlaceElem) -> Self {
        let mut projection = self.projection.clone();
        projection.push(elem);
        Self {
            base: self.base,
            projection,
        }
    }

    /// Returns `true` if `self` is a (non-strict) prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.base == other.base
            && self.projection.len() <= other.projection.len()
            && self
                .projection
                .iter()
                .zip(&other.projection)
                .all(|(lhs, rhs)| lhs == rhs)
    }

    /// The whole enum value a variant projection points into.
    ///
    /// Writing the discriminant replaces every variant payload at once, so a
    /// discriminant write on `x@Some.0` is a write to `x`.
    #[must_use]
    pub fn enum_root(&self) -> Self {
        match self
            .projection
            .iter()
            .rposition(|elem| matches!(elem, PlaceElem::Downcast(_)))
        {
            Some(pos) => Self {
                base: self.base,
                projection: self.projection[..pos].to_vec(),
            },
            None => self.clone(),
        }
    }

    /// Returns `true` if the projection goes through a dereference.
    #[must_use]
    pub fn has_deref(&self) -> bool {
        self.projection.contains(&PlaceElem::Deref)
    }

    /// Renders the place with names resolved through `interner`.
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a Interner) -> PlaceDisplay<'a> {
        PlaceDisplay {
            place: self,
            interner,
        }
    }
}

/// Display adapter for [`Place`].
pub struct PlaceDisplay<'a> {
    place: &'a Place,
    interner: &'a Interner,
}

impl fmt::Display for PlaceDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interner.resolve(&self.place.base))?;
        for elem in &self.place.projection {
            match elem {
                PlaceElem::Deref => f.write_str(".*")?,
                PlaceElem::Field(name) => write!(f, ".{}", self.interner.resolve(name))?,
                PlaceElem::Index(idx) => write!(f, "[{idx}]")?,
                PlaceElem::Range { start, end } => write!(f, "[{start}..{end}]")?,
                PlaceElem::Downcast(variant) => {
                    write!(f, "@{}", self.interner.resolve(variant))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_root_strips_last_downcast() {
        let interner = Interner::new();
        let opt = interner.intern("opt");
        let place = Place::from_local(opt)
            .project(PlaceElem::Downcast(interner.intern("Some")))
            .project(PlaceElem::Field(interner.intern("0")));

        assert_eq!(place.display(&interner).to_string(), "opt@Some.0");
        assert_eq!(place.enum_root(), Place::from_local(opt));
    }

    #[test]
    fn test_prefix() {
        let interner = Interner::new();
        let x = Place::from_local(interner.intern("x"));
        let field = x.project(PlaceElem::Field(interner.intern("a")));
        assert!(x.is_prefix_of(&field));
        assert!(!field.is_prefix_of(&x));
        assert!(field.is_prefix_of(&field));
    }
}
