//! Reference-typed type expressions.

use ks_intern::{Interner, Symbol};
use std::fmt;

/// A region position inside a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionRef {
    /// Named region parameter (`'a`), stored without the leading quote.
    Named(Symbol),
    /// The `'static` region.
    Static,
    /// Omitted or `'_`; filled in by elision.
    Elided,
    /// Explicitly unconstrained (unsafe-derived) region, `'unbounded`.
    Unbounded,
}

impl RegionRef {
    /// Returns `true` if this position still needs elision.
    #[must_use]
    pub fn is_elided(self) -> bool {
        matches!(self, Self::Elided)
    }

    /// Returns the region name for named regions.
    #[must_use]
    pub fn name(self) -> Option<Symbol> {
        match self {
            Self::Named(name) => Some(name),
            Self::Static | Self::Elided | Self::Unbounded => None,
        }
    }

    /// Renders the region with its leading quote.
    #[must_use]
    pub fn display(self, interner: &Interner) -> RegionDisplay<'_> {
        RegionDisplay {
            region: self,
            interner,
        }
    }
}

/// Shared or mutable access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    /// `&T`, `*const T`
    Shared,
    /// `&mut T`, `*mut T`
    Mut,
}

impl Mutability {
    /// Returns `true` for mutable access.
    #[must_use]
    pub fn is_mut(self) -> bool {
        matches!(self, Self::Mut)
    }
}

/// A type expression in the elaborated IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// Primitive scalar or opaque non-generic type (`u32`, `str`, `String`)
    Prim(Symbol),
    /// Type parameter of the enclosing item
    Param(Symbol),
    /// Reference `&'r T` / `&'r mut T`
    Ref {
        /// Region of the reference
        region: RegionRef,
        /// Shared or mutable
        mutability: Mutability,
        /// Referent type
        target: Box<Ty>,
    },
    /// Raw pointer `*const T` / `*mut T`
    RawPtr {
        /// Const or mut
        mutability: Mutability,
        /// Pointee type
        target: Box<Ty>,
    },
    /// Application of a named type constructor, user-defined or built-in
    Adt {
        /// Constructor name
        name: Symbol,
        /// Region arguments
        regions: Vec<RegionRef>,
        /// Type arguments
        args: Vec<Ty>,
    },
    /// Slice `[T]`
    Slice(Box<Ty>),
    /// Array `[T; N]`
    Array(Box<Ty>, u64),
    /// Tuple `(A, B)`; the empty tuple is unit
    Tuple(Vec<Ty>),
    /// Function pointer `fn(A) -> R`
    FnPtr {
        /// Parameter types
        inputs: Vec<Ty>,
        /// Return type
        output: Box<Ty>,
    },
}

impl Ty {
    /// The unit type `()`.
    #[must_use]
    pub fn unit() -> Self {
        Self::Tuple(Vec::new())
    }

    /// Builds a reference type.
    #[must_use]
    pub fn reference(region: RegionRef, mutability: Mutability, target: Self) -> Self {
        Self::Ref {
            region,
            mutability,
            target: Box::new(target),
        }
    }

    /// Visits every region position, including those inside function pointers.
    pub fn visit_regions(&self, f: &mut impl FnMut(RegionRef)) {
        match self {
            Self::Prim(_) | Self::Param(_) => {}
            Self::Ref { region, target, .. } => {
                f(*region);
                target.visit_regions(f);
            }
            Self::RawPtr { target, .. } | Self::Slice(target) | Self::Array(target, _) => {
                target.visit_regions(f);
            }
            Self::Adt { regions, args, .. } => {
                for region in regions {
                    f(*region);
                }
                for arg in args {
                    arg.visit_regions(f);
                }
            }
            Self::Tuple(elems) => {
                for elem in elems {
                    elem.visit_regions(f);
                }
            }
            Self::FnPtr { inputs, output } => {
                for input in inputs {
                    input.visit_regions(f);
                }
                output.visit_regions(f);
            }
        }
    }

    /// Visits region positions mutably, stopping at function pointer types.
    ///
    /// Regions inside `fn(..) -> ..` are bound by that pointer type and are
    /// reached through [`Ty::visit_fn_ptrs_mut`] instead.
    pub fn visit_regions_mut(&mut self, f: &mut impl FnMut(&mut RegionRef)) {
        match self {
            Self::Prim(_) | Self::Param(_) | Self::FnPtr { .. } => {}
            Self::Ref { region, target, .. } => {
                f(region);
                target.visit_regions_mut(f);
            }
            Self::RawPtr { target, .. } | Self::Slice(target) | Self::Array(target, _) => {
                target.visit_regions_mut(f);
            }
            Self::Adt { regions, args, .. } => {
                for region in regions {
                    f(region);
                }
                for arg in args {
                    arg.visit_regions_mut(f);
                }
            }
            Self::Tuple(elems) => {
                for elem in elems {
                    elem.visit_regions_mut(f);
                }
            }
        }
    }

    /// Visits the outermost function pointer types nested in this type.
    pub fn visit_fn_ptrs_mut(&mut self, f: &mut impl FnMut(&mut Vec<Ty>, &mut Ty)) {
        match self {
            Self::Prim(_) | Self::Param(_) => {}
            Self::FnPtr { inputs, output } => f(inputs, output),
            Self::Ref { target, .. }
            | Self::RawPtr { target, .. }
            | Self::Slice(target)
            | Self::Array(target, _) => target.visit_fn_ptrs_mut(f),
            Self::Adt { args, .. } => {
                for arg in args {
                    arg.visit_fn_ptrs_mut(f);
                }
            }
            Self::Tuple(elems) => {
                for elem in elems {
                    elem.visit_fn_ptrs_mut(f);
                }
            }
        }
    }

    /// Returns `true` if any region position (outside function pointers) is elided.
    #[must_use]
    pub fn has_elided_regions(&self) -> bool {
        let mut found = false;
        self.visit_regions(&mut |region| found |= region.is_elided());
        found
    }

    /// Collects the regions of this type in visiting order.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionRef> {
        let mut out = Vec::new();
        self.visit_regions(&mut |region| out.push(region));
        out
    }

    /// Returns `true` if the type mentions type parameter `param` anywhere.
    #[must_use]
    pub fn mentions_param(&self, param: Symbol) -> bool {
        match self {
            Self::Param(name) => *name == param,
            Self::Prim(_) => false,
            Self::Ref { target, .. }
            | Self::RawPtr { target, .. }
            | Self::Slice(target)
            | Self::Array(target, _) => target.mentions_param(param),
            Self::Adt { args, .. } | Self::Tuple(args) => {
                args.iter().any(|arg| arg.mentions_param(param))
            }
            Self::FnPtr { inputs, output } => {
                inputs.iter().any(|input| input.mentions_param(param))
                    || output.mentions_param(param)
            }
        }
    }

    /// Renders the type with names resolved through `interner`.
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a Interner) -> TyDisplay<'a> {
        TyDisplay { ty: self, interner }
    }
}

/// Display adapter for [`Ty`].
pub struct TyDisplay<'a> {
    ty: &'a Ty,
    interner: &'a Interner,
}

/// Display adapter for [`RegionRef`].
pub struct RegionDisplay<'a> {
    region: RegionRef,
    interner: &'a Interner,
}

impl fmt::Display for RegionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.region {
            RegionRef::Named(name) => write!(f, "'{}", self.interner.resolve(&name)),
            RegionRef::Static => f.write_str("'static"),
            RegionRef::Elided => f.write_str("'_"),
            RegionRef::Unbounded => f.write_str("'unbounded"),
        }
    }
}

impl fmt::Display for TyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interner = self.interner;
        match self.ty {
            Ty::Prim(name) | Ty::Param(name) => f.write_str(interner.resolve(name)),
            Ty::Ref {
                region,
                mutability,
                target,
            } => {
                f.write_str("&")?;
                if !region.is_elided() {
                    write!(f, "{} ", region.display(interner))?;
                }
                if mutability.is_mut() {
                    f.write_str("mut ")?;
                }
                write!(f, "{}", target.display(interner))
            }
            Ty::RawPtr { mutability, target } => {
                let qualifier = if mutability.is_mut() { "mut" } else { "const" };
                write!(f, "*{qualifier} {}", target.display(interner))
            }
            Ty::Adt {
                name,
                regions,
                args,
            } => {
                f.write_str(interner.resolve(name))?;
                if regions.is_empty() && args.is_empty() {
                    return Ok(());
                }
                f.write_str("<")?;
                let mut first = true;
                for region in regions {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", region.display(interner))?;
                }
                for arg in args {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", arg.display(interner))?;
                }
                f.write_str(">")
            }
            Ty::Slice(elem) => write!(f, "[{}]", elem.display(interner)),
            Ty::Array(elem, len) => write!(f, "[{}; {len}]", elem.display(interner)),
            Ty::Tuple(elems) => {
                f.write_str("(")?;
                for (idx, elem) in elems.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", elem.display(interner))?;
                }
                if elems.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Ty::FnPtr { inputs, output } => {
                f.write_str("fn(")?;
                for (idx, input) in inputs.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", input.display(interner))?;
                }
                f.write_str(")")?;
                if !matches!(output.as_ref(), Ty::Tuple(elems) if elems.is_empty()) {
                    write!(f, " -> {}", output.display(interner))?;
                }
                Ok(())
            }
        }
    }
}

/// Names treated as primitive scalars when they appear without arguments.
pub const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32",
    "i64", "i128", "isize", "f32", "f64", "String",
];

/// Built-in generic constructors; each takes exactly one type argument.
pub const BUILTIN_CONSTRUCTORS: &[&str] = &[
    "Box",
    "Vec",
    "Option",
    "PhantomData",
    "Cell",
    "RefCell",
    "UnsafeCell",
    "Mutex",
    "RwLock",
];

/// Runtime-checked cell constructors that permit aliased mutation.
pub const INTERIOR_MUTABLE: &[&str] = &["Cell", "RefCell", "UnsafeCell", "Mutex", "RwLock"];
