//! Type constructor and function definitions.

use ks_intern::Symbol;
use ks_span::FileSpan;

use crate::body::Body;
use crate::ty::Ty;

/// Item visibility, used by the privacy checks on one-shot iterators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Reachable only from the defining module
    #[default]
    Private,
    /// Reachable from anywhere
    Public,
}

/// Region parameter declaration with its outlives bounds (`'a: 'b + 'c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionParamDecl {
    /// Parameter name, without the quote
    pub name: Symbol,
    /// Regions this parameter is declared to outlive
    pub outlives: Vec<Symbol>,
}

impl RegionParamDecl {
    /// Declares a region parameter with no bounds.
    #[must_use]
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            outlives: Vec::new(),
        }
    }
}

/// Kind of a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Region (lifetime) parameter
    Region,
    /// Type parameter
    Type,
}

/// A generic parameter in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericParam {
    /// Parameter name
    pub name: Symbol,
    /// Region or type
    pub kind: ParamKind,
}

/// A field of a struct or enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name (tuple fields use their index)
    pub name: Symbol,
    /// Field type in terms of the constructor's parameters
    pub ty: Ty,
    /// Field visibility
    pub visibility: Visibility,
}

/// An enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDef {
    /// Variant name
    pub name: Symbol,
    /// Payload fields
    pub fields: Vec<FieldDef>,
}

/// Struct or enum body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefKind {
    /// Struct with named fields
    Struct {
        /// Fields in declaration order
        fields: Vec<FieldDef>,
    },
    /// Enum with variants
    Enum {
        /// Variants in declaration order
        variants: Vec<VariantDef>,
    },
}

/// Destructor logic attached to a type constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropImpl {
    /// Type parameters whose data the destructor reads or drops
    pub accesses: Vec<Symbol>,
    /// Location of the destructor
    pub span: FileSpan,
}

/// A generic type constructor (struct or enum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Constructor name
    pub name: Symbol,
    /// Region parameters (come first in the parameter order)
    pub region_params: Vec<RegionParamDecl>,
    /// Type parameters
    pub type_params: Vec<Symbol>,
    /// Fields or variants
    pub kind: TypeDefKind,
    /// Type parameters declared as logically owned (phantom ownership)
    pub owns: Vec<Symbol>,
    /// Destructor logic, if the type implements drop
    pub drop: Option<DropImpl>,
    /// Iterator-like type that hands out at most one loan per advancement
    pub one_shot: bool,
    /// Source location
    pub span: FileSpan,
}

impl TypeDef {
    /// All generic parameters in declaration order: regions, then types.
    pub fn params(&self) -> impl Iterator<Item = GenericParam> + '_ {
        self.region_params
            .iter()
            .map(|decl| GenericParam {
                name: decl.name,
                kind: ParamKind::Region,
            })
            .chain(self.type_params.iter().map(|name| GenericParam {
                name: *name,
                kind: ParamKind::Type,
            }))
    }

    /// All fields, flattening enum variants.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        let (direct, variants): (&[FieldDef], &[VariantDef]) = match &self.kind {
            TypeDefKind::Struct { fields } => (fields, &[]),
            TypeDefKind::Enum { variants } => (&[], variants),
        };
        direct
            .iter()
            .chain(variants.iter().flat_map(|variant| variant.fields.iter()))
    }

    /// Mutable access to all fields, flattening enum variants.
    pub fn fields_mut(&mut self) -> Box<dyn Iterator<Item = &mut FieldDef> + '_> {
        match &mut self.kind {
            TypeDefKind::Struct { fields } => Box::new(fields.iter_mut()),
            TypeDefKind::Enum { variants } => Box::new(
                variants
                    .iter_mut()
                    .flat_map(|variant| variant.fields.iter_mut()),
            ),
        }
    }

    /// Looks up a field by name (searching every variant for enums).
    #[must_use]
    pub fn field(&self, name: Symbol) -> Option<&FieldDef> {
        self.fields().find(|field| field.name == name)
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: Symbol,
    /// Parameter type
    pub ty: Ty,
    /// Whether this is the `self` receiver
    pub receiver: bool,
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Parameters in order, receiver first if present
    pub params: Vec<Param>,
    /// Return type
    pub output: Ty,
}

impl Signature {
    /// The receiver parameter, if any.
    #[must_use]
    pub fn receiver(&self) -> Option<&Param> {
        self.params.iter().find(|param| param.receiver)
    }

    /// Returns `true` if no region position is left elided.
    #[must_use]
    pub fn is_fully_annotated(&self) -> bool {
        !self.output.has_elided_regions()
            && self
                .params
                .iter()
                .all(|param| !param.ty.has_elided_regions())
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnDef {
    /// Function name
    pub name: Symbol,
    /// Visibility
    pub visibility: Visibility,
    /// Region parameters with outlives bounds
    pub region_params: Vec<RegionParamDecl>,
    /// Type parameters
    pub type_params: Vec<Symbol>,
    /// Signature, possibly with elided regions
    pub signature: Signature,
    /// Body, absent for declarations
    pub body: Option<Body>,
    /// Source location
    pub span: FileSpan,
}
