//! Elaborated intermediate representation consumed by the analyzer.
//!
//! A [`CompilationUnit`] holds type constructor definitions and functions
//! whose bodies are flat sequences of place-level operations. Units arrive
//! as JSON ([`wire`]) and are lowered into interned form ([`lower`]).

pub mod body;
pub mod error;
pub mod item;
pub mod lower;
pub mod place;
pub mod syntax;
pub mod ty;
pub mod unit;
pub mod wire;

pub use body::{Body, BorrowKind, LocalDecl, Op, OpKind, Operand, WriteKind};
pub use error::{IrError, IrResult};
pub use item::{
    DropImpl, FieldDef, FnDef, GenericParam, Param, ParamKind, RegionParamDecl, Signature,
    TypeDef, TypeDefKind, VariantDef, Visibility,
};
pub use lower::{STATIC_REGION, lower_json, lower_unit, to_wire};
pub use place::{Place, PlaceElem};
pub use ty::{BUILTIN_CONSTRUCTORS, INTERIOR_MUTABLE, Mutability, PRIMITIVES, RegionRef, Ty};
pub use unit::{CompilationUnit, ProofRequest};
pub use wire::WireUnit;
