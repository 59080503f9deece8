//! Lowering between the JSON wire form and interned IR.
//!
//! Lowering interns every name, parses textual types and places, resolves
//! bare names to type parameters, primitives or constructors, and checks
//! that every region and parameter an item mentions is declared. All
//! problems in a unit are collected before lowering gives up.

use ks_intern::{Interner, Symbol};
use ks_span::{FileId, FileSpan, Span};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::body::{Body, BorrowKind, LocalDecl, Op, OpKind, Operand, WriteKind};
use crate::error::{IrError, IrResult};
use crate::item::{
    DropImpl, FieldDef, FnDef, Param, RegionParamDecl, Signature, TypeDef, TypeDefKind,
    VariantDef, Visibility,
};
use crate::place::{Place, PlaceElem};
use crate::syntax::{parse_place, parse_region_decl, parse_region_name, parse_ty};
use crate::ty::{BUILTIN_CONSTRUCTORS, PRIMITIVES, RegionRef, Ty};
use crate::unit::{CompilationUnit, ProofRequest};
use crate::wire::{
    WireBorrowKind, WireDrop, WireField, WireFnDef, WireLocal, WireOp, WireOpKind, WireParam,
    WireProof, WireTypeDef, WireTypeKind, WireUnit, WireVariant,
};

/// Name of the distinguished region that outlives every other region.
pub const STATIC_REGION: &str = "static";

/// Decodes and lowers a unit from JSON text.
///
/// # Errors
///
/// Returns [`IrError::Decode`] for malformed JSON and the lowering errors
/// otherwise.
pub fn lower_json(text: &str, interner: &Interner) -> IrResult<CompilationUnit> {
    let wire = WireUnit::from_json(text).map_err(|err| {
        vec![IrError::Decode {
            message: err.to_string(),
        }]
    })?;
    lower_unit(&wire, interner)
}

/// Lowers a decoded wire unit.
///
/// # Errors
///
/// Returns every problem found in the unit.
pub fn lower_unit(wire: &WireUnit, interner: &Interner) -> IrResult<CompilationUnit> {
    let mut lowerer = Lowerer::new(interner, FileId::new(wire.file));
    let mut unit = CompilationUnit::new(wire.name.clone(), interner.clone());
    unit.file = lowerer.file;

    lowerer.collect_arities(&wire.types);

    for def in &wire.types {
        let lowered = lowerer.type_def(def);
        if unit.type_defs.contains_key(&lowered.name) {
            continue;
        }
        unit.type_defs.insert(lowered.name, lowered);
    }

    for def in &wire.functions {
        let lowered = lowerer.fn_def(def);
        // Types and functions share one namespace; diagnostics name items
        // by their bare name.
        if unit.type_defs.contains_key(&lowered.name) {
            lowerer.errors.push(IrError::Duplicate {
                what: "item",
                name: def.name.clone(),
                span: lowered.span,
            });
            continue;
        }
        if unit.functions.contains_key(&lowered.name) {
            lowerer.errors.push(IrError::Duplicate {
                what: "function",
                name: def.name.clone(),
                span: lowered.span,
            });
            continue;
        }
        unit.functions.insert(lowered.name, lowered);
    }

    for proof in &wire.proofs {
        if let Some(request) = lowerer.proof(proof) {
            unit.proof_requests.push(request);
        }
    }

    if !lowerer.errors.is_empty() {
        return Err(lowerer.errors);
    }

    debug!(
        unit = %unit.name,
        types = unit.type_defs.len(),
        functions = unit.functions.len(),
        "lowered unit"
    );
    Ok(unit)
}

/// Names visible inside one item.
struct Scope<'s> {
    item: &'s str,
    regions: FxHashSet<Symbol>,
    types: FxHashSet<Symbol>,
}

struct Lowerer<'a> {
    interner: &'a Interner,
    file: FileId,
    /// Region and type parameter counts of the unit's own constructors
    arities: FxHashMap<Symbol, (usize, usize)>,
    builtins: FxHashSet<Symbol>,
    primitives: FxHashSet<Symbol>,
    errors: Vec<IrError>,
}

impl<'a> Lowerer<'a> {
    fn new(interner: &'a Interner, file: FileId) -> Self {
        Self {
            interner,
            file,
            arities: FxHashMap::default(),
            builtins: BUILTIN_CONSTRUCTORS
                .iter()
                .map(|name| interner.intern(name))
                .collect(),
            primitives: PRIMITIVES.iter().map(|name| interner.intern(name)).collect(),
            errors: Vec::new(),
        }
    }

    fn span(&self, raw: Option<[u32; 2]>) -> FileSpan {
        raw.map_or_else(FileSpan::synthetic, |[start, end]| {
            FileSpan::new(self.file, Span::new(start, end))
        })
    }

    fn span_or(&self, raw: Option<[u32; 2]>, fallback: FileSpan) -> FileSpan {
        if raw.is_some() {
            self.span(raw)
        } else {
            fallback
        }
    }

    fn collect_arities(&mut self, defs: &[WireTypeDef]) {
        for def in defs {
            let name = self.interner.intern(&def.name);
            if self.arities.contains_key(&name) {
                self.errors.push(IrError::Duplicate {
                    what: "type",
                    name: def.name.clone(),
                    span: self.span(def.span),
                });
                continue;
            }
            self.arities
                .insert(name, (def.regions.len(), def.params.len()));
        }
    }

    fn region_decls(
        &mut self,
        texts: &[String],
        item: &str,
        span: FileSpan,
    ) -> Vec<RegionParamDecl> {
        let mut decls: Vec<RegionParamDecl> = Vec::new();
        for text in texts {
            let Some((name, outlives)) = parse_region_decl(text, self.interner) else {
                self.errors.push(IrError::Syntax {
                    what: "region declaration",
                    text: text.clone(),
                    span,
                });
                continue;
            };
            if decls.iter().any(|decl| decl.name == name) {
                self.errors.push(IrError::Duplicate {
                    what: "region parameter",
                    name: format!("'{}", self.interner.resolve(&name)),
                    span,
                });
                continue;
            }
            decls.push(RegionParamDecl { name, outlives });
        }

        let static_region = self.interner.intern(STATIC_REGION);
        for decl in &decls {
            for bound in &decl.outlives {
                if *bound != static_region && !decls.iter().any(|other| other.name == *bound) {
                    self.errors.push(IrError::UnknownRegion {
                        name: self.interner.resolve(bound).to_string(),
                        item: item.to_string(),
                        span,
                    });
                }
            }
        }
        decls
    }

    fn type_params(&mut self, names: &[String], span: FileSpan) -> Vec<Symbol> {
        let mut params = Vec::with_capacity(names.len());
        for name in names {
            let sym = self.interner.intern(name);
            if params.contains(&sym) {
                self.errors.push(IrError::Duplicate {
                    what: "type parameter",
                    name: name.clone(),
                    span,
                });
                continue;
            }
            params.push(sym);
        }
        params
    }

    fn ty(&mut self, text: &str, scope: &Scope<'_>, span: FileSpan) -> Ty {
        let Some(ty) = parse_ty(text, self.interner) else {
            self.errors.push(IrError::Syntax {
                what: "type",
                text: text.to_string(),
                span,
            });
            return Ty::unit();
        };
        self.resolve(ty, scope, span)
    }

    fn check_region(&mut self, region: RegionRef, scope: &Scope<'_>, span: FileSpan) {
        if let RegionRef::Named(name) = region
            && !scope.regions.contains(&name)
        {
            self.errors.push(IrError::UnknownRegion {
                name: self.interner.resolve(&name).to_string(),
                item: scope.item.to_string(),
                span,
            });
        }
    }

    fn arity_error(&mut self, name: Symbol, what: &'static str, expected: usize, found: usize, span: FileSpan) {
        self.errors.push(IrError::Arity {
            name: self.interner.resolve(&name).to_string(),
            what,
            expected,
            found,
            span,
        });
    }

    fn resolve(&mut self, ty: Ty, scope: &Scope<'_>, span: FileSpan) -> Ty {
        match ty {
            Ty::Prim(_) | Ty::Param(_) => ty,
            Ty::Ref {
                region,
                mutability,
                target,
            } => {
                self.check_region(region, scope, span);
                let target = self.resolve(*target, scope, span);
                Ty::reference(region, mutability, target)
            }
            Ty::RawPtr { mutability, target } => Ty::RawPtr {
                mutability,
                target: Box::new(self.resolve(*target, scope, span)),
            },
            Ty::Slice(elem) => Ty::Slice(Box::new(self.resolve(*elem, scope, span))),
            Ty::Array(elem, len) => Ty::Array(Box::new(self.resolve(*elem, scope, span)), len),
            Ty::Tuple(elems) => Ty::Tuple(
                elems
                    .into_iter()
                    .map(|elem| self.resolve(elem, scope, span))
                    .collect(),
            ),
            Ty::FnPtr { inputs, output } => Ty::FnPtr {
                inputs: inputs
                    .into_iter()
                    .map(|input| self.resolve(input, scope, span))
                    .collect(),
                output: Box::new(self.resolve(*output, scope, span)),
            },
            Ty::Adt {
                name,
                mut regions,
                args,
            } => {
                let bare = regions.is_empty() && args.is_empty();
                if bare && scope.types.contains(&name) {
                    return Ty::Param(name);
                }
                if bare && self.primitives.contains(&name) {
                    return Ty::Prim(name);
                }

                for region in &regions {
                    self.check_region(*region, scope, span);
                }
                let args: Vec<Ty> = args
                    .into_iter()
                    .map(|arg| self.resolve(arg, scope, span))
                    .collect();

                if self.builtins.contains(&name) {
                    if !regions.is_empty() {
                        self.arity_error(name, "region", 0, regions.len(), span);
                    }
                    if args.len() != 1 {
                        self.arity_error(name, "type", 1, args.len(), span);
                    }
                } else if let Some(&(region_count, type_count)) = self.arities.get(&name) {
                    // Unwritten region arguments are elided positions.
                    if regions.is_empty() {
                        regions = vec![RegionRef::Elided; region_count];
                    } else if regions.len() != region_count {
                        self.arity_error(name, "region", region_count, regions.len(), span);
                    }
                    if args.len() != type_count {
                        self.arity_error(name, "type", type_count, args.len(), span);
                    }
                } else {
                    self.errors.push(IrError::UnknownType {
                        name: self.interner.resolve(&name).to_string(),
                        item: scope.item.to_string(),
                        span,
                    });
                }
                Ty::Adt {
                    name,
                    regions,
                    args,
                }
            }
        }
    }

    fn type_def(&mut self, def: &WireTypeDef) -> TypeDef {
        let span = self.span(def.span);
        let name = self.interner.intern(&def.name);
        let region_params = self.region_decls(&def.regions, &def.name, span);
        let type_params = self.type_params(&def.params, span);
        let scope = Scope {
            item: &def.name,
            regions: region_params.iter().map(|decl| decl.name).collect(),
            types: type_params.iter().copied().collect(),
        };

        let kind = match def.kind {
            WireTypeKind::Struct => TypeDefKind::Struct {
                fields: self.fields(&def.fields, &scope, span),
            },
            WireTypeKind::Enum => TypeDefKind::Enum {
                variants: self.variants(&def.variants, &scope, span),
            },
        };

        let owns = self.param_refs(&def.owns, &scope, span);
        let drop = def.drop.as_ref().map(|WireDrop { accesses, span: raw }| {
            let span = self.span_or(*raw, span);
            DropImpl {
                accesses: self.param_refs(accesses, &scope, span),
                span,
            }
        });

        TypeDef {
            name,
            region_params,
            type_params,
            kind,
            owns,
            drop,
            one_shot: def.one_shot,
            span,
        }
    }

    fn fields(&mut self, fields: &[WireField], scope: &Scope<'_>, span: FileSpan) -> Vec<FieldDef> {
        let mut lowered: Vec<FieldDef> = Vec::with_capacity(fields.len());
        for field in fields {
            let name = self.interner.intern(&field.name);
            if lowered.iter().any(|other| other.name == name) {
                self.errors.push(IrError::Duplicate {
                    what: "field",
                    name: field.name.clone(),
                    span,
                });
                continue;
            }
            let ty = self.ty(&field.ty, scope, span);
            lowered.push(FieldDef {
                name,
                ty,
                visibility: if field.public {
                    Visibility::Public
                } else {
                    Visibility::Private
                },
            });
        }
        lowered
    }

    fn variants(
        &mut self,
        variants: &[WireVariant],
        scope: &Scope<'_>,
        span: FileSpan,
    ) -> Vec<VariantDef> {
        let mut lowered: Vec<VariantDef> = Vec::with_capacity(variants.len());
        for variant in variants {
            let name = self.interner.intern(&variant.name);
            if lowered.iter().any(|other| other.name == name) {
                self.errors.push(IrError::Duplicate {
                    what: "variant",
                    name: variant.name.clone(),
                    span,
                });
                continue;
            }
            let fields = self.fields(&variant.fields, scope, span);
            lowered.push(VariantDef { name, fields });
        }
        lowered
    }

    /// Resolves names that must refer to the item's own type parameters.
    fn param_refs(&mut self, names: &[String], scope: &Scope<'_>, span: FileSpan) -> Vec<Symbol> {
        let mut params = Vec::with_capacity(names.len());
        for name in names {
            let sym = self.interner.intern(name);
            if !scope.types.contains(&sym) {
                self.errors.push(IrError::UnknownTypeParam {
                    name: name.clone(),
                    item: scope.item.to_string(),
                    span,
                });
                continue;
            }
            if !params.contains(&sym) {
                params.push(sym);
            }
        }
        params
    }

    fn fn_def(&mut self, def: &WireFnDef) -> FnDef {
        let span = self.span(def.span);
        let name = self.interner.intern(&def.name);
        let region_params = self.region_decls(&def.regions, &def.name, span);
        let type_params = self.type_params(&def.type_params, span);
        let scope = Scope {
            item: &def.name,
            regions: region_params.iter().map(|decl| decl.name).collect(),
            types: type_params.iter().copied().collect(),
        };

        let mut locals: Vec<LocalDecl> = Vec::new();
        let mut params = Vec::with_capacity(def.params.len());
        for WireParam { name: param, ty, len } in &def.params {
            let sym = self.interner.intern(param);
            let ty = self.ty(ty, &scope, span);
            if locals.iter().any(|local| local.name == sym) {
                self.errors.push(IrError::Duplicate {
                    what: "parameter",
                    name: param.clone(),
                    span,
                });
                continue;
            }
            locals.push(LocalDecl {
                name: sym,
                ty: ty.clone(),
                mutable: false,
                param: true,
                len: *len,
            });
            params.push(Param {
                name: sym,
                ty,
                receiver: param == "self",
            });
        }

        let output = match &def.ret {
            Some(text) => self.ty(text, &scope, span),
            None => Ty::unit(),
        };

        let body = def.body.as_ref().map(|ops| {
            for WireLocal {
                name: local,
                ty,
                mutable,
                len,
            } in &def.locals
            {
                let sym = self.interner.intern(local);
                if locals.iter().any(|other| other.name == sym) {
                    self.errors.push(IrError::Duplicate {
                        what: "local",
                        name: local.clone(),
                        span,
                    });
                    continue;
                }
                let ty = self.ty(ty, &scope, span);
                locals.push(LocalDecl {
                    name: sym,
                    ty,
                    mutable: *mutable,
                    param: false,
                    len: *len,
                });
            }
            let ops = ops
                .iter()
                .filter_map(|op| self.op(op, &scope, span))
                .collect();
            Body {
                locals: std::mem::take(&mut locals),
                ops,
            }
        });

        FnDef {
            name,
            visibility: if def.public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            region_params,
            type_params,
            signature: Signature { params, output },
            body,
            span,
        }
    }

    fn place(&mut self, text: &str, span: FileSpan) -> Option<Place> {
        let Some(place) = parse_place(text, self.interner) else {
            self.errors.push(IrError::Syntax {
                what: "place",
                text: text.to_string(),
                span,
            });
            return None;
        };
        let inverted = place
            .projection
            .iter()
            .any(|elem| matches!(elem, PlaceElem::Range { start, end } if start > end));
        if inverted {
            self.errors.push(IrError::InvalidValue {
                what: "index range",
                value: text.to_string(),
                span,
            });
            return None;
        }
        Some(place)
    }

    /// Resolves an explicit region on a body operation.
    fn op_region(&mut self, text: Option<&String>, scope: &Scope<'_>, span: FileSpan) -> Option<Symbol> {
        let text = text?;
        let Some(name) = parse_region_name(text, self.interner) else {
            self.errors.push(IrError::Syntax {
                what: "region",
                text: text.clone(),
                span,
            });
            return None;
        };
        if self.interner.resolve(&name) != STATIC_REGION && !scope.regions.contains(&name) {
            self.errors.push(IrError::UnknownRegion {
                name: self.interner.resolve(&name).to_string(),
                item: scope.item.to_string(),
                span,
            });
        }
        Some(name)
    }

    fn op(&mut self, op: &WireOp, scope: &Scope<'_>, item_span: FileSpan) -> Option<Op> {
        let span = self.span_or(op.span, item_span);
        let interner = self.interner;
        let sym = |name: &String| interner.intern(name);
        let kind = match &op.kind {
            WireOpKind::EnterScope => OpKind::EnterScope,
            WireOpKind::ExitScope => OpKind::ExitScope,
            WireOpKind::Bind { local } => OpKind::Bind { local: sym(local) },
            WireOpKind::Drop { local } => OpKind::Drop { local: sym(local) },
            WireOpKind::Read { place } => OpKind::Read {
                place: self.place(place, span)?,
            },
            WireOpKind::Write {
                place,
                discriminant,
            } => OpKind::Write {
                place: self.place(place, span)?,
                kind: if *discriminant {
                    WriteKind::SetDiscriminant
                } else {
                    WriteKind::Assign
                },
            },
            WireOpKind::Borrow {
                handle,
                place,
                kind,
                region,
            } => {
                let handle = sym(handle);
                let region = self.op_region(region.as_ref(), scope, span);
                OpKind::Borrow {
                    handle,
                    place: self.place(place, span)?,
                    kind: borrow_kind(*kind),
                    region,
                }
            }
            WireOpKind::Copy { handle, from } => OpKind::Copy {
                handle: sym(handle),
                from: sym(from),
            },
            WireOpKind::Store { handle, into } => {
                let handle = sym(handle);
                OpKind::Store {
                    handle,
                    into: self.place(into, span)?,
                }
            }
            WireOpKind::Release { handle } => OpKind::Release {
                handle: sym(handle),
            },
            WireOpKind::Call { callee, args, dest } => OpKind::Call {
                callee: sym(callee),
                args: args
                    .iter()
                    .map(|arg| arg.as_ref().map_or(Operand::Value, |name| Operand::Handle(sym(name))))
                    .collect(),
                dest: dest.as_ref().map(sym),
            },
            WireOpKind::Return { value } => OpKind::Return {
                value: value.as_ref().map(sym),
            },
            WireOpKind::Split {
                source,
                at,
                left,
                right,
                region,
            } => {
                let region = self.op_region(region.as_ref(), scope, span);
                OpKind::Split {
                    source: sym(source),
                    at: *at,
                    left: sym(left),
                    right: sym(right),
                    region,
                }
            }
            WireOpKind::Iter {
                iter,
                source,
                one_shot,
            } => OpKind::Iter {
                iter: sym(iter),
                source: sym(source),
                one_shot: *one_shot,
            },
            WireOpKind::Advance { iter, output } => OpKind::Advance {
                iter: sym(iter),
                output: sym(output),
            },
            WireOpKind::Expose { iter, kind } => OpKind::Expose {
                iter: sym(iter),
                kind: borrow_kind(*kind),
            },
        };
        Some(Op { kind, span })
    }

    fn proof(&mut self, proof: &WireProof) -> Option<ProofRequest> {
        let span = self.span(proof.span);
        let left = self.place(&proof.left, span);
        let right = self.place(&proof.right, span);
        Some(ProofRequest {
            function: self.interner.intern(&proof.function),
            left: left?,
            right: right?,
            span,
        })
    }
}

fn borrow_kind(kind: WireBorrowKind) -> BorrowKind {
    match kind {
        WireBorrowKind::Shared => BorrowKind::Shared,
        WireBorrowKind::Mut => BorrowKind::Mutable,
    }
}

fn raw_span(span: FileSpan) -> Option<[u32; 2]> {
    (span != FileSpan::synthetic()).then_some([span.span.start, span.span.end])
}

fn region_text(interner: &Interner, name: Symbol) -> String {
    format!("'{}", interner.resolve(&name))
}

fn region_decl_text(interner: &Interner, decl: &RegionParamDecl) -> String {
    let mut text = region_text(interner, decl.name);
    if !decl.outlives.is_empty() {
        let bounds: Vec<String> = decl
            .outlives
            .iter()
            .map(|bound| region_text(interner, *bound))
            .collect();
        text.push_str(": ");
        text.push_str(&bounds.join(" + "));
    }
    text
}

fn borrow_kind_wire(kind: BorrowKind) -> WireBorrowKind {
    match kind {
        BorrowKind::Shared => WireBorrowKind::Shared,
        BorrowKind::Mutable => WireBorrowKind::Mut,
    }
}

fn field_wire(interner: &Interner, field: &FieldDef) -> WireField {
    WireField {
        name: interner.resolve(&field.name).to_string(),
        ty: field.ty.display(interner).to_string(),
        public: field.visibility == Visibility::Public,
    }
}

fn op_wire(interner: &Interner, op: &Op) -> WireOp {
    let name = |sym: &Symbol| interner.resolve(sym).to_string();
    let place = |place: &Place| place.display(interner).to_string();
    let kind = match &op.kind {
        OpKind::EnterScope => WireOpKind::EnterScope,
        OpKind::ExitScope => WireOpKind::ExitScope,
        OpKind::Bind { local } => WireOpKind::Bind { local: name(local) },
        OpKind::Drop { local } => WireOpKind::Drop { local: name(local) },
        OpKind::Read { place: read } => WireOpKind::Read { place: place(read) },
        OpKind::Write { place: written, kind } => WireOpKind::Write {
            place: place(written),
            discriminant: *kind == WriteKind::SetDiscriminant,
        },
        OpKind::Borrow {
            handle,
            place: borrowed,
            kind,
            region,
        } => WireOpKind::Borrow {
            handle: name(handle),
            place: place(borrowed),
            kind: borrow_kind_wire(*kind),
            region: region.map(|region| region_text(interner, region)),
        },
        OpKind::Copy { handle, from } => WireOpKind::Copy {
            handle: name(handle),
            from: name(from),
        },
        OpKind::Store { handle, into } => WireOpKind::Store {
            handle: name(handle),
            into: place(into),
        },
        OpKind::Release { handle } => WireOpKind::Release {
            handle: name(handle),
        },
        OpKind::Call { callee, args, dest } => WireOpKind::Call {
            callee: name(callee),
            args: args
                .iter()
                .map(|arg| match arg {
                    Operand::Handle(handle) => Some(name(handle)),
                    Operand::Value => None,
                })
                .collect(),
            dest: dest.as_ref().map(name),
        },
        OpKind::Return { value } => WireOpKind::Return {
            value: value.as_ref().map(name),
        },
        OpKind::Split {
            source,
            at,
            left,
            right,
            region,
        } => WireOpKind::Split {
            source: name(source),
            at: *at,
            left: name(left),
            right: name(right),
            region: region.map(|region| region_text(interner, region)),
        },
        OpKind::Iter {
            iter,
            source,
            one_shot,
        } => WireOpKind::Iter {
            iter: name(iter),
            source: name(source),
            one_shot: *one_shot,
        },
        OpKind::Advance { iter, output } => WireOpKind::Advance {
            iter: name(iter),
            output: name(output),
        },
        OpKind::Expose { iter, kind } => WireOpKind::Expose {
            iter: name(iter),
            kind: borrow_kind_wire(*kind),
        },
    };
    WireOp {
        kind,
        span: raw_span(op.span),
    }
}

/// Raises interned IR back to the wire form.
///
/// Types are rendered in text syntax, so regions filled in by elision
/// appear explicitly. Variances are left empty for the caller to attach.
pub fn to_wire(unit: &CompilationUnit) -> WireUnit {
    let interner = &unit.interner;
    let name = |sym: &Symbol| interner.resolve(sym).to_string();

    let types = unit
        .type_defs
        .values()
        .map(|def| {
            let (kind, fields, variants) = match &def.kind {
                TypeDefKind::Struct { fields } => (
                    WireTypeKind::Struct,
                    fields.iter().map(|field| field_wire(interner, field)).collect(),
                    Vec::new(),
                ),
                TypeDefKind::Enum { variants } => (
                    WireTypeKind::Enum,
                    Vec::new(),
                    variants
                        .iter()
                        .map(|variant| WireVariant {
                            name: name(&variant.name),
                            fields: variant
                                .fields
                                .iter()
                                .map(|field| field_wire(interner, field))
                                .collect(),
                        })
                        .collect(),
                ),
            };
            WireTypeDef {
                name: name(&def.name),
                kind,
                regions: def
                    .region_params
                    .iter()
                    .map(|decl| region_decl_text(interner, decl))
                    .collect(),
                params: def.type_params.iter().map(name).collect(),
                fields,
                variants,
                owns: def.owns.iter().map(name).collect(),
                drop: def.drop.as_ref().map(|drop| WireDrop {
                    accesses: drop.accesses.iter().map(name).collect(),
                    span: raw_span(drop.span),
                }),
                one_shot: def.one_shot,
                variances: indexmap::IndexMap::new(),
                span: raw_span(def.span),
            }
        })
        .collect();

    let functions = unit
        .functions
        .values()
        .map(|def| {
            let locals = def
                .body
                .iter()
                .flat_map(|body| body.locals.iter())
                .filter(|local| !local.param)
                .map(|local| WireLocal {
                    name: name(&local.name),
                    ty: local.ty.display(interner).to_string(),
                    mutable: local.mutable,
                    len: local.len,
                })
                .collect();
            let param_len = |param: &Symbol| {
                def.body
                    .as_ref()
                    .and_then(|body| body.local(*param))
                    .and_then(|local| local.len)
            };
            WireFnDef {
                name: name(&def.name),
                public: def.visibility == Visibility::Public,
                regions: def
                    .region_params
                    .iter()
                    .map(|decl| region_decl_text(interner, decl))
                    .collect(),
                type_params: def.type_params.iter().map(name).collect(),
                params: def
                    .signature
                    .params
                    .iter()
                    .map(|param| WireParam {
                        name: name(&param.name),
                        ty: param.ty.display(interner).to_string(),
                        len: param_len(&param.name),
                    })
                    .collect(),
                ret: (def.signature.output != Ty::unit())
                    .then(|| def.signature.output.display(interner).to_string()),
                locals,
                body: def
                    .body
                    .as_ref()
                    .map(|body| body.ops.iter().map(|op| op_wire(interner, op)).collect()),
                span: raw_span(def.span),
            }
        })
        .collect();

    let proofs = unit
        .proof_requests
        .iter()
        .map(|request| WireProof {
            function: name(&request.function),
            left: request.left.display(interner).to_string(),
            right: request.right.display(interner).to_string(),
            span: raw_span(request.span),
        })
        .collect();

    WireUnit {
        name: unit.name.clone(),
        file: unit.file.0,
        types,
        functions,
        proofs,
    }
}
