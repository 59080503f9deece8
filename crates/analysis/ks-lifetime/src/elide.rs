//! Region elision for signatures, `fn` pointer types and struct fields.
//!
//! Signature rules, applied in order:
//!
//! 1. every elided input region becomes a fresh region parameter;
//! 2. if the inputs mention exactly one region, every elided output region
//!    becomes that region;
//! 3. otherwise, if there is a receiver, its first region is used;
//! 4. otherwise an elided output region is an error.
//!
//! Regions inside `fn` pointer types belong to the pointer: its elided
//! outputs are resolved against its own inputs and its regions do not count
//! as inputs of the enclosing signature.

use ks_intern::{Interner, Symbol};
use ks_ir::{CompilationUnit, FnDef, RegionParamDecl, RegionRef, Signature, Ty, TypeDef};
use ks_region::{RegionGraph, RegionId, RegionScope};
use ks_span::FileSpan;
use tracing::{debug, instrument, trace};

use crate::context::ElisionContext;
use crate::error::{ElisionError, ElisionResult};

/// A signature with every region position bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elided {
    /// The elided signature
    pub signature: Signature,
    /// Region parameters created by rule 1, in creation order
    pub fresh: Vec<Symbol>,
}

/// Regions outside `fn` pointer types, in order of appearance.
fn outer_regions(ty: &Ty, out: &mut Vec<RegionRef>) {
    match ty {
        Ty::Prim(_) | Ty::Param(_) | Ty::FnPtr { .. } => {}
        Ty::Ref { region, target, .. } => {
            out.push(*region);
            outer_regions(target, out);
        }
        Ty::RawPtr { target, .. } | Ty::Slice(target) | Ty::Array(target, _) => {
            outer_regions(target, out);
        }
        Ty::Adt { regions, args, .. } => {
            out.extend(regions.iter().copied());
            for arg in args {
                outer_regions(arg, out);
            }
        }
        Ty::Tuple(elems) => {
            for elem in elems {
                outer_regions(elem, out);
            }
        }
    }
}

/// Distinct named or `'static` regions outside `fn` pointers.
fn input_regions<'t>(types: impl IntoIterator<Item = &'t Ty>) -> Vec<RegionRef> {
    let mut all = Vec::new();
    for ty in types {
        outer_regions(ty, &mut all);
    }
    let mut distinct: Vec<RegionRef> = Vec::new();
    for region in all {
        if matches!(region, RegionRef::Named(_) | RegionRef::Static) && !distinct.contains(&region) {
            distinct.push(region);
        }
    }
    distinct
}

fn has_outer_elided(ty: &Ty) -> bool {
    let mut regions = Vec::new();
    outer_regions(ty, &mut regions);
    regions.iter().any(|region| region.is_elided())
}

fn fill_elided(ty: &mut Ty, fill: &mut dyn FnMut() -> RegionRef) {
    ty.visit_regions_mut(&mut |region| {
        if region.is_elided() {
            *region = fill();
        }
    });
}

/// Elides every `fn` pointer type nested in `ty`. Elided pointer inputs
/// take regions from `fresh`.
fn elide_fn_ptrs(
    ty: &mut Ty,
    fresh: &mut dyn FnMut() -> RegionRef,
    item: &str,
    span: FileSpan,
) -> ElisionResult<()> {
    let mut result = Ok(());
    ty.visit_fn_ptrs_mut(&mut |inputs, output| {
        if result.is_ok() {
            result = elide_pointer(inputs, output, &mut *fresh, item, span);
        }
    });
    result
}

fn elide_pointer(
    inputs: &mut [Ty],
    output: &mut Ty,
    fresh: &mut dyn FnMut() -> RegionRef,
    item: &str,
    span: FileSpan,
) -> ElisionResult<()> {
    for input in inputs.iter_mut() {
        fill_elided(input, &mut *fresh);
        elide_fn_ptrs(input, &mut *fresh, item, span)?;
    }
    if has_outer_elided(output) {
        let regions = input_regions(inputs.iter());
        let [only] = regions.as_slice() else {
            return Err(ElisionError::Ambiguous {
                item: item.to_string(),
                inputs: regions.len(),
                span,
            });
        };
        let only = *only;
        fill_elided(output, &mut || only);
    }
    elide_fn_ptrs(output, fresh, item, span)
}

/// Elides `signature`, whose item already declares `declared`.
///
/// A fully annotated signature comes back unchanged with no fresh regions.
///
/// # Errors
///
/// [`ElisionError::Ambiguous`] when an elided output region cannot be
/// assigned by rules 2 and 3.
pub fn elide(
    item: &str,
    signature: &Signature,
    declared: &[RegionParamDecl],
    interner: &Interner,
    span: FileSpan,
) -> ElisionResult<Elided> {
    if signature.is_fully_annotated() {
        return Ok(Elided {
            signature: signature.clone(),
            fresh: Vec::new(),
        });
    }

    let mut ctx = ElisionContext::new(interner);
    for decl in declared {
        ctx.reserve(decl.name);
    }
    for param in &signature.params {
        ctx.reserve_in(&param.ty);
    }
    ctx.reserve_in(&signature.output);

    let mut sig = signature.clone();
    for param in &mut sig.params {
        fill_elided(&mut param.ty, &mut || ctx.fresh_region());
        elide_fn_ptrs(&mut param.ty, &mut || ctx.fresh_region(), item, span)?;
    }

    if has_outer_elided(&sig.output) {
        let inputs = input_regions(sig.params.iter().map(|param| &param.ty));
        let chosen = match inputs.as_slice() {
            [only] => Some(*only),
            _ => sig.receiver().and_then(|receiver| {
                let mut regions = Vec::new();
                outer_regions(&receiver.ty, &mut regions);
                regions.first().copied()
            }),
        };
        let Some(chosen) = chosen else {
            return Err(ElisionError::Ambiguous {
                item: item.to_string(),
                inputs: inputs.len(),
                span,
            });
        };
        fill_elided(&mut sig.output, &mut || chosen);
    }
    elide_fn_ptrs(&mut sig.output, &mut || ctx.fresh_region(), item, span)?;

    let fresh = ctx.into_fresh();
    trace!(item, fresh = fresh.len(), "elided signature");
    Ok(Elided {
        signature: sig,
        fresh,
    })
}

/// Elides a function definition in place, declaring fresh region parameters
/// on it and updating the parameter locals of its body.
///
/// # Errors
///
/// See [`elide`].
pub fn elide_fn(def: &mut FnDef, interner: &Interner) -> ElisionResult<Vec<Symbol>> {
    let item = interner.resolve(&def.name).to_string();
    let Elided { signature, fresh } =
        elide(&item, &def.signature, &def.region_params, interner, def.span)?;
    def.signature = signature;
    def.region_params
        .extend(fresh.iter().map(|name| RegionParamDecl::new(*name)));

    if let Some(body) = &mut def.body {
        for local in body.locals.iter_mut().filter(|local| local.param) {
            if let Some(param) = def.signature.params.iter().find(|param| param.name == local.name) {
                local.ty = param.ty.clone();
            }
        }
    }
    Ok(fresh)
}

/// Checks that every output region outside `fn` pointers is `'static`,
/// `'unbounded`, or outlived by some input region.
///
/// # Errors
///
/// [`ElisionError::UnboundedOutput`] naming the first untraceable region.
pub fn validate_outputs(def: &FnDef, graph: &RegionGraph, interner: &Interner) -> ElisionResult<()> {
    let scope = RegionScope::Function(def.name);
    let resolve = |region: RegionRef| match region {
        RegionRef::Named(name) => graph.region_by_name(scope, name),
        RegionRef::Static => Some(graph.static_region()),
        RegionRef::Elided | RegionRef::Unbounded => None,
    };

    let inputs: Vec<RegionId> = def
        .signature
        .params
        .iter()
        .flat_map(|param| param.ty.regions())
        .filter_map(resolve)
        .collect();

    let mut outputs = Vec::new();
    outer_regions(&def.signature.output, &mut outputs);
    for region in outputs {
        let RegionRef::Named(name) = region else {
            continue;
        };
        let Some(output) = resolve(region) else {
            continue;
        };
        if output == graph.static_region() {
            continue;
        }
        if !inputs.iter().any(|&input| graph.outlives(input, output)) {
            return Err(ElisionError::UnboundedOutput {
                item: interner.resolve(&def.name).to_string(),
                region: format!("'{}", interner.resolve(&name)),
                span: def.span,
            });
        }
    }
    Ok(())
}

/// Elides every function signature of `unit`, declares the fresh regions
/// in `graph`, and validates outputs. Functions are independent; one
/// failure does not stop the others.
#[instrument(skip_all, fields(unit = %unit.name))]
pub fn elide_signatures(
    unit: &mut CompilationUnit,
    graph: &mut RegionGraph,
    skip: &dyn Fn(Symbol) -> bool,
) -> Vec<ElisionError> {
    let interner = unit.interner.clone();
    let mut errors = Vec::new();
    for def in unit.functions.values_mut() {
        if skip(def.name) {
            continue;
        }
        let result = elide_fn(def, &interner).and_then(|fresh| {
            let scope = RegionScope::Function(def.name);
            for name in fresh {
                graph.declare_region(scope, name, &[], def.span)?;
            }
            validate_outputs(def, graph, &interner)
        });
        if let Err(err) = result {
            errors.push(err);
        }
    }
    debug!(errors = errors.len(), "elided signatures");
    errors
}

/// Resolves elided regions in a type constructor's fields to its single
/// region parameter.
///
/// # Errors
///
/// [`ElisionError::AmbiguousField`] when a field elides a region and the
/// constructor does not declare exactly one region parameter.
pub fn elide_fields(def: &mut TypeDef, interner: &Interner) -> ElisionResult<()> {
    let item = interner.resolve(&def.name).to_string();
    let params = def.region_params.len();
    let single = match def.region_params.as_slice() {
        [only] => Some(RegionRef::Named(only.name)),
        _ => None,
    };
    let span = def.span;

    for field in def.fields_mut() {
        if !field.ty.has_elided_regions() {
            continue;
        }
        let Some(region) = single else {
            return Err(ElisionError::AmbiguousField {
                item,
                field: interner.resolve(&field.name).to_string(),
                params,
                span,
            });
        };
        fill_elided(&mut field.ty, &mut || region);
        elide_fn_ptrs(&mut field.ty, &mut || region, &item, span)?;
    }
    Ok(())
}

/// Runs [`elide_fields`] on every type constructor of `unit`.
pub fn elide_type_defs(unit: &mut CompilationUnit) -> Vec<ElisionError> {
    let interner = unit.interner.clone();
    unit.type_defs
        .values_mut()
        .filter_map(|def| elide_fields(def, &interner).err())
        .collect()
}
