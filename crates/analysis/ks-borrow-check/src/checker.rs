//! Borrow checker: walks function bodies against the live loan set.

use std::ops::ControlFlow;

use indexmap::IndexMap;
use ks_intern::Symbol;
use ks_ir::{
    Body, BorrowKind, CompilationUnit, FnDef, INTERIOR_MUTABLE, OpKind, Operand, Place, PlaceElem,
    RegionRef, Ty, WriteKind,
};
use ks_region::{RegionGraph, RegionId, RegionScope};
use ks_span::FileSpan;
use ks_variance::{Variance, VarianceTable};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, instrument, trace};

use crate::disjoint::{DisjointnessProof, ProverRegistry};
use crate::error::{BorrowError, BorrowResult};
use crate::loans::{Access, Loan, LoanId, LoanOrigin, LoanRegion, LoanSet};
use crate::privacy::check_one_shot_privacy;

type LoanList = SmallVec<[LoanId; 2]>;
type Step<T = ()> = Result<T, BorrowError>;

/// Borrow checker for the functions of one compilation unit.
///
/// Runs after elision, once the region graph is sealed. Each function is
/// checked in isolation: the first error in a body ends that body's walk,
/// and checking resumes with the next function.
pub struct BorrowChecker<'a> {
    unit: &'a CompilationUnit,
    graph: &'a RegionGraph,
    variances: &'a VarianceTable,
    provers: &'a ProverRegistry,
    cells: FxHashSet<Symbol>,
    boxed: Symbol,
    vec: Symbol,
}

impl<'a> BorrowChecker<'a> {
    /// Creates a borrow checker for `unit`.
    #[must_use]
    pub fn new(
        unit: &'a CompilationUnit,
        graph: &'a RegionGraph,
        variances: &'a VarianceTable,
        provers: &'a ProverRegistry,
    ) -> Self {
        let interner = &unit.interner;
        Self {
            unit,
            graph,
            variances,
            provers,
            cells: INTERIOR_MUTABLE
                .iter()
                .map(|name| interner.intern(name))
                .collect(),
            boxed: interner.intern("Box"),
            vec: interner.intern("Vec"),
        }
    }

    /// Checks the one-shot privacy rule and every function body not
    /// excluded by `skip`.
    ///
    /// # Errors
    ///
    /// Returns every independent error: at most one per function, plus one
    /// per offending one-shot field.
    pub fn check(&self, skip: &dyn Fn(Symbol) -> bool) -> BorrowResult<()> {
        let errors: Vec<_> = self
            .check_located(skip)
            .into_iter()
            .map(|(_, err)| err)
            .collect();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Like [`check`](Self::check), pairing each error with the index of
    /// the body operation that raised it. Definition-time errors and
    /// rejected proof requests carry no index.
    pub fn check_located(&self, skip: &dyn Fn(Symbol) -> bool) -> Vec<(Option<usize>, BorrowError)> {
        let mut errors: Vec<_> = check_one_shot_privacy(self.unit)
            .into_iter()
            .map(|err| (None, err))
            .collect();
        for def in self.unit.functions.values() {
            if skip(def.name) {
                continue;
            }
            if let Err(located) = self.check_function_located(def) {
                errors.push(located);
            }
        }
        errors
    }

    /// Checks one function body.
    ///
    /// # Errors
    ///
    /// Returns the first error found in the body.
    pub fn check_function(&self, def: &FnDef) -> Result<(), BorrowError> {
        self.check_function_located(def).map_err(|(_, err)| err)
    }

    /// Checks one function body, reporting the index of the failing
    /// operation along with the error.
    ///
    /// # Errors
    ///
    /// Returns the first error found in the body.
    #[instrument(skip_all, fields(function = %self.unit.name(def.name)))]
    pub fn check_function_located(&self, def: &FnDef) -> Result<(), (Option<usize>, BorrowError)> {
        self.walk(def).map(|_| ())
    }

    fn walk<'c>(
        &'c self,
        def: &'c FnDef,
    ) -> Result<Option<BodyWalker<'c, 'a>>, (Option<usize>, BorrowError)> {
        let Some(body) = &def.body else {
            return Ok(None);
        };
        let mut walker = BodyWalker::new(self, def, body);
        walker.validate_proofs().map_err(|err| (None, err))?;
        for (idx, op) in body.ops.iter().enumerate() {
            walker.span = op.span;
            let flow = walker.step(&op.kind).map_err(|err| (Some(idx), err))?;
            if flow.is_break() {
                trace!(op = idx, "returned");
                break;
            }
        }
        debug!(live_loans = walker.loans.len(), "body checked");
        Ok(Some(walker))
    }

    fn resolve_in(&self, scope: RegionScope, region: RegionRef) -> Option<RegionId> {
        match region {
            RegionRef::Named(name) => self.graph.region_by_name(scope, name),
            RegionRef::Static => Some(self.graph.static_region()),
            RegionRef::Elided | RegionRef::Unbounded => None,
        }
    }

    /// Regions of `ty` at positions a value flows out of: covariant or
    /// invariant, never behind a function pointer's inputs.
    fn flowing_regions(&self, ty: &Ty) -> Vec<RegionRef> {
        let mut regions = Vec::new();
        self.variances
            .walk_regions(ty, Variance::Covariant, &mut |region, variance| {
                if matches!(variance, Variance::Covariant | Variance::Invariant) {
                    regions.push(region);
                }
            });
        regions
    }
}

/// A named reference value and the loans it keeps alive.
#[derive(Debug, Clone)]
struct Handle {
    loans: LoanList,
    depth: usize,
}

#[derive(Debug, Clone)]
struct IterState {
    loans: LoanList,
    one_shot: bool,
    next: u64,
    yields: Vec<LoanId>,
    depth: usize,
}

#[derive(Debug, Default)]
struct Frame {
    locals: Vec<Symbol>,
}

struct BodyWalker<'c, 'a> {
    cx: &'c BorrowChecker<'a>,
    def: &'c FnDef,
    body: &'c Body,
    scope: RegionScope,
    loans: LoanSet,
    handles: IndexMap<Symbol, Handle>,
    iters: IndexMap<Symbol, IterState>,
    parked: FxHashMap<Symbol, Vec<Handle>>,
    bound: FxHashMap<Symbol, usize>,
    frames: Vec<Frame>,
    proofs: Vec<DisjointnessProof>,
    span: FileSpan,
}

impl<'c, 'a> BodyWalker<'c, 'a> {
    fn new(cx: &'c BorrowChecker<'a>, def: &'c FnDef, body: &'c Body) -> Self {
        let mut frame = Frame::default();
        let mut bound = FxHashMap::default();
        for local in body.locals.iter().filter(|local| local.param) {
            bound.insert(local.name, 0);
            frame.locals.push(local.name);
        }
        Self {
            cx,
            def,
            body,
            scope: RegionScope::Function(def.name),
            loans: LoanSet::new(),
            handles: IndexMap::new(),
            iters: IndexMap::new(),
            parked: FxHashMap::default(),
            bound,
            frames: vec![frame],
            proofs: Vec::new(),
            span: def.span,
        }
    }

    fn validate_proofs(&mut self) -> Step {
        for request in self.cx.unit.proofs_for(self.def.name) {
            match self.cx.provers.prove(&request.left, &request.right) {
                Some(proof) => {
                    debug!(prover = %proof.prover, "disjointness proof accepted");
                    self.proofs.push(proof);
                }
                None => {
                    return Err(BorrowError::Unproven {
                        function: self.function().to_string(),
                        left: self.place_str(&request.left),
                        right: self.place_str(&request.right),
                        span: request.span,
                    });
                }
            }
        }
        Ok(())
    }

    fn step(&mut self, op: &OpKind) -> Step<ControlFlow<()>> {
        match op {
            OpKind::EnterScope => self.frames.push(Frame::default()),
            OpKind::ExitScope => self.exit_scope()?,
            OpKind::Bind { local } => self.bind_local(*local)?,
            OpKind::Drop { local } => {
                self.require_bound(*local)?;
                for frame in &mut self.frames {
                    frame.locals.retain(|bound| bound != local);
                }
                self.end_local(*local)?;
            }
            OpKind::Read { place } => {
                self.require_bound(place.base)?;
                self.check_access(place, Access::Read, "read")?;
            }
            OpKind::Write { place, kind } => {
                self.require_bound(place.base)?;
                let access = if self.through_cell(place) {
                    Access::InteriorWrite
                } else {
                    Access::Write
                };
                match kind {
                    WriteKind::Assign => self.check_access(place, access, "assign to")?,
                    WriteKind::SetDiscriminant => self.check_access(
                        &place.enum_root(),
                        access,
                        "change the discriminant of",
                    )?,
                }
            }
            OpKind::Borrow {
                handle,
                place,
                kind,
                region,
            } => self.borrow(*handle, place, *kind, *region)?,
            OpKind::Copy { handle, from } => {
                let loans = self.handle(*from)?.loans.clone();
                for id in &loans {
                    self.loans.hold(*id);
                }
                self.bind_handle(*handle, loans);
            }
            OpKind::Store { handle, into } => self.store(*handle, into)?,
            OpKind::Release { handle } => {
                if let Some(released) = self.handles.shift_remove(handle) {
                    self.release_handle(released);
                } else if let Some(iter) = self.iters.shift_remove(handle) {
                    self.release_loans(&iter.loans);
                } else {
                    return Err(self.unknown_handle(*handle));
                }
            }
            OpKind::Call { callee, args, dest } => {
                let loans = self.call_loans(*callee, args)?;
                if let Some(dest) = dest {
                    for id in &loans {
                        self.loans.hold(*id);
                    }
                    self.bind_handle(*dest, loans);
                }
            }
            OpKind::Return { value } => {
                self.check_return(*value)?;
                return Ok(ControlFlow::Break(()));
            }
            OpKind::Split {
                source,
                at,
                left,
                right,
                region,
            } => self.split(*source, *at, (*left, *right), *region)?,
            OpKind::Iter {
                iter,
                source,
                one_shot,
            } => {
                for id in &self.handle(*source)?.loans {
                    if let Some(loan) = self.loans.get(*id) {
                        self.sequence_extent(&loan.place, "iterate over")?;
                    }
                }
                let handle = self.take_handle(*source)?;
                let state = IterState {
                    loans: handle.loans,
                    one_shot: *one_shot,
                    next: 0,
                    yields: Vec::new(),
                    depth: self.depth(),
                };
                if let Some(old) = self.iters.insert(*iter, state) {
                    self.release_loans(&old.loans);
                }
            }
            OpKind::Advance { iter, output } => self.advance(*iter, *output)?,
            OpKind::Expose { iter, kind } => self.expose(*iter, *kind)?,
        }
        Ok(ControlFlow::Continue(()))
    }

    // Locals and scopes

    fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    fn require_bound(&self, local: Symbol) -> Step {
        if self.bound.contains_key(&local) {
            return Ok(());
        }
        let message = if self.body.local(local).is_some() {
            format!("local `{}` is used outside its scope", self.name(local))
        } else {
            format!("unknown local `{}`", self.name(local))
        };
        Err(self.malformed(message))
    }

    fn bind_local(&mut self, local: Symbol) -> Step {
        if self.body.local(local).is_none() {
            return Err(self.malformed(format!("unknown local `{}`", self.name(local))));
        }
        if self.bound.contains_key(&local) {
            for frame in &mut self.frames {
                frame.locals.retain(|bound| *bound != local);
            }
            self.end_local(local)?;
        }
        let depth = self.depth();
        self.bound.insert(local, depth);
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.push(local);
        }
        Ok(())
    }

    /// Ends a local's storage: values parked in it die, and no loan on it
    /// may outlive it.
    fn end_local(&mut self, local: Symbol) -> Step {
        for handle in self.parked.remove(&local).unwrap_or_default() {
            self.release_handle(handle);
        }
        self.check_access(&Place::from_local(local), Access::Write, "drop")?;
        self.bound.remove(&local);
        Ok(())
    }

    fn exit_scope(&mut self) -> Step {
        if self.frames.len() == 1 {
            return Err(self.malformed("scope exit without a matching scope entry".to_string()));
        }
        let depth = self.depth();

        let expired: Vec<Symbol> = self
            .handles
            .iter()
            .filter(|(_, handle)| handle.depth >= depth)
            .map(|(name, _)| *name)
            .collect();
        for name in expired {
            if let Some(handle) = self.handles.shift_remove(&name) {
                self.release_handle(handle);
            }
        }
        let expired: Vec<Symbol> = self
            .iters
            .iter()
            .filter(|(_, iter)| iter.depth >= depth)
            .map(|(name, _)| *name)
            .collect();
        for name in expired {
            if let Some(iter) = self.iters.shift_remove(&name) {
                self.release_loans(&iter.loans);
            }
        }

        let frame = self.frames.pop().unwrap_or_default();
        for local in frame.locals.into_iter().rev() {
            self.end_local(local)?;
        }
        Ok(())
    }

    // Handles

    fn handle(&self, name: Symbol) -> Step<&Handle> {
        self.handles
            .get(&name)
            .ok_or_else(|| self.unknown_handle(name))
    }

    fn take_handle(&mut self, name: Symbol) -> Step<Handle> {
        match self.handles.shift_remove(&name) {
            Some(handle) => Ok(handle),
            None => Err(self.unknown_handle(name)),
        }
    }

    /// Binds `name` to loans the caller already holds, replacing any
    /// previous handle of that name.
    fn bind_handle(&mut self, name: Symbol, loans: LoanList) {
        let handle = Handle {
            loans,
            depth: self.depth(),
        };
        if let Some(old) = self.handles.insert(name, handle) {
            self.release_handle(old);
        }
    }

    fn release_handle(&mut self, handle: Handle) {
        self.release_loans(&handle.loans);
    }

    fn release_loans(&mut self, loans: &[LoanId]) {
        for id in loans {
            if self.loans.release(*id) {
                trace!(loan = %id, "loan ended");
            }
        }
    }

    // Accesses and borrows

    fn is_proven(&self, a: &Place, b: &Place) -> bool {
        self.proofs.iter().any(|proof| proof.covers(a, b))
    }

    fn check_access(&self, place: &Place, access: Access, what: &str) -> Step {
        let conflict = self
            .loans
            .check_access(place, access, |a, b| self.is_proven(a, b));
        match conflict {
            Some(loan) => Err(self.conflict(what, place, loan)),
            None => Ok(()),
        }
    }

    fn borrow(
        &mut self,
        handle: Symbol,
        place: &Place,
        kind: BorrowKind,
        region: Option<Symbol>,
    ) -> Step {
        self.require_bound(place.base)?;
        let region = self.loan_region(place, region)?;
        let what = if kind.is_mutable() {
            "mutably borrow"
        } else {
            "borrow"
        };
        self.check_access(place, Access::of_borrow(kind), what)?;
        let id = self.loans.add_loan(place.clone(), kind, region, self.span);
        trace!(loan = %id, mutable = kind.is_mutable(), "loan created");
        self.bind_handle(handle, smallvec::smallvec![id]);
        Ok(())
    }

    /// Region a new loan on `place` lives for.
    ///
    /// Data behind a reference parameter lives as long as the reference's
    /// region; anything else lives as long as the scope binding its local.
    fn loan_region(&self, place: &Place, explicit: Option<Symbol>) -> Step<LoanRegion> {
        let source = self.param_pointee_region(place)?;
        let Some(name) = explicit else {
            return Ok(match source {
                Some(region) => LoanRegion::Param(region),
                None => LoanRegion::Scope(self.bound.get(&place.base).copied().unwrap_or(0)),
            });
        };
        let target = self.region_named(name)?;
        match source {
            Some(region) if self.cx.graph.outlives(region, target) => Ok(LoanRegion::Param(target)),
            _ => Err(BorrowError::ShortLived {
                function: self.function().to_string(),
                place: self.place_str(place),
                region: self.cx.graph.display(target),
                span: self.span,
            }),
        }
    }

    fn param_pointee_region(&self, place: &Place) -> Step<Option<RegionId>> {
        if place.projection.first() != Some(&PlaceElem::Deref) {
            return Ok(None);
        }
        let Some(local) = self.body.local(place.base).filter(|local| local.param) else {
            return Ok(None);
        };
        let Ty::Ref { region, .. } = &local.ty else {
            return Ok(None);
        };
        if *region == RegionRef::Unbounded {
            return Ok(Some(self.cx.graph.static_region()));
        }
        match self.cx.resolve_in(self.scope, *region) {
            Some(id) => Ok(Some(id)),
            None => Err(self.malformed(format!(
                "region of parameter `{}` is not declared",
                self.name(place.base)
            ))),
        }
    }

    fn region_named(&self, name: Symbol) -> Step<RegionId> {
        self.cx
            .graph
            .region_by_name(self.scope, name)
            .ok_or_else(|| self.malformed(format!("undeclared region `'{}`", self.name(name))))
    }

    fn store(&mut self, handle: Symbol, into: &Place) -> Step {
        self.require_bound(into.base)?;
        let stored = self.take_handle(handle)?;
        self.check_access(into, Access::Write, "store into")?;

        if let Some(target) = self.param_pointee_region(into)? {
            for loan in stored.loans.iter().filter_map(|id| self.loans.get(*id)) {
                let outlives = match loan.region {
                    LoanRegion::Param(region) => self.cx.graph.outlives(region, target),
                    LoanRegion::Scope(_) => false,
                };
                if !outlives {
                    return Err(BorrowError::ShortLived {
                        function: self.function().to_string(),
                        place: self.place_str(&loan.place),
                        region: self.cx.graph.display(target),
                        span: self.span,
                    });
                }
            }
        }
        self.parked.entry(into.base).or_default().push(stored);
        Ok(())
    }

    // Interior mutability

    /// Whether `place` is, or lies inside, a runtime-checked cell.
    fn through_cell(&self, place: &Place) -> bool {
        let Some(local) = self.body.local(place.base) else {
            return false;
        };
        let mut ty = local.ty.clone();
        if self.is_cell(&ty) {
            return true;
        }
        for elem in &place.projection {
            let Some(next) = self.project_ty(&ty, elem) else {
                return false;
            };
            if self.is_cell(&next) {
                return true;
            }
            ty = next;
        }
        false
    }

    fn is_cell(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Adt { name, .. } if self.cx.cells.contains(name))
    }

    fn project_ty(&self, ty: &Ty, elem: &PlaceElem) -> Option<Ty> {
        match (ty, elem) {
            (_, PlaceElem::Downcast(_)) => Some(ty.clone()),
            (Ty::Ref { target, .. } | Ty::RawPtr { target, .. }, PlaceElem::Deref) => {
                Some((**target).clone())
            }
            (Ty::Adt { name, args, .. }, PlaceElem::Deref) if *name == self.cx.boxed => {
                args.first().cloned()
            }
            (Ty::Tuple(elems), PlaceElem::Field(field)) => {
                let idx: usize = self.name(*field).parse().ok()?;
                elems.get(idx).cloned()
            }
            (Ty::Adt { name, args, .. }, PlaceElem::Field(field)) => {
                let def = self.cx.unit.type_def(*name)?;
                let field = def.field(*field)?;
                Some(substitute(&field.ty, &def.type_params, args))
            }
            (Ty::Slice(elem) | Ty::Array(elem, _), PlaceElem::Index(_)) => Some((**elem).clone()),
            (Ty::Slice(elem) | Ty::Array(elem, _), PlaceElem::Range { .. }) => {
                Some(Ty::Slice(elem.clone()))
            }
            (Ty::Adt { name, args, .. }, PlaceElem::Index(_)) if *name == self.cx.vec => {
                args.first().cloned()
            }
            (Ty::Adt { name, args, .. }, PlaceElem::Range { .. }) if *name == self.cx.vec => {
                args.first().map(|elem| Ty::Slice(Box::new(elem.clone())))
            }
            _ => None,
        }
    }

    // Calls and returns

    /// Loans the result of a call carries: those of every argument whose
    /// parameter regions outlive a region flowing out of the result.
    fn call_loans(&self, callee: Symbol, args: &[Operand]) -> Step<LoanList> {
        let mut handles = Vec::with_capacity(args.len());
        for arg in args {
            handles.push(match arg {
                Operand::Handle(name) => Some(self.handle(*name)?),
                Operand::Value => None,
            });
        }

        let mut loans = LoanList::new();
        let mut inherit = |handle: &Handle| {
            for id in &handle.loans {
                if !loans.contains(id) {
                    loans.push(*id);
                }
            }
        };

        let Some(def) = self.cx.unit.function(callee) else {
            debug!(callee = %self.name(callee), "unknown callee; result borrows from every argument");
            handles.into_iter().flatten().for_each(&mut inherit);
            return Ok(loans);
        };
        if def.signature.params.len() != args.len() {
            return Err(self.malformed(format!(
                "`{}` takes {} arguments but {} were supplied",
                self.name(callee),
                def.signature.params.len(),
                args.len()
            )));
        }

        let scope = RegionScope::Function(def.name);
        let outputs = self.cx.flowing_regions(&def.signature.output);
        for (param, handle) in def.signature.params.iter().zip(handles) {
            let Some(handle) = handle else { continue };
            let inputs = self.cx.flowing_regions(&param.ty);
            let derives = inputs.iter().any(|input| {
                outputs.iter().any(|output| {
                    if *input == RegionRef::Unbounded || *output == RegionRef::Unbounded {
                        return true;
                    }
                    match (
                        self.cx.resolve_in(scope, *input),
                        self.cx.resolve_in(scope, *output),
                    ) {
                        (Some(input), Some(output)) => self.cx.graph.outlives(input, output),
                        _ => false,
                    }
                })
            });
            if derives {
                inherit(handle);
            }
        }
        Ok(loans)
    }

    fn check_return(&self, value: Option<Symbol>) -> Step {
        let Some(name) = value else {
            return Ok(());
        };
        let handle = self.handle(name)?;
        let outputs = self.def.signature.output.regions();
        if outputs.is_empty() {
            return Ok(());
        }
        let unbounded = outputs.contains(&RegionRef::Unbounded);
        let outputs: Vec<RegionId> = outputs
            .into_iter()
            .filter_map(|region| self.cx.resolve_in(self.scope, region))
            .collect();

        for loan in handle.loans.iter().filter_map(|id| self.loans.get(*id)) {
            match loan.region {
                LoanRegion::Scope(_) => {
                    return Err(BorrowError::Escaping {
                        function: self.function().to_string(),
                        place: self.place_str(&loan.place),
                        span: self.span,
                    });
                }
                LoanRegion::Param(region) => {
                    let bounded = unbounded
                        || outputs
                            .iter()
                            .any(|output| self.cx.graph.outlives(region, *output));
                    if !bounded {
                        return Err(BorrowError::UnboundedReturn {
                            function: self.function().to_string(),
                            place: self.place_str(&loan.place),
                            region: self.cx.graph.display(region),
                            span: self.span,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    // Splits and iterators

    /// The sequential container a loan's place covers, as the container
    /// place and the index range.
    fn extent(&self, place: &Place) -> Option<(Place, u64, u64)> {
        if let Some(PlaceElem::Range { start, end }) = place.projection.last() {
            let mut container = place.clone();
            container.projection.pop();
            return Some((container, *start, *end));
        }
        if !place.projection.iter().all(|elem| *elem == PlaceElem::Deref) {
            return None;
        }
        let local = self.body.local(place.base)?;
        let len = local.len.or_else(|| array_len(&local.ty))?;
        Some((place.clone(), 0, len))
    }

    /// Like [`BodyWalker::extent`], but a place with no known length or an
    /// inverted range is malformed.
    fn sequence_extent(&self, place: &Place, what: &str) -> Step<(Place, u64, u64)> {
        match self.extent(place) {
            Some((container, start, end)) if start <= end => Ok((container, start, end)),
            Some(_) => Err(self.malformed(format!(
                "cannot {what} `{}`: its index range is inverted",
                self.place_str(place)
            ))),
            None => Err(self.malformed(format!(
                "cannot {what} `{}`: its length is unknown",
                self.place_str(place)
            ))),
        }
    }

    /// Checks loans just carved out of a handle against the other live
    /// loans.
    fn check_derived(&self, ids: &[LoanId]) -> Step {
        for &id in ids {
            let Some(derived) = self.loans.get(id) else { continue };
            if let Some(loan) = self.loans.check_derived(id, |a, b| self.is_proven(a, b)) {
                return Err(self.conflict(&derived.origin.to_string(), &derived.place, loan));
            }
        }
        Ok(())
    }

    fn split(
        &mut self,
        source: Symbol,
        at: u64,
        (left, right): (Symbol, Symbol),
        region: Option<Symbol>,
    ) -> Step {
        let handle = self.take_handle(source)?;
        let target = region.map(|name| self.region_named(name)).transpose()?;
        let mut lefts = LoanList::new();
        let mut rights = LoanList::new();

        for &id in &handle.loans {
            let Some(loan) = self.loans.get(id) else { continue };
            let (container, start, end) = self.sequence_extent(&loan.place, "split")?;
            let len = end - start;
            if at > len {
                return Err(BorrowError::SplitOutOfBounds {
                    function: self.function().to_string(),
                    place: self.place_str(&loan.place),
                    at,
                    len,
                    span: self.span,
                });
            }
            let region = match (target, loan.region) {
                (None, region) => region,
                (Some(target), LoanRegion::Param(region))
                    if self.cx.graph.outlives(region, target) =>
                {
                    LoanRegion::Param(target)
                }
                (Some(target), _) => {
                    return Err(BorrowError::SplitRegion {
                        function: self.function().to_string(),
                        place: self.place_str(&loan.place),
                        region: self.cx.graph.display(target),
                        span: self.span,
                    });
                }
            };

            let mid = start + at;
            let origin = LoanOrigin::Split { parent: id };
            let halves = (
                container.project(PlaceElem::Range { start, end: mid }),
                container.project(PlaceElem::Range { start: mid, end }),
            );
            let (Some(l), Some(r)) = (
                self.loans.add_derived(id, halves.0, origin, self.span),
                self.loans.add_derived(id, halves.1, origin, self.span),
            ) else {
                continue;
            };
            self.loans.mark_disjoint(l, r);
            self.loans.set_region(l, region);
            self.loans.set_region(r, region);
            trace!(parent = %id, left = %l, right = %r, at, "loan split");
            lefts.push(l);
            rights.push(r);
        }

        self.check_derived(&lefts)?;
        self.check_derived(&rights)?;
        self.release_handle(handle);
        self.bind_handle(left, lefts);
        self.bind_handle(right, rights);
        Ok(())
    }

    fn advance(&mut self, iter: Symbol, output: Symbol) -> Step {
        let Some(state) = self.iters.get(&iter) else {
            return Err(self.unknown_handle(iter));
        };
        if !state.one_shot && state.yields.iter().any(|id| self.loans.is_live(*id)) {
            return Err(BorrowError::LendingAdvance {
                function: self.function().to_string(),
                iter: self.name(iter).to_string(),
                span: self.span,
            });
        }
        let (index, one_shot) = (state.next, state.one_shot);
        let sources = state.loans.clone();
        let previous = state.yields.clone();

        let mut places = Vec::with_capacity(sources.len());
        for &id in &sources {
            let Some(loan) = self.loans.get(id) else { continue };
            let (container, start, end) = self.sequence_extent(&loan.place, "iterate over")?;
            if index >= end - start {
                trace!(iter = %self.name(iter), index, "iterator exhausted");
                self.bind_handle(output, LoanList::new());
                return Ok(());
            }
            places.push((id, container.project(PlaceElem::Index(start + index))));
        }

        let mut yielded = LoanList::new();
        let origin = LoanOrigin::IterYield { iter, index };
        for (source, place) in places {
            let Some(id) = self.loans.add_derived(source, place, origin, self.span) else {
                continue;
            };
            if one_shot {
                for prev in &previous {
                    self.loans.mark_disjoint(id, *prev);
                }
            }
            yielded.push(id);
        }
        self.check_derived(&yielded)?;
        if let Some(state) = self.iters.get_mut(&iter) {
            state.next += 1;
            state.yields.extend(yielded.iter().copied());
        }
        self.bind_handle(output, yielded);
        Ok(())
    }

    fn expose(&self, iter: Symbol, kind: BorrowKind) -> Step {
        let Some(state) = self.iters.get(&iter) else {
            return Err(self.unknown_handle(iter));
        };
        let aliased = state
            .yields
            .iter()
            .filter_map(|id| self.loans.get(*id))
            .any(|loan| kind.is_mutable() || loan.kind.is_mutable());
        if aliased {
            return Err(BorrowError::ExposeWhileYielded {
                function: self.function().to_string(),
                iter: self.name(iter).to_string(),
                span: self.span,
            });
        }
        Ok(())
    }

    // Diagnostics

    fn name(&self, sym: Symbol) -> &str {
        self.cx.unit.name(sym)
    }

    fn function(&self) -> &str {
        self.name(self.def.name)
    }

    fn place_str(&self, place: &Place) -> String {
        place.display(&self.cx.unit.interner).to_string()
    }

    fn conflict(&self, access: &str, place: &Place, loan: &Loan) -> BorrowError {
        BorrowError::Conflict {
            function: self.function().to_string(),
            access: access.to_string(),
            place: self.place_str(place),
            state: self.loans.state_of(place).to_string(),
            loan_place: self.place_str(&loan.place),
            loan_span: loan.span,
            span: self.span,
        }
    }

    fn unknown_handle(&self, name: Symbol) -> BorrowError {
        self.malformed(format!("unknown handle `{}`", self.name(name)))
    }

    fn malformed(&self, message: String) -> BorrowError {
        BorrowError::Malformed {
            function: self.function().to_string(),
            message,
            span: self.span,
        }
    }
}

fn array_len(ty: &Ty) -> Option<u64> {
    match ty {
        Ty::Array(_, len) => Some(*len),
        Ty::Ref { target, .. } | Ty::RawPtr { target, .. } => array_len(target),
        _ => None,
    }
}

/// Replaces type parameters of a definition with the arguments it is
/// applied to.
fn substitute(ty: &Ty, params: &[Symbol], args: &[Ty]) -> Ty {
    let go = |ty: &Ty| substitute(ty, params, args);
    match ty {
        Ty::Param(name) => params
            .iter()
            .position(|param| param == name)
            .and_then(|idx| args.get(idx))
            .cloned()
            .unwrap_or_else(|| ty.clone()),
        Ty::Prim(_) => ty.clone(),
        Ty::Ref {
            region,
            mutability,
            target,
        } => Ty::reference(*region, *mutability, go(target.as_ref())),
        Ty::RawPtr { mutability, target } => Ty::RawPtr {
            mutability: *mutability,
            target: Box::new(go(target.as_ref())),
        },
        Ty::Adt {
            name,
            regions,
            args: inner,
        } => Ty::Adt {
            name: *name,
            regions: regions.clone(),
            args: inner.iter().map(go).collect(),
        },
        Ty::Slice(elem) => Ty::Slice(Box::new(go(elem.as_ref()))),
        Ty::Array(elem, len) => Ty::Array(Box::new(go(elem.as_ref())), *len),
        Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(go).collect()),
        Ty::FnPtr { inputs, output } => Ty::FnPtr {
            inputs: inputs.iter().map(go).collect(),
            output: Box::new(go(output.as_ref())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_intern::Interner;
    use ks_ir::lower_json;
    use ks_lifetime::elide_signatures;
    use ks_variance::VarianceEngine;

    struct Fixture {
        unit: CompilationUnit,
        graph: RegionGraph,
        table: VarianceTable,
        provers: ProverRegistry,
    }

    fn fixture(json: &str) -> Fixture {
        let interner = Interner::new();
        let mut unit = lower_json(json, &interner).unwrap();
        let (mut graph, errors) = RegionGraph::from_unit(&unit);
        assert!(errors.is_empty(), "{errors:?}");
        let errors = elide_signatures(&mut unit, &mut graph, &|_| false);
        assert!(errors.is_empty(), "{errors:?}");
        graph.seal();
        let table = VarianceEngine::new(&unit).solve().table;
        Fixture {
            unit,
            graph,
            table,
            provers: ProverRegistry::new(),
        }
    }

    impl Fixture {
        fn checker(&self) -> BorrowChecker<'_> {
            BorrowChecker::new(&self.unit, &self.graph, &self.table, &self.provers)
        }

        fn errors(&self) -> Vec<String> {
            match self.checker().check(&|_| false) {
                Ok(()) => Vec::new(),
                Err(errors) => errors.iter().map(ToString::to_string).collect(),
            }
        }

        fn def(&self, name: &str) -> &FnDef {
            let sym = self.unit.interner.intern(name);
            self.unit.function(sym).unwrap()
        }
    }

    fn main_with(locals: &str, body: &str) -> String {
        format!(r#"{{"functions": [{{"name": "main", "locals": [{locals}], "body": [{body}]}}]}}"#)
    }

    #[test]
    fn test_mutable_loan_stays_exclusive_behind_shared_view() {
        let unit = |tail: &str| {
            format!(
                r#"{{
                "types": [{{"name": "Foo", "fields": [{{"name": "x", "ty": "u32"}}]}}],
                "functions": [
                    {{"name": "get_shared", "params": [{{"name": "self", "ty": "&mut Foo"}}], "ret": "&Foo"}},
                    {{"name": "main", "locals": [{{"name": "foo", "ty": "Foo", "mut": true}}], "body": [
                        {{"op": "bind", "local": "foo"}},
                        {{"op": "borrow", "handle": "l", "place": "foo", "kind": "mut"}},
                        {{"op": "call", "callee": "get_shared", "args": ["l"], "dest": "r"}},
                        {{"op": "release", "handle": "l"}},
                        {tail}
                    ]}}
                ]}}"#
            )
        };

        let fx = fixture(&unit(r#"{"op": "borrow", "handle": "s", "place": "foo"}"#));
        assert_eq!(
            fx.errors(),
            ["cannot borrow `foo` because it is borrowed as mutable"]
        );

        let fx = fixture(&unit(
            r#"{"op": "release", "handle": "r"}, {"op": "borrow", "handle": "s", "place": "foo"}"#,
        ));
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn test_shared_loans_coexist_and_block_writes() {
        let fx = fixture(&main_with(
            r#"{"name": "x", "ty": "u32", "mut": true}"#,
            r#"{"op": "bind", "local": "x"},
               {"op": "borrow", "handle": "a", "place": "x"},
               {"op": "borrow", "handle": "b", "place": "x"},
               {"op": "read", "place": "x"},
               {"op": "write", "place": "x"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot assign to `x` because it is borrowed as shared"]);
    }

    #[test]
    fn test_field_loans_are_disjoint() {
        let fx = fixture(&format!(
            r#"{{"types": [{{"name": "P", "fields": [{{"name": "a", "ty": "u32"}}, {{"name": "b", "ty": "u32"}}]}}],
                "functions": [{{"name": "main", "locals": [{{"name": "p", "ty": "P", "mut": true}}], "body": [
                    {{"op": "bind", "local": "p"}},
                    {{"op": "borrow", "handle": "a", "place": "p.a", "kind": "mut"}},
                    {{"op": "borrow", "handle": "b", "place": "p.b", "kind": "mut"}},
                    {{"op": "read", "place": "p"}}
                ]}}]}}"#
        ));
        assert_eq!(fx.errors(), ["cannot read `p` because it is borrowed as mutable"]);
    }

    #[test]
    fn test_split_issues_two_disjoint_halves() {
        let fx = fixture(&main_with(
            r#"{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 6}"#,
            r#"{"op": "bind", "local": "v"},
               {"op": "borrow", "handle": "h", "place": "v", "kind": "mut"},
               {"op": "split", "source": "h", "at": 2, "left": "a", "right": "b"},
               {"op": "copy", "handle": "a2", "from": "a"}"#,
        ));
        let checker = fx.checker();
        let walker = checker.walk(fx.def("main")).unwrap().unwrap();

        let loans: Vec<_> = walker
            .loans
            .loans()
            .map(|loan| (walker.place_str(&loan.place), loan.kind))
            .collect();
        assert_eq!(
            loans,
            [
                ("v[0..2]".to_string(), BorrowKind::Mutable),
                ("v[2..6]".to_string(), BorrowKind::Mutable),
            ]
        );
        let halves: Vec<_> = walker.loans.loans().collect();
        assert!(walker.loans.are_exempt(halves[0], halves[1]));
        assert!(halves[0].descends_from(LoanId(0)));
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn test_split_halves_still_guard_the_container() {
        let fx = fixture(&main_with(
            r#"{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 6}"#,
            r#"{"op": "bind", "local": "v"},
               {"op": "borrow", "handle": "h", "place": "v", "kind": "mut"},
               {"op": "split", "source": "h", "at": 2, "left": "a", "right": "b"},
               {"op": "release", "handle": "a"},
               {"op": "read", "place": "v[4]"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot read `v[4]` because it is borrowed as mutable"]);
    }

    #[test]
    fn test_split_past_end() {
        let fx = fixture(&main_with(
            r#"{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 3}"#,
            r#"{"op": "bind", "local": "v"},
               {"op": "borrow", "handle": "h", "place": "v", "kind": "mut"},
               {"op": "split", "source": "h", "at": 4, "left": "a", "right": "b"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot split `v` at 4: length is 3"]);
    }

    #[test]
    fn test_split_of_parameter_rebounds_to_its_region() {
        let fx = fixture(
            r#"{"functions": [{"name": "head", "regions": ["'a"],
                "params": [{"name": "s", "ty": "&'a mut [u8]", "len": 4}], "ret": "&'a mut [u8]",
                "body": [
                    {"op": "borrow", "handle": "h", "place": "s.*", "kind": "mut"},
                    {"op": "split", "source": "h", "at": 1, "left": "l", "right": "r", "region": "'a"},
                    {"op": "return", "value": "l"}
                ]}]}"#,
        );
        assert!(fx.errors().is_empty());
    }

    fn iter_body(len: u64, one_shot: bool, steps: &str) -> String {
        main_with(
            &format!(r#"{{"name": "v", "ty": "Vec<u8>", "mut": true, "len": {len}}}"#),
            &format!(
                r#"{{"op": "bind", "local": "v"}},
                   {{"op": "borrow", "handle": "h", "place": "v", "kind": "mut"}},
                   {{"op": "iter", "iter": "it", "source": "h", "one-shot": {one_shot}}},
                   {steps}"#
            ),
        )
    }

    #[test]
    fn test_one_shot_yields_are_disjoint_until_store_is_exposed() {
        let fx = fixture(&iter_body(
            3,
            true,
            r#"{"op": "advance", "iter": "it", "output": "x"},
               {"op": "advance", "iter": "it", "output": "y"},
               {"op": "expose", "iter": "it", "kind": "mut"}"#,
        ));
        assert_eq!(
            fx.errors(),
            ["cannot access the backing store of `it` while a yielded element is live"]
        );

        let fx = fixture(&iter_body(
            3,
            true,
            r#"{"op": "advance", "iter": "it", "output": "x"},
               {"op": "release", "handle": "x"},
               {"op": "advance", "iter": "it", "output": "y"},
               {"op": "release", "handle": "y"},
               {"op": "expose", "iter": "it", "kind": "mut"}"#,
        ));
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn test_lending_iterator_requires_release_before_advance() {
        let fx = fixture(&iter_body(
            3,
            false,
            r#"{"op": "advance", "iter": "it", "output": "x"},
               {"op": "advance", "iter": "it", "output": "y"}"#,
        ));
        assert_eq!(
            fx.errors(),
            ["cannot advance `it` while a previously yielded element is live"]
        );

        let fx = fixture(&iter_body(
            3,
            false,
            r#"{"op": "advance", "iter": "it", "output": "x"},
               {"op": "release", "handle": "x"},
               {"op": "advance", "iter": "it", "output": "y"}"#,
        ));
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn test_exhausted_iterator_yields_nothing() {
        let fx = fixture(&iter_body(
            1,
            true,
            r#"{"op": "advance", "iter": "it", "output": "x"},
               {"op": "advance", "iter": "it", "output": "y"}"#,
        ));
        let checker = fx.checker();
        let walker = checker.walk(fx.def("main")).unwrap().unwrap();
        let x = fx.unit.interner.intern("x");
        let y = fx.unit.interner.intern("y");

        let x_loan = walker.handles[&x].loans[0];
        assert_eq!(walker.place_str(&walker.loans.get(x_loan).unwrap().place), "v[0]");
        assert!(walker.handles[&y].loans.is_empty());
    }

    #[test]
    fn test_iterators_over_copied_handles_cannot_alias() {
        let fx = fixture(&iter_body(
            3,
            true,
            r#"{"op": "advance", "iter": "it", "output": "x"}"#,
        ));
        assert!(fx.errors().is_empty());

        let fx = fixture(&main_with(
            r#"{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 3}"#,
            r#"{"op": "bind", "local": "v"},
               {"op": "borrow", "handle": "h", "place": "v", "kind": "mut"},
               {"op": "copy", "handle": "h2", "from": "h"},
               {"op": "iter", "iter": "it", "source": "h"},
               {"op": "iter", "iter": "it2", "source": "h2"},
               {"op": "advance", "iter": "it", "output": "x"},
               {"op": "advance", "iter": "it2", "output": "y"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot yield `v[0]` because it is borrowed as mutable"]);
    }

    #[test]
    fn test_splits_of_copied_handles_cannot_alias() {
        let fx = fixture(&main_with(
            r#"{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 4}"#,
            r#"{"op": "bind", "local": "v"},
               {"op": "borrow", "handle": "h", "place": "v", "kind": "mut"},
               {"op": "copy", "handle": "h2", "from": "h"},
               {"op": "split", "source": "h", "at": 2, "left": "a", "right": "b"},
               {"op": "split", "source": "h2", "at": 1, "left": "c", "right": "d"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot split `v[0..1]` because it is borrowed as mutable"]);
    }

    #[test]
    fn test_iterating_without_a_length_is_malformed() {
        let fx = fixture(&main_with(
            r#"{"name": "v", "ty": "Vec<u8>", "mut": true}"#,
            r#"{"op": "bind", "local": "v"},
               {"op": "borrow", "handle": "h", "place": "v", "kind": "mut"},
               {"op": "iter", "iter": "it", "source": "h"},
               {"op": "advance", "iter": "it", "output": "x"}"#,
        ));
        assert_eq!(
            fx.errors(),
            ["malformed body of `main`: cannot iterate over `v`: its length is unknown"]
        );

        let err = fx.checker().check_function(fx.def("main")).unwrap_err();
        assert!(matches!(err, BorrowError::Malformed { .. }));
    }

    #[test]
    fn test_discriminant_write_covers_every_variant() {
        let unit = |write: &str| {
            format!(
                r#"{{"types": [{{"name": "E", "kind": "enum", "variants": [
                        {{"name": "A", "fields": [{{"name": "0", "ty": "u32"}}]}},
                        {{"name": "B", "fields": [{{"name": "0", "ty": "u32"}}]}}]}}],
                    "functions": [{{"name": "main", "locals": [{{"name": "e", "ty": "E", "mut": true}}], "body": [
                        {{"op": "bind", "local": "e"}},
                        {{"op": "borrow", "handle": "p", "place": "e@A.0"}},
                        {write}
                    ]}}]}}"#
            )
        };

        let fx = fixture(&unit(r#"{"op": "write", "place": "e@B.0"}"#));
        assert!(fx.errors().is_empty());

        let fx = fixture(&unit(r#"{"op": "write", "place": "e@B.0", "discriminant": true}"#));
        assert_eq!(
            fx.errors(),
            ["cannot change the discriminant of `e` because it is borrowed as shared"]
        );
    }

    #[test]
    fn test_cells_allow_writes_under_shared_loans() {
        let unit = |place: &str| {
            format!(
                r#"{{"types": [{{"name": "S", "fields": [
                        {{"name": "count", "ty": "Cell<u32>"}}, {{"name": "len", "ty": "u32"}}]}}],
                    "functions": [{{"name": "main", "locals": [{{"name": "s", "ty": "S"}}], "body": [
                        {{"op": "bind", "local": "s"}},
                        {{"op": "borrow", "handle": "r", "place": "s"}},
                        {{"op": "write", "place": "{place}"}}
                    ]}}]}}"#
            )
        };

        assert!(fixture(&unit("s.count")).errors().is_empty());
        assert_eq!(
            fixture(&unit("s.len")).errors(),
            ["cannot assign to `s.len` because it is borrowed as shared"]
        );
    }

    #[test]
    fn test_call_result_borrows_only_from_flowing_arguments() {
        let unit = |write: &str| {
            format!(
                r#"{{"functions": [
                    {{"name": "first", "regions": ["'a", "'b"],
                      "params": [{{"name": "x", "ty": "&'a u32"}}, {{"name": "y", "ty": "&'b u32"}}],
                      "ret": "&'a u32"}},
                    {{"name": "main", "locals": [{{"name": "a", "ty": "u32"}}, {{"name": "b", "ty": "u32"}}], "body": [
                        {{"op": "bind", "local": "a"}},
                        {{"op": "bind", "local": "b"}},
                        {{"op": "borrow", "handle": "ha", "place": "a"}},
                        {{"op": "borrow", "handle": "hb", "place": "b"}},
                        {{"op": "call", "callee": "first", "args": ["ha", "hb"], "dest": "r"}},
                        {{"op": "release", "handle": "ha"}},
                        {{"op": "release", "handle": "hb"}},
                        {write}
                    ]}}]}}"#
            )
        };

        assert!(fixture(&unit(r#"{"op": "write", "place": "b"}"#)).errors().is_empty());
        assert_eq!(
            fixture(&unit(r#"{"op": "write", "place": "a"}"#)).errors(),
            ["cannot assign to `a` because it is borrowed as shared"]
        );
    }

    #[test]
    fn test_unknown_callee_borrows_from_every_argument() {
        let fx = fixture(&main_with(
            r#"{"name": "a", "ty": "u32"}"#,
            r#"{"op": "bind", "local": "a"},
               {"op": "borrow", "handle": "ha", "place": "a", "kind": "mut"},
               {"op": "call", "callee": "opaque", "args": ["ha", null], "dest": "r"},
               {"op": "release", "handle": "ha"},
               {"op": "read", "place": "a"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot read `a` because it is borrowed as mutable"]);
    }

    #[test]
    fn test_returning_reference_to_local() {
        let unit = |place: &str| {
            format!(
                r#"{{"functions": [{{"name": "get", "params": [{{"name": "x", "ty": "&u32"}}], "ret": "&u32",
                    "locals": [{{"name": "y", "ty": "u32"}}], "body": [
                        {{"op": "bind", "local": "y"}},
                        {{"op": "borrow", "handle": "h", "place": "{place}"}},
                        {{"op": "return", "value": "h"}}
                    ]}}]}}"#
            )
        };

        assert!(fixture(&unit("x.*")).errors().is_empty());
        assert_eq!(
            fixture(&unit("y")).errors(),
            ["cannot return reference to local variable `y`"]
        );
    }

    #[test]
    fn test_returned_region_must_outlive_output() {
        let unit = |regions: &str| {
            format!(
                r#"{{"functions": [{{"name": "pick", "regions": [{regions}],
                    "params": [{{"name": "x", "ty": "&'a u32"}}, {{"name": "y", "ty": "&'b u32"}}],
                    "ret": "&'a u32", "body": [
                        {{"op": "borrow", "handle": "h", "place": "y.*"}},
                        {{"op": "return", "value": "h"}}
                    ]}}]}}"#
            )
        };

        assert_eq!(
            fixture(&unit(r#""'a", "'b""#)).errors(),
            ["returned loan on `y.*` lives for `'b`, which outlives no output region"]
        );
        assert!(fixture(&unit(r#""'a", "'b: 'a""#)).errors().is_empty());
    }

    #[test]
    fn test_local_cannot_be_borrowed_for_a_named_region() {
        let fx = fixture(
            r#"{"functions": [{"name": "f", "regions": ["'a"], "params": [{"name": "x", "ty": "&'a u32"}],
                "locals": [{"name": "y", "ty": "u32"}], "body": [
                    {"op": "bind", "local": "y"},
                    {"op": "borrow", "handle": "h", "place": "y", "region": "'a"}
                ]}]}"#,
        );
        assert_eq!(fx.errors(), ["borrow of `y` does not live long enough for `'a`"]);
    }

    #[test]
    fn test_proof_requests_license_index_loans() {
        let unit = |proofs: &str| {
            format!(
                r#"{{"functions": [{{"name": "main",
                    "locals": [{{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 4}}], "body": [
                        {{"op": "bind", "local": "v"}},
                        {{"op": "borrow", "handle": "x", "place": "v[0]", "kind": "mut"}},
                        {{"op": "borrow", "handle": "y", "place": "v[1]", "kind": "mut"}}
                    ]}}], "proofs": [{proofs}]}}"#
            )
        };

        assert_eq!(
            fixture(&unit("")).errors(),
            ["cannot mutably borrow `v[1]` because it is borrowed as mutable"]
        );
        let proof = r#"{"function": "main", "left": "v[0]", "right": "v[1]"}"#;
        assert!(fixture(&unit(proof)).errors().is_empty());
        let bogus = r#"{"function": "main", "left": "v[0]", "right": "v[0]"}"#;
        assert_eq!(
            fixture(&unit(bogus)).errors(),
            ["cannot prove `v[0]` and `v[0]` disjoint"]
        );
    }

    #[test]
    fn test_parked_loan_outlives_its_local() {
        let fx = fixture(&main_with(
            r#"{"name": "holder", "ty": "u32"}, {"name": "x", "ty": "u32"}"#,
            r#"{"op": "bind", "local": "holder"},
               {"op": "enter-scope"},
               {"op": "bind", "local": "x"},
               {"op": "borrow", "handle": "h", "place": "x"},
               {"op": "store", "handle": "h", "into": "holder"},
               {"op": "exit-scope"}"#,
        ));
        assert_eq!(fx.errors(), ["cannot drop `x` because it is borrowed as shared"]);
    }

    #[test]
    fn test_scope_exit_releases_inner_handles() {
        let fx = fixture(&main_with(
            r#"{"name": "x", "ty": "u32"}"#,
            r#"{"op": "bind", "local": "x"},
               {"op": "enter-scope"},
               {"op": "borrow", "handle": "h", "place": "x", "kind": "mut"},
               {"op": "exit-scope"},
               {"op": "write", "place": "x"}"#,
        ));
        assert!(fx.errors().is_empty());
    }

    #[test]
    fn test_errors_are_isolated_per_function() {
        let fx = fixture(
            r#"{"functions": [
                {"name": "one", "locals": [{"name": "x", "ty": "u32"}], "body": [
                    {"op": "read", "place": "x"},
                    {"op": "read", "place": "nope"}
                ]},
                {"name": "two", "body": [{"op": "release", "handle": "h"}]},
                {"name": "three", "body": [{"op": "exit-scope"}]}
            ]}"#,
        );
        assert_eq!(
            fx.errors(),
            [
                "malformed body of `one`: local `x` is used outside its scope",
                "malformed body of `two`: unknown handle `h`",
                "malformed body of `three`: scope exit without a matching scope entry",
            ]
        );
    }

    #[test]
    fn test_errors_carry_the_failing_op() {
        let fx = fixture(
            r#"{"functions": [
                {"name": "main", "locals": [{"name": "x", "ty": "u32"}], "body": [
                    {"op": "enter-scope"},
                    {"op": "bind", "local": "x"},
                    {"op": "borrow", "handle": "a", "place": "x", "kind": "mut"},
                    {"op": "read", "place": "x"}
                ]}
            ]}"#,
        );
        let located = fx.checker().check_located(&|_| false);
        assert_eq!(located.len(), 1);
        assert_eq!(located[0].0, Some(3));
        assert_eq!(located[0].1.to_string(), "cannot read `x` because it is borrowed as mutable");
    }

    #[test]
    fn test_skipped_functions_are_not_walked() {
        let fx = fixture(r#"{"functions": [{"name": "bad", "body": [{"op": "exit-scope"}]}]}"#);
        let bad = fx.unit.interner.intern("bad");
        assert!(fx.checker().check(&|name| name == bad).is_ok());
    }
}
