//! The outlives graph.

use ks_intern::{Interner, Symbol};
use ks_ir::{CompilationUnit, RegionParamDecl, STATIC_REGION};
use ks_span::FileSpan;
use la_arena::Arena;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, instrument, trace};

use crate::error::{RegionError, RegionResult};
use crate::region::{RegionData, RegionId, RegionScope};

/// Regions of one compilation unit and the outlives relation between them.
///
/// An edge `a -> b` records that `a` was declared to outlive `b`. The
/// distinguished `'static` region outlives everything without needing
/// edges. Once [`sealed`](Self::seal), the graph rejects every mutation.
#[derive(Debug, Clone)]
pub struct RegionGraph {
    interner: Interner,
    regions: Arena<RegionData>,
    by_name: FxHashMap<(RegionScope, Symbol), RegionId>,
    static_region: RegionId,
    sealed: bool,
}

impl RegionGraph {
    /// Creates a graph holding only `'static`.
    #[must_use]
    pub fn new(interner: &Interner) -> Self {
        let mut regions = Arena::default();
        let name = interner.intern(STATIC_REGION);
        let static_region = regions.alloc(RegionData {
            name,
            scope: RegionScope::Global,
            outlives: SmallVec::new(),
            span: FileSpan::synthetic(),
        });
        let mut by_name = FxHashMap::default();
        by_name.insert((RegionScope::Global, name), static_region);
        Self {
            interner: interner.clone(),
            regions,
            by_name,
            static_region,
            sealed: false,
        }
    }

    /// Builds the graph for every region parameter declared in `unit`.
    ///
    /// Items are handled independently: a cycle in one item is reported and
    /// the remaining items are still declared.
    #[instrument(skip_all, fields(unit = %unit.name))]
    pub fn from_unit(unit: &CompilationUnit) -> (Self, Vec<RegionError>) {
        let mut graph = Self::new(&unit.interner);
        let mut errors = Vec::new();

        for def in unit.type_defs.values() {
            let scope = RegionScope::Type(def.name);
            if let Err(err) = graph.declare_params(scope, &def.region_params, def.span) {
                errors.push(err);
            }
        }
        for def in unit.functions.values() {
            let scope = RegionScope::Function(def.name);
            if let Err(err) = graph.declare_params(scope, &def.region_params, def.span) {
                errors.push(err);
            }
        }

        debug!(regions = graph.len(), errors = errors.len(), "built region graph");
        (graph, errors)
    }

    /// Declares an item's region parameters, then records their bounds.
    ///
    /// # Errors
    ///
    /// Fails on the first duplicate or cycle-closing bound.
    pub fn declare_params(
        &mut self,
        scope: RegionScope,
        params: &[RegionParamDecl],
        span: FileSpan,
    ) -> RegionResult<Vec<RegionId>> {
        let ids = params
            .iter()
            .map(|param| self.declare_region(scope, param.name, &[], span))
            .collect::<RegionResult<Vec<_>>>()?;

        for (param, &longer) in params.iter().zip(&ids) {
            for bound in &param.outlives {
                // Bounds were checked against the declaration list during
                // lowering; anything else here is `'static`.
                let shorter = self
                    .region_by_name(scope, *bound)
                    .unwrap_or(self.static_region);
                self.add_outlives(longer, shorter, span)?;
            }
        }
        Ok(ids)
    }

    /// Declares a new region that outlives each region in `outlives`.
    ///
    /// A fresh region has no incoming edges, so declaring it cannot close a
    /// cycle; cycles only arise from [`add_outlives`](Self::add_outlives).
    ///
    /// # Errors
    ///
    /// [`RegionError::Sealed`] after sealing and [`RegionError::Duplicate`]
    /// when `scope` already declares `name`.
    pub fn declare_region(
        &mut self,
        scope: RegionScope,
        name: Symbol,
        outlives: &[RegionId],
        span: FileSpan,
    ) -> RegionResult<RegionId> {
        if self.sealed {
            return Err(RegionError::Sealed {
                name: self.quoted(name),
            });
        }
        if self.by_name.contains_key(&(scope, name)) {
            return Err(RegionError::Duplicate {
                name: self.quoted(name),
                item: self.scope_name(scope),
                span,
            });
        }

        let mut edges: SmallVec<[RegionId; 2]> = SmallVec::new();
        for &shorter in outlives {
            if !edges.contains(&shorter) {
                edges.push(shorter);
            }
        }
        let id = self.regions.alloc(RegionData {
            name,
            scope,
            outlives: edges,
            span,
        });
        self.by_name.insert((scope, name), id);
        trace!(region = %self.quoted(name), scope = %self.scope_name(scope), "declared region");
        Ok(id)
    }

    /// Records that `longer` outlives `shorter`.
    ///
    /// # Errors
    ///
    /// [`RegionError::Cycle`] if `shorter` already outlives `longer` through
    /// recorded edges, and [`RegionError::Sealed`] after sealing.
    pub fn add_outlives(
        &mut self,
        longer: RegionId,
        shorter: RegionId,
        span: FileSpan,
    ) -> RegionResult<()> {
        if self.sealed {
            return Err(RegionError::Sealed {
                name: self.quoted(self.regions[longer].name),
            });
        }
        if longer == shorter || self.regions[longer].outlives.contains(&shorter) {
            return Ok(());
        }
        // `'a: 'static` only says `'a` lives forever; it cannot close a cycle.
        if shorter != self.static_region
            && let Some(mut path) = self.edge_path(shorter, longer)
        {
            path.push(shorter);
            return Err(RegionError::Cycle {
                item: self.scope_name(self.regions[longer].scope),
                cycle: path.into_iter().map(|id| self.display(id)).collect(),
                span,
            });
        }
        self.regions[longer].outlives.push(shorter);
        Ok(())
    }

    /// Path of recorded edges from `from` to `to`, both ends included.
    fn edge_path(&self, from: RegionId, to: RegionId) -> Option<Vec<RegionId>> {
        let mut parent: FxHashMap<RegionId, RegionId> = FxHashMap::default();
        let mut stack = vec![from];
        let mut seen = FxHashSet::default();
        seen.insert(from);
        while let Some(node) = stack.pop() {
            if node == to {
                let mut path = vec![node];
                let mut cursor = node;
                while let Some(&prev) = parent.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in &self.regions[node].outlives {
                if seen.insert(next) {
                    parent.insert(next, node);
                    stack.push(next);
                }
            }
        }
        None
    }

    /// Whether `a` outlives `b`. Reflexive and transitive; `'static`
    /// outlives every region.
    #[must_use]
    pub fn outlives(&self, a: RegionId, b: RegionId) -> bool {
        if a == b || a == self.static_region {
            return true;
        }
        let mut stack = vec![a];
        let mut seen = FxHashSet::default();
        seen.insert(a);
        while let Some(node) = stack.pop() {
            if node == b || node == self.static_region {
                return true;
            }
            for &next in &self.regions[node].outlives {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// A longer-lived region is a subtype of a shorter-lived one.
    #[must_use]
    pub fn is_subtype_region(&self, a: RegionId, b: RegionId) -> bool {
        self.outlives(a, b)
    }

    /// Every region that outlives `region`, in declaration order.
    #[must_use]
    pub fn outlived_by(&self, region: RegionId) -> Vec<RegionId> {
        self.regions
            .iter()
            .map(|(id, _)| id)
            .filter(|&id| self.outlives(id, region))
            .collect()
    }

    /// Looks up a region by name. `static` resolves in every scope.
    #[must_use]
    pub fn region_by_name(&self, scope: RegionScope, name: Symbol) -> Option<RegionId> {
        if name == self.regions[self.static_region].name {
            return Some(self.static_region);
        }
        self.by_name.get(&(scope, name)).copied()
    }

    /// Regions declared in `scope`, in declaration order.
    pub fn regions_in(&self, scope: RegionScope) -> impl Iterator<Item = RegionId> + '_ {
        self.regions
            .iter()
            .filter(move |(_, data)| data.scope == scope)
            .map(|(id, _)| id)
    }

    /// The `'static` region.
    #[must_use]
    pub fn static_region(&self) -> RegionId {
        self.static_region
    }

    /// Data recorded for `region`.
    #[must_use]
    pub fn data(&self, region: RegionId) -> &RegionData {
        &self.regions[region]
    }

    /// Number of regions, `'static` included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether the graph holds nothing but `'static`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    /// Freezes the graph.
    pub fn seal(&mut self) {
        debug!(regions = self.len(), "sealed region graph");
        self.sealed = true;
    }

    /// Whether the graph has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Region name with its quote, e.g. `'a`.
    #[must_use]
    pub fn display(&self, region: RegionId) -> String {
        self.quoted(self.regions[region].name)
    }

    fn quoted(&self, name: Symbol) -> String {
        format!("'{}", self.interner.resolve(&name))
    }

    fn scope_name(&self, scope: RegionScope) -> String {
        scope
            .item()
            .map_or_else(|| "<unit>".to_string(), |item| self.interner.resolve(&item).to_string())
    }
}
